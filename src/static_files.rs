use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::HostError;
use crate::router::RouteResult;

/// Serves files from beneath a single document root.
///
/// Every lookup is canonicalized (symlinks and `..` collapsed) and must land
/// inside the root, otherwise it is treated as missing.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        let base = base.into();
        let base_dir = fs::canonicalize(&base).unwrap_or(base);
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Lexically join `url_path` onto the root. Absolute or prefixed
    /// components are refused outright.
    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut pb = self.base_dir.clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                Component::ParentDir => pb.push(".."),
                Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(pb)
    }

    /// Canonical on-disk path for `url_path`, guaranteed to be inside the
    /// document root.
    pub fn canonical_path(&self, url_path: &str) -> Result<PathBuf, HostError> {
        let joined = self
            .map_path(url_path)
            .ok_or_else(|| HostError::Resolution(format!("{url_path}: invalid path")))?;
        let canonical = fs::canonicalize(&joined)
            .map_err(|e| HostError::Resolution(format!("{url_path}: {e}")))?;
        if !canonical.starts_with(&self.base_dir) {
            return Err(HostError::Resolution(format!("{url_path}: outside document root")));
        }
        Ok(canonical)
    }

    /// Read the file behind `url_path` together with its MIME type. The type
    /// follows the requested name, not a symlink target.
    pub fn load(&self, url_path: &str) -> Result<(Vec<u8>, &'static str), HostError> {
        let path = self.canonical_path(url_path)?;
        if !path.is_file() {
            return Err(HostError::Resolution(format!("{url_path}: not a regular file")));
        }
        let bytes = fs::read(&path).map_err(|e: io::Error| {
            HostError::Resolution(format!("{url_path}: {e}"))
        })?;
        Ok((bytes, content_type(Path::new(url_path))))
    }

    /// Resolve a URL path to a response. Every failure is a 404.
    pub fn resolve(&self, url_path: &str) -> RouteResult {
        match self.load(url_path) {
            Ok((body, mime)) => RouteResult::StaticFile { body, mime },
            Err(e) => {
                debug!(path = %url_path, error = %e, "Static lookup failed");
                RouteResult::NotFound
            }
        }
    }
}

/// MIME type inferred from the file extension.
pub fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
        .as_str()
    {
        "html" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
