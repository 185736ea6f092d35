//! # Configuration Module
//!
//! Two independent inputs configure Meteor:
//!
//! - [`HostConfig`] describes the embedded host: bind address, port, document
//!   root, index file and the per-connection idle timeout. Defaults match the
//!   companion front end (port `8304` on all interfaces, `host/` next to the
//!   executable).
//! - [`ClientConfig`] is the `user_files/config.json` file read by the client
//!   side to find *some* server. Both `ip` and `port` are optional and may be
//!   strings or numbers; any other JSON type is ignored.
//!
//! ## Document root resolution
//!
//! When no explicit root is configured the host uses `<exe_dir>/host` and
//! falls back to `<cwd>/host` if that directory does not exist. The result
//! is computed once when the host starts and cached in the server state.

use std::env;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::HostError;

/// Port the host listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 8304;

/// Idle read/write timeout applied to every accepted connection.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_CLIENT_IP: &str = "127.0.0.1";
pub const DEFAULT_CLIENT_PORT: &str = "8304";

/// Configuration for one embedded host instance.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Interface to bind (default: all interfaces)
    pub bind_ip: IpAddr,
    /// TCP port (default: 8304, `0` picks an ephemeral port)
    pub port: u16,
    /// Explicit document root; `None` resolves next to the executable
    pub document_root: Option<PathBuf>,
    /// File served for `/`; `None` means `<document_root>/index.html`
    pub index_file: Option<PathBuf>,
    /// Read/write idle timeout for client connections
    pub idle_timeout: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            document_root: None,
            index_file: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl HostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_document_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.document_root = Some(root.into());
        self
    }

    pub fn with_index_file<P: Into<PathBuf>>(mut self, index: P) -> Self {
        self.index_file = Some(index.into());
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Resolve the directory static files are served from.
    ///
    /// An explicit root wins. Otherwise `<exe_dir>/host` is used when it
    /// exists, else `<cwd>/host`. The returned path is canonical when the
    /// directory exists.
    pub fn resolve_document_root(&self) -> PathBuf {
        let root = match &self.document_root {
            Some(root) => root.clone(),
            None => default_document_root(),
        };
        fs::canonicalize(&root).unwrap_or(root)
    }

    /// Resolve the index file relative to an already resolved root.
    pub fn resolve_index_file(&self, document_root: &Path) -> PathBuf {
        match &self.index_file {
            Some(index) if index.is_absolute() => fs::canonicalize(index).unwrap_or_else(|_| index.clone()),
            Some(index) => {
                let joined = document_root.join(index);
                fs::canonicalize(&joined).unwrap_or(joined)
            }
            None => document_root.join("index.html"),
        }
    }
}

fn default_document_root() -> PathBuf {
    if let Some(dir) = executable_dir() {
        let candidate = dir.join("host");
        if candidate.is_dir() {
            return candidate;
        }
    }
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    cwd.join("host")
}

/// Directory containing the running executable.
pub fn executable_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// Contents of `user_files/config.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub ip: String,
    pub port: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ip: DEFAULT_CLIENT_IP.to_string(),
            port: DEFAULT_CLIENT_PORT.to_string(),
        }
    }
}

impl ClientConfig {
    /// Load from `<exe_dir>/../user_files/config.json`, falling back to
    /// `<cwd>/user_files/config.json`. A missing file yields the defaults.
    pub fn load() -> Self {
        let primary = executable_dir().map(|dir| dir.join("..").join("user_files").join("config.json"));
        let path = match primary {
            Some(path) if path.exists() => path,
            _ => env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("user_files")
                .join("config.json"),
        };
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_json_str(&text),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No client config, using defaults");
                Self::default()
            }
        }
    }

    pub fn from_json_str(text: &str) -> Self {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                let err = HostError::Config(format!("client config: {e}"));
                warn!(error = %err, "Using default client config");
                return Self::default();
            }
        };
        let mut config = Self::default();
        if let Some(ip) = scalar_field(&value, "ip") {
            config.ip = ip;
        }
        if let Some(port) = scalar_field(&value, "port") {
            config.port = port;
        }
        config
    }

    /// `ip:port`, without scheme. Feed it to [`crate::client::build_url`].
    pub fn base(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

fn scalar_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
