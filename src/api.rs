//! JSON endpoints served by the host.
//!
//! - `GET /api/covers` lists cover images directly inside
//!   `<document_root>/covers` as `"covers/<file>"` strings, in directory
//!   enumeration order.
//! - `GET /api/server_info` describes this host.
//! - `GET /api/setup_complete` acknowledges with `{"status":"ok"}`; the
//!   service fires the registered callback on the main context.
//! - `GET /api/accounts/list` acknowledges with `{"status":"ok"}`.

use std::env;
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Extensions listed by `/api/covers`.
pub const IMAGE_EXTS: &[&str] = &["png", "jpg", "jpeg", "gif"];

pub const SERVER_DESCRIPTION: &str = "A web server for Meteor";
pub const PROJECT_URL: &str = "https://github.com/scutoidzz/meteor";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ServerInfo {
    pub version: String,
    pub machine: String,
    pub description: String,
    pub owner: String,
    pub url: String,
}

impl ServerInfo {
    pub fn local() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            machine: local_host_name(),
            description: SERVER_DESCRIPTION.to_string(),
            owner: invoking_user(),
            url: PROJECT_URL.to_string(),
        }
    }
}

pub fn server_info() -> Value {
    serde_json::to_value(ServerInfo::local()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to encode server info");
        json!({})
    })
}

pub fn setup_complete() -> Value {
    json!({ "status": "ok" })
}

pub fn accounts_list() -> Value {
    json!({ "status": "ok" })
}

/// Image files directly inside `<document_root>/covers`. Non-recursive; a
/// missing directory yields an empty list.
pub fn list_covers(document_root: &Path) -> Vec<String> {
    let covers_dir = document_root.join("covers");
    let entries = match fs::read_dir(&covers_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %covers_dir.display(), error = %e, "No covers directory");
            return Vec::new();
        }
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_image(name))
        .map(|name| format!("covers/{name}"))
        .collect()
}

pub fn covers(document_root: &Path) -> Value {
    Value::from(list_covers(document_root))
}

fn is_image(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn local_host_name() -> String {
    for file in ["/proc/sys/kernel/hostname", "/etc/hostname"] {
        if let Ok(name) = fs::read_to_string(file) {
            let name = name.trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|var| env::var(var).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "localhost".to_string())
}

fn invoking_user() -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|var| env::var(var).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}
