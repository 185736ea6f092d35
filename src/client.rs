//! Client side of the wire contract.
//!
//! The front end finds a host through `user_files/config.json` and talks to
//! it with plain GET requests. Only two endpoints matter here:
//! `/api/server_info` and `/api/covers`.

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{HostError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Join a host base and a relative path.
///
/// `base` gets `http://` unless it already starts with `http`. One trailing
/// `/` is removed from the base and one leading `/` from the path.
pub fn build_url(base: &str, path: &str) -> String {
    let mut url = if base.starts_with("http") {
        base.to_string()
    } else {
        format!("http://{base}")
    };
    if url.ends_with('/') {
        url.pop();
    }
    let path = path.strip_prefix('/').unwrap_or(path);
    format!("{url}/{path}")
}

/// Turn one element of the `/api/covers` array into an absolute URL.
///
/// Strings are used directly. Objects contribute their `cover`, `url` or
/// `image` field, first present wins. Absolute URLs pass through.
pub fn resolve_cover(base: &str, item: &Value) -> Option<String> {
    let raw = match item {
        Value::String(s) => s.as_str(),
        Value::Object(map) => ["cover", "url", "image"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))?,
        _ => return None,
    };
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with("http") {
        Some(raw.to_string())
    } else {
        Some(build_url(base, raw))
    }
}

/// Blocking client for one host.
pub struct AccountsClient {
    base: String,
    http: Client,
}

impl AccountsClient {
    /// # Errors
    ///
    /// [`HostError::Client`] if the HTTP client cannot be built.
    pub fn new<S: Into<String>>(base: S) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HostError::Client(e.to_string()))?;
        Ok(Self {
            base: base.into(),
            http,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(config.base())
    }

    /// `GET /api/server_info`.
    pub fn server_info(&self) -> Result<Value> {
        self.get_json("/api/server_info")
    }

    /// `GET /api/covers`, resolved to absolute URLs. Entries that are not
    /// usable are skipped.
    pub fn covers(&self) -> Result<Vec<String>> {
        let value = self.get_json("/api/covers")?;
        let Value::Array(items) = value else {
            warn!(base = %self.base, "Covers response is not an array");
            return Ok(Vec::new());
        };
        Ok(items
            .iter()
            .filter_map(|item| resolve_cover(&self.base, item))
            .collect())
    }

    fn get_json(&self, path: &str) -> Result<Value> {
        let url = build_url(&self.base, path);
        debug!(url = %url, "GET");
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|e| HostError::Client(format!("{url}: {e}")))?;
        let status = response.status();
        if status.as_u16() != 200 {
            return Err(HostError::Client(format!("{url}: HTTP {}", status.as_u16())));
        }
        response
            .json::<Value>()
            .map_err(|e| HostError::Client(format!("{url}: {e}")))
    }
}
