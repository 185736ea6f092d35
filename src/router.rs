//! Fixed route table.
//!
//! The host has four API endpoints, three page aliases and a static file
//! tree. Matching is by exact path after the query string (and fragment)
//! has been stripped and the remainder percent-decoded. `/` maps to the
//! configured index file, which is the only file served without the
//! document-root containment check.

use tracing::debug;

/// Short page paths and the document-root files they rewrite to.
pub const PAGE_ALIASES: &[(&str, &str)] = &[
    ("/main", "/main/skeleton.html"),
    ("/videos", "/main/videos.html"),
    ("/music", "/main/music.html"),
];

/// JSON endpoints served by the host itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRoute {
    /// `GET /api/covers`
    Covers,
    /// `GET /api/server_info`
    ServerInfo,
    /// `GET /api/setup_complete`
    SetupComplete,
    /// `GET /api/accounts/list`, a fixed acknowledgement
    AccountsList,
}

impl ApiRoute {
    pub fn path(&self) -> &'static str {
        match self {
            ApiRoute::Covers => "/api/covers",
            ApiRoute::ServerInfo => "/api/server_info",
            ApiRoute::SetupComplete => "/api/setup_complete",
            ApiRoute::AccountsList => "/api/accounts/list",
        }
    }

    fn from_path(path: &str) -> Option<Self> {
        [
            ApiRoute::Covers,
            ApiRoute::ServerInfo,
            ApiRoute::SetupComplete,
            ApiRoute::AccountsList,
        ]
        .into_iter()
        .find(|r| r.path() == path)
    }
}

/// Routing decision for one request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Api(ApiRoute),
    /// `/`: the configured index file, wherever it lives.
    Index,
    /// Decoded URL path to look up under the document root.
    Static(String),
    /// The path could not be decoded.
    NotFound,
}

/// Outcome of handling a request, consumed by the response writer.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteResult {
    ApiJson(serde_json::Value),
    StaticFile { body: Vec<u8>, mime: &'static str },
    NotFound,
    /// Answered with `302 Found`. The built-in routes rewrite internally
    /// and never produce this.
    Redirect(String),
}

#[derive(Debug, Clone, Default)]
pub struct Router;

impl Router {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, raw_path: &str) -> Route {
        let path = strip_query(raw_path);
        let decoded = match urlencoding::decode(path) {
            Ok(decoded) => decoded.into_owned(),
            Err(e) => {
                debug!(path = %path, error = %e, "Undecodable request path");
                return Route::NotFound;
            }
        };
        if decoded == "/" {
            return Route::Index;
        }
        if let Some(api) = ApiRoute::from_path(&decoded) {
            return Route::Api(api);
        }
        match PAGE_ALIASES.iter().find(|(alias, _)| *alias == decoded) {
            Some((_, target)) => Route::Static((*target).to_string()),
            None => Route::Static(decoded),
        }
    }
}

/// Drop `?query` and `#fragment` from a request target.
pub fn strip_query(raw_path: &str) -> &str {
    let end = raw_path.find(['?', '#']).unwrap_or(raw_path.len());
    &raw_path[..end]
}
