use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use super::request::{ParseStatus, ParsedRequest, RequestParser};
use super::response::write_route_result;
use crate::api;
use crate::main_context::SetupNotifier;
use crate::router::{ApiRoute, Route, RouteResult, Router};
use crate::static_files::{content_type, StaticFiles};

/// Read-only state shared by every connection of one running host.
pub struct ServerState {
    pub document_root: PathBuf,
    pub index_file: PathBuf,
    pub router: Router,
    pub static_files: StaticFiles,
    pub setup: Option<SetupNotifier>,
}

impl ServerState {
    /// `document_root` and `index_file` should already be resolved. The
    /// index may live outside the document root.
    pub fn new(document_root: PathBuf, index_file: PathBuf, setup: Option<SetupNotifier>) -> Self {
        let static_files = StaticFiles::new(&document_root);
        let document_root = static_files.base_dir().to_path_buf();
        let index_file = fs::canonicalize(&index_file).unwrap_or(index_file);
        let router = Router::new();
        Self {
            document_root,
            index_file,
            router,
            static_files,
            setup,
        }
    }
}

/// Routes parsed requests and drives the per-connection read loop.
#[derive(Clone)]
pub struct HostService {
    state: Arc<ServerState>,
}

impl HostService {
    pub fn new(state: ServerState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Produce the result for one request. `/api/setup_complete` also posts
    /// the registered callback to the main context.
    ///
    /// `/` reads the configured index file directly. Every other file goes
    /// through [`StaticFiles`] and must resolve inside the document root.
    pub fn handle(&self, req: &ParsedRequest) -> RouteResult {
        match self.state.router.route(&req.path) {
            Route::Api(ApiRoute::Covers) => {
                RouteResult::ApiJson(api::covers(&self.state.document_root))
            }
            Route::Api(ApiRoute::ServerInfo) => RouteResult::ApiJson(api::server_info()),
            Route::Api(ApiRoute::SetupComplete) => {
                if let Some(setup) = &self.state.setup {
                    setup.notify();
                }
                RouteResult::ApiJson(api::setup_complete())
            }
            Route::Api(ApiRoute::AccountsList) => RouteResult::ApiJson(api::accounts_list()),
            Route::Index => self.index(),
            Route::Static(path) => self.state.static_files.resolve(&path),
            Route::NotFound => RouteResult::NotFound,
        }
    }

    fn index(&self) -> RouteResult {
        let index = &self.state.index_file;
        match fs::read(index) {
            Ok(body) => RouteResult::StaticFile {
                body,
                mime: content_type(index),
            },
            Err(e) => {
                debug!(file = %index.display(), error = %e, "Index file unreadable");
                RouteResult::NotFound
            }
        }
    }

    /// Serve exactly one request from `stream`.
    ///
    /// Malformed requests and non-GET methods return without writing
    /// anything; the caller drops the stream, which closes the connection.
    pub fn serve<S: Read + Write>(&self, stream: &mut S, peer: &str) -> io::Result<()> {
        let mut parser = RequestParser::new();
        let mut buf = [0u8; 4096];
        let request = loop {
            let status = match stream.read(&mut buf) {
                Ok(0) => parser.finish(),
                Ok(n) => parser.feed(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            match status {
                ParseStatus::NeedMore => continue,
                ParseStatus::Ready(request) => break request,
                ParseStatus::Rejected(e) => {
                    debug!(peer = %peer, error = %e, "Dropping connection");
                    return Ok(());
                }
                ParseStatus::Finished => return Ok(()),
            }
        };

        let result = self.handle(&request);
        let status = write_route_result(stream, result)?;
        parser.complete();
        info!(peer = %peer, method = %request.method, path = %request.path, status, "Request served");
        Ok(())
    }
}
