//! The embedded HTTP host: parser, writer, acceptor and the service that
//! ties them to the router.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{ParseState, ParseStatus, ParsedRequest, RequestParser};
pub use response::Response;
pub use service::{HostService, ServerState};
