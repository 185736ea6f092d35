//! Error taxonomy for the host.
//!
//! Only [`HostError::Bind`] and [`HostError::AlreadyRunning`] ever reach the
//! caller of a start operation. Everything else is produced and consumed
//! inside a single connection (or a single callback dispatch) and ends up in
//! the log.

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    /// The listening socket could not be bound, usually because the port is
    /// already taken by another host.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("a host is already running on port {port}")]
    AlreadyRunning { port: u16 },
    /// Unparseable request line or unsupported method. The connection is
    /// dropped without a response.
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    /// Path escaped the document root or the file is missing. Maps to 404.
    #[error("cannot resolve {0}")]
    Resolution(String),
    #[error("setup-complete callback failed: {0}")]
    CallbackDispatch(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("client request failed: {0}")]
    Client(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostError {
    /// True when the error means another listener already owns the port.
    pub fn is_port_in_use(&self) -> bool {
        match self {
            HostError::Bind { source, .. } => source.kind() == std::io::ErrorKind::AddrInUse,
            HostError::AlreadyRunning { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, HostError>;
