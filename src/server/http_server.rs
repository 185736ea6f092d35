use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use may::coroutine::JoinHandle;
use may::go;
use may::net::TcpListener;
use tracing::{debug, info, warn};

use super::service::HostService;
use crate::error::{HostError, Result};

/// Connection acceptor for a [`HostService`].
///
/// One coroutine accepts; every accepted socket gets its own coroutine, so a
/// slow client never blocks the accept loop.
pub struct HttpServer {
    service: HostService,
    idle_timeout: Duration,
}

/// Handle to a running acceptor.
///
/// Owning the handle is owning the listener: there is no process-wide
/// server registry. Dropping the handle without calling [`ServerHandle::stop`]
/// leaves the acceptor running until the process exits.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener is actually bound to (port `0` resolved).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Poll the listener until it accepts TCP connections.
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` if the server is not reachable within ~250ms.
    pub fn wait_ready(&self) -> io::Result<()> {
        let target = loopback_for(self.addr);
        for _ in 0..50 {
            if TcpStream::connect(target).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop accepting and close the listening socket.
    ///
    /// Connections already being served are not waited for; their
    /// coroutines finish (or hit the idle timeout) on their own.
    pub fn stop(self) {
        // SAFETY: cancel() is unsafe in may. The handle is owned here and
        // the coroutine only holds the listener and a service clone, both of
        // which are released by unwinding.
        unsafe {
            self.handle.coroutine().cancel();
        }
        if self.handle.join().is_err() {
            debug!(addr = %self.addr, "Acceptor coroutine ended by cancellation");
        }
    }
}

impl HttpServer {
    pub fn new(service: HostService, idle_timeout: Duration) -> Self {
        Self {
            service,
            idle_timeout,
        }
    }

    /// Bind `addr` and start accepting.
    ///
    /// # Errors
    ///
    /// [`HostError::Bind`] if the port cannot be bound. Nothing is left
    /// running in that case.
    pub fn start(self, addr: SocketAddr) -> Result<ServerHandle> {
        let listener =
            TcpListener::bind(addr).map_err(|source| HostError::Bind { addr, source })?;
        let local = listener
            .local_addr()
            .map_err(|source| HostError::Bind { addr, source })?;
        let HttpServer {
            service,
            idle_timeout,
        } = self;

        let handle = go!(move || accept_loop(listener, service, idle_timeout));
        info!(addr = %local, "Listener bound");
        Ok(ServerHandle {
            addr: local,
            handle,
        })
    }
}

fn accept_loop(listener: TcpListener, service: HostService, idle_timeout: Duration) {
    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Accept failed");
                continue;
            }
        };
        let service = service.clone();
        go!(move || {
            let peer = stream
                .peer_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            if let Err(e) = stream
                .set_read_timeout(Some(idle_timeout))
                .and_then(|_| stream.set_write_timeout(Some(idle_timeout)))
            {
                debug!(peer = %peer, error = %e, "Could not set idle timeout");
            }
            if let Err(e) = service.serve(&mut stream, &peer) {
                debug!(peer = %peer, error = %e, "Connection ended with error");
            }
        });
    }
}

fn loopback_for(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}
