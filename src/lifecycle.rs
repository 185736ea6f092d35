//! # Host lifecycle
//!
//! Two ways to run the host:
//!
//! - **Foreground** ([`HostController`]): owned by the screen that needs it.
//!   `start` binds, `stop` releases, and dropping the controller stops the
//!   host, so closing the owning window ends the server.
//! - **Detached** ([`BackgroundHost`]): a supervisor thread owns the running
//!   host and waits for an explicit stop message. Handles are cheap clones;
//!   dropping any of them, including every window that showed one, leaves
//!   the server running. Only [`BackgroundHost::stop`] ends it.
//!
//! Both report a second start as a failure without touching the instance
//! that is already listening. A second process (or a second controller)
//! trying the same port gets [`HostError::Bind`].
//!
//! Stopping is best effort: the listener closes at once, in-flight
//! connections are allowed to finish or time out on their own.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{bounded, Sender};
use tracing::{error, info, warn};

use crate::config::HostConfig;
use crate::error::{HostError, Result};
use crate::main_context::{MainHandle, SetupCallback, SetupNotifier};
use crate::server::{HostService, HttpServer, ServerHandle, ServerState};

/// Resolve paths, build the service and bind.
///
/// On error nothing is left behind: no listener, no state.
pub fn start_host(config: &HostConfig, setup: Option<SetupNotifier>) -> Result<ServerHandle> {
    let document_root = config.resolve_document_root();
    let index_file = config.resolve_index_file(&document_root);
    if !document_root.is_dir() {
        warn!(root = %document_root.display(), "Document root does not exist; static files will 404");
    }
    let state = ServerState::new(document_root, index_file, setup);
    info!(
        root = %state.document_root.display(),
        index = %state.index_file.display(),
        "Starting host"
    );
    let server = HttpServer::new(HostService::new(state), config.idle_timeout);
    match server.start(config.bind_addr()) {
        Ok(handle) => {
            if let Err(e) = handle.wait_ready() {
                warn!(error = %e, "Listener bound but not yet accepting");
            }
            info!("Hosting started.");
            info!("App running at: http://localhost:{}/", handle.local_addr().port());
            Ok(handle)
        }
        Err(e) => {
            error!(error = %e, "Error starting server on port {}", config.port);
            Err(e)
        }
    }
}

/// Foreground host tied to its owner's lifetime.
pub struct HostController {
    config: HostConfig,
    setup: Option<SetupNotifier>,
    server: Option<ServerHandle>,
}

impl HostController {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            setup: None,
            server: None,
        }
    }

    /// Register the callback fired on `main` after `/api/setup_complete`.
    /// Takes effect on the next `start`.
    pub fn set_setup_complete_callback(&mut self, main: MainHandle, callback: SetupCallback) {
        self.setup = Some(SetupNotifier::new(main, callback));
    }

    /// Start listening.
    ///
    /// # Errors
    ///
    /// [`HostError::AlreadyRunning`] if this controller already runs a host
    /// (the running one is untouched), [`HostError::Bind`] if the port is
    /// taken.
    pub fn start(&mut self) -> Result<SocketAddr> {
        if let Some(server) = &self.server {
            warn!("Server is already running.");
            return Err(HostError::AlreadyRunning {
                port: server.local_addr().port(),
            });
        }
        let handle = start_host(&self.config, self.setup.clone())?;
        let addr = handle.local_addr();
        self.server = Some(handle);
        Ok(addr)
    }

    /// Stop listening. Calling it when nothing runs only logs.
    pub fn stop(&mut self) {
        match self.server.take() {
            Some(server) => {
                info!("Stopping host…");
                server.stop();
                info!("Host stopped.");
            }
            None => info!("No active host to stop."),
        }
    }

    pub fn is_running(&self) -> bool {
        self.server.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(ServerHandle::local_addr)
    }
}

impl Drop for HostController {
    fn drop(&mut self) {
        if self.server.is_some() {
            self.stop();
        }
    }
}

struct Supervisor {
    addr: SocketAddr,
    shutdown: Sender<()>,
    thread: thread::JoinHandle<()>,
}

/// Detached host supervised by its own thread.
#[derive(Clone, Default)]
pub struct BackgroundHost {
    inner: Arc<Mutex<Option<Supervisor>>>,
}

impl BackgroundHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch the host under a supervisor thread.
    ///
    /// # Errors
    ///
    /// [`HostError::AlreadyRunning`] when this handle family already
    /// supervises a host, [`HostError::Bind`] when the port is occupied,
    /// [`HostError::Io`] if the supervisor thread cannot be spawned.
    pub fn start(&self, config: &HostConfig, setup: Option<SetupNotifier>) -> Result<SocketAddr> {
        let mut slot = self.lock();
        if let Some(supervisor) = slot.as_ref() {
            warn!(addr = %supervisor.addr, "Background host already running");
            return Err(HostError::AlreadyRunning {
                port: supervisor.addr.port(),
            });
        }

        // The supervisor is spawned before binding so that a spawn failure
        // never strands a bound listener. It keeps a sender of its own so the
        // stop channel never disconnects; only an explicit stop ends the host.
        let (handle_tx, handle_rx) = bounded::<ServerHandle>(1);
        let (shutdown, stop_rx) = bounded::<()>(1);
        let keepalive = shutdown.clone();
        let thread = thread::Builder::new()
            .name("meteor-bghost".to_string())
            .spawn(move || {
                let _keepalive = keepalive;
                let Ok(handle) = handle_rx.recv() else {
                    return;
                };
                if stop_rx.recv().is_ok() {
                    handle.stop();
                }
            })?;

        let handle = match start_host(config, setup) {
            Ok(handle) => handle,
            Err(e) => {
                drop(handle_tx);
                if thread.join().is_err() {
                    error!("Background host supervisor panicked");
                }
                return Err(e);
            }
        };
        let addr = handle.local_addr();
        if let Err(returned) = handle_tx.send(handle) {
            error!("Background host supervisor exited early");
            returned.into_inner().stop();
            return Err(HostError::Io(std::io::Error::other("supervisor exited")));
        }

        info!(addr = %addr, "Background host started");
        *slot = Some(Supervisor {
            addr,
            shutdown,
            thread,
        });
        Ok(addr)
    }

    /// Stop the supervised host and wait for the listener to close.
    pub fn stop(&self) {
        let supervisor = self.lock().take();
        match supervisor {
            Some(supervisor) => {
                info!("Stopping host…");
                if supervisor.shutdown.send(()).is_err() {
                    warn!("Background host supervisor already gone");
                }
                if supervisor.thread.join().is_err() {
                    error!("Background host supervisor panicked");
                }
                info!("Host stopped.");
            }
            None => info!("No active host to stop."),
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock().as_ref().map(|s| s.addr)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Supervisor>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
