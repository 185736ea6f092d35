//! Main execution context.
//!
//! UI state may only be touched from one thread. Connection handlers never
//! call user callbacks directly; they post a task to a [`MainHandle`] and the
//! thread that owns the [`MainContext`] runs it the next time it pumps.
//!
//! A panicking task is caught at the dispatch boundary and logged, so a bad
//! callback can neither take down the pump nor the listener.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, error};

use crate::error::HostError;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Callback fired after `GET /api/setup_complete`.
pub type SetupCallback = Arc<dyn Fn() + Send + Sync + 'static>;

enum Message {
    Run(Task),
    Quit,
}

/// Why a pump returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// Deadline reached or queue drained.
    Idle,
    /// A quit request was received.
    Quit,
}

/// Task queue owned by the main thread.
pub struct MainContext {
    tx: Sender<Message>,
    rx: Receiver<Message>,
    owner: ThreadId,
}

impl Default for MainContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MainContext {
    /// Create a context owned by the calling thread.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            owner: thread::current().id(),
        }
    }

    pub fn handle(&self) -> MainHandle {
        MainHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Run every task already queued, without blocking.
    pub fn run_pending(&self) -> PumpOutcome {
        loop {
            match self.rx.try_recv() {
                Ok(Message::Run(task)) => run_task(task),
                Ok(Message::Quit) => return PumpOutcome::Quit,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                    return PumpOutcome::Idle
                }
            }
        }
    }

    /// Run tasks as they arrive until `timeout` elapses or quit is requested.
    pub fn run_for(&self, timeout: Duration) -> PumpOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(Message::Run(task)) => run_task(task),
                Ok(Message::Quit) => return PumpOutcome::Quit,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return PumpOutcome::Idle
                }
            }
        }
    }

    /// Block running tasks until quit is requested.
    pub fn run(&self) {
        while let Ok(message) = self.rx.recv() {
            match message {
                Message::Run(task) => run_task(task),
                Message::Quit => break,
            }
        }
        debug!("Main context stopped");
    }
}

fn run_task(task: Task) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        let err = HostError::CallbackDispatch(reason);
        error!(error = %err, "Main context task failed");
    }
}

/// Cloneable, `Send` handle used to post work to the main thread.
#[derive(Clone)]
pub struct MainHandle {
    tx: Sender<Message>,
}

impl MainHandle {
    /// Queue `f` to run on the main thread. Fails only when the context has
    /// been dropped.
    pub fn post<F>(&self, f: F) -> Result<(), HostError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx
            .send(Message::Run(Box::new(f)))
            .map_err(|_| HostError::CallbackDispatch("main context is gone".into()))
    }

    /// Ask the pump to return.
    pub fn quit(&self) {
        if self.tx.send(Message::Quit).is_err() {
            debug!("Quit posted after main context was dropped");
        }
    }
}

/// Fires a [`SetupCallback`] on the main context, fire-and-forget.
#[derive(Clone)]
pub struct SetupNotifier {
    main: MainHandle,
    callback: SetupCallback,
}

impl SetupNotifier {
    pub fn new(main: MainHandle, callback: SetupCallback) -> Self {
        Self { main, callback }
    }

    pub fn notify(&self) {
        let callback = Arc::clone(&self.callback);
        if let Err(e) = self.main.post(move || callback()) {
            error!(error = %e, "Could not dispatch setup-complete callback");
        }
    }
}
