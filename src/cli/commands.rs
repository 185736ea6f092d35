use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use crate::config::{executable_dir, ClientConfig, HostConfig};
use crate::console::Console;
use crate::lifecycle::HostController;
use crate::logging::{init_logging_with_config, LogConfig};
use crate::main_context::{MainContext, MainHandle};

/// Stack size for connection coroutines.
const COROUTINE_STACK_SIZE: usize = 0x8000;

/// Command-line interface for Meteor
#[derive(Parser, Debug)]
#[command(name = "meteor")]
#[command(version, about = "Meteor local host", long_about = None)]
pub struct Cli {
    /// Run only the web host until interrupted
    #[arg(long, default_value_t = false)]
    pub server: bool,
}

/// Parse `std::env::args` and run. Returns the process exit code.
pub fn run_cli() -> anyhow::Result<i32> {
    run(Cli::parse())
}

pub fn run(cli: Cli) -> anyhow::Result<i32> {
    init_logging_with_config(&LogConfig::default())?;
    may::config().set_stack_size(COROUTINE_STACK_SIZE);

    if cli.server {
        return Ok(run_server());
    }

    let mut console = Console::new(HostConfig::new(), ClientConfig::load());
    let stdin = io::stdin();
    console.run(stdin.lock(), io::stdout())?;
    Ok(0)
}

/// `./index.html` when it exists, else `index.html` next to the executable.
pub fn server_index_file() -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let local = cwd.join("index.html");
    if local.is_file() {
        return local;
    }
    executable_dir().unwrap_or(cwd).join("index.html")
}

/// Host configuration for `--server`.
///
/// Static files still come from the default document root. The index is
/// served at `/` by its canonical path even when it lives outside that root.
pub fn server_mode_config(index: &Path) -> HostConfig {
    let index = std::fs::canonicalize(index).unwrap_or_else(|_| index.to_path_buf());
    HostConfig::new().with_index_file(index)
}

fn run_server() -> i32 {
    let index = server_index_file();
    let config = server_mode_config(&index);
    let port = config.port;

    let ctx = MainContext::new();
    let mut host = HostController::new(config);
    host.set_setup_complete_callback(ctx.handle(), Arc::new(|| info!("Setup complete.")));

    if let Err(e) = host.start() {
        error!(error = %e, "Server start failed");
        eprintln!("Failed to start server: port {port} may already be in use.");
        return 1;
    }

    install_signal_handlers(ctx.handle());
    ctx.run();
    host.stop();
    0
}

#[cfg(unix)]
fn install_signal_handlers(main: MainHandle) {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            warn!(error = %e, "Signal handlers unavailable");
            return;
        }
    };
    let spawned = std::thread::Builder::new()
        .name("meteor-signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(signal, "Shutdown requested");
                main.quit();
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Signal thread could not be started");
    }
}

#[cfg(not(unix))]
fn install_signal_handlers(_main: MainHandle) {}
