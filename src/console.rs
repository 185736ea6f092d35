//! Line-oriented launcher.
//!
//! The chooser prompt accepts `start`, `stop`, `status`, `info`, `covers`,
//! `help` and `quit`. `server` opens a server prompt with the same host
//! commands; leaving it with `back` closes only the prompt, a host started
//! from there keeps running under its [`BackgroundHost`].

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tracing::{info, warn};

use crate::client::AccountsClient;
use crate::config::{ClientConfig, HostConfig};
use crate::lifecycle::BackgroundHost;
use crate::main_context::{MainContext, PumpOutcome, SetupNotifier};

const HELP: &str = "\
commands:
  start    start the host in the background
  stop     stop the background host
  status   show whether the host is running
  info     fetch /api/server_info from the configured server
  covers   list cover URLs from the configured server
  server   open the server prompt (back to leave it)
  help     show this text
  quit     stop the host and exit
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prompt {
    Chooser,
    Server,
}

impl Prompt {
    fn text(self) -> &'static str {
        match self {
            Prompt::Chooser => "meteor> ",
            Prompt::Server => "server> ",
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

/// Interactive launcher state.
pub struct Console {
    host: BackgroundHost,
    config: HostConfig,
    client: ClientConfig,
    main: MainContext,
}

impl Console {
    pub fn new(config: HostConfig, client: ClientConfig) -> Self {
        Self {
            host: BackgroundHost::new(),
            config: launcher_config(config),
            client,
            main: MainContext::new(),
        }
    }

    /// Handle to the detached host, shared with anything that outlives the
    /// prompt.
    pub fn host(&self) -> BackgroundHost {
        self.host.clone()
    }

    /// Read commands until `quit` or end of input. Tasks posted to the main
    /// context (the setup-complete notice) run between commands.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> io::Result<()> {
        let mut prompt = Prompt::Chooser;
        let mut lines = input.lines();
        loop {
            if self.main.run_pending() == PumpOutcome::Quit {
                break;
            }
            write!(out, "{}", prompt.text())?;
            out.flush()?;
            let Some(line) = lines.next() else {
                writeln!(out)?;
                break;
            };
            let line = line?;
            let command = line.trim();
            if command.is_empty() {
                continue;
            }
            match (prompt, command) {
                (Prompt::Chooser, "server") => {
                    prompt = Prompt::Server;
                    continue;
                }
                (Prompt::Server, "back") | (Prompt::Server, "close") => {
                    prompt = Prompt::Chooser;
                    continue;
                }
                _ => {}
            }
            if let Flow::Quit = self.execute(command, &mut out)? {
                break;
            }
        }
        self.shutdown(&mut out)
    }

    fn execute<W: Write>(&mut self, command: &str, out: &mut W) -> io::Result<Flow> {
        match command {
            "start" => self.start(out)?,
            "stop" => {
                if self.host.is_running() {
                    self.host.stop();
                    writeln!(out, "Host stopped.")?;
                } else {
                    writeln!(out, "No active host to stop.")?;
                }
            }
            "status" => match self.host.local_addr() {
                Some(addr) => writeln!(out, "running on {addr}")?,
                None => writeln!(out, "stopped")?,
            },
            "info" => match AccountsClient::from_config(&self.client).and_then(|c| c.server_info()) {
                Ok(info) => writeln!(out, "{info:#}")?,
                Err(e) => writeln!(out, "server info unavailable: {e}")?,
            },
            "covers" => match AccountsClient::from_config(&self.client).and_then(|c| c.covers()) {
                Ok(covers) if covers.is_empty() => writeln!(out, "no covers")?,
                Ok(covers) => {
                    for cover in covers {
                        writeln!(out, "{cover}")?;
                    }
                }
                Err(e) => writeln!(out, "covers unavailable: {e}")?,
            },
            "help" => write!(out, "{HELP}")?,
            "quit" | "exit" => return Ok(Flow::Quit),
            other => writeln!(out, "unknown command: {other} (try help)")?,
        }
        Ok(Flow::Continue)
    }

    fn start<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let notifier = SetupNotifier::new(
            self.main.handle(),
            Arc::new(|| info!("Setup complete.")),
        );
        match self.host.start(&self.config, Some(notifier)) {
            Ok(addr) => writeln!(out, "App running at: http://localhost:{}/", addr.port()),
            Err(e) if e.is_port_in_use() => {
                warn!(error = %e, "Host start refused");
                writeln!(out, "Server is already running or port {} is in use.", self.config.port)
            }
            Err(e) => writeln!(out, "Failed to start host: {e}"),
        }
    }

    fn shutdown<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if self.host.is_running() {
            self.host.stop();
            writeln!(out, "Host stopped.")?;
        }
        self.main.run_pending();
        Ok(())
    }
}

/// The launcher serves `mainsetup.html` as its landing page when the
/// document root ships one and no index was configured explicitly.
pub fn launcher_config(config: HostConfig) -> HostConfig {
    if config.index_file.is_some() {
        return config;
    }
    let root = config.resolve_document_root();
    let setup_page = root.join("mainsetup.html");
    if setup_page.is_file() {
        config.with_index_file(setup_page)
    } else {
        config
    }
}
