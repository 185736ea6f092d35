//! # CLI Module
//!
//! Command line entry for the `meteor` binary.
//!
//! ## Modes
//!
//! ### Launcher (default)
//!
//! ```bash
//! meteor
//! ```
//!
//! Opens the text launcher ([`crate::console::Console`]). Hosts started from
//! it run detached from the prompt and stop on `quit`.
//!
//! ### `--server`
//!
//! ```bash
//! meteor --server
//! ```
//!
//! Runs only the embedded host on port `8304` until SIGINT or SIGTERM. The
//! index page is `./index.html` when present, otherwise the one next to the
//! executable. Exits with code `1` when the port cannot be bound.
//!
//! Log verbosity follows `RUST_LOG`.

mod commands;


pub use commands::{run, run_cli, server_index_file, server_mode_config, Cli};
