//! # Meteor host
//!
//! **meteor-host** is the local web host behind the Meteor media library. It
//! serves the front-end bundle and a handful of JSON endpoints over a tiny,
//! hand-rolled HTTP/1.1 implementation running on `may` coroutines.
//!
//! ## Overview
//!
//! The host answers `GET` only. Every response closes its connection. Three
//! fixed API routes exist; everything else is a static file below a single
//! document root:
//!
//! | Path | Response |
//! |---|---|
//! | `/` | the configured index page, rewritten internally |
//! | `/api/covers` | JSON array of `covers/<file>` image paths |
//! | `/api/server_info` | JSON object describing this machine |
//! | `/api/setup_complete` | `{"status":"ok"}`, and the setup callback fires |
//! | anything else | file under the document root, or an empty 404 |
//!
//! ## Architecture
//!
//! - **[`server`]** - request parser, response writer, acceptor and the
//!   per-connection service
//! - **[`router`]** - fixed route table, query stripping, percent-decoding
//! - **[`static_files`]** - path containment and the MIME table
//! - **[`api`]** - the JSON endpoint bodies
//! - **[`lifecycle`]** - [`HostController`] (foreground) and
//!   [`BackgroundHost`] (detached)
//! - **[`main_context`]** - main-thread task queue used for the setup callback
//! - **[`config`]** - host and client configuration
//! - **[`client`]** - the client half of the wire contract
//! - **[`console`]** - text launcher used when no flag is given
//! - **[`cli`]** - the `meteor` command line
//!
//! ### Request flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Acceptor as HttpServer<br/>(may coroutine)
//!     participant Parser as RequestParser
//!     participant Router
//!     participant Files as StaticFiles
//!     participant Main as MainContext
//!
//!     Client->>Acceptor: connect
//!     Acceptor->>Parser: feed bytes
//!     Parser-->>Acceptor: Ready(GET path)
//!     Acceptor->>Router: route(path)
//!     alt API route
//!         Router-->>Acceptor: JSON
//!         Acceptor--)Main: post setup callback (setup_complete only)
//!     else static
//!         Router->>Files: resolve(path)
//!         Files-->>Acceptor: bytes + MIME, or 404
//!     end
//!     Acceptor-->>Client: response, then close
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use meteor_host::{HostConfig, HostController};
//!
//! let config = HostConfig::new().with_port(0).with_document_root("host");
//! let mut host = HostController::new(config);
//! let addr = host.start().expect("bind failed");
//! println!("listening on {addr}");
//! host.stop();
//! ```
//!
//! ## Runtime Considerations
//!
//! The host runs on the `may` coroutine runtime, not tokio. The binary sets
//! the coroutine stack size to 32 KiB before the first host starts.
//! Connection coroutines never call user code directly: the setup callback
//! is posted to a [`MainContext`] and runs on the thread that pumps it.

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod console;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod main_context;
pub mod router;
pub mod server;
pub mod static_files;

pub use client::{build_url, AccountsClient};
pub use config::{ClientConfig, HostConfig};
pub use error::{HostError, Result};
pub use lifecycle::{BackgroundHost, HostController};
pub use main_context::{MainContext, MainHandle, SetupCallback};
pub use server::ServerHandle;
