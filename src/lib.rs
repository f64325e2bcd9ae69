//! # Digest Cache
//!
//! A small TCP service that answers `get <text> <delay>` requests with the
//! MD5 digest of `<text>`. The first computation of a text is made to cost
//! `<delay>` milliseconds; results are memoized in a bounded, thread-safe
//! cache so repeated texts are answered immediately.
//!
//! ## Features
//!
//! - **Generic cache**: [`Cache<K, V>`] with LRU-by-last-access eviction,
//!   idle-time expiry sweeps and hit/fault/eviction/overwrite counters
//! - **Thread per connection**: each request is handled by a [`Worker`] on
//!   its own OS thread, with cooperative cancellation
//! - **Live control**: finish, cancel, clear and print requests delivered
//!   through a [`ServerHandle`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use digest_cache::{Server, ServerConfig};
//!
//! # async fn run() -> Result<(), digest_cache::ServerError> {
//! let server = Server::new(ServerConfig::new().port(3456).build());
//! let handle = server.handle();
//!
//! tokio::spawn(async move {
//!     tokio::signal::ctrl_c().await.ok();
//!     handle.cancel();
//! });
//!
//! let summary = server.run().await?;
//! std::process::exit(summary.exit_code());
//! # }
//! ```
//!
//! ## Protocol
//!
//! A request is a single line, `<command> <text> <delay>\n`. The response
//! is the 32 hexadecimal digest characters with no terminator, after which
//! the server closes the connection. Malformed requests get no response.

pub mod cache;
pub mod cli;
pub mod command;
pub mod config;
pub mod digest;
pub mod error;
pub mod logging;
pub mod server;
pub mod stats;
pub mod utils;
pub mod worker;

pub(crate) mod entry;
pub(crate) mod storage;

pub use cache::Cache;
pub use cli::{Cli, ClientCommand, ServerArgs};
pub use command::{Command, Request};
pub use config::{CacheConfig, ServerConfig};
pub use digest::digest;
pub use error::{ServerError, ServerResult, WorkerError};
pub use server::{Control, RunOutcome, Server, ServerHandle, Summary};
pub use stats::{CacheStats, ServerStats};
pub use utils::buffer_to_array;
pub use worker::{CancelHandle, Worker, WorkerState};
