//! Error types for the digest server.
//!
//! `ServerError` covers the fatal, server-wide failures that abort the
//! control loop. `WorkerError` covers everything that can go wrong with a
//! single connection; it never crosses the worker's thread boundary and only
//! shows up in logs and in the server's error counter.

use std::io;

/// Fatal errors that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be created, bound or put to listen.
    #[error("failed to bind the server socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Accepting a connection failed with a non-recoverable error.
    #[error("unable to accept connections on the server socket: {0}")]
    Accept(#[source] io::Error),
}

impl ServerError {
    /// The negative process exit code for this failure category.
    pub fn exit_code(&self) -> i32 {
        match self {
            ServerError::Bind { .. } | ServerError::Accept(_) => -1,
        }
    }

    /// The OS error number behind this failure, if any.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            ServerError::Bind { source, .. } => source.raw_os_error(),
            ServerError::Accept(err) => err.raw_os_error(),
        }
    }
}

/// Exit code for a configuration or logic error detected before serving.
pub const EXIT_LOGIC_ERROR: i32 = -2;

/// Exit code reserved for memory exhaustion.
///
/// Allocation failure aborts a Rust process before any handler runs, so the
/// server never returns this code itself; it is kept so that supervisors see
/// the same code table.
pub const EXIT_MEMORY_ERROR: i32 = -3;

/// Exit code for a fault that could not be classified.
pub const EXIT_UNKNOWN_ERROR: i32 = -4;

/// Per-connection failures recorded by a worker.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Waiting for or reading request bytes failed.
    #[error("reception error: {0}")]
    Receive(#[source] io::Error),

    /// The request line grew past the accepted length.
    #[error("request exceeds {limit} bytes")]
    RequestTooLong { limit: usize },

    /// The request did not have exactly three tokens.
    #[error("invalid message format: {tokens} tokens")]
    Malformed { tokens: usize },

    /// The command was not `get`.
    #[error("invalid command: '{0}'")]
    InvalidCommand(String),

    /// The delay was not a non-negative integer.
    #[error("invalid delay: '{0}'")]
    InvalidDelay(String),

    /// The worker was cancelled while simulating the computation.
    #[error("cancelled while computing")]
    Cancelled,

    /// Writing the digest back failed.
    #[error("sending error: {0}")]
    Send(#[source] io::Error),
}

impl WorkerError {
    /// The OS error number captured with this failure, if any.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            WorkerError::Receive(err) | WorkerError::Send(err) => err.raw_os_error(),
            _ => None,
        }
    }
}

/// A specialized Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
