//! Request types for the digest protocol.
//!
//! A request is one line of exactly three whitespace-separated tokens:
//! `<command> <text> <delay>`. Parsing only checks the shape; the command
//! and delay are validated when the digest actually has to be computed,
//! since a cache hit never looks at them.

use std::time::Duration;

use crate::error::WorkerError;
use crate::utils::{buffer_to_array, is_number};

/// Commands understood by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Compute (or recall) the digest of the text.
    Get,
    /// Anything else, lowercased.
    Unknown(String),
}

impl Command {
    /// Parse a command from a string (case-insensitive).
    pub fn get(s: &str) -> Command {
        match s.to_lowercase().as_str() {
            "get" => Command::Get,
            other => Command::Unknown(other.to_string()),
        }
    }

    /// Get the string representation of this command.
    pub fn as_str(&self) -> &str {
        match self {
            Command::Get => "get",
            Command::Unknown(name) => name,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    /// The cache key and digest input.
    pub text: String,
    /// The raw delay token, in milliseconds.
    pub delay: String,
}

impl Request {
    /// Parse a request line. Fails unless there are exactly three tokens.
    pub fn parse(line: &[u8]) -> Result<Request, WorkerError> {
        let tokens = buffer_to_array(line);
        match <[String; 3]>::try_from(tokens) {
            Ok([command, text, delay]) => Ok(Request {
                command: Command::get(&command),
                text,
                delay,
            }),
            Err(tokens) => Err(WorkerError::Malformed {
                tokens: tokens.len(),
            }),
        }
    }

    /// Check that this request may be computed and return its delay.
    pub fn computation_delay(&self) -> Result<Duration, WorkerError> {
        if self.command != Command::Get {
            return Err(WorkerError::InvalidCommand(self.command.to_string()));
        }
        if !is_number(&self.delay) {
            return Err(WorkerError::InvalidDelay(self.delay.clone()));
        }
        self.delay
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| WorkerError::InvalidDelay(self.delay.clone()))
    }
}
