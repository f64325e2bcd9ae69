//! Command-line interface definitions.
//!
//! This module defines the server arguments and the client CLI using clap.

use clap::{Parser, Subcommand};
use std::time::Duration;

use crate::config::{
    CacheConfig, ServerConfig, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TIMEOUT_SECS, DEFAULT_PORT,
};
use crate::logging::DEFAULT_VERBOSITY;

/// Digest server.
///
/// Answers `get <text> <delay>` requests with the MD5 digest of `<text>`,
/// waiting `<delay>` milliseconds the first time a text is seen.
///
/// Signals: SIGUSR1 clears the cache, SIGUSR2 prints it, SIGTERM finishes
/// pending requests and stops, SIGINT cancels them and stops.
#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(author, version, about, long_about = None)]
pub struct ServerArgs {
    /// Logger level, from 1 (quiet) to 6 (everything).
    #[arg(short = 'l', long, default_value_t = DEFAULT_VERBOSITY,
          value_parser = clap::value_parser!(u8).range(1..=6))]
    pub log_level: u8,

    /// The server port number.
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT,
          value_parser = clap::value_parser!(u16).range(1024..=65535))]
    pub port: u16,

    /// Maximum number of cache entries. Zero disables the cache.
    #[arg(short = 'C', long, default_value_t = DEFAULT_CACHE_CAPACITY)]
    pub cache_capacity: usize,

    /// Seconds of inactivity after which a cache entry is discarded.
    /// Zero disables automatic discard.
    #[arg(short = 't', long, default_value_t = DEFAULT_CACHE_TIMEOUT_SECS)]
    pub cache_timeout: u64,
}

impl ServerArgs {
    /// Build the server configuration these arguments describe.
    pub fn into_config(self) -> ServerConfig {
        ServerConfig::new()
            .port(self.port)
            .cache(
                CacheConfig::new()
                    .capacity(self.cache_capacity)
                    .ttl(Duration::from_secs(self.cache_timeout))
                    .build(),
            )
            .build()
    }
}

/// Digest client.
///
/// A CLI tool for sending one request to the digest server.
#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Server host.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port.
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// The command to execute.
    #[clap(subcommand)]
    pub command: ClientCommand,
}

/// Available client commands.
#[derive(Subcommand, Debug)]
pub enum ClientCommand {
    /// Get the digest of a text.
    ///
    /// The server waits `delay` milliseconds before answering unless the
    /// digest is already cached.
    Get {
        /// The text to digest.
        text: String,
        /// Simulated computation time, in milliseconds.
        #[arg(default_value_t = 0)]
        delay: u64,
    },
}
