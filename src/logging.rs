//! Logging setup.
//!
//! Components log through `tracing`; the binary installs one fmt subscriber
//! at startup. The numeric verbosity accepted on the command line (1 to 6)
//! maps onto tracing levels, and warnings and errors are always shown.

use std::error::Error;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Verbosity used when none is given.
pub const DEFAULT_VERBOSITY: u8 = 3;

/// The most verbose level that `verbosity` lets through.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0..=2 => LevelFilter::INFO,
        3 | 4 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the process-wide subscriber.
///
/// `RUST_LOG`, when set, overrides the level derived from `verbosity`.
pub fn init(verbosity: u8) -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    let filter = EnvFilter::builder()
        .with_default_directive(level_for(verbosity).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(false)
        .try_init()
}
