//! Error type shared by every fallible harvester operation.
//!
//! Only initialisation and configuration loading can fail. Once the pipeline
//! is running, word retrieval never reports an error: an empty pool is
//! expressed by the consumer continuing to poll.

use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by [`crate::Harvester::init`] and configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The sampling divider derived from the clock and target rate is not
    /// representable by the pacing timer (`1..=65535`).
    #[error(
        "sampling divider {divider} out of range 1..=65535 \
         (clock {clock_hz} Hz, sample rate {sample_hz} Hz)"
    )]
    DividerOutOfRange {
        clock_hz: u32,
        sample_hz: u64,
        divider: u64,
    },

    /// No free transfer channel or pacing timer left to claim.
    #[error("no unused {0} available")]
    ResourcesExhausted(&'static str),

    /// A configuration value is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Reading or parsing a configuration file failed.
    #[error("failed to load config from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
