//! Harvester configuration.
//!
//! Everything here is fixed for the life of a harvester except the sample
//! rate, which [`crate::Harvester::init`] re-derives on every call. Configs
//! can be built in code or loaded from JSON:
//!
//! ```json
//! { "clock_hz": 125000000, "sample_rate_hz": 0, "overrun": "wait", "maximize_rate": false }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pool::OverrunPolicy;
use crate::rate::SampleRate;

/// System clock of the reference platform.
pub const DEFAULT_CLOCK_HZ: u32 = 125_000_000;

/// Harvester settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    /// Clock the pacing divider is derived from.
    pub clock_hz: u32,
    /// Target sample rate in Hz; zero or negative derives it from the
    /// oscillator frequency.
    pub sample_rate_hz: i64,
    /// Writer behaviour when the pool ring is full.
    pub overrun: OverrunPolicy,
    /// Push the oscillator to its fastest setting before starting.
    pub maximize_rate: bool,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            clock_hz: DEFAULT_CLOCK_HZ,
            sample_rate_hz: 0,
            overrun: OverrunPolicy::default(),
            maximize_rate: false,
        }
    }
}

impl HarvesterConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let io_err = |source| Error::Io {
            path: path.to_path_buf(),
            source,
        };
        let text = std::fs::read_to_string(path).map_err(io_err)?;
        let config: Self =
            serde_json::from_str(&text).map_err(|e| io_err(std::io::Error::from(e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no pipeline can run with.
    pub fn validate(&self) -> Result<()> {
        if self.clock_hz == 0 {
            return Err(Error::Config("clock_hz must be greater than zero".into()));
        }
        Ok(())
    }

    /// The configured sample rate.
    pub fn sample_rate(&self) -> SampleRate {
        SampleRate::from_hz(self.sample_rate_hz)
    }
}
