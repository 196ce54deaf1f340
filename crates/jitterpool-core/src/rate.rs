//! Sampling rate derivation and software pacing.
//!
//! The sampler reads the oscillator once per tick of a pacing timer that
//! divides the system clock by an integer in `1..=65535`. The divider is
//! derived from a requested sample rate, or from the measured oscillator
//! frequency when no rate is given.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest divider the pacing timer accepts.
pub const MAX_DIVIDER: u64 = 0xFFFF;

/// Automatic sampling runs at this fraction of the oscillator frequency.
/// Sampling at 1/16th of the oscillator removes most of the correlation
/// between consecutive bits.
pub const AUTO_RATE_FRACTION: u64 = 16;

/// Remaining wait above which the pacer sleeps instead of spinning.
const SLEEP_THRESHOLD: Duration = Duration::from_micros(500);

/// Requested sampling rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleRate {
    /// Derive from the measured oscillator frequency.
    #[default]
    Auto,
    /// Fixed rate in Hz.
    Hz(u32),
}

impl SampleRate {
    /// Map a signed rate to a [`SampleRate`]; zero or negative means automatic.
    pub fn from_hz(hz: i64) -> Self {
        if hz <= 0 {
            Self::Auto
        } else {
            Self::Hz(hz.min(i64::from(u32::MAX)) as u32)
        }
    }

    /// Resolve to a concrete rate in Hz given the oscillator frequency.
    pub fn resolve(self, oscillator_khz: u32) -> u64 {
        match self {
            Self::Auto => u64::from(oscillator_khz) * 1000 / AUTO_RATE_FRACTION,
            Self::Hz(hz) => u64::from(hz),
        }
    }
}

impl From<i64> for SampleRate {
    fn from(hz: i64) -> Self {
        Self::from_hz(hz)
    }
}

impl From<i32> for SampleRate {
    fn from(hz: i32) -> Self {
        Self::from_hz(i64::from(hz))
    }
}

impl std::fmt::Display for SampleRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Hz(hz) => write!(f, "{hz} Hz"),
        }
    }
}

/// A validated pacing timer divider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Divider {
    divider: u16,
    clock_hz: u32,
}

impl Divider {
    /// Raw divider value, always in `1..=65535`.
    pub fn get(self) -> u16 {
        self.divider
    }

    /// System clock the divider applies to.
    pub fn clock_hz(self) -> u32 {
        self.clock_hz
    }

    /// Effective sampling rate in Hz.
    pub fn sample_hz(self) -> f64 {
        f64::from(self.clock_hz) / f64::from(self.divider)
    }

    /// Time between two samples.
    pub fn period(self) -> Duration {
        let nanos = u64::from(self.divider) * 1_000_000_000 / u64::from(self.clock_hz);
        Duration::from_nanos(nanos)
    }
}

/// Derive the pacing divider for `rate` on a `clock_hz` system clock.
///
/// Out-of-range results are errors, never clamped.
pub fn derive_divider(clock_hz: u32, rate: SampleRate, oscillator_khz: u32) -> Result<Divider> {
    let sample_hz = rate.resolve(oscillator_khz);
    if sample_hz == 0 {
        return Err(Error::Config(format!(
            "sampling rate resolved to 0 Hz (requested {rate}, oscillator {oscillator_khz} kHz)"
        )));
    }

    let divider = u64::from(clock_hz) / sample_hz;
    if !(1..=MAX_DIVIDER).contains(&divider) {
        return Err(Error::DividerOutOfRange {
            clock_hz,
            sample_hz,
            divider,
        });
    }

    Ok(Divider {
        divider: divider as u16,
        clock_hz,
    })
}

/// Software stand-in for the timer that paces sampling.
///
/// Ticks are spaced `period` apart. A pacer that falls more than one period
/// behind resynchronises to the current time rather than bursting.
pub struct Pacer {
    period: Duration,
    next: Instant,
}

impl Pacer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next: Instant::now(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
    }

    /// Wait for the next tick.
    pub fn wait_tick(&mut self) {
        let mut now = Instant::now();
        if self.next > now {
            let remaining = self.next - now;
            if remaining > SLEEP_THRESHOLD {
                std::thread::sleep(remaining - SLEEP_THRESHOLD);
            }
            while now < self.next {
                std::hint::spin_loop();
                now = Instant::now();
            }
        }

        self.next = if now - self.next > self.period {
            now + self.period
        } else {
            self.next + self.period
        };
    }
}
