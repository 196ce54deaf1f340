//! Deterministic oscillator replaying a fixed bit pattern.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use crate::oscillator::{Oscillator, OscillatorInfo};

/// Replays `pattern` forever and reports a fixed frequency.
///
/// The pipeline output for a given pattern and sampling setup is fully
/// reproducible, which makes this the oscillator of choice for tests.
pub struct ScriptedOscillator {
    pattern: Vec<u32>,
    position: AtomicUsize,
    khz: AtomicU32,
    maximized: AtomicBool,
}

static SCRIPTED_INFO: OscillatorInfo = OscillatorInfo {
    name: "scripted",
    description: "Replays a fixed bit pattern",
    physics: "None. The bit stream is a recorded or synthetic pattern.",
    deterministic: true,
};

impl ScriptedOscillator {
    /// Replay the low bit of each entry in `pattern`, reporting `frequency_khz`.
    pub fn new(pattern: Vec<u32>, frequency_khz: u32) -> Self {
        Self {
            pattern,
            position: AtomicUsize::new(0),
            khz: AtomicU32::new(frequency_khz),
            maximized: AtomicBool::new(false),
        }
    }

    /// `0, 1, 0, 1, ...` at a nominal 6 MHz.
    pub fn alternating() -> Self {
        Self::new(vec![0, 1], 6_000)
    }

    /// Change the frequency reported by [`Oscillator::frequency_khz`].
    pub fn set_frequency_khz(&self, khz: u32) {
        self.khz.store(khz, Ordering::Relaxed);
    }

    /// Number of samples read so far.
    pub fn samples_read(&self) -> usize {
        self.position.load(Ordering::Relaxed)
    }

    /// Whether [`Oscillator::maximize_rate`] was called.
    pub fn is_maximized(&self) -> bool {
        self.maximized.load(Ordering::Relaxed)
    }
}

impl Oscillator for ScriptedOscillator {
    fn info(&self) -> &OscillatorInfo {
        &SCRIPTED_INFO
    }

    fn is_available(&self) -> bool {
        true
    }

    fn sample_bit(&self) -> u32 {
        if self.pattern.is_empty() {
            return 0;
        }
        let i = self.position.fetch_add(1, Ordering::Relaxed);
        self.pattern[i % self.pattern.len()] & 1
    }

    fn frequency_khz(&self) -> u32 {
        self.khz.load(Ordering::Relaxed)
    }

    fn maximize_rate(&self) {
        self.maximized.store(true, Ordering::Relaxed);
    }
}
