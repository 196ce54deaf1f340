//! Oscillator implementations.

pub mod helpers;

pub mod jitter;
pub mod scripted;

use crate::oscillator::Oscillator;

pub use jitter::JitterOscillator;
pub use scripted::ScriptedOscillator;

/// Pick the oscillator to harvest on this machine, if any is usable.
///
/// Scripted oscillators are never returned here: they are reproducible by
/// construction and only meant for tests and dry runs.
pub fn detect_oscillator() -> Option<Box<dyn Oscillator>> {
    let jitter = JitterOscillator::default();
    if jitter.is_available() {
        return Some(Box::new(jitter));
    }
    log::warn!("{} oscillator unavailable on this machine", jitter.name());
    None
}

/// Read `n_bits` raw samples straight from an oscillator, bypassing the
/// whitening pipeline. Useful for judging the unprocessed bit stream.
pub fn collect_raw_bits(oscillator: &dyn Oscillator, n_bits: usize) -> Vec<u32> {
    (0..n_bits).map(|_| oscillator.sample_bit()).collect()
}
