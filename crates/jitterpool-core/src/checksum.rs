//! Running CRC-32 whitening accumulator.
//!
//! Every raw sample the sampler reads is folded into one long-running CRC-32.
//! The value is never reset between words, so each pool word depends on its
//! own batch of bits and on all history before it.

use std::sync::Mutex;

use flate2::Crc;

/// Thread-safe running CRC-32 over a stream of 32-bit samples.
pub struct ChecksumAccumulator {
    crc: Mutex<Crc>,
}

impl Default for ChecksumAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChecksumAccumulator {
    /// Create an accumulator holding zero.
    pub fn new() -> Self {
        Self {
            crc: Mutex::new(Crc::new()),
        }
    }

    /// Fold one sample (little-endian bytes) into the running checksum.
    pub fn feed(&self, sample: u32) {
        self.lock().update(&sample.to_le_bytes());
    }

    /// Current checksum value.
    pub fn value(&self) -> u32 {
        self.lock().sum()
    }

    /// Reset to zero.
    pub fn reset(&self) {
        self.lock().reset();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Crc> {
        // Crc state stays valid across a poisoning panic.
        self.crc.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(ChecksumAccumulator::new().value(), 0);
    }

    #[test]
    fn matches_crc32_of_le_bytes() {
        let acc = ChecksumAccumulator::new();
        acc.feed(1);
        acc.feed(0);

        let mut reference = Crc::new();
        reference.update(&[1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(acc.value(), reference.sum());
    }

    #[test]
    fn history_carries_across_batches() {
        // Same batch, different prior history -> different word.
        let batch = [1, 0, 1, 0];
        let fresh = ChecksumAccumulator::new();
        batch.iter().for_each(|&b| fresh.feed(b));

        let primed = ChecksumAccumulator::new();
        primed.feed(1);
        batch.iter().for_each(|&b| primed.feed(b));

        assert_ne!(fresh.value(), primed.value());
    }

    #[test]
    fn reset_returns_to_zero() {
        let acc = ChecksumAccumulator::new();
        acc.feed(1);
        assert_ne!(acc.value(), 0);
        acc.reset();
        assert_eq!(acc.value(), 0);
    }
}
