//! CPU jitter oscillator.
//!
//! **Raw output characteristics:** one LSB of a high-resolution timer delta
//! per sample. Adjacent samples are correlated when read back to back, which
//! is why the default sampling rate is a fraction of the measured read rate.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use super::helpers::mach_time;
use crate::oscillator::{Oscillator, OscillatorInfo};

/// Micro-workload iterations between the two timer reads of one sample.
const DEFAULT_WORKLOAD: u32 = 7;

/// Frequency counter gate time.
const GATE: Duration = Duration::from_millis(2);

/// Free-running software oscillator built from CPU timing jitter.
///
/// Each sample brackets a short, variable-length multiply chain with two
/// timer reads; the lowest bit of the delta flips unpredictably with pipeline
/// state, cache state and interrupt arrival.
pub struct JitterOscillator {
    workload: AtomicU32,
}

static CPU_JITTER_INFO: OscillatorInfo = OscillatorInfo {
    name: "cpu_jitter",
    description: "LSB of timer deltas around a variable micro-workload",
    physics: "Reads the high-resolution system counter on both sides of a short \
              multiply chain. The exact cycle count of the chain depends on \
              instruction scheduling, branch prediction, cache state, \
              interrupt coalescing and power-state transitions, so the lowest \
              bit of the delta behaves like the phase of a jittery ring \
              oscillator.",
    deterministic: false,
};

impl Default for JitterOscillator {
    fn default() -> Self {
        Self {
            workload: AtomicU32::new(DEFAULT_WORKLOAD),
        }
    }
}

impl JitterOscillator {
    /// Current micro-workload length; `0` once maximized.
    pub fn workload(&self) -> u32 {
        self.workload.load(Ordering::Relaxed)
    }
}

impl Oscillator for JitterOscillator {
    fn info(&self) -> &OscillatorInfo {
        &CPU_JITTER_INFO
    }

    fn is_available(&self) -> bool {
        // The counter must actually tick between reads.
        let first = mach_time();
        (0..10_000).any(|_| mach_time() != first)
    }

    fn sample_bit(&self) -> u32 {
        let t0 = mach_time();

        let workload = self.workload.load(Ordering::Relaxed);
        if workload > 0 {
            let iterations = (t0 % u64::from(workload)) + 1;
            let mut sink = t0;
            for _ in 0..iterations {
                sink = sink.wrapping_mul(6364136223846793005).wrapping_add(1);
            }
            std::hint::black_box(sink);
        }

        let t1 = mach_time();
        (t1.wrapping_sub(t0) & 1) as u32
    }

    fn frequency_khz(&self) -> u32 {
        let start = Instant::now();
        let mut reads: u64 = 0;
        while start.elapsed() < GATE {
            std::hint::black_box(self.sample_bit());
            reads += 1;
        }
        let khz = reads * 1000 / GATE.as_micros() as u64;
        khz.min(u64::from(u32::MAX)) as u32
    }

    fn maximize_rate(&self) {
        self.workload.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info() {
        let osc = JitterOscillator::default();
        assert_eq!(osc.name(), "cpu_jitter");
        assert!(!osc.info().deterministic);
    }

    #[test]
    fn samples_are_single_bits() {
        let osc = JitterOscillator::default();
        for _ in 0..1000 {
            assert!(osc.sample_bit() <= 1);
        }
    }

    #[test]
    fn frequency_is_measurable() {
        let osc = JitterOscillator::default();
        assert!(osc.frequency_khz() > 0);
    }

    #[test]
    fn maximize_drops_workload() {
        let osc = JitterOscillator::default();
        assert_eq!(osc.workload(), DEFAULT_WORKLOAD);
        osc.maximize_rate();
        assert_eq!(osc.workload(), 0);
        assert!(osc.sample_bit() <= 1);
    }

    #[test]
    #[ignore] // Run with: cargo test -- --ignored
    fn produces_both_bit_values() {
        let osc = JitterOscillator::default();
        let ones: u32 = (0..10_000).map(|_| osc.sample_bit()).sum();
        assert!(ones > 0 && ones < 10_000, "stuck oscillator: {ones} ones");
    }
}
