//! Abstract oscillator trait.
//!
//! The harvester never looks inside the noise source. Everything it needs is
//! behind [`Oscillator`]: a single noisy bit, a frequency measurement used to
//! pick a sampling rate, and a knob that pushes the generator to its fastest
//! setting.

use std::sync::Arc;

/// Metadata about an oscillator.
#[derive(Debug, Clone)]
pub struct OscillatorInfo {
    /// Unique identifier (e.g. `"cpu_jitter"`).
    pub name: &'static str,
    /// One-line human-readable description.
    pub description: &'static str,
    /// Physics explanation of where the bit noise comes from.
    pub physics: &'static str,
    /// Whether the output is reproducible (scripted sources).
    pub deterministic: bool,
}

/// A free-running, jitter-prone oscillator whose instantaneous state can be
/// read as a single unpredictable bit.
pub trait Oscillator: Send + Sync {
    /// Oscillator metadata.
    fn info(&self) -> &OscillatorInfo;

    /// Check if this oscillator can run on the current machine.
    fn is_available(&self) -> bool;

    /// Read one raw sample. Only the lowest bit carries noise; the value is
    /// always `0` or `1`.
    fn sample_bit(&self) -> u32;

    /// Measure the current oscillator frequency in kHz.
    fn frequency_khz(&self) -> u32;

    /// Reconfigure the oscillator for maximum output rate.
    fn maximize_rate(&self);

    /// Convenience: name from info.
    fn name(&self) -> &'static str {
        self.info().name
    }
}

macro_rules! forward_oscillator {
    ($ptr:ident) => {
        impl<T: Oscillator + ?Sized> Oscillator for $ptr<T> {
            fn info(&self) -> &OscillatorInfo {
                (**self).info()
            }

            fn is_available(&self) -> bool {
                (**self).is_available()
            }

            fn sample_bit(&self) -> u32 {
                (**self).sample_bit()
            }

            fn frequency_khz(&self) -> u32 {
                (**self).frequency_khz()
            }

            fn maximize_rate(&self) {
                (**self).maximize_rate()
            }
        }
    };
}

forward_oscillator!(Box);
forward_oscillator!(Arc);
