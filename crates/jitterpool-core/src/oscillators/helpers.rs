//! Shared helpers used by the oscillator implementations.

// ---------------------------------------------------------------------------
// High-resolution timing
// ---------------------------------------------------------------------------

/// High-resolution timestamp in nanoseconds.
///
/// On macOS, this reads the ARM system counter directly via `mach_absolute_time()`.
/// On other platforms, it falls back to `std::time::Instant` relative to a
/// process-local epoch.
#[cfg(target_os = "macos")]
pub fn mach_time() -> u64 {
    unsafe extern "C" {
        fn mach_absolute_time() -> u64;
    }
    // SAFETY: mach_absolute_time() is a stable macOS API that returns the
    // current value of the system absolute time counter. Always safe to call.
    unsafe { mach_absolute_time() }
}

#[cfg(not(target_os = "macos"))]
pub fn mach_time() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as u64
}

// ---------------------------------------------------------------------------
// Bit packing
// ---------------------------------------------------------------------------

/// Pack a stream of individual bits (0 or 1) into bytes (MSB-first packing).
///
/// A trailing partial chunk is packed into the high bits of the last byte.
pub fn pack_bits_into_bytes(bits: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(bits.len().div_ceil(8));
    for chunk in bits.chunks(8) {
        let mut byte = 0u8;
        for (i, &bit) in chunk.iter().enumerate() {
            byte |= ((bit & 1) as u8) << (7 - i);
        }
        bytes.push(byte);
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mach_time_is_monotonic() {
        let a = mach_time();
        let b = mach_time();
        assert!(b >= a);
    }

    #[test]
    fn pack_bits_msb_first() {
        assert_eq!(pack_bits_into_bytes(&[1, 0, 0, 0, 0, 0, 0, 1]), vec![0x81]);
        assert_eq!(pack_bits_into_bytes(&[1, 1]), vec![0xC0]);
        assert!(pack_bits_into_bytes(&[]).is_empty());
    }

    #[test]
    fn pack_bits_ignores_high_bits() {
        assert_eq!(pack_bits_into_bytes(&[3, 2, 0, 0, 0, 0, 0, 0]), vec![0x80]);
    }
}
