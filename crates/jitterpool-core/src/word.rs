//! Consumer-facing word interface.

use std::sync::Arc;

/// Something that hands out fresh 32-bit entropy words.
///
/// `get_32` busy-waits until a word is available and never fails. The wider
/// accessors are built from sequential `get_32` calls and are not atomic as
/// a group: concurrent callers may interleave, which is harmless because
/// every word is independently valid.
pub trait WordSource {
    /// One fresh 32-bit word.
    fn get_32(&self) -> u32;

    /// Two words, the first one in the high half.
    fn get_64(&self) -> u64 {
        let high = u64::from(self.get_32());
        (high << 32) | u64::from(self.get_32())
    }

    /// Fill `out` with consecutive words.
    fn fill_words(&self, out: &mut [u32]) {
        for word in out {
            *word = self.get_32();
        }
    }

    /// Fill `out` with bytes taken from consecutive words (little-endian).
    fn fill_bytes(&self, out: &mut [u8]) {
        for chunk in out.chunks_mut(4) {
            let bytes = self.get_32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

impl<T: WordSource + ?Sized> WordSource for &T {
    fn get_32(&self) -> u32 {
        (**self).get_32()
    }
}

impl<T: WordSource + ?Sized> WordSource for Arc<T> {
    fn get_32(&self) -> u32 {
        (**self).get_32()
    }
}
