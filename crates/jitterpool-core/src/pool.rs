//! Double-buffered word pool with a lock-guarded claim step.
//!
//! Layout:
//! 1. `primary` is a ring written only by the pool writer, one whitened word
//!    per finished sampling batch.
//! 2. `secondary` shadows it and is written only by consumers. A slot whose
//!    two entries differ holds a fresh word; equal entries mean the word was
//!    already claimed (or nothing was produced there yet).
//! 3. `cursor` is the next slot to claim. Consumers spin on the slot it
//!    points at without the lock, then take the lock to re-check, mark the
//!    slot consumed and advance.
//!
//! Words are therefore handed out in production order and never twice.
//! The writer's ring index runs independently of the cursor; production must
//! not lap it (see [`OverrunPolicy`]).
//!
//! With a pool size of one there is no ring: consumers read the sampler's
//! checksum directly ([`EntropyPool::take_direct`]).

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::word::WordSource;

/// Pool size used when none is given.
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Spin iterations before a waiting consumer starts yielding its timeslice.
const SPINS_BEFORE_YIELD: u32 = 64;

/// What the pool writer does when the next ring slot still holds an
/// unclaimed word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrunPolicy {
    /// Hold the finished word until a consumer claims the slot.
    #[default]
    Wait,
    /// Overwrite the slot, count an overrun and log a warning.
    Overwrite,
}

impl std::fmt::Display for OverrunPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wait => write!(f, "wait"),
            Self::Overwrite => write!(f, "overwrite"),
        }
    }
}

/// The batch-sampling engine as seen by a consumer in unpooled mode.
pub trait BatchSampler {
    /// Whether a sampling batch is still in progress.
    fn is_busy(&self) -> bool;

    /// Current accumulator value. Only meaningful while not busy.
    fn checksum(&self) -> u32;

    /// Arm the next batch.
    fn start(&self);
}

/// Spin, then yield. Never sleeps or blocks.
pub(crate) struct Backoff {
    spins: u32,
}

impl Backoff {
    pub(crate) fn new() -> Self {
        Self { spins: 0 }
    }

    pub(crate) fn snooze(&mut self) {
        if self.spins < SPINS_BEFORE_YIELD {
            std::hint::spin_loop();
            self.spins += 1;
        } else {
            std::thread::yield_now();
        }
    }
}

/// Thread-safe double-buffered pool of 32-bit words.
///
/// `SIZE` must be a power of two; this is checked at compile time.
pub struct EntropyPool<const SIZE: usize = DEFAULT_POOL_SIZE> {
    primary: [AtomicU32; SIZE],
    secondary: [AtomicU32; SIZE],
    cursor: AtomicUsize,
    /// Guards writes to `cursor` and `secondary`.
    claim_lock: Mutex<()>,
    writer_taken: AtomicBool,
    produced: AtomicU64,
    claimed: AtomicU64,
    overruns: AtomicU64,
}

impl<const SIZE: usize> Default for EntropyPool<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize> EntropyPool<SIZE> {
    const SIZE_IS_POWER_OF_TWO: () = assert!(
        SIZE.is_power_of_two(),
        "pool size must be a non-zero power of two"
    );

    /// Create an empty pool with the cursor at slot 0.
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::SIZE_IS_POWER_OF_TWO;
        Self {
            primary: [const { AtomicU32::new(0) }; SIZE],
            secondary: [const { AtomicU32::new(0) }; SIZE],
            cursor: AtomicUsize::new(0),
            claim_lock: Mutex::new(()),
            writer_taken: AtomicBool::new(false),
            produced: AtomicU64::new(0),
            claimed: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
        }
    }

    /// Ring length.
    pub const fn capacity() -> usize {
        SIZE
    }

    /// Whether this pool runs without a ring (`SIZE == 1`).
    pub const fn is_unpooled() -> bool {
        SIZE == 1
    }

    /// Take the pool's single writer. Returns `None` once it has been taken.
    pub fn writer(self: &Arc<Self>) -> Option<RingWriter<SIZE>> {
        if self.writer_taken.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(RingWriter {
            pool: Arc::clone(self),
            write_idx: 0,
        })
    }

    /// Claim the next fresh word, busy-waiting until one lands.
    pub fn take(&self) -> u32 {
        let mut backoff = Backoff::new();
        loop {
            // Poll without the lock; production may lag demand.
            loop {
                let idx = self.cursor.load(Ordering::Acquire);
                if self.is_pending(idx) {
                    break;
                }
                backoff.snooze();
            }

            if let Some(word) = self.claim_locked() {
                return word;
            }
            // Another consumer won the race for this slot.
        }
    }

    /// Claim the word at the cursor if one is fresh, without waiting.
    pub fn try_take(&self) -> Option<u32> {
        let idx = self.cursor.load(Ordering::Acquire);
        if !self.is_pending(idx) {
            return None;
        }
        self.claim_locked()
    }

    fn claim_locked(&self) -> Option<u32> {
        let _guard = self.lock();
        let idx = self.cursor.load(Ordering::Relaxed);
        let word = self.primary[idx].load(Ordering::Acquire);
        if word == self.secondary[idx].load(Ordering::Relaxed) {
            return None;
        }
        self.secondary[idx].store(word, Ordering::Release);
        self.cursor.store((idx + 1) & (SIZE - 1), Ordering::Release);
        self.claimed.fetch_add(1, Ordering::Relaxed);
        Some(word)
    }

    /// Unpooled claim: wait for the sampler's batch to finish, read its
    /// checksum and re-arm it, all under the pool lock.
    pub fn take_direct<S: BatchSampler + ?Sized>(&self, sampler: &S) -> u32 {
        let mut backoff = Backoff::new();
        loop {
            while sampler.is_busy() {
                backoff.snooze();
            }

            let _guard = self.lock();
            if !sampler.is_busy() {
                let word = sampler.checksum();
                sampler.start();
                self.produced.fetch_add(1, Ordering::Relaxed);
                self.claimed.fetch_add(1, Ordering::Relaxed);
                return word;
            }
        }
    }

    /// Whether `slot` holds an unclaimed word.
    pub fn is_pending(&self, slot: usize) -> bool {
        let slot = slot & (SIZE - 1);
        self.primary[slot].load(Ordering::Acquire) != self.secondary[slot].load(Ordering::Acquire)
    }

    /// Number of slots holding unclaimed words.
    pub fn pending(&self) -> usize {
        (0..SIZE).filter(|&slot| self.is_pending(slot)).count()
    }

    /// Slot the next claim will take.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Counter snapshot.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: SIZE,
            produced: self.produced.load(Ordering::Relaxed),
            claimed: self.claimed.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            pending: if Self::is_unpooled() { 0 } else { self.pending() },
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.claim_lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<const SIZE: usize> WordSource for EntropyPool<SIZE> {
    fn get_32(&self) -> u32 {
        self.take()
    }
}

/// The only handle allowed to write `primary`.
///
/// Its ring index starts at slot 0, wraps at `SIZE` and never looks at the
/// consumer cursor.
pub struct RingWriter<const SIZE: usize> {
    pool: Arc<EntropyPool<SIZE>>,
    write_idx: usize,
}

impl<const SIZE: usize> RingWriter<SIZE> {
    /// Slot the next [`store`](Self::store) writes.
    pub fn write_index(&self) -> usize {
        self.write_idx
    }

    /// Whether the next slot still holds an unclaimed word.
    pub fn slot_pending(&self) -> bool {
        self.pool.is_pending(self.write_idx)
    }

    /// Write `word` into the next slot and advance. Returns `true` when an
    /// unclaimed word was overwritten.
    ///
    /// The overrun check races with consumers, so a word claimed in the same
    /// instant may still be reported as overrun.
    pub fn store(&mut self, word: u32) -> bool {
        let idx = self.write_idx;
        let overran = self.pool.is_pending(idx);
        self.pool.primary[idx].store(word, Ordering::Release);
        self.write_idx = (idx + 1) & (SIZE - 1);
        self.pool.produced.fetch_add(1, Ordering::Relaxed);
        if overran {
            self.pool.overruns.fetch_add(1, Ordering::Relaxed);
        }
        overran
    }

    /// The pool this writer fills.
    pub fn pool(&self) -> &Arc<EntropyPool<SIZE>> {
        &self.pool
    }
}

/// Pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Ring length.
    pub size: usize,
    /// Words produced into the pool (or read directly when unpooled).
    pub produced: u64,
    /// Words handed to consumers.
    pub claimed: u64,
    /// Unclaimed words overwritten by the writer.
    pub overruns: u64,
    /// Slots currently holding unclaimed words.
    pub pending: usize,
}
