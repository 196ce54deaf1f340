//! Paced sampling engine with an optional chained store stage.
//!
//! Architecture (one dedicated thread per engine):
//! 1. Idle: parked until armed.
//! 2. Sampling: read [`SAMPLES_PER_WORD`] oscillator bits, one per pacing
//!    tick, folding each into the running CRC-32.
//! 3. Finished: without a store stage the engine clears `busy` and idles
//!    until a consumer re-arms it.
//! 4. Store (chained): copy the checksum into the next pool ring slot, then
//!    re-arm itself. The loop runs without any consumer involvement.
//!
//! The accumulator is zeroed once when the engine starts and never again.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{JoinHandle, Thread};
use std::time::Duration;

use crate::checksum::ChecksumAccumulator;
use crate::error::{Error, Result};
use crate::oscillator::Oscillator;
use crate::pool::{Backoff, BatchSampler, OverrunPolicy, RingWriter};
use crate::rate::{Divider, Pacer};

/// Raw bit samples folded into one output word.
pub const SAMPLES_PER_WORD: usize = 100;

/// How long an idle engine parks before re-checking for shutdown.
const IDLE_PARK: Duration = Duration::from_millis(10);

/// How long a store stage parks while waiting for a slot to be claimed.
const STALL_PARK: Duration = Duration::from_micros(50);

/// Chained store stage: where finished words go and what to do when the
/// next slot is still unclaimed.
pub struct StoreStage<const SIZE: usize> {
    pub writer: RingWriter<SIZE>,
    pub policy: OverrunPolicy,
}

struct Shared {
    accumulator: ChecksumAccumulator,
    busy: AtomicBool,
    stop: AtomicBool,
    period_nanos: AtomicU64,
    batches: AtomicU64,
}

impl Shared {
    fn period(&self) -> Duration {
        Duration::from_nanos(self.period_nanos.load(Ordering::Relaxed))
    }

    fn stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

/// Handle to a sampling engine.
///
/// A freshly created sampler reports itself busy: until [`Sampler::launch`]
/// runs, no batch ever finishes and consumers keep polling.
pub struct Sampler {
    shared: Arc<Shared>,
    waker: OnceLock<Thread>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                accumulator: ChecksumAccumulator::new(),
                busy: AtomicBool::new(true),
                stop: AtomicBool::new(false),
                period_nanos: AtomicU64::new(0),
                batches: AtomicU64::new(0),
            }),
            waker: OnceLock::new(),
            thread: Mutex::new(None),
        }
    }

    /// Start the engine thread and arm the first batch.
    ///
    /// With `store` the engine re-arms itself after every batch; without it
    /// consumers re-arm through [`BatchSampler::start`]. Launching twice is a
    /// no-op.
    pub fn launch<const SIZE: usize>(
        &self,
        name: String,
        oscillator: Arc<dyn Oscillator>,
        divider: Divider,
        store: Option<StoreStage<SIZE>>,
    ) -> Result<()> {
        let mut thread = self.thread.lock().unwrap_or_else(|e| e.into_inner());
        if thread.is_some() {
            return Ok(());
        }

        self.set_divider(divider);
        self.shared.accumulator.reset();
        self.shared.busy.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(move || run(&shared, oscillator.as_ref(), store))
            .map_err(|e| {
                log::error!("failed to spawn sampling engine: {e}");
                Error::ResourcesExhausted("engine thread")
            })?;

        let _ = self.waker.set(handle.thread().clone());
        *thread = Some(handle);
        Ok(())
    }

    /// Apply a new pacing divider. Takes effect from the next batch.
    pub fn set_divider(&self, divider: Divider) {
        let nanos = divider.period().as_nanos().min(u128::from(u64::MAX)) as u64;
        self.shared.period_nanos.store(nanos, Ordering::Relaxed);
    }

    /// Current time between samples.
    pub fn period(&self) -> Duration {
        self.shared.period()
    }

    /// Completed sampling batches.
    pub fn batches(&self) -> u64 {
        self.shared.batches.load(Ordering::Relaxed)
    }

    /// Whether the engine thread has been launched.
    pub fn is_running(&self) -> bool {
        self.waker.get().is_some()
    }

    fn wake(&self) {
        if let Some(thread) = self.waker.get() {
            thread.unpark();
        }
    }
}

impl BatchSampler for Sampler {
    fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::Acquire)
    }

    fn checksum(&self) -> u32 {
        self.shared.accumulator.value()
    }

    fn start(&self) {
        self.shared.busy.store(true, Ordering::Release);
        self.wake();
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.wake();
        let handle = self.thread.get_mut().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("sampling engine panicked");
            }
        }
    }
}

fn run<const SIZE: usize>(
    shared: &Shared,
    oscillator: &dyn Oscillator,
    mut store: Option<StoreStage<SIZE>>,
) {
    let mut pacer = Pacer::new(shared.period());
    log::debug!(
        "sampling engine up: {} samples/word, period {:?}, chained: {}",
        SAMPLES_PER_WORD,
        pacer.period(),
        store.is_some()
    );

    loop {
        while !shared.busy.load(Ordering::Acquire) {
            if shared.stopping() {
                return;
            }
            std::thread::park_timeout(IDLE_PARK);
        }

        pacer.set_period(shared.period());
        for _ in 0..SAMPLES_PER_WORD {
            if shared.stopping() {
                return;
            }
            pacer.wait_tick();
            shared.accumulator.feed(oscillator.sample_bit());
        }
        shared.batches.fetch_add(1, Ordering::Relaxed);

        let Some(stage) = store.as_mut() else {
            shared.busy.store(false, Ordering::Release);
            continue;
        };

        if stage.policy == OverrunPolicy::Wait {
            let mut backoff = Backoff::new();
            let mut spins = 0u32;
            while stage.writer.slot_pending() {
                if shared.stopping() {
                    return;
                }
                if spins < 128 {
                    backoff.snooze();
                    spins += 1;
                } else {
                    std::thread::park_timeout(STALL_PARK);
                }
            }
        }

        if stage.writer.store(shared.accumulator.value()) {
            let overruns = stage.writer.pool().stats().overruns;
            if overruns.is_power_of_two() {
                log::warn!(
                    "pool overrun: unclaimed word overwritten ({overruns} so far); \
                     lower the sample rate or grow the pool"
                );
            }
        }
    }
}
