//! The harvesting pipeline as one owned object.
//!
//! Sources → Sampler (paced bits) → CRC-32 accumulator → Pool writer →
//! double-buffered pool → consumers.
//!
//! A [`Harvester`] owns every stage. [`Harvester::init`] claims the engines
//! it needs, derives the sampling divider and starts production; calling it
//! again only re-derives and re-applies the rate. Dropping the harvester
//! stops the engine and releases its claims.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::config::HarvesterConfig;
use crate::error::{Error, Result};
use crate::oscillator::Oscillator;
use crate::pool::{DEFAULT_POOL_SIZE, EntropyPool, PoolStats};
use crate::rate::{Divider, SampleRate, derive_divider};
use crate::resources::{Claim, ResourceRegistry};
use crate::sampler::{Sampler, StoreStage};
use crate::word::WordSource;

#[derive(Default)]
struct InitState {
    claims: Vec<Claim>,
    divider: Option<Divider>,
}

/// Oscillator entropy harvester with a `SIZE`-word pool.
///
/// `SIZE == 1` disables pooling: consumers wait on the sampler directly.
pub struct Harvester<const SIZE: usize = DEFAULT_POOL_SIZE> {
    oscillator: Arc<dyn Oscillator>,
    config: HarvesterConfig,
    pool: Arc<EntropyPool<SIZE>>,
    // Declared before `state` so the engine is joined before claims drop.
    sampler: Sampler,
    state: Mutex<InitState>,
    registry: Arc<ResourceRegistry>,
}

impl<const SIZE: usize> Harvester<SIZE> {
    /// Build an idle harvester that claims from the process-wide registry.
    pub fn new(oscillator: impl Oscillator + 'static, config: HarvesterConfig) -> Result<Self> {
        Self::with_registry(oscillator, config, ResourceRegistry::global())
    }

    /// Build an idle harvester that claims from `registry`.
    pub fn with_registry(
        oscillator: impl Oscillator + 'static,
        config: HarvesterConfig,
        registry: Arc<ResourceRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        let harvester = Self {
            oscillator: Arc::new(oscillator),
            config,
            pool: Arc::new(EntropyPool::new()),
            sampler: Sampler::new(),
            state: Mutex::new(InitState::default()),
            registry,
        };
        if harvester.config.maximize_rate {
            harvester.maximize_source_rate();
        }
        Ok(harvester)
    }

    /// Reconfigure the oscillator for maximum output rate. Call before
    /// [`init`](Self::init); a running pipeline keeps its old divider until
    /// `init` is called again.
    pub fn maximize_source_rate(&self) {
        if self.is_initialized() {
            log::warn!("maximizing oscillator rate after init; call init again to re-derive the rate");
        }
        self.oscillator.maximize_rate();
    }

    /// Derive the sampling divider and start (or retune) production.
    ///
    /// A non-positive rate (or [`SampleRate::Auto`]) samples at 1/16th of the
    /// measured oscillator frequency. The first successful call claims one
    /// pacing timer and one transfer channel, plus a second channel when
    /// pooling, then starts the engine. Later calls only re-apply the rate.
    pub fn init(&self, rate: impl Into<SampleRate>) -> Result<Divider> {
        let rate = rate.into();
        let oscillator_khz = match rate {
            SampleRate::Auto => self.oscillator.frequency_khz(),
            SampleRate::Hz(_) => 0,
        };
        let divider = derive_divider(self.config.clock_hz, rate, oscillator_khz)?;

        let mut state = self.lock();
        if state.claims.is_empty() {
            let timer = self.registry.claim_timer()?;
            let sample_channel = self.registry.claim_channel()?;
            let store_channel = if EntropyPool::<SIZE>::is_unpooled() {
                None
            } else {
                Some(self.registry.claim_channel()?)
            };

            let store = if store_channel.is_some() {
                Some(StoreStage {
                    writer: self
                        .pool
                        .writer()
                        .ok_or_else(|| Error::Config("pool writer already taken".into()))?,
                    policy: self.config.overrun,
                })
            } else {
                None
            };
            self.sampler.launch(
                format!("jitterpool-ch{}", sample_channel.id()),
                Arc::clone(&self.oscillator),
                divider,
                store,
            )?;

            log::info!(
                "{} harvester started: divider {} ({:.0} Hz sampling), pool {}, overrun {}",
                self.oscillator.name(),
                divider.get(),
                divider.sample_hz(),
                SIZE,
                self.config.overrun
            );
            state.claims.push(timer);
            state.claims.push(sample_channel);
            state.claims.extend(store_channel);
        } else {
            self.sampler.set_divider(divider);
            log::debug!(
                "sampling divider re-applied: {} ({:.0} Hz)",
                divider.get(),
                divider.sample_hz()
            );
        }

        state.divider = Some(divider);
        Ok(divider)
    }

    /// [`init`](Self::init) with the configured sample rate.
    pub fn init_from_config(&self) -> Result<Divider> {
        self.init(self.config.sample_rate())
    }

    /// One fresh 32-bit word; busy-waits until one is available.
    pub fn get_32(&self) -> u32 {
        WordSource::get_32(self)
    }

    /// Two fresh words, the first in the high half.
    pub fn get_64(&self) -> u64 {
        WordSource::get_64(self)
    }

    /// Whether [`init`](Self::init) has started the pipeline.
    pub fn is_initialized(&self) -> bool {
        !self.lock().claims.is_empty()
    }

    /// Divider currently applied, if initialised.
    pub fn divider(&self) -> Option<Divider> {
        self.lock().divider
    }

    pub fn config(&self) -> &HarvesterConfig {
        &self.config
    }

    pub fn oscillator(&self) -> &dyn Oscillator {
        self.oscillator.as_ref()
    }

    pub fn pool(&self) -> &EntropyPool<SIZE> {
        &self.pool
    }

    /// Pipeline health as structured data.
    pub fn health_report(&self) -> HealthReport {
        let state = self.lock();
        HealthReport {
            oscillator: self.oscillator.name().to_string(),
            initialized: !state.claims.is_empty(),
            claimed_engines: state.claims.iter().map(Claim::id).collect(),
            divider: state.divider.map(Divider::get),
            sample_hz: state.divider.map(Divider::sample_hz),
            clock_hz: self.config.clock_hz,
            batches: self.sampler.batches(),
            pool: self.pool.stats(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InitState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<const SIZE: usize> WordSource for Harvester<SIZE> {
    fn get_32(&self) -> u32 {
        if EntropyPool::<SIZE>::is_unpooled() {
            self.pool.take_direct(&self.sampler)
        } else {
            self.pool.take()
        }
    }
}

impl<const SIZE: usize> rand::RngCore for Harvester<SIZE> {
    fn next_u32(&mut self) -> u32 {
        WordSource::get_32(self)
    }

    fn next_u64(&mut self) -> u64 {
        WordSource::get_64(self)
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        WordSource::fill_bytes(self, dst)
    }
}

/// Snapshot of pipeline state.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Oscillator name.
    pub oscillator: String,
    /// Whether the pipeline has been started.
    pub initialized: bool,
    /// Indices of claimed engines: timer, sample channel, store channel.
    pub claimed_engines: Vec<u8>,
    /// Pacing divider, if initialised.
    pub divider: Option<u16>,
    /// Effective sampling rate in Hz, if initialised.
    pub sample_hz: Option<f64>,
    /// Clock the divider applies to.
    pub clock_hz: u32,
    /// Completed sampling batches.
    pub batches: u64,
    /// Pool counters.
    pub pool: PoolStats,
}
