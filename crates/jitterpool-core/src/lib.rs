//! # jitterpool-core
//!
//! **Whitened entropy words from a free-running, jitter-prone oscillator.**
//!
//! `jitterpool-core` samples one noisy bit at a time from an oscillator, folds
//! the bits into a running CRC-32 and hands the resulting 32-bit words to any
//! number of concurrent consumers through a small lock-guarded pool.
//!
//! ## Quick Start
//!
//! ```no_run
//! use jitterpool_core::{Harvester, HarvesterConfig, JitterOscillator};
//!
//! let harvester: Harvester = Harvester::new(JitterOscillator::default(), HarvesterConfig::default())?;
//! harvester.maximize_source_rate();
//! harvester.init(0)?; // 0 = derive the rate from the oscillator frequency
//!
//! let a = harvester.get_32();
//! let b = harvester.get_64();
//! println!("{a:08x} {b:016x}");
//! # Ok::<(), jitterpool_core::Error>(())
//! ```
//!
//! ## Architecture
//!
//! Oscillator → Sampler (paced, 100 bits/word) → CRC-32 → Pool writer → Pool → Consumers
//!
//! - The sampler runs on its own engine thread, paced by a divider derived
//!   from the system clock.
//! - The CRC-32 accumulator is never reset between words, so every word
//!   depends on all earlier samples.
//! - The pool is a power-of-two ring of words plus a shadow copy. A slot is
//!   fresh while its two copies differ. Consumers claim slots in order under
//!   a lock, so no word is ever handed out twice.
//! - A pool size of one skips the ring: consumers read the sampler directly.
//!
//! Output is not cryptographically conditioned. Treat it as a seed source.

pub mod checksum;
pub mod config;
pub mod error;
pub mod harvester;
pub mod oscillator;
pub mod oscillators;
pub mod pool;
pub mod quality;
pub mod rate;
pub mod resources;
pub mod sampler;
pub mod word;

pub use checksum::ChecksumAccumulator;
pub use config::{DEFAULT_CLOCK_HZ, HarvesterConfig};
pub use error::{Error, Result};
pub use harvester::{Harvester, HealthReport};
pub use oscillator::{Oscillator, OscillatorInfo};
pub use oscillators::{JitterOscillator, ScriptedOscillator, collect_raw_bits, detect_oscillator};
pub use pool::{BatchSampler, DEFAULT_POOL_SIZE, EntropyPool, OverrunPolicy, PoolStats, RingWriter};
pub use quality::{QualityReport, quick_min_entropy, quick_quality, quick_shannon};
pub use rate::{Divider, SampleRate, derive_divider};
pub use resources::{Claim, ResourceRegistry};
pub use sampler::{SAMPLES_PER_WORD, Sampler, StoreStage};
pub use word::WordSource;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
