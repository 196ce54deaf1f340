//! Integration tests for jitterpool-core.
//!
//! These tests drive the full pipeline:
//! oscillator → paced sampling → CRC-32 whitening → pool → consumers.
//!
//! Scripted oscillators make the output reproducible, so words can be checked
//! against a CRC computed independently of the harvester.

use std::collections::HashSet;
use std::sync::Arc;

use jitterpool_core::{
    ChecksumAccumulator, Error, Harvester, HarvesterConfig, OverrunPolicy, ResourceRegistry,
    SAMPLES_PER_WORD, SampleRate, ScriptedOscillator, WordSource, derive_divider,
    detect_oscillator, quick_shannon,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// 1 GHz clock so a divider of one gives a 1 ns sampling period.
fn fast_config() -> HarvesterConfig {
    HarvesterConfig {
        clock_hz: 1_000_000_000,
        ..Default::default()
    }
}

fn fresh_registry() -> Arc<ResourceRegistry> {
    Arc::new(ResourceRegistry::new(12, 4))
}

fn scripted<const SIZE: usize>(pattern: &[u32]) -> Harvester<SIZE> {
    let h = Harvester::with_registry(
        ScriptedOscillator::new(pattern.to_vec(), 1),
        fast_config(),
        fresh_registry(),
    )
    .unwrap();
    h.init(1_000_000_000i64).unwrap();
    h
}

/// The words a harvester must produce for a repeating bit pattern.
fn expected_words(pattern: &[u32], n: usize) -> Vec<u32> {
    let acc = ChecksumAccumulator::new();
    let mut bits = pattern.iter().cycle();
    (0..n)
        .map(|_| {
            for _ in 0..SAMPLES_PER_WORD {
                acc.feed(*bits.next().unwrap());
            }
            acc.value()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Output words
// ---------------------------------------------------------------------------

#[test]
fn pooled_output_follows_running_crc() {
    let pattern = [1, 0, 1, 1, 0, 0, 1, 0, 1, 1, 1];
    let h = scripted::<8>(&pattern);
    let got: Vec<u32> = (0..64).map(|_| h.get_32()).collect();
    assert_eq!(got, expected_words(&pattern, 64));
}

#[test]
fn unpooled_output_follows_running_crc() {
    let pattern = [0, 0, 1, 0, 1, 1, 1];
    let h = scripted::<1>(&pattern);
    let got: Vec<u32> = (0..16).map(|_| h.get_32()).collect();
    assert_eq!(got, expected_words(&pattern, 16));
}

#[test]
fn get_64_is_two_sequential_words() {
    let pattern = [1, 1, 0, 1, 0];
    let h = scripted::<4>(&pattern);
    let words = expected_words(&pattern, 6);
    for pair in words.chunks(2) {
        let want = (u64::from(pair[0]) << 32) | u64::from(pair[1]);
        assert_eq!(h.get_64(), want);
    }
}

#[test]
fn identical_batches_still_give_distinct_words() {
    // Every batch reads the same 100 bits; only accumulated history differs.
    let h = scripted::<8>(&[1, 0]);
    let words: Vec<u32> = (0..32).map(|_| h.get_32()).collect();
    let unique: HashSet<_> = words.iter().collect();
    assert_eq!(unique.len(), words.len());
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_consumers_share_the_stream_without_duplicates() {
    const CONSUMERS: usize = 4;
    const PER_CONSUMER: usize = 200;
    let pattern = [1, 0, 0, 1, 1, 0, 1];
    let h = scripted::<8>(&pattern);

    let received: Vec<Vec<u32>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..CONSUMERS)
            .map(|_| s.spawn(|| (0..PER_CONSUMER).map(|_| h.get_32()).collect::<Vec<_>>()))
            .collect();
        handles.into_iter().map(|t| t.join().unwrap()).collect()
    });

    let expected = expected_words(&pattern, CONSUMERS * PER_CONSUMER);
    let position: std::collections::HashMap<u32, usize> =
        expected.iter().enumerate().map(|(i, &w)| (w, i)).collect();

    let mut seen = HashSet::new();
    for words in &received {
        let indices: Vec<usize> = words.iter().map(|w| position[w]).collect();
        assert!(
            indices.windows(2).all(|p| p[0] < p[1]),
            "consumer saw words out of production order"
        );
        for &w in words {
            assert!(seen.insert(w), "word {w:08x} handed out twice");
        }
    }
    assert_eq!(seen.len(), expected.len());
    assert_eq!(h.pool().stats().overruns, 0);
}

#[test]
fn unpooled_consumers_never_share_a_batch() {
    let pattern = [0, 1, 1, 1, 0];
    let h = scripted::<1>(&pattern);

    let received: Vec<u32> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..3)
            .map(|_| s.spawn(|| (0..20).map(|_| h.get_32()).collect::<Vec<_>>()))
            .collect();
        handles.into_iter().flat_map(|t| t.join().unwrap()).collect()
    });

    let unique: HashSet<_> = received.iter().collect();
    assert_eq!(unique.len(), 60);
    let expected: HashSet<_> = expected_words(&pattern, 60).into_iter().collect();
    assert!(received.iter().all(|w| expected.contains(w)));
}

// ---------------------------------------------------------------------------
// Initialisation
// ---------------------------------------------------------------------------

#[test]
fn repeated_init_keeps_engines_and_output_stream() {
    let registry = fresh_registry();
    let pattern = [1, 0, 1, 0, 0];
    let h: Harvester<8> = Harvester::with_registry(
        ScriptedOscillator::new(pattern.to_vec(), 1),
        fast_config(),
        Arc::clone(&registry),
    )
    .unwrap();

    h.init(1_000_000_000i64).unwrap();
    let first: Vec<u32> = (0..5).map(|_| h.get_32()).collect();
    h.init(250_000_000i64).unwrap();
    let second: Vec<u32> = (0..5).map(|_| h.get_32()).collect();

    assert_eq!(registry.free_channels(), 10);
    assert_eq!(registry.free_timers(), 3);
    assert_eq!(h.divider().map(|d| d.get()), Some(4));

    // The accumulator is not reset by the second init.
    let expected = expected_words(&pattern, 10);
    assert_eq!([first, second].concat(), expected);
}

#[test]
fn divider_bounds_on_reference_clock() {
    let clock = 125_000_000;
    assert_eq!(
        derive_divider(clock, SampleRate::Hz(125_000_000), 0)
            .unwrap()
            .get(),
        1
    );
    assert_eq!(derive_divider(clock, SampleRate::Hz(1908), 0).unwrap().get(), 65_513);
    assert!(matches!(
        derive_divider(clock, SampleRate::Hz(1907), 0),
        Err(Error::DividerOutOfRange { divider: 65_547, .. })
    ));
    assert!(matches!(
        derive_divider(clock, SampleRate::Hz(250_000_000), 0),
        Err(Error::DividerOutOfRange { divider: 0, .. })
    ));
}

#[test]
fn failed_init_can_be_retried() {
    let registry = fresh_registry();
    let h: Harvester<8> = Harvester::with_registry(
        ScriptedOscillator::new(vec![1, 0, 0], 1),
        fast_config(),
        Arc::clone(&registry),
    )
    .unwrap();

    assert!(h.init(1i64).is_err());
    assert!(!h.is_initialized());
    assert_eq!(registry.free_channels(), 12);

    h.init(1_000_000_000i64).unwrap();
    assert!(h.is_initialized());
    assert_ne!(h.get_32(), 0);
}

#[test]
fn two_harvesters_share_a_registry() {
    let registry = Arc::new(ResourceRegistry::new(3, 2));
    let make = || -> Harvester<4> {
        Harvester::with_registry(
            ScriptedOscillator::alternating(),
            fast_config(),
            Arc::clone(&registry),
        )
        .unwrap()
    };

    let a = make();
    a.init(1_000_000_000i64).unwrap();
    let b = make();
    // One channel left; a pooled harvester needs two.
    assert!(matches!(
        b.init(1_000_000_000i64),
        Err(Error::ResourcesExhausted(_))
    ));
    drop(a);
    b.init(1_000_000_000i64).unwrap();
}

// ---------------------------------------------------------------------------
// Overruns
// ---------------------------------------------------------------------------

#[test]
fn overwrite_policy_keeps_serving_words() {
    let config = HarvesterConfig {
        overrun: OverrunPolicy::Overwrite,
        ..fast_config()
    };
    let h: Harvester<2> = Harvester::with_registry(
        ScriptedOscillator::new(vec![1, 1, 0, 1], 1),
        config,
        fresh_registry(),
    )
    .unwrap();
    h.init(1_000_000_000i64).unwrap();

    while h.pool().stats().overruns == 0 {
        std::thread::yield_now();
    }
    let words: Vec<u32> = (0..10).map(|_| h.get_32()).collect();
    let unique: HashSet<_> = words.iter().collect();
    assert_eq!(unique.len(), words.len());
}

// ---------------------------------------------------------------------------
// Real oscillator
// ---------------------------------------------------------------------------

#[test]
#[ignore] // Run with: cargo test -- --ignored
fn real_oscillator_output_has_high_entropy() {
    let osc = detect_oscillator().expect("no usable oscillator on this machine");
    let h: Harvester<8> = Harvester::with_registry(osc, HarvesterConfig::default(), fresh_registry())
        .unwrap();
    h.maximize_source_rate();
    h.init(0).unwrap();

    let mut bytes = vec![0u8; 8192];
    WordSource::fill_bytes(&h, &mut bytes);
    let shannon = quick_shannon(&bytes);
    assert!(shannon > 7.5, "output entropy too low: {shannon:.3}/8.0");
}

#[test]
#[ignore] // Run with: cargo test -- --ignored
fn real_oscillator_reports_frequency() {
    let osc = detect_oscillator().expect("no usable oscillator on this machine");
    assert!(osc.frequency_khz() > 0);
}
