//! Quick statistical checks on harvested output.
//!
//! These are smoke tests for a byte stream, not certification: a healthy
//! harvester should score close to 8 bits/byte on all of them, a stuck or
//! heavily biased oscillator visibly less.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use serde::Serialize;

/// Below this many bytes the estimates are meaningless.
const MIN_SAMPLES: usize = 16;

fn byte_counts(data: &[u8]) -> [u64; 256] {
    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    counts
}

/// Shannon entropy in bits per byte (0.0 to 8.0).
pub fn quick_shannon(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let n = data.len() as f64;
    byte_counts(data)
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum()
}

/// Most-common-value min-entropy estimate in bits per byte (0.0 to 8.0).
pub fn quick_min_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let max = byte_counts(data).into_iter().max().unwrap_or(0);
    let p_max = max as f64 / data.len() as f64;
    -p_max.log2()
}

/// Compressed size over raw size; random data does not compress.
pub fn compression_ratio(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    if encoder.write_all(data).is_err() {
        return 0.0;
    }
    let compressed = encoder.finish().unwrap_or_default();
    compressed.len() as f64 / data.len() as f64
}

/// Combined quick assessment of a byte stream.
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub samples: usize,
    pub unique_values: usize,
    pub shannon_entropy: f64,
    pub min_entropy: f64,
    pub compression_ratio: f64,
    pub quality_score: f64,
    pub grade: char,
}

/// Score `data` from 0 to 100 and grade it A to F.
pub fn quick_quality(data: &[u8]) -> QualityReport {
    if data.len() < MIN_SAMPLES {
        return QualityReport {
            samples: data.len(),
            unique_values: 0,
            shannon_entropy: 0.0,
            min_entropy: 0.0,
            compression_ratio: 0.0,
            quality_score: 0.0,
            grade: 'F',
        };
    }

    let shannon = quick_shannon(data);
    let min_entropy = quick_min_entropy(data);
    let ratio = compression_ratio(data);
    let unique = byte_counts(data).iter().filter(|&&c| c > 0).count();

    let score = (shannon / 8.0) * 60.0
        + ratio.min(1.0) * 20.0
        + (unique as f64 / 256.0).min(1.0) * 20.0;
    let grade = match score {
        s if s >= 80.0 => 'A',
        s if s >= 60.0 => 'B',
        s if s >= 40.0 => 'C',
        s if s >= 20.0 => 'D',
        _ => 'F',
    };

    QualityReport {
        samples: data.len(),
        unique_values: unique,
        shannon_entropy: shannon,
        min_entropy,
        compression_ratio: ratio,
        quality_score: score,
        grade,
    }
}
