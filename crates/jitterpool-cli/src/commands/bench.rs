use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use jitterpool_core::{DEFAULT_POOL_SIZE, HealthReport, QualityReport, quick_quality};
use serde::Serialize;

use super::HarvestOptions;

/// Machine-readable benchmark result.
#[derive(Serialize)]
struct BenchReport {
    threads: usize,
    words: usize,
    seconds: f64,
    words_per_sec: f64,
    duplicates: usize,
    quality: QualityReport,
    health: HealthReport,
}

pub fn run(opts: &HarvestOptions<'_>, threads: usize, n_words: usize, output: Option<&Path>) {
    if opts.unpooled {
        bench::<1>(opts, threads, n_words, output);
    } else {
        bench::<DEFAULT_POOL_SIZE>(opts, threads, n_words, output);
    }
}

fn bench<const SIZE: usize>(
    opts: &HarvestOptions<'_>,
    threads: usize,
    n_words: usize,
    output: Option<&Path>,
) {
    let harvester = super::start_harvester::<SIZE>(opts);
    let threads = threads.max(1);
    let per_thread = n_words.div_ceil(threads);

    println!(
        "Benchmarking {} ({} consumers x {} words, pool {})",
        harvester.oscillator().name(),
        threads,
        per_thread,
        SIZE
    );

    let t0 = Instant::now();
    let words: Vec<u32> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| s.spawn(|| (0..per_thread).map(|_| harvester.get_32()).collect::<Vec<_>>()))
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_default())
            .collect()
    });
    let seconds = t0.elapsed().as_secs_f64();

    let unique: HashSet<u32> = words.iter().copied().collect();
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    let report = BenchReport {
        threads,
        words: words.len(),
        seconds,
        words_per_sec: words.len() as f64 / seconds.max(f64::EPSILON),
        duplicates: words.len() - unique.len(),
        quality: quick_quality(&bytes),
        health: harvester.health_report(),
    };

    println!();
    println!("  Words:           {}", report.words);
    println!("  Time:            {:.3}s", report.seconds);
    println!("  Throughput:      {:.0} words/s", report.words_per_sec);
    println!("  Duplicates:      {}", report.duplicates);
    println!("  Grade:           {}", report.quality.grade);
    println!(
        "  Shannon entropy: {:.4} / 8.0 bits",
        report.quality.shannon_entropy
    );
    println!(
        "  Min-entropy:     {:.4} / 8.0 bits",
        report.quality.min_entropy
    );
    println!("  Overruns:        {}", report.health.pool.overruns);

    if let Some(path) = output {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    eprintln!("Error writing {}: {e}", path.display());
                    std::process::exit(1);
                }
                println!("\nReport written to {}", path.display());
            }
            Err(e) => eprintln!("Error serializing report: {e}"),
        }
    }
}
