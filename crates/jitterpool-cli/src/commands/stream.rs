use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use jitterpool_core::DEFAULT_POOL_SIZE;

use super::HarvestOptions;

pub fn run(opts: &HarvestOptions<'_>, n_words: u64, bits: u32, format: &str) {
    if opts.unpooled {
        stream::<1>(opts, n_words, bits, format);
    } else {
        stream::<DEFAULT_POOL_SIZE>(opts, n_words, bits, format);
    }
}

fn stream<const SIZE: usize>(opts: &HarvestOptions<'_>, n_words: u64, bits: u32, format: &str) {
    let harvester = super::start_harvester::<SIZE>(opts);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || r.store(false, Ordering::SeqCst)) {
        log::warn!("could not install Ctrl+C handler: {e}");
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let start = Instant::now();
    let mut emitted = 0u64;

    while running.load(Ordering::SeqCst) && (n_words == 0 || emitted < n_words) {
        let word = if bits == 64 {
            harvester.get_64()
        } else {
            u64::from(harvester.get_32())
        };
        if out.write_all(&format_word(word, bits, format)).is_err() {
            break; // Broken pipe
        }
        emitted += 1;
    }
    let _ = out.flush();

    let elapsed = start.elapsed().as_secs_f64();
    let stats = harvester.pool().stats();
    eprintln!(
        "{emitted} x {bits}-bit words in {elapsed:.2}s ({:.0} words/s), overruns: {}",
        emitted as f64 / elapsed.max(f64::EPSILON),
        stats.overruns
    );
}

/// Render one word: zero-padded lowercase hex or decimal plus newline, or
/// little-endian bytes of the word's width.
pub fn format_word(word: u64, bits: u32, format: &str) -> Vec<u8> {
    let width = (bits / 8) as usize;
    match format {
        "raw" => word.to_le_bytes()[..width].to_vec(),
        "dec" => format!("{word}\n").into_bytes(),
        _ => format!("{word:0w$x}\n", w = width * 2).into_bytes(),
    }
}
