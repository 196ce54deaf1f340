use std::time::Instant;

use jitterpool_core::oscillators::helpers::pack_bits_into_bytes;
use jitterpool_core::{SampleRate, collect_raw_bits, derive_divider, quick_min_entropy, quick_quality};

use super::HarvestOptions;

pub fn run(opts: &HarvestOptions<'_>, n_bits: usize) {
    let config = match super::resolve_config(opts) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            std::process::exit(1);
        }
    };
    let osc = super::pick_oscillator(opts.scripted);
    let info = osc.info();
    println!("Probing: {}", info.name);
    println!("  {}", info.description);
    println!("  Physics: {}", info.physics);
    println!();

    if config.maximize_rate {
        osc.maximize_rate();
        println!("  Rate maximized.");
    }

    let khz = osc.frequency_khz();
    println!("  Frequency:       {khz} kHz");
    match derive_divider(config.clock_hz, SampleRate::Auto, khz) {
        Ok(d) => println!(
            "  Auto divider:    {} ({:.0} Hz on a {} Hz clock)",
            d.get(),
            d.sample_hz(),
            config.clock_hz
        ),
        Err(e) => println!("  Auto divider:    unusable ({e})"),
    }

    let t0 = Instant::now();
    let bits = collect_raw_bits(osc.as_ref(), n_bits);
    let elapsed = t0.elapsed();

    if bits.is_empty() {
        println!("  No bits collected.");
        return;
    }

    let ones = bits.iter().filter(|&&b| b == 1).count();
    let bytes = pack_bits_into_bytes(&bits);
    let quality = quick_quality(&bytes);
    println!("  Raw bits:        {}", bits.len());
    println!(
        "  Ones:            {:.4}",
        ones as f64 / bits.len() as f64
    );
    println!("  Grade (raw):     {}", quality.grade);
    println!(
        "  Shannon entropy: {:.4} / 8.0 bits",
        quality.shannon_entropy
    );
    println!("  Min-entropy:     {:.4} / 8.0 bits", quick_min_entropy(&bytes));
    println!("  Compression:     {:.4}", quality.compression_ratio);
    println!(
        "  Bit rate:        {:.0} bits/s",
        bits.len() as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
}
