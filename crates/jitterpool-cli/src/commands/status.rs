use jitterpool_core::{DEFAULT_POOL_SIZE, HealthReport};

use super::HarvestOptions;

pub fn run(opts: &HarvestOptions<'_>, warmup: usize, json: bool) {
    let report = if opts.unpooled {
        collect::<1>(opts, warmup)
    } else {
        collect::<DEFAULT_POOL_SIZE>(opts, warmup)
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("Error serializing report: {e}");
                std::process::exit(1);
            }
        }
    } else {
        print_report(&report);
    }
}

fn collect<const SIZE: usize>(opts: &HarvestOptions<'_>, warmup: usize) -> HealthReport {
    let harvester = super::start_harvester::<SIZE>(opts);
    for _ in 0..warmup {
        harvester.get_32();
    }
    harvester.health_report()
}

fn print_report(report: &HealthReport) {
    println!("Harvester status");
    println!("  Oscillator:  {}", report.oscillator);
    println!("  Running:     {}", report.initialized);
    if let (Some(divider), Some(hz)) = (report.divider, report.sample_hz) {
        println!("  Divider:     {divider} ({hz:.0} Hz on {} Hz)", report.clock_hz);
    }
    println!("  Engines:     {:?}", report.claimed_engines);
    println!("  Batches:     {}", report.batches);
    println!();
    let pool = &report.pool;
    println!("  Pool size:   {}", pool.size);
    println!("  Produced:    {}", pool.produced);
    println!("  Claimed:     {}", pool.claimed);
    println!("  Pending:     {}", pool.pending);
    println!("  Overruns:    {}", pool.overruns);
}
