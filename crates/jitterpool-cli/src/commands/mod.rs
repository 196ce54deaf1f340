pub mod bench;
pub mod probe;
pub mod status;
pub mod stream;

use std::path::Path;

use jitterpool_core::{
    Error, Harvester, HarvesterConfig, Oscillator, ScriptedOscillator, detect_oscillator,
};

/// Pipeline options collected from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct HarvestOptions<'a> {
    pub config_path: Option<&'a Path>,
    pub rate: Option<i64>,
    pub maximize: bool,
    pub unpooled: bool,
    pub scripted: bool,
}

/// Config file (or defaults) with command-line overrides applied.
pub fn resolve_config(opts: &HarvestOptions<'_>) -> jitterpool_core::Result<HarvesterConfig> {
    let mut config = match opts.config_path {
        Some(path) => HarvesterConfig::load(path)?,
        None => HarvesterConfig::default(),
    };
    if let Some(rate) = opts.rate {
        config.sample_rate_hz = rate;
    }
    if opts.maximize {
        config.maximize_rate = true;
    }
    Ok(config)
}

/// The oscillator to harvest from. Exits if none is usable.
pub fn pick_oscillator(scripted: bool) -> Box<dyn Oscillator> {
    if scripted {
        eprintln!("Warning: scripted oscillator selected, output is deterministic");
        return Box::new(ScriptedOscillator::alternating());
    }
    match detect_oscillator() {
        Some(osc) => osc,
        None => {
            eprintln!("No usable oscillator on this machine. Use --scripted for a dry run.");
            std::process::exit(1);
        }
    }
}

/// Build and initialise a harvester, exiting with a message on failure.
pub fn start_harvester<const SIZE: usize>(opts: &HarvestOptions<'_>) -> Harvester<SIZE> {
    let config = resolve_config(opts).unwrap_or_else(|e| fail("loading config", e));
    let harvester = Harvester::new(pick_oscillator(opts.scripted), config)
        .unwrap_or_else(|e| fail("creating harvester", e));
    if let Err(e) = harvester.init_from_config() {
        fail("starting harvester", e);
    }
    harvester
}

/// Parse a word width argument.
pub fn parse_bits(s: &str) -> u32 {
    match s {
        "64" => 64,
        "32" => 32,
        _ => {
            eprintln!("Unknown word width '{s}', using 32");
            32
        }
    }
}

fn fail(context: &str, e: Error) -> ! {
    eprintln!("Error {context}: {e}");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use jitterpool_core::{OverrunPolicy, SampleRate};
    use std::io::Write;

    // -----------------------------------------------------------------------
    // resolve_config tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_resolve_defaults() {
        let config = resolve_config(&HarvestOptions::default()).unwrap();
        assert_eq!(config, HarvesterConfig::default());
    }

    #[test]
    fn test_resolve_overrides() {
        let opts = HarvestOptions {
            rate: Some(48_000),
            maximize: true,
            ..Default::default()
        };
        let config = resolve_config(&opts).unwrap();
        assert_eq!(config.sample_rate(), SampleRate::Hz(48_000));
        assert!(config.maximize_rate);
    }

    #[test]
    fn test_resolve_negative_rate_is_auto() {
        let opts = HarvestOptions {
            rate: Some(-5),
            ..Default::default()
        };
        assert_eq!(resolve_config(&opts).unwrap().sample_rate(), SampleRate::Auto);
    }

    #[test]
    fn test_resolve_file_then_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"sample_rate_hz": 1000000, "overrun": "overwrite"}}"#).unwrap();
        let opts = HarvestOptions {
            config_path: Some(file.path()),
            rate: Some(2_000_000),
            ..Default::default()
        };
        let config = resolve_config(&opts).unwrap();
        assert_eq!(config.sample_rate(), SampleRate::Hz(2_000_000));
        assert_eq!(config.overrun, OverrunPolicy::Overwrite);
    }

    #[test]
    fn test_resolve_missing_file_errors() {
        let opts = HarvestOptions {
            config_path: Some(Path::new("/nonexistent/jitterpool.json")),
            ..Default::default()
        };
        assert!(resolve_config(&opts).is_err());
    }

    // -----------------------------------------------------------------------
    // parse_bits tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_bits() {
        assert_eq!(parse_bits("32"), 32);
        assert_eq!(parse_bits("64"), 64);
        assert_eq!(parse_bits("16"), 32);
    }

    // -----------------------------------------------------------------------
    // start_harvester tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_start_scripted_harvester() {
        let opts = HarvestOptions {
            scripted: true,
            ..Default::default()
        };
        let harvester = start_harvester::<8>(&opts);
        assert!(harvester.is_initialized());
        assert_eq!(harvester.oscillator().name(), "scripted");
        assert_ne!(harvester.get_32(), harvester.get_32());
    }

    // -----------------------------------------------------------------------
    // stream formatting tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_format_hex_pads_to_width() {
        assert_eq!(stream::format_word(0xAB, 32, "hex"), b"000000ab\n");
        assert_eq!(
            stream::format_word(0xDEADBEEF_CAFEBABE, 64, "hex"),
            b"deadbeefcafebabe\n"
        );
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(stream::format_word(42, 32, "dec"), b"42\n");
    }

    #[test]
    fn test_format_raw_little_endian() {
        assert_eq!(stream::format_word(0x04030201, 32, "raw"), [1, 2, 3, 4]);
        assert_eq!(
            stream::format_word(0x0807060504030201, 64, "raw"),
            [1, 2, 3, 4, 5, 6, 7, 8]
        );
    }
}
