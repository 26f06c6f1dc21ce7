//! Command-line argument parsing for the `bess-dispatch` binary.

use std::env;
use std::path::PathBuf;

/// Default seed for `--synthetic` runs.
pub const DEFAULT_SEED: u64 = 42;

/// Where the three annual series come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Files {
        pv: PathBuf,
        ev: PathBuf,
        mall: PathBuf,
    },
    Synthetic {
        seed: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub config: Option<PathBuf>,
    pub preset: Option<String>,
    pub source: InputSource,
    pub output_dir: PathBuf,
    pub log_json: bool,
}

/// Parses the process arguments. `Ok(None)` means help was requested.
///
/// # Errors
///
/// Returns a message describing the first invalid or missing argument.
pub fn parse_args() -> Result<Option<CliOptions>, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

pub fn parse_args_from(args: Vec<String>) -> Result<Option<CliOptions>, String> {
    if args.iter().any(|a| a == "--help" || a == "-h") {
        return Ok(None);
    }
    parse_options(&args).map(Some)
}

fn set_once<T>(slot: &mut Option<T>, value: T, flag: &str) -> Result<(), String> {
    if slot.replace(value).is_some() {
        return Err(format!("{flag} provided more than once"));
    }
    Ok(())
}

fn parse_options(args: &[String]) -> Result<CliOptions, String> {
    let mut i = 0usize;
    let mut config = None;
    let mut preset = None;
    let mut pv = None;
    let mut ev = None;
    let mut mall = None;
    let mut output_dir = None;
    let mut synthetic = false;
    let mut seed = None;
    let mut log_json = false;

    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --config (expected a TOML file path)")?;
                set_once(&mut config, PathBuf::from(path), "--config")?;
            }
            "--preset" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                set_once(&mut preset, name.to_string(), "--preset")?;
            }
            "--pv" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --pv (expected a CSV file path)")?;
                set_once(&mut pv, PathBuf::from(path), "--pv")?;
            }
            "--ev" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --ev (expected a CSV file path)")?;
                set_once(&mut ev, PathBuf::from(path), "--ev")?;
            }
            "--mall" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --mall (expected a CSV file path)")?;
                set_once(&mut mall, PathBuf::from(path), "--mall")?;
            }
            "--output-dir" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --output-dir (expected a directory)")?;
                set_once(&mut output_dir, PathBuf::from(path), "--output-dir")?;
            }
            "--seed" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --seed (expected a u64)")?;
                let value = raw
                    .parse::<u64>()
                    .map_err(|_| format!("--seed value \"{raw}\" is not a valid u64"))?;
                set_once(&mut seed, value, "--seed")?;
            }
            "--synthetic" => synthetic = true,
            "--log-json" => log_json = true,
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if config.is_some() && preset.is_some() {
        return Err(
            "arguments `--config` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    let any_file = pv.is_some() || ev.is_some() || mall.is_some();
    let source = if synthetic {
        if any_file {
            return Err("`--synthetic` cannot be combined with --pv/--ev/--mall".to_string());
        }
        InputSource::Synthetic {
            seed: seed.unwrap_or(DEFAULT_SEED),
        }
    } else {
        if seed.is_some() {
            return Err("`--seed` only applies to --synthetic runs".to_string());
        }
        match (pv, ev, mall) {
            (Some(pv), Some(ev), Some(mall)) => InputSource::Files { pv, ev, mall },
            _ => {
                return Err(
                    "input series required: pass --pv, --ev and --mall, or --synthetic"
                        .to_string(),
                );
            }
        }
    };

    Ok(CliOptions {
        config,
        preset,
        source,
        output_dir: output_dir.unwrap_or_else(|| PathBuf::from(".")),
        log_json,
    })
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("bess-dispatch: hourly PV/BESS/EV/mall energy dispatch over one year");
    eprintln!();
    eprintln!("Usage:");
    eprintln!(
        "  bess-dispatch [--config <path> | --preset <name>] \
         (--pv <csv> --ev <csv> --mall <csv> | --synthetic [--seed <u64>]) \
         [--output-dir <dir>] [--log-json]"
    );
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>      Load configuration from a TOML file");
    eprintln!("  --preset <name>      Built-in configuration (baseline, compact_bess, expanded_bess)");
    eprintln!("  --pv <csv>           Hourly PV generation");
    eprintln!("  --ev <csv>           EV charging demand (hourly or 15-minute)");
    eprintln!("  --mall <csv>         Mall demand (FECHAHORA;kWh)");
    eprintln!("  --synthetic          Use a seeded synthetic year instead of files");
    eprintln!("  --seed <u64>         Seed for --synthetic (default {DEFAULT_SEED})");
    eprintln!("  --output-dir <dir>   Where dispatch_hourly.csv and summary.json go (default .)");
    eprintln!("  --log-json           Emit logs as JSON lines on stderr");
    eprintln!("  --help               Show this help message");
    eprintln!();
    eprintln!("Without --config or --preset the baseline preset is used.");
}
