//! End-to-end run: configuration, inputs, simulation, metrics, outputs.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::cli::{CliOptions, InputSource};
use crate::config::DispatchConfig;
use crate::error::Error;
use crate::io::export::export_csv;
use crate::io::input::load_inputs;
use crate::io::summary::export_summary;
use crate::sim::engine::{AnnualDataset, Simulator};
use crate::sim::kpi::AnnualSummary;
use crate::sim::types::HourlyInput;
use crate::synthetic::SyntheticProfile;

pub const DATASET_FILE: &str = "dispatch_hourly.csv";
pub const SUMMARY_FILE: &str = "summary.json";

pub struct RunOutput {
    pub config: DispatchConfig,
    pub dataset: AnnualDataset,
    pub summary: AnnualSummary,
    pub dataset_path: PathBuf,
    pub summary_path: PathBuf,
}

/// Picks the configuration: `--config` file, then `--preset`, then baseline.
///
/// # Errors
///
/// Returns `Error::Config` if the file or preset is unusable or the result
/// fails validation.
pub fn resolve_config(config: Option<&Path>, preset: Option<&str>) -> Result<DispatchConfig, Error> {
    let cfg = match (config, preset) {
        (Some(path), _) => DispatchConfig::from_toml_file(path)?,
        (None, Some(name)) => DispatchConfig::from_preset(name)?,
        (None, None) => DispatchConfig::baseline(),
    };
    let errors = cfg.validate();
    if !errors.is_empty() {
        return Err(Error::Config(errors));
    }
    Ok(cfg)
}

/// Loads or generates the annual hourly inputs.
///
/// # Errors
///
/// Returns `Error::Input` for malformed files.
pub fn load_source(source: &InputSource, cfg: &DispatchConfig) -> Result<Vec<HourlyInput>, Error> {
    match source {
        InputSource::Files { pv, ev, mall } => load_inputs(pv, ev, mall, &cfg.input),
        InputSource::Synthetic { seed } => {
            info!(seed, "generating synthetic year");
            SyntheticProfile::with_seed(*seed).generate(&cfg.input)
        }
    }
}

/// Writes both outputs into `dir`; on failure neither file is left behind.
///
/// # Errors
///
/// Returns `Error::Io` naming the path that could not be written.
pub fn write_outputs(
    dir: &Path,
    config: &DispatchConfig,
    dataset: &AnnualDataset,
    summary: &AnnualSummary,
) -> Result<(PathBuf, PathBuf), Error> {
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let dataset_path = dir.join(DATASET_FILE);
    let summary_path = dir.join(SUMMARY_FILE);

    export_csv(dataset, config, &dataset_path)?;
    if let Err(e) = export_summary(summary, config, &summary_path) {
        let _ = fs::remove_file(&dataset_path);
        return Err(e);
    }
    info!(
        dataset = %dataset_path.display(),
        summary = %summary_path.display(),
        "outputs written"
    );
    Ok((dataset_path, summary_path))
}

/// Runs the whole pipeline for parsed command-line options.
///
/// # Errors
///
/// Any error aborts the run before outputs are published.
pub fn run(opts: &CliOptions) -> Result<RunOutput, Error> {
    let config = resolve_config(opts.config.as_deref(), opts.preset.as_deref())?;
    let inputs = load_source(&opts.source, &config)?;

    let mut simulator = Simulator::new(config.clone())?;
    let dataset = simulator.run(&inputs)?;
    let summary = AnnualSummary::from_dataset(&dataset, &config);

    let (dataset_path, summary_path) = write_outputs(&opts.output_dir, &config, &dataset, &summary)?;
    Ok(RunOutput {
        config,
        dataset,
        summary,
        dataset_path,
        summary_path,
    })
}
