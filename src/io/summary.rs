//! Summary JSON: annual metrics plus the configuration that produced them.

use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::config::DispatchConfig;
use crate::error::Error;
use crate::sim::kpi::AnnualSummary;

use super::write_atomic;

#[derive(Serialize)]
struct SummaryDocument<'a> {
    #[serde(flatten)]
    summary: &'a AnnualSummary,
    config: &'a DispatchConfig,
}

/// Writes the summary as pretty-printed JSON.
///
/// # Errors
///
/// Returns an `io::Error` if serialization or writing fails.
pub fn write_summary(
    summary: &AnnualSummary,
    config: &DispatchConfig,
    mut writer: impl Write,
) -> io::Result<()> {
    let doc = SummaryDocument { summary, config };
    serde_json::to_writer_pretty(&mut writer, &doc)?;
    writeln!(writer)
}

/// Writes the summary JSON to `path`, leaving no partial file on failure.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be written or renamed.
pub fn export_summary(
    summary: &AnnualSummary,
    config: &DispatchConfig,
    path: &Path,
) -> Result<(), Error> {
    write_atomic(path, |w| write_summary(summary, config, w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::engine::AnnualDataset;

    #[test]
    fn summary_is_flat_with_config_echo() {
        let cfg = DispatchConfig::baseline();
        let ds = AnnualDataset {
            records: vec![],
            initial_soc_kwh: 400.0,
        };
        let summary = AnnualSummary::from_dataset(&ds, &cfg);
        let mut buf = Vec::new();
        write_summary(&summary, &cfg, &mut buf).unwrap();

        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(v["grid_import_total_kwh"], 0.0);
        assert_eq!(v["soc_final_kwh"], 400.0);
        assert_eq!(v["hours_per_phase"]["PHASE_6_REPOSO"], 0);
        assert_eq!(v["config"]["battery"]["capacity_kwh"], 2000.0);
        assert_eq!(v["config"]["schedule"]["peak_shaving_threshold_kw"], 1900.0);
    }

    #[test]
    fn echoed_config_parses_back() {
        let cfg = DispatchConfig::expanded_bess();
        let ds = AnnualDataset {
            records: vec![],
            initial_soc_kwh: 604.4,
        };
        let summary = AnnualSummary::from_dataset(&ds, &cfg);
        let mut buf = Vec::new();
        write_summary(&summary, &cfg, &mut buf).unwrap();

        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        let back: DispatchConfig = serde_json::from_value(v["config"].clone()).unwrap();
        assert_eq!(back, cfg);
    }
}
