//! CSV export of the hourly dispatch dataset.

use std::io::{self, Write};
use std::path::Path;

use crate::config::DispatchConfig;
use crate::error::Error;
use crate::sim::engine::AnnualDataset;
use crate::sim::kpi::{co2_avoided_kg, cost_if_grid_import};
use crate::sim::tariff::TariffSchedule;

use super::write_atomic;

/// Column header of the hourly dataset.
pub const HEADER: &str = "datetime,pv_kwh,ev_kwh,mall_kwh,\
                          pv_to_ev_kwh,pv_to_bess_kwh,pv_to_mall_kwh,pv_to_grid_export_kwh,\
                          bess_to_ev_kwh,bess_to_mall_kwh,grid_to_ev_kwh,grid_to_mall_kwh,\
                          grid_import_kwh,grid_export_kwh,bess_charge_kwh,bess_discharge_kwh,\
                          soc_kwh,soc_percent,bess_mode,phase,\
                          tariff_period,tariff_rate,cost_if_grid_import,grid_import_cost,\
                          co2_avoided_kg,ev_demand_after_bess_kwh,mall_demand_after_bess_kwh";

/// Timestamp layout of the `datetime` column (ISO-8601 with offset).
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

fn num(v: f64) -> String {
    format!("{v:.6}")
}

/// Writes the dataset as CSV to any writer.
///
/// Numbers use six decimals so identical runs produce identical bytes.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(
    dataset: &AnnualDataset,
    config: &DispatchConfig,
    writer: impl Write,
) -> io::Result<()> {
    let tariff = TariffSchedule::from_config(&config.tariff);
    let co2_factor = config.emissions.co2_grid_kg_per_kwh;
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in &dataset.records {
        let hour = r.hour_of_day();
        let rate = tariff.rate(hour);
        let mode: &'static str = r.bess_mode().into();
        let phase: &'static str = r.phase.into();
        let period: &'static str = tariff.period(hour).into();

        wtr.write_record(&[
            r.timestamp.format(DATETIME_FORMAT).to_string(),
            num(r.pv_kwh),
            num(r.ev_kwh),
            num(r.mall_kwh),
            num(r.pv_to_ev),
            num(r.pv_to_bess),
            num(r.pv_to_mall),
            num(r.pv_to_grid_export),
            num(r.bess_to_ev),
            num(r.bess_to_mall),
            num(r.grid_to_ev),
            num(r.grid_to_mall),
            num(r.grid_import_kwh()),
            num(r.grid_export_kwh()),
            num(r.bess_charge_kwh),
            num(r.bess_discharge_kwh),
            num(r.soc_kwh_end),
            num(r.soc_percent_end),
            mode.to_string(),
            phase.to_string(),
            period.to_string(),
            num(rate),
            num(cost_if_grid_import(r, rate)),
            num(r.grid_import_kwh() * rate),
            num(co2_avoided_kg(r, co2_factor)),
            num(r.ev_demand_after_bess_kwh()),
            num(r.mall_demand_after_bess_kwh()),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Exports the dataset to `path`, leaving no partial file on failure.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be written or renamed.
pub fn export_csv(dataset: &AnnualDataset, config: &DispatchConfig, path: &Path) -> Result<(), Error> {
    write_atomic(path, |w| write_csv(dataset, config, w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::types::{DispatchRecord, Phase};
    use chrono::{Duration, FixedOffset, TimeZone};

    fn record(t: usize) -> DispatchRecord {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let start = tz.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        DispatchRecord {
            hour_index: t,
            timestamp: start + Duration::hours(t as i64),
            pv_kwh: 0.0,
            ev_kwh: 10.0,
            mall_kwh: 20.0,
            pv_to_ev: 0.0,
            pv_to_bess: 0.0,
            pv_to_mall: 0.0,
            pv_to_grid_export: 0.0,
            bess_to_ev: 0.0,
            bess_to_mall: 0.0,
            grid_to_ev: 10.0,
            grid_to_mall: 20.0,
            bess_charge_kwh: 0.0,
            bess_discharge_kwh: 0.0,
            soc_kwh_end: 400.0,
            soc_percent_end: 20.0,
            phase: Phase::Reposo,
        }
    }

    fn dataset(n: usize) -> AnnualDataset {
        AnnualDataset {
            records: (0..n).map(record).collect(),
            initial_soc_kwh: 400.0,
        }
    }

    fn render(n: usize) -> String {
        let mut buf = Vec::new();
        write_csv(&dataset(n), &DispatchConfig::baseline(), &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn header_lists_all_columns() {
        let out = render(1);
        let header = out.lines().next().unwrap();
        assert!(header.starts_with("datetime,pv_kwh,ev_kwh,mall_kwh,pv_to_ev_kwh"));
        assert_eq!(header.split(',').count(), 27);
        for col in ["soc_percent", "phase", "grid_to_mall_kwh", "bess_discharge_kwh"] {
            assert!(header.split(',').any(|c| c == col), "missing {col}");
        }
    }

    #[test]
    fn row_count_matches_hours() {
        assert_eq!(render(24).lines().count(), 25);
    }

    #[test]
    fn rows_carry_timestamp_and_tags() {
        let out = render(20);
        let row19: Vec<&str> = out.lines().nth(20).unwrap().split(',').collect();
        assert_eq!(row19[0], "2024-01-01T19:00:00-05:00");
        assert_eq!(row19[1], "0.000000");
        assert_eq!(row19[18], "idle");
        assert_eq!(row19[19], "PHASE_6_REPOSO");
        assert_eq!(row19[20], "HP");
        assert_eq!(row19[21], "0.450000");
        assert_eq!(row19[22], "13.500000");
    }

    #[test]
    fn deterministic_output() {
        assert_eq!(render(48), render(48));
    }

    #[test]
    fn export_leaves_no_temp_file() {
        let dir = std::env::temp_dir().join(format!("bess-export-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dispatch_hourly.csv");
        export_csv(&dataset(3), &DispatchConfig::baseline(), &path).unwrap();
        assert!(path.exists());
        assert!(!dir.join("dispatch_hourly.csv.tmp").exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}
