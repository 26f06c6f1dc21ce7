//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use bess_dispatch::config::{DispatchConfig, InputConfig};
use bess_dispatch::io::input::{HOURS_PER_YEAR, hourly_index};
use bess_dispatch::sim::engine::{AnnualDataset, Simulator};
use bess_dispatch::sim::types::HourlyInput;
use bess_dispatch::synthetic::SyntheticProfile;

/// Builds a full year where each hour's `(pv, ev, mall)` depends only on
/// the local hour of day.
pub fn daily_year(profile: impl Fn(u32) -> (f64, f64, f64)) -> Vec<HourlyInput> {
    hourly_index(&InputConfig::default())
        .unwrap()
        .into_iter()
        .map(|timestamp| {
            let (pv, ev, mall) = profile(chrono::Timelike::hour(&timestamp));
            HourlyInput {
                timestamp,
                pv_kwh: pv,
                ev_kwh: ev,
                mall_kwh: mall,
            }
        })
        .collect()
}

pub fn zero_year() -> Vec<HourlyInput> {
    daily_year(|_| (0.0, 0.0, 0.0))
}

/// Default seeded synthetic year (seed 42).
pub fn synthetic_year(seed: u64) -> Vec<HourlyInput> {
    SyntheticProfile::with_seed(seed)
        .generate(&InputConfig::default())
        .unwrap()
}

pub fn run(config: DispatchConfig, inputs: &[HourlyInput]) -> AnnualDataset {
    Simulator::new(config).unwrap().run(inputs).unwrap()
}

/// Fresh empty directory under the system temp dir.
pub fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("bess-dispatch-{tag}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Hourly PV file with an `ac_power_kw` column.
pub fn write_pv_csv(dir: &Path, inputs: &[HourlyInput]) -> PathBuf {
    let mut s = String::from("timestamp,ac_power_kw\n");
    for h in inputs {
        writeln!(s, "{},{}", h.timestamp.format("%Y-%m-%d %H:%M:%S"), h.pv_kwh).unwrap();
    }
    let path = dir.join("pv.csv");
    fs::write(&path, s).unwrap();
    path
}

/// 15-minute EV file split over two socket power columns.
///
/// Each hour's energy is spread evenly over its four quarters, so the
/// normalizer should reproduce the hourly values.
pub fn write_ev_csv(dir: &Path, inputs: &[HourlyInput]) -> PathBuf {
    let mut s = String::from("timestamp,socket_000_power_kw,socket_001_power_kw\n");
    for h in inputs {
        // average power over the hour equals the hourly energy
        let half_kw = h.ev_kwh / 2.0;
        for q in 0..4 {
            let ts = h.timestamp + Duration::minutes(15 * q);
            writeln!(s, "{},{half_kw},{half_kw}", ts.format("%Y-%m-%dT%H:%M:%S")).unwrap();
        }
    }
    let path = dir.join("ev.csv");
    fs::write(&path, s).unwrap();
    path
}

/// Semicolon-delimited, comma-decimal mall file (`FECHAHORA;kWh`).
pub fn write_mall_csv(dir: &Path, inputs: &[HourlyInput]) -> PathBuf {
    let mut s = String::from("FECHAHORA;kWh\n");
    for h in inputs {
        let value = format!("{:.3}", h.mall_kwh).replace('.', ",");
        writeln!(s, "{};{value}", h.timestamp.format("%d/%m/%Y %H:%M")).unwrap();
    }
    let path = dir.join("mall.csv");
    fs::write(&path, s).unwrap();
    path
}

pub fn assert_full_year(dataset: &AnnualDataset) {
    assert_eq!(dataset.len(), HOURS_PER_YEAR);
}
