//! Post-hoc annual metrics computed from a finished dispatch dataset.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use strum::IntoEnumIterator;

use crate::config::DispatchConfig;

use super::engine::AnnualDataset;
use super::tariff::TariffSchedule;
use super::types::{DispatchRecord, Phase};

/// Floor applied to ratio denominators.
const MIN_DENOMINATOR: f64 = 1e-9;

/// Grid energy displaced in this hour, in kg of CO₂.
///
/// Counts everything the loads received from PV or the battery.
pub fn co2_avoided_kg(r: &DispatchRecord, kg_per_kwh: f64) -> f64 {
    (r.bess_discharge_kwh + r.pv_to_ev + r.pv_to_mall) * kg_per_kwh
}

/// Cost of serving both loads entirely from the grid.
pub fn cost_if_grid_import(r: &DispatchRecord, rate: f64) -> f64 {
    (r.ev_kwh + r.mall_kwh) * rate
}

fn ratio(num: f64, den: f64) -> f64 {
    num / den.max(MIN_DENOMINATOR)
}

/// Annual totals and statistics of one simulated year.
///
/// Every field is derived from the dispatch records so the summary can
/// never disagree with the hourly dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnualSummary {
    pub hours: usize,

    pub pv_total_kwh: f64,
    pub ev_total_kwh: f64,
    pub mall_total_kwh: f64,
    pub pv_to_ev_total_kwh: f64,
    pub pv_to_bess_total_kwh: f64,
    pub pv_to_mall_total_kwh: f64,
    pub pv_to_grid_export_total_kwh: f64,
    pub bess_to_ev_total_kwh: f64,
    pub bess_to_mall_total_kwh: f64,
    pub grid_to_ev_total_kwh: f64,
    pub grid_to_mall_total_kwh: f64,
    pub bess_charge_total_kwh: f64,
    pub bess_discharge_total_kwh: f64,
    pub grid_import_total_kwh: f64,
    pub grid_export_total_kwh: f64,
    pub peak_grid_import_kwh: f64,

    pub co2_avoided_kg: f64,
    pub co2_avoided_tons: f64,

    /// Equivalent full cycles, `charge_total / capacity`.
    pub cycles: f64,
    pub cycles_per_day: f64,
    /// Energy that reached the cells, `Σ charge · √η`.
    pub bess_energy_stored_kwh: f64,
    pub bess_energy_delivered_kwh: f64,

    pub soc_min_kwh: f64,
    pub soc_max_kwh: f64,
    pub soc_mean_kwh: f64,
    pub soc_final_kwh: f64,
    pub soc_min_percent: f64,
    pub soc_max_percent: f64,
    pub soc_mean_percent: f64,
    pub soc_final_percent: f64,

    /// `Σ bess_to_mall · (hp_rate − hfp_rate)` over HP hours.
    pub tariff_arbitrage_savings: f64,
    pub cost_if_grid_import_total: f64,
    pub grid_import_cost_total: f64,

    pub solar_direct_coverage: f64,
    pub self_sufficiency: f64,
    pub ev_self_sufficiency: f64,

    pub hours_per_phase: BTreeMap<String, usize>,
}

#[derive(Default)]
struct Totals {
    pv: f64,
    ev: f64,
    mall: f64,
    pv_to_ev: f64,
    pv_to_bess: f64,
    pv_to_mall: f64,
    pv_to_grid_export: f64,
    bess_to_ev: f64,
    bess_to_mall: f64,
    grid_to_ev: f64,
    grid_to_mall: f64,
    charge: f64,
    discharge: f64,
    grid_import: f64,
    peak_import: f64,
    arbitrage: f64,
    cost_if_import: f64,
    import_cost: f64,
    soc_sum: f64,
    soc_min: f64,
    soc_max: f64,
}

impl AnnualSummary {
    /// Computes every metric from the dataset.
    pub fn from_dataset(dataset: &AnnualDataset, config: &DispatchConfig) -> Self {
        let tariff = TariffSchedule::from_config(&config.tariff);
        let capacity = config.battery.capacity_kwh;
        let co2_factor = config.emissions.co2_grid_kg_per_kwh;

        let mut t = Totals {
            soc_min: dataset.initial_soc_kwh,
            soc_max: dataset.initial_soc_kwh,
            ..Totals::default()
        };
        if !dataset.is_empty() {
            t.soc_min = f64::INFINITY;
            t.soc_max = f64::NEG_INFINITY;
        }

        let mut hours_per_phase: BTreeMap<String, usize> =
            Phase::iter().map(|p| (p.to_string(), 0)).collect();

        for r in &dataset.records {
            let hour = r.hour_of_day();
            let rate = tariff.rate(hour);

            t.pv += r.pv_kwh;
            t.ev += r.ev_kwh;
            t.mall += r.mall_kwh;
            t.pv_to_ev += r.pv_to_ev;
            t.pv_to_bess += r.pv_to_bess;
            t.pv_to_mall += r.pv_to_mall;
            t.pv_to_grid_export += r.pv_to_grid_export;
            t.bess_to_ev += r.bess_to_ev;
            t.bess_to_mall += r.bess_to_mall;
            t.grid_to_ev += r.grid_to_ev;
            t.grid_to_mall += r.grid_to_mall;
            t.charge += r.bess_charge_kwh;
            t.discharge += r.bess_discharge_kwh;
            t.grid_import += r.grid_import_kwh();
            t.peak_import = t.peak_import.max(r.grid_import_kwh());

            t.arbitrage += r.bess_to_mall * tariff.arbitrage_spread(hour);
            t.cost_if_import += cost_if_grid_import(r, rate);
            t.import_cost += r.grid_import_kwh() * rate;

            t.soc_sum += r.soc_kwh_end;
            t.soc_min = t.soc_min.min(r.soc_kwh_end);
            t.soc_max = t.soc_max.max(r.soc_kwh_end);

            if let Some(n) = hours_per_phase.get_mut(&r.phase.to_string()) {
                *n += 1;
            }
        }

        let hours = dataset.len();
        let soc_mean = if hours > 0 {
            t.soc_sum / hours as f64
        } else {
            dataset.initial_soc_kwh
        };
        let soc_final = dataset.final_soc_kwh();
        let pct = |kwh: f64| 100.0 * ratio(kwh, capacity);

        let demand = t.ev + t.mall;
        let co2_avoided_kg = (t.discharge + t.pv_to_ev + t.pv_to_mall) * co2_factor;
        let cycles = ratio(t.charge, capacity);

        Self {
            hours,
            pv_total_kwh: t.pv,
            ev_total_kwh: t.ev,
            mall_total_kwh: t.mall,
            pv_to_ev_total_kwh: t.pv_to_ev,
            pv_to_bess_total_kwh: t.pv_to_bess,
            pv_to_mall_total_kwh: t.pv_to_mall,
            pv_to_grid_export_total_kwh: t.pv_to_grid_export,
            bess_to_ev_total_kwh: t.bess_to_ev,
            bess_to_mall_total_kwh: t.bess_to_mall,
            grid_to_ev_total_kwh: t.grid_to_ev,
            grid_to_mall_total_kwh: t.grid_to_mall,
            bess_charge_total_kwh: t.charge,
            bess_discharge_total_kwh: t.discharge,
            grid_import_total_kwh: t.grid_import,
            grid_export_total_kwh: t.pv_to_grid_export,
            peak_grid_import_kwh: t.peak_import,
            co2_avoided_kg,
            co2_avoided_tons: co2_avoided_kg / 1000.0,
            cycles,
            cycles_per_day: cycles / 365.0,
            bess_energy_stored_kwh: t.charge * config.one_way_efficiency(),
            bess_energy_delivered_kwh: t.discharge,
            soc_min_kwh: t.soc_min,
            soc_max_kwh: t.soc_max,
            soc_mean_kwh: soc_mean,
            soc_final_kwh: soc_final,
            soc_min_percent: pct(t.soc_min),
            soc_max_percent: pct(t.soc_max),
            soc_mean_percent: pct(soc_mean),
            soc_final_percent: pct(soc_final),
            tariff_arbitrage_savings: t.arbitrage,
            cost_if_grid_import_total: t.cost_if_import,
            grid_import_cost_total: t.import_cost,
            solar_direct_coverage: ratio(t.pv_to_ev + t.pv_to_mall, demand),
            self_sufficiency: 1.0 - ratio(t.grid_import, demand),
            ev_self_sufficiency: ratio(t.pv_to_ev + t.bess_to_ev, t.ev),
            hours_per_phase,
        }
    }
}

impl fmt::Display for AnnualSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Annual Dispatch Summary ({} h) ---", self.hours)?;
        writeln!(f, "PV generation:         {:.1} kWh", self.pv_total_kwh)?;
        writeln!(
            f,
            "Demand EV / mall:      {:.1} / {:.1} kWh",
            self.ev_total_kwh, self.mall_total_kwh
        )?;
        writeln!(
            f,
            "Grid import / export:  {:.1} / {:.1} kWh (peak {:.1} kWh/h)",
            self.grid_import_total_kwh, self.grid_export_total_kwh, self.peak_grid_import_kwh
        )?;
        writeln!(
            f,
            "BESS charge / disch.:  {:.1} / {:.1} kWh ({:.1} cycles, {:.3}/day)",
            self.bess_charge_total_kwh, self.bess_discharge_total_kwh, self.cycles, self.cycles_per_day
        )?;
        writeln!(
            f,
            "SoC min/mean/max/end:  {:.1}% / {:.1}% / {:.1}% / {:.1}%",
            self.soc_min_percent, self.soc_mean_percent, self.soc_max_percent, self.soc_final_percent
        )?;
        writeln!(f, "CO2 avoided:           {:.2} t", self.co2_avoided_tons)?;
        writeln!(f, "Tariff arbitrage:      {:.2}", self.tariff_arbitrage_savings)?;
        writeln!(f, "Solar direct coverage: {:.1}%", 100.0 * self.solar_direct_coverage)?;
        writeln!(f, "Self-sufficiency:      {:.1}%", 100.0 * self.self_sufficiency)?;
        write!(f, "EV self-sufficiency:   {:.1}%", 100.0 * self.ev_self_sufficiency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, TimeZone};

    fn record(hour_index: usize) -> DispatchRecord {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let start = tz.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        DispatchRecord {
            hour_index,
            timestamp: start + Duration::hours(hour_index as i64),
            pv_kwh: 0.0,
            ev_kwh: 0.0,
            mall_kwh: 0.0,
            pv_to_ev: 0.0,
            pv_to_bess: 0.0,
            pv_to_mall: 0.0,
            pv_to_grid_export: 0.0,
            bess_to_ev: 0.0,
            bess_to_mall: 0.0,
            grid_to_ev: 0.0,
            grid_to_mall: 0.0,
            bess_charge_kwh: 0.0,
            bess_discharge_kwh: 0.0,
            soc_kwh_end: 400.0,
            soc_percent_end: 20.0,
            phase: Phase::Reposo,
        }
    }

    fn dataset(records: Vec<DispatchRecord>) -> AnnualDataset {
        AnnualDataset {
            records,
            initial_soc_kwh: 400.0,
        }
    }

    #[test]
    fn empty_dataset() {
        let s = AnnualSummary::from_dataset(&dataset(vec![]), &DispatchConfig::baseline());
        assert_eq!(s.hours, 0);
        assert_eq!(s.grid_import_total_kwh, 0.0);
        assert_eq!(s.soc_final_kwh, 400.0);
        assert_eq!(s.soc_min_kwh, 400.0);
        assert_eq!(s.self_sufficiency, 1.0);
    }

    #[test]
    fn arbitrage_counts_only_peak_hours() {
        let mut at_19 = record(19);
        at_19.mall_kwh = 100.0;
        at_19.bess_to_mall = 100.0;
        at_19.bess_discharge_kwh = 100.0;
        at_19.phase = Phase::PeakShaving;
        let mut at_12 = record(12);
        at_12.mall_kwh = 100.0;
        at_12.bess_to_mall = 100.0;
        at_12.bess_discharge_kwh = 100.0;
        at_12.phase = Phase::PeakShaving;

        let s = AnnualSummary::from_dataset(&dataset(vec![at_12, at_19]), &DispatchConfig::baseline());
        assert!((s.tariff_arbitrage_savings - 100.0 * (0.45 - 0.28)).abs() < 1e-9);
        assert_eq!(s.hours_per_phase["PHASE_4_PEAK_SHAVING"], 2);
        assert_eq!(s.hours_per_phase["PHASE_1_CARGA"], 0);
    }

    #[test]
    fn co2_and_cycles() {
        let mut a = record(7);
        a.pv_kwh = 500.0;
        a.pv_to_bess = 400.0;
        a.pv_to_mall = 100.0;
        a.mall_kwh = 100.0;
        a.bess_charge_kwh = 400.0;
        let mut b = record(20);
        b.ev_kwh = 200.0;
        b.bess_to_ev = 200.0;
        b.bess_discharge_kwh = 200.0;

        let cfg = DispatchConfig::baseline();
        let s = AnnualSummary::from_dataset(&dataset(vec![a, b]), &cfg);
        assert!((s.co2_avoided_kg - 300.0 * 0.4521).abs() < 1e-9);
        assert!((s.co2_avoided_tons - 0.3 * 0.4521).abs() < 1e-12);
        assert!((s.cycles - 0.2).abs() < 1e-12);
        assert!((s.cycles_per_day - 0.2 / 365.0).abs() < 1e-12);
        assert!((s.bess_energy_stored_kwh - 400.0 * 0.95_f64.sqrt()).abs() < 1e-9);
        assert_eq!(s.ev_self_sufficiency, 1.0);
        assert_eq!(s.self_sufficiency, 1.0);
    }

    #[test]
    fn coverage_ratios() {
        let mut r = record(12);
        r.pv_kwh = 50.0;
        r.ev_kwh = 40.0;
        r.mall_kwh = 60.0;
        r.pv_to_ev = 40.0;
        r.pv_to_mall = 10.0;
        r.grid_to_mall = 50.0;
        let s = AnnualSummary::from_dataset(&dataset(vec![r]), &DispatchConfig::baseline());
        assert!((s.solar_direct_coverage - 0.5).abs() < 1e-12);
        assert!((s.self_sufficiency - 0.5).abs() < 1e-12);
        assert_eq!(s.peak_grid_import_kwh, 50.0);
        assert!((s.grid_import_cost_total - 50.0 * 0.28).abs() < 1e-12);
        assert!((s.cost_if_grid_import_total - 100.0 * 0.28).abs() < 1e-12);
    }

    #[test]
    fn soc_statistics() {
        let mut rs: Vec<_> = (0..4).map(record).collect();
        rs[1].soc_kwh_end = 800.0;
        rs[2].soc_kwh_end = 1200.0;
        rs[3].soc_kwh_end = 600.0;
        let s = AnnualSummary::from_dataset(&dataset(rs), &DispatchConfig::baseline());
        assert_eq!(s.soc_min_kwh, 400.0);
        assert_eq!(s.soc_max_kwh, 1200.0);
        assert_eq!(s.soc_mean_kwh, 750.0);
        assert_eq!(s.soc_final_kwh, 600.0);
        assert!((s.soc_max_percent - 60.0).abs() < 1e-9);
    }
}
