//! Randomized hourly and multi-day dispatch must never break a physical invariant.

use chrono::{Duration, FixedOffset, TimeZone};
use proptest::prelude::*;

use bess_dispatch::config::DispatchConfig;
use bess_dispatch::devices::Battery;
use bess_dispatch::sim::engine::Simulator;
use bess_dispatch::sim::solver::DispatchSolver;
use bess_dispatch::sim::types::{HourlyInput, Phase};
use bess_dispatch::sim::validate::check_hour;

fn input_at(index: u32, pv: f64, ev: f64, mall: f64) -> HourlyInput {
    let tz = FixedOffset::west_opt(5 * 3600).unwrap();
    let start = tz.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
    HourlyInput {
        timestamp: start + Duration::hours(i64::from(index)),
        pv_kwh: pv,
        ev_kwh: ev,
        mall_kwh: mall,
    }
}

fn hour_strategy() -> impl Strategy<Value = (f64, f64, f64)> {
    (0.0..3000.0f64, 0.0..800.0f64, 0.0..3000.0f64)
}

proptest! {
    #[test]
    fn single_hour_respects_invariants(
        hour in 0u32..24,
        soc_fraction in 0.2f64..=1.0,
        (pv, ev, mall) in hour_strategy(),
    ) {
        let cfg = DispatchConfig::baseline();
        let solver = DispatchSolver::new(&cfg);
        let soc = soc_fraction * cfg.battery.capacity_kwh;
        let mut battery = Battery::with_soc_kwh(&cfg.battery, soc).unwrap();
        let input = input_at(hour, pv, ev, mall);

        let phase = solver.classify(&input, &battery);
        let r = solver.solve(0, &input, phase, &mut battery).unwrap();
        prop_assert!(check_hour(&r, solver.limits()).is_ok());

        let limits = solver.limits();
        prop_assert!(r.soc_kwh_end >= limits.soc_min_kwh - 1e-6);
        prop_assert!(r.soc_kwh_end <= limits.soc_max_kwh + 1e-6);
        prop_assert!(r.bess_charge_kwh <= limits.power_kw + 1e-6);
        prop_assert!(r.bess_discharge_kwh <= limits.power_kw + 1e-6);
        prop_assert!(r.bess_charge_kwh == 0.0 || r.bess_discharge_kwh == 0.0);
        prop_assert!(r.grid_import_kwh() <= ev + mall + 1e-6);
        if !(6..22).contains(&hour) {
            prop_assert_eq!(r.phase, Phase::Reposo);
            prop_assert_eq!(r.bess_charge_kwh, 0.0);
            prop_assert_eq!(r.bess_discharge_kwh, 0.0);
        }
    }

    #[test]
    fn random_days_pass_dataset_validation(
        hours in prop::collection::vec(hour_strategy(), 48..=72),
        soc_fraction in 0.2f64..=1.0,
    ) {
        let cfg = DispatchConfig::baseline();
        let soc = soc_fraction * cfg.battery.capacity_kwh;
        let inputs: Vec<HourlyInput> = hours
            .iter()
            .enumerate()
            .map(|(i, &(pv, ev, mall))| input_at(i as u32, pv, ev, mall))
            .collect();

        let mut sim = Simulator::with_initial_soc(cfg, soc).unwrap();
        let ds = sim.run(&inputs).unwrap();
        prop_assert_eq!(ds.len(), inputs.len());

        let report = sim.validate(&ds).unwrap();
        prop_assert_eq!(report.hours_checked, inputs.len());
        prop_assert!(report.max_soc_trace_error_kwh <= 1e-6);
    }
}
