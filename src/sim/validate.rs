//! Hourly and annual invariant checks for dispatch records.
//!
//! The solver runs [`check_hour`] after every step; [`validate_dataset`]
//! re-runs the same checks over a finished year and adds the SoC-trace check.

use chrono::Duration;
use serde::Serialize;

use crate::config::{DispatchConfig, ScheduleConfig};
use crate::error::SolverInvariantError;

use super::types::DispatchRecord;

/// Tolerance for the energy-balance invariants (kWh).
pub const BALANCE_TOL_KWH: f64 = 1e-2;

/// Tolerance for bound and continuity checks (kWh).
const STATE_TOL_KWH: f64 = 1e-6;

/// Physical limits every record is checked against.
#[derive(Debug, Clone)]
pub struct Limits {
    pub soc_min_kwh: f64,
    pub soc_max_kwh: f64,
    pub power_kw: f64,
    pub dt_hours: f64,
    pub eta_one_way: f64,
    schedule: ScheduleConfig,
}

impl Limits {
    pub fn from_config(cfg: &DispatchConfig) -> Self {
        let b = &cfg.battery;
        Self {
            soc_min_kwh: b.soc_min_fraction * b.capacity_kwh,
            soc_max_kwh: b.soc_max_fraction * b.capacity_kwh,
            power_kw: b.power_kw,
            dt_hours: 1.0,
            eta_one_way: cfg.one_way_efficiency(),
            schedule: cfg.schedule.clone(),
        }
    }
}

/// Worst residuals observed over a validated dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub hours_checked: usize,
    pub max_pv_imbalance_kwh: f64,
    pub max_ev_imbalance_kwh: f64,
    pub max_mall_imbalance_kwh: f64,
    pub max_soc_trace_error_kwh: f64,
}

fn violation(r: &DispatchRecord, invariant: &'static str) -> SolverInvariantError {
    SolverInvariantError {
        hour: r.hour_index,
        invariant,
        record: format!("{r:?}"),
    }
}

fn pv_residual(r: &DispatchRecord) -> f64 {
    (r.pv_kwh - (r.pv_to_ev + r.pv_to_bess + r.pv_to_mall + r.pv_to_grid_export)).abs()
}

fn ev_residual(r: &DispatchRecord) -> f64 {
    (r.ev_kwh - (r.pv_to_ev + r.bess_to_ev + r.grid_to_ev)).abs()
}

fn mall_residual(r: &DispatchRecord) -> f64 {
    (r.mall_kwh - (r.pv_to_mall + r.bess_to_mall + r.grid_to_mall)).abs()
}

/// Checks the per-hour invariants of one record.
///
/// # Errors
///
/// Returns the first violated invariant with the record dumped.
pub fn check_hour(r: &DispatchRecord, limits: &Limits) -> Result<(), SolverInvariantError> {
    let flows = [
        r.pv_to_ev,
        r.pv_to_bess,
        r.pv_to_mall,
        r.pv_to_grid_export,
        r.bess_to_ev,
        r.bess_to_mall,
        r.grid_to_ev,
        r.grid_to_mall,
        r.bess_charge_kwh,
        r.bess_discharge_kwh,
    ];
    if flows.iter().any(|&f| !f.is_finite() || f < 0.0) {
        return Err(violation(r, "non_negative_flows"));
    }
    if pv_residual(r) > BALANCE_TOL_KWH {
        return Err(violation(r, "pv_balance"));
    }
    if ev_residual(r) > BALANCE_TOL_KWH {
        return Err(violation(r, "ev_balance"));
    }
    if mall_residual(r) > BALANCE_TOL_KWH {
        return Err(violation(r, "mall_balance"));
    }
    if r.bess_charge_kwh * r.bess_discharge_kwh != 0.0 {
        return Err(violation(r, "charge_discharge_exclusive"));
    }
    if r.soc_kwh_end < limits.soc_min_kwh - STATE_TOL_KWH
        || r.soc_kwh_end > limits.soc_max_kwh + STATE_TOL_KWH
    {
        return Err(violation(r, "soc_bounds"));
    }
    let cap = limits.power_kw * limits.dt_hours + STATE_TOL_KWH;
    if r.bess_charge_kwh > cap || r.bess_discharge_kwh > cap {
        return Err(violation(r, "power_cap"));
    }
    if limits.schedule.is_night(r.hour_of_day())
        && (r.bess_charge_kwh != 0.0 || r.bess_discharge_kwh != 0.0)
    {
        return Err(violation(r, "night_rest"));
    }
    Ok(())
}

/// Re-checks every hour of a finished dataset plus the SoC trace.
///
/// The trace check verifies that each hour's SoC follows from the previous
/// one through the recorded charge and discharge, that it never leaves its
/// bounds, and that hours are contiguous.
///
/// # Errors
///
/// Returns the first violated invariant.
pub fn validate_dataset(
    records: &[DispatchRecord],
    limits: &Limits,
    initial_soc_kwh: f64,
) -> Result<ValidationReport, SolverInvariantError> {
    let mut report = ValidationReport::default();
    let mut prev_soc = initial_soc_kwh;
    let mut prev: Option<&DispatchRecord> = None;

    for r in records {
        check_hour(r, limits)?;

        if let Some(p) = prev {
            if r.hour_index != p.hour_index + 1 || r.timestamp - p.timestamp != Duration::hours(1)
            {
                return Err(violation(r, "contiguous_hours"));
            }
        }

        let expected =
            prev_soc + r.bess_charge_kwh * limits.eta_one_way - r.bess_discharge_kwh / limits.eta_one_way;
        let trace_err = (r.soc_kwh_end - expected).abs();
        if trace_err > STATE_TOL_KWH {
            return Err(violation(r, "soc_trace"));
        }

        report.hours_checked += 1;
        report.max_pv_imbalance_kwh = report.max_pv_imbalance_kwh.max(pv_residual(r));
        report.max_ev_imbalance_kwh = report.max_ev_imbalance_kwh.max(ev_residual(r));
        report.max_mall_imbalance_kwh = report.max_mall_imbalance_kwh.max(mall_residual(r));
        report.max_soc_trace_error_kwh = report.max_soc_trace_error_kwh.max(trace_err);

        prev_soc = r.soc_kwh_end;
        prev = Some(r);
    }

    Ok(report)
}
