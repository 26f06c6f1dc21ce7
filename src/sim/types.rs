//! Core dispatch types: hourly inputs, operating phases, and dispatch records.

use std::fmt;

use chrono::{DateTime, FixedOffset, Timelike};
use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Exogenous energy for one hour of the year (kWh per hour, all >= 0).
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyInput {
    /// Start of the hour in local time.
    pub timestamp: DateTime<FixedOffset>,
    /// Photovoltaic generation.
    pub pv_kwh: f64,
    /// Electric-vehicle charging demand.
    pub ev_kwh: f64,
    /// Commercial-building (mall) demand.
    pub mall_kwh: f64,
}

impl HourlyInput {
    /// Local hour of day (0..=23).
    pub fn hour_of_day(&self) -> u32 {
        self.timestamp.hour()
    }
}

/// One of the six operating phases of the daily state machine.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
pub enum Phase {
    /// Morning window: BESS charges from PV with top priority.
    #[strum(serialize = "PHASE_1_CARGA")]
    #[serde(rename = "PHASE_1_CARGA")]
    Carga,
    /// Opening hours: EV gets PV first, battery charges from surplus.
    #[strum(serialize = "PHASE_2_EV_BESS")]
    #[serde(rename = "PHASE_2_EV_BESS")]
    EvBess,
    /// Battery full; neither charges nor discharges.
    #[strum(serialize = "PHASE_3_HOLDING")]
    #[serde(rename = "PHASE_3_HOLDING")]
    Holding,
    /// Discharge to cap mall peaks above the threshold.
    #[strum(serialize = "PHASE_4_PEAK_SHAVING")]
    #[serde(rename = "PHASE_4_PEAK_SHAVING")]
    PeakShaving,
    /// Discharge to cover the EV deficit left by PV.
    #[strum(serialize = "PHASE_5_EV_DESCARGA")]
    #[serde(rename = "PHASE_5_EV_DESCARGA")]
    EvDescarga,
    /// Night rest; battery idle.
    #[strum(serialize = "PHASE_6_REPOSO")]
    #[serde(rename = "PHASE_6_REPOSO")]
    Reposo,
}

impl Phase {
    /// Whether the solver may charge the battery from PV surplus.
    pub fn allows_charge(self) -> bool {
        matches!(self, Phase::Carga | Phase::EvBess)
    }

    /// Whether the battery is forced idle for the whole hour.
    pub fn is_idle(self) -> bool {
        matches!(self, Phase::Holding | Phase::Reposo)
    }
}

/// Net battery action during one hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BessMode {
    Charge,
    Discharge,
    Idle,
}

/// Tariff period of an hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
pub enum TariffPeriod {
    /// Peak hours.
    #[strum(serialize = "HP")]
    #[serde(rename = "HP")]
    Hp,
    /// Off-peak hours.
    #[strum(serialize = "HFP")]
    #[serde(rename = "HFP")]
    Hfp,
}

/// Complete solver output for one hour.
///
/// Energies are kWh over the hour and never negative. `pv_to_bess` and
/// `bess_charge_kwh` are measured on the PV side (before the charge loss);
/// `bess_to_*` and `bess_discharge_kwh` on the load side (after the
/// discharge loss).
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRecord {
    /// Position of the hour in the annual series.
    pub hour_index: usize,
    /// Start of the hour in local time.
    pub timestamp: DateTime<FixedOffset>,
    pub pv_kwh: f64,
    pub ev_kwh: f64,
    pub mall_kwh: f64,
    pub pv_to_ev: f64,
    pub pv_to_bess: f64,
    pub pv_to_mall: f64,
    pub pv_to_grid_export: f64,
    pub bess_to_ev: f64,
    pub bess_to_mall: f64,
    pub grid_to_ev: f64,
    pub grid_to_mall: f64,
    pub bess_charge_kwh: f64,
    pub bess_discharge_kwh: f64,
    /// Stored energy at the end of the hour.
    pub soc_kwh_end: f64,
    /// Stored energy at the end of the hour as a percentage of capacity.
    pub soc_percent_end: f64,
    pub phase: Phase,
}

impl DispatchRecord {
    pub fn grid_import_kwh(&self) -> f64 {
        self.grid_to_ev + self.grid_to_mall
    }

    pub fn grid_export_kwh(&self) -> f64 {
        self.pv_to_grid_export
    }

    pub fn bess_mode(&self) -> BessMode {
        if self.bess_charge_kwh > 0.0 {
            BessMode::Charge
        } else if self.bess_discharge_kwh > 0.0 {
            BessMode::Discharge
        } else {
            BessMode::Idle
        }
    }

    /// EV demand left after the battery's contribution.
    pub fn ev_demand_after_bess_kwh(&self) -> f64 {
        (self.ev_kwh - self.bess_to_ev).max(0.0)
    }

    /// Mall demand left after peak shaving.
    pub fn mall_demand_after_bess_kwh(&self) -> f64 {
        (self.mall_kwh - self.bess_to_mall).max(0.0)
    }

    pub fn hour_of_day(&self) -> u32 {
        self.timestamp.hour()
    }
}

impl fmt::Display for DispatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "h={:>4} {} {:<20} | pv={:>8.2} ev={:>7.2} mall={:>8.2} | \
             pv->ev={:.2} pv->bess={:.2} pv->mall={:.2} export={:.2} | \
             bess->ev={:.2} bess->mall={:.2} | grid->ev={:.2} grid->mall={:.2} | SoC={:.1}%",
            self.hour_index,
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.phase,
            self.pv_kwh,
            self.ev_kwh,
            self.mall_kwh,
            self.pv_to_ev,
            self.pv_to_bess,
            self.pv_to_mall,
            self.pv_to_grid_export,
            self.bess_to_ev,
            self.bess_to_mall,
            self.grid_to_ev,
            self.grid_to_mall,
            self.soc_percent_end,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn phase_tags_round_trip_through_strings() {
        assert_eq!(Phase::Carga.to_string(), "PHASE_1_CARGA");
        assert_eq!(Phase::Reposo.to_string(), "PHASE_6_REPOSO");
        assert_eq!(
            Phase::from_str("PHASE_4_PEAK_SHAVING").ok(),
            Some(Phase::PeakShaving)
        );
    }

    #[test]
    fn phase_tags_are_numbered_in_order() {
        use strum::IntoEnumIterator;
        for (i, phase) in Phase::iter().enumerate() {
            let tag = phase.to_string();
            assert!(tag.starts_with(&format!("PHASE_{}_", i + 1)), "{tag}");
        }
        assert_eq!(Phase::iter().count(), 6);
    }

    #[test]
    fn only_charging_phases_allow_charge() {
        assert!(Phase::Carga.allows_charge());
        assert!(Phase::EvBess.allows_charge());
        assert!(!Phase::Holding.allows_charge());
        assert!(!Phase::PeakShaving.allows_charge());
        assert!(!Phase::EvDescarga.allows_charge());
        assert!(!Phase::Reposo.allows_charge());
    }

    #[test]
    fn mode_and_tariff_labels() {
        assert_eq!(BessMode::Discharge.to_string(), "discharge");
        assert_eq!(TariffPeriod::Hp.to_string(), "HP");
        assert_eq!(TariffPeriod::Hfp.to_string(), "HFP");
    }
}
