//! Phase classifier for the daily BESS state machine.

use crate::config::{DispatchConfig, ScheduleConfig};

use super::types::Phase;

/// Thresholds the classifier reads from the configuration.
#[derive(Debug, Clone)]
pub struct PhaseRules {
    schedule: ScheduleConfig,
    holding_soc_fraction: f64,
    soc_min_fraction: f64,
}

impl PhaseRules {
    pub fn from_config(cfg: &DispatchConfig) -> Self {
        Self {
            schedule: cfg.schedule.clone(),
            holding_soc_fraction: cfg.battery.holding_soc_fraction,
            soc_min_fraction: cfg.battery.soc_min_fraction,
        }
    }

    /// Maps the hour's conditions to exactly one operating phase.
    ///
    /// Guards, first match wins:
    ///
    /// 1. night (`hour >= closing` or `hour < charge_window_start`) → `Reposo`
    /// 2. morning charge window → `Carga`
    /// 3. `pv < mall`, `mall > threshold`, SoC above floor → `PeakShaving`
    /// 4. PV short of EV demand, SoC above floor → `EvDescarga`
    /// 5. SoC at or above the holding level → `Holding`
    /// 6. otherwise → `EvBess`
    ///
    /// The deficit phases sit ahead of `Holding` so that a full battery still
    /// serves an evening deficit.
    pub fn classify(
        &self,
        hour: u32,
        soc_fraction: f64,
        pv_kwh: f64,
        ev_kwh: f64,
        mall_kwh: f64,
    ) -> Phase {
        if self.schedule.is_night(hour) {
            return Phase::Reposo;
        }
        if self.schedule.is_charge_window(hour) {
            return Phase::Carga;
        }

        let above_floor = soc_fraction > self.soc_min_fraction;
        if self.peak_guard(soc_fraction, pv_kwh, mall_kwh) {
            return Phase::PeakShaving;
        }
        let pv_to_ev_potential = pv_kwh.min(ev_kwh);
        if pv_to_ev_potential < ev_kwh && above_floor {
            return Phase::EvDescarga;
        }
        if soc_fraction >= self.holding_soc_fraction {
            return Phase::Holding;
        }
        Phase::EvBess
    }

    /// Peak-shaving trigger, reused by the solver after the EV discharge.
    pub fn peak_guard(&self, soc_fraction: f64, pv_kwh: f64, mall_kwh: f64) -> bool {
        pv_kwh < mall_kwh
            && mall_kwh > self.schedule.peak_shaving_threshold_kw
            && soc_fraction > self.soc_min_fraction
    }

    /// SoC fraction at or above which charging stops.
    pub fn holding_soc_fraction(&self) -> f64 {
        self.holding_soc_fraction
    }
}
