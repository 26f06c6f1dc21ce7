//! Per-hour priority waterfall that routes PV, battery, and grid energy.

use crate::config::DispatchConfig;
use crate::devices::Battery;
use crate::error::Error;

use super::phase::PhaseRules;
use super::types::{DispatchRecord, HourlyInput, Phase};
use super::validate::{Limits, check_hour};

/// Rule-based dispatch solver.
///
/// The solver holds no state of its own; the battery is passed in and
/// mutated through its `charge`/`discharge`/`idle` methods only.
#[derive(Debug, Clone)]
pub struct DispatchSolver {
    rules: PhaseRules,
    limits: Limits,
}

impl DispatchSolver {
    pub fn new(cfg: &DispatchConfig) -> Self {
        Self {
            rules: PhaseRules::from_config(cfg),
            limits: Limits::from_config(cfg),
        }
    }

    pub fn rules(&self) -> &PhaseRules {
        &self.rules
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Classifies the hour against the battery's current SoC.
    pub fn classify(&self, input: &HourlyInput, battery: &Battery) -> Phase {
        self.rules.classify(
            input.hour_of_day(),
            battery.soc_fraction(),
            input.pv_kwh,
            input.ev_kwh,
            input.mall_kwh,
        )
    }

    /// Dispatches one hour under the given phase.
    ///
    /// Waterfall: PV→EV, PV→BESS (charging phases), PV→mall, BESS→EV,
    /// BESS→mall (peak shaving), grid backfill, PV export. The battery stays
    /// idle in `Holding` and `Reposo`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Battery` if the battery rejects an operation and
    /// `Error::Solver` if the finished record breaks an hourly invariant.
    pub fn solve(
        &self,
        hour_index: usize,
        input: &HourlyInput,
        phase: Phase,
        battery: &mut Battery,
    ) -> Result<DispatchRecord, Error> {
        battery.begin_hour();

        let pv = input.pv_kwh;
        let ev = input.ev_kwh;
        let mall = input.mall_kwh;

        // 1. PV → EV
        let pv_to_ev = pv.min(ev);
        let mut pv_rem = pv - pv_to_ev;
        let mut ev_rem = ev - pv_to_ev;

        // 2. PV → BESS
        let mut pv_to_bess = 0.0;
        if phase.allows_charge()
            && pv_rem > 0.0
            && battery.soc_fraction() < self.rules.holding_soc_fraction()
        {
            pv_to_bess = battery.charge(pv_rem)?;
            pv_rem -= pv_to_bess;
        }

        // 3. PV → mall
        let pv_to_mall = pv_rem.min(mall);
        pv_rem -= pv_to_mall;
        let mut mall_rem = mall - pv_to_mall;

        let mut bess_to_ev = 0.0;
        let mut bess_to_mall = 0.0;
        if phase.is_idle() {
            battery.idle();
        } else {
            // 4. BESS → EV
            if ev_rem > 0.0 && battery.above_floor() {
                bess_to_ev = battery.discharge(ev_rem)?;
                ev_rem -= bess_to_ev;
            }

            // 5. BESS → mall, only while the peak guard still holds
            if phase == Phase::PeakShaving
                && mall_rem > 0.0
                && self.rules.peak_guard(battery.soc_fraction(), pv, mall)
            {
                bess_to_mall = battery.discharge(mall_rem)?;
                mall_rem -= bess_to_mall;
            }
        }

        // 6. grid backfill, 7. export
        let grid_to_ev = ev_rem.max(0.0);
        let grid_to_mall = mall_rem.max(0.0);
        let pv_to_grid_export = pv_rem.max(0.0);

        let record = DispatchRecord {
            hour_index,
            timestamp: input.timestamp,
            pv_kwh: pv,
            ev_kwh: ev,
            mall_kwh: mall,
            pv_to_ev,
            pv_to_bess,
            pv_to_mall,
            pv_to_grid_export,
            bess_to_ev,
            bess_to_mall,
            grid_to_ev,
            grid_to_mall,
            bess_charge_kwh: battery.charged_this_hour(),
            bess_discharge_kwh: battery.discharged_this_hour(),
            soc_kwh_end: battery.soc_kwh(),
            soc_percent_end: battery.soc_percent(),
            phase,
        };

        check_hour(&record, &self.limits)?;
        Ok(record)
    }
}
