//! HP/HFP time-of-use tariff schedule.

use crate::config::TariffConfig;

use super::types::TariffPeriod;

/// Two-period tariff: HP inside `[hp_start_hour, hp_end_hour)`, HFP elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct TariffSchedule {
    hp_start_hour: u32,
    hp_end_hour: u32,
    hp_rate: f64,
    hfp_rate: f64,
}

impl TariffSchedule {
    pub fn from_config(cfg: &TariffConfig) -> Self {
        Self {
            hp_start_hour: cfg.hp_start_hour,
            hp_end_hour: cfg.hp_end_hour,
            hp_rate: cfg.hp_rate,
            hfp_rate: cfg.hfp_rate,
        }
    }

    pub fn period(&self, hour: u32) -> TariffPeriod {
        if (self.hp_start_hour..self.hp_end_hour).contains(&hour) {
            TariffPeriod::Hp
        } else {
            TariffPeriod::Hfp
        }
    }

    /// Energy price for the given local hour.
    pub fn rate(&self, hour: u32) -> f64 {
        match self.period(hour) {
            TariffPeriod::Hp => self.hp_rate,
            TariffPeriod::Hfp => self.hfp_rate,
        }
    }

    /// Value of shifting one kWh into this hour relative to off-peak.
    ///
    /// Zero outside HP hours.
    pub fn arbitrage_spread(&self, hour: u32) -> f64 {
        match self.period(hour) {
            TariffPeriod::Hp => self.hp_rate - self.hfp_rate,
            TariffPeriod::Hfp => 0.0,
        }
    }
}
