//! Seeded synthetic annual profiles for demos and tests.
//!
//! Produces a PV/EV/mall year with the same shape as the reference site:
//! a half-sine PV day, EV charging during opening hours with an evening
//! peak, and a mall load whose evening peak crosses the peak-shaving
//! threshold.

use std::f64::consts::PI;

use chrono::{Datelike, Timelike, Weekday};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::config::InputConfig;
use crate::error::Error;
use crate::io::input::hourly_index;
use crate::sim::types::HourlyInput;

/// Parameters of the synthetic year.
#[derive(Debug, Clone)]
pub struct SyntheticProfile {
    /// First and last+1 daylight hours.
    pub sunrise_hour: u32,
    pub sunset_hour: u32,
    /// Clear-sky PV energy at solar noon (kWh per hour).
    pub pv_peak_kwh: f64,
    /// Lowest daily clear-sky fraction (overcast day).
    pub pv_min_clearness: f64,
    pub pv_noise_std: f64,
    /// EV charging window, `[ev_start_hour, ev_end_hour)`.
    pub ev_start_hour: u32,
    pub ev_end_hour: u32,
    pub ev_peak_kwh: f64,
    pub ev_peak_hour: f64,
    /// Mall opening hours, `[mall_open_hour, mall_close_hour)`.
    pub mall_open_hour: u32,
    pub mall_close_hour: u32,
    pub mall_night_kwh: f64,
    pub mall_day_kwh: f64,
    pub mall_peak_kwh: f64,
    pub mall_peak_hour: f64,
    pub weekend_factor: f64,
    pub load_noise_std: f64,
    pub seed: u64,
}

impl Default for SyntheticProfile {
    fn default() -> Self {
        Self {
            sunrise_hour: 6,
            sunset_hour: 18,
            pv_peak_kwh: 2200.0,
            pv_min_clearness: 0.55,
            pv_noise_std: 0.08,
            ev_start_hour: 9,
            ev_end_hour: 22,
            ev_peak_kwh: 160.0,
            ev_peak_hour: 19.0,
            mall_open_hour: 9,
            mall_close_hour: 22,
            mall_night_kwh: 450.0,
            mall_day_kwh: 1300.0,
            mall_peak_kwh: 2250.0,
            mall_peak_hour: 19.5,
            weekend_factor: 1.08,
            load_noise_std: 0.05,
            seed: 42,
        }
    }
}

impl SyntheticProfile {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Clear-sky PV fraction of the hour (0 outside daylight).
    fn daylight_frac(&self, hour: u32) -> f64 {
        if hour < self.sunrise_hour || hour >= self.sunset_hour {
            return 0.0;
        }
        let span = f64::from(self.sunset_hour - self.sunrise_hour);
        let x = (f64::from(hour - self.sunrise_hour) + 0.5) / span;
        (PI * x).sin()
    }

    fn ev_shape(&self, hour: u32) -> f64 {
        if hour < self.ev_start_hour || hour >= self.ev_end_hour {
            return 0.0;
        }
        let d = f64::from(hour) - self.ev_peak_hour;
        0.3 + 0.7 * (-d * d / 8.0).exp()
    }

    fn mall_shape(&self, hour: u32) -> f64 {
        if hour < self.mall_open_hour || hour >= self.mall_close_hour {
            return self.mall_night_kwh;
        }
        let d = f64::from(hour) - self.mall_peak_hour;
        self.mall_day_kwh + (self.mall_peak_kwh - self.mall_day_kwh) * (-d * d / 4.0).exp()
    }

    /// Generates one year on the index of `cfg`.
    ///
    /// Identical seeds give identical years.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the index cannot be built.
    pub fn generate(&self, cfg: &InputConfig) -> Result<Vec<HourlyInput>, Error> {
        let index = hourly_index(cfg)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut clearness = 1.0;

        Ok(index
            .into_iter()
            .map(|timestamp| {
                let hour = timestamp.hour();
                if hour == 0 {
                    clearness = rng.random_range(self.pv_min_clearness..=1.0);
                }
                let weekend = matches!(timestamp.weekday(), Weekday::Sat | Weekday::Sun);
                let load_factor = if weekend { self.weekend_factor } else { 1.0 };

                let pv = self.pv_peak_kwh
                    * self.daylight_frac(hour)
                    * clearness
                    * (1.0 + gaussian_noise(&mut rng, self.pv_noise_std));
                let ev = self.ev_peak_kwh
                    * self.ev_shape(hour)
                    * load_factor
                    * (1.0 + gaussian_noise(&mut rng, self.load_noise_std));
                let mall = self.mall_shape(hour)
                    * load_factor
                    * (1.0 + gaussian_noise(&mut rng, self.load_noise_std));

                HourlyInput {
                    timestamp,
                    pv_kwh: pv.max(0.0),
                    ev_kwh: ev.max(0.0),
                    mall_kwh: mall.max(0.0),
                }
            })
            .collect())
    }
}

/// Box-Muller standard normal scaled by `std_dev`.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos() * std_dev
}
