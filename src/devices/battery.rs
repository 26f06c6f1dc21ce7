use crate::config::BatteryConfig;
use crate::error::BatteryInvariantError;

/// Slack allowed when comparing SoC against its bounds (kWh).
const SOC_EPS_KWH: f64 = 1e-9;

/// A battery energy storage system with a DoD floor, power cap, and
/// symmetric round-trip losses.
///
/// `Battery` owns the single mutable state-of-charge value of a simulation.
/// Efficiency is applied as `sqrt(eta)` on each direction, so one full
/// charge + discharge cycle returns `eta` of the energy drawn.
///
/// The power cap is enforced per hour across all calls made between two
/// [`Battery::begin_hour`] calls, and a battery that charged during an hour
/// refuses to discharge in the same hour (and vice versa).
#[derive(Debug, Clone)]
pub struct Battery {
    /// Nameplate capacity in kilowatt-hours.
    pub capacity_kwh: f64,

    /// Power limit per direction in kilowatts.
    pub power_kw: f64,

    /// SoC floor in kWh.
    soc_min_kwh: f64,

    /// SoC ceiling in kWh.
    soc_max_kwh: f64,

    /// One-way efficiency, `sqrt(round_trip_efficiency)`.
    eta_one_way: f64,

    /// Stored energy in kWh.
    soc_kwh: f64,

    /// Energy drawn from the source side so far this hour.
    charged_this_hour: f64,

    /// Energy delivered to the load side so far this hour.
    discharged_this_hour: f64,

    /// Duration of one timestep in hours.
    dt_hours: f64,
}

impl Battery {
    /// Creates a battery at `soc_initial_fraction` of capacity.
    ///
    /// # Errors
    ///
    /// Returns a `BatteryInvariantError` if the initial SoC is outside bounds.
    pub fn from_config(cfg: &BatteryConfig) -> Result<Self, BatteryInvariantError> {
        Self::with_soc_kwh(cfg, cfg.soc_initial_fraction * cfg.capacity_kwh)
    }

    /// Creates a battery holding `soc_kwh` of stored energy.
    ///
    /// # Errors
    ///
    /// Returns a `BatteryInvariantError` if `soc_kwh` is outside
    /// `[soc_min_fraction, soc_max_fraction] * capacity`.
    pub fn with_soc_kwh(cfg: &BatteryConfig, soc_kwh: f64) -> Result<Self, BatteryInvariantError> {
        let battery = Self {
            capacity_kwh: cfg.capacity_kwh,
            power_kw: cfg.power_kw,
            soc_min_kwh: cfg.soc_min_fraction * cfg.capacity_kwh,
            soc_max_kwh: cfg.soc_max_fraction * cfg.capacity_kwh,
            eta_one_way: cfg.round_trip_efficiency.sqrt(),
            soc_kwh,
            charged_this_hour: 0.0,
            discharged_this_hour: 0.0,
            dt_hours: 1.0,
        };
        battery.check_bounds("initial state")?;
        Ok(battery)
    }

    /// Resets the per-hour power budget. Call once before each hour.
    pub fn begin_hour(&mut self) {
        self.charged_this_hour = 0.0;
        self.discharged_this_hour = 0.0;
    }

    /// Charges from a source offering `requested_kwh`.
    ///
    /// The request is clipped to the remaining power budget and to the
    /// headroom below the ceiling. Returns the energy drawn from the source;
    /// the stored delta is that amount times `sqrt(eta)`.
    ///
    /// # Errors
    ///
    /// Returns a `BatteryInvariantError` if the battery already discharged
    /// this hour or if SoC would leave its bounds.
    pub fn charge(&mut self, requested_kwh: f64) -> Result<f64, BatteryInvariantError> {
        if requested_kwh <= 0.0 {
            return Ok(0.0);
        }
        if self.discharged_this_hour > 0.0 {
            return Err(self.violation("charge requested in an hour that already discharged"));
        }

        let power_left = (self.power_kw * self.dt_hours - self.charged_this_hour).max(0.0);
        let headroom = ((self.soc_max_kwh - self.soc_kwh) / self.eta_one_way).max(0.0);
        let accepted = requested_kwh.min(power_left).min(headroom);
        if accepted <= 0.0 {
            return Ok(0.0);
        }

        self.soc_kwh += accepted * self.eta_one_way;
        self.charged_this_hour += accepted;
        self.settle("charge")?;
        Ok(accepted)
    }

    /// Discharges to cover a load of `requested_kwh`.
    ///
    /// The request is clipped to the remaining power budget and to what the
    /// usable energy above the floor can deliver. Returns the energy delivered
    /// to the load; the stored delta is that amount divided by `sqrt(eta)`.
    ///
    /// # Errors
    ///
    /// Returns a `BatteryInvariantError` if the battery already charged this
    /// hour or if SoC would leave its bounds.
    pub fn discharge(&mut self, requested_kwh: f64) -> Result<f64, BatteryInvariantError> {
        if requested_kwh <= 0.0 {
            return Ok(0.0);
        }
        if self.charged_this_hour > 0.0 {
            return Err(self.violation("discharge requested in an hour that already charged"));
        }

        let power_left = (self.power_kw * self.dt_hours - self.discharged_this_hour).max(0.0);
        let available = ((self.soc_kwh - self.soc_min_kwh) * self.eta_one_way).max(0.0);
        let delivered = requested_kwh.min(power_left).min(available);
        if delivered <= 0.0 {
            return Ok(0.0);
        }

        self.soc_kwh -= delivered / self.eta_one_way;
        self.discharged_this_hour += delivered;
        self.settle("discharge")?;
        Ok(delivered)
    }

    /// Leaves the battery untouched for this hour.
    pub fn idle(&mut self) {}

    /// Stored energy in kWh.
    pub fn soc_kwh(&self) -> f64 {
        self.soc_kwh
    }

    /// Stored energy as a fraction of capacity.
    pub fn soc_fraction(&self) -> f64 {
        self.soc_kwh / self.capacity_kwh
    }

    pub fn soc_percent(&self) -> f64 {
        self.soc_fraction() * 100.0
    }

    pub fn soc_min_kwh(&self) -> f64 {
        self.soc_min_kwh
    }

    pub fn soc_max_kwh(&self) -> f64 {
        self.soc_max_kwh
    }

    /// True when there is usable energy above the floor.
    pub fn above_floor(&self) -> bool {
        self.soc_kwh > self.soc_min_kwh
    }

    /// Energy drawn from the source side since the last `begin_hour`.
    pub fn charged_this_hour(&self) -> f64 {
        self.charged_this_hour
    }

    /// Energy delivered to the load side since the last `begin_hour`.
    pub fn discharged_this_hour(&self) -> f64 {
        self.discharged_this_hour
    }

    /// Snaps float noise at the bounds and fails on a real excursion.
    fn settle(&mut self, op: &str) -> Result<(), BatteryInvariantError> {
        self.check_bounds(op)?;
        self.soc_kwh = self.soc_kwh.clamp(self.soc_min_kwh, self.soc_max_kwh);
        Ok(())
    }

    fn check_bounds(&self, op: &str) -> Result<(), BatteryInvariantError> {
        if !self.soc_kwh.is_finite()
            || self.soc_kwh < self.soc_min_kwh - SOC_EPS_KWH
            || self.soc_kwh > self.soc_max_kwh + SOC_EPS_KWH
        {
            return Err(self.violation(&format!(
                "{op} left SoC outside [{:.6}, {:.6}] kWh",
                self.soc_min_kwh, self.soc_max_kwh
            )));
        }
        Ok(())
    }

    fn violation(&self, message: &str) -> BatteryInvariantError {
        BatteryInvariantError {
            soc_kwh: self.soc_kwh,
            message: message.to_string(),
        }
    }
}
