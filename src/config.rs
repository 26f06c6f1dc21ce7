//! TOML-based dispatch configuration and preset definitions.

use std::fs;
use std::path::Path;

use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};

pub use crate::error::ConfigError;

/// Top-level engine configuration parsed from TOML.
///
/// All fields have defaults matching the reference installation. Load from
/// TOML with [`DispatchConfig::from_toml_file`] or use
/// [`DispatchConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Battery energy storage parameters.
    #[serde(default)]
    pub battery: BatteryConfig,
    /// Daily operating windows and peak-shaving trigger.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// HP/HFP tariff table.
    #[serde(default)]
    pub tariff: TariffConfig,
    /// Grid emission factor.
    #[serde(default)]
    pub emissions: EmissionsConfig,
    /// Calendar and input-normalization options.
    #[serde(default)]
    pub input: InputConfig,
}

/// Battery energy storage parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Nameplate capacity (kWh).
    pub capacity_kwh: f64,
    /// Charge and discharge power limit (kW).
    pub power_kw: f64,
    /// Depth of discharge (usable fraction of capacity).
    pub dod: f64,
    /// Round-trip efficiency, applied as `sqrt(eta)` per direction.
    pub round_trip_efficiency: f64,
    /// SoC floor as a fraction of capacity (`1 - dod`).
    pub soc_min_fraction: f64,
    /// SoC ceiling as a fraction of capacity.
    pub soc_max_fraction: f64,
    /// SoC at simulation start as a fraction of capacity.
    pub soc_initial_fraction: f64,
    /// SoC fraction at or above which the battery is considered full.
    pub holding_soc_fraction: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_kwh: 2000.0,
            power_kw: 400.0,
            dod: 0.80,
            round_trip_efficiency: 0.95,
            soc_min_fraction: 0.20,
            soc_max_fraction: 1.00,
            soc_initial_fraction: 0.20,
            holding_soc_fraction: 0.99,
        }
    }
}

/// Daily operating windows (local hours, `[start, end)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    /// First hour of the morning BESS charge window.
    pub charge_window_start: u32,
    /// Opening hour; ends the charge window and starts the parallel window.
    pub opening_hour: u32,
    /// Closing hour; starts the night rest window.
    pub closing_hour: u32,
    /// Mall load level above which peak shaving triggers (kW).
    pub peak_shaving_threshold_kw: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            charge_window_start: 6,
            opening_hour: 9,
            closing_hour: 22,
            peak_shaving_threshold_kw: 1900.0,
        }
    }
}

impl ScheduleConfig {
    /// True for hours in `[closing_hour, 24) ∪ [0, charge_window_start)`.
    pub fn is_night(&self, hour: u32) -> bool {
        hour >= self.closing_hour || hour < self.charge_window_start
    }

    /// True for hours in `[charge_window_start, opening_hour)`.
    pub fn is_charge_window(&self, hour: u32) -> bool {
        (self.charge_window_start..self.opening_hour).contains(&hour)
    }
}

/// HP (peak) / HFP (off-peak) energy tariff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TariffConfig {
    /// First HP hour (inclusive).
    pub hp_start_hour: u32,
    /// Last HP hour (exclusive).
    pub hp_end_hour: u32,
    /// Tariff during HP hours (currency per kWh).
    pub hp_rate: f64,
    /// Tariff during all other hours (currency per kWh).
    pub hfp_rate: f64,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            hp_start_hour: 18,
            hp_end_hour: 23,
            hp_rate: 0.45,
            hfp_rate: 0.28,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmissionsConfig {
    /// Grid carbon intensity (kg CO2 per kWh imported).
    pub co2_grid_kg_per_kwh: f64,
}

impl Default for EmissionsConfig {
    fn default() -> Self {
        Self {
            co2_grid_kg_per_kwh: 0.4521,
        }
    }
}

/// Calendar and input-normalization options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    /// Calendar year of the hourly index.
    ///
    /// The index always holds 8,760 hours from January 1st 00:00, so in a
    /// leap year such as the default 2024 it ends on December 30th 23:00.
    pub year: i32,
    /// Fixed local offset from UTC in hours (no DST).
    pub utc_offset_hours: i32,
    /// Truncate a mall series longer than one year instead of rejecting it.
    pub truncate_mall_overflow: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            year: 2024,
            utc_offset_hours: -5,
            truncate_mall_overflow: false,
        }
    }
}

impl InputConfig {
    /// Configured local offset, `None` if out of chrono's range.
    pub fn fixed_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
    }

    /// Local midnight of January 1st of the configured year.
    pub fn start_of_year(&self) -> Option<DateTime<FixedOffset>> {
        self.fixed_offset()?
            .with_ymd_and_hms(self.year, 1, 1, 0, 0, 0)
            .single()
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::baseline()
    }
}

impl DispatchConfig {
    /// Returns the reference installation: 2000 kWh / 400 kW BESS.
    pub fn baseline() -> Self {
        Self {
            battery: BatteryConfig::default(),
            schedule: ScheduleConfig::default(),
            tariff: TariffConfig::default(),
            emissions: EmissionsConfig::default(),
            input: InputConfig::default(),
        }
    }

    /// Returns the early-design sizing with a 940 kWh pack.
    pub fn compact_bess() -> Self {
        Self {
            battery: BatteryConfig {
                capacity_kwh: 940.0,
                ..BatteryConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Returns the expansion study sizing with a 3022 kWh pack.
    pub fn expanded_bess() -> Self {
        Self {
            battery: BatteryConfig {
                capacity_kwh: 3022.0,
                ..BatteryConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "compact_bess", "expanded_bess"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "compact_bess" => Ok(Self::compact_bess()),
            "expanded_bess" => Ok(Self::expanded_bess()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Square root of the round-trip efficiency, applied once per direction.
    pub fn one_way_efficiency(&self) -> f64 {
        self.battery.round_trip_efficiency.sqrt()
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if the configuration is physically possible.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ConfigError {
                field: field.to_string(),
                message,
            });
        };

        let b = &self.battery;
        if !(b.capacity_kwh > 0.0) {
            push("battery.capacity_kwh", "must be > 0".into());
        }
        if !(b.power_kw > 0.0) {
            push("battery.power_kw", "must be > 0".into());
        }
        if !(b.dod > 0.0 && b.dod <= 1.0) {
            push("battery.dod", "must be in (0, 1]".into());
        }
        if !(b.round_trip_efficiency > 0.0 && b.round_trip_efficiency <= 1.0) {
            push("battery.round_trip_efficiency", "must be in (0, 1]".into());
        }
        if !(0.0..=1.0).contains(&b.soc_max_fraction) {
            push("battery.soc_max_fraction", "must be in [0, 1]".into());
        }
        if !(b.soc_min_fraction >= 0.0 && b.soc_min_fraction < b.soc_max_fraction) {
            push(
                "battery.soc_min_fraction",
                "must be >= 0 and < battery.soc_max_fraction".into(),
            );
        }
        if (b.soc_min_fraction - (1.0 - b.dod)).abs() > 1e-6 {
            push(
                "battery.soc_min_fraction",
                format!(
                    "must equal 1 - battery.dod ({:.4}), got {:.4}",
                    1.0 - b.dod,
                    b.soc_min_fraction
                ),
            );
        }
        if !(b.soc_min_fraction..=b.soc_max_fraction).contains(&b.soc_initial_fraction) {
            push(
                "battery.soc_initial_fraction",
                "must be within [soc_min_fraction, soc_max_fraction]".into(),
            );
        }
        if !(b.holding_soc_fraction > b.soc_min_fraction
            && b.holding_soc_fraction <= b.soc_max_fraction)
        {
            push(
                "battery.holding_soc_fraction",
                "must be within (soc_min_fraction, soc_max_fraction]".into(),
            );
        }

        let s = &self.schedule;
        if s.closing_hour > 24 {
            push("schedule.closing_hour", "must be <= 24".into());
        }
        if s.charge_window_start >= s.opening_hour {
            push(
                "schedule.charge_window_start",
                "must be < schedule.opening_hour".into(),
            );
        }
        if s.opening_hour > s.closing_hour {
            push(
                "schedule.opening_hour",
                "must be <= schedule.closing_hour".into(),
            );
        }
        if !(s.peak_shaving_threshold_kw >= 0.0) {
            push("schedule.peak_shaving_threshold_kw", "must be >= 0".into());
        }

        let t = &self.tariff;
        if t.hp_end_hour > 24 || t.hp_start_hour >= t.hp_end_hour {
            push(
                "tariff.hp_start_hour",
                "must satisfy hp_start_hour < hp_end_hour <= 24".into(),
            );
        }
        if !(t.hp_rate >= 0.0) {
            push("tariff.hp_rate", "must be >= 0".into());
        }
        if !(t.hfp_rate >= 0.0) {
            push("tariff.hfp_rate", "must be >= 0".into());
        }

        if !(self.emissions.co2_grid_kg_per_kwh >= 0.0) {
            push("emissions.co2_grid_kg_per_kwh", "must be >= 0".into());
        }

        let i = &self.input;
        if !(-12..=14).contains(&i.utc_offset_hours) {
            push("input.utc_offset_hours", "must be within [-12, 14]".into());
        }
        if !(1..=9999).contains(&i.year) {
            push("input.year", "must be within [1, 9999]".into());
        }

        errors
    }
}
