//! Annual simulator that drives the dispatch solver hour by hour.

use tracing::{debug, info};

use crate::config::DispatchConfig;
use crate::devices::Battery;
use crate::error::Error;

use super::solver::DispatchSolver;
use super::types::{DispatchRecord, HourlyInput, Phase};
use super::validate::{ValidationReport, validate_dataset};

/// Ordered dispatch records for one simulated year.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnualDataset {
    pub records: Vec<DispatchRecord>,
    /// SoC the battery held before the first hour (kWh).
    pub initial_soc_kwh: f64,
}

impl AnnualDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn final_soc_kwh(&self) -> f64 {
        self.records
            .last()
            .map_or(self.initial_soc_kwh, |r| r.soc_kwh_end)
    }
}

/// Simulation engine owning the battery and the solver.
///
/// The battery is the only mutable state and lives here for the whole run,
/// so independent simulators can run side by side.
pub struct Simulator {
    config: DispatchConfig,
    solver: DispatchSolver,
    battery: Battery,
    initial_soc_kwh: f64,
}

impl Simulator {
    /// Creates a simulator with the battery at its configured initial SoC.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration fails validation.
    pub fn new(config: DispatchConfig) -> Result<Self, Error> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(Error::Config(errors));
        }
        let battery = Battery::from_config(&config.battery)?;
        let initial_soc_kwh = battery.soc_kwh();
        Ok(Self {
            solver: DispatchSolver::new(&config),
            battery,
            initial_soc_kwh,
            config,
        })
    }

    /// Same as [`Simulator::new`] but starting from an explicit SoC.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` on an invalid configuration and
    /// `Error::Battery` if `soc_kwh` lies outside the SoC bounds.
    pub fn with_initial_soc(config: DispatchConfig, soc_kwh: f64) -> Result<Self, Error> {
        let mut sim = Self::new(config)?;
        sim.battery = Battery::with_soc_kwh(&sim.config.battery, soc_kwh)?;
        sim.initial_soc_kwh = soc_kwh;
        Ok(sim)
    }

    /// Classifies and dispatches a single hour.
    ///
    /// # Errors
    ///
    /// Propagates battery and solver invariant errors.
    pub fn step(&mut self, hour_index: usize, input: &HourlyInput) -> Result<DispatchRecord, Error> {
        let phase = self.solver.classify(input, &self.battery);
        self.solver.solve(hour_index, input, phase, &mut self.battery)
    }

    /// Runs every hour of `inputs` in order and re-validates the result.
    ///
    /// Each call starts from the initial SoC, so repeated runs are
    /// independent.
    ///
    /// # Errors
    ///
    /// Aborts on the first invariant violation; no partial dataset is
    /// returned.
    pub fn run(&mut self, inputs: &[HourlyInput]) -> Result<AnnualDataset, Error> {
        self.battery = Battery::with_soc_kwh(&self.config.battery, self.initial_soc_kwh)?;
        info!(
            hours = inputs.len(),
            capacity_kwh = self.config.battery.capacity_kwh,
            power_kw = self.config.battery.power_kw,
            initial_soc_kwh = self.initial_soc_kwh,
            "starting annual dispatch"
        );

        let mut records = Vec::with_capacity(inputs.len());
        for (t, input) in inputs.iter().enumerate() {
            let record = self.step(t, input)?;
            if record.phase == Phase::PeakShaving {
                debug!(hour = t, bess_to_mall = record.bess_to_mall, "peak shaving");
            }
            records.push(record);
        }

        let dataset = AnnualDataset {
            records,
            initial_soc_kwh: self.initial_soc_kwh,
        };
        let report = self.validate(&dataset)?;
        info!(
            hours_checked = report.hours_checked,
            final_soc_kwh = dataset.final_soc_kwh(),
            "annual dispatch complete"
        );
        Ok(dataset)
    }

    /// Re-checks a dataset against this simulator's limits.
    ///
    /// # Errors
    ///
    /// Returns `Error::Solver` naming the first violated invariant.
    pub fn validate(&self, dataset: &AnnualDataset) -> Result<ValidationReport, Error> {
        Ok(validate_dataset(
            &dataset.records,
            self.solver.limits(),
            dataset.initial_soc_kwh,
        )?)
    }
}
