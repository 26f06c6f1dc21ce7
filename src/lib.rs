//! Hourly PV / battery / EV / mall energy-dispatch engine.
//!
//! One year of hourly inputs goes through a six-phase state machine and a
//! priority waterfall that routes every kWh between PV, the battery, the
//! loads, and the grid. See [`sim::engine::Simulator`] for the entry point.

pub mod cli;
pub mod config;
/// Controllable devices (the battery).
pub mod devices;
pub mod error;
/// Input normalization and output writers.
pub mod io;
pub mod runner;
/// Phase classifier, dispatch solver, annual simulator, and metrics.
pub mod sim;
pub mod synthetic;
pub mod telemetry;

pub use error::Error;
