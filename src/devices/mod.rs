//! Controllable devices of the installation.

/// Battery energy storage model.
pub mod battery;

pub use battery::Battery;
