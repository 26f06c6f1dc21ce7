pub mod engine;
pub mod kpi;
/// Daily state machine: maps each hour to an operating phase.
pub mod phase;
pub mod solver;
/// HP/HFP time-of-use tariff.
pub mod tariff;
pub mod types;
pub mod validate;
