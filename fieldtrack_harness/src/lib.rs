//! Field tracking harness
//!
//! Synthetic star fields and drift scenarios used to exercise the field
//! tracker end to end, from rendered frames through the photometry table.

pub mod scenario;
pub mod synthetic;

pub use scenario::{run_scenario, DriftScenario, FrameStep, ScenarioOutcome};
pub use synthetic::{SyntheticField, SyntheticStar};
