//! `sim` — Scenario driver: platform motion, scenario loading, scheduling.

pub mod platform;
pub mod scenarios;
pub mod scheduler;

pub use platform::{MotionSpec, PlatformMotion, PlatformSpec};
pub use scenarios::{Action, Command, Scenario, ScenarioKind};
pub use scheduler::{RunSummary, Simulation, TrackRecord};
