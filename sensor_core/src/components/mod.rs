//! Components shipped with the sensor core.

pub mod solar_illumination;

pub use solar_illumination::{SolarIlluminationComponent, SolarIlluminationFactory};
