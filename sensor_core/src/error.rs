//! Configuration-time failures of a sensor.
//!
//! Detection misses are never errors; they are `FailureStatus` bits on the
//! detection result.

use sensor_models::{error_model::ErrorModelError, InputError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor '{sensor}': {source}")]
    Input {
        sensor: String,
        #[source]
        source: InputError,
    },

    #[error("sensor '{sensor}' mode '{mode}': {source}")]
    ModeInput {
        sensor: String,
        mode: String,
        #[source]
        source: InputError,
    },

    #[error("sensor '{sensor}': unknown mode '{mode}'")]
    UnknownMode { sensor: String, mode: String },

    #[error("sensor '{sensor}': a component with role {role} is already attached")]
    DuplicateRole { sensor: String, role: String },

    #[error("sensor '{sensor}' mode '{mode}': {source}")]
    IncompatibleErrorModel {
        sensor: String,
        mode: String,
        #[source]
        source: ErrorModelError,
    },

    #[error("sensor '{sensor}' mode '{mode}': none of the requested reporting flags can be reported")]
    NothingReportable { sensor: String, mode: String },

    #[error("sensor '{sensor}' mode '{mode}': one of dwell_time or resolution must be specified")]
    MissingDwellOrResolution { sensor: String, mode: String },

    #[error("sensor '{sensor}': unknown sensor type '{sensor_type}'")]
    UnknownSensorType { sensor: String, sensor_type: String },

    #[error("sensor '{sensor}': unknown platform '{platform}'")]
    UnknownPlatform { sensor: String, platform: String },

    #[error("sensor '{sensor}' mode '{mode}': {message}")]
    InvalidMode {
        sensor: String,
        mode: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, SensorError>;
