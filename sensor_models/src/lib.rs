//! `sensor_models` — Sensor geometry, radar physics, detection results and
//! measurement error models.
//!
//! # Module layout
//! - [`geometry`]    — WCS/NED/local frames, spherical conversions, horizon
//! - [`antenna`]     — Field of view, scan, range and altitude limits
//! - [`radar`]       — Transmitter, receiver, beam pattern, radar equation
//! - [`detection`]   — SNR to probability of detection
//! - [`reporting`]   — Reporting capability flags
//! - [`result`]      — Detection result, failure bits, measurement
//! - [`error_model`] — Standard and radar-derived measurement errors
//! - [`input`]       — Token-stream reader for sensor definitions

pub mod antenna;
pub mod detection;
pub mod error_model;
pub mod geometry;
pub mod input;
pub mod radar;
pub mod reporting;
pub mod result;

pub use antenna::Antenna;
pub use detection::{Detector, DetectorKind};
pub use error_model::{apply_measurement_errors, ErrorModel, ErrorModelKind, RadarErrorInputs};
pub use geometry::{Attitude, GeoPoint, LocalFrame, Spherical, Vec3};
pub use input::{InputError, InputReader, InputResult, ValueType};
pub use radar::{BeamPattern, Receiver, Transmitter};
pub use reporting::ReportingFlags;
pub use result::{DetectionResult, FailureStatus, Measurement, SphericalErrors};
