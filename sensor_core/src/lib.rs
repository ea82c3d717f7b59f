//! `sensor_core` — Sensors that turn platform truth into detections, tracks
//! and SAR images.
//!
//! # Module layout
//! - [`context`]    — Platforms, clock, random stream and event sink
//! - [`mode`]       — Shared mode parameters, mode list, selection rules
//! - [`radar`]      — Monostatic pulse radar physics
//! - [`optical`]    — Passive EO/IR physics
//! - [`sar`]        — SAR performance prediction and image formation
//! - [`component`]  — Pluggable hooks keyed by role
//! - [`components`] — Components shipped with the crate
//! - [`sensor`]     — On/off, mode selection, scheduled updates, requests
//! - [`events`]     — Observable sensor events
//! - [`error`]      — Configuration and initialization errors

pub mod component;
pub mod components;
pub mod context;
pub mod error;
pub mod events;
pub mod mode;
pub mod optical;
pub mod radar;
pub mod sar;
pub mod sensor;

pub use component::{AttemptContext, ComponentFactory, ComponentList, ComponentRole, SensorComponent};
pub use context::{Platform, PlatformCatalog, SimContext, SimEpoch, SpatialDomain};
pub use error::{Result, SensorError};
pub use events::{EventLog, SensorEvent};
pub use mode::{ModeCommon, ModeKind, ModeList, ModeState, SensorMode};
pub use optical::OpticalMode;
pub use radar::RadarMode;
pub use sar::{OperatingMode, SarCollector, SarFailure, SarImage, SarImageObject, SarMode};
pub use sensor::{read_sensors, DetectionFilter, Sensor, SensorType, TrackingRequest};
