//! Track: the reported belief about one target produced by a sensor.

use crate::types::{RequestId, TargetIndex, TrackId};
use sensor_models::{ReportingFlags, SphericalErrors, Vec3};
use serde::{Deserialize, Serialize};

/// Identification friend-or-foe response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IffStatus {
    Friend,
    Foe,
}

/// A sensor track. Every reported field is `None` until the producing mode
/// reports it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Unique identifier within the producing tracker
    pub id: TrackId,
    pub request: RequestId,
    pub target: TargetIndex,
    pub target_name: String,
    pub sensor_name: String,
    pub mode_name: String,
    /// Simulation time of establishment
    pub start_time: f64,
    /// Simulation time of last update
    pub update_time: f64,
    /// Number of updates since establishment
    pub update_count: u32,
    pub quality: f64,
    /// What the producing mode can report
    pub reporting: ReportingFlags,
    pub location_wcs: Option<Vec3>,
    pub velocity_wcs: Option<Vec3>,
    /// Range, bearing and elevation from the sensor in its NED frame
    pub range: Option<f64>,
    pub bearing: Option<f64>,
    pub elevation: Option<f64>,
    pub range_rate: Option<f64>,
    pub side: Option<String>,
    pub type_name: Option<String>,
    pub iff: Option<IffStatus>,
    pub signal_to_noise: Option<f64>,
    pub frequency: Option<f64>,
    /// Measurement standard deviations of the last update
    pub errors: SphericalErrors,
}

impl Track {
    pub fn new(id: TrackId, request: RequestId, target: TargetIndex, start_time: f64) -> Self {
        Self {
            id,
            request,
            target,
            target_name: String::new(),
            sensor_name: String::new(),
            mode_name: String::new(),
            start_time,
            update_time: start_time,
            update_count: 0,
            quality: 0.0,
            reporting: ReportingFlags::empty(),
            location_wcs: None,
            velocity_wcs: None,
            range: None,
            bearing: None,
            elevation: None,
            range_rate: None,
            side: None,
            type_name: None,
            iff: None,
            signal_to_noise: None,
            frequency: None,
            errors: SphericalErrors::default(),
        }
    }

    /// Clear every reported field ahead of a fresh update.
    pub fn clear_reported(&mut self) {
        self.location_wcs = None;
        self.velocity_wcs = None;
        self.range = None;
        self.bearing = None;
        self.elevation = None;
        self.range_rate = None;
        self.side = None;
        self.type_name = None;
        self.iff = None;
        self.signal_to_noise = None;
        self.frequency = None;
    }
}
