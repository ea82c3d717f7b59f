//! Outcome of a single detection attempt.

use crate::geometry::{LocalFrame, Spherical, Vec3};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Reasons a detection attempt failed. Bits are only ever added during
    /// an attempt.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FailureStatus: u32 {
        const RCVR_RANGE_LIMITS     = 1 << 0;
        const RCVR_ALTITUDE_LIMITS  = 1 << 1;
        const RCVR_ANGLE_LIMITS     = 1 << 2;
        const RCVR_HORIZON_MASKING  = 1 << 3;
        const XMTR_RANGE_LIMITS     = 1 << 4;
        const SIGNAL_LEVEL          = 1 << 5;
        const TARGET_CONCEALED      = 1 << 6;
        const VELOCITY_LIMITS       = 1 << 7;
        const TARGET_DELETED        = 1 << 8;
        const SENSOR_OFF            = 1 << 9;
    }
}

impl Default for FailureStatus {
    fn default() -> Self {
        FailureStatus::empty()
    }
}

/// Spherical quantities: sigmas or sampled errors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SphericalErrors {
    pub azimuth: f64,
    pub elevation: f64,
    pub range: f64,
    pub range_rate: f64,
}

impl SphericalErrors {
    pub fn is_zero(&self) -> bool {
        self.azimuth == 0.0 && self.elevation == 0.0 && self.range == 0.0 && self.range_rate == 0.0
    }
}

/// Reported (possibly perturbed) measurement of a target.
///
/// Angles and range are in the antenna frame of the detecting beam.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Measurement {
    pub location_wcs: Option<Vec3>,
    pub velocity_wcs: Option<Vec3>,
    pub range: Option<f64>,
    pub azimuth: Option<f64>,
    pub elevation: Option<f64>,
    pub range_rate: Option<f64>,
    pub frequency: Option<f64>,
    /// Standard deviations the errors were drawn from
    pub sigmas: SphericalErrors,
    /// Errors actually applied
    pub errors: SphericalErrors,
}

/// Result of one `attempt_to_detect` call.
#[derive(Clone, Debug, Default)]
pub struct DetectionResult {
    /// Checks that were performed
    pub checked: FailureStatus,
    /// Checks that failed
    pub failed: FailureStatus,
    /// Linear signal-to-noise ratio
    pub signal_to_noise: f64,
    /// Probability of detection computed by the physics
    pub pd: f64,
    /// Pd the attempt had to reach
    pub required_pd: f64,
    pub beam_index: usize,
    /// True target aspect in the antenna frame
    pub rcvr_to_tgt: Spherical,
    /// Antenna frame at the time of the attempt
    pub antenna_frame: Option<LocalFrame>,
    pub receiver_location: Vec3,
    pub receiver_velocity: Vec3,
    pub target_location: Vec3,
    pub target_velocity: Vec3,
    /// True range rate (negative when closing)
    pub range_rate: f64,
    /// Projected area of the target seen from above (m²); set by imaging sensors
    pub optical_signature: f64,
    pub measurement: Measurement,
}

impl DetectionResult {
    pub fn new(required_pd: f64) -> Self {
        Self {
            required_pd,
            ..Default::default()
        }
    }

    /// Record that `status` was checked and, if `failed`, that it failed.
    pub fn check(&mut self, status: FailureStatus, failed: bool) -> bool {
        self.checked |= status;
        if failed {
            self.failed |= status;
        }
        !failed
    }

    pub fn fail(&mut self, status: FailureStatus) {
        self.checked |= status;
        self.failed |= status;
    }

    /// True when no check failed and the Pd met the requirement.
    pub fn detected(&self) -> bool {
        self.failed.is_empty() && self.pd > 0.0 && self.pd >= self.required_pd
    }

    /// Fill the measurement with the true geometry before errors are applied.
    pub fn set_true_measurement(&mut self) {
        self.measurement.location_wcs = Some(self.target_location);
        self.measurement.velocity_wcs = Some(self.target_velocity);
        self.measurement.range = Some(self.rcvr_to_tgt.range);
        self.measurement.azimuth = Some(self.rcvr_to_tgt.azimuth);
        self.measurement.elevation = Some(self.rcvr_to_tgt.elevation);
        self.measurement.range_rate = Some(self.range_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_bits_accumulate() {
        let mut r = DetectionResult::new(0.5);
        assert!(r.check(FailureStatus::RCVR_RANGE_LIMITS, false));
        assert!(!r.check(FailureStatus::SIGNAL_LEVEL, true));
        r.fail(FailureStatus::TARGET_CONCEALED);
        r.check(FailureStatus::SIGNAL_LEVEL, false);
        assert_eq!(
            r.failed,
            FailureStatus::SIGNAL_LEVEL | FailureStatus::TARGET_CONCEALED
        );
        assert!(r.checked.contains(FailureStatus::RCVR_RANGE_LIMITS));
    }

    #[test]
    fn detected_requires_pd() {
        let mut r = DetectionResult::new(0.5);
        r.pd = 0.49;
        assert!(!r.detected());
        r.pd = 0.5;
        assert!(r.detected());
        r.fail(FailureStatus::RCVR_ANGLE_LIMITS);
        assert!(!r.detected());
    }
}
