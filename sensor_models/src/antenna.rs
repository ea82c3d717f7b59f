//! Antenna geometry: field of view, scan limits, range and altitude limits.
//!
//! Pure geometry with no state beyond configuration. Angles are relative
//! to the antenna frame, which is the platform body frame tilted up by
//! [`Antenna::tilt`].

use crate::geometry::{LocalFrame, Spherical};
use crate::input::{InputReader, InputResult, ValueType};
use crate::result::{DetectionResult, FailureStatus};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Antenna {
    /// Boresight elevation above the mount (radians)
    pub tilt: f64,
    /// Azimuth field of view (min, max) in radians
    pub azimuth_field_of_view: (f64, f64),
    /// Elevation field of view (min, max) in radians
    pub elevation_field_of_view: (f64, f64),
    /// Azimuth extent the beam can be steered over
    pub azimuth_scan_limits: (f64, f64),
    /// Elevation extent the beam can be steered over
    pub elevation_scan_limits: (f64, f64),
    pub minimum_range: f64,
    pub maximum_range: f64,
    /// Target altitude limits (meters)
    pub minimum_altitude: f64,
    pub maximum_altitude: f64,
}

impl Default for Antenna {
    fn default() -> Self {
        Self {
            tilt: 0.0,
            azimuth_field_of_view: (-PI, PI),
            elevation_field_of_view: (-FRAC_PI_2, FRAC_PI_2),
            azimuth_scan_limits: (-PI, PI),
            elevation_scan_limits: (-FRAC_PI_2, FRAC_PI_2),
            minimum_range: 0.0,
            maximum_range: f64::MAX,
            minimum_altitude: f64::MIN,
            maximum_altitude: f64::MAX,
        }
    }
}

impl Antenna {
    /// Antenna frame for a platform body frame.
    pub fn frame(&self, body: &LocalFrame) -> LocalFrame {
        body.rotated(0.0, self.tilt)
    }

    pub fn within_field_of_view(&self, aspect: &Spherical) -> bool {
        within(aspect.azimuth, self.azimuth_field_of_view)
            && within(aspect.elevation, self.elevation_field_of_view)
    }

    pub fn within_range(&self, range: f64) -> bool {
        range >= self.minimum_range && range <= self.maximum_range
    }

    pub fn within_altitude(&self, altitude: f64) -> bool {
        altitude >= self.minimum_altitude && altitude <= self.maximum_altitude
    }

    /// Where the beam points when cued at `aspect`: the aspect clamped to the
    /// scan limits.
    pub fn beam_pointing(&self, aspect: &Spherical) -> (f64, f64) {
        (
            aspect
                .azimuth
                .clamp(self.azimuth_scan_limits.0, self.azimuth_scan_limits.1),
            aspect
                .elevation
                .clamp(self.elevation_scan_limits.0, self.elevation_scan_limits.1),
        )
    }

    /// Run the range, altitude and angle checks, recording them on `result`.
    /// Returns true if all passed.
    pub fn check_geometry(&self, target_altitude: f64, result: &mut DetectionResult) -> bool {
        let aspect = result.rcvr_to_tgt;
        let range_ok = result.check(
            FailureStatus::RCVR_RANGE_LIMITS,
            !self.within_range(aspect.range),
        );
        let alt_ok = result.check(
            FailureStatus::RCVR_ALTITUDE_LIMITS,
            !self.within_altitude(target_altitude),
        );
        let angle_ok = result.check(
            FailureStatus::RCVR_ANGLE_LIMITS,
            !self.within_field_of_view(&aspect),
        );
        range_ok && alt_ok && angle_ok
    }

    /// Antenna keywords shared by every sensor family.
    pub fn process_input(&mut self, input: &mut InputReader) -> InputResult<bool> {
        match input.command() {
            "antenna_tilt" => {
                self.tilt = input.read_value_of_type(ValueType::Angle)?;
                input.value_in_closed_range(self.tilt, -FRAC_PI_2, FRAC_PI_2)?;
            }
            "azimuth_field_of_view" => {
                self.azimuth_field_of_view = read_angle_pair(input, PI)?;
            }
            "elevation_field_of_view" => {
                self.elevation_field_of_view = read_angle_pair(input, FRAC_PI_2)?;
            }
            "azimuth_scan_limits" => {
                self.azimuth_scan_limits = read_angle_pair(input, PI)?;
            }
            "elevation_scan_limits" => {
                self.elevation_scan_limits = read_angle_pair(input, FRAC_PI_2)?;
            }
            "minimum_range" => {
                self.minimum_range = input.read_value_of_type(ValueType::Length)?;
                input.value_greater_or_equal(self.minimum_range, 0.0)?;
            }
            "maximum_range" => {
                self.maximum_range = input.read_value_of_type(ValueType::Length)?;
                input.value_greater(self.maximum_range, self.minimum_range)?;
            }
            "minimum_altitude" => {
                self.minimum_altitude = input.read_value_of_type(ValueType::Length)?;
            }
            "maximum_altitude" => {
                self.maximum_altitude = input.read_value_of_type(ValueType::Length)?;
                input.value_greater(self.maximum_altitude, self.minimum_altitude)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

fn within(value: f64, (lo, hi): (f64, f64)) -> bool {
    value >= lo && value <= hi
}

fn read_angle_pair(input: &mut InputReader, limit: f64) -> InputResult<(f64, f64)> {
    let lo = input.read_value_of_type(ValueType::Angle)?;
    let hi = input.read_value_of_type(ValueType::Angle)?;
    input.value_greater_or_equal(lo, -limit)?;
    input.value_less_or_equal(hi, limit)?;
    input.value_greater_or_equal(hi, lo)?;
    Ok((lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(text: &str) -> Antenna {
        let mut antenna = Antenna::default();
        let mut input = InputReader::new(text);
        while input.read_command().is_some() {
            assert!(antenna.process_input(&mut input).unwrap());
        }
        antenna
    }

    #[test]
    fn field_of_view_limits() {
        let antenna = configured("azimuth_field_of_view -30 deg 30 deg elevation_field_of_view 0 deg 60 deg");
        assert!(antenna.within_field_of_view(&Spherical::new(1.0, 0.2, 0.1)));
        assert!(!antenna.within_field_of_view(&Spherical::new(1.0, 0.6, 0.1)));
        assert!(!antenna.within_field_of_view(&Spherical::new(1.0, 0.0, -0.1)));
    }

    #[test]
    fn beam_clamps_to_scan_limits() {
        let antenna = configured("azimuth_scan_limits -10 deg 10 deg");
        let (az, el) = antenna.beam_pointing(&Spherical::new(1.0, 0.5, 0.05));
        assert!((az - 10f64.to_radians()).abs() < 1e-12);
        assert!((el - 0.05).abs() < 1e-12);
    }

    #[test]
    fn geometry_check_marks_range() {
        let antenna = configured("maximum_range 10 km");
        let mut result = DetectionResult::new(0.5);
        result.rcvr_to_tgt = Spherical::new(20_000.0, 0.0, 0.0);
        assert!(!antenna.check_geometry(0.0, &mut result));
        assert_eq!(result.failed, FailureStatus::RCVR_RANGE_LIMITS);
    }

    #[test]
    fn inverted_limits_rejected() {
        let mut antenna = Antenna::default();
        let mut input = InputReader::new("azimuth_field_of_view 10 deg -10 deg");
        input.read_command();
        assert!(antenna.process_input(&mut input).is_err());
    }
}
