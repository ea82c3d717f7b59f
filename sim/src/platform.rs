//! Platform definitions and truth motion.
//!
//! Each platform keeps a geodetic state (latitude, longitude, altitude,
//! heading, ground speed, climb rate) and a [`MotionSpec`] describing how it
//! moves. The scheduler steps every platform forward and writes the result
//! back into the sensor core's platform catalog.

use sensor_core::{Platform, SpatialDomain};
use sensor_models::geometry::{wcs_to_ned, EARTH_RADIUS};
use sensor_models::{Attitude, GeoPoint, Vec3};
use serde::{Deserialize, Serialize};

/// How a platform moves over the spherical Earth.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionSpec {
    /// Does not move.
    #[default]
    Stationary,
    /// Constant heading, ground speed and climb rate.
    ConstantVelocity,
    /// Constant heading and ground speed with a new climb rate (m/s).
    Climb { rate: f64 },
    /// Constant-rate turn. `rate_deg` = heading rate (deg/s).
    ConstantTurn { rate_deg: f64 },
    /// Switch motion model at given sim times.
    /// `segments` is sorted by start time; the active spec is the last one
    /// whose start time <= current time.
    Segmented { segments: Vec<(f64, MotionSpec)> },
}

fn default_rcs() -> f64 {
    1.0
}

fn default_intensity() -> f64 {
    1.0
}

fn default_area() -> f64 {
    10.0
}

/// A platform as written in a scenario file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlatformSpec {
    pub name: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub domain: SpatialDomain,
    pub lat_deg: f64,
    pub lon_deg: f64,
    /// Altitude above the spherical Earth (m)
    #[serde(default)]
    pub alt: f64,
    #[serde(default)]
    pub heading_deg: f64,
    /// Ground speed (m/s)
    #[serde(default)]
    pub speed: f64,
    /// Climb rate (m/s, positive up)
    #[serde(default)]
    pub climb_rate: f64,
    #[serde(default)]
    pub motion: MotionSpec,
    /// Radar cross section (m²)
    #[serde(default = "default_rcs")]
    pub radar_cross_section: f64,
    /// Radiant intensity (W/sr)
    #[serde(default = "default_intensity")]
    pub infrared_intensity: f64,
    /// Projected area seen from above (m²)
    #[serde(default = "default_area")]
    pub optical_area: f64,
    #[serde(default)]
    pub concealment: f64,
    /// Platform joins the simulation at this time
    #[serde(default)]
    pub appear_at: Option<f64>,
    /// Platform leaves the simulation at this time
    #[serde(default)]
    pub disappear_at: Option<f64>,
}

impl PlatformSpec {
    /// A stationary platform with default signatures.
    pub fn new(name: impl Into<String>, lat_deg: f64, lon_deg: f64, alt: f64) -> Self {
        Self {
            name: name.into(),
            side: String::new(),
            type_name: String::new(),
            categories: Vec::new(),
            domain: SpatialDomain::default(),
            lat_deg,
            lon_deg,
            alt,
            heading_deg: 0.0,
            speed: 0.0,
            climb_rate: 0.0,
            motion: MotionSpec::Stationary,
            radar_cross_section: default_rcs(),
            infrared_intensity: default_intensity(),
            optical_area: default_area(),
            concealment: 0.0,
            appear_at: None,
            disappear_at: None,
        }
    }

    /// True if the platform is in the simulation at time `t`.
    pub fn is_active(&self, t: f64) -> bool {
        if let Some(appear) = self.appear_at {
            if t < appear {
                return false;
            }
        }
        if let Some(disappear) = self.disappear_at {
            if t >= disappear {
                return false;
            }
        }
        true
    }
}

/// Truth state of one moving platform.
#[derive(Clone, Debug, PartialEq)]
pub struct PlatformMotion {
    /// Radians
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    /// Radians clockwise from north
    pub heading: f64,
    pub speed: f64,
    pub climb_rate: f64,
    pub motion: MotionSpec,
}

impl PlatformMotion {
    pub fn from_spec(spec: &PlatformSpec) -> Self {
        Self {
            lat: spec.lat_deg.to_radians(),
            lon: spec.lon_deg.to_radians(),
            alt: spec.alt,
            heading: spec.heading_deg.to_radians(),
            speed: spec.speed,
            climb_rate: spec.climb_rate,
            motion: spec.motion.clone(),
        }
    }

    /// Propagate the state by `dt` seconds starting at time `t`.
    pub fn step(&mut self, t: f64, dt: f64) {
        let motion = active_motion(&self.motion, t).clone();
        match motion {
            MotionSpec::Stationary => {}
            MotionSpec::ConstantVelocity => self.advance(dt),
            MotionSpec::Climb { rate } => {
                self.climb_rate = rate;
                self.advance(dt);
            }
            MotionSpec::ConstantTurn { rate_deg } => {
                // Move along the mid-step heading
                self.heading += 0.5 * rate_deg.to_radians() * dt;
                self.advance(dt);
                self.heading += 0.5 * rate_deg.to_radians() * dt;
            }
            // active_motion never returns a segment list
            MotionSpec::Segmented { .. } => self.advance(dt),
        }
        self.heading = self.heading.rem_euclid(2.0 * std::f64::consts::PI);
    }

    fn advance(&mut self, dt: f64) {
        let radius = EARTH_RADIUS + self.alt;
        let north = self.speed * self.heading.cos() * dt;
        let east = self.speed * self.heading.sin() * dt;
        self.lat += north / radius;
        let cos_lat = self.lat.cos();
        if cos_lat.abs() > 1.0e-9 {
            self.lon += east / (radius * cos_lat);
        }
        self.alt += self.climb_rate * dt;
    }

    pub fn location_wcs(&self) -> Vec3 {
        GeoPoint {
            lat: self.lat,
            lon: self.lon,
            alt: self.alt,
        }
        .to_wcs()
    }

    /// Velocity in WCS at time `t`; zero while the active motion is stationary.
    pub fn velocity_wcs(&self, t: f64) -> Vec3 {
        if matches!(active_motion(&self.motion, t), MotionSpec::Stationary) {
            return Vec3::zeros();
        }
        let ned = Vec3::new(
            self.speed * self.heading.cos(),
            self.speed * self.heading.sin(),
            -self.climb_rate,
        );
        wcs_to_ned(self.lat, self.lon).transpose() * ned
    }

    /// Copy the truth state at time `t` into a catalog platform.
    pub fn apply(&self, t: f64, platform: &mut Platform) {
        platform.location_wcs = self.location_wcs();
        platform.velocity_wcs = self.velocity_wcs(t);
        platform.attitude = Attitude::heading(self.heading);
    }
}

fn active_motion(motion: &MotionSpec, t: f64) -> &MotionSpec {
    match motion {
        MotionSpec::Segmented { segments } => segments
            .iter()
            .filter(|(start, _)| *start <= t)
            .last()
            .map_or(&MotionSpec::ConstantVelocity, |(_, spec)| active_motion(spec, t)),
        other => other,
    }
}

/// Build the catalog platform for a spec at its initial state.
pub fn make_platform(spec: &PlatformSpec, t: f64) -> Platform {
    let motion = PlatformMotion::from_spec(spec);
    let mut platform = Platform::new(spec.name.clone(), motion.location_wcs());
    platform.side = spec.side.clone();
    platform.type_name = spec.type_name.clone();
    platform.categories = spec.categories.clone();
    platform.domain = spec.domain;
    platform.radar_cross_section = spec.radar_cross_section;
    platform.infrared_intensity = spec.infrared_intensity;
    platform.optical_area = spec.optical_area;
    platform.concealment = spec.concealment;
    motion.apply(t, &mut platform);
    platform
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    fn mover(heading_deg: f64, motion: MotionSpec) -> PlatformMotion {
        let mut spec = PlatformSpec::new("p", 0.0, 0.0, 1000.0);
        spec.heading_deg = heading_deg;
        spec.speed = 100.0;
        spec.motion = motion;
        PlatformMotion::from_spec(&spec)
    }

    #[test]
    fn constant_velocity_moves_north() {
        let mut p = mover(0.0, MotionSpec::ConstantVelocity);
        let start = p.location_wcs();
        for i in 0..10 {
            p.step(f64::from(i), 1.0);
        }
        let moved = (p.location_wcs() - start).norm();
        assert_abs_diff_eq!(moved, 1000.0, epsilon = 1.0);
        assert!(p.lat > 0.0);
        assert_abs_diff_eq!(p.lon, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn velocity_matches_displacement() {
        let p = mover(90.0, MotionSpec::ConstantVelocity);
        let v = p.velocity_wcs(0.0);
        assert_abs_diff_eq!(v.norm(), 100.0, epsilon = 1e-9);
        let mut q = p.clone();
        q.step(0.0, 1.0);
        let d = q.location_wcs() - p.location_wcs();
        assert_abs_diff_eq!((d - v).norm(), 0.0, epsilon = 0.1);
    }

    #[test]
    fn turn_changes_heading() {
        let mut p = mover(0.0, MotionSpec::ConstantTurn { rate_deg: 3.0 });
        for i in 0..30 {
            p.step(f64::from(i), 1.0);
        }
        assert_abs_diff_eq!(p.heading, FRAC_PI_2, epsilon = 1e-9);
    }

    #[test]
    fn segments_switch_motion() {
        let motion = MotionSpec::Segmented {
            segments: vec![(0.0, MotionSpec::Stationary), (5.0, MotionSpec::ConstantVelocity)],
        };
        let mut p = mover(0.0, motion);
        let start = p.location_wcs();
        for i in 0..5 {
            p.step(f64::from(i), 1.0);
        }
        assert_abs_diff_eq!((p.location_wcs() - start).norm(), 0.0, epsilon = 1e-9);
        p.step(5.0, 1.0);
        assert!((p.location_wcs() - start).norm() > 99.0);
    }

    #[test]
    fn climb_then_dive() {
        let motion = MotionSpec::Segmented {
            segments: vec![(0.0, MotionSpec::Climb { rate: 80.0 }), (2.0, MotionSpec::Climb { rate: -80.0 })],
        };
        let mut p = mover(0.0, motion);
        let mut altitudes = Vec::new();
        for i in 0..4 {
            p.step(f64::from(i), 1.0);
            altitudes.push(p.alt);
        }
        assert_eq!(altitudes, [1080.0, 1160.0, 1080.0, 1000.0]);
    }

    #[test]
    fn spec_reads_from_json() {
        let json = r#"{"name": "truck", "lat_deg": 0.0, "lon_deg": 0.12, "domain": "land",
                       "motion": {"kind": "constant_turn", "rate_deg": 1.0}}"#;
        let spec: PlatformSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.domain, SpatialDomain::Land);
        assert_eq!(spec.motion, MotionSpec::ConstantTurn { rate_deg: 1.0 });
        assert_eq!(spec.radar_cross_section, 1.0);
        assert!(spec.is_active(0.0));

        let platform = make_platform(&spec, 0.0);
        assert_eq!(platform.name, "truck");
        assert_eq!(platform.domain, SpatialDomain::Land);
    }
}
