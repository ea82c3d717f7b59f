//! Coordinate frames and spherical conversions.
//!
//! # Frames
//! - **WCS**: Earth-centred, Earth-fixed Cartesian (meters), spherical Earth.
//! - **NED**: local north-east-down tangent frame at a point.
//! - **Local**: any frame reached from WCS by a rotation and an origin.
//!   Platform body and antenna frames are local frames with x forward,
//!   y right, z down.
//!
//! Spherical coordinates in a local frame use azimuth measured from +x
//! towards +y and elevation positive *up* (towards -z).

use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

pub type Vec3 = Vector3<f64>;

pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
/// Mean radius of the spherical Earth (meters)
pub const EARTH_RADIUS: f64 = 6_366_707.019_493_707;
/// Boltzmann's constant (J/K)
pub const BOLTZMANN: f64 = 1.380_649e-23;
/// Reference noise temperature (K)
pub const STANDARD_TEMPERATURE: f64 = 290.0;
/// Effective Earth radius multiplier for standard refraction
pub const FOUR_THIRDS_EARTH: f64 = 4.0 / 3.0;

/// Wrap an angle into [-π, π).
pub fn normalize_angle(a: f64) -> f64 {
    (a + PI).rem_euclid(TAU) - PI
}

// ---------------------------------------------------------------------------
// Spherical
// ---------------------------------------------------------------------------

/// Range / azimuth / elevation in some local frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Spherical {
    pub range: f64,
    pub azimuth: f64,
    pub elevation: f64,
}

impl Spherical {
    pub fn new(range: f64, azimuth: f64, elevation: f64) -> Self {
        Self {
            range,
            azimuth,
            elevation,
        }
    }

    /// Spherical coordinates of a local-frame vector.
    pub fn from_local(v: &Vec3) -> Self {
        let ground = v.x.hypot(v.y);
        Self {
            range: v.norm(),
            azimuth: v.y.atan2(v.x),
            elevation: (-v.z).atan2(ground),
        }
    }

    /// Local-frame vector for these spherical coordinates.
    pub fn to_local(&self) -> Vec3 {
        let (sin_el, cos_el) = self.elevation.sin_cos();
        let (sin_az, cos_az) = self.azimuth.sin_cos();
        Vec3::new(
            self.range * cos_el * cos_az,
            self.range * cos_el * sin_az,
            -self.range * sin_el,
        )
    }
}

// ---------------------------------------------------------------------------
// Geodetic
// ---------------------------------------------------------------------------

/// Latitude/longitude (radians) and altitude (meters) over a spherical Earth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

impl GeoPoint {
    pub fn from_degrees(lat_deg: f64, lon_deg: f64, alt: f64) -> Self {
        Self {
            lat: lat_deg.to_radians(),
            lon: lon_deg.to_radians(),
            alt,
        }
    }

    pub fn to_wcs(&self) -> Vec3 {
        let r = EARTH_RADIUS + self.alt;
        let (sin_lat, cos_lat) = self.lat.sin_cos();
        let (sin_lon, cos_lon) = self.lon.sin_cos();
        Vec3::new(r * cos_lat * cos_lon, r * cos_lat * sin_lon, r * sin_lat)
    }

    pub fn from_wcs(wcs: &Vec3) -> Self {
        let r = wcs.norm();
        if r == 0.0 {
            return Self {
                lat: 0.0,
                lon: 0.0,
                alt: -EARTH_RADIUS,
            };
        }
        Self {
            lat: (wcs.z / r).clamp(-1.0, 1.0).asin(),
            lon: wcs.y.atan2(wcs.x),
            alt: r - EARTH_RADIUS,
        }
    }
}

/// Rotation taking WCS vectors into the NED frame at `lat`, `lon`.
pub fn wcs_to_ned(lat: f64, lon: f64) -> Matrix3<f64> {
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    #[rustfmt::skip]
    let m = Matrix3::new(
        -sin_lat * cos_lon, -sin_lat * sin_lon,  cos_lat,
        -sin_lon,            cos_lon,            0.0,
        -cos_lat * cos_lon, -cos_lat * sin_lon, -sin_lat,
    );
    m
}

/// Altitude of a WCS point above the spherical Earth.
pub fn altitude_of(wcs: &Vec3) -> f64 {
    wcs.norm() - EARTH_RADIUS
}

/// True if two points at altitudes `alt_a`, `alt_b` separated by
/// `slant_range` can see each other over an Earth of radius
/// `EARTH_RADIUS * radius_scale`.
pub fn within_horizon(alt_a: f64, alt_b: f64, slant_range: f64, radius_scale: f64) -> bool {
    let re = EARTH_RADIUS * radius_scale;
    let horizon = |h: f64| {
        let h = h.max(0.0);
        (2.0 * re * h + h * h).sqrt()
    };
    slant_range <= horizon(alt_a) + horizon(alt_b)
}

// ---------------------------------------------------------------------------
// Attitude and local frames
// ---------------------------------------------------------------------------

/// Heading/pitch/roll of a body relative to NED (radians).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl Attitude {
    pub fn heading(heading: f64) -> Self {
        Self {
            heading,
            ..Default::default()
        }
    }

    /// Rotation taking NED vectors into the body frame.
    pub fn ned_to_body(&self) -> Matrix3<f64> {
        Rotation3::from_euler_angles(self.roll, self.pitch, self.heading)
            .matrix()
            .transpose()
    }
}

/// A rotated, translated frame anchored in WCS.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalFrame {
    origin: Vec3,
    wcs_to_local: Matrix3<f64>,
}

impl LocalFrame {
    /// North-east-down frame at `origin`.
    pub fn ned_at(origin: Vec3) -> Self {
        let geo = GeoPoint::from_wcs(&origin);
        Self {
            origin,
            wcs_to_local: wcs_to_ned(geo.lat, geo.lon),
        }
    }

    /// Body frame at `origin` with the given attitude.
    pub fn body(origin: Vec3, attitude: &Attitude) -> Self {
        let ned = Self::ned_at(origin);
        Self {
            origin,
            wcs_to_local: attitude.ned_to_body() * ned.wcs_to_local,
        }
    }

    /// Frame rotated from this one by a yaw and then a pitch (tilt up is positive).
    pub fn rotated(&self, yaw: f64, tilt: f64) -> Self {
        let r = Rotation3::from_euler_angles(0.0, tilt, yaw).matrix().transpose();
        Self {
            origin: self.origin,
            wcs_to_local: r * self.wcs_to_local,
        }
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn to_local(&self, wcs: &Vec3) -> Vec3 {
        self.wcs_to_local * (wcs - self.origin)
    }

    pub fn to_wcs(&self, local: &Vec3) -> Vec3 {
        self.wcs_to_local.transpose() * local + self.origin
    }

    /// Rotate a WCS direction (no translation) into this frame.
    pub fn rotate_to_local(&self, wcs_dir: &Vec3) -> Vec3 {
        self.wcs_to_local * wcs_dir
    }

    /// Range/azimuth/elevation of a WCS point as seen from this frame.
    pub fn aspect(&self, wcs: &Vec3) -> Spherical {
        Spherical::from_local(&self.to_local(wcs))
    }

    /// WCS point at the given spherical coordinates in this frame.
    pub fn location_wcs(&self, s: &Spherical) -> Vec3 {
        self.to_wcs(&s.to_local())
    }
}

/// Closing speed along the line of sight (negative when closing).
pub fn range_rate(
    observer: &Vec3,
    observer_vel: &Vec3,
    target: &Vec3,
    target_vel: &Vec3,
) -> f64 {
    let los = target - observer;
    let range = los.norm();
    if range <= 0.0 {
        return 0.0;
    }
    (target_vel - observer_vel).dot(&los) / range
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
