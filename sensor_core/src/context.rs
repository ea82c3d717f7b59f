//! Simulation state handed explicitly to every sensor call.
//!
//! The sensor core never reaches for global state: the clock, the platform
//! catalog, the random stream and the event sink all live in a
//! [`SimContext`] owned by the caller.
//!
//! # Policy
//! - Platforms are iterated in index order, which is also insertion order,
//!   so detection chances are offered deterministically.
//! - The sensor core reads platform kinematics but never changes them.

use crate::events::EventLog;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sensor_models::geometry::{altitude_of, wcs_to_ned, GeoPoint};
use sensor_models::{Attitude, LocalFrame, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracker_core::TargetIndex;

// ---------------------------------------------------------------------------
// Platforms
// ---------------------------------------------------------------------------

/// Spatial domain a platform operates in; used by `ignore_domain`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialDomain {
    Land,
    #[default]
    Air,
    Surface,
    Subsurface,
    Space,
}

impl SpatialDomain {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "land" => Some(Self::Land),
            "air" => Some(Self::Air),
            "surface" => Some(Self::Surface),
            "subsurface" => Some(Self::Subsurface),
            "space" => Some(Self::Space),
            _ => None,
        }
    }
}

/// Truth state and signatures of one simulated platform.
#[derive(Clone, Debug)]
pub struct Platform {
    pub index: TargetIndex,
    pub name: String,
    pub side: String,
    pub type_name: String,
    pub categories: Vec<String>,
    pub domain: SpatialDomain,
    pub location_wcs: Vec3,
    pub velocity_wcs: Vec3,
    pub attitude: Attitude,
    /// Radar cross section (m²)
    pub radar_cross_section: f64,
    /// Radiant intensity seen by optical sensors (W/sr)
    pub infrared_intensity: f64,
    /// Projected area seen from above (m²), sizes objects in SAR images
    pub optical_area: f64,
    /// 0 = in the open, 1 = fully hidden
    pub concealment: f64,
}

impl Platform {
    pub fn new(name: impl Into<String>, location_wcs: Vec3) -> Self {
        Self {
            index: TargetIndex(0),
            name: name.into(),
            side: String::new(),
            type_name: String::new(),
            categories: Vec::new(),
            domain: SpatialDomain::Air,
            location_wcs,
            velocity_wcs: Vec3::zeros(),
            attitude: Attitude::default(),
            radar_cross_section: 1.0,
            infrared_intensity: 1.0,
            optical_area: 10.0,
            concealment: 0.0,
        }
    }

    pub fn geo(&self) -> GeoPoint {
        GeoPoint::from_wcs(&self.location_wcs)
    }

    pub fn altitude(&self) -> f64 {
        altitude_of(&self.location_wcs)
    }

    pub fn speed(&self) -> f64 {
        self.velocity_wcs.norm()
    }

    /// Velocity in the platform's local north-east-down frame.
    pub fn velocity_ned(&self) -> Vec3 {
        let geo = self.geo();
        wcs_to_ned(geo.lat, geo.lon) * self.velocity_wcs
    }

    pub fn ned_frame(&self) -> LocalFrame {
        LocalFrame::ned_at(self.location_wcs)
    }

    pub fn body_frame(&self) -> LocalFrame {
        LocalFrame::body(self.location_wcs, &self.attitude)
    }

    pub fn is_category_member(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}

/// Every platform currently in the simulation, keyed by index.
#[derive(Clone, Debug, Default)]
pub struct PlatformCatalog {
    platforms: BTreeMap<TargetIndex, Platform>,
    next_index: u32,
}

impl PlatformCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a platform, assigning it the next index.
    pub fn add(&mut self, mut platform: Platform) -> TargetIndex {
        self.next_index += 1;
        let index = TargetIndex(self.next_index);
        platform.index = index;
        self.platforms.insert(index, platform);
        index
    }

    pub fn remove(&mut self, index: TargetIndex) -> Option<Platform> {
        self.platforms.remove(&index)
    }

    pub fn get(&self, index: TargetIndex) -> Option<&Platform> {
        self.platforms.get(&index)
    }

    pub fn get_mut(&mut self, index: TargetIndex) -> Option<&mut Platform> {
        self.platforms.get_mut(&index)
    }

    pub fn by_name(&self, name: &str) -> Option<&Platform> {
        self.platforms.values().find(|p| p.name == name)
    }

    pub fn contains(&self, index: TargetIndex) -> bool {
        self.platforms.contains_key(&index)
    }

    /// Platforms in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Platform> {
        self.platforms.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Platform> {
        self.platforms.values_mut()
    }

    pub fn indices(&self) -> Vec<TargetIndex> {
        self.platforms.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Clock and context
// ---------------------------------------------------------------------------

/// Calendar anchor of simulation time zero.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimEpoch {
    /// Day of year, 1-based
    pub day_of_year: u32,
    /// Seconds past midnight UTC at sim time zero
    pub utc_seconds: f64,
}

impl Default for SimEpoch {
    fn default() -> Self {
        Self {
            day_of_year: 172,          // June solstice
            utc_seconds: 12.0 * 3600.0, // noon UTC
        }
    }
}

impl SimEpoch {
    /// Day of year and UTC hours at `sim_time`.
    pub fn at(&self, sim_time: f64) -> (u32, f64) {
        let seconds = self.utc_seconds + sim_time;
        let days = (seconds / 86_400.0).floor();
        let day = (f64::from(self.day_of_year) - 1.0 + days).rem_euclid(365.0) as u32 + 1;
        let hours = (seconds - days * 86_400.0) / 3600.0;
        (day, hours)
    }
}

/// Explicit simulation state for one run.
pub struct SimContext {
    pub sim_time: f64,
    pub platforms: PlatformCatalog,
    pub rng: ChaCha8Rng,
    pub events: EventLog,
    /// Use each mode's `required_pd` instead of drawing one per attempt.
    pub use_constant_required_pd: bool,
    pub epoch: SimEpoch,
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        Self {
            sim_time: 0.0,
            platforms: PlatformCatalog::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            events: EventLog::default(),
            use_constant_required_pd: false,
            epoch: SimEpoch::default(),
        }
    }

    /// Pd an attempt must reach: the mode's fixed value, or `1 - U(0,1)`.
    pub fn required_pd(&mut self, mode_required_pd: f64) -> f64 {
        draw_required_pd(&mut self.rng, self.use_constant_required_pd, mode_required_pd)
    }
}

/// [`SimContext::required_pd`] for callers holding other borrows of the context.
pub fn draw_required_pd<R: Rng + ?Sized>(rng: &mut R, constant: bool, mode_required_pd: f64) -> f64 {
    if constant {
        mode_required_pd
    } else {
        1.0 - rng.gen::<f64>()
    }
}
