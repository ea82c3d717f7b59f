//! Scenario definitions.
//!
//! A scenario is a set of platforms, sensor definitions in the keyword
//! language and a timeline of operator commands. Scenarios load from JSON
//! or are built in. All scenarios are deterministic given the same seed.

use crate::platform::{MotionSpec, PlatformSpec};
use anyhow::Context;
use sensor_core::{SimEpoch, SpatialDomain};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which pre-defined scenario to load.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// Ground radar searching for four hostile aircraft, 3-of-4 track confirmation
    RadarSearch,
    /// Search mode hands a target to a single-target-track mode
    SearchAndTrack,
    /// Airborne EO/IR sensor that only sees sunlit targets
    Optical,
    /// Airborne SAR spot collection over parked vehicles
    SarSpot,
    /// Airborne SAR strip collection, one image per frame
    SarStrip,
}

/// Something an operator does to a sensor at a given time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    TurnOn,
    TurnOff,
    SelectMode { mode: String },
    DeselectMode { mode: String },
    /// Track `target` (platform name) under request id `request`
    StartTracking {
        request: u32,
        target: String,
        #[serde(default)]
        mode: Option<String>,
    },
    StopTracking { request: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub time: f64,
    pub sensor: String,
    #[serde(flatten)]
    pub action: Action,
}

/// A fully configured simulation scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    /// seconds
    pub duration: f64,
    /// simulation step (s)
    pub sim_dt: f64,
    /// Use each mode's `required_pd` instead of drawing one per attempt
    #[serde(default)]
    pub use_constant_required_pd: bool,
    #[serde(default)]
    pub epoch: SimEpoch,
    pub platforms: Vec<PlatformSpec>,
    /// `sensor ... end_sensor` blocks
    pub sensors: String,
    #[serde(default)]
    pub commands: Vec<Command>,
}

impl Scenario {
    /// Build the named scenario. Uses `seed` for repeatability.
    pub fn build(kind: ScenarioKind, seed: u64) -> Self {
        match kind {
            ScenarioKind::RadarSearch => Self::radar_search(seed),
            ScenarioKind::SearchAndTrack => Self::search_and_track(seed),
            ScenarioKind::Optical => Self::optical(seed),
            ScenarioKind::SarSpot => Self::sar_spot(seed),
            ScenarioKind::SarStrip => Self::sar_strip(seed),
        }
    }

    /// Read a scenario from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing scenario {}", path.display()))
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let scenario: Scenario = serde_json::from_str(text)?;
        anyhow::ensure!(scenario.sim_dt > 0.0, "sim_dt must be positive");
        anyhow::ensure!(scenario.duration >= 0.0, "duration must not be negative");
        Ok(scenario)
    }

    // -----------------------------------------------------------------------
    // Scenario 1: radar search
    // -----------------------------------------------------------------------
    fn radar_search(seed: u64) -> Self {
        let mut site = PlatformSpec::new("site", 0.0, 0.0, 10.0);
        site.side = "blue".into();
        site.domain = SpatialDomain::Land;

        let platforms = vec![
            site,
            aircraft("inbound", "red", [1.5, 0.0, 8000.0], 180.0, 250.0, MotionSpec::ConstantVelocity),
            aircraft("crossing", "red", [0.5, -0.6, 6000.0], 90.0, 200.0, MotionSpec::ConstantVelocity),
            aircraft(
                "orbit",
                "red",
                [-0.8, 0.3, 9000.0],
                0.0,
                180.0,
                MotionSpec::ConstantTurn { rate_deg: 3.0 },
            ),
            // Below the radar horizon for the whole run
            aircraft("skimmer", "red", [0.0, 2.3, 20.0], 270.0, 15.0, MotionSpec::ConstantVelocity),
            aircraft("friendly", "blue", [-0.4, -0.4, 5000.0], 45.0, 150.0, MotionSpec::ConstantVelocity),
        ];

        Scenario {
            name: "radar_search".into(),
            seed,
            duration: 60.0,
            sim_dt: 1.0,
            use_constant_required_pd: false,
            epoch: SimEpoch::default(),
            platforms,
            sensors: "
                sensor surveillance radar
                  platform site
                  on
                  ignore_same_side
                  frequency 3 GHz peak_power 1 MW pulse_width 10 us bandwidth 1 MHz
                  pulse_repetition_frequency 1000 hz
                  beamwidth 2 deg number_of_pulses_integrated 10
                  detection_threshold 13 dB
                  swerling_case 1 probability_of_false_alarm 1.0e-6
                  maximum_range 300 km
                  frame_time 5 s
                  hits_to_establish_track 3 4
                  hits_to_maintain_track 2 4
                  error_model radar
                  reports_location reports_range reports_bearing reports_elevation reports_range_rate
                end_sensor"
                .into(),
            commands: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 2: search hands off to track
    // -----------------------------------------------------------------------
    fn search_and_track(seed: u64) -> Self {
        let mut ship = PlatformSpec::new("ship", 0.0, 0.0, 20.0);
        ship.side = "blue".into();
        ship.domain = SpatialDomain::Surface;

        let platforms = vec![
            ship,
            aircraft("bandit", "red", [1.0, 0.2, 7000.0], 190.0, 280.0, MotionSpec::ConstantVelocity),
            aircraft("trailer", "red", [1.2, 0.25, 7000.0], 190.0, 280.0, MotionSpec::ConstantVelocity),
        ];

        Scenario {
            name: "search_and_track".into(),
            seed,
            duration: 40.0,
            sim_dt: 1.0,
            use_constant_required_pd: true,
            epoch: SimEpoch::default(),
            platforms,
            sensors: "
                sensor mfr radar
                  platform ship
                  on
                  ignore_same_side
                  selection_mode multiple
                  initial_mode search
                  frequency 10 GHz peak_power 200 kW pulse_width 1 us bandwidth 1 MHz
                  beamwidth 1.5 deg detection_threshold 13 dB
                  maximum_range 250 km
                  mode search
                    frame_time 4 s
                    hits_to_establish_track 2 3
                  end_mode
                  mode stt
                    frame_time 1 s
                    maximum_request_count 1
                    disables_search
                    on_failure search
                    number_of_pulses_integrated 16
                    reports_location reports_range reports_bearing reports_elevation reports_range_rate
                    range_error_sigma 20 m azimuth_error_sigma 0.2 deg elevation_error_sigma 0.2 deg
                  end_mode
                end_sensor"
                .into(),
            commands: vec![
                Command {
                    time: 10.0,
                    sensor: "mfr".into(),
                    action: Action::StartTracking {
                        request: 1,
                        target: "bandit".into(),
                        mode: Some("stt".into()),
                    },
                },
                Command {
                    time: 10.0,
                    sensor: "mfr".into(),
                    action: Action::SelectMode { mode: "stt".into() },
                },
                Command {
                    time: 30.0,
                    sensor: "mfr".into(),
                    action: Action::StopTracking { request: 1 },
                },
            ],
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 3: EO/IR with a daylight gate
    // -----------------------------------------------------------------------
    fn optical(seed: u64) -> Self {
        let mut uav = aircraft("uav", "blue", [10.0, 0.0, 6000.0], 90.0, 60.0, MotionSpec::ConstantVelocity);
        uav.type_name = "uav".into();

        let mut jet = aircraft("jet", "red", [10.15, 0.1, 6000.0], 270.0, 220.0, MotionSpec::ConstantVelocity);
        jet.infrared_intensity = 2000.0;

        Scenario {
            name: "optical".into(),
            seed,
            duration: 30.0,
            sim_dt: 1.0,
            use_constant_required_pd: false,
            epoch: SimEpoch::default(),
            platforms: vec![uav, jet],
            sensors: "
                sensor irst optical
                  platform uav
                  on
                  noise_equivalent_irradiance 1.0e-12
                  detection_threshold 10 dB
                  atmospheric_attenuation 0.05
                  target_solar_illumination_angle 0 deg 90 deg
                  frame_time 1 s
                  hits_to_establish_track 2 3
                  azimuth_error_sigma 0.05 deg elevation_error_sigma 0.05 deg
                end_sensor"
                .into(),
            commands: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Scenario 4 and 5: SAR
    // -----------------------------------------------------------------------
    fn sar_platforms() -> Vec<PlatformSpec> {
        let mut platforms = vec![aircraft(
            "jstars",
            "blue",
            [0.0, 0.0, 8000.0],
            0.0,
            200.0,
            MotionSpec::ConstantVelocity,
        )];
        // Broadside at 30 deg depression is ~13.9 km east of the track
        for (i, lat) in [0.0, 0.002, -0.002].into_iter().enumerate() {
            let mut truck = PlatformSpec::new(format!("truck{}", i + 1), lat, 0.1247, 0.0);
            truck.side = "red".into();
            truck.domain = SpatialDomain::Land;
            truck.radar_cross_section = 10.0;
            truck.optical_area = 20.0;
            platforms.push(truck);
        }
        let mut mover = PlatformSpec::new("mover", 0.001, 0.1247, 0.0);
        mover.side = "red".into();
        mover.domain = SpatialDomain::Land;
        mover.radar_cross_section = 10.0;
        mover.speed = 15.0;
        mover.motion = MotionSpec::ConstantVelocity;
        platforms.push(mover);
        platforms
    }

    fn sar_spot(seed: u64) -> Self {
        Scenario {
            name: "sar_spot".into(),
            seed,
            duration: 10.0,
            sim_dt: 0.5,
            use_constant_required_pd: true,
            epoch: SimEpoch::default(),
            platforms: Self::sar_platforms(),
            sensors: format!(
                "
                sensor sar1 sar
                  platform jstars
                  on
                  {SAR_COMMON}
                  operating_mode spot
                  resolution 1 m
                  automatic_turn_off
                end_sensor"
            ),
            commands: Vec::new(),
        }
    }

    fn sar_strip(seed: u64) -> Self {
        Scenario {
            name: "sar_strip".into(),
            seed,
            duration: 10.0,
            sim_dt: 1.0,
            use_constant_required_pd: true,
            epoch: SimEpoch::default(),
            platforms: Self::sar_platforms(),
            sensors: format!(
                "
                sensor sar1 sar
                  platform jstars
                  on
                  {SAR_COMMON}
                  operating_mode strip
                  resolution 3 m
                  frame_time 2 s
                end_sensor"
            ),
            commands: vec![Command {
                time: 6.0,
                sensor: "sar1".into(),
                action: Action::TurnOff,
            }],
        }
    }
}

/// Right-looking SAR used by both SAR scenarios.
const SAR_COMMON: &str = "yaw 90 deg
                  ignore_same_side
                  frequency 10 GHz peak_power 10 kW bandwidth 150 MHz
                  beamwidth 2 deg antenna_tilt -30 deg
                  image_size 2000 m";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn aircraft(
    name: &str,
    side: &str,
    [lat_deg, lon_deg, alt]: [f64; 3],
    heading_deg: f64,
    speed: f64,
    motion: MotionSpec,
) -> PlatformSpec {
    let mut spec = PlatformSpec::new(name, lat_deg, lon_deg, alt);
    spec.side = side.into();
    spec.domain = SpatialDomain::Air;
    spec.heading_deg = heading_deg;
    spec.speed = speed;
    spec.motion = motion;
    spec.radar_cross_section = 5.0;
    spec.infrared_intensity = 500.0;
    spec
}
