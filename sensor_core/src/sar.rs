//! Synthetic aperture radar: performance prediction and image formation.
//!
//! # Collection Policy
//! - **Spot**: on begin, every eligible platform inside the imaged patch
//!   becomes a chance. Each sample re-attempts every open chance. A chance
//!   that misses a single sample is out of the image for good.
//! - The image is formed when the collection ends with the dwell complete,
//!   either at turn-off or, with `automatic_turn_off`, at dwell expiry.
//!   Ending early aborts and emits nothing.
//! - **Strip**: chances are rebuilt every frame and each frame produces
//!   one image.
//! - Stream numbers increase on every spot collection, and on a strip
//!   collection only when the previous one was not strip. Frame numbers
//!   restart with each stream.
//! - SAR detections form images, never tracks.

use crate::context::{Platform, PlatformCatalog};
use crate::error::{Result, SensorError};
use crate::mode::{DetectEnv, ModeCapability, ModeCommon};
use bitflags::bitflags;
use sensor_models::geometry::{within_horizon, EARTH_RADIUS, FOUR_THIRDS_EARTH, SPEED_OF_LIGHT};
use sensor_models::input::{db_to_linear, linear_to_db};
use sensor_models::radar::{received_power, signal_to_noise};
use sensor_models::{
    Antenna, BeamPattern, DetectionResult, FailureStatus, InputReader, InputResult, LocalFrame,
    Receiver, ReportingFlags, Transmitter, ValueType, Vec3,
};
use serde::Serialize;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use tracing::{debug, warn};
use tracker_core::TargetIndex;

/// Upper bound on any computed dwell time (s)
const DWELL_CAP: f64 = 1000.0;
/// Azimuth resolution reported when none can be achieved (m)
const UNACHIEVABLE_RESOLUTION: f64 = 1000.0;
/// CNR reported when the patch is outside the steerable region
const NEGLIGIBLE_CNR: f64 = 1.0e-37;

bitflags! {
    /// Why a collection would be substandard right now.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub struct SarFailure: u32 {
        const FIELD_OF_VIEW_EXCEEDED        = 1 << 0;
        const BEYOND_HORIZON                = 1 << 1;
        const DWELL_TIME_LIMIT_EXCEEDED     = 1 << 2;
        const AMBIGUOUS_RANGE               = 1 << 3;
        const DOPPLER_FOLDOVER              = 1 << 4;
        const INSUFFICIENT_CLUTTER_TO_NOISE = 1 << 5;
        const INSUFFICIENT_RESOLUTION       = 1 << 6;
    }
}

impl SarFailure {
    /// Lower-case names joined by `|`, e.g. `"beyond_horizon|ambiguous_range"`.
    pub fn describe(&self) -> String {
        self.iter_names()
            .map(|(name, _)| name.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join("|")
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    #[default]
    Spot,
    Strip,
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Slant range (m), grazing angle (rad) and whether the boresight misses the
/// Earth, for a sensor at `altitude` looking down at `depression` over a
/// 4/3 Earth.
pub fn slant_range_and_grazing(altitude: f64, depression: f64) -> (f64, f64, bool) {
    if altitude < 0.0 {
        return (0.0, 0.0, false);
    }
    if depression >= FRAC_PI_2 {
        return (altitude, FRAC_PI_2, false);
    }
    let b = EARTH_RADIUS * FOUR_THIRDS_EARTH;
    let a = b + altitude;
    let horizon_depression = FRAC_PI_2 - (b / a).asin();
    if depression > horizon_depression {
        // Triangle: Earth centre, sensor, boresight ground point
        let angle_b = FRAC_PI_2 - depression;
        let angle_a = PI - ((a / b) * angle_b.sin()).clamp(-1.0, 1.0).asin();
        let angle_c = PI - angle_a - angle_b;
        let slant = (a * a + b * b - 2.0 * a * b * angle_c.cos()).max(0.0).sqrt();
        (slant, angle_a - FRAC_PI_2, false)
    } else {
        ((a * a - b * b).sqrt(), 0.0, true)
    }
}

/// Collection geometry of the boresight at one instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SarGeometry {
    /// Sensor location (WCS)
    pub origin: Vec3,
    /// Unit boresight (WCS)
    pub look_wcs: Vec3,
    pub slant_range: f64,
    pub depression: f64,
    pub grazing: f64,
    pub altitude: f64,
    pub ground_speed: f64,
    /// Angle between velocity and boresight
    pub total_angle: f64,
    /// Angle between the horizontal parts of velocity and boresight
    pub squint: f64,
    /// Electronic steering off the mount
    pub scan_angle: f64,
    pub beyond_horizon: bool,
}

impl SarGeometry {
    pub fn compute(host: &Platform, frame: &LocalFrame, scan_angle: f64) -> Self {
        let origin = frame.origin();
        let look_wcs = (frame.to_wcs(&Vec3::x()) - origin).normalize();
        let look = host.ned_frame().rotate_to_local(&look_wcs);
        let horizontal = look.x.hypot(look.y);
        let depression = look.z.atan2(horizontal);
        let altitude = host.altitude();
        let (slant_range, grazing, beyond_horizon) = slant_range_and_grazing(altitude, depression);

        let velocity = host.velocity_ned();
        let ground_speed = velocity.norm();
        let total_angle = if ground_speed > 0.0 {
            (velocity.dot(&look) / ground_speed).clamp(-1.0, 1.0).acos()
        } else {
            FRAC_PI_2
        };
        let horizontal_speed = velocity.x.hypot(velocity.y);
        let squint = if horizontal > 1.0e-6 && horizontal_speed > 0.0 {
            ((velocity.x * look.x + velocity.y * look.y) / (horizontal * horizontal_speed))
                .clamp(-1.0, 1.0)
                .acos()
        } else {
            total_angle
        };

        Self {
            origin,
            look_wcs,
            slant_range,
            depression,
            grazing,
            altitude,
            ground_speed,
            total_angle,
            squint,
            scan_angle,
            beyond_horizon,
        }
    }

    /// Where the boresight meets the ground.
    pub fn center(&self) -> Vec3 {
        self.origin + self.look_wcs * self.slant_range
    }
}

/// Predicted quality of a collection started now.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SarPerformance {
    pub dwell_time: f64,
    pub azimuth_resolution: f64,
    pub ground_range_resolution: f64,
    pub clutter_to_noise: f64,
    pub prf: f64,
    pub minimum_prf: f64,
}

/// Angular extent of the imaged patch in the antenna frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldOfView {
    pub azimuth: (f64, f64),
    pub elevation: (f64, f64),
}

// ---------------------------------------------------------------------------
// SarMode
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct SarMode {
    pub antenna: Antenna,
    pub beam: BeamPattern,
    pub xmtr: Transmitter,
    pub rcvr: Receiver,
    pub operating_mode: OperatingMode,
    pub automatic_turn_off: bool,
    pub inhibit_substandard_collection: bool,
    pub rescale_substandard_image: bool,
    /// Ka
    pub doppler_filter_broadening_factor: f64,
    /// Kd
    pub doppler_foldover_margin_factor: f64,
    /// Image formation time (s); used when the dwell is not computed
    pub dwell_time: f64,
    /// Requested azimuth resolution (m); the dwell is computed from it
    pub resolution: f64,
    pub compute_dwell_time: bool,
    pub maximum_dwell_time: f64,
    pub minimum_clutter_to_noise: f64,
    /// Fastest target that still images (m/s)
    pub maximum_detectable_speed: f64,
    pub integration_gain: f64,
    pub adjustment_factor: f64,
    /// Clutter σ0 (linear); derived from the wavelength when unset
    pub backscatter_coefficient: Option<f64>,
    pub image_width: f64,
    pub image_height: f64,
    /// Pixel powers (W) mapped to intensity 0 and 1
    pub intensity_limits: Option<(f64, f64)>,
    /// Span above the noise floor mapped to full intensity (linear)
    pub intensity_range: Option<f64>,
    /// Electronic steering off the mount boresight (rad)
    pub beam_steering_azimuth: f64,

    // Collection state
    pub compute_prf: bool,
    pub prf: f64,
    pub current_dwell_time: f64,
    pub current_azimuth_resolution: f64,
    pub current_ground_range_resolution: f64,
    pub image_fov: Option<FieldOfView>,
}

impl Default for SarMode {
    fn default() -> Self {
        Self {
            antenna: Antenna::default(),
            beam: BeamPattern::default(),
            xmtr: Transmitter::default(),
            rcvr: Receiver::default(),
            operating_mode: OperatingMode::Spot,
            automatic_turn_off: false,
            inhibit_substandard_collection: false,
            rescale_substandard_image: false,
            doppler_filter_broadening_factor: 1.0,
            doppler_foldover_margin_factor: 1.0,
            dwell_time: 0.0,
            resolution: 0.0,
            compute_dwell_time: false,
            maximum_dwell_time: 999.0,
            minimum_clutter_to_noise: 1.0,
            maximum_detectable_speed: 2.0,
            integration_gain: 1.0,
            adjustment_factor: 1.0,
            backscatter_coefficient: None,
            image_width: 0.0,
            image_height: 0.0,
            intensity_limits: None,
            intensity_range: None,
            beam_steering_azimuth: 0.0,
            compute_prf: false,
            prf: 0.0,
            current_dwell_time: 0.0,
            current_azimuth_resolution: 0.0,
            current_ground_range_resolution: 0.0,
            image_fov: None,
        }
    }
}

impl SarMode {
    pub fn noise_power(&self) -> f64 {
        self.rcvr.noise_power(&self.xmtr)
    }

    /// Dwell needed for `resolution` at this geometry, capped at 1000 s.
    pub fn compute_dwell_time(&self, g: &SarGeometry, resolution: f64) -> f64 {
        let fallback = (self.maximum_dwell_time + 1.0).max(DWELL_CAP);
        if g.scan_angle >= FRAC_PI_2 {
            return fallback;
        }
        let denominator =
            2.0 * g.ground_speed * resolution * g.squint.sin().abs() * g.grazing.cos();
        if denominator > 0.0 {
            let lambda = self.xmtr.wavelength();
            (lambda * self.doppler_filter_broadening_factor * g.slant_range / denominator)
                .min(DWELL_CAP)
        } else {
            fallback
        }
    }

    /// Azimuth resolution reached by dwelling `dwell_time` at this geometry.
    pub fn compute_azimuth_resolution(&self, g: &SarGeometry, dwell_time: f64) -> f64 {
        if g.scan_angle > FRAC_PI_2 {
            return UNACHIEVABLE_RESOLUTION;
        }
        let denominator =
            2.0 * g.ground_speed * dwell_time * g.squint.sin().abs() * g.grazing.cos();
        if denominator > 0.0 {
            self.xmtr.wavelength() * self.doppler_filter_broadening_factor * g.slant_range
                / denominator
        } else {
            UNACHIEVABLE_RESOLUTION
        }
    }

    /// Range resolution projected on the ground. Grazing beyond 45° is
    /// treated as 45°.
    pub fn compute_ground_range_resolution(&self, g: &SarGeometry) -> f64 {
        let pulse_width = self.xmtr.compressed_pulse_width(self.rcvr.bandwidth);
        let slant_resolution = if pulse_width > 0.0 {
            0.5 * SPEED_OF_LIGHT * pulse_width
        } else {
            self.resolution
        };
        slant_resolution / g.grazing.abs().min(FRAC_PI_4).cos()
    }

    /// Highest PRF that keeps the patch unambiguous in range, with margin.
    pub fn compute_prf(slant_range: f64) -> f64 {
        0.9 * SPEED_OF_LIGHT / (2.0 * slant_range + 1.0)
    }

    /// Clutter-to-noise ratio of a resolution cell at the boresight.
    pub fn compute_clutter_to_noise(
        &self,
        g: &SarGeometry,
        prf: f64,
        dwell_time: f64,
        azimuth_resolution: f64,
    ) -> f64 {
        if g.scan_angle >= FRAC_PI_2 {
            return NEGLIGIBLE_CNR;
        }
        let lambda = self.xmtr.wavelength();
        let sigma0 = self.backscatter_coefficient.unwrap_or_else(|| {
            db_to_linear(15.0 * (3f64.log10() - 1.0 - (100.0 * lambda).log10()))
        });
        let grazing = g.grazing.abs().max(5f64.to_radians());
        let rcs = sigma0 * azimuth_resolution * azimuth_resolution * grazing.sin();
        let gain = self.beam.peak_gain();
        let power = received_power(&self.xmtr, &self.rcvr, gain, gain, rcs, g.slant_range);
        let pulses = (dwell_time * prf).floor().max(1.0);
        let signal = power
            * self.xmtr.pulse_compression_ratio
            * pulses
            * self.integration_gain
            * self.adjustment_factor;
        signal_to_noise(signal, self.noise_power())
    }

    pub fn predict_performance(&self, g: &SarGeometry) -> SarPerformance {
        let (dwell_time, azimuth_resolution) = if self.compute_dwell_time {
            (self.compute_dwell_time(g, self.resolution), self.resolution)
        } else {
            (self.dwell_time, self.compute_azimuth_resolution(g, self.dwell_time))
        };
        let prf = if self.xmtr.pulse_repetition_frequency > 0.0 {
            self.xmtr.pulse_repetition_frequency
        } else {
            Self::compute_prf(g.slant_range)
        };
        let lambda = self.xmtr.wavelength();
        let cos_scan = g.scan_angle.cos().abs();
        let minimum_prf = if g.scan_angle < FRAC_PI_2 && lambda * cos_scan > 0.0 {
            2.0 * g.ground_speed
                * self.doppler_foldover_margin_factor
                * self.beam.azimuth_beamwidth
                * g.total_angle.sin()
                / (lambda * cos_scan)
        } else {
            prf + 1.0
        };
        SarPerformance {
            dwell_time,
            azimuth_resolution,
            ground_range_resolution: self.compute_ground_range_resolution(g),
            clutter_to_noise: self.compute_clutter_to_noise(g, prf, dwell_time, azimuth_resolution),
            prf,
            minimum_prf,
        }
    }

    /// Predicted performance and every reason it falls short.
    pub fn can_image_now(&self, g: &SarGeometry) -> (SarFailure, SarPerformance) {
        let p = self.predict_performance(g);
        let mut failures = SarFailure::empty();
        failures.set(
            SarFailure::DWELL_TIME_LIMIT_EXCEEDED,
            p.dwell_time > self.maximum_dwell_time,
        );
        failures.set(
            SarFailure::INSUFFICIENT_CLUTTER_TO_NOISE,
            p.clutter_to_noise < self.minimum_clutter_to_noise,
        );
        failures.set(
            SarFailure::DOPPLER_FOLDOVER,
            p.prf > 0.0 && p.prf < p.minimum_prf,
        );
        failures.set(SarFailure::FIELD_OF_VIEW_EXCEEDED, g.scan_angle >= FRAC_PI_2);
        failures.set(SarFailure::BEYOND_HORIZON, g.beyond_horizon);
        failures.set(
            SarFailure::AMBIGUOUS_RANGE,
            p.prf > 0.0 && g.slant_range > SPEED_OF_LIGHT / (2.0 * p.prf),
        );
        failures.set(
            SarFailure::INSUFFICIENT_RESOLUTION,
            self.resolution > 0.0 && p.azimuth_resolution > self.resolution * (1.0 + 1.0e-9),
        );
        (failures, p)
    }

    /// Sample period of an open collection.
    pub fn update_interval(&self, g: &SarGeometry, frame_time: f64) -> f64 {
        if frame_time > 0.0 {
            return frame_time;
        }
        if self.operating_mode == OperatingMode::Strip && g.ground_speed > 1.0 {
            let beamwidth = self.beam.azimuth_beamwidth.min(self.beam.elevation_beamwidth);
            return 0.5 * beamwidth * g.slant_range / g.ground_speed;
        }
        1.0
    }

    /// Patch imaged by a spot collection of `dwell_time`.
    ///
    /// An explicit image size sets the patch directly. Otherwise a narrow
    /// antenna field of view is widened by a margin so that targets near
    /// the patch edge still get a chance.
    pub fn spot_field_of_view(&self, g: &SarGeometry, dwell_time: f64) -> FieldOfView {
        let mut fov = FieldOfView {
            azimuth: self.antenna.azimuth_field_of_view,
            elevation: self.antenna.elevation_field_of_view,
        };
        let slant = g.slant_range;
        if slant <= 0.0 {
            return fov;
        }

        if self.image_width > 0.0 || self.image_height > 0.0 {
            if self.image_width > 0.0 {
                let half = (0.5 * self.image_width).atan2(slant);
                fov.azimuth = (-half, half);
            }
            if self.image_height > 0.0 {
                let down = slant * g.depression.sin();
                let ground = slant * g.depression.cos();
                let half = 0.5 * self.image_height;
                let upper = (g.depression - down.atan2(ground + half)).clamp(0.0, FRAC_PI_2);
                let lower = (down.atan2(ground - half) - g.depression).clamp(0.0, FRAC_PI_2);
                fov.elevation = (-lower, upper);
            }
            return fov;
        }

        let az_width = fov.azimuth.1 - fov.azimuth.0;
        let el_width = fov.elevation.1 - fov.elevation.0;
        let narrow = |w: f64| w > 0.001f64.to_radians() && w < FRAC_PI_2;
        if g.grazing > 0.01f64.to_radians() && narrow(az_width) && narrow(el_width) {
            let margin = (50.0 * dwell_time).max(1000.0).min((0.2 * slant).min(5000.0));
            let az_margin = margin / slant;
            fov.azimuth = (fov.azimuth.0 - az_margin, fov.azimuth.1 + az_margin);

            let sin_graze = g.grazing.sin();
            let spot_height = el_width * slant / sin_graze;
            let new_width = (spot_height + 2.0 * margin) * sin_graze / slant;
            let el_margin = 0.5 * (new_width - el_width);
            fov.elevation = (fov.elevation.0 - el_margin, fov.elevation.1 + el_margin);
        }
        fov
    }

    /// The antenna with the imaged patch as its field of view.
    pub fn imaging_antenna(&self) -> Antenna {
        let mut antenna = self.antenna.clone();
        if let Some(fov) = self.image_fov {
            antenna.azimuth_field_of_view = fov.azimuth;
            antenna.elevation_field_of_view = fov.elevation;
        }
        antenna
    }

    fn read_dwell(&mut self, input: &mut InputReader) -> InputResult<()> {
        self.dwell_time = input.read_value_of_type(ValueType::Time)?;
        input.value_greater(self.dwell_time, 0.0)?;
        self.compute_dwell_time = false;
        Ok(())
    }
}

impl ModeCapability for SarMode {
    fn capabilities(&self) -> ReportingFlags {
        ReportingFlags::LOCATION | ReportingFlags::SIGNAL_TO_NOISE | ReportingFlags::OTHER
    }

    fn default_reporting(&self) -> ReportingFlags {
        ReportingFlags::LOCATION
    }

    fn is_radar(&self) -> bool {
        true
    }

    fn antenna(&self) -> &Antenna {
        &self.antenna
    }

    fn antenna_frame(&self, mount: &LocalFrame) -> LocalFrame {
        self.antenna
            .frame(&mount.rotated(self.beam_steering_azimuth, 0.0))
    }

    fn process_input(&mut self, input: &mut InputReader) -> InputResult<bool> {
        match input.command() {
            "operating_mode" => {
                let value = input.read_string()?;
                self.operating_mode = match value.as_str() {
                    "spot" | "spotlight" => OperatingMode::Spot,
                    "strip" | "stripmap" => OperatingMode::Strip,
                    _ => return Err(input.bad_value(&value)),
                };
            }
            "automatic_turn_off" => {
                self.automatic_turn_off = input.read_optional_bool();
            }
            "inhibit_substandard_collection" => {
                self.inhibit_substandard_collection = input.read_optional_bool();
            }
            "rescale_substandard_image" => {
                self.rescale_substandard_image = input.read_optional_bool();
            }
            "doppler_filter_broadening_factor" => {
                self.doppler_filter_broadening_factor = input.read_value()?;
                input.value_greater_or_equal(self.doppler_filter_broadening_factor, 1.0)?;
            }
            "doppler_foldover_margin_factor" | "doppler_overcollect_ratio" => {
                self.doppler_foldover_margin_factor = input.read_value()?;
                input.value_greater_or_equal(self.doppler_foldover_margin_factor, 1.0)?;
            }
            "dwell_time" | "image_formation_time" => self.read_dwell(input)?,
            "resolution" => {
                self.resolution = input.read_value_of_type(ValueType::Length)?;
                input.value_greater(self.resolution, 0.0)?;
                self.compute_dwell_time = true;
            }
            "maximum_dwell_time" => {
                self.maximum_dwell_time = input.read_value_of_type(ValueType::Time)?;
                input.value_greater(self.maximum_dwell_time, 0.0)?;
            }
            "minimum_clutter_to_noise_ratio" => {
                self.minimum_clutter_to_noise = input.read_value_of_type(ValueType::Ratio)?;
                input.value_greater(self.minimum_clutter_to_noise, 0.0)?;
            }
            "maximum_detectable_speed" => {
                self.maximum_detectable_speed = input.read_value_of_type(ValueType::Speed)?;
                input.value_greater_or_equal(self.maximum_detectable_speed, 0.0)?;
            }
            "integration_gain" => {
                self.integration_gain = input.read_value_of_type(ValueType::Ratio)?;
                input.value_greater_or_equal(self.integration_gain, 1.0)?;
            }
            "adjustment_factor" => {
                self.adjustment_factor = input.read_value_of_type(ValueType::Ratio)?;
                input.value_greater(self.adjustment_factor, 0.0)?;
            }
            "backscatter_coefficient" => {
                let sigma0 = input.read_value_of_type(ValueType::Ratio)?;
                input.value_greater(sigma0, 0.0)?;
                self.backscatter_coefficient = Some(sigma0);
            }
            "image_width" => {
                self.image_width = input.read_value_of_type(ValueType::Length)?;
                input.value_greater(self.image_width, 0.0)?;
            }
            "image_height" => {
                self.image_height = input.read_value_of_type(ValueType::Length)?;
                input.value_greater(self.image_height, 0.0)?;
            }
            "image_size" => {
                let size = input.read_value_of_type(ValueType::Length)?;
                input.value_greater(size, 0.0)?;
                self.image_width = size;
                self.image_height = size;
            }
            "intensity_limits" => {
                let min = input.read_value_of_type(ValueType::Power)?;
                let max = input.read_value_of_type(ValueType::Power)?;
                input.value_greater(min, 0.0)?;
                input.value_greater(max, min)?;
                self.intensity_limits = Some((min, max));
            }
            "intensity_range" => {
                let range = input.read_value_of_type(ValueType::Ratio)?;
                input.value_greater(range, 1.0)?;
                self.intensity_range = Some(range);
            }
            "beam_steering_azimuth" => {
                self.beam_steering_azimuth = input.read_value_of_type(ValueType::Angle)?;
                input.value_in_closed_range(self.beam_steering_azimuth, -PI, PI)?;
            }
            _ => {
                return Ok(self.antenna.process_input(input)?
                    || self.beam.process_input(input)?
                    || self.xmtr.process_input(input)?
                    || self.rcvr.process_input(input)?);
            }
        }
        Ok(true)
    }

    fn initialize(&mut self, sensor: &str, common: &ModeCommon) -> Result<()> {
        let missing = if self.compute_dwell_time {
            self.resolution <= 0.0
        } else {
            self.dwell_time <= 0.0
        };
        if missing {
            return Err(SensorError::MissingDwellOrResolution {
                sensor: sensor.to_string(),
                mode: common.name.clone(),
            });
        }
        self.compute_prf = self.xmtr.pulse_repetition_frequency <= 0.0;
        self.prf = self.xmtr.pulse_repetition_frequency;
        if self.noise_power() <= 0.0 {
            warn!(sensor, mode = %common.name, "SAR receiver has no noise bandwidth; nothing will image");
        }
        Ok(())
    }

    fn attempt_to_detect(&self, env: &DetectEnv<'_>, target: &Platform, result: &mut DetectionResult) {
        if !result.check(FailureStatus::TARGET_CONCEALED, target.concealment > 0.99) {
            return;
        }
        if !result.check(
            FailureStatus::VELOCITY_LIMITS,
            target.speed() > self.maximum_detectable_speed,
        ) {
            return;
        }
        if !self.imaging_antenna().check_geometry(target.altitude(), result) {
            return;
        }
        let aspect = result.rcvr_to_tgt;
        let visible = within_horizon(env.host.altitude(), target.altitude(), aspect.range, FOUR_THIRDS_EARTH);
        if !result.check(FailureStatus::RCVR_HORIZON_MASKING, !visible) {
            return;
        }

        let gain = self.beam.gain(aspect.azimuth, aspect.elevation);
        let power = received_power(
            &self.xmtr,
            &self.rcvr,
            gain,
            gain,
            target.radar_cross_section,
            aspect.range,
        );
        let pulses = (self.current_dwell_time * self.prf).max(1.0);
        let signal = power
            * self.xmtr.pulse_compression_ratio
            * pulses
            * self.integration_gain
            * self.adjustment_factor;
        result.signal_to_noise = signal_to_noise(signal, self.noise_power());
        result.pd = if result.signal_to_noise >= self.rcvr.detection_threshold {
            1.0
        } else {
            0.0
        };
        if !result.check(
            FailureStatus::SIGNAL_LEVEL,
            result.pd <= 0.0 || result.pd < result.required_pd,
        ) {
            return;
        }
        result.optical_signature = target.optical_area;
        result.check(
            FailureStatus::XMTR_RANGE_LIMITS,
            self.prf > 0.0 && aspect.range > SPEED_OF_LIGHT / (2.0 * self.prf),
        );
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// One target in a formed image.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SarImageObject {
    pub target: TargetIndex,
    pub name: String,
    pub location_wcs: Vec3,
    pub pixel_count: f64,
    /// 0 at the noise floor, 1 at the top of the intensity range
    pub pixel_intensity: f64,
    /// Mean received power over the collection (W)
    pub signal_level: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SarImage {
    pub sensor: String,
    pub mode: String,
    pub operating_mode: OperatingMode,
    pub stream: u32,
    pub frame: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub azimuth_resolution: f64,
    pub ground_range_resolution: f64,
    pub center_wcs: Vec3,
    /// Patch size (m); 0 when it cannot be determined
    pub width: f64,
    pub height: f64,
    pub width_pixels: u32,
    pub height_pixels: u32,
    pub noise_level: f64,
    pub background_level: f64,
    /// Power (dBW) of intensity 0
    pub minimum_level: f64,
    /// Power (dBW) of intensity 1
    pub maximum_level: f64,
    /// Planned over achieved azimuth resolution
    pub collection_factor: f64,
    pub objects: Vec<SarImageObject>,
}

/// One target considered during an open collection.
#[derive(Clone, Debug, PartialEq)]
pub struct SarChance {
    pub target: TargetIndex,
    pub signal_sum: f64,
    pub area_sum: f64,
    pub detections: u32,
    /// Set on the first missed sample
    pub missed: bool,
    pub location_wcs: Vec3,
}

impl SarChance {
    fn new(target: TargetIndex, location_wcs: Vec3) -> Self {
        Self {
            target,
            signal_sum: 0.0,
            area_sum: 0.0,
            detections: 0,
            missed: false,
            location_wcs,
        }
    }
}

/// What the collection achieved, for image scaling.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Achieved {
    azimuth_resolution: f64,
    ground_range_resolution: f64,
    clutter_to_noise: f64,
}

/// Names for the header of a formed image.
#[derive(Clone, Copy, Debug)]
pub struct ImageSource<'a> {
    pub sensor: &'a str,
    pub mode: &'a str,
}

// ---------------------------------------------------------------------------
// SarCollector
// ---------------------------------------------------------------------------

/// Open-collection state of one SAR sensor.
#[derive(Clone, Debug, Default)]
pub struct SarCollector {
    chances: Vec<SarChance>,
    stream: u32,
    frame: u32,
    start_time: f64,
    last_sample_time: f64,
    expiry: f64,
    collecting: Option<OperatingMode>,
    last_collection: Option<OperatingMode>,
    achieved: Achieved,
    start_geometry: Option<SarGeometry>,
}

impl SarCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_collecting(&self) -> bool {
        self.collecting.is_some()
    }

    pub fn collecting(&self) -> Option<OperatingMode> {
        self.collecting
    }

    pub fn stream(&self) -> u32 {
        self.stream
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn chances(&self) -> &[SarChance] {
        &self.chances
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn expiry(&self) -> f64 {
        self.expiry
    }

    pub fn dwell_complete(&self, sim_time: f64) -> bool {
        sim_time + 1.0e-9 >= self.expiry
    }

    /// Open a spot collection. Fails with the reasons the collection would be
    /// substandard when the mode inhibits such collections.
    pub fn begin_spot<'p>(
        &mut self,
        sim_time: f64,
        mode: &mut SarMode,
        host: &Platform,
        mount: &LocalFrame,
        candidates: impl IntoIterator<Item = &'p Platform>,
    ) -> std::result::Result<(), SarFailure> {
        self.stream += 1;
        self.frame = 0;
        self.last_collection = Some(OperatingMode::Spot);
        self.chances.clear();

        let frame = mode.antenna_frame(mount);
        let geometry = SarGeometry::compute(host, &frame, mode.beam_steering_azimuth.abs());
        let (failures, perf) = mode.can_image_now(&geometry);
        if mode.inhibit_substandard_collection && !failures.is_empty() {
            self.collecting = None;
            return Err(failures);
        }
        if mode.compute_prf {
            mode.prf = perf.prf;
        }

        let mut dwell = perf.dwell_time;
        let mut azimuth_resolution = perf.azimuth_resolution;
        if dwell > mode.maximum_dwell_time {
            dwell = mode.maximum_dwell_time;
            azimuth_resolution = mode.compute_azimuth_resolution(&geometry, dwell);
        }
        mode.current_dwell_time = dwell;
        mode.current_azimuth_resolution = azimuth_resolution;
        mode.current_ground_range_resolution = perf.ground_range_resolution;
        self.achieved = Achieved {
            azimuth_resolution,
            ground_range_resolution: perf.ground_range_resolution,
            clutter_to_noise: perf.clutter_to_noise,
        };

        self.start_time = sim_time;
        self.last_sample_time = sim_time;
        self.expiry = sim_time + dwell;
        self.start_geometry = Some(geometry);
        self.collecting = Some(OperatingMode::Spot);

        mode.image_fov = Some(mode.spot_field_of_view(&geometry, dwell));
        let antenna = mode.imaging_antenna();
        for platform in candidates {
            if platform.index == host.index {
                continue;
            }
            let aspect = frame.aspect(&platform.location_wcs);
            if antenna.within_range(aspect.range) && antenna.within_field_of_view(&aspect) {
                self.chances
                    .push(SarChance::new(platform.index, platform.location_wcs));
            }
        }
        debug!(
            stream = self.stream,
            chances = self.chances.len(),
            dwell,
            azimuth_resolution,
            "spot collection started"
        );
        Ok(())
    }

    /// Re-attempt every open chance. `attempt` runs the full detection
    /// pipeline against one platform.
    pub fn sample<F>(&mut self, sim_time: f64, mode: &SarMode, platforms: &PlatformCatalog, mut attempt: F)
    where
        F: FnMut(&Platform) -> DetectionResult,
    {
        let dt = sim_time - self.last_sample_time;
        let weight = if mode.prf > 0.0 && mode.current_dwell_time > 0.0 {
            dt / mode.current_dwell_time
        } else {
            1.0
        };
        let noise = mode.noise_power();
        self.chances.retain_mut(|chance| {
            let Some(target) = platforms.get(chance.target) else {
                debug!(target = %chance.target, "platform left during collection");
                return false;
            };
            if chance.missed {
                return true;
            }
            let result = attempt(target);
            if !result.detected() {
                chance.missed = true;
                return true;
            }
            if dt > 1.0e-6 {
                chance.signal_sum += result.signal_to_noise * noise * weight;
            }
            chance.area_sum += result.optical_signature;
            chance.detections += 1;
            chance.location_wcs = target.location_wcs;
            true
        });
        self.last_sample_time = sim_time;
    }

    /// Close a spot collection and form its image. Closing before expiry
    /// yields a coarser azimuth resolution than planned.
    pub fn end_spot<F>(
        &mut self,
        sim_time: f64,
        source: ImageSource<'_>,
        mode: &SarMode,
        platforms: &PlatformCatalog,
        attempt: F,
    ) -> SarImage
    where
        F: FnMut(&Platform) -> DetectionResult,
    {
        let end_time = sim_time.min(self.expiry.max(self.start_time));
        self.sample(end_time, mode, platforms, attempt);

        let actual_dwell = (end_time - self.start_time).max(0.1);
        if let Some(g) = self.start_geometry {
            let azimuth_resolution = mode.compute_azimuth_resolution(&g, actual_dwell);
            let mut ground_range_resolution = mode.compute_ground_range_resolution(&g);
            // Planned resolution is what the collection would reach at expiry
            let planned = mode.current_azimuth_resolution;
            if mode.rescale_substandard_image && planned > 0.0 && azimuth_resolution > planned {
                ground_range_resolution =
                    mode.current_ground_range_resolution * azimuth_resolution / planned;
            }
            self.achieved = Achieved {
                azimuth_resolution,
                ground_range_resolution,
                clutter_to_noise: mode.compute_clutter_to_noise(&g, mode.prf, actual_dwell, azimuth_resolution),
            };
        }
        self.frame = 0;
        let image = self.build_image(end_time, source, mode, platforms);
        self.chances.clear();
        self.collecting = None;
        image
    }

    /// Drop an open collection without forming an image.
    pub fn abort(&mut self) {
        self.chances.clear();
        self.collecting = None;
    }

    pub fn begin_strip(&mut self, sim_time: f64, mode: &mut SarMode, host: &Platform, mount: &LocalFrame) {
        if self.last_collection != Some(OperatingMode::Strip) {
            self.stream += 1;
            self.frame = 0;
        }
        self.last_collection = Some(OperatingMode::Strip);

        let frame = mode.antenna_frame(mount);
        let geometry = SarGeometry::compute(host, &frame, mode.beam_steering_azimuth.abs());
        let perf = mode.predict_performance(&geometry);
        if mode.compute_prf {
            mode.prf = perf.prf;
        }
        mode.current_dwell_time = perf.dwell_time.min(mode.maximum_dwell_time);
        mode.current_azimuth_resolution = perf.azimuth_resolution;
        mode.current_ground_range_resolution = perf.ground_range_resolution;
        mode.image_fov = None;
        self.achieved = Achieved {
            azimuth_resolution: perf.azimuth_resolution,
            ground_range_resolution: perf.ground_range_resolution,
            clutter_to_noise: perf.clutter_to_noise,
        };

        let beamwidth = mode.beam.azimuth_beamwidth.min(mode.beam.elevation_beamwidth);
        if beamwidth > 0.0 && perf.azimuth_resolution < 0.8 * mode.xmtr.wavelength() / beamwidth {
            warn!(
                azimuth_resolution = perf.azimuth_resolution,
                "strip resolution finer than the antenna supports"
            );
        }
        self.start_time = sim_time;
        self.last_sample_time = sim_time;
        self.expiry = f64::MAX;
        self.start_geometry = Some(geometry);
        self.chances.clear();
        self.collecting = Some(OperatingMode::Strip);
    }

    /// One strip frame: attempt every candidate in range and form its image.
    #[allow(clippy::too_many_arguments)]
    pub fn strip_frame<'p, F>(
        &mut self,
        sim_time: f64,
        source: ImageSource<'_>,
        mode: &SarMode,
        host: &Platform,
        mount: &LocalFrame,
        platforms: &'p PlatformCatalog,
        candidates: impl IntoIterator<Item = &'p Platform>,
        mut attempt: F,
    ) -> SarImage
    where
        F: FnMut(&Platform) -> DetectionResult,
    {
        let frame = mode.antenna_frame(mount);
        self.start_geometry = Some(SarGeometry::compute(host, &frame, mode.beam_steering_azimuth.abs()));
        self.start_time = self.last_sample_time;
        self.chances.clear();
        let noise = mode.noise_power();
        for target in candidates {
            if target.index == host.index {
                continue;
            }
            let range = (target.location_wcs - host.location_wcs).norm();
            if !mode.antenna.within_range(range) {
                continue;
            }
            let result = attempt(target);
            let mut chance = SarChance::new(target.index, target.location_wcs);
            if result.detected() {
                chance.signal_sum = result.signal_to_noise * noise;
                chance.area_sum = result.optical_signature;
                chance.detections = 1;
            } else {
                chance.missed = true;
            }
            self.chances.push(chance);
        }
        self.frame += 1;
        self.last_sample_time = sim_time;
        self.build_image(sim_time, source, mode, platforms)
    }

    pub fn end_strip(&mut self) {
        self.chances.clear();
        self.collecting = None;
    }

    /// Forget a platform that left the simulation.
    pub fn remove_target(&mut self, target: TargetIndex) {
        self.chances.retain(|c| c.target != target);
    }

    fn build_image(
        &self,
        end_time: f64,
        source: ImageSource<'_>,
        mode: &SarMode,
        platforms: &PlatformCatalog,
    ) -> SarImage {
        let achieved = self.achieved;
        let noise = mode.noise_power();
        let background = achieved.clutter_to_noise * noise;

        let mut floor = linear_to_db(noise);
        let mut range = (linear_to_db(background) - floor) / 0.3;
        if let Some(r) = mode.intensity_range {
            range = linear_to_db(r);
        }
        if let Some((min, max)) = mode.intensity_limits {
            floor = linear_to_db(min);
            range = linear_to_db(max) - floor;
        }

        let (width, height) = self.patch_size(mode);
        let pixels = |size: f64, resolution: f64| {
            if size > 0.0 && resolution > 0.0 {
                (size / resolution).round() as u32
            } else {
                0
            }
        };
        let cell_area = achieved.azimuth_resolution * achieved.ground_range_resolution;

        let objects = self
            .chances
            .iter()
            .filter(|c| !c.missed && c.detections > 0 && c.signal_sum > 0.0)
            .filter_map(|c| {
                let platform = platforms.get(c.target)?;
                let pixel_count = if cell_area > 0.0 {
                    c.area_sum / f64::from(c.detections) / cell_area
                } else {
                    0.0
                };
                let level = linear_to_db(c.signal_sum / pixel_count.max(0.1));
                let pixel_intensity = if range > 0.0 {
                    ((level - floor) / range).clamp(0.0, 1.0)
                } else if level > floor {
                    1.0
                } else {
                    0.0
                };
                Some(SarImageObject {
                    target: c.target,
                    name: platform.name.clone(),
                    location_wcs: c.location_wcs,
                    pixel_count,
                    pixel_intensity,
                    signal_level: c.signal_sum,
                })
            })
            .collect();

        SarImage {
            sensor: source.sensor.to_string(),
            mode: source.mode.to_string(),
            operating_mode: self.collecting.unwrap_or_default(),
            stream: self.stream,
            frame: self.frame,
            start_time: self.start_time,
            end_time,
            azimuth_resolution: achieved.azimuth_resolution,
            ground_range_resolution: achieved.ground_range_resolution,
            center_wcs: self.start_geometry.map_or_else(Vec3::zeros, |g| g.center()),
            width,
            height,
            width_pixels: pixels(width, achieved.azimuth_resolution),
            height_pixels: pixels(height, achieved.ground_range_resolution),
            noise_level: noise,
            background_level: background,
            minimum_level: floor,
            maximum_level: floor + range,
            collection_factor: if achieved.azimuth_resolution > 0.0 {
                mode.current_azimuth_resolution / achieved.azimuth_resolution
            } else {
                0.0
            },
            objects,
        }
    }

    /// Ground extent of the patch from the image size or the field of view.
    fn patch_size(&self, mode: &SarMode) -> (f64, f64) {
        let Some(g) = self.start_geometry else {
            return (0.0, 0.0);
        };
        let fov = mode.image_fov.unwrap_or(FieldOfView {
            azimuth: mode.antenna.azimuth_field_of_view,
            elevation: mode.antenna.elevation_field_of_view,
        });
        let width = if mode.image_width > 0.0 {
            mode.image_width
        } else if fov.azimuth.1 - fov.azimuth.0 < PI {
            g.slant_range * (fov.azimuth.1 - fov.azimuth.0)
        } else {
            0.0
        };
        let (min_el, max_el) = fov.elevation;
        let height = if mode.image_height > 0.0 {
            mode.image_height
        } else if min_el < 0.0 && max_el > 0.0 && max_el < g.depression && g.grazing > 0.0 {
            g.slant_range * (max_el - min_el) / g.grazing.sin()
        } else {
            0.0
        };
        (width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use sensor_models::{Attitude, GeoPoint};

    const SAR_TEXT: &str = "frequency 10 GHz peak_power 10 kW bandwidth 150 MHz
                            beamwidth 2 deg antenna_tilt -30 deg resolution 1 m";

    fn sar_mode(extra: &str) -> SarMode {
        let mut mode = SarMode::default();
        let text = format!("{SAR_TEXT} {extra}");
        let mut input = InputReader::new(&text);
        while input.read_command().is_some() {
            assert!(mode.process_input(&mut input).unwrap(), "{}", input.command());
        }
        mode.initialize("sar", &ModeCommon::default()).unwrap();
        mode
    }

    /// Aircraft at 8 km flying north at 200 m/s.
    fn aircraft() -> Platform {
        let location = GeoPoint::from_degrees(0.0, 0.0, 8000.0).to_wcs();
        let mut host = Platform::new("jstars", location);
        host.index = TargetIndex(1);
        host.attitude = Attitude::heading(0.0);
        host.velocity_wcs = host.ned_frame().to_wcs(&Vec3::new(200.0, 0.0, 0.0)) - location;
        host
    }

    /// Looking right (east) of the flight path.
    fn mount(host: &Platform) -> LocalFrame {
        host.body_frame().rotated(FRAC_PI_2, 0.0)
    }

    fn geometry(mode: &SarMode, host: &Platform) -> SarGeometry {
        SarGeometry::compute(host, &mode.antenna_frame(&mount(host)), 0.0)
    }

    #[test]
    fn slant_range_over_curved_earth() {
        let (slant, graze, beyond) = slant_range_and_grazing(8000.0, 30f64.to_radians());
        assert!(!beyond);
        assert_abs_diff_eq!(slant, 16_000.0, epsilon = 100.0);
        assert_abs_diff_eq!(graze.to_degrees(), 30.0, epsilon = 0.2);

        assert_eq!(slant_range_and_grazing(8000.0, FRAC_PI_2), (8000.0, FRAC_PI_2, false));
        let (_, graze, beyond) = slant_range_and_grazing(8000.0, 0.5f64.to_radians());
        assert!(beyond);
        assert_eq!(graze, 0.0);
    }

    #[test]
    fn broadside_geometry() {
        let mode = sar_mode("");
        let host = aircraft();
        let g = geometry(&mode, &host);
        assert_abs_diff_eq!(g.depression.to_degrees(), 30.0, epsilon = 1e-6);
        assert_abs_diff_eq!(g.squint, FRAC_PI_2, epsilon = 1e-6);
        assert_abs_diff_eq!(g.ground_speed, 200.0, epsilon = 1e-6);
        let center_alt = GeoPoint::from_wcs(&g.center()).alt;
        assert_abs_diff_eq!(center_alt, 0.0, epsilon = 50.0);
    }

    #[test]
    fn dwell_and_resolution_are_reciprocal() {
        let mode = sar_mode("");
        let g = geometry(&mode, &aircraft());
        let dwell = mode.compute_dwell_time(&g, 1.0);
        let expected = mode.xmtr.wavelength() * g.slant_range
            / (2.0 * 200.0 * 1.0 * g.squint.sin() * g.grazing.cos());
        assert_relative_eq!(dwell, expected, max_relative = 1e-9);
        assert_relative_eq!(mode.compute_azimuth_resolution(&g, dwell), 1.0, max_relative = 1e-9);

        let mut stopped = g;
        stopped.ground_speed = 0.0;
        assert_eq!(mode.compute_dwell_time(&stopped, 1.0), 1000.0);
        assert_eq!(mode.compute_azimuth_resolution(&stopped, 2.0), 1000.0);
    }

    #[test]
    fn ground_range_resolution_caps_grazing() {
        let mode = sar_mode("");
        let mut g = geometry(&mode, &aircraft());
        let slant_res = 0.5 * SPEED_OF_LIGHT / 150.0e6;
        g.grazing = 30f64.to_radians();
        assert_relative_eq!(
            mode.compute_ground_range_resolution(&g),
            slant_res / g.grazing.cos(),
            max_relative = 1e-9
        );
        g.grazing = 60f64.to_radians();
        assert_relative_eq!(
            mode.compute_ground_range_resolution(&g),
            slant_res / FRAC_PI_4.cos(),
            max_relative = 1e-9
        );
        assert_relative_eq!(SarMode::compute_prf(16_000.0), 0.9 * SPEED_OF_LIGHT / 32_001.0);
    }

    #[test]
    fn nominal_collection_is_clean() {
        let mode = sar_mode("");
        let g = geometry(&mode, &aircraft());
        let (failures, perf) = mode.can_image_now(&g);
        assert!(failures.is_empty(), "{}", failures.describe());
        assert!(perf.clutter_to_noise > 1.0);
        assert!(perf.prf > perf.minimum_prf);
        assert_relative_eq!(perf.azimuth_resolution, 1.0);
    }

    #[test]
    fn substandard_conditions_are_flagged() {
        let host = aircraft();

        let mode = sar_mode("peak_power 1 W");
        let (failures, _) = mode.can_image_now(&geometry(&mode, &host));
        assert!(failures.contains(SarFailure::INSUFFICIENT_CLUTTER_TO_NOISE));

        let mode = sar_mode("pulse_repetition_frequency 100 Hz");
        let (failures, _) = mode.can_image_now(&geometry(&mode, &host));
        assert!(failures.contains(SarFailure::DOPPLER_FOLDOVER));

        let mode = sar_mode("pulse_repetition_frequency 20 kHz");
        let (failures, _) = mode.can_image_now(&geometry(&mode, &host));
        assert!(failures.contains(SarFailure::AMBIGUOUS_RANGE));

        let mode = sar_mode("maximum_dwell_time 0.5 s");
        let (failures, _) = mode.can_image_now(&geometry(&mode, &host));
        assert!(failures.contains(SarFailure::DWELL_TIME_LIMIT_EXCEEDED));

        let mode = sar_mode("");
        let mut g = geometry(&mode, &host);
        g.scan_angle = FRAC_PI_2;
        let (failures, _) = mode.can_image_now(&g);
        assert!(failures.contains(SarFailure::FIELD_OF_VIEW_EXCEEDED));
        assert_eq!(failures.describe().split('|').next(), Some("field_of_view_exceeded"));
    }

    #[test]
    fn needs_dwell_or_resolution() {
        let mut mode = SarMode::default();
        assert!(matches!(
            mode.initialize("sar", &ModeCommon::default()),
            Err(SensorError::MissingDwellOrResolution { .. })
        ));
        let mut input = InputReader::new("image_formation_time 3 s operating_mode stripmap");
        while input.read_command().is_some() {
            assert!(mode.process_input(&mut input).unwrap());
        }
        assert!(mode.initialize("sar", &ModeCommon::default()).is_ok());
        assert!(!mode.compute_dwell_time);
        assert!(mode.compute_prf);
        assert_eq!(mode.operating_mode, OperatingMode::Strip);
    }

    #[test]
    fn image_size_sets_patch() {
        let mode = sar_mode("image_width 2 km image_height 1 km");
        let g = geometry(&mode, &aircraft());
        let fov = mode.spot_field_of_view(&g, 1.0);
        assert_relative_eq!(fov.azimuth.1, (1000.0f64).atan2(g.slant_range));
        assert!(fov.elevation.0 < 0.0 && fov.elevation.1 > 0.0);
        // The far edge subtends less than the near edge
        assert!(fov.elevation.1 < -fov.elevation.0);
    }

    #[test]
    fn narrow_fov_is_widened() {
        let mode = sar_mode("azimuth_field_of_view -1 deg 1 deg elevation_field_of_view -1 deg 1 deg");
        let g = geometry(&mode, &aircraft());
        let fov = mode.spot_field_of_view(&g, 1.0);
        let margin = 1000.0 / g.slant_range;
        assert_relative_eq!(fov.azimuth.1, 1f64.to_radians() + margin, max_relative = 1e-9);
        assert!(fov.elevation.1 > 1f64.to_radians());
    }

    fn hit(snr: f64) -> DetectionResult {
        let mut r = DetectionResult::new(0.5);
        r.pd = 1.0;
        r.signal_to_noise = snr;
        r.optical_signature = 10.0;
        r
    }

    fn miss() -> DetectionResult {
        let mut r = DetectionResult::new(0.5);
        r.fail(FailureStatus::SIGNAL_LEVEL);
        r
    }

    fn ground_targets(catalog: &mut PlatformCatalog) -> (TargetIndex, TargetIndex) {
        let a = catalog.add(Platform::new("truck", GeoPoint::from_degrees(0.0, 0.12, 0.0).to_wcs()));
        let b = catalog.add(Platform::new("tank", GeoPoint::from_degrees(0.001, 0.12, 0.0).to_wcs()));
        (a, b)
    }

    #[test]
    fn single_missed_sample_excludes_chance() {
        let mut mode = sar_mode("");
        let mut catalog = PlatformCatalog::new();
        let host_index = catalog.add(aircraft());
        let (a, b) = ground_targets(&mut catalog);
        let host = catalog.get(host_index).unwrap().clone();

        let mut collector = SarCollector::new();
        collector
            .begin_spot(0.0, &mut mode, &host, &mount(&host), catalog.iter())
            .unwrap();
        assert_eq!(collector.chances().len(), 2);
        let dwell = mode.current_dwell_time;
        assert_relative_eq!(collector.expiry(), dwell);

        let mut samples = 0;
        collector.sample(dwell / 2.0, &mode, &catalog, |p| {
            samples += 1;
            if p.index == b { miss() } else { hit(100.0) }
        });
        assert_eq!(samples, 2);
        assert!(collector.dwell_complete(dwell));

        let source = ImageSource { sensor: "sar", mode: "spot" };
        let image = collector.end_spot(dwell, source, &mode, &catalog, |_| hit(100.0));
        assert_eq!(image.stream, 1);
        assert_eq!(image.objects.len(), 1);
        assert_eq!(image.objects[0].target, a);
        assert!(image.objects[0].pixel_count > 0.0);
        assert!((0.0..=1.0).contains(&image.objects[0].pixel_intensity));
        assert!(!collector.is_collecting());
        assert!(collector.chances().is_empty());
    }

    #[test]
    fn platform_removed_mid_dwell() {
        let mut mode = sar_mode("");
        let mut catalog = PlatformCatalog::new();
        let host_index = catalog.add(aircraft());
        let (a, b) = ground_targets(&mut catalog);
        let host = catalog.get(host_index).unwrap().clone();

        let mut collector = SarCollector::new();
        collector
            .begin_spot(0.0, &mut mode, &host, &mount(&host), catalog.iter())
            .unwrap();
        catalog.remove(b);
        let source = ImageSource { sensor: "sar", mode: "spot" };
        let image = collector.end_spot(10.0, source, &mode, &catalog, |_| hit(50.0));
        assert_eq!(image.objects.len(), 1);
        assert_eq!(image.objects[0].target, a);
    }

    #[test]
    fn inhibited_collection_does_not_start() {
        let mut mode = sar_mode("maximum_dwell_time 0.5 s inhibit_substandard_collection");
        let host = aircraft();
        let mut collector = SarCollector::new();
        let err = collector
            .begin_spot(0.0, &mut mode, &host, &mount(&host), std::iter::empty())
            .unwrap_err();
        assert!(err.contains(SarFailure::DWELL_TIME_LIMIT_EXCEEDED));
        assert!(!collector.is_collecting());

        // Without inhibit the dwell is clipped and the resolution degrades
        mode.inhibit_substandard_collection = false;
        collector
            .begin_spot(0.0, &mut mode, &host, &mount(&host), std::iter::empty())
            .unwrap();
        assert_relative_eq!(mode.current_dwell_time, 0.5);
        assert!(mode.current_azimuth_resolution > 1.0);
    }

    #[test]
    fn full_dwell_keeps_planned_resolution() {
        let mut mode = sar_mode("maximum_dwell_time 0.5 s rescale_substandard_image");
        let host = aircraft();
        let catalog = PlatformCatalog::new();
        let mut collector = SarCollector::new();
        collector
            .begin_spot(0.0, &mut mode, &host, &mount(&host), std::iter::empty())
            .unwrap();
        let source = ImageSource { sensor: "sar", mode: "spot" };
        let image = collector.end_spot(0.5, source, &mode, &catalog, |_| miss());
        assert_relative_eq!(image.azimuth_resolution, mode.current_azimuth_resolution, max_relative = 1e-9);
        assert_relative_eq!(
            image.ground_range_resolution,
            mode.current_ground_range_resolution,
            max_relative = 1e-9
        );
    }

    #[test]
    fn early_stop_rescales_ground_range() {
        let host = aircraft();
        let catalog = PlatformCatalog::new();
        let source = ImageSource { sensor: "sar", mode: "spot" };
        let close_early = |extra: &str| {
            let mut mode = sar_mode(extra);
            let mut collector = SarCollector::new();
            collector
                .begin_spot(0.0, &mut mode, &host, &mount(&host), std::iter::empty())
                .unwrap();
            let half = mode.current_dwell_time / 2.0;
            let image = collector.end_spot(half, source, &mode, &catalog, |_| miss());
            (mode, image)
        };

        let (mode, image) = close_early("rescale_substandard_image");
        assert!(image.azimuth_resolution > mode.current_azimuth_resolution);
        assert_relative_eq!(
            image.ground_range_resolution,
            mode.current_ground_range_resolution * image.azimuth_resolution
                / mode.current_azimuth_resolution,
            max_relative = 1e-9
        );

        let (mode, image) = close_early("");
        assert_relative_eq!(
            image.ground_range_resolution,
            mode.current_ground_range_resolution,
            max_relative = 1e-9
        );
    }

    #[test]
    fn stream_and_frame_numbering() {
        let mut spot = sar_mode("");
        let mut strip = sar_mode("operating_mode strip");
        let catalog = PlatformCatalog::new();
        let host = aircraft();
        let m = mount(&host);
        let source = ImageSource { sensor: "sar", mode: "strip" };
        let mut collector = SarCollector::new();

        collector.begin_spot(0.0, &mut spot, &host, &m, std::iter::empty()).unwrap();
        collector.abort();
        collector.begin_spot(1.0, &mut spot, &host, &m, std::iter::empty()).unwrap();
        collector.abort();
        assert_eq!(collector.stream(), 2);

        collector.begin_strip(2.0, &mut strip, &host, &m);
        assert_eq!(collector.stream(), 3);
        let first = collector.strip_frame(3.0, source, &strip, &host, &m, &catalog, catalog.iter(), |_| miss());
        let second = collector.strip_frame(4.0, source, &strip, &host, &m, &catalog, catalog.iter(), |_| miss());
        assert_eq!((first.frame, second.frame), (1, 2));
        assert_eq!(second.operating_mode, OperatingMode::Strip);
        collector.end_strip();

        // Strip following strip continues the stream
        collector.begin_strip(5.0, &mut strip, &host, &m);
        assert_eq!(collector.stream(), 3);
    }

    #[test]
    fn fast_or_hidden_targets_are_not_imaged() {
        let mode = sar_mode("");
        let host = aircraft();
        let frame = mode.antenna_frame(&mount(&host));
        let env = DetectEnv { sim_time: 0.0, host: &host };

        let mut mover = Platform::new("mover", GeoPoint::from_degrees(0.0, 0.12, 0.0).to_wcs());
        mover.velocity_wcs = Vec3::new(0.0, 0.0, 10.0);
        let mut result = DetectionResult::new(0.5);
        result.rcvr_to_tgt = frame.aspect(&mover.location_wcs);
        mode.attempt_to_detect(&env, &mover, &mut result);
        assert!(result.failed.contains(FailureStatus::VELOCITY_LIMITS));

        let mut hidden = mover.clone();
        hidden.velocity_wcs = Vec3::zeros();
        hidden.concealment = 1.0;
        let mut result = DetectionResult::new(0.5);
        result.rcvr_to_tgt = frame.aspect(&hidden.location_wcs);
        mode.attempt_to_detect(&env, &hidden, &mut result);
        assert!(result.failed.contains(FailureStatus::TARGET_CONCEALED));
    }
}
