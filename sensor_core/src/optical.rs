//! Passive electro-optical / infrared sensor.
//!
//! The target's radiant intensity contrast (W/sr) is attenuated by the
//! atmosphere and spread over the range squared. The resulting irradiance
//! at the aperture is compared with the noise-equivalent irradiance.
//! Passive sensors measure angles only.

use crate::context::Platform;
use crate::error::{Result, SensorError};
use crate::mode::{DetectEnv, ModeCapability, ModeCommon};
use sensor_models::geometry::within_horizon;
use sensor_models::input::db_to_linear;
use sensor_models::radar::signal_to_noise;
use sensor_models::{
    Antenna, DetectionResult, Detector, FailureStatus, InputReader, InputResult, ReportingFlags,
    ValueType,
};

#[derive(Clone, Debug, PartialEq)]
pub struct OpticalMode {
    pub antenna: Antenna,
    /// Noise-equivalent irradiance (W/m²)
    pub noise_equivalent_irradiance: f64,
    /// Required SNR (linear)
    pub detection_threshold: f64,
    /// Extinction coefficient (1/m)
    pub atmospheric_attenuation: f64,
    pub detector: Detector,
}

impl Default for OpticalMode {
    fn default() -> Self {
        Self {
            antenna: Antenna::default(),
            noise_equivalent_irradiance: 1.0e-10,
            detection_threshold: db_to_linear(10.0),
            atmospheric_attenuation: 0.0,
            detector: Detector::default(),
        }
    }
}

impl OpticalMode {
    /// Irradiance (W/m²) at the aperture from `intensity` at `range`.
    pub fn irradiance(&self, intensity: f64, range: f64) -> f64 {
        if range <= 0.0 {
            return 0.0;
        }
        intensity * (-self.atmospheric_attenuation * range).exp() / (range * range)
    }
}

impl ModeCapability for OpticalMode {
    fn capabilities(&self) -> ReportingFlags {
        ReportingFlags::all()
            - (ReportingFlags::RANGE
                | ReportingFlags::RANGE_RATE
                | ReportingFlags::VELOCITY
                | ReportingFlags::FREQUENCY
                | ReportingFlags::PULSEWIDTH
                | ReportingFlags::PRI)
    }

    fn default_reporting(&self) -> ReportingFlags {
        ReportingFlags::BEARING | ReportingFlags::ELEVATION
    }

    fn antenna(&self) -> &Antenna {
        &self.antenna
    }

    fn process_input(&mut self, input: &mut InputReader) -> InputResult<bool> {
        match input.command() {
            "noise_equivalent_irradiance" => {
                self.noise_equivalent_irradiance = input.read_value()?;
                input.value_greater(self.noise_equivalent_irradiance, 0.0)?;
            }
            "detection_threshold" => {
                self.detection_threshold = input.read_value_of_type(ValueType::Ratio)?;
                input.value_greater(self.detection_threshold, 0.0)?;
            }
            "atmospheric_attenuation" => {
                // Given per kilometer
                let per_km: f64 = input.read_value()?;
                input.value_greater_or_equal(per_km, 0.0)?;
                self.atmospheric_attenuation = per_km / 1000.0;
            }
            _ => {
                return Ok(self.antenna.process_input(input)? || self.detector.process_input(input)?);
            }
        }
        Ok(true)
    }

    fn initialize(&mut self, sensor: &str, common: &ModeCommon) -> Result<()> {
        if self.detection_threshold <= 0.0 {
            return Err(SensorError::InvalidMode {
                sensor: sensor.to_string(),
                mode: common.name.clone(),
                message: "detection_threshold must be positive".into(),
            });
        }
        Ok(())
    }

    fn attempt_to_detect(&self, env: &DetectEnv<'_>, target: &Platform, result: &mut DetectionResult) {
        if !self.antenna.check_geometry(target.altitude(), result) {
            return;
        }
        let range = result.rcvr_to_tgt.range;
        let visible = within_horizon(env.host.altitude(), target.altitude(), range, 1.0);
        if !result.check(FailureStatus::RCVR_HORIZON_MASKING, !visible) {
            return;
        }

        let irradiance = self.irradiance(target.infrared_intensity, range);
        result.signal_to_noise = signal_to_noise(irradiance, self.noise_equivalent_irradiance);
        result.pd = self
            .detector
            .probability_of_detection(result.signal_to_noise, self.detection_threshold);
        result.check(
            FailureStatus::SIGNAL_LEVEL,
            result.pd <= 0.0 || result.pd < result.required_pd,
        );
    }
}
