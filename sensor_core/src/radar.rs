//! Monostatic pulse radar.
//!
//! # Detection Policy
//! 1. Antenna limits (range, target altitude, field of view).
//! 2. Line of sight over a 4/3 Earth.
//! 3. Radar equation with the beam steered to the target, clamped to the
//!    scan limits, so targets off the steered beam lose gain.
//! 4. Integrated SNR to Pd through the configured detector.

use crate::context::Platform;
use crate::error::Result;
use crate::mode::{DetectEnv, ModeCapability, ModeCommon};
use sensor_models::geometry::{within_horizon, FOUR_THIRDS_EARTH};
use sensor_models::radar::{received_power, signal_to_noise};
use sensor_models::{
    Antenna, BeamPattern, DetectionResult, Detector, FailureStatus, InputReader, InputResult,
    RadarErrorInputs, Receiver, ReportingFlags, Transmitter, ValueType,
};
use tracing::warn;

#[derive(Clone, Debug, PartialEq)]
pub struct RadarMode {
    pub antenna: Antenna,
    pub beam: BeamPattern,
    pub xmtr: Transmitter,
    pub rcvr: Receiver,
    pub detector: Detector,
    pub pulses_integrated: u32,
    /// Integration gain (linear); `None` integrates the pulses coherently
    pub integration_gain: Option<f64>,
    /// General post-reception adjustment (linear)
    pub adjustment_factor: f64,
}

impl Default for RadarMode {
    fn default() -> Self {
        Self {
            antenna: Antenna::default(),
            beam: BeamPattern::default(),
            xmtr: Transmitter::default(),
            rcvr: Receiver::default(),
            detector: Detector::default(),
            pulses_integrated: 1,
            integration_gain: None,
            adjustment_factor: 1.0,
        }
    }
}

impl RadarMode {
    pub fn integration_gain(&self) -> f64 {
        self.integration_gain
            .unwrap_or(f64::from(self.pulses_integrated.max(1)))
    }

    /// Single-pulse SNR scaled by integration and adjustment.
    pub fn integrated_snr(&self, single_pulse_snr: f64) -> f64 {
        single_pulse_snr * self.integration_gain() * self.adjustment_factor
    }
}

impl ModeCapability for RadarMode {
    fn capabilities(&self) -> ReportingFlags {
        ReportingFlags::all()
    }

    fn default_reporting(&self) -> ReportingFlags {
        ReportingFlags::LOCATION
            | ReportingFlags::RANGE
            | ReportingFlags::BEARING
            | ReportingFlags::ELEVATION
    }

    fn is_radar(&self) -> bool {
        true
    }

    fn antenna(&self) -> &Antenna {
        &self.antenna
    }

    fn process_input(&mut self, input: &mut InputReader) -> InputResult<bool> {
        match input.command() {
            "number_of_pulses_integrated" => {
                self.pulses_integrated = input.read_value()?;
                input.value_greater(self.pulses_integrated, 0)?;
            }
            "integration_gain" => {
                let gain = input.read_value_of_type(ValueType::Ratio)?;
                input.value_greater_or_equal(gain, 1.0)?;
                self.integration_gain = Some(gain);
            }
            "adjustment_factor" => {
                self.adjustment_factor = input.read_value_of_type(ValueType::Ratio)?;
                input.value_greater(self.adjustment_factor, 0.0)?;
            }
            _ => {
                return Ok(self.antenna.process_input(input)?
                    || self.beam.process_input(input)?
                    || self.xmtr.process_input(input)?
                    || self.rcvr.process_input(input)?
                    || self.detector.process_input(input)?);
            }
        }
        Ok(true)
    }

    fn initialize(&mut self, sensor: &str, common: &ModeCommon) -> Result<()> {
        if self.rcvr.noise_power(&self.xmtr) <= 0.0 {
            warn!(
                sensor,
                mode = %common.name,
                "receiver has no bandwidth or pulse width; radar will never detect"
            );
        }
        Ok(())
    }

    fn attempt_to_detect(&self, env: &DetectEnv<'_>, target: &Platform, result: &mut DetectionResult) {
        if !self.antenna.check_geometry(target.altitude(), result) {
            return;
        }
        let aspect = result.rcvr_to_tgt;
        let visible = within_horizon(env.host.altitude(), target.altitude(), aspect.range, FOUR_THIRDS_EARTH);
        if !result.check(FailureStatus::RCVR_HORIZON_MASKING, !visible) {
            return;
        }

        let (beam_az, beam_el) = self.antenna.beam_pointing(&aspect);
        let gain = self
            .beam
            .gain(aspect.azimuth - beam_az, aspect.elevation - beam_el);
        let signal = received_power(
            &self.xmtr,
            &self.rcvr,
            gain,
            gain,
            target.radar_cross_section,
            aspect.range,
        );
        let snr = signal_to_noise(signal, self.rcvr.noise_power(&self.xmtr));
        result.signal_to_noise = self.integrated_snr(snr);
        result.pd = self
            .detector
            .probability_of_detection(result.signal_to_noise, self.rcvr.detection_threshold);
        result.check(
            FailureStatus::SIGNAL_LEVEL,
            result.pd <= 0.0 || result.pd < result.required_pd,
        );
        result.measurement.frequency = Some(self.xmtr.frequency);
    }

    fn radar_error_inputs(&self) -> Option<RadarErrorInputs> {
        Some(RadarErrorInputs {
            azimuth_beamwidth: self.beam.azimuth_beamwidth,
            elevation_beamwidth: self.beam.elevation_beamwidth,
            pulse_width: self.xmtr.compressed_pulse_width(self.rcvr.bandwidth),
            doppler_resolution: self.rcvr.doppler_resolution,
            pulses_integrated: f64::from(self.pulses_integrated.max(1)),
        })
    }
}
