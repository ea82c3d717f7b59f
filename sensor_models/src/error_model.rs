//! Measurement error models.
//!
//! # Error model policy
//! 1. A model produces spherical standard deviations (azimuth, elevation,
//!    range, range rate) for a detection.
//! 2. [`apply_measurement_errors`] draws zero-mean Gaussian errors from
//!    those sigmas and perturbs the true antenna-frame aspect.
//! 3. The reported location is rebuilt from the perturbed range/az/el
//!    through the antenna frame, so angular errors grow with range the way
//!    a real sensor's do.
//!
//! The standard model holds fixed sigmas. A negative range sigma is read as
//! a percentage of the true range. The radar model can instead derive the
//! sigmas from beamwidth, pulse width, doppler resolution and SNR.

use crate::geometry::{Spherical, SPEED_OF_LIGHT};
use crate::input::{InputReader, InputResult, ValueType};
use crate::reporting::ReportingFlags;
use crate::result::{DetectionResult, SphericalErrors};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorModelError {
    #[error("error model '{model}' cannot be used with a {sensor_type} sensor")]
    IncompatibleSensor { model: String, sensor_type: String },
}

/// Physical quantities the radar model derives sigmas from.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RadarErrorInputs {
    /// Half-power azimuth beamwidth (radians)
    pub azimuth_beamwidth: f64,
    /// Half-power elevation beamwidth (radians)
    pub elevation_beamwidth: f64,
    /// Compressed pulse width (s); 0 when unknown
    pub pulse_width: f64,
    /// Doppler resolution (m/s)
    pub doppler_resolution: f64,
    /// Number of pulses integrated
    pub pulses_integrated: f64,
}

// ---------------------------------------------------------------------------
// Standard model
// ---------------------------------------------------------------------------

/// Fixed sigma table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardErrorModel {
    /// Azimuth sigma (radians)
    pub azimuth: f64,
    /// Elevation sigma (radians)
    pub elevation: f64,
    /// Range sigma (meters), or percent of true range when negative
    pub range: f64,
    /// Range-rate sigma (m/s)
    pub range_rate: f64,
}

impl StandardErrorModel {
    /// Sigmas resolved against the true range of this detection.
    pub fn sigmas(&self, true_range: f64) -> SphericalErrors {
        let range = if self.range < 0.0 {
            -self.range * 0.01 * true_range
        } else {
            self.range
        };
        SphericalErrors {
            azimuth: self.azimuth,
            elevation: self.elevation,
            range,
            range_rate: self.range_rate,
        }
    }

    pub fn process_input(&mut self, input: &mut InputReader) -> InputResult<bool> {
        match input.command() {
            "azimuth_error_sigma" => {
                self.azimuth = input.read_value_of_type(ValueType::Angle)?;
                input.value_greater_or_equal(self.azimuth, 0.0)?;
            }
            "elevation_error_sigma" => {
                self.elevation = input.read_value_of_type(ValueType::Angle)?;
                input.value_greater_or_equal(self.elevation, 0.0)?;
            }
            "range_error_sigma" => {
                let negative = input
                    .peek()
                    .and_then(|t| t.parse::<f64>().ok())
                    .is_some_and(|v| v < 0.0);
                let percent = input
                    .peek_nth(1)
                    .is_some_and(|u| matches!(u.to_ascii_lowercase().as_str(), "percent" | "%"));
                let sigma = input.read_value_of_type(ValueType::LengthOrPercent)?;
                if !percent {
                    input.value_greater_or_equal(sigma, 0.0)?;
                } else if negative {
                    warn!(sigma, "negative range_error_sigma is read as percent of true range");
                }
                self.range = sigma;
            }
            "range_rate_error_sigma" => {
                self.range_rate = input.read_value_of_type(ValueType::Speed)?;
                input.value_greater_or_equal(self.range_rate, 0.0)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Radar model
// ---------------------------------------------------------------------------

/// Standard sigmas plus optional physics-derived sigmas.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RadarErrorModel {
    pub standard: StandardErrorModel,
    pub compute_measurement_errors: bool,
}

impl RadarErrorModel {
    /// Sigmas derived from the radar's resolution and the detection SNR.
    ///
    /// All four are recorded on the measurement; only those the mode
    /// reports are returned for sampling. Zero or non-finite SNR yields
    /// zero sigmas.
    pub fn radar_spherical_error_std_dev(
        &self,
        result: &mut DetectionResult,
        reporting: ReportingFlags,
        radar: &RadarErrorInputs,
    ) -> SphericalErrors {
        let snr = result.signal_to_noise;
        let pulses = radar.pulses_integrated.max(1.0);
        if !snr.is_finite() || snr <= 0.0 {
            result.measurement.sigmas = SphericalErrors::default();
            return SphericalErrors::default();
        }
        let k = (2.0 * pulses * snr).sqrt();
        let computed = SphericalErrors {
            azimuth: radar.azimuth_beamwidth / k,
            elevation: radar.elevation_beamwidth / k,
            range: if radar.pulse_width > 0.0 {
                radar.pulse_width * SPEED_OF_LIGHT / (2.0 * k)
            } else {
                0.0
            },
            range_rate: radar.doppler_resolution / k,
        };
        result.measurement.sigmas = computed;

        let locates = reporting.reports_location();
        SphericalErrors {
            azimuth: gate(computed.azimuth, locates || reporting.reports_bearing()),
            elevation: gate(computed.elevation, locates || reporting.reports_elevation()),
            range: gate(computed.range, locates || reporting.reports_range()),
            range_rate: gate(computed.range_rate, reporting.reports_range_rate()),
        }
    }
}

fn gate(sigma: f64, reported: bool) -> f64 {
    if reported {
        sigma
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Model selection
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ErrorModelKind {
    Standard(StandardErrorModel),
    Radar(RadarErrorModel),
}

/// The error model owned by a sensor mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorModel {
    pub kind: ErrorModelKind,
    /// Report the true geometry with no errors at all
    pub override_measurement_with_truth: bool,
}

impl Default for ErrorModel {
    fn default() -> Self {
        Self {
            kind: ErrorModelKind::Standard(StandardErrorModel::default()),
            override_measurement_with_truth: false,
        }
    }
}

impl ErrorModel {
    pub fn name(&self) -> &'static str {
        match self.kind {
            ErrorModelKind::Standard(_) => "standard",
            ErrorModelKind::Radar(_) => "radar",
        }
    }

    pub fn standard(&self) -> &StandardErrorModel {
        match &self.kind {
            ErrorModelKind::Standard(s) => s,
            ErrorModelKind::Radar(r) => &r.standard,
        }
    }

    fn standard_mut(&mut self) -> &mut StandardErrorModel {
        match &mut self.kind {
            ErrorModelKind::Standard(s) => s,
            ErrorModelKind::Radar(r) => &mut r.standard,
        }
    }

    /// Check the model against the family of the owning sensor.
    pub fn initialize(&self, sensor_type: &str, is_radar: bool) -> Result<(), ErrorModelError> {
        if matches!(self.kind, ErrorModelKind::Radar(_)) && !is_radar {
            return Err(ErrorModelError::IncompatibleSensor {
                model: self.name().to_string(),
                sensor_type: sensor_type.to_string(),
            });
        }
        Ok(())
    }

    /// Sigmas for this detection. `radar` is `None` for non-radar sensors.
    pub fn spherical_error_std_dev(
        &self,
        result: &mut DetectionResult,
        reporting: ReportingFlags,
        radar: Option<&RadarErrorInputs>,
    ) -> SphericalErrors {
        if self.override_measurement_with_truth {
            result.measurement.sigmas = SphericalErrors::default();
            return SphericalErrors::default();
        }
        match (&self.kind, radar) {
            (ErrorModelKind::Radar(model), Some(inputs)) if model.compute_measurement_errors => {
                model.radar_spherical_error_std_dev(result, reporting, inputs)
            }
            _ => {
                let sigmas = self.standard().sigmas(result.rcvr_to_tgt.range);
                result.measurement.sigmas = sigmas;
                sigmas
            }
        }
    }

    /// `error_model`, sigma and truth-override keywords.
    pub fn process_input(&mut self, input: &mut InputReader) -> InputResult<bool> {
        match input.command() {
            "error_model" => {
                let name = input.read_string()?;
                let standard = self.standard().clone();
                self.kind = match name.as_str() {
                    "standard" => ErrorModelKind::Standard(standard),
                    "radar" => ErrorModelKind::Radar(RadarErrorModel {
                        standard,
                        ..Default::default()
                    }),
                    _ => return Err(input.bad_value(&name)),
                };
                Ok(true)
            }
            "override_measurement_with_truth" => {
                self.override_measurement_with_truth = input.read_bool()?;
                Ok(true)
            }
            "compute_measurement_errors" => match &mut self.kind {
                ErrorModelKind::Radar(model) => {
                    model.compute_measurement_errors = input.read_bool()?;
                    Ok(true)
                }
                ErrorModelKind::Standard(_) => Ok(false),
            },
            _ => self.standard_mut().process_input(input),
        }
    }
}

// ---------------------------------------------------------------------------
// Applying errors
// ---------------------------------------------------------------------------

/// Draw one zero-mean Gaussian sample; zero sigma yields exactly zero.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, sigma: f64) -> f64 {
    if sigma > 0.0 && sigma.is_finite() {
        Normal::new(0.0, sigma).map(|n| n.sample(rng)).unwrap_or(0.0)
    } else {
        0.0
    }
}

/// Perturb the true measurement of `result` with errors drawn from `sigmas`.
///
/// With all sigmas zero the measurement is exactly the true geometry.
pub fn apply_measurement_errors<R: Rng + ?Sized>(
    result: &mut DetectionResult,
    sigmas: &SphericalErrors,
    rng: &mut R,
) -> SphericalErrors {
    let errors = SphericalErrors {
        azimuth: gaussian(rng, sigmas.azimuth),
        elevation: gaussian(rng, sigmas.elevation),
        range: gaussian(rng, sigmas.range),
        range_rate: gaussian(rng, sigmas.range_rate),
    };
    result.set_true_measurement();
    result.measurement.errors = errors;
    if errors.is_zero() {
        return errors;
    }

    let truth = result.rcvr_to_tgt;
    let perturbed = Spherical {
        range: (truth.range + errors.range).max(0.0),
        azimuth: truth.azimuth + errors.azimuth,
        elevation: truth.elevation + errors.elevation,
    };
    let m = &mut result.measurement;
    m.range = Some(perturbed.range);
    m.azimuth = Some(perturbed.azimuth);
    m.elevation = Some(perturbed.elevation);
    m.range_rate = Some(result.range_rate + errors.range_rate);
    if let Some(frame) = &result.antenna_frame {
        m.location_wcs = Some(frame.location_wcs(&perturbed));
    }
    errors
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
