//! Probability of detection from signal-to-noise.

use crate::input::{InputReader, InputResult};
use serde::{Deserialize, Serialize};

/// Target fluctuation statistics used to turn SNR into Pd.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectorKind {
    /// Pd is 1 at or above the detection threshold, otherwise 0.
    #[default]
    Threshold,
    /// Non-fluctuating target, North's approximation.
    Swerling0,
    /// Slow Rayleigh fluctuation, single look.
    Swerling1,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detector {
    pub kind: DetectorKind,
    pub probability_of_false_alarm: f64,
}

impl Default for Detector {
    fn default() -> Self {
        Self {
            kind: DetectorKind::Threshold,
            probability_of_false_alarm: 1.0e-6,
        }
    }
}

impl Detector {
    /// Pd for a linear SNR. `threshold` is only used by the threshold detector.
    pub fn probability_of_detection(&self, snr: f64, threshold: f64) -> f64 {
        if snr.is_nan() || snr <= 0.0 {
            return 0.0;
        }
        let pfa = self.probability_of_false_alarm;
        let pd = match self.kind {
            DetectorKind::Threshold => {
                if snr >= threshold {
                    1.0
                } else {
                    0.0
                }
            }
            DetectorKind::Swerling0 => {
                0.5 * erfc((-pfa.ln()).sqrt() - (snr + 0.5).sqrt())
            }
            DetectorKind::Swerling1 => pfa.powf(1.0 / (1.0 + snr)),
        };
        pd.clamp(0.0, 1.0)
    }

    pub fn process_input(&mut self, input: &mut InputReader) -> InputResult<bool> {
        match input.command() {
            "detector" => {
                let name = input.read_string()?;
                self.kind = match name.as_str() {
                    "threshold" => DetectorKind::Threshold,
                    "swerling_0" | "marcum" => DetectorKind::Swerling0,
                    "swerling_1" => DetectorKind::Swerling1,
                    _ => return Err(input.bad_value(&name)),
                };
            }
            "swerling_case" => {
                let case: u8 = input.read_value()?;
                self.kind = match case {
                    0 => DetectorKind::Swerling0,
                    1 => DetectorKind::Swerling1,
                    _ => return Err(input.bad_value(&case.to_string())),
                };
            }
            "probability_of_false_alarm" => {
                self.probability_of_false_alarm = input.read_value()?;
                input.value_greater(self.probability_of_false_alarm, 0.0)?;
                input.value_less(self.probability_of_false_alarm, 1.0)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Complementary error function (Abramowitz & Stegun 7.1.26).
pub fn erfc(x: f64) -> f64 {
    let t = 1.0 / (1.0 + 0.327_591_1 * x.abs());
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    let result = poly * (-x * x).exp();
    if x >= 0.0 {
        result
    } else {
        2.0 - result
    }
}
