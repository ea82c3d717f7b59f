//! Radar transmitter, receiver and beam parameters plus the radar equation.

use crate::geometry::{BOLTZMANN, SPEED_OF_LIGHT, STANDARD_TEMPERATURE};
use crate::input::{db_to_linear, InputReader, InputResult, ValueType};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Transmitter configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transmitter {
    /// Carrier frequency (Hz)
    pub frequency: f64,
    /// Peak transmitted power (W)
    pub peak_power: f64,
    /// Uncompressed pulse width (s); 0 when not set
    pub pulse_width: f64,
    pub pulse_compression_ratio: f64,
    /// Pulse repetition frequency (Hz); 0 when not set
    pub pulse_repetition_frequency: f64,
    /// Internal loss (linear, >= 1)
    pub internal_loss: f64,
}

impl Default for Transmitter {
    fn default() -> Self {
        Self {
            frequency: 3.0e9,  // S band
            peak_power: 1.0e6, // 1 MW
            pulse_width: 0.0,
            pulse_compression_ratio: 1.0,
            pulse_repetition_frequency: 0.0,
            internal_loss: 1.0,
        }
    }
}

impl Transmitter {
    pub fn wavelength(&self) -> f64 {
        if self.frequency > 0.0 {
            SPEED_OF_LIGHT / self.frequency
        } else {
            0.0
        }
    }

    /// Effective (compressed) pulse width. An unset pulse width falls back to
    /// the matched-filter width `1 / bandwidth`. Returns 0 if neither is known.
    pub fn compressed_pulse_width(&self, bandwidth: f64) -> f64 {
        let width = if self.pulse_width > 0.0 {
            self.pulse_width
        } else if bandwidth > 0.0 {
            1.0 / bandwidth
        } else {
            return 0.0;
        };
        width / self.pulse_compression_ratio.max(1.0)
    }

    pub fn process_input(&mut self, input: &mut InputReader) -> InputResult<bool> {
        match input.command() {
            "frequency" => {
                self.frequency = input.read_value_of_type(ValueType::Frequency)?;
                input.value_greater(self.frequency, 0.0)?;
            }
            "wavelength" => {
                let wavelength = input.read_value_of_type(ValueType::Length)?;
                input.value_greater(wavelength, 0.0)?;
                self.frequency = SPEED_OF_LIGHT / wavelength;
            }
            "peak_power" | "power" => {
                self.peak_power = input.read_value_of_type(ValueType::Power)?;
                input.value_greater(self.peak_power, 0.0)?;
            }
            "pulse_width" => {
                self.pulse_width = input.read_value_of_type(ValueType::Time)?;
                input.value_greater(self.pulse_width, 0.0)?;
            }
            "pulse_compression_ratio" => {
                self.pulse_compression_ratio = input.read_value_of_type(ValueType::Ratio)?;
                input.value_greater_or_equal(self.pulse_compression_ratio, 1.0)?;
            }
            "pulse_repetition_frequency" => {
                self.pulse_repetition_frequency = input.read_value_of_type(ValueType::Frequency)?;
                input.value_greater(self.pulse_repetition_frequency, 0.0)?;
            }
            "transmitter_loss" => {
                self.internal_loss = input.read_value_of_type(ValueType::Ratio)?;
                input.value_greater_or_equal(self.internal_loss, 1.0)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Receiver configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    /// Noise bandwidth (Hz); 0 means derive from the pulse width
    pub bandwidth: f64,
    /// Noise figure (linear)
    pub noise_figure: f64,
    /// Single-look SNR threshold (linear)
    pub detection_threshold: f64,
    /// Doppler (range-rate) resolution (m/s)
    pub doppler_resolution: f64,
    /// Internal loss (linear, >= 1)
    pub internal_loss: f64,
}

impl Default for Receiver {
    fn default() -> Self {
        Self {
            bandwidth: 0.0,
            noise_figure: 1.0,
            detection_threshold: db_to_linear(13.0), // ~20
            doppler_resolution: 0.0,
            internal_loss: 1.0,
        }
    }
}

impl Receiver {
    /// Noise bandwidth, falling back to `1 / pulse_width`.
    pub fn noise_bandwidth(&self, xmtr: &Transmitter) -> f64 {
        if self.bandwidth > 0.0 {
            self.bandwidth
        } else if xmtr.pulse_width > 0.0 {
            xmtr.pulse_compression_ratio.max(1.0) / xmtr.pulse_width
        } else {
            0.0
        }
    }

    /// Thermal noise power kT₀BF (W). Zero when no bandwidth can be derived.
    pub fn noise_power(&self, xmtr: &Transmitter) -> f64 {
        BOLTZMANN * STANDARD_TEMPERATURE * self.noise_bandwidth(xmtr) * self.noise_figure
    }

    pub fn process_input(&mut self, input: &mut InputReader) -> InputResult<bool> {
        match input.command() {
            "bandwidth" => {
                self.bandwidth = input.read_value_of_type(ValueType::Frequency)?;
                input.value_greater(self.bandwidth, 0.0)?;
            }
            "noise_figure" => {
                self.noise_figure = input.read_value_of_type(ValueType::Ratio)?;
                input.value_greater_or_equal(self.noise_figure, 1.0)?;
            }
            "detection_threshold" => {
                self.detection_threshold = input.read_value_of_type(ValueType::Ratio)?;
                input.value_greater(self.detection_threshold, 0.0)?;
            }
            "doppler_resolution" => {
                self.doppler_resolution = input.read_value_of_type(ValueType::Speed)?;
                input.value_greater_or_equal(self.doppler_resolution, 0.0)?;
            }
            "receiver_loss" => {
                self.internal_loss = input.read_value_of_type(ValueType::Ratio)?;
                input.value_greater_or_equal(self.internal_loss, 1.0)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Main-lobe pattern of a uniformly illuminated rectangular aperture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeamPattern {
    /// Half-power azimuth beamwidth (radians)
    pub azimuth_beamwidth: f64,
    /// Half-power elevation beamwidth (radians)
    pub elevation_beamwidth: f64,
    /// Peak gain (linear); 0 derives it from the beamwidths
    pub peak_gain: f64,
    /// Gain floor relative to peak (linear)
    pub sidelobe_level: f64,
}

impl Default for BeamPattern {
    fn default() -> Self {
        Self {
            azimuth_beamwidth: 2f64.to_radians(),
            elevation_beamwidth: 2f64.to_radians(),
            peak_gain: 0.0,
            sidelobe_level: 1.0e-3, // -30 dB
        }
    }
}

/// sinc(x)² reaches one half at this argument.
const HALF_POWER_ARG: f64 = 1.391_557_4;

impl BeamPattern {
    pub fn peak_gain(&self) -> f64 {
        if self.peak_gain > 0.0 {
            self.peak_gain
        } else if self.azimuth_beamwidth > 0.0 && self.elevation_beamwidth > 0.0 {
            4.0 * PI / (self.azimuth_beamwidth * self.elevation_beamwidth)
        } else {
            1.0
        }
    }

    /// Gain at an offset from the beam centre (radians in each axis).
    pub fn gain(&self, az_offset: f64, el_offset: f64) -> f64 {
        let axis = |offset: f64, beamwidth: f64| {
            if beamwidth <= 0.0 {
                return 1.0;
            }
            let x = 2.0 * HALF_POWER_ARG * offset / beamwidth;
            if x.abs() >= PI {
                // Outside the main lobe
                return 0.0;
            }
            sinc(x).powi(2)
        };
        let relative = axis(az_offset, self.azimuth_beamwidth) * axis(el_offset, self.elevation_beamwidth);
        self.peak_gain() * relative.max(self.sidelobe_level)
    }

    pub fn process_input(&mut self, input: &mut InputReader) -> InputResult<bool> {
        match input.command() {
            "beamwidth" => {
                let bw = input.read_value_of_type(ValueType::Angle)?;
                input.value_greater(bw, 0.0)?;
                self.azimuth_beamwidth = bw;
                self.elevation_beamwidth = bw;
            }
            "azimuth_beamwidth" => {
                self.azimuth_beamwidth = input.read_value_of_type(ValueType::Angle)?;
                input.value_greater(self.azimuth_beamwidth, 0.0)?;
            }
            "elevation_beamwidth" => {
                self.elevation_beamwidth = input.read_value_of_type(ValueType::Angle)?;
                input.value_greater(self.elevation_beamwidth, 0.0)?;
            }
            "antenna_gain" => {
                self.peak_gain = input.read_value_of_type(ValueType::Ratio)?;
                input.value_greater(self.peak_gain, 0.0)?;
            }
            "sidelobe_level" => {
                self.sidelobe_level = input.read_value_of_type(ValueType::Ratio)?;
                input.value_in_closed_range(self.sidelobe_level, 0.0, 1.0)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

pub fn sinc(x: f64) -> f64 {
    if x.abs() < 1.0e-9 {
        1.0
    } else {
        x.sin() / x
    }
}

/// Monostatic received power (W):
/// `Pt·Gt·Gr·λ²·σ / ((4π)³·R⁴·Lt·Lr)`.
pub fn received_power(
    xmtr: &Transmitter,
    rcvr: &Receiver,
    xmtr_gain: f64,
    rcvr_gain: f64,
    rcs: f64,
    range: f64,
) -> f64 {
    if range <= 0.0 {
        return 0.0;
    }
    let lambda = xmtr.wavelength();
    let numerator = xmtr.peak_power * xmtr_gain * rcvr_gain * lambda * lambda * rcs;
    let denominator =
        (4.0 * PI).powi(3) * range.powi(4) * xmtr.internal_loss * rcvr.internal_loss;
    numerator / denominator
}

/// Signal-to-noise ratio, 0 when the noise power is degenerate.
pub fn signal_to_noise(signal: f64, noise: f64) -> f64 {
    if noise > 0.0 && signal.is_finite() {
        signal / noise
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fallback_pulse_width_uses_bandwidth_and_compression() {
        let xmtr = Transmitter {
            pulse_compression_ratio: 10.0,
            ..Default::default()
        };
        assert_relative_eq!(xmtr.compressed_pulse_width(1.0e6), 1.0e-7);
        assert_eq!(xmtr.compressed_pulse_width(0.0), 0.0);
    }

    #[test]
    fn noise_power_is_kt0bf() {
        let rcvr = Receiver {
            bandwidth: 1.0e6,
            noise_figure: 2.0,
            ..Default::default()
        };
        let n = rcvr.noise_power(&Transmitter::default());
        assert_relative_eq!(n, BOLTZMANN * 290.0 * 1.0e6 * 2.0);
    }

    #[test]
    fn zero_bandwidth_gives_zero_snr() {
        let rcvr = Receiver::default();
        let xmtr = Transmitter::default();
        let noise = rcvr.noise_power(&xmtr);
        assert_eq!(noise, 0.0);
        assert_eq!(signal_to_noise(1.0, noise), 0.0);
    }

    #[test]
    fn half_power_at_half_beamwidth() {
        let beam = BeamPattern {
            peak_gain: 1.0,
            ..Default::default()
        };
        let g = beam.gain(beam.azimuth_beamwidth / 2.0, 0.0);
        assert_relative_eq!(g, 0.5, epsilon = 1e-4);
    }

    #[test]
    fn received_power_falls_as_r4() {
        let xmtr = Transmitter::default();
        let rcvr = Receiver::default();
        let p1 = received_power(&xmtr, &rcvr, 1000.0, 1000.0, 1.0, 10_000.0);
        let p2 = received_power(&xmtr, &rcvr, 1000.0, 1000.0, 1.0, 20_000.0);
        assert_relative_eq!(p1 / p2, 16.0, epsilon = 1e-9);
    }
}
