//! M-of-N hit history.
//!
//! Each detection opportunity shifts the mask left one bit and ORs in a 1 for
//! a hit. The M-of-N test counts set bits under a window mask of the last N
//! opportunities. A window of 0 or an M of 0 is always satisfied.

use sensor_models::input::{InputReader, InputResult};
use serde::{Deserialize, Serialize};

/// Widest supported window (bits in the history mask).
pub const MAX_WINDOW: u32 = 32;

/// Mask selecting the most recent `window` opportunities.
pub fn window_mask(window: u32) -> u32 {
    match window {
        0 => 0,
        w if w >= MAX_WINDOW => u32::MAX,
        w => (1u32 << w) - 1,
    }
}

/// Per-request M-of-N configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackerSettings {
    /// Hits required to establish a track (M)
    pub hits_to_establish: u32,
    /// Opportunities considered for establishment (N)
    pub establish_window: u32,
    pub hits_to_maintain: u32,
    pub maintain_window: u32,
    /// Chance of establishing once M-of-N is met
    pub establish_track_probability: f64,
    /// Chance of maintaining once M-of-N is met
    pub maintain_track_probability: f64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            hits_to_establish: 1,
            establish_window: 1,
            hits_to_maintain: 1,
            maintain_window: 1,
            establish_track_probability: 1.0,
            maintain_track_probability: 1.0,
        }
    }
}

impl TrackerSettings {
    pub fn establish_mask(&self) -> u32 {
        window_mask(self.establish_window)
    }

    pub fn maintain_mask(&self) -> u32 {
        window_mask(self.maintain_window)
    }

    /// `hits_to_establish_track`, `hits_to_maintain_track` and the
    /// probability keywords.
    pub fn process_input(&mut self, input: &mut InputReader) -> InputResult<bool> {
        match input.command() {
            "hits_to_establish_track" => {
                let (m, n) = read_m_of_n(input)?;
                self.hits_to_establish = m;
                self.establish_window = n;
            }
            "hits_to_maintain_track" => {
                let (m, n) = read_m_of_n(input)?;
                self.hits_to_maintain = m;
                self.maintain_window = n;
            }
            "establish_track_probability" => {
                self.establish_track_probability = input.read_value()?;
                input.value_greater(self.establish_track_probability, 0.0)?;
                input.value_less_or_equal(self.establish_track_probability, 1.0)?;
            }
            "maintain_track_probability" => {
                self.maintain_track_probability = input.read_value()?;
                input.value_greater(self.maintain_track_probability, 0.0)?;
                input.value_less_or_equal(self.maintain_track_probability, 1.0)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

fn read_m_of_n(input: &mut InputReader) -> InputResult<(u32, u32)> {
    let m: u32 = input.read_value()?;
    input.value_greater(m, 0)?;
    let n: u32 = input.read_value()?;
    input.value_greater_or_equal(n, m)?;
    input.value_less_or_equal(n, MAX_WINDOW)?;
    Ok((m, n))
}

/// Rolling record of the most recent opportunities, newest in bit 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitHistory {
    mask: u32,
}

impl HitHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, hit: bool) {
        self.mask = (self.mask << 1) | u32::from(hit);
    }

    pub fn bits(&self) -> u32 {
        self.mask
    }

    /// Hits among the last `window` opportunities.
    pub fn hits_within(&self, window: u32) -> u32 {
        (self.mask & window_mask(window)).count_ones()
    }

    /// True when at least `hits` of the last `window` opportunities were hits.
    pub fn satisfies(&self, hits: u32, window: u32) -> bool {
        if hits == 0 || window == 0 {
            return true;
        }
        self.hits_within(window) >= hits
    }
}
