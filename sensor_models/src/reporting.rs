//! What a sensor mode reports about a detected target.

use crate::input::{InputReader, InputResult};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Reporting capability flags, one bit per reportable quantity.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ReportingFlags: u16 {
        const LOCATION        = 1 << 0;
        const VELOCITY        = 1 << 1;
        const RANGE           = 1 << 2;
        const BEARING         = 1 << 3;
        const ELEVATION       = 1 << 4;
        const RANGE_RATE      = 1 << 5;
        const SIDE            = 1 << 6;
        const TYPE            = 1 << 7;
        const IFF             = 1 << 8;
        const SIGNAL_TO_NOISE = 1 << 9;
        const FREQUENCY       = 1 << 10;
        const PULSEWIDTH      = 1 << 11;
        const PRI             = 1 << 12;
        const OTHER           = 1 << 13;
    }
}

impl Default for ReportingFlags {
    fn default() -> Self {
        ReportingFlags::empty()
    }
}

impl ReportingFlags {
    pub fn reports_location(&self) -> bool {
        self.contains(Self::LOCATION)
    }
    pub fn reports_velocity(&self) -> bool {
        self.contains(Self::VELOCITY)
    }
    pub fn reports_range(&self) -> bool {
        self.contains(Self::RANGE)
    }
    pub fn reports_bearing(&self) -> bool {
        self.contains(Self::BEARING)
    }
    pub fn reports_elevation(&self) -> bool {
        self.contains(Self::ELEVATION)
    }
    pub fn reports_range_rate(&self) -> bool {
        self.contains(Self::RANGE_RATE)
    }
    pub fn reports_side(&self) -> bool {
        self.contains(Self::SIDE)
    }
    pub fn reports_type(&self) -> bool {
        self.contains(Self::TYPE)
    }
    pub fn reports_iff(&self) -> bool {
        self.contains(Self::IFF)
    }
    pub fn reports_signal_to_noise(&self) -> bool {
        self.contains(Self::SIGNAL_TO_NOISE)
    }
    pub fn reports_frequency(&self) -> bool {
        self.contains(Self::FREQUENCY)
    }

    /// Keyword name of a single flag, used in diagnostics.
    pub fn keyword(flag: ReportingFlags) -> &'static str {
        REPORTING_KEYWORDS
            .iter()
            .find(|(_, f)| *f == flag)
            .map(|(k, _)| *k)
            .unwrap_or("reports_other")
    }

    /// Handle the `reports_*` keywords. The flag is set unless followed by `false`.
    pub fn process_input(&mut self, input: &mut InputReader) -> InputResult<bool> {
        let command = input.command().to_string();
        if command == "reports_nothing" {
            *self = ReportingFlags::empty();
            return Ok(true);
        }
        let Some((_, flag)) = REPORTING_KEYWORDS.iter().find(|(k, _)| *k == command) else {
            return Ok(false);
        };
        let flag = *flag;
        if input.read_optional_bool() {
            self.insert(flag);
            if flag.intersects(Self::PULSEWIDTH | Self::PRI) {
                self.insert(Self::FREQUENCY);
            }
        } else {
            self.remove(flag);
        }
        Ok(true)
    }
}

const REPORTING_KEYWORDS: [(&str, ReportingFlags); 14] = [
    ("reports_location", ReportingFlags::LOCATION),
    ("reports_velocity", ReportingFlags::VELOCITY),
    ("reports_range", ReportingFlags::RANGE),
    ("reports_bearing", ReportingFlags::BEARING),
    ("reports_elevation", ReportingFlags::ELEVATION),
    ("reports_range_rate", ReportingFlags::RANGE_RATE),
    ("reports_side", ReportingFlags::SIDE),
    ("reports_type", ReportingFlags::TYPE),
    ("reports_iff", ReportingFlags::IFF),
    ("reports_signal_to_noise", ReportingFlags::SIGNAL_TO_NOISE),
    ("reports_frequency", ReportingFlags::FREQUENCY),
    ("reports_pulsewidth", ReportingFlags::PULSEWIDTH),
    ("reports_pri", ReportingFlags::PRI),
    ("reports_other", ReportingFlags::OTHER),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(text: &str) -> ReportingFlags {
        let mut flags = ReportingFlags::empty();
        let mut input = InputReader::new(text);
        while input.read_command().is_some() {
            assert!(flags.process_input(&mut input).unwrap());
        }
        flags
    }

    #[test]
    fn pulsewidth_implies_frequency() {
        let flags = apply("reports_pulsewidth");
        assert!(flags.contains(ReportingFlags::PULSEWIDTH));
        assert!(flags.reports_frequency());
    }

    #[test]
    fn reports_nothing_clears() {
        let flags = apply("reports_range reports_bearing reports_nothing reports_iff");
        assert_eq!(flags, ReportingFlags::IFF);
    }

    #[test]
    fn explicit_false_removes() {
        let flags = apply("reports_range reports_range_rate reports_range false");
        assert_eq!(flags, ReportingFlags::RANGE_RATE);
    }

    #[test]
    fn unknown_keyword_is_not_consumed() {
        let mut flags = ReportingFlags::empty();
        let mut input = InputReader::new("frame_time 1 s");
        input.read_command();
        assert!(!flags.process_input(&mut input).unwrap());
    }
}
