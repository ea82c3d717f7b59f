//! Token-stream reader for the sensor definition language.
//!
//! Definitions are whitespace separated keyword commands. `#` starts a
//! comment that runs to the end of the line. Blocks are closed by an
//! `end_<block>` keyword, e.g.
//!
//! ```text
//! mode search
//!    frame_time 1 s
//!    hits_to_establish_track 3 4
//! end_mode
//! ```
//!
//! Every `process_input` in the workspace takes an [`InputReader`] whose
//! current command has already been read, and returns `Ok(false)` when it
//! does not recognize that command so the caller can offer it elsewhere.

use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors raised while reading definitions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("'{command}': missing value")]
    MissingValue { command: String },
    #[error("'{command}': bad value '{value}'")]
    BadValue { command: String, value: String },
    #[error("'{command}': value {value} out of range ({limit})")]
    OutOfRange {
        command: String,
        value: String,
        limit: String,
    },
    #[error("'{command}': unknown unit '{unit}'")]
    UnknownUnit { command: String, unit: String },
    #[error("unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("block '{block}' is missing '{end}'")]
    UnterminatedBlock { block: String, end: String },
}

pub type InputResult<T> = Result<T, InputError>;

/// Physical dimension of a value that is followed by a unit token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    Time,
    Length,
    Angle,
    Frequency,
    Power,
    /// Dimensionless ratio, either `dB` or `abs`. Result is linear.
    Ratio,
    Speed,
    /// Length or `percent`. Percent values come back negated.
    LengthOrPercent,
}

impl ValueType {
    /// Multiplier that converts `unit` to SI, or `None` if the unit does not
    /// belong to this dimension. Decibel units are handled by the caller.
    fn si_scale(self, unit: &str) -> Option<f64> {
        let unit = unit.to_ascii_lowercase();
        let scale = match self {
            ValueType::Time => match unit.as_str() {
                "s" | "sec" | "secs" | "seconds" => 1.0,
                "ms" | "msec" => 1.0e-3,
                "us" | "usec" => 1.0e-6,
                "ns" | "nsec" => 1.0e-9,
                "min" | "mins" | "minutes" => 60.0,
                "h" | "hr" | "hour" | "hours" => 3600.0,
                _ => return None,
            },
            ValueType::Length | ValueType::LengthOrPercent => match unit.as_str() {
                "m" | "meter" | "meters" => 1.0,
                "km" | "kilometers" => 1000.0,
                "ft" | "feet" => 0.3048,
                "kft" => 304.8,
                "nm" | "nmi" => 1852.0,
                "mi" | "miles" => 1609.344,
                _ => return None,
            },
            ValueType::Angle => match unit.as_str() {
                "rad" | "radians" => 1.0,
                "deg" | "degrees" => std::f64::consts::PI / 180.0,
                "mrad" => 1.0e-3,
                _ => return None,
            },
            ValueType::Frequency => match unit.as_str() {
                "hz" => 1.0,
                "khz" => 1.0e3,
                "mhz" => 1.0e6,
                "ghz" => 1.0e9,
                _ => return None,
            },
            ValueType::Power => match unit.as_str() {
                "w" | "watts" => 1.0,
                "kw" => 1.0e3,
                "mw" => 1.0e6,
                _ => return None,
            },
            ValueType::Ratio => match unit.as_str() {
                "abs" | "absolute" => 1.0,
                _ => return None,
            },
            ValueType::Speed => match unit.as_str() {
                "m/s" | "m/sec" => 1.0,
                "km/h" | "km/hr" => 1000.0 / 3600.0,
                "kts" | "knots" => 1852.0 / 3600.0,
                "ft/s" | "ft/sec" => 0.3048,
                _ => return None,
            },
        };
        Some(scale)
    }
}

/// Cursor over the tokens of a definition text.
#[derive(Clone, Debug, Default)]
pub struct InputReader {
    tokens: Vec<String>,
    pos: usize,
    command: String,
}

impl InputReader {
    pub fn new(text: &str) -> Self {
        let tokens = text
            .lines()
            .map(|line| line.split('#').next().unwrap_or(""))
            .flat_map(str::split_whitespace)
            .map(str::to_string)
            .collect();
        Self {
            tokens,
            pos: 0,
            command: String::new(),
        }
    }

    /// Advance to the next command. Returns `None` at end of input.
    pub fn read_command(&mut self) -> Option<String> {
        let token = self.tokens.get(self.pos)?.clone();
        self.pos += 1;
        self.command = token.clone();
        Some(token)
    }

    /// The command most recently returned by [`read_command`](Self::read_command).
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Read the next command inside a block closed by `end`.
    ///
    /// Returns `Ok(None)` once `end` is consumed and an error if the input
    /// runs out first.
    pub fn read_block_command(&mut self, block: &str, end: &str) -> InputResult<Option<String>> {
        match self.read_command() {
            Some(cmd) if cmd == end => Ok(None),
            Some(cmd) => Ok(Some(cmd)),
            None => Err(InputError::UnterminatedBlock {
                block: block.to_string(),
                end: end.to_string(),
            }),
        }
    }

    /// Next token without consuming it.
    pub fn peek(&self) -> Option<&str> {
        self.peek_nth(0)
    }

    /// The token `n` places past the next one, without consuming anything.
    pub fn peek_nth(&self, n: usize) -> Option<&str> {
        self.tokens.get(self.pos + n).map(String::as_str)
    }

    /// Put the current command back so another reader position sees it again.
    pub fn push_back(&mut self) {
        self.pos = self.pos.saturating_sub(1);
    }

    pub fn read_string(&mut self) -> InputResult<String> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| InputError::MissingValue {
                command: self.command.clone(),
            })?;
        self.pos += 1;
        Ok(token)
    }

    pub fn read_value<T: FromStr>(&mut self) -> InputResult<T> {
        let token = self.read_string()?;
        token.parse().map_err(|_| self.bad_value(&token))
    }

    /// Accepts `true/false`, `yes/no`, `on/off` and `1/0`.
    pub fn read_bool(&mut self) -> InputResult<bool> {
        let token = self.read_string()?;
        match token.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(self.bad_value(&token)),
        }
    }

    /// Read a flag command that takes an optional boolean, so both
    /// `automatic_turn_off` and `automatic_turn_off false` are accepted.
    pub fn read_optional_bool(&mut self) -> bool {
        let value = self
            .tokens
            .get(self.pos)
            .and_then(|t| match t.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" => Some(true),
                "false" | "no" | "off" => Some(false),
                _ => None,
            });
        match value {
            Some(v) => {
                self.pos += 1;
                v
            }
            None => true,
        }
    }

    /// Read `<number> <unit>` and convert to SI.
    pub fn read_value_of_type(&mut self, kind: ValueType) -> InputResult<f64> {
        let value: f64 = self.read_value()?;
        let unit = self.read_string()?;
        let lower = unit.to_ascii_lowercase();
        match (kind, lower.as_str()) {
            (ValueType::Ratio, "db") => return Ok(db_to_linear(value)),
            (ValueType::Power, "dbw") => return Ok(db_to_linear(value)),
            (ValueType::Power, "dbm") => return Ok(db_to_linear(value) * 1.0e-3),
            (ValueType::LengthOrPercent, "percent" | "%") => return Ok(-value.abs()),
            _ => {}
        }
        kind.si_scale(&unit)
            .map(|scale| value * scale)
            .ok_or_else(|| InputError::UnknownUnit {
                command: self.command.clone(),
                unit,
            })
    }

    pub fn value_greater<T: PartialOrd + Display>(&self, value: T, limit: T) -> InputResult<()> {
        if value > limit {
            Ok(())
        } else {
            Err(self.out_of_range(value, format!("> {limit}")))
        }
    }

    pub fn value_greater_or_equal<T: PartialOrd + Display>(
        &self,
        value: T,
        limit: T,
    ) -> InputResult<()> {
        if value >= limit {
            Ok(())
        } else {
            Err(self.out_of_range(value, format!(">= {limit}")))
        }
    }

    pub fn value_less<T: PartialOrd + Display>(&self, value: T, limit: T) -> InputResult<()> {
        if value < limit {
            Ok(())
        } else {
            Err(self.out_of_range(value, format!("< {limit}")))
        }
    }

    pub fn value_less_or_equal<T: PartialOrd + Display>(
        &self,
        value: T,
        limit: T,
    ) -> InputResult<()> {
        if value <= limit {
            Ok(())
        } else {
            Err(self.out_of_range(value, format!("<= {limit}")))
        }
    }

    pub fn value_in_closed_range<T: PartialOrd + Display>(
        &self,
        value: T,
        lo: T,
        hi: T,
    ) -> InputResult<()> {
        if value >= lo && value <= hi {
            Ok(())
        } else {
            Err(self.out_of_range(value, format!("[{lo}, {hi}]")))
        }
    }

    /// Error for a command nobody recognized.
    pub fn unknown_command(&self) -> InputError {
        InputError::UnknownCommand {
            command: self.command.clone(),
        }
    }

    pub fn bad_value(&self, value: &str) -> InputError {
        InputError::BadValue {
            command: self.command.clone(),
            value: value.to_string(),
        }
    }

    fn out_of_range<T: Display>(&self, value: T, limit: String) -> InputError {
        InputError::OutOfRange {
            command: self.command.clone(),
            value: value.to_string(),
            limit,
        }
    }
}

pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

pub fn linear_to_db(value: f64) -> f64 {
    10.0 * value.max(1.0e-30).log10()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn comments_are_skipped() {
        let mut input = InputReader::new("frame_time 2 s # trailing\n# whole line\nrequired_pd 0.8");
        assert_eq!(input.read_command().as_deref(), Some("frame_time"));
        assert_abs_diff_eq!(input.read_value_of_type(ValueType::Time).unwrap(), 2.0);
        assert_eq!(input.read_command().as_deref(), Some("required_pd"));
        assert_abs_diff_eq!(input.read_value::<f64>().unwrap(), 0.8);
        assert!(input.read_command().is_none());
    }

    #[test]
    fn units_convert_to_si() {
        let mut input = InputReader::new("x 10 km 2 deg 3 GHz 10 dB 1 percent");
        input.read_command();
        assert_abs_diff_eq!(input.read_value_of_type(ValueType::Length).unwrap(), 10_000.0);
        assert_abs_diff_eq!(
            input.read_value_of_type(ValueType::Angle).unwrap(),
            2.0_f64.to_radians(),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(input.read_value_of_type(ValueType::Frequency).unwrap(), 3.0e9);
        assert_abs_diff_eq!(
            input.read_value_of_type(ValueType::Ratio).unwrap(),
            10.0,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            input.read_value_of_type(ValueType::LengthOrPercent).unwrap(),
            -1.0
        );
    }

    #[test]
    fn wrong_unit_is_reported_with_command() {
        let mut input = InputReader::new("frame_time 2 km");
        input.read_command();
        let err = input.read_value_of_type(ValueType::Time).unwrap_err();
        assert_eq!(
            err,
            InputError::UnknownUnit {
                command: "frame_time".into(),
                unit: "km".into()
            }
        );
    }

    #[test]
    fn block_without_end_is_an_error() {
        let mut input = InputReader::new("frame_time 1 s");
        assert!(matches!(
            input.read_block_command("mode", "end_mode"),
            Ok(Some(_))
        ));
        input.read_string().unwrap();
        input.read_string().unwrap();
        assert!(input.read_block_command("mode", "end_mode").is_err());
    }

    #[test]
    fn optional_bool_defaults_to_true() {
        let mut input = InputReader::new("automatic_turn_off dwell_time 1 s");
        input.read_command();
        assert!(input.read_optional_bool());
        assert_eq!(input.read_command().as_deref(), Some("dwell_time"));
    }
}
