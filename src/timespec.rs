//! Time values given on the command line or in config files.
//!
//! A time is either plain seconds (`1.5`) or a percentage of the total
//! duration (`10%`). Negative values count back from the end (`-2` is two
//! seconds before the end).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SpectralError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeSpec {
    Seconds(f64),
    Percent(f64),
}

impl TimeSpec {
    /// Absolute position in seconds within a signal lasting `total` seconds.
    /// Negative specs are measured from the end and floored at zero.
    pub fn resolve(&self, total: f64) -> f64 {
        let value = match *self {
            TimeSpec::Seconds(s) => s,
            TimeSpec::Percent(p) => p / 100.0 * total,
        };
        if value < 0.0 { (total + value).max(0.0) } else { value }
    }
}

impl Default for TimeSpec {
    fn default() -> Self {
        TimeSpec::Seconds(0.0)
    }
}

impl FromStr for TimeSpec {
    type Err = SpectralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || {
            SpectralError::parameter(
                "time",
                format!("{:?} is not a valid time value; use seconds (1.5) or percent (10%)", s),
            )
        };
        let (number, percent) = match s.strip_suffix('%') {
            Some(rest) => (rest.trim_end(), true),
            None => (s, false),
        };
        let value: f64 = number.parse().map_err(|_| invalid())?;
        if !value.is_finite() {
            return Err(invalid());
        }
        Ok(if percent { TimeSpec::Percent(value) } else { TimeSpec::Seconds(value) })
    }
}

impl TryFrom<String> for TimeSpec {
    type Error = SpectralError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeSpec> for String {
    fn from(value: TimeSpec) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeSpec::Seconds(s) => write!(f, "{}", s),
            TimeSpec::Percent(p) => write!(f, "{}%", p),
        }
    }
}
