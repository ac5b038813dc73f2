//! Timeframe parsing
//!
//! Accepts exchange-style interval names (`"5m"`, `"4h"`, `"1d"`, `"1w"`) as well as
//! the pandas offset aliases used by older data scripts (`"4H"`, `"15min"`, `"15T"`, `"1D"`).
//! Every timeframe is a fixed duration; calendar months are rejected.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeframeError {
    #[error("empty timeframe")]
    Empty,

    #[error("invalid count in timeframe '{0}'")]
    InvalidCount(String),

    #[error("timeframe '{0}' must be positive")]
    NonPositive(String),

    #[error("unknown timeframe unit '{unit}' in '{input}'")]
    UnknownUnit { input: String, unit: String },

    #[error("calendar month timeframe '{0}' is not supported, use a fixed period such as 30d")]
    CalendarMonth(String),
}

/// A positive, fixed-length sampling period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe(Duration);

const UNITS: &[(i64, &str)] = &[
    (7 * 24 * 3600, "w"),
    (24 * 3600, "d"),
    (3600, "h"),
    (60, "m"),
    (1, "s"),
];

impl Timeframe {
    /// Wrap a duration, rejecting zero and negative periods
    pub fn from_duration(duration: Duration) -> Result<Self, TimeframeError> {
        if duration <= Duration::zero() {
            return Err(TimeframeError::NonPositive(format!("{}", duration)));
        }
        Ok(Timeframe(duration))
    }

    pub fn minutes(n: i64) -> Result<Self, TimeframeError> {
        Self::from_duration(Duration::minutes(n))
    }

    pub fn hours(n: i64) -> Result<Self, TimeframeError> {
        Self::from_duration(Duration::hours(n))
    }

    pub fn days(n: i64) -> Result<Self, TimeframeError> {
        Self::from_duration(Duration::days(n))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }
}

/// Daily candles
impl Default for Timeframe {
    fn default() -> Self {
        Timeframe(Duration::days(1))
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(TimeframeError::Empty);
        }

        let split = input
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(input.len());
        let (digits, unit) = input.split_at(split);

        // pandas allows a bare unit ("D", "H") meaning one period
        let count: i64 = if digits.is_empty() {
            1
        } else {
            digits
                .parse()
                .map_err(|_| TimeframeError::InvalidCount(input.to_string()))?
        };

        let unit_secs: i64 = match unit {
            "s" | "S" | "sec" => 1,
            "m" | "min" | "T" => 60,
            "h" | "H" => 3600,
            "d" | "D" => 24 * 3600,
            "w" | "W" => 7 * 24 * 3600,
            "M" | "MS" | "ME" => return Err(TimeframeError::CalendarMonth(input.to_string())),
            "" => {
                return Err(TimeframeError::UnknownUnit {
                    input: input.to_string(),
                    unit: String::new(),
                })
            }
            other => {
                return Err(TimeframeError::UnknownUnit {
                    input: input.to_string(),
                    unit: other.to_string(),
                })
            }
        };

        let secs = count
            .checked_mul(unit_secs)
            .ok_or_else(|| TimeframeError::InvalidCount(input.to_string()))?;
        if secs == 0 {
            return Err(TimeframeError::NonPositive(input.to_string()));
        }

        Duration::try_seconds(secs)
            .map(Timeframe)
            .ok_or_else(|| TimeframeError::InvalidCount(input.to_string()))
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.num_seconds();
        for &(unit_secs, suffix) in UNITS {
            if secs >= unit_secs && secs % unit_secs == 0 {
                return write!(f, "{}{}", secs / unit_secs, suffix);
            }
        }
        write!(f, "{}ms", self.0.num_milliseconds())
    }
}

impl TryFrom<String> for Timeframe {
    type Error = TimeframeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.to_string()
    }
}
