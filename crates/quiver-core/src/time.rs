//! Time helpers: wall clock in nanoseconds and human-readable durations
//! (`"10m"`, `"48h"`, `"2d"`) for configuration files.

use crate::error::{CoreError, Result};
use crate::types::Timestamp;
use chrono::Utc;
use std::time::Duration;

const NANOS_PER_SEC: u64 = 1_000_000_000;

const UNITS: [(&str, u64); 8] = [
    ("w", 604_800 * NANOS_PER_SEC),
    ("d", 86_400 * NANOS_PER_SEC),
    ("h", 3_600 * NANOS_PER_SEC),
    ("m", 60 * NANOS_PER_SEC),
    ("s", NANOS_PER_SEC),
    ("ms", 1_000_000),
    ("us", 1_000),
    ("ns", 1),
];

/// Current wall clock time in nanoseconds since Unix epoch
pub fn now_nanos() -> Timestamp {
    Utc::now().timestamp_nanos_opt().unwrap_or(Timestamp::MAX)
}

/// Convert a duration to nanoseconds, saturating at `i64::MAX`
pub fn duration_nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

/// Parse a duration string (e.g. "30d", "1w", "6h", "250ms")
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(CoreError::InvalidDuration("empty duration".to_string()));
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| CoreError::InvalidDuration(format!("missing unit: {}", s)))?;
    let (num_str, unit) = s.split_at(split);
    let unit = if unit == "µs" { "us" } else { unit };

    let num: u64 = num_str
        .parse()
        .map_err(|_| CoreError::InvalidDuration(format!("invalid number: {}", s)))?;

    let per_unit = UNITS
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, nanos)| *nanos)
        .ok_or_else(|| CoreError::InvalidDuration(format!("invalid unit: {}", s)))?;

    let nanos = num
        .checked_mul(per_unit)
        .ok_or_else(|| CoreError::InvalidDuration(format!("overflow: {}", s)))?;

    Ok(Duration::from_nanos(nanos))
}

/// Format a duration with the largest unit that divides it exactly
pub fn format_duration(d: Duration) -> String {
    let nanos = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return "0s".to_string();
    }
    for (name, per_unit) in UNITS {
        if nanos % per_unit == 0 {
            return format!("{}{}", nanos / per_unit, name);
        }
    }
    format!("{}ns", nanos)
}

/// Serde adapter for `Duration` fields written as duration strings.
///
/// ```ignore
/// #[serde(with = "quiver_core::time::duration_str")]
/// pub timeout: Duration,
/// ```
pub mod duration_str {
    use super::{format_duration, parse_duration};
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(de::Error::custom)
    }
}
