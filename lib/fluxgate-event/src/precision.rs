//! Timestamp precision.
use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use snafu::Snafu;

/// An unrecognized precision token.
#[derive(Debug, Snafu)]
#[snafu(display("unknown timestamp precision '{}' (expected one of n, ns, u, us, ms, s, m, h)", token))]
pub struct UnknownPrecision {
    token: String,
}

/// A timestamp out of the representable range.
#[derive(Debug, Snafu)]
#[snafu(display("timestamp {} cannot be represented as nanoseconds since the Unix epoch", timestamp))]
pub struct TimestampOutOfRange {
    timestamp: DateTime<Utc>,
}

/// Precision of written timestamps.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Precision {
    /// Nanoseconds.
    #[default]
    Nanoseconds,

    /// Microseconds.
    Microseconds,

    /// Milliseconds.
    Milliseconds,

    /// Seconds.
    Seconds,

    /// Minutes.
    Minutes,

    /// Hours.
    Hours,
}

impl Precision {
    /// Returns the canonical token for this precision, as used in the store's write parameters.
    pub const fn as_token(&self) -> &'static str {
        match self {
            Self::Nanoseconds => "ns",
            Self::Microseconds => "u",
            Self::Milliseconds => "ms",
            Self::Seconds => "s",
            Self::Minutes => "m",
            Self::Hours => "h",
        }
    }

    /// Returns the length of one unit of this precision, in nanoseconds.
    pub const fn unit_nanos(&self) -> i64 {
        match self {
            Self::Nanoseconds => 1,
            Self::Microseconds => 1_000,
            Self::Milliseconds => 1_000_000,
            Self::Seconds => 1_000_000_000,
            Self::Minutes => 60 * 1_000_000_000,
            Self::Hours => 3_600 * 1_000_000_000,
        }
    }

    /// Converts `timestamp` to a whole number of units since the Unix epoch, truncating towards negative infinity.
    ///
    /// # Errors
    ///
    /// If the timestamp does not fit in 64-bit nanoseconds, an error is returned.
    pub fn to_units(&self, timestamp: DateTime<Utc>) -> Result<i64, TimestampOutOfRange> {
        let nanos = nanos_since_epoch(timestamp)?;
        Ok(nanos.div_euclid(self.unit_nanos()))
    }

    /// Rounds `timestamp` to the nearest unit, returning nanoseconds since the Unix epoch.
    ///
    /// Halfway values are rounded away from zero.
    ///
    /// # Errors
    ///
    /// If the timestamp, before or after rounding, does not fit in 64-bit nanoseconds, an error is returned.
    pub fn round_nanos(&self, timestamp: DateTime<Utc>) -> Result<i64, TimestampOutOfRange> {
        let nanos = i128::from(nanos_since_epoch(timestamp)?);
        let unit = i128::from(self.unit_nanos());
        let half = unit / 2;

        let rounded = if nanos >= 0 {
            (nanos + half) / unit * unit
        } else {
            (nanos - half) / unit * unit
        };

        i64::try_from(rounded).map_err(|_| TimestampOutOfRange { timestamp })
    }
}

fn nanos_since_epoch(timestamp: DateTime<Utc>) -> Result<i64, TimestampOutOfRange> {
    timestamp
        .timestamp_nanos_opt()
        .ok_or(TimestampOutOfRange { timestamp })
}

impl FromStr for Precision {
    type Err = UnknownPrecision;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "n" | "ns" => Ok(Self::Nanoseconds),
            "u" | "us" | "µ" | "µs" => Ok(Self::Microseconds),
            "ms" => Ok(Self::Milliseconds),
            "s" => Ok(Self::Seconds),
            "m" => Ok(Self::Minutes),
            "h" => Ok(Self::Hours),
            other => Err(UnknownPrecision {
                token: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

impl Serialize for Precision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_token())
    }
}

impl<'de> Deserialize<'de> for Precision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        token.parse().map_err(de::Error::custom)
    }
}
