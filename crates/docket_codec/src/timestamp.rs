//! Temporal values.

use crate::error::{CodecError, CodecResult};
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use std::cmp::Ordering;
use std::fmt;

/// A point in time as stored in a document.
///
/// Two representations exist side by side: calendar times produced by
/// application code, and the database's own `seconds + nanos` timestamp
/// returned by reads. Equality and ordering look only at the instant, so a
/// calendar time and a native timestamp for the same moment are equal.
#[derive(Debug, Clone, Copy)]
pub enum Timestamp {
    /// Calendar time with an explicit UTC offset.
    Calendar(DateTime<FixedOffset>),
    /// Database-native timestamp.
    Native {
        /// Seconds since the Unix epoch.
        seconds: i64,
        /// Nanoseconds within the second. Larger values carry into
        /// `seconds` when compared or converted.
        nanos: u32,
    },
}

impl Timestamp {
    /// Creates a native timestamp.
    ///
    /// Nanoseconds beyond one second carry into `seconds`.
    #[must_use]
    pub fn native(seconds: i64, nanos: u32) -> Self {
        let (seconds, nanos) = carry_nanos(seconds, nanos);
        Self::Native { seconds, nanos }
    }

    /// Creates a native timestamp for a UTC instant.
    #[must_use]
    pub fn native_from(time: DateTime<Utc>) -> Self {
        Self::Native {
            seconds: time.timestamp(),
            nanos: time.timestamp_subsec_nanos(),
        }
    }

    /// Creates a calendar timestamp for a UTC instant.
    #[must_use]
    pub fn from_utc(time: DateTime<Utc>) -> Self {
        Self::Calendar(time.into())
    }

    /// Returns the instant as `(seconds, nanos)` since the Unix epoch, with
    /// `nanos` always below one second.
    #[must_use]
    pub fn epoch(&self) -> (i64, u32) {
        match self {
            Timestamp::Calendar(time) => (time.timestamp(), time.timestamp_subsec_nanos()),
            Timestamp::Native { seconds, nanos } => carry_nanos(*seconds, *nanos),
        }
    }

    /// Converts to a universal instant.
    ///
    /// # Errors
    ///
    /// Fails when a native timestamp lies outside chrono's calendar range.
    pub fn to_utc(&self) -> CodecResult<DateTime<Utc>> {
        match self {
            Timestamp::Calendar(time) => Ok(time.with_timezone(&Utc)),
            Timestamp::Native { .. } => {
                let (seconds, nanos) = self.epoch();
                DateTime::from_timestamp(seconds, nanos)
                    .ok_or(CodecError::TimestampOutOfRange { seconds, nanos })
            }
        }
    }

    /// Formats the instant as an RFC 3339 UTC string.
    ///
    /// # Errors
    ///
    /// Fails when the instant cannot be represented as a calendar time.
    pub fn to_rfc3339(&self) -> CodecResult<String> {
        Ok(self.to_utc()?.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    /// Parses an RFC 3339 string into a calendar timestamp.
    ///
    /// # Errors
    ///
    /// Fails when the input is not valid RFC 3339.
    pub fn parse_rfc3339(input: &str) -> CodecResult<Self> {
        DateTime::parse_from_rfc3339(input)
            .map(Timestamp::Calendar)
            .map_err(|e| CodecError::invalid_structure(format!("bad timestamp {input:?}: {e}")))
    }
}

fn carry_nanos(seconds: i64, nanos: u32) -> (i64, u32) {
    let carry = i64::from(nanos / 1_000_000_000);
    (seconds.saturating_add(carry), nanos % 1_000_000_000)
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.epoch() == other.epoch()
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch().cmp(&other.epoch())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Ok(text) => f.write_str(&text),
            Err(_) => {
                let (seconds, nanos) = self.epoch();
                write!(f, "{seconds}.{nanos:09}s")
            }
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(time: DateTime<Utc>) -> Self {
        Self::from_utc(time)
    }
}

impl From<DateTime<FixedOffset>> for Timestamp {
    fn from(time: DateTime<FixedOffset>) -> Self {
        Self::Calendar(time)
    }
}
