//! Author/committer identity with a timestamp and UTC offset.

use crate::errors::{Result, TesseraError};
use chrono::{DateTime, FixedOffset, Local, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Seconds since the Unix epoch
    pub time: i64,
    /// Minutes east of UTC
    pub offset_minutes: i32,
}

impl Signature {
    /// Signature stamped with the current time and the local UTC offset
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Local::now();
        Self {
            name: name.into(),
            email: email.into(),
            time: now.timestamp(),
            offset_minutes: now.offset().local_minus_utc() / 60,
        }
    }

    /// Build from header fields: an ISO-8601 time and an optional `±HH:MM` offset
    ///
    /// # Errors
    ///
    /// Returns `InvalidTimestamp` if either value fails to parse.
    pub fn from_iso8601(
        name: impl Into<String>,
        email: impl Into<String>,
        time: &str,
        offset: Option<&str>,
    ) -> Result<Self> {
        let parsed =
            DateTime::parse_from_rfc3339(time).map_err(|_| TesseraError::InvalidTimestamp {
                value: time.to_string(),
            })?;
        let offset_minutes = match offset {
            Some(text) => parse_offset(text)?,
            None => parsed.offset().local_minus_utc() / 60,
        };
        Ok(Self {
            name: name.into(),
            email: email.into(),
            time: parsed.timestamp(),
            offset_minutes,
        })
    }

    /// The time as ISO-8601 UTC, e.g. `2019-06-20T14:28:33Z`
    pub fn time_iso8601(&self) -> String {
        Utc.timestamp_opt(self.time, 0)
            .single()
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default()
    }

    /// The offset as `±HH:MM`
    pub fn offset_string(&self) -> String {
        format_offset(self.offset_minutes)
    }

    /// The time rendered in its own offset, for human display
    pub fn local_time(&self) -> String {
        FixedOffset::east_opt(self.offset_minutes * 60)
            .and_then(|offset| offset.timestamp_opt(self.time, 0).single())
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, false))
            .unwrap_or_else(|| self.time_iso8601())
    }
}

/// Parse `±HH:MM` (or `±HHMM`) into minutes east of UTC
///
/// # Errors
///
/// Returns `InvalidTimestamp` for anything else.
pub fn parse_offset(text: &str) -> Result<i32> {
    let invalid = || TesseraError::InvalidTimestamp {
        value: text.to_string(),
    };
    let (sign, rest) = match text.as_bytes().first() {
        Some(b'+') => (1, &text[1..]),
        Some(b'-') => (-1, &text[1..]),
        _ => return Err(invalid()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if minutes >= 60 || hours > 23 {
        return Err(invalid());
    }
    Ok(sign * (hours * 60 + minutes))
}

pub fn format_offset(minutes: i32) -> String {
    let sign = if minutes < 0 { '-' } else { '+' };
    let abs = minutes.abs();
    format!("{}{:02}:{:02}", sign, abs / 60, abs % 60)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_header_time_round_trip() {
        let sig = Signature::from_iso8601(
            "Robert Coup",
            "robert@coup.net.nz",
            "2019-06-20T14:28:33Z",
            Some("+01:00"),
        )
        .unwrap();

        assert_eq!(sig.time, 1_561_040_913);
        assert_eq!(sig.offset_minutes, 60);
        assert_eq!(sig.time_iso8601(), "2019-06-20T14:28:33Z");
        assert_eq!(sig.offset_string(), "+01:00");
        assert_eq!(sig.local_time(), "2019-06-20T15:28:33+01:00");
    }

    #[test]
    fn test_offset_parsing() {
        assert_eq!(parse_offset("+12:45").unwrap(), 765);
        assert_eq!(parse_offset("-0330").unwrap(), -210);
        assert!(parse_offset("01:00").is_err());
        assert!(parse_offset("+1:00").is_err());
        assert!(parse_offset("+01:75").is_err());
    }

    #[test]
    fn test_offset_formatting() {
        assert_eq!(format_offset(-210), "-03:30");
        assert_eq!(format_offset(0), "+00:00");
    }

    #[test]
    fn test_bad_time_rejected() {
        let err = Signature::from_iso8601("a", "b", "yesterday", None).unwrap_err();
        assert!(matches!(err, TesseraError::InvalidTimestamp { .. }));
    }
}
