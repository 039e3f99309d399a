//! The zone wall-clock times are rendered and parsed in.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, TimeZone, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayZone {
    /// The host zone, resolved per instant so DST transitions apply
    Local,
    /// A constant offset from UTC
    Fixed(FixedOffset),
}

impl Default for DisplayZone {
    fn default() -> Self {
        DisplayZone::utc()
    }
}

impl DisplayZone {
    pub fn utc() -> Self {
        DisplayZone::Fixed(Utc.fix())
    }

    /// Format an instant as wall-clock time in this zone.
    pub fn format(&self, instant: &DateTime<Utc>, fmt: &str) -> String {
        match self {
            DisplayZone::Local => instant.with_timezone(&Local).format(fmt).to_string(),
            DisplayZone::Fixed(offset) => instant.with_timezone(offset).format(fmt).to_string(),
        }
    }

    /// The instant a wall-clock time in this zone names.
    ///
    /// A time repeated by a DST fall-back resolves to its earlier instant.
    /// A time skipped by a spring-forward has no instant and yields `None`.
    pub fn to_utc(&self, naive: &NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            DisplayZone::Local => Local
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            DisplayZone::Fixed(offset) => offset
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

impl fmt::Display for DisplayZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayZone::Local => f.write_str("local"),
            DisplayZone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_fixed_round_trip() {
        let zone = DisplayZone::Fixed(FixedOffset::west_opt(5 * 3600).unwrap());
        let instant = zone.to_utc(&naive("2024-01-15 07:00:00")).unwrap();
        assert_eq!(instant.timestamp(), 1_705_320_000);
        assert_eq!(zone.format(&instant, "%Y-%m-%d %H:%M:%S"), "2024-01-15 07:00:00");
    }

    #[test]
    fn test_default_is_utc() {
        let instant = DateTime::from_timestamp(1_705_320_000, 0).unwrap();
        assert_eq!(
            DisplayZone::default().format(&instant, "%H:%M"),
            "12:00"
        );
        assert_eq!(DisplayZone::default().to_string(), "+00:00");
        assert_eq!(DisplayZone::Local.to_string(), "local");
    }
}
