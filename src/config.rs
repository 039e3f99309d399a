//! Run configuration.
//!
//! Built once from the command line and immutable for the whole run.

mod duration;

pub use duration::parse_duration_to_secs;

use anyhow::Context;
use binlog_core::PreconditionError;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};
use mysql_types::DisplayZone;
use std::time::Duration;

/// Format accepted by `--start-datetime` / `--stop-datetime`.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Idle timeout used in bounded mode when none is given.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3);

/// Which events are in scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    pub start_file: Option<String>,
    pub start_position: u64,
    pub stop_file: Option<String>,
    /// Zero means no stop position
    pub stop_position: u64,
    pub start_datetime: Option<DateTime<Utc>>,
    pub stop_datetime: Option<DateTime<Utc>>,
    pub only_dml: bool,
    pub flashback: bool,
    pub stop_never: bool,
}

impl FilterConfig {
    /// Whether `file` is the configured stop file.
    pub fn is_stop_file(&self, file: &str) -> bool {
        self.stop_file.as_deref() == Some(file)
    }

    /// Whether `file` is the configured start file.
    pub fn is_start_file(&self, file: &str) -> bool {
        self.start_file.as_deref() == Some(file)
    }

    pub fn validate(&self) -> Result<(), PreconditionError> {
        if let (Some(start), Some(stop)) = (self.start_datetime, self.stop_datetime) {
            if start > stop {
                return Err(PreconditionError::InvalidConfig(format!(
                    "--start-datetime {start} is after --stop-datetime {stop}"
                )));
            }
        }
        if let (Some(start), Some(stop)) = (&self.start_file, &self.stop_file) {
            if start == stop && self.stop_position != 0 && self.start_position > self.stop_position
            {
                return Err(PreconditionError::InvalidConfig(format!(
                    "--start-position {} is after --stop-position {}",
                    self.start_position, self.stop_position
                )));
            }
        }
        Ok(())
    }
}

/// Everything the stream driver needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub filter: FilterConfig,
    /// Deadline for each pull in bounded mode
    pub idle_timeout: Duration,
    /// Zone used for annotations, datetime flags and TIMESTAMP columns
    pub time_zone: DisplayZone,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            time_zone: DisplayZone::utc(),
        }
    }
}

impl RunConfig {
    /// Pull deadline: none in never-stop mode.
    pub fn pull_deadline(&self) -> Option<Duration> {
        if self.filter.stop_never {
            None
        } else {
            Some(self.idle_timeout)
        }
    }
}

/// Parse `+08:00`, `-0530` or `Z`.
///
/// `None` selects the host zone, which is resolved for every instant
/// separately rather than pinned to the offset in effect at startup.
pub fn parse_time_zone(value: Option<&str>) -> anyhow::Result<DisplayZone> {
    match value {
        None => Ok(DisplayZone::Local),
        Some(s) if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") => {
            Ok(DisplayZone::Fixed(Utc.fix()))
        }
        Some(s) => s
            .trim()
            .parse::<FixedOffset>()
            .map(DisplayZone::Fixed)
            .with_context(|| format!("Invalid UTC offset '{s}', expected e.g. '+08:00'")),
    }
}

/// Parse a `YYYY-MM-DD HH:MM:SS` wall-clock time in `zone`.
pub fn parse_datetime(value: &str, zone: &DisplayZone) -> anyhow::Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), DATETIME_FORMAT)
        .with_context(|| format!("Invalid datetime '{value}', expected 'YYYY-MM-DD HH:MM:SS'"))?;
    zone.to_utc(&naive)
        .with_context(|| format!("Datetime '{value}' does not exist in zone {zone}"))
}

/// Parse the `--idle-timeout` flag.
pub fn parse_idle_timeout(value: &str) -> anyhow::Result<Duration> {
    let secs = parse_duration_to_secs(value)?;
    if secs <= 0 {
        anyhow::bail!("Idle timeout must be positive, got '{value}'");
    }
    Ok(Duration::from_secs(secs as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_in_offset() {
        let offset = DisplayZone::Fixed(FixedOffset::east_opt(8 * 3600).unwrap());
        let dt = parse_datetime("2024-03-01 08:00:00", &offset).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-01T00:00:00+00:00");

        assert!(parse_datetime("2024-03-01T08:00:00", &offset).is_err());
        assert!(parse_datetime("yesterday", &offset).is_err());
    }

    #[test]
    fn test_parse_time_zone() {
        assert_eq!(
            parse_time_zone(Some("+08:00")).unwrap(),
            DisplayZone::Fixed(FixedOffset::east_opt(8 * 3600).unwrap())
        );
        assert_eq!(
            parse_time_zone(Some("-05:30")).unwrap(),
            DisplayZone::Fixed(FixedOffset::west_opt(5 * 3600 + 30 * 60).unwrap())
        );
        assert_eq!(parse_time_zone(Some("Z")).unwrap(), DisplayZone::utc());
        assert!(parse_time_zone(Some("eight")).is_err());
        assert_eq!(parse_time_zone(None).unwrap(), DisplayZone::Local);
    }

    #[test]
    fn test_parse_idle_timeout() {
        assert_eq!(parse_idle_timeout("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_idle_timeout("1m").unwrap(), Duration::from_secs(60));
        assert!(parse_idle_timeout("0s").is_err());
        assert!(parse_idle_timeout("soon").is_err());
    }

    #[test]
    fn test_pull_deadline() {
        let mut config = RunConfig::default();
        assert_eq!(config.pull_deadline(), Some(DEFAULT_IDLE_TIMEOUT));
        config.filter.stop_never = true;
        assert_eq!(config.pull_deadline(), None);
    }

    #[test]
    fn test_validate_datetime_order() {
        let offset = DisplayZone::utc();
        let filter = FilterConfig {
            start_datetime: Some(parse_datetime("2024-01-02 00:00:00", &offset).unwrap()),
            stop_datetime: Some(parse_datetime("2024-01-01 00:00:00", &offset).unwrap()),
            ..Default::default()
        };
        assert!(matches!(
            filter.validate(),
            Err(PreconditionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_position_order_within_one_file() {
        let filter = FilterConfig {
            start_file: Some("mysql-bin.000001".to_string()),
            start_position: 900,
            stop_file: Some("mysql-bin.000001".to_string()),
            stop_position: 400,
            ..Default::default()
        };
        assert!(filter.validate().is_err());

        let filter = FilterConfig {
            stop_file: Some("mysql-bin.000002".to_string()),
            ..filter
        };
        assert!(filter.validate().is_ok());
    }
}
