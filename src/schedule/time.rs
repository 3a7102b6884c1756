//! Time-of-day normalization for opening hours

use super::ScheduleError;
use chrono::NaiveTime;

/// Shortest input that can carry an hour and a minute (`HH:MM`)
const MIN_TIME_LEN: usize = 5;

const ACCEPTED_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];

/// Parse a stored or submitted time of day, ignoring seconds and any zone suffix
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, ScheduleError> {
    let trimmed = raw.trim();
    if trimmed.chars().count() < MIN_TIME_LEN {
        return Err(ScheduleError::InvalidTimeFormat(raw.to_string()));
    }

    // A zone designator can only follow the HH:MM part
    let local = match trimmed
        .char_indices()
        .skip(MIN_TIME_LEN)
        .find(|(_, c)| matches!(c, 'Z' | 'z' | '+' | '-'))
    {
        Some((pos, _)) => trimmed[..pos].trim_end(),
        None => trimmed,
    };

    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(local, fmt).ok())
        .ok_or_else(|| ScheduleError::InvalidTimeFormat(raw.to_string()))
}

/// Canonical `HH:MM` display form of a raw time value
pub fn normalize_time(raw: &str) -> Result<String, ScheduleError> {
    parse_time_of_day(raw).map(|t| t.format("%H:%M").to_string())
}

/// Form persisted in `drugstores_work_days` (SQL TIME shape)
pub fn storage_time(raw: &str) -> Result<String, ScheduleError> {
    parse_time_of_day(raw).map(|t| t.format("%H:%M:%S").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_drops_seconds() {
        assert_eq!(normalize_time("08:00:00").unwrap(), "08:00");
        assert_eq!(normalize_time("18:30:59").unwrap(), "18:30");
        assert_eq!(normalize_time("23:59:59.250").unwrap(), "23:59");
    }

    #[test]
    fn test_normalize_keeps_plain_hh_mm() {
        assert_eq!(normalize_time("09:15").unwrap(), "09:15");
        assert_eq!(normalize_time(" 00:00 ").unwrap(), "00:00");
    }

    #[test]
    fn test_normalize_drops_zone_suffix() {
        assert_eq!(normalize_time("08:00:00Z").unwrap(), "08:00");
        assert_eq!(normalize_time("08:00:00+05:00").unwrap(), "08:00");
        assert_eq!(normalize_time("21:45-03:00").unwrap(), "21:45");
    }

    #[test]
    fn test_short_input_rejected() {
        assert_eq!(
            normalize_time("9").unwrap_err(),
            ScheduleError::InvalidTimeFormat("9".to_string())
        );
        assert!(normalize_time("9:00").is_err());
        assert!(normalize_time("").is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(normalize_time("ab:cd").is_err());
        assert!(normalize_time("25:00").is_err());
        assert!(normalize_time("12:75:00").is_err());
        assert!(normalize_time("noon!").is_err());
    }

    #[test]
    fn test_storage_time_adds_seconds() {
        assert_eq!(storage_time("08:00").unwrap(), "08:00:00");
        assert_eq!(storage_time("17:45:10").unwrap(), "17:45:10");
    }
}
