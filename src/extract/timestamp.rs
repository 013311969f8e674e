//! Conversions for the free-text columns of a listing row.
//!
//! All times are the site's local wall-clock time; no zone is attached.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::HarvestError;

/// Length of an absolute `YYYY-MM-DD` last-activity value.
const ABSOLUTE_DATE_LEN: usize = 10;

/// Reply count column. Empty text means no replies.
///
/// # Errors
///
/// Returns `FieldConversion` when the text is not a nonnegative integer.
pub fn parse_reply_count(text: &str) -> Result<u32, HarvestError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(0);
    }
    text.parse::<u32>()
        .map_err(|e| HarvestError::conversion("reply count", text, e))
}

/// Last-activity column.
///
/// Ten characters is an absolute date at midnight. Anything else is the
/// short `MM-DD HH:MM` form of the current year, which `year` supplies.
///
/// # Errors
///
/// Returns `FieldConversion` when neither form parses.
pub fn parse_last_activity(text: &str, year: i32) -> Result<NaiveDateTime, HarvestError> {
    let text = text.trim();
    if text.len() == ABSOLUTE_DATE_LEN {
        return NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(|date| date.and_time(NaiveTime::MIN))
            .map_err(|e| HarvestError::conversion("last activity", text, e));
    }

    NaiveDateTime::parse_from_str(&format!("{year}-{text}"), "%Y-%m-%d %H:%M")
        .map_err(|e| HarvestError::conversion("last activity", text, e))
}

/// Creation time on a detail page, always `YYYY-MM-DD HH:MM:SS`.
///
/// # Errors
///
/// Returns `FieldConversion` when the text does not match that format.
pub fn parse_created_at(text: &str) -> Result<NaiveDateTime, HarvestError> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| HarvestError::conversion("created time", text, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_reply_count() {
        assert_eq!(parse_reply_count("").unwrap(), 0);
        assert_eq!(parse_reply_count("17").unwrap(), 17);
        assert_eq!(parse_reply_count(" 3 ").unwrap(), 3);
        assert!(matches!(
            parse_reply_count("abc"),
            Err(HarvestError::FieldConversion { .. })
        ));
        assert!(parse_reply_count("-1").is_err());
    }

    #[test]
    fn test_absolute_last_activity_is_midnight() {
        assert_eq!(
            parse_last_activity("2021-05-09", 2030).unwrap(),
            at(2021, 5, 9, 0, 0)
        );
    }

    #[test]
    fn test_relative_last_activity_takes_year() {
        assert_eq!(
            parse_last_activity("05-09 14:30", 2026).unwrap(),
            at(2026, 5, 9, 14, 30)
        );
    }

    #[test]
    fn test_bad_last_activity() {
        assert!(matches!(
            parse_last_activity("yesterday", 2026),
            Err(HarvestError::FieldConversion { .. })
        ));
        assert!(parse_last_activity("2021/05/09", 2026).is_err());
        assert!(parse_last_activity("", 2026).is_err());
    }

    #[test]
    fn test_created_at() {
        let created = parse_created_at("2017-03-01 08:15:42").unwrap();
        assert_eq!(
            created,
            NaiveDate::from_ymd_opt(2017, 3, 1)
                .unwrap()
                .and_hms_opt(8, 15, 42)
                .unwrap()
        );
        assert!(parse_created_at("2017-03-01").is_err());
    }
}
