use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("Invalid date (expected YYYY-MM-DD): {0}")]
    InvalidDate(String),
    #[error("Range start {start} is after end {end}")]
    Inverted {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// Inclusive range of timestamps covered by an imported file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
}

fn parse_ymd(s: &str) -> Result<NaiveDate, PeriodError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| PeriodError::InvalidDate(s.to_string()))
}

impl DateRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        DateRange { start, end }
    }

    /// Like `new`, but rejects a start that lies after the end.
    pub fn checked(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, PeriodError> {
        if start > end {
            return Err(PeriodError::Inverted { start, end });
        }
        Ok(DateRange { start, end })
    }

    /// Whole days: `start` at midnight through `end` at 23:59:59.
    pub fn for_dates(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange {
            start: start.and_time(NaiveTime::MIN),
            end: end_of_day(end),
        }
    }

    pub fn for_month_year(month: u32, year: i32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()?;
        Some(Self::for_dates(first, last))
    }

    pub fn for_year(year: i32) -> Option<Self> {
        Some(Self::for_dates(
            NaiveDate::from_ymd_opt(year, 1, 1)?,
            NaiveDate::from_ymd_opt(year, 12, 31)?,
        ))
    }

    /// With `end_inclusive == false` the last covered second is one before `end`.
    pub fn for_range(start: NaiveDateTime, end: NaiveDateTime, end_inclusive: bool) -> Self {
        let end = if end_inclusive {
            end
        } else {
            end - Duration::seconds(1)
        };
        DateRange { start, end }
    }

    pub fn from_strings(start: &str, end: &str) -> Result<Self, PeriodError> {
        let range = Self::for_dates(parse_ymd(start)?, parse_ymd(end)?);
        Self::checked(range.start, range.end)
    }

    /// Looks for exactly two `YYYY-MM-DD` dates in a file name, e.g.
    /// `statement_2024-01-01_2024-03-31.csv`.
    pub fn infer_from_filename(filename: &str) -> Option<Self> {
        static DATE: OnceLock<Regex> = OnceLock::new();
        let re = DATE.get_or_init(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("invalid regex"));
        let found: Vec<&str> = re.find_iter(filename).map(|m| m.as_str()).collect();
        if found.len() != 2 {
            return None;
        }
        Self::from_strings(found[0], found[1]).ok()
    }

    /// Smallest range covering every timestamp in `dates`.
    pub fn covering<I>(dates: I) -> Option<Self>
    where
        I: IntoIterator<Item = NaiveDateTime>,
    {
        dates.into_iter().fold(None, |acc, d| match acc {
            None => Some(DateRange { start: d, end: d }),
            Some(r) => Some(DateRange {
                start: r.start.min(d),
                end: r.end.max(d),
            }),
        })
    }

    pub fn contains(self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ts(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        ymd(y, m, d).and_hms_opt(h, mi, s).unwrap()
    }

    #[test]
    fn for_month_year_covers_whole_month() {
        let r = DateRange::for_month_year(2, 2024).unwrap();
        assert_eq!(r.start, ts(2024, 2, 1, 0, 0, 0));
        assert_eq!(r.end, ts(2024, 2, 29, 23, 59, 59));
    }

    #[test]
    fn for_month_year_december_rolls_into_next_year() {
        let r = DateRange::for_month_year(12, 2023).unwrap();
        assert_eq!(r.end, ts(2023, 12, 31, 23, 59, 59));
    }

    #[test]
    fn for_month_year_rejects_invalid_month() {
        assert!(DateRange::for_month_year(13, 2024).is_none());
        assert!(DateRange::for_month_year(0, 2024).is_none());
    }

    #[test]
    fn for_year_bounds() {
        let r = DateRange::for_year(2024).unwrap();
        assert_eq!(r.start, ts(2024, 1, 1, 0, 0, 0));
        assert_eq!(r.end, ts(2024, 12, 31, 23, 59, 59));
    }

    #[test]
    fn for_range_exclusive_end_drops_one_second() {
        let r = DateRange::for_range(ts(2024, 1, 1, 0, 0, 0), ts(2024, 2, 1, 0, 0, 0), false);
        assert_eq!(r.end, ts(2024, 1, 31, 23, 59, 59));
    }

    #[test]
    fn from_strings_parses_and_rejects_inverted() {
        let r = DateRange::from_strings("2024-01-01", "2024-01-31").unwrap();
        assert!(r.contains(ts(2024, 1, 31, 12, 0, 0)));
        assert!(matches!(
            DateRange::from_strings("2024-02-01", "2024-01-01"),
            Err(PeriodError::Inverted { .. })
        ));
        assert!(matches!(
            DateRange::from_strings("01/02/2024", "2024-01-01"),
            Err(PeriodError::InvalidDate(_))
        ));
    }

    #[test]
    fn infer_from_filename_needs_exactly_two_dates() {
        let r = DateRange::infer_from_filename("unicredit_2024-01-01_2024-03-31.csv").unwrap();
        assert_eq!(r.start, ts(2024, 1, 1, 0, 0, 0));
        assert_eq!(r.end, ts(2024, 3, 31, 23, 59, 59));
        assert!(DateRange::infer_from_filename("export_2024-01-01.csv").is_none());
        assert!(DateRange::infer_from_filename("a_2024-01-01_2024-01-02_2024-01-03.csv").is_none());
        assert!(DateRange::infer_from_filename("export.csv").is_none());
    }

    #[test]
    fn covering_single_timestamp_has_equal_bounds() {
        let t = ts(2024, 5, 5, 10, 0, 0);
        let r = DateRange::covering([t]).unwrap();
        assert_eq!(r.start, r.end);
        assert!(DateRange::covering(Vec::new()).is_none());
    }

    #[test]
    fn covering_takes_min_and_max() {
        let r = DateRange::covering([
            ts(2024, 3, 1, 0, 0, 0),
            ts(2024, 1, 1, 0, 0, 0),
            ts(2024, 2, 1, 0, 0, 0),
        ])
        .unwrap();
        assert_eq!(r.start, ts(2024, 1, 1, 0, 0, 0));
        assert_eq!(r.end, ts(2024, 3, 1, 0, 0, 0));
    }

    #[test]
    fn date_range_display() {
        let r = DateRange::for_dates(ymd(2024, 1, 1), ymd(2024, 12, 31));
        assert_eq!(r.to_string(), "2024-01-01 00:00:00 to 2024-12-31 23:59:59");
    }
}
