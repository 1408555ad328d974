//! Relative time expressions such as `5 minutes` or `+1 hour 30 mins`.

use chrono::{DateTime, Months, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static PART_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)([+-]?\d+)\s*([a-z]+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Fortnight,
    Month,
    Year,
}

impl Unit {
    fn parse(word: &str) -> Option<Self> {
        let unit = match word.to_ascii_lowercase().as_str() {
            "sec" | "secs" | "second" | "seconds" => Unit::Second,
            "min" | "mins" | "minute" | "minutes" => Unit::Minute,
            "hour" | "hours" => Unit::Hour,
            "day" | "days" => Unit::Day,
            "week" | "weeks" => Unit::Week,
            "fortnight" | "fortnights" => Unit::Fortnight,
            "month" | "months" => Unit::Month,
            "year" | "years" => Unit::Year,
            _ => return None,
        };
        Some(unit)
    }

    fn seconds(self) -> Option<i64> {
        match self {
            Unit::Second => Some(1),
            Unit::Minute => Some(60),
            Unit::Hour => Some(3_600),
            Unit::Day => Some(86_400),
            Unit::Week => Some(7 * 86_400),
            Unit::Fortnight => Some(14 * 86_400),
            Unit::Month | Unit::Year => None,
        }
    }
}

/// Splits an expression into `(amount, unit)` parts. Anything that is not a
/// sequence of such parts is rejected.
pub fn parse(expr: &str) -> Option<Vec<(i64, Unit)>> {
    let mut parts = Vec::new();
    let mut consumed = 0;

    for caps in PART_RE.captures_iter(expr) {
        let whole = caps.get(0)?;
        if !expr[consumed..whole.start()].trim().is_empty() {
            return None;
        }
        consumed = whole.end();

        let amount = caps[1].trim_start_matches('+').parse::<i64>().ok()?;
        parts.push((amount, Unit::parse(&caps[2])?));
    }

    if parts.is_empty() || !expr[consumed..].trim().is_empty() {
        return None;
    }
    Some(parts)
}

/// `from` advanced by `expr`; `None` when the expression does not resolve.
pub fn expiration(expr: &str, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    parse(expr)?
        .into_iter()
        .try_fold(from, |at, (amount, unit)| match unit.seconds() {
            Some(factor) => at.checked_add_signed(TimeDelta::try_seconds(amount.checked_mul(factor)?)?),
            None => {
                let months = match unit {
                    Unit::Year => amount.checked_mul(12)?,
                    _ => amount,
                };
                let delta = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
                if months >= 0 {
                    at.checked_add_months(delta)
                } else {
                    at.checked_sub_months(delta)
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_parse_accepts_common_spellings() {
        assert_eq!(parse("5 minutes"), Some(vec![(5, Unit::Minute)]));
        assert_eq!(parse("+1 hour"), Some(vec![(1, Unit::Hour)]));
        assert_eq!(parse("15mins"), Some(vec![(15, Unit::Minute)]));
        assert_eq!(
            parse("1 day 2 hours"),
            Some(vec![(1, Unit::Day), (2, Unit::Hour)])
        );
        assert_eq!(parse("-2 Weeks"), Some(vec![(-2, Unit::Week)]));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("soon"), None);
        assert_eq!(parse("5"), None);
        assert_eq!(parse("5 lightyears"), None);
        assert_eq!(parse("about 5 minutes"), None);
        assert_eq!(parse("5 minutes please"), None);
    }

    #[test]
    fn test_expiration() {
        let start = at(1_700_000_000);
        assert_eq!(expiration("5 minutes", start), Some(at(1_700_000_300)));
        assert_eq!(
            expiration("1 hour 30 minutes", start),
            Some(at(1_700_000_000 + 5_400))
        );
        assert_eq!(expiration("-1 day", start), Some(at(1_700_000_000 - 86_400)));
        assert_eq!(expiration("never", start), None);
    }

    #[test]
    fn test_expiration_months_are_calendar_based() {
        let jan_31 = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap();
        assert_eq!(expiration("1 month", jan_31), Some(expected));

        let next_year = Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(expiration("1 year", jan_31), Some(next_year));
    }
}
