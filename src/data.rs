//! Transaction record, cell parsing helpers and calendar features.

use std::fmt;

use anyhow::{Result, anyhow};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rust_decimal::Decimal;
use serde::Serialize;

/// Replacement for missing text and category cells.
pub const UNKNOWN: &str = "Unknown";

const MISSING_TOKENS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "NULL", "null", "#N/A", "<NA>",
];

/// Returns true when a cell should be treated as a missing value.
///
/// `None` is a promotion value, not a missing token.
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || MISSING_TOKENS.contains(&trimmed)
}

pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
    ];
    // Month-first wins for ambiguous slash dates.
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    let trimmed = value.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(parsed.and_time(NaiveTime::MIN));
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_amount(value: &str) -> Result<Decimal> {
    let trimmed = value.trim();
    trimmed
        .parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| anyhow!("Failed to parse '{value}' as decimal"))
}

/// Parses an item count; whole-valued floats such as `3.0` are accepted.
pub fn parse_count(value: &str) -> Result<i64> {
    let trimmed = value.trim();
    if let Ok(parsed) = trimmed.parse::<i64>() {
        return Ok(parsed);
    }
    match trimmed.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() && parsed.fract() == 0.0 => Ok(parsed as i64),
        _ => Err(anyhow!("Failed to parse '{value}' as integer")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Discount {
    Yes,
    No,
    Unknown,
}

impl Discount {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "t" | "1" => Some(Discount::Yes),
            "no" | "n" | "false" | "f" | "0" => Some(Discount::No),
            "unknown" => Some(Discount::Unknown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Discount::Yes => "Yes",
            Discount::No => "No",
            Discount::Unknown => UNKNOWN,
        }
    }
}

impl fmt::Display for Discount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar features derived from a transaction timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Calendar {
    pub year: i32,
    pub month: u32,
    pub weekday: Weekday,
    pub iso_week: u32,
}

impl Calendar {
    pub fn from_timestamp(timestamp: &NaiveDateTime) -> Self {
        let date = timestamp.date();
        Calendar {
            year: date.year(),
            month: date.month(),
            weekday: date.weekday(),
            iso_week: date.iso_week().week(),
        }
    }

    pub fn month_name(&self) -> &'static str {
        month_name(self.month)
    }

    pub fn day_name(&self) -> &'static str {
        day_name(self.weekday)
    }
}

pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => UNKNOWN,
    }
}

pub fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Meteorological season for inputs that carry no `Season` column.
pub fn season_for_month(month: u32) -> &'static str {
    match month {
        12 | 1 | 2 => "Winter",
        3..=5 => "Spring",
        6..=8 => "Summer",
        9..=11 => "Fall",
        _ => UNKNOWN,
    }
}

/// Median of `values`; the mean of the two middle values for even lengths.
pub fn median(values: &mut [Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / Decimal::TWO)
    } else {
        Some(values[mid])
    }
}

/// One cleaned retail transaction. Every field is populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub customer_name: String,
    pub customer_category: String,
    pub city: String,
    pub store_type: String,
    pub timestamp: NaiveDateTime,
    pub total_cost: Decimal,
    pub total_items: i64,
    pub products: String,
    pub payment_method: String,
    pub discount: Discount,
    pub promotion: String,
    pub season: String,
    pub calendar: Calendar,
}

impl Transaction {
    /// Individual product names from the comma-separated product cell.
    pub fn product_names(&self) -> impl Iterator<Item = &str> {
        self.products
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tokens_exclude_none_promotion() {
        assert!(is_missing(""));
        assert!(is_missing("  NA "));
        assert!(is_missing("NaN"));
        assert!(!is_missing("None"));
        assert!(!is_missing("Unknown"));
    }

    #[test]
    fn parse_timestamp_accepts_dates_and_datetimes() {
        let dt = parse_timestamp("2022-01-21 06:27:29").expect("datetime");
        assert_eq!(dt.to_string(), "2022-01-21 06:27:29");
        let date_only = parse_timestamp("2023-03-05").expect("date");
        assert_eq!(date_only.to_string(), "2023-03-05 00:00:00");
        let us = parse_timestamp("03/05/2023").expect("slash date");
        assert_eq!(us.date(), NaiveDate::from_ymd_opt(2023, 3, 5).unwrap());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn parse_count_accepts_whole_floats_only() {
        assert_eq!(parse_count("4").unwrap(), 4);
        assert_eq!(parse_count("4.0").unwrap(), 4);
        assert!(parse_count("4.5").is_err());
    }

    #[test]
    fn median_averages_middle_pair() {
        let mut odd = vec![Decimal::from(30), Decimal::from(10), Decimal::from(20)];
        assert_eq!(median(&mut odd), Some(Decimal::from(20)));
        let mut even = vec![Decimal::from(4), Decimal::from(1), Decimal::from(2), Decimal::from(3)];
        assert_eq!(median(&mut even), Some(Decimal::new(25, 1)));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn discount_parses_boolean_spellings() {
        assert_eq!(Discount::parse("True"), Some(Discount::Yes));
        assert_eq!(Discount::parse("no"), Some(Discount::No));
        assert_eq!(Discount::parse("maybe"), None);
    }

    #[test]
    fn calendar_features_follow_iso_rules() {
        let ts = parse_timestamp("2021-01-03 10:00:00").unwrap();
        let calendar = Calendar::from_timestamp(&ts);
        assert_eq!(calendar.year, 2021);
        assert_eq!(calendar.month_name(), "January");
        assert_eq!(calendar.day_name(), "Sunday");
        // 3 January 2021 still belongs to ISO week 53 of 2020.
        assert_eq!(calendar.iso_week, 53);
        assert_eq!(season_for_month(12), "Winter");
        assert_eq!(season_for_month(10), "Fall");
    }
}
