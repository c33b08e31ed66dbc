//! Number formatting shared by the console report and the exports.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to two decimal places (half away from zero) and fixes the scale,
/// so `15` prints as `15.00`.
pub fn two_places(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// `1234567.891` → `1,234,567.89`.
pub fn grouped(value: Decimal) -> String {
    let text = two_places(value).abs().to_string();
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let digits = group_digits(whole);
    let sign = if value.is_sign_negative() && !two_places(value).is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{digits}.{fraction}")
}

pub fn money(value: Decimal, symbol: &str) -> String {
    let text = grouped(value);
    match text.strip_prefix('-') {
        Some(positive) => format!("-{symbol}{positive}"),
        None => format!("{symbol}{text}"),
    }
}

/// Thousands-grouped integer, e.g. `12,345`.
pub fn count(value: usize) -> String {
    group_digits(&value.to_string())
}

/// Rounds to a whole number and groups thousands, keeping the sign: `-1,235`.
pub fn whole(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(0);
    let digits = group_digits(&rounded.abs().to_string());
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{digits}")
    } else {
        digits
    }
}

fn group_digits(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 3);
    for (idx, ch) in text.chars().enumerate() {
        if idx > 0 && (text.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Signed percentage with two decimals: `+3.25%`, `-10.00%`.
pub fn signed_percent(value: Decimal) -> String {
    let rounded = two_places(value);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("{rounded}%")
    } else {
        format!("+{}%", rounded.abs())
    }
}

pub fn percent(value: f64, places: usize) -> String {
    format!("{value:.places$}%")
}
