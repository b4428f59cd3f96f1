use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub const RANGE_SEPARATOR: char = '–';

static CLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid clock regex"));
static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid iso date regex"));
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid digit regex"));

/// Canonical `HH:MM` for `H:MM` / `HH:MM` input.
pub fn parse_time(input: &str) -> Option<String> {
    let (hour, minute) = clock_parts(input)?;
    Some(format!("{hour:02}:{minute:02}"))
}

pub fn make_range(start: Option<&str>, end: Option<&str>) -> String {
    let start = start.and_then(parse_time);
    let end = end.and_then(parse_time);

    match (start, end) {
        (Some(start), Some(end)) => format!("{start}{RANGE_SEPARATOR}{end}"),
        (Some(single), None) | (None, Some(single)) => single,
        (None, None) => String::new(),
    }
}

/// Splits a display range on the first en dash, em dash or hyphen.
pub fn split_range(time: &str) -> Option<(&str, &str)> {
    let index = time.find(['–', '—', '-'])?;
    let separator_len = time[index..].chars().next().map(char::len_utf8).unwrap_or(1);
    Some((&time[..index], &time[index + separator_len..]))
}

/// Single cost figure from a number or a range string such as `"₹1,200–₹1,600"`.
pub fn parse_cost_range(value: &Value) -> u64 {
    match value {
        Value::Number(number) => number
            .as_f64()
            .filter(|amount| amount.is_finite())
            .map(|amount| amount.max(0.0).round() as u64)
            .unwrap_or(0),
        Value::String(text) => parse_cost_text(text),
        _ => 0,
    }
}

pub fn parse_cost_text(text: &str) -> u64 {
    let stripped = text.replace(',', "");
    let mut runs = DIGIT_RUN
        .find_iter(&stripped)
        .filter_map(|run| run.as_str().parse::<u64>().ok());

    let Some(first) = runs.next() else {
        return 0;
    };
    let second = runs.next().unwrap_or(first);

    first / 2 + second / 2 + (first % 2 + second % 2 + 1) / 2
}

/// Adds whole days to a `YYYY-MM-DD` date. Empty on malformed input.
pub fn add_days_iso(iso: &str, delta: i64) -> String {
    parse_iso_date(iso)
        .and_then(|date| date.checked_add_signed(Duration::try_days(delta)?))
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

pub fn is_iso_date(value: &str) -> bool {
    parse_iso_date(value).is_some()
}

/// True when `end` is a well-formed time at or after 18:30.
pub fn ends_in_evening(end: &str) -> bool {
    match clock_parts(end) {
        Some((hour, minute)) => hour > 18 || (hour == 18 && minute >= 30),
        None => false,
    }
}

pub(crate) fn clock_parts(input: &str) -> Option<(u32, u32)> {
    let caps = CLOCK.captures(input.trim())?;
    let hour = caps.get(1)?.as_str().parse::<u32>().ok()?;
    let minute = caps.get(2)?.as_str().parse::<u32>().ok()?;

    if hour > 23 || minute > 59 {
        return None;
    }

    Some((hour, minute))
}

fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    if !ISO_DATE.is_match(value) {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}
