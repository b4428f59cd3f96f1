use serde_json::{json, Value};

use crate::error::PlanError;
use crate::models::{Category, Day, Plan, Slot, DEFAULT_CURRENCY, MAX_SUGGESTIONS};
use crate::timecost::{is_iso_date, make_range, parse_cost_range, parse_time, split_range};

/// Maps one raw slot of any shape onto the canonical [`Slot`]. Never fails:
/// unparseable fields fall back to their defaults.
pub fn normalize_slot(raw: &Value) -> Slot {
    if let Value::String(title) = raw {
        return normalize_slot(&json!({ "title": title }));
    }

    let source_time = text_field(raw, &["time"]).unwrap_or_default();
    let split = split_range(&source_time);
    let (time_start, time_end) = match split {
        Some((first, second)) => (first, second),
        None => (source_time.as_str(), source_time.as_str()),
    };

    let start = text_field(raw, &["start"])
        .and_then(|value| parse_time(&value))
        .or_else(|| parse_time(time_start))
        .unwrap_or_default();
    let end = text_field(raw, &["end"])
        .and_then(|value| parse_time(&value))
        .or_else(|| parse_time(time_end))
        .unwrap_or_default();

    // a lone clock value fills both ends but is shown once
    let time = if split.is_some() {
        source_time.clone()
    } else if !start.is_empty() && start == end {
        start.clone()
    } else {
        let synthesized = make_range(non_empty(&start), non_empty(&end));
        if synthesized.is_empty() {
            source_time.clone()
        } else {
            synthesized
        }
    };

    let title = text_field(raw, &["title", "name"]).unwrap_or_default();
    let category = text_field(raw, &["category"])
        .and_then(|value| Category::parse(&value))
        .unwrap_or_else(|| Category::infer_from_title(&title));
    let cost_min = first_present(raw, &["cost_min", "cost"])
        .map(parse_cost_range)
        .unwrap_or(0);

    Slot {
        time,
        start,
        end,
        place: text_field(raw, &["place"]).unwrap_or_else(|| title.clone()),
        address: text_field(raw, &["address"]).unwrap_or_default(),
        category,
        notes: text_field(raw, &["notes", "note"]).unwrap_or_default(),
        cost_min,
        mode: text_field(raw, &["mode"]).unwrap_or_default(),
        eta_min: raw.get("eta_min").and_then(whole_minutes),
        from: text_field(raw, &["from"]).unwrap_or_default(),
        to: text_field(raw, &["to"]).unwrap_or_default(),
        suggestions: raw
            .get("suggestions")
            .and_then(Value::as_array)
            .map(|items| items.iter().take(MAX_SUGGESTIONS).cloned().collect()),
        title,
    }
}

/// Normalizes one day; `index` is its 0-based position in the plan and
/// numbers the day when the source did not. Returns the day's cost subtotal.
pub fn normalize_day(raw: &Value, index: usize) -> (Day, u64) {
    let day = raw
        .get("day")
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or_else(|| u32::try_from(index + 1).unwrap_or(u32::MAX));

    let date = text_field(raw, &["date"])
        .filter(|value| is_iso_date(value))
        .unwrap_or_default();

    let slots = raw
        .get("slots")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(normalize_slot).collect::<Vec<_>>())
        .unwrap_or_default();

    let day = Day { day, date, slots };
    let subtotal = day.subtotal();
    (day, subtotal)
}

/// Canonical plan from the generator's parsed output. A payload without a
/// list of days is reported as [`PlanError::NoPlanGenerated`] rather than
/// defaulted to an empty plan.
pub fn normalize_plan(raw: &Value) -> Result<Plan, PlanError> {
    let days = raw
        .get("plan")
        .and_then(Value::as_array)
        .or_else(|| raw.get("days").and_then(Value::as_array))
        .or_else(|| raw.as_array())
        .ok_or(PlanError::NoPlanGenerated)?;

    let mut grand_total = 0_u64;
    let mut plan = Vec::with_capacity(days.len());
    for (index, raw_day) in days.iter().enumerate() {
        let (day, subtotal) = normalize_day(raw_day, index);
        grand_total = grand_total.saturating_add(subtotal);
        plan.push(day);
    }

    let currency = text_field(raw, &["currency"]).unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
    let total_min_cost = raw
        .get("total_min_cost")
        .filter(|value| value.is_number())
        .map(parse_cost_range)
        .unwrap_or(grand_total);

    Ok(Plan {
        currency,
        total_min_cost,
        plan,
    })
}

fn first_present<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find(|value| !value.is_null())
}

/// First non-blank textual value among `keys`; numbers are stringified.
fn text_field(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match raw.get(*key)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

fn whole_minutes(value: &Value) -> Option<u32> {
    value
        .as_f64()
        .filter(|minutes| minutes.is_finite() && *minutes >= 0.0)
        .map(|minutes| minutes.round().min(u32::MAX as f64) as u32)
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}
