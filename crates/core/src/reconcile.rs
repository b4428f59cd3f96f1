use std::num::NonZeroUsize;
use std::ops::Range;

use serde_json::Value;

use crate::error::PlanError;
use crate::models::{Category, Day, Plan, Slot, TripContext};
use crate::normalize::normalize_plan;
use crate::timecost::{add_days_iso, ends_in_evening, is_iso_date, make_range};

pub const PLACEHOLDER_NOTE: &str =
    "Auto-generated buffer: the generated itinerary had nothing scheduled for this day.";

/// Forces `plan` to exactly `expected_days` days.
///
/// Surplus days are dropped. Missing days are produced by cutting the
/// flattened slot sequence at natural day boundaries, then splitting the
/// largest or merging the smallest segments until the count matches. Slot
/// order is preserved and nothing is duplicated. A plan with no slots at all
/// is padded with buffer days. `total_min_cost` is always recomputed.
pub fn reconcile_day_count(plan: &Plan, expected_days: NonZeroUsize, context: &TripContext) -> Plan {
    let expected = expected_days.get();
    let base_date = plan
        .plan
        .first()
        .map(|day| day.date.as_str())
        .filter(|date| is_iso_date(date))
        .unwrap_or_default();

    let days = if plan.plan.len() >= expected {
        plan.plan.iter().take(expected).cloned().collect()
    } else if plan.slot_count() == 0 {
        (0..expected)
            .map(|index| Day {
                day: day_number(index),
                date: add_days_iso(base_date, index as i64),
                slots: vec![buffer_slot(context)],
            })
            .collect()
    } else {
        let flat = plan
            .plan
            .iter()
            .flat_map(|day| day.slots.iter().cloned())
            .collect::<Vec<_>>();

        let mut segments = segment_at_boundaries(&flat);
        split_largest_until(&mut segments, expected);
        merge_smallest_until(&mut segments, expected);

        (0..expected)
            .map(|index| Day {
                day: day_number(index),
                date: add_days_iso(base_date, index as i64),
                slots: segments
                    .get(index)
                    .map(|range| flat[range.clone()].to_vec())
                    .unwrap_or_default(),
            })
            .collect()
    };

    let mut reconciled = Plan {
        currency: plan.currency.clone(),
        total_min_cost: 0,
        plan: days,
    };
    reconciled.recompute_total();
    reconciled
}

/// Normalizes a raw generator payload and, when a day count is requested and
/// differs from what came back, reconciles it.
pub fn canonicalize(
    raw: &Value,
    expected_days: Option<NonZeroUsize>,
    context: &TripContext,
) -> Result<Plan, PlanError> {
    let plan = normalize_plan(raw)?;

    Ok(match expected_days {
        Some(expected) if plan.plan.len() != expected.get() => {
            reconcile_day_count(&plan, expected, context)
        }
        _ => plan,
    })
}

/// Dinner, a night stay, a hotel return (anything Hotel except check-in) or
/// anything ending at or after 18:30 closes a day.
pub fn is_day_boundary(slot: &Slot) -> bool {
    let title = slot.title.to_lowercase();

    title.contains("dinner")
        || title.contains("night stay")
        || (slot.category == Category::Hotel && !title.contains("check-in"))
        || ends_in_evening(&slot.end)
}

/// Contiguous ranges over `slots`, cut right after every boundary slot.
pub fn segment_at_boundaries(slots: &[Slot]) -> Vec<Range<usize>> {
    let mut segments = Vec::new();
    let mut start = 0;

    for (index, slot) in slots.iter().enumerate() {
        if is_day_boundary(slot) {
            segments.push(start..index + 1);
            start = index + 1;
        }
    }

    if start < slots.len() {
        segments.push(start..slots.len());
    }

    segments
}

/// Halves the largest segment (earliest on ties, upper half takes the extra
/// slot) until `target` is reached. Stops short when nothing is longer than
/// one slot.
pub fn split_largest_until(segments: &mut Vec<Range<usize>>, target: usize) {
    while segments.len() < target {
        let Some(index) = extreme_index(segments, |candidate, best| candidate > best) else {
            return;
        };

        let range = segments[index].clone();
        if range.len() <= 1 {
            return;
        }

        let middle = range.start + range.len() / 2;
        segments[index] = range.start..middle;
        segments.insert(index + 1, middle..range.end);
    }
}

/// Folds the smallest segment (earliest on ties) into its predecessor, or
/// into its successor when it is the first, until `target` is reached.
pub fn merge_smallest_until(segments: &mut Vec<Range<usize>>, target: usize) {
    while segments.len() > target.max(1) {
        let Some(index) = extreme_index(segments, |candidate, best| candidate < best) else {
            return;
        };

        let (keep, absorbed) = if index == 0 { (0, 1) } else { (index - 1, index) };
        let merged = segments[keep].start..segments[absorbed].end;
        segments[keep] = merged;
        segments.remove(absorbed);
    }
}

fn extreme_index(
    segments: &[Range<usize>],
    better: impl Fn(usize, usize) -> bool,
) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;

    for (index, range) in segments.iter().enumerate() {
        match best {
            Some((_, best_len)) if !better(range.len(), best_len) => {}
            _ => best = Some((index, range.len())),
        }
    }

    best.map(|(index, _)| index)
}

fn buffer_slot(context: &TripContext) -> Slot {
    let destination = context.destination.trim();
    let title = if destination.is_empty() {
        "Night stay".to_string()
    } else {
        format!("Night stay in {destination}")
    };

    Slot {
        time: make_range(Some("20:00"), Some("22:00")),
        start: "20:00".to_string(),
        end: "22:00".to_string(),
        place: destination.to_string(),
        title,
        category: Category::Hotel,
        notes: PLACEHOLDER_NOTE.to_string(),
        cost_min: 0,
        ..Slot::default()
    }
}

fn day_number(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}
