use std::num::NonZeroUsize;

use tripsmith_core::TripContext;

/// Day-plan prompt for the generation call. Asks for the canonical slot keys
/// so normalization has less to infer.
pub fn build_day_plan_prompt(trip: &TripContext, expected_days: Option<NonZeroUsize>) -> String {
    let selected = if trip.planner.is_empty() {
        "No items selected.".to_string()
    } else {
        trip.planner
            .iter()
            .enumerate()
            .map(|(index, item)| {
                format!(
                    "{}. {}: {} ({})",
                    index + 1,
                    item.kind.as_str(),
                    item.name,
                    item.location
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let day_count = match expected_days {
        Some(days) => format!("exactly {} day(s)", days.get()),
        None => "one entry per trip day".to_string(),
    };

    format!(
        r#"You are a travel assistant. Return ONLY VALID JSON (no markdown code fences).

Given:
- Destination: {destination}
- Dates: {dates}
- Group: {people} people, {travel_type}
- Budget: {budget}
- Selected items:
{selected}

TASK:
Build a compact day-wise itinerary with {day_count}, sequencing items hour by hour.
Each day has ordered, non-overlapping "slots". Each slot has "start" and "end" (HH:MM, 24h),
"title", "place", "category" (Attraction | Hotel | Restaurant | Transit | Other), "notes"
and "cost_min" (minimum expected cost in INR, a number). End each day with dinner and a
hotel night stay.

Return ONLY:
{{
  "currency": "INR",
  "plan": [
    {{ "day": 1, "date": "YYYY-MM-DD", "slots": [ {{ "start": "09:00", "end": "10:30", "title": "...", "category": "Attraction", "notes": "...", "cost_min": 0 }} ] }}
  ]
}}"#,
        destination = blank_as(&trip.destination, "the destination"),
        dates = blank_as(&trip.dates, "flexible"),
        people = blank_as(&trip.people, "?"),
        travel_type = blank_as(&trip.travel_type, "N/A"),
        budget = blank_as(&trip.budget, "No preference"),
    )
}

fn blank_as<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback
    } else {
        trimmed
    }
}
