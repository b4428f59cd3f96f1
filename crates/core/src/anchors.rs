use serde_json::json;

use crate::models::{Category, Day, Plan, Slot, TripContext, MAX_SUGGESTIONS};
use crate::timecost::{clock_parts, make_range};

/// Appends a dinner slot and a return-to-hotel slot to every day that lacks
/// them. Running it twice changes nothing.
pub fn ensure_evening_anchors(plan: &Plan, context: &TripContext) -> Plan {
    let restaurant_suggestions = context
        .restaurants()
        .take(MAX_SUGGESTIONS)
        .map(|item| {
            json!({
                "name": item.name,
                "area": item.location,
                "reason": "From saved planner",
                "approx_cost_for_two": 0
            })
        })
        .collect::<Vec<_>>();

    let mut anchored = plan.clone();
    for day in &mut anchored.plan {
        if !has_dinner(day) {
            day.slots.push(Slot {
                time: make_range(Some("19:30"), Some("21:00")),
                start: "19:30".to_string(),
                end: "21:00".to_string(),
                title: "Dinner (choose)".to_string(),
                category: Category::Restaurant,
                notes: "Pick a dinner stop en-route.".to_string(),
                suggestions: Some(restaurant_suggestions.clone()),
                ..Slot::default()
            });
        }

        if !has_hotel_return(day) {
            day.slots.push(Slot {
                time: make_range(Some("21:00"), Some("22:00")),
                start: "21:00".to_string(),
                end: "22:00".to_string(),
                title: "Return to hotel / night stay".to_string(),
                place: context.destination.trim().to_string(),
                category: Category::Hotel,
                notes: "Return & rest.".to_string(),
                ..Slot::default()
            });
        }
    }

    anchored.recompute_total();
    anchored
}

fn has_dinner(day: &Day) -> bool {
    day.slots.iter().any(|slot| {
        slot.category == Category::Restaurant
            && (slot.title.to_lowercase().contains("dinner") || starts_after_six(&slot.start))
    })
}

fn has_hotel_return(day: &Day) -> bool {
    day.slots.iter().any(|slot| {
        let title = slot.title.to_lowercase();
        slot.category == Category::Hotel && (title.contains("return") || title.contains("night"))
    })
}

fn starts_after_six(start: &str) -> bool {
    matches!(clock_parts(start), Some((hour, minute)) if hour > 18 || (hour == 18 && minute > 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlannerItem;

    fn context() -> TripContext {
        TripContext {
            destination: "Udaipur".to_string(),
            planner: vec![
                PlannerItem {
                    id: 1,
                    kind: Category::Restaurant,
                    name: "Ambrai".to_string(),
                    location: "Lake Pichola".to_string(),
                    description: None,
                },
                PlannerItem {
                    id: 2,
                    kind: Category::Attraction,
                    name: "City Palace".to_string(),
                    location: "Old City".to_string(),
                    description: None,
                },
            ],
            ..TripContext::default()
        }
    }

    fn one_day(slots: Vec<Slot>) -> Plan {
        Plan {
            currency: "INR".to_string(),
            total_min_cost: 0,
            plan: vec![Day {
                day: 1,
                date: String::new(),
                slots,
            }],
        }
    }

    #[test]
    fn adds_dinner_and_return_when_missing() {
        let plan = one_day(vec![Slot {
            title: "City Palace".to_string(),
            cost_min: 300,
            ..Slot::default()
        }]);

        let anchored = ensure_evening_anchors(&plan, &context());
        let slots = &anchored.plan[0].slots;

        assert_eq!(slots.len(), 3);
        assert_eq!(slots[1].title, "Dinner (choose)");
        assert_eq!(slots[1].time, "19:30–21:00");
        let suggestions = slots[1].suggestions.as_ref().expect("restaurant suggestions");
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0]["name"], "Ambrai");
        assert_eq!(slots[2].category, Category::Hotel);
        assert_eq!(slots[2].place, "Udaipur");
        assert_eq!(anchored.total_min_cost, 300);
    }

    #[test]
    fn late_restaurant_counts_as_dinner() {
        let plan = one_day(vec![
            Slot {
                title: "Rooftop meal".to_string(),
                start: "19:15".to_string(),
                category: Category::Restaurant,
                ..Slot::default()
            },
            Slot {
                title: "Hotel night stay".to_string(),
                category: Category::Hotel,
                ..Slot::default()
            },
        ]);

        let anchored = ensure_evening_anchors(&plan, &context());
        assert_eq!(anchored.plan[0].slots.len(), 2);
    }

    #[test]
    fn anchoring_is_idempotent() {
        let plan = one_day(vec![]);
        let once = ensure_evening_anchors(&plan, &context());
        let twice = ensure_evening_anchors(&once, &context());
        assert_eq!(once, twice);
    }
}
