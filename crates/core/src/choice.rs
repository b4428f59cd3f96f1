use serde_json::Value;

use crate::error::PlanError;
use crate::models::{Category, Plan, Slot};
use crate::timecost::parse_cost_text;

const DEFAULT_MEAL_COST: u64 = 800;
const DEFAULT_TRANSIT_ETA_MIN: u32 = 20;

/// Rough per-trip fare for a transit mode.
pub fn estimate_transit_cost(mode: &str) -> u64 {
    let mode = mode.to_lowercase();

    if mode.contains("walk") {
        0
    } else if mode.contains("metro") {
        40
    } else if mode.contains("auto") {
        120
    } else if mode.contains("taxi") || mode.contains("cab") {
        250
    } else {
        100
    }
}

/// Fills the slot at (`day_index`, `slot_index`) with a user-picked
/// alternative and returns the updated plan. The slot's suggestions are
/// dropped and the plan total recomputed.
pub fn apply_choice(
    plan: &Plan,
    day_index: usize,
    slot_index: usize,
    option: &Value,
) -> Result<Plan, PlanError> {
    let out_of_range = PlanError::SlotOutOfRange {
        day: day_index,
        slot: slot_index,
    };
    let day = plan.plan.get(day_index).ok_or(out_of_range.clone())?;
    let current = day.slots.get(slot_index).ok_or(out_of_range)?;

    let previous = slot_index
        .checked_sub(1)
        .and_then(|index| day.slots.get(index));
    let next = day.slots.get(slot_index + 1);

    let mut slot = current.clone();
    match slot.category {
        Category::Restaurant => choose_restaurant(&mut slot, option),
        Category::Attraction => choose_attraction(&mut slot, option),
        Category::Hotel => choose_hotel(&mut slot, option),
        Category::Transit => choose_transit(&mut slot, option, previous, next),
        Category::Other => choose_other(&mut slot, option),
    }
    slot.suggestions = None;

    let mut updated = plan.clone();
    updated.plan[day_index].slots[slot_index] = slot;
    updated.recompute_total();
    Ok(updated)
}

fn choose_restaurant(slot: &mut Slot, option: &Value) {
    let name = option_text(option, "name")
        .or_else(|| non_blank(&slot.place))
        .unwrap_or_else(|| "Selected Restaurant".to_string());
    let for_two = option
        .get("approx_cost_for_two")
        .map(option_cost)
        .unwrap_or(0);

    let old_title = slot.title.to_lowercase();
    slot.title = if old_title.contains("lunch") {
        format!("Lunch at {name}")
    } else if old_title.contains("dinner") {
        format!("Dinner at {name}")
    } else {
        format!("Meal at {name}")
    };
    slot.address = option_text(option, "area").unwrap_or_else(|| slot.address.clone());
    slot.notes = option_text(option, "reason")
        .or_else(|| non_blank(&slot.notes))
        .unwrap_or_else(|| "Picked from suggestions.".to_string());
    slot.cost_min = if for_two > 0 {
        (for_two + 1) / 2
    } else {
        option
            .get("cost_min")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_MEAL_COST)
    };
    slot.place = name;
}

fn choose_attraction(slot: &mut Slot, option: &Value) {
    let name = option_text(option, "name").unwrap_or_else(|| "Selected Attraction".to_string());
    slot.title = name.clone();
    slot.place = name;
    slot.address = option_text(option, "area").unwrap_or_else(|| slot.address.clone());
}

fn choose_hotel(slot: &mut Slot, option: &Value) {
    let name = option_text(option, "name").unwrap_or_else(|| "Selected Hotel".to_string());
    slot.title = if slot.title.to_lowercase().contains("check") {
        format!("Hotel Check-in — {name}")
    } else {
        format!("Hotel — {name}")
    };
    slot.place = name;
    slot.address = option_text(option, "area").unwrap_or_else(|| slot.address.clone());
}

fn choose_transit(slot: &mut Slot, option: &Value, previous: Option<&Slot>, next: Option<&Slot>) {
    let mode = option_text(option, "mode")
        .or_else(|| non_blank(&slot.mode))
        .unwrap_or_else(|| "Taxi".to_string());

    slot.from = option_text(option, "from")
        .or_else(|| non_blank(&slot.from))
        .or_else(|| previous.and_then(landmark))
        .unwrap_or_default();
    slot.to = option_text(option, "to")
        .or_else(|| non_blank(&slot.to))
        .or_else(|| next.and_then(landmark))
        .unwrap_or_default();
    slot.title = option_text(option, "title")
        .or_else(|| non_blank(&slot.title))
        .unwrap_or_else(|| {
            let to = if slot.to.is_empty() { "next stop" } else { slot.to.as_str() };
            format!("Transit to {to}")
        });
    slot.eta_min = option
        .get("eta_min")
        .and_then(Value::as_u64)
        .and_then(|minutes| u32::try_from(minutes).ok())
        .or(slot.eta_min)
        .or(Some(DEFAULT_TRANSIT_ETA_MIN));
    slot.cost_min = option
        .get("cost_min")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| estimate_transit_cost(&mode));
    slot.mode = title_case(&mode);
}

fn choose_other(slot: &mut Slot, option: &Value) {
    if let Some(name) = option_text(option, "name") {
        slot.title = name.clone();
        slot.place = name;
        slot.address = option_text(option, "area").unwrap_or_else(|| slot.address.clone());
    }
}

fn landmark(slot: &Slot) -> Option<String> {
    non_blank(&slot.place).or_else(|| non_blank(&slot.title))
}

fn option_text(option: &Value, key: &str) -> Option<String> {
    option
        .get(key)
        .and_then(Value::as_str)
        .and_then(non_blank)
}

fn option_cost(value: &Value) -> u64 {
    match value {
        Value::String(text) => parse_cost_text(text),
        other => other.as_f64().map(|amount| amount.max(0.0).round() as u64).unwrap_or(0),
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn title_case(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut at_word_start = true;

    for ch in value.chars() {
        if at_word_start && ch.is_alphanumeric() {
            result.extend(ch.to_uppercase());
        } else {
            result.push(ch);
        }
        at_word_start = !ch.is_alphanumeric();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Day;
    use serde_json::json;

    fn plan_with(slots: Vec<Slot>) -> Plan {
        let mut plan = Plan {
            currency: "INR".to_string(),
            total_min_cost: 0,
            plan: vec![Day {
                day: 1,
                date: String::new(),
                slots,
            }],
        };
        plan.recompute_total();
        plan
    }

    fn slot(title: &str, category: Category) -> Slot {
        Slot {
            title: title.to_string(),
            place: title.to_string(),
            category,
            ..Slot::default()
        }
    }

    #[test]
    fn restaurant_choice_uses_half_the_cost_for_two() {
        let mut dinner = slot("Dinner (choose)", Category::Restaurant);
        dinner.place.clear();
        dinner.suggestions = Some(vec![json!({ "name": "LMB" })]);
        let plan = plan_with(vec![slot("Fort", Category::Attraction), dinner]);

        let updated = apply_choice(
            &plan,
            0,
            1,
            &json!({ "name": "LMB", "area": "Johari Bazaar", "approx_cost_for_two": "₹1,200–₹1,600" }),
        )
        .expect("choice should apply");

        let chosen = &updated.plan[0].slots[1];
        assert_eq!(chosen.title, "Dinner at LMB");
        assert_eq!(chosen.place, "LMB");
        assert_eq!(chosen.address, "Johari Bazaar");
        assert_eq!(chosen.cost_min, 700);
        assert_eq!(chosen.suggestions, None);
        assert_eq!(updated.total_min_cost, 700);
    }

    #[test]
    fn restaurant_choice_falls_back_to_default_meal_cost() {
        let plan = plan_with(vec![slot("Lunch break", Category::Restaurant)]);
        let updated = apply_choice(&plan, 0, 0, &json!({ "name": "Tapri" })).expect("choice");

        let chosen = &updated.plan[0].slots[0];
        assert_eq!(chosen.title, "Lunch at Tapri");
        assert_eq!(chosen.notes, "Picked from suggestions.");
        assert_eq!(chosen.cost_min, 800);
    }

    #[test]
    fn hotel_choice_keeps_check_in_wording() {
        let plan = plan_with(vec![slot("Hotel check-in", Category::Hotel)]);
        let updated = apply_choice(&plan, 0, 0, &json!({ "name": "Samode Haveli" })).expect("choice");
        assert_eq!(updated.plan[0].slots[0].title, "Hotel Check-in — Samode Haveli");
    }

    #[test]
    fn transit_choice_fills_route_from_neighbours() {
        let transit = Slot {
            title: String::new(),
            place: String::new(),
            category: Category::Transit,
            ..Slot::default()
        };
        let plan = plan_with(vec![
            slot("Amber Fort", Category::Attraction),
            transit,
            slot("Jal Mahal", Category::Attraction),
        ]);

        let updated = apply_choice(&plan, 0, 1, &json!({ "mode": "auto rickshaw" })).expect("choice");

        let chosen = &updated.plan[0].slots[1];
        assert_eq!(chosen.mode, "Auto Rickshaw");
        assert_eq!(chosen.from, "Amber Fort");
        assert_eq!(chosen.to, "Jal Mahal");
        assert_eq!(chosen.title, "Transit to Jal Mahal");
        assert_eq!(chosen.eta_min, Some(20));
        assert_eq!(chosen.cost_min, 120);
    }

    #[test]
    fn out_of_range_indices_are_reported() {
        let plan = plan_with(vec![slot("Fort", Category::Attraction)]);
        assert_eq!(
            apply_choice(&plan, 0, 4, &json!({})),
            Err(PlanError::SlotOutOfRange { day: 0, slot: 4 })
        );
        assert_eq!(
            apply_choice(&plan, 2, 0, &json!({})),
            Err(PlanError::SlotOutOfRange { day: 2, slot: 0 })
        );
    }

    #[test]
    fn transit_fares() {
        assert_eq!(estimate_transit_cost("Walk"), 0);
        assert_eq!(estimate_transit_cost("Metro"), 40);
        assert_eq!(estimate_transit_cost("Cab"), 250);
        assert_eq!(estimate_transit_cost("Bus"), 100);
    }
}
