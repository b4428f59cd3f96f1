use std::num::NonZeroUsize;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::PlanError;

pub const DEFAULT_CURRENCY: &str = "INR";
pub const MAX_TRIP_DAYS: usize = 60;
pub const MAX_SUGGESTIONS: usize = 3;

static LEADING_INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(-?\d+)").expect("valid day count regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[default]
    Attraction,
    Hotel,
    Restaurant,
    Transit,
    #[serde(other)]
    Other,
}

impl Category {
    /// Explicit category as written by the model. Blank values yield `None`
    /// so the caller can fall back to title inference.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "" => None,
            "attraction" | "sight" | "sightseeing" => Some(Self::Attraction),
            "hotel" | "stay" | "lodging" => Some(Self::Hotel),
            "restaurant" | "food" | "meal" => Some(Self::Restaurant),
            "transit" | "transport" | "travel" => Some(Self::Transit),
            _ => Some(Self::Other),
        }
    }

    /// Keyword rules over the lower-cased title, first match wins.
    pub fn infer_from_title(title: &str) -> Self {
        let lower = title.to_lowercase();

        if contains_any(&lower, &["check-in", "hotel"]) {
            Self::Hotel
        } else if contains_any(&lower, &["lunch", "dinner", "cafe"]) {
            Self::Restaurant
        } else if contains_any(&lower, &["drive", "transfer"]) {
            Self::Transit
        } else {
            Self::Attraction
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attraction => "Attraction",
            Self::Hotel => "Hotel",
            Self::Restaurant => "Restaurant",
            Self::Transit => "Transit",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub place: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub cost_min: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_min: Option<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Day {
    pub day: u32,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub slots: Vec<Slot>,
}

impl Day {
    pub fn subtotal(&self) -> u64 {
        self.slots
            .iter()
            .map(|slot| slot.cost_min)
            .fold(0, u64::saturating_add)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub currency: String,
    pub total_min_cost: u64,
    pub plan: Vec<Day>,
}

impl Plan {
    pub fn slot_count(&self) -> usize {
        self.plan.iter().map(|day| day.slots.len()).sum()
    }

    pub fn recompute_total(&mut self) {
        self.total_min_cost = self
            .plan
            .iter()
            .map(Day::subtotal)
            .fold(0, u64::saturating_add);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannerItem {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: Category,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Trip parameters collected by the planner UI. Only the day count feeds the
/// algorithms; everything else is prompt and placeholder text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripContext {
    #[serde(default, deserialize_with = "lenient_text")]
    pub destination: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub origin: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub days: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub nights: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub dates: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub people: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub travel_type: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub budget: String,
    #[serde(default, alias = "plannerItems", skip_serializing_if = "Vec::is_empty")]
    pub planner: Vec<PlannerItem>,
}

impl TripContext {
    /// Requested day count. `Ok(None)` when the request carries no day count
    /// at all; zero, negative, non-numeric or oversized counts are rejected.
    pub fn expected_days(&self) -> Result<Option<NonZeroUsize>, PlanError> {
        let raw = self.days.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        let parsed = LEADING_INTEGER
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .ok_or_else(|| PlanError::InvalidDayCount(raw.to_string()))?;

        if parsed < 1 || parsed as u64 > MAX_TRIP_DAYS as u64 {
            return Err(PlanError::InvalidDayCount(raw.to_string()));
        }

        Ok(NonZeroUsize::new(parsed as usize))
    }

    pub fn restaurants(&self) -> impl Iterator<Item = &PlannerItem> {
        self.planner
            .iter()
            .filter(|item| item.kind == Category::Restaurant)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedItinerary {
    pub name: String,
    #[serde(default)]
    pub trip_details: TripContext,
    #[serde(default)]
    pub planner: Vec<PlannerItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_plan: Option<Plan>,
}

impl SavedItinerary {
    /// Trip details merged with the saved planner selections, as sent to the
    /// generation prompt.
    pub fn trip_context(&self) -> TripContext {
        let mut context = self.trip_details.clone();
        if context.planner.is_empty() {
            context.planner = self.planner.clone();
        }
        context
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => String::new(),
    })
}

pub(crate) fn contains_any(input: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| input.contains(needle))
}
