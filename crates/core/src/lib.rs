pub mod anchors;
pub mod choice;
pub mod envelope;
pub mod error;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod timecost;

pub use anchors::ensure_evening_anchors;
pub use choice::{apply_choice, estimate_transit_cost};
pub use envelope::loose_parse_json;
pub use error::PlanError;
pub use models::*;
pub use normalize::{normalize_day, normalize_plan, normalize_slot};
pub use reconcile::{canonicalize, reconcile_day_count};
pub use timecost::{add_days_iso, make_range, parse_cost_range, parse_time};
