use thiserror::Error;

use crate::models::MAX_TRIP_DAYS;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The generated payload carried no list-shaped `plan` (or `days`) field.
    #[error("no plan generated")]
    NoPlanGenerated,

    #[error("invalid day count {0:?}: expected a whole number between 1 and {MAX_TRIP_DAYS}")]
    InvalidDayCount(String),

    #[error("no slot {slot} on day index {day}")]
    SlotOutOfRange { day: usize, slot: usize },
}
