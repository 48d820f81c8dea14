use thiserror::Error;

use shared_models::error::AppError;
use shared_models::ids::{InvalidId, RecordId};

use crate::time_slot::ClockHour;

/// A candidate rule collides with a rule already stored for the same professional and weekday.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Rule {candidate_start}-{candidate_end} overlaps existing rule {existing_start}-{existing_end} on weekday {weekday}")]
pub struct OverlapError {
    pub weekday: u8,
    pub candidate_start: ClockHour,
    pub candidate_end: ClockHour,
    pub existing_id: RecordId,
    pub existing_start: ClockHour,
    pub existing_end: ClockHour,
}

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Overlap(#[from] OverlapError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] anyhow::Error),
}

impl From<InvalidId> for SchedulingError {
    fn from(err: InvalidId) -> Self {
        SchedulingError::Validation(err.to_string())
    }
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::Validation(msg) => AppError::ValidationError(msg),
            SchedulingError::Overlap(overlap) => AppError::Conflict(overlap.to_string()),
            SchedulingError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            SchedulingError::Persistence(e) => AppError::Database(e.to_string()),
        }
    }
}
