// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;
use shared_models::ids::{AppointmentId, PatientId, ProfessionalId, RecordId};

pub use availability_cell::models::{Appointment, AppointmentStatus};

// ==============================================================================
// BOOKING WINDOW
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowState {
    Before,
    Active,
    Expired,
}

/// Display-only refinement of [`WindowState::Active`]. Every phase is equally editable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivePhase {
    AboutToStart,
    InProgress,
    AfterEnd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowStatus {
    pub state: WindowState,
    pub phase: Option<ActivePhase>,
    pub is_editable: bool,
    pub message: String,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    /// How often a live caller should re-evaluate.
    pub recheck_after_seconds: u32,
}

// ==============================================================================
// CLINICAL NOTES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalNote {
    pub id: RecordId,
    pub appointment_id: AppointmentId,
    pub professional_id: ProfessionalId,
    pub patient_id: PatientId,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewClinicalNote {
    pub appointment_id: AppointmentId,
    pub professional_id: ProfessionalId,
    pub patient_id: PatientId,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertClinicalNoteRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinDecision {
    pub allowed: bool,
    pub window: WindowStatus,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Clinical note not found")]
    NoteNotFound,

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("{0}")]
    WindowClosed(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for AppointmentError {
    fn from(err: anyhow::Error) -> Self {
        AppointmentError::DatabaseError(err.to_string())
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound | AppointmentError::NoteNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
            AppointmentError::WindowClosed(message) => AppError::Conflict(message),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_window_state_wire_format() {
        assert_eq!(serde_json::to_value(WindowState::Before).unwrap(), "BEFORE");
        assert_eq!(serde_json::to_value(ActivePhase::AfterEnd).unwrap(), "after_end");
    }

    #[test]
    fn test_closed_window_is_conflict() {
        let err = AppError::from(AppointmentError::WindowClosed("Editing window has closed".into()));
        assert_matches!(err, AppError::Conflict(msg) if msg == "Editing window has closed");
        assert_matches!(AppError::from(AppointmentError::NotFound), AppError::NotFound(_));
    }
}
