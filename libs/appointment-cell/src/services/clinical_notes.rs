// libs/appointment-cell/src/services/clinical_notes.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use shared_models::ids::AppointmentId;

use crate::gateway::AppointmentGateway;
use crate::models::{
    Appointment, AppointmentError, ClinicalNote, NewClinicalNote, UpsertClinicalNoteRequest,
    WindowStatus,
};
use crate::services::window_guard::BookingWindowGuard;

/// Clinical documentation gated by the booking window. Who may call what is
/// decided by the handlers.
pub struct ClinicalNoteService {
    gateway: Arc<dyn AppointmentGateway>,
    guard: BookingWindowGuard,
}

impl ClinicalNoteService {
    pub fn new(gateway: Arc<dyn AppointmentGateway>, guard: BookingWindowGuard) -> Self {
        Self { gateway, guard }
    }

    pub async fn appointment(&self, appointment_id: AppointmentId) -> Result<Appointment, AppointmentError> {
        self.gateway
            .get_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    pub fn window(&self, appointment: &Appointment, now: DateTime<Utc>) -> WindowStatus {
        self.guard.evaluate_appointment(appointment, now)
    }

    pub async fn get_note(&self, appointment: &Appointment) -> Result<ClinicalNote, AppointmentError> {
        self.gateway
            .get_note(appointment.id)
            .await?
            .ok_or(AppointmentError::NoteNotFound)
    }

    pub async fn save_note(
        &self,
        appointment: &Appointment,
        request: UpsertClinicalNoteRequest,
        now: DateTime<Utc>,
    ) -> Result<ClinicalNote, AppointmentError> {
        let window = self.window(appointment, now);
        if !window.is_editable {
            warn!(
                "Rejected clinical note edit for appointment {}: {}",
                appointment.id, window.message
            );
            return Err(AppointmentError::WindowClosed(window.message));
        }

        let content = request.content.trim();
        if content.is_empty() {
            return Err(AppointmentError::ValidationError(
                "Clinical note content cannot be empty".to_string(),
            ));
        }

        let note = self
            .gateway
            .upsert_note(NewClinicalNote {
                appointment_id: appointment.id,
                professional_id: appointment.professional_id,
                patient_id: appointment.patient_id,
                content: content.to_string(),
            })
            .await?;

        info!("Clinical note saved for appointment {}", appointment.id);
        Ok(note)
    }
}
