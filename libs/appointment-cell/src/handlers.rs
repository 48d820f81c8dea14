// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_models::ids::AppointmentId;
use shared_utils::clock::ClockSource;
use shared_utils::identity::IdentityGateway;

use crate::gateway::SupabaseAppointmentGateway;
use crate::models::{Appointment, UpsertClinicalNoteRequest};
use crate::services::{join_decision, BookingWindowGuard, ClinicalNoteService};

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub clock: Arc<dyn ClockSource>,
    pub identity: Arc<dyn IdentityGateway>,
}

impl AppointmentState {
    pub fn new(
        config: Arc<AppConfig>,
        clock: Arc<dyn ClockSource>,
        identity: Arc<dyn IdentityGateway>,
    ) -> Self {
        Self { config, clock, identity }
    }

    fn guard(&self) -> BookingWindowGuard {
        BookingWindowGuard::from_config(&self.config.scheduling)
    }

    fn notes(&self, token: &str) -> ClinicalNoteService {
        let gateway = SupabaseAppointmentGateway::new(&self.config, Some(token.to_string()));
        ClinicalNoteService::new(Arc::new(gateway), self.guard())
    }
}

/// How the caller relates to an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Participant {
    Professional,
    Patient,
    Admin,
}

fn participant(state: &AppointmentState, user: &User, appointment: &Appointment) -> Result<Participant, AppError> {
    let role = state.identity.resolve_role(user)?;
    let found = match role {
        Role::Admin => Some(Participant::Admin),
        Role::Professional if user.id == appointment.professional_id.to_string() => Some(Participant::Professional),
        Role::Patient if user.id == appointment.patient_id.to_string() => Some(Participant::Patient),
        _ => None,
    };
    found.ok_or_else(|| AppError::Forbidden("Not a participant of this appointment".to_string()))
}

#[axum::debug_handler]
pub async fn get_window(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment_id: AppointmentId = appointment_id.parse()?;
    let notes = state.notes(auth.token());

    let appointment = notes.appointment(appointment_id).await?;
    participant(&state, &user, &appointment)?;

    let window = notes.window(&appointment, state.clock.now());
    Ok(Json(json!(window)))
}

#[axum::debug_handler]
pub async fn get_clinical_note(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment_id: AppointmentId = appointment_id.parse()?;
    let notes = state.notes(auth.token());

    let appointment = notes.appointment(appointment_id).await?;
    if participant(&state, &user, &appointment)? == Participant::Patient {
        return Err(AppError::Forbidden("Clinical notes are not visible to patients".to_string()));
    }

    let note = notes.get_note(&appointment).await?;
    Ok(Json(json!(note)))
}

#[axum::debug_handler]
pub async fn put_clinical_note(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpsertClinicalNoteRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment_id: AppointmentId = appointment_id.parse()?;
    let notes = state.notes(auth.token());

    let appointment = notes.appointment(appointment_id).await?;
    if participant(&state, &user, &appointment)? != Participant::Professional {
        return Err(AppError::Forbidden(
            "Only the appointment's professional can write clinical notes".to_string(),
        ));
    }

    let now = state.clock.now();
    let note = notes.save_note(&appointment, request, now).await?;

    Ok(Json(json!({
        "note": note,
        "window": notes.window(&appointment, now),
    })))
}

#[axum::debug_handler]
pub async fn join_session(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment_id: AppointmentId = appointment_id.parse()?;
    let notes = state.notes(auth.token());

    let appointment = notes.appointment(appointment_id).await?;
    let who = participant(&state, &user, &appointment)?;
    if who == Participant::Admin {
        return Err(AppError::Forbidden("Only participants can join the session".to_string()));
    }

    let decision = join_decision(&state.guard(), &appointment, state.clock.now());
    debug!("Join {:?} for appointment {}: allowed={}", who, appointment.id, decision.allowed);

    Ok(Json(json!(decision)))
}
