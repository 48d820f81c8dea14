// libs/appointment-cell/src/gateway.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::json;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::ids::AppointmentId;

use crate::models::{Appointment, ClinicalNote, NewClinicalNote};

#[async_trait]
pub trait AppointmentGateway: Send + Sync {
    async fn get_appointment(&self, appointment_id: AppointmentId) -> Result<Option<Appointment>>;
    async fn get_note(&self, appointment_id: AppointmentId) -> Result<Option<ClinicalNote>>;
    /// Insert or replace the single note attached to an appointment.
    async fn upsert_note(&self, note: NewClinicalNote) -> Result<ClinicalNote>;
}

pub struct SupabaseAppointmentGateway {
    supabase: SupabaseClient,
    auth_token: Option<String>,
}

impl SupabaseAppointmentGateway {
    pub fn new(config: &AppConfig, auth_token: Option<String>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            auth_token,
        }
    }

    fn upsert_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("return=representation,resolution=merge-duplicates"),
        );
        headers
    }
}

#[async_trait]
impl AppointmentGateway for SupabaseAppointmentGateway {
    async fn get_appointment(&self, appointment_id: AppointmentId) -> Result<Option<Appointment>> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn get_note(&self, appointment_id: AppointmentId) -> Result<Option<ClinicalNote>> {
        let path = format!("/rest/v1/clinical_notes?appointment_id=eq.{}", appointment_id);
        let rows: Vec<ClinicalNote> = self
            .supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_note(&self, note: NewClinicalNote) -> Result<ClinicalNote> {
        debug!("Upserting clinical note for appointment {}", note.appointment_id);

        let body = json!({
            "appointment_id": note.appointment_id,
            "professional_id": note.professional_id,
            "patient_id": note.patient_id,
            "content": note.content,
            "updated_at": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        });

        let rows: Vec<ClinicalNote> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/clinical_notes?on_conflict=appointment_id",
                self.auth_token.as_deref(),
                Some(body),
                Some(Self::upsert_headers()),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("Failed to save clinical note: no row returned"))
    }
}
