// libs/availability-cell/src/gateway.rs
//
// Persistence boundary for the scheduling core. Every method takes canonical
// ids; the Supabase implementation is the only place table names and
// PostgREST filter syntax appear.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::ids::{ProfessionalId, RecordId};

use crate::models::{
    Appointment, AvailabilityRule, BlockedSlot, DateOverride, NewAvailabilityRule,
    NewBlockedSlot, NewDateOverride,
};
use crate::time_slot::ClockHour;

/// Longest appointment the range query looks back for. An appointment that
/// starts before the range but runs into it must still be subtracted.
///
/// Sessions longer than this that start before the range are not fetched and
/// so do not block time inside it. Appointment lengths are capped well below
/// this by the booking flow that owns the `appointments` table.
pub const APPOINTMENT_LOOKBACK_HOURS: i64 = 24;

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn professional_exists(&self, professional_id: ProfessionalId) -> Result<bool>;

    async fn list_rules(&self, professional_id: ProfessionalId, weekday: Option<u8>) -> Result<Vec<AvailabilityRule>>;
    async fn get_rule(&self, rule_id: RecordId) -> Result<Option<AvailabilityRule>>;
    async fn insert_rule(&self, rule: NewAvailabilityRule) -> Result<AvailabilityRule>;
    async fn update_rule(&self, rule_id: RecordId, start_time: ClockHour, end_time: ClockHour) -> Result<AvailabilityRule>;
    async fn delete_rule(&self, professional_id: ProfessionalId, rule_id: RecordId) -> Result<bool>;

    /// Overrides with `for_date` inside the inclusive bounds.
    async fn list_overrides(
        &self,
        professional_id: ProfessionalId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DateOverride>>;
    async fn insert_override(&self, entry: NewDateOverride) -> Result<DateOverride>;
    async fn delete_override(&self, professional_id: ProfessionalId, override_id: RecordId) -> Result<bool>;

    /// Blocked slots intersecting `[from, to)`.
    async fn list_blocked_slots(
        &self,
        professional_id: ProfessionalId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<BlockedSlot>>;
    async fn insert_blocked_slot(&self, slot: NewBlockedSlot) -> Result<BlockedSlot>;
    async fn delete_blocked_slot(&self, professional_id: ProfessionalId, blocked_id: RecordId) -> Result<bool>;

    /// Non-cancelled appointments that may intersect `[from, to)`.
    async fn list_appointments(
        &self,
        professional_id: ProfessionalId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>>;
}

fn timestamp(instant: DateTime<Utc>) -> String {
    // `Z` suffix keeps `+` out of the query string
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn first_row<T>(mut rows: Vec<T>, what: &str) -> Result<T> {
    if rows.is_empty() {
        return Err(anyhow!("Failed to write {}: no row returned", what));
    }
    Ok(rows.swap_remove(0))
}

pub struct SupabaseGateway {
    supabase: SupabaseClient,
    auth_token: Option<String>,
}

impl SupabaseGateway {
    pub fn new(config: &AppConfig, auth_token: Option<String>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            auth_token,
        }
    }

    fn token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    async fn select<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        self.supabase.request(Method::GET, path, self.token(), None).await
    }

    async fn insert<T: serde::de::DeserializeOwned>(&self, table: &str, body: Value) -> Result<Vec<T>> {
        self.supabase
            .request_with_headers(
                Method::POST,
                &format!("/rest/v1/{}", table),
                self.token(),
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
    }

    async fn delete_owned(&self, table: &str, professional_id: ProfessionalId, id: RecordId) -> Result<bool> {
        let path = format!(
            "/rest/v1/{}?id=eq.{}&professional_id=eq.{}",
            table, id, professional_id
        );
        let deleted: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::DELETE,
                &path,
                self.token(),
                None,
                Some(SupabaseClient::return_representation()),
            )
            .await?;
        Ok(!deleted.is_empty())
    }
}

#[async_trait]
impl PersistenceGateway for SupabaseGateway {
    async fn professional_exists(&self, professional_id: ProfessionalId) -> Result<bool> {
        let path = format!("/rest/v1/professionals?id=eq.{}&select=id", professional_id);
        let rows: Vec<Value> = self.select(&path).await?;
        Ok(!rows.is_empty())
    }

    async fn list_rules(&self, professional_id: ProfessionalId, weekday: Option<u8>) -> Result<Vec<AvailabilityRule>> {
        let mut path = format!("/rest/v1/availability_rules?professional_id=eq.{}", professional_id);
        if let Some(day) = weekday {
            path.push_str(&format!("&weekday=eq.{}", day));
        }
        path.push_str("&order=weekday.asc,start_time.asc");

        let rules = self.select(&path).await?;
        debug!("Fetched {} availability rules for {}", rules.len(), professional_id);
        Ok(rules)
    }

    async fn get_rule(&self, rule_id: RecordId) -> Result<Option<AvailabilityRule>> {
        let path = format!("/rest/v1/availability_rules?id=eq.{}", rule_id);
        let rows: Vec<AvailabilityRule> = self.select(&path).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_rule(&self, rule: NewAvailabilityRule) -> Result<AvailabilityRule> {
        let body = json!({
            "professional_id": rule.professional_id,
            "weekday": rule.weekday,
            "start_time": rule.start_time,
            "end_time": rule.end_time,
            "created_at": timestamp(Utc::now()),
        });
        first_row(self.insert("availability_rules", body).await?, "availability rule")
    }

    async fn update_rule(&self, rule_id: RecordId, start_time: ClockHour, end_time: ClockHour) -> Result<AvailabilityRule> {
        let path = format!("/rest/v1/availability_rules?id=eq.{}", rule_id);
        let rows: Vec<AvailabilityRule> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                self.token(),
                Some(json!({ "start_time": start_time, "end_time": end_time })),
                Some(SupabaseClient::return_representation()),
            )
            .await?;
        first_row(rows, "availability rule")
    }

    async fn delete_rule(&self, professional_id: ProfessionalId, rule_id: RecordId) -> Result<bool> {
        self.delete_owned("availability_rules", professional_id, rule_id).await
    }

    async fn list_overrides(
        &self,
        professional_id: ProfessionalId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DateOverride>> {
        let mut path = format!("/rest/v1/date_overrides?professional_id=eq.{}", professional_id);
        if let Some(from) = from {
            path.push_str(&format!("&for_date=gte.{}", from));
        }
        if let Some(to) = to {
            path.push_str(&format!("&for_date=lte.{}", to));
        }
        path.push_str("&order=for_date.asc,start_time.asc");
        self.select(&path).await
    }

    async fn insert_override(&self, entry: NewDateOverride) -> Result<DateOverride> {
        let body = json!({
            "professional_id": entry.professional_id,
            "for_date": entry.for_date,
            "start_time": entry.start_time,
            "end_time": entry.end_time,
            "is_available": entry.is_available,
            "reason": entry.reason,
            "created_at": timestamp(Utc::now()),
        });
        first_row(self.insert("date_overrides", body).await?, "date override")
    }

    async fn delete_override(&self, professional_id: ProfessionalId, override_id: RecordId) -> Result<bool> {
        self.delete_owned("date_overrides", professional_id, override_id).await
    }

    async fn list_blocked_slots(
        &self,
        professional_id: ProfessionalId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<BlockedSlot>> {
        let mut path = format!("/rest/v1/blocked_slots?professional_id=eq.{}", professional_id);
        if let Some(to) = to {
            path.push_str(&format!("&starts_at=lt.{}", timestamp(to)));
        }
        if let Some(from) = from {
            path.push_str(&format!("&ends_at=gt.{}", timestamp(from)));
        }
        path.push_str("&order=starts_at.asc");
        self.select(&path).await
    }

    async fn insert_blocked_slot(&self, slot: NewBlockedSlot) -> Result<BlockedSlot> {
        let body = json!({
            "professional_id": slot.professional_id,
            "starts_at": timestamp(slot.starts_at),
            "ends_at": timestamp(slot.ends_at),
            "reason": slot.reason,
            "created_at": timestamp(Utc::now()),
        });
        first_row(self.insert("blocked_slots", body).await?, "blocked slot")
    }

    async fn delete_blocked_slot(&self, professional_id: ProfessionalId, blocked_id: RecordId) -> Result<bool> {
        self.delete_owned("blocked_slots", professional_id, blocked_id).await
    }

    async fn list_appointments(
        &self,
        professional_id: ProfessionalId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>> {
        let lookback = from
            .checked_sub_signed(Duration::hours(APPOINTMENT_LOOKBACK_HOURS))
            .unwrap_or(from);
        let path = format!(
            "/rest/v1/appointments?professional_id=eq.{}&scheduled_at=gte.{}&scheduled_at=lt.{}&status=neq.cancelled&order=scheduled_at.asc",
            professional_id,
            timestamp(lookback),
            timestamp(to)
        );
        let appointments: Vec<Appointment> = self.select(&path).await?;

        // the lookback over-fetches; keep only what actually reaches the range
        Ok(appointments
            .into_iter()
            .filter(|apt| apt.ends_at() > from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shared_utils::test_utils::TestConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_timestamp_has_no_plus_sign() {
        let instant = Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap();
        assert_eq!(timestamp(instant), "2025-03-03T10:00:00Z");
    }

    #[test]
    fn test_first_row_requires_a_row() {
        assert!(first_row::<u8>(vec![], "thing").is_err());
        assert_eq!(first_row(vec![7, 8], "thing").unwrap(), 7);
    }

    #[tokio::test]
    async fn test_appointments_starting_within_lookback_are_kept() {
        let mock_server = MockServer::start().await;
        let professional_id = ProfessionalId::new();
        let range_start = Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap();

        let appointment = |scheduled_at: &str, duration_minutes: i64| {
            json!({
                "id": uuid::Uuid::new_v4(),
                "professional_id": professional_id,
                "patient_id": uuid::Uuid::new_v4(),
                "scheduled_at": scheduled_at,
                "duration_minutes": duration_minutes,
                "status": "confirmed"
            })
        };

        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("scheduled_at", "gte.2025-03-03T00:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                // overnight session running two hours into the range
                appointment("2025-03-03T23:00:00Z", 180),
                // finished before the range opens
                appointment("2025-03-03T10:00:00Z", 60),
            ])))
            .mount(&mock_server)
            .await;

        let config = TestConfig::with_supabase_url(mock_server.uri()).to_arc();
        let gateway = SupabaseGateway::new(&config, None);
        let kept = gateway
            .list_appointments(professional_id, range_start, range_start + Duration::days(1))
            .await
            .unwrap();

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].ends_at(), Utc.with_ymd_and_hms(2025, 3, 4, 2, 0, 0).unwrap());
    }
}
