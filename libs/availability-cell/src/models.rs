// libs/availability-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use shared_models::ids::{AppointmentId, PatientId, ProfessionalId, RecordId};

use crate::time_slot::{ClockHour, DayTime, Interval};

/// 0 = Sunday ... 6 = Saturday, the convention the `availability_rules` table uses.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

// ==============================================================================
// PERSISTED ROWS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRule {
    pub id: RecordId,
    pub professional_id: ProfessionalId,
    pub weekday: u8,
    pub start_time: ClockHour,
    pub end_time: ClockHour,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AvailabilityRule {
    pub fn window_on(&self, date: NaiveDate) -> Option<Interval> {
        Interval::new(self.start_time.on(date), self.end_time.on(date))
    }
}

/// A rule that has passed grid validation but has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAvailabilityRule {
    pub professional_id: ProfessionalId,
    pub weekday: u8,
    pub start_time: ClockHour,
    pub end_time: ClockHour,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateOverride {
    pub id: RecordId,
    pub professional_id: ProfessionalId,
    pub for_date: NaiveDate,
    pub start_time: ClockHour,
    pub end_time: ClockHour,
    pub is_available: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl DateOverride {
    pub fn window(&self) -> Option<Interval> {
        Interval::new(self.start_time.on(self.for_date), self.end_time.on(self.for_date))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewDateOverride {
    pub professional_id: ProfessionalId,
    pub for_date: NaiveDate,
    pub start_time: ClockHour,
    pub end_time: ClockHour,
    pub is_available: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedSlot {
    pub id: RecordId,
    pub professional_id: ProfessionalId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl BlockedSlot {
    pub fn interval(&self) -> Option<Interval> {
        Interval::new(self.starts_at, self.ends_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewBlockedSlot {
    pub professional_id: ProfessionalId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

/// Appointment row as far as scheduling is concerned. Status transitions are owned elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub professional_id: ProfessionalId,
    pub patient_id: PatientId,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
}

impl Appointment {
    /// Saturates at the calendar limit when `duration_minutes` is absurdly large.
    pub fn ends_at(&self) -> DateTime<Utc> {
        Duration::try_minutes(self.duration_minutes.max(0))
            .and_then(|length| self.scheduled_at.checked_add_signed(length))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Only cancelled appointments give their time back.
    pub fn occupies_slot(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }

    pub fn interval(&self) -> Option<Interval> {
        Interval::new(self.scheduled_at, self.ends_at())
    }
}

// ==============================================================================
// DERIVED OUTPUT
// ==============================================================================

/// A bookable window. Recomputed on every query, never stored.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResolvedWindow {
    pub date: NaiveDate,
    pub start_time: DayTime,
    pub end_time: DayTime,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl ResolvedWindow {
    pub fn from_interval(date: NaiveDate, interval: Interval) -> Self {
        Self {
            date,
            start_time: DayTime::within(date, interval.start),
            end_time: DayTime::within(date, interval.end),
            starts_at: interval.start,
            ends_at: interval.end,
            duration_minutes: interval.duration().num_minutes(),
        }
    }

    pub fn interval(&self) -> Interval {
        Interval {
            start: self.starts_at,
            end: self.ends_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverrideDay {
    pub date: NaiveDate,
    pub overrides: Vec<DateOverride>,
}

/// Inclusive calendar range plus the optional duration filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AvailabilityQuery {
    pub professional_id: ProfessionalId,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub duration_minutes: Option<i64>,
    /// Trim anything that starts before this instant.
    pub not_before: Option<DateTime<Utc>>,
}

// ==============================================================================
// REQUEST DTOS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRuleRequest {
    pub weekday: i32,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRuleRequest {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOverrideRequest {
    pub for_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub is_available: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBlockedSlotRequest {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_weekday_index_starts_on_sunday() {
        assert_eq!(weekday_index(NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()), 0);
        assert_eq!(weekday_index(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()), 1);
        assert_eq!(weekday_index(NaiveDate::from_ymd_opt(2025, 3, 8).unwrap()), 6);
    }

    #[test]
    fn test_appointment_occupancy() {
        let mut appointment = Appointment {
            id: AppointmentId::new(),
            professional_id: ProfessionalId::new(),
            patient_id: PatientId::new(),
            scheduled_at: Utc.with_ymd_and_hms(2025, 3, 4, 14, 0, 0).unwrap(),
            duration_minutes: 55,
            status: AppointmentStatus::Confirmed,
        };
        assert!(appointment.occupies_slot());
        assert_eq!(appointment.ends_at(), Utc.with_ymd_and_hms(2025, 3, 4, 14, 55, 0).unwrap());

        appointment.status = AppointmentStatus::Cancelled;
        assert!(!appointment.occupies_slot());
    }

    #[test]
    fn test_corrupt_duration_saturates_end() {
        let appointment = Appointment {
            id: AppointmentId::new(),
            professional_id: ProfessionalId::new(),
            patient_id: PatientId::new(),
            scheduled_at: Utc.with_ymd_and_hms(2025, 3, 4, 14, 0, 0).unwrap(),
            duration_minutes: i64::MAX,
            status: AppointmentStatus::Confirmed,
        };
        assert_eq!(appointment.ends_at(), DateTime::<Utc>::MAX_UTC);
        assert!(appointment.interval().is_some());
    }

    #[test]
    fn test_status_wire_format() {
        let status: AppointmentStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(status, AppointmentStatus::InProgress);
        assert_eq!(status.to_string(), "in_progress");
    }
}
