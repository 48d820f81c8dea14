use chrono::{DateTime, Utc};

use crate::models::{Appointment, JoinDecision};
use crate::services::window_guard::BookingWindowGuard;

/// Meeting join uses the same predicate as clinical-note editing.
pub fn join_decision(guard: &BookingWindowGuard, appointment: &Appointment, now: DateTime<Utc>) -> JoinDecision {
    let window = guard.evaluate_appointment(appointment, now);
    JoinDecision {
        allowed: window.is_editable,
        window,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use shared_models::ids::{AppointmentId, PatientId, ProfessionalId};

    use crate::models::AppointmentStatus;

    #[test]
    fn test_join_follows_window() {
        let scheduled_at = Utc.with_ymd_and_hms(2025, 3, 4, 14, 0, 0).unwrap();
        let appointment = Appointment {
            id: AppointmentId::new(),
            professional_id: ProfessionalId::new(),
            patient_id: PatientId::new(),
            scheduled_at,
            duration_minutes: 30,
            status: AppointmentStatus::Confirmed,
        };
        let guard = BookingWindowGuard::default();

        assert!(!join_decision(&guard, &appointment, scheduled_at - Duration::minutes(6)).allowed);
        assert!(join_decision(&guard, &appointment, scheduled_at - Duration::minutes(5)).allowed);
        assert!(join_decision(&guard, &appointment, scheduled_at + Duration::minutes(35)).allowed);
        assert!(!join_decision(&guard, &appointment, scheduled_at + Duration::minutes(36)).allowed);
    }
}
