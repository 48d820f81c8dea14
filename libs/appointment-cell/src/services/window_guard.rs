// libs/appointment-cell/src/services/window_guard.rs
//
// Clock-driven editing window around an appointment. Pure: the caller
// supplies `now`, nothing here reads a clock or touches I/O.

use chrono::{DateTime, Duration, Utc};

use shared_config::SchedulingConfig;

use crate::models::{ActivePhase, Appointment, AppointmentStatus, WindowState, WindowStatus};

/// Live callers re-evaluate this often so the state flips without user action.
pub const RECHECK_AFTER_SECONDS: u32 = 60;

/// Whole minutes from `now` until `until`, rounded up.
fn minutes_left(now: DateTime<Utc>, until: DateTime<Utc>) -> i64 {
    // unix seconds stay in range even between the extreme representable instants
    let seconds = (until.timestamp() - now.timestamp()).max(0);
    (seconds + 59) / 60
}

/// `instant + delta`, pinned to the representable range instead of overflowing.
fn shift(instant: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    instant.checked_add_signed(delta).unwrap_or(if delta < Duration::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

fn minutes_or_max(minutes: i64) -> Duration {
    Duration::try_minutes(minutes.max(0)).unwrap_or(Duration::MAX)
}

fn minutes_phrase(minutes: i64) -> String {
    if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{} minutes", minutes)
    }
}

fn describe_wait(minutes: i64) -> String {
    if minutes >= 60 {
        format!("{}h {}m", minutes / 60, minutes % 60)
    } else {
        minutes_phrase(minutes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingWindowGuard {
    grace: Duration,
}

impl Default for BookingWindowGuard {
    fn default() -> Self {
        Self::from_config(&SchedulingConfig::default())
    }
}

impl BookingWindowGuard {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace: grace.max(Duration::zero()),
        }
    }

    pub fn from_config(config: &SchedulingConfig) -> Self {
        Self::new(minutes_or_max(config.editing_grace_minutes))
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Status of the window `[scheduled_at - grace, scheduled_at + duration + grace]`
    /// at `now`. Both edges are inclusive. Negative durations count as zero and
    /// instants past the calendar limits saturate there.
    pub fn evaluate(&self, scheduled_at: DateTime<Utc>, duration_minutes: i64, now: DateTime<Utc>) -> WindowStatus {
        let start = scheduled_at;
        let end = shift(start, minutes_or_max(duration_minutes));
        let opens_at = shift(start, -self.grace);
        let closes_at = shift(end, self.grace);

        let (state, phase, message) = if now < opens_at {
            let wait = describe_wait(minutes_left(now, opens_at));
            (WindowState::Before, None, format!("Editing opens in {}", wait))
        } else if now <= closes_at {
            if now < start {
                let message = format!("Session starts in {}", minutes_phrase(minutes_left(now, start)));
                (WindowState::Active, Some(ActivePhase::AboutToStart), message)
            } else if now < end {
                (WindowState::Active, Some(ActivePhase::InProgress), "Session in progress".to_string())
            } else {
                let message = match minutes_left(now, closes_at) {
                    0 => "Session ended, editing closes now".to_string(),
                    left => format!("Session ended, editing closes in {}", minutes_phrase(left)),
                };
                (WindowState::Active, Some(ActivePhase::AfterEnd), message)
            }
        } else {
            (WindowState::Expired, None, "Editing window has closed".to_string())
        };

        WindowStatus {
            state,
            phase,
            is_editable: state == WindowState::Active,
            message,
            opens_at,
            closes_at,
            recheck_after_seconds: RECHECK_AFTER_SECONDS,
        }
    }

    pub fn is_editable(&self, scheduled_at: DateTime<Utc>, duration_minutes: i64, now: DateTime<Utc>) -> bool {
        self.evaluate(scheduled_at, duration_minutes, now).is_editable
    }

    /// Like [`evaluate`](Self::evaluate), but a cancelled appointment is never editable.
    pub fn evaluate_appointment(&self, appointment: &Appointment, now: DateTime<Utc>) -> WindowStatus {
        let mut status = self.evaluate(appointment.scheduled_at, appointment.duration_minutes, now);
        if appointment.status == AppointmentStatus::Cancelled {
            status.state = WindowState::Expired;
            status.phase = None;
            status.is_editable = false;
            status.message = "Appointment was cancelled".to_string();
        }
        status
    }
}
