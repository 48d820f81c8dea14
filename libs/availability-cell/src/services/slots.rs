// libs/availability-cell/src/services/slots.rs
use chrono::Duration;

use crate::error::SchedulingError;
use crate::models::{AvailableSlot, ResolvedWindow};

/// Cut resolved windows into fixed-length candidate starts. `step_minutes`
/// defaults to the slot length, giving back-to-back slots.
pub fn slice_slots(
    windows: &[ResolvedWindow],
    duration_minutes: i64,
    step_minutes: Option<i64>,
) -> Result<Vec<AvailableSlot>, SchedulingError> {
    if duration_minutes <= 0 {
        return Err(SchedulingError::Validation(
            "Duration must be a positive number of minutes".to_string(),
        ));
    }
    let step_minutes = step_minutes.unwrap_or(duration_minutes);
    if step_minutes <= 0 {
        return Err(SchedulingError::Validation(
            "Step must be a positive number of minutes".to_string(),
        ));
    }

    // lengths beyond chrono's range can never fit a window
    let Some(length) = Duration::try_minutes(duration_minutes) else {
        return Ok(Vec::new());
    };
    let step = Duration::try_minutes(step_minutes);

    let mut slots = Vec::new();
    for window in windows {
        let mut cursor = window.starts_at;
        while let Some(ends_at) = cursor
            .checked_add_signed(length)
            .filter(|end| *end <= window.ends_at)
        {
            slots.push(AvailableSlot {
                starts_at: cursor,
                ends_at,
                duration_minutes,
            });
            match step.and_then(|step| cursor.checked_add_signed(step)) {
                Some(next) => cursor = next,
                None => break,
            }
        }
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_slot::Interval;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn window(sh: u32, sm: u32, eh: u32, em: u32) -> ResolvedWindow {
        let date = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let interval = Interval::new(
            Utc.with_ymd_and_hms(2025, 3, 4, sh, sm, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 4, eh, em, 0).unwrap(),
        )
        .unwrap();
        ResolvedWindow::from_interval(date, interval)
    }

    #[test]
    fn test_back_to_back_slots() {
        let slots = slice_slots(&[window(13, 0, 14, 0), window(14, 55, 18, 0)], 60, None).unwrap();
        let starts: Vec<String> = slots.iter().map(|s| s.starts_at.format("%H:%M").to_string()).collect();
        assert_eq!(starts, vec!["13:00", "14:55", "15:55", "16:55"]);
    }

    #[test]
    fn test_overlapping_steps() {
        let slots = slice_slots(&[window(9, 0, 10, 0)], 30, Some(15)).unwrap();
        assert_eq!(slots.len(), 3);
        assert!(slots.iter().all(|s| s.ends_at <= window(9, 0, 10, 0).ends_at));
    }

    #[test]
    fn test_rejects_non_positive_lengths() {
        assert!(slice_slots(&[], 0, None).is_err());
        assert!(slice_slots(&[], 30, Some(-5)).is_err());
    }

    #[test]
    fn test_out_of_range_lengths_do_not_panic() {
        assert!(slice_slots(&[window(9, 0, 10, 0)], i64::MAX, None).unwrap().is_empty());

        let single = slice_slots(&[window(9, 0, 10, 0)], 30, Some(i64::MAX)).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].starts_at, window(9, 0, 10, 0).starts_at);
    }
}
