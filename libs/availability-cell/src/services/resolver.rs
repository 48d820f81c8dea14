// libs/availability-cell/src/services/resolver.rs
//
// Turns weekly rules, date overrides, blocked slots and booked appointments
// into bookable windows. `resolve_day` and `resolve_range` are pure; the
// `AvailabilityResolver` wraps them with the gateway fetch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use shared_models::ids::ProfessionalId;

use crate::error::SchedulingError;
use crate::gateway::PersistenceGateway;
use crate::models::{
    weekday_index, Appointment, AvailabilityQuery, AvailabilityRule, BlockedSlot, DateOverride,
    ResolvedWindow,
};
use crate::time_slot::{ClockHour, Interval};

/// Everything the resolver reads for one professional and one date range.
#[derive(Debug, Clone, Default)]
pub struct AvailabilitySnapshot {
    pub rules: Vec<AvailabilityRule>,
    pub overrides: Vec<DateOverride>,
    pub blocked: Vec<BlockedSlot>,
    pub appointments: Vec<Appointment>,
}

/// Base windows for `date` before anything is subtracted.
///
/// Available overrides on the date replace the weekly rules outright. Without
/// any, the rules stand.
fn base_windows(date: NaiveDate, snapshot: &AvailabilitySnapshot) -> Vec<Interval> {
    let weekday = weekday_index(date);

    let opened: Vec<Interval> = snapshot
        .overrides
        .iter()
        .filter(|o| o.for_date == date && o.is_available)
        .filter_map(DateOverride::window)
        .collect();

    if !opened.is_empty() {
        return Interval::merge(opened);
    }

    let from_rules = snapshot
        .rules
        .iter()
        .filter(|rule| rule.weekday == weekday)
        .filter_map(|rule| rule.window_on(date))
        .collect();
    Interval::merge(from_rules)
}

/// Spans removed from the base: unavailable overrides, blocked slots and
/// occupied appointments, all clipped to the day.
fn cuts_for(date: NaiveDate, snapshot: &AvailabilitySnapshot) -> Vec<Interval> {
    let day = Interval::day(date);

    let closed = snapshot
        .overrides
        .iter()
        .filter(|o| o.for_date == date && !o.is_available)
        .filter_map(DateOverride::window);

    let blocked = snapshot.blocked.iter().filter_map(BlockedSlot::interval);

    let booked = snapshot
        .appointments
        .iter()
        .filter(|apt| apt.occupies_slot())
        .filter_map(Appointment::interval);

    closed
        .chain(blocked)
        .chain(booked)
        .filter_map(|cut| cut.clamp_to(&day))
        .collect()
}

pub fn resolve_day(
    date: NaiveDate,
    snapshot: &AvailabilitySnapshot,
    duration_minutes: Option<i64>,
    not_before: Option<DateTime<Utc>>,
) -> Vec<ResolvedWindow> {
    let base = base_windows(date, snapshot);
    if base.is_empty() {
        return Vec::new();
    }

    let mut open = Interval::subtract_all(base, &cuts_for(date, snapshot));

    if let Some(cutoff) = not_before {
        open = open
            .into_iter()
            .filter_map(|w| Interval::new(w.start.max(cutoff), w.end))
            .collect();
    }

    let minimum = match duration_minutes.map(Duration::try_minutes) {
        Some(None) => return Vec::new(),
        Some(Some(min)) => Some(min),
        None => None,
    };
    Interval::merge(open)
        .into_iter()
        .filter(|w| minimum.map_or(true, |min| w.duration() >= min))
        .map(|w| ResolvedWindow::from_interval(date, w))
        .collect()
}

/// Every day of the inclusive range `from..=to`, in order.
pub fn resolve_range(
    from: NaiveDate,
    to: NaiveDate,
    snapshot: &AvailabilitySnapshot,
    duration_minutes: Option<i64>,
    not_before: Option<DateTime<Utc>>,
) -> Vec<ResolvedWindow> {
    let mut windows: Vec<ResolvedWindow> = from
        .iter_days()
        .take_while(|date| *date <= to)
        .flat_map(|date| resolve_day(date, snapshot, duration_minutes, not_before))
        .collect();
    windows.sort();
    windows
}

pub fn validate_query(query: &AvailabilityQuery, max_query_days: i64) -> Result<(), SchedulingError> {
    if query.to < query.from {
        return Err(SchedulingError::Validation(format!(
            "Date range end {} is before start {}",
            query.to, query.from
        )));
    }

    // the day before `from` and after `to` must exist for the fetch bounds
    if query.from.pred_opt().is_none() || query.to.succ_opt().is_none() {
        return Err(SchedulingError::Validation(format!(
            "Date range {} to {} is outside the supported calendar",
            query.from, query.to
        )));
    }

    let days = (query.to - query.from).num_days() + 1;
    if days > max_query_days {
        return Err(SchedulingError::Validation(format!(
            "Date range covers {} days, at most {} allowed",
            days, max_query_days
        )));
    }

    if let Some(duration) = query.duration_minutes {
        if duration <= 0 {
            return Err(SchedulingError::Validation(
                "Duration must be a positive number of minutes".to_string(),
            ));
        }
    }

    Ok(())
}

pub struct AvailabilityResolver {
    gateway: Arc<dyn PersistenceGateway>,
    max_query_days: i64,
    memo: Mutex<HashMap<AvailabilityQuery, Vec<ResolvedWindow>>>,
}

impl AvailabilityResolver {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, max_query_days: i64) -> Self {
        Self {
            gateway,
            max_query_days,
            memo: Mutex::new(HashMap::new()),
        }
    }

    #[instrument(skip(self), fields(professional_id = %query.professional_id))]
    pub async fn resolve(&self, query: &AvailabilityQuery) -> Result<Vec<ResolvedWindow>, SchedulingError> {
        validate_query(query, self.max_query_days)?;

        if let Some(hit) = self.memo.lock().unwrap_or_else(|e| e.into_inner()).get(query) {
            debug!("Availability memo hit");
            return Ok(hit.clone());
        }

        let snapshot = self.fetch(query.professional_id, query.from, query.to).await?;
        let windows = resolve_range(
            query.from,
            query.to,
            &snapshot,
            query.duration_minutes,
            query.not_before,
        );

        info!(
            "Resolved {} windows for {} between {} and {}",
            windows.len(),
            query.professional_id,
            query.from,
            query.to
        );

        self.memo
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(query.clone(), windows.clone());
        Ok(windows)
    }

    /// First window of at least `duration_minutes` within `horizon_days` days of `from`.
    #[instrument(skip(self))]
    pub async fn next_available(
        &self,
        professional_id: ProfessionalId,
        from: NaiveDate,
        duration_minutes: i64,
        horizon_days: i64,
        not_before: Option<DateTime<Utc>>,
    ) -> Result<Option<ResolvedWindow>, SchedulingError> {
        if horizon_days < 1 || horizon_days > self.max_query_days {
            return Err(SchedulingError::Validation(format!(
                "Horizon must be between 1 and {} days",
                self.max_query_days
            )));
        }

        let to = u64::try_from(horizon_days - 1)
            .ok()
            .and_then(|span| from.checked_add_days(Days::new(span)))
            .ok_or_else(|| {
                SchedulingError::Validation(format!("Horizon from {} runs past the supported calendar", from))
            })?;

        let query = AvailabilityQuery {
            professional_id,
            from,
            to,
            duration_minutes: Some(duration_minutes),
            not_before,
        };
        let first = self.resolve(&query).await?.into_iter().next();
        if first.is_none() {
            debug!("No {} minute window within {} days", duration_minutes, horizon_days);
        }
        Ok(first)
    }

    async fn fetch(
        &self,
        professional_id: ProfessionalId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AvailabilitySnapshot, SchedulingError> {
        if !self.gateway.professional_exists(professional_id).await? {
            warn!("Availability requested for unknown professional {}", professional_id);
            return Err(SchedulingError::NotFound("Professional".to_string()));
        }

        let range_start = ClockHour::MIDNIGHT.on(from);
        let range_end = ClockHour::END_OF_DAY.on(to);

        let (rules, overrides, blocked, appointments) = futures::try_join!(
            self.gateway.list_rules(professional_id, None),
            self.gateway.list_overrides(professional_id, Some(from), Some(to)),
            self.gateway.list_blocked_slots(professional_id, Some(range_start), Some(range_end)),
            self.gateway.list_appointments(professional_id, range_start, range_end),
        )?;

        debug!(
            "Snapshot: {} rules, {} overrides, {} blocked, {} appointments",
            rules.len(),
            overrides.len(),
            blocked.len(),
            appointments.len()
        );

        Ok(AvailabilitySnapshot {
            rules,
            overrides,
            blocked,
            appointments,
        })
    }
}
