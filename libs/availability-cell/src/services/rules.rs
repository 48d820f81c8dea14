// libs/availability-cell/src/services/rules.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use shared_models::ids::{ProfessionalId, RecordId};

use crate::error::{OverlapError, SchedulingError};
use crate::gateway::PersistenceGateway;
use crate::models::{AvailabilityRule, CreateRuleRequest, NewAvailabilityRule, UpdateRuleRequest};
use crate::time_slot::{overlaps, TimeGrid};

/// Reject `candidate` if it overlaps any stored rule for the same professional and weekday.
pub fn validate_new_rule(
    existing_rules: &[AvailabilityRule],
    candidate: &NewAvailabilityRule,
) -> Result<(), OverlapError> {
    validate_rule_change(existing_rules, candidate, None)
}

/// Same as [`validate_new_rule`], ignoring the rule being edited.
pub fn validate_rule_change(
    existing_rules: &[AvailabilityRule],
    candidate: &NewAvailabilityRule,
    replacing: Option<RecordId>,
) -> Result<(), OverlapError> {
    let collision = existing_rules.iter().find(|rule| {
        rule.professional_id == candidate.professional_id
            && rule.weekday == candidate.weekday
            && Some(rule.id) != replacing
            && overlaps(rule.start_time, rule.end_time, candidate.start_time, candidate.end_time)
    });

    match collision {
        Some(rule) => Err(OverlapError {
            weekday: candidate.weekday,
            candidate_start: candidate.start_time,
            candidate_end: candidate.end_time,
            existing_id: rule.id,
            existing_start: rule.start_time,
            existing_end: rule.end_time,
        }),
        None => Ok(()),
    }
}

pub fn validate_weekday(weekday: i32) -> Result<u8, SchedulingError> {
    u8::try_from(weekday)
        .ok()
        .filter(|day| *day <= 6)
        .ok_or_else(|| {
            SchedulingError::Validation("Weekday must be between 0 (Sunday) and 6 (Saturday)".to_string())
        })
}

type LockKey = (ProfessionalId, u8);

/// Serialises rule writes per professional and weekday so the overlap check
/// and the insert behave as one step within this process.
#[derive(Clone, Default)]
pub struct RuleWriteLocks {
    locks: Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>,
}

impl RuleWriteLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, professional_id: ProfessionalId, weekday: u8) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // entries nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry((professional_id, weekday))
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub struct RuleStore {
    gateway: Arc<dyn PersistenceGateway>,
    grid: TimeGrid,
    locks: RuleWriteLocks,
}

impl RuleStore {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, grid: TimeGrid, locks: RuleWriteLocks) -> Self {
        Self { gateway, grid, locks }
    }

    fn candidate(
        &self,
        professional_id: ProfessionalId,
        request: &CreateRuleRequest,
    ) -> Result<NewAvailabilityRule, SchedulingError> {
        let weekday = validate_weekday(request.weekday)?;
        let (start_time, end_time) = self.grid.parse_range(&request.start_time, &request.end_time)?;
        Ok(NewAvailabilityRule {
            professional_id,
            weekday,
            start_time,
            end_time,
        })
    }

    pub async fn create(
        &self,
        professional_id: ProfessionalId,
        request: CreateRuleRequest,
    ) -> Result<AvailabilityRule, SchedulingError> {
        let candidate = self.candidate(professional_id, &request)?;
        debug!(
            "Creating rule {}-{} on weekday {} for {}",
            candidate.start_time, candidate.end_time, candidate.weekday, professional_id
        );

        let _guard = self.locks.acquire(professional_id, candidate.weekday).await;

        let existing = self.gateway.list_rules(professional_id, Some(candidate.weekday)).await?;
        if let Err(overlap) = validate_new_rule(&existing, &candidate) {
            warn!("Rejected overlapping rule for {}: {}", professional_id, overlap);
            return Err(overlap.into());
        }

        let rule = self.gateway.insert_rule(candidate).await?;
        info!("Availability rule {} created for {}", rule.id, professional_id);
        Ok(rule)
    }

    /// Dry run of [`RuleStore::create`]: all validation, no write.
    pub async fn check(
        &self,
        professional_id: ProfessionalId,
        request: CreateRuleRequest,
    ) -> Result<NewAvailabilityRule, SchedulingError> {
        let candidate = self.candidate(professional_id, &request)?;
        let existing = self.gateway.list_rules(professional_id, Some(candidate.weekday)).await?;
        validate_new_rule(&existing, &candidate)?;
        Ok(candidate)
    }

    pub async fn update(
        &self,
        professional_id: ProfessionalId,
        rule_id: RecordId,
        request: UpdateRuleRequest,
    ) -> Result<AvailabilityRule, SchedulingError> {
        let current = self.owned_rule(professional_id, rule_id).await?;

        let start_time = match request.start_time.as_deref() {
            Some(raw) => self.grid.parse(raw)?,
            None => current.start_time,
        };
        let end_time = match request.end_time.as_deref() {
            Some(raw) => self.grid.parse(raw)?,
            None => current.end_time,
        };
        self.grid.validate_range(start_time, end_time)?;

        let candidate = NewAvailabilityRule {
            professional_id,
            weekday: current.weekday,
            start_time,
            end_time,
        };

        let _guard = self.locks.acquire(professional_id, current.weekday).await;

        let siblings = self.gateway.list_rules(professional_id, Some(current.weekday)).await?;
        validate_rule_change(&siblings, &candidate, Some(rule_id))?;

        let updated = self.gateway.update_rule(rule_id, start_time, end_time).await?;
        info!("Availability rule {} updated to {}-{}", rule_id, start_time, end_time);
        Ok(updated)
    }

    pub async fn list(
        &self,
        professional_id: ProfessionalId,
        weekday: Option<i32>,
    ) -> Result<Vec<AvailabilityRule>, SchedulingError> {
        let weekday = weekday.map(validate_weekday).transpose()?;
        Ok(self.gateway.list_rules(professional_id, weekday).await?)
    }

    pub async fn delete(&self, professional_id: ProfessionalId, rule_id: RecordId) -> Result<(), SchedulingError> {
        if !self.gateway.delete_rule(professional_id, rule_id).await? {
            return Err(SchedulingError::NotFound("Availability rule".to_string()));
        }
        info!("Availability rule {} deleted", rule_id);
        Ok(())
    }

    async fn owned_rule(
        &self,
        professional_id: ProfessionalId,
        rule_id: RecordId,
    ) -> Result<AvailabilityRule, SchedulingError> {
        match self.gateway.get_rule(rule_id).await? {
            Some(rule) if rule.professional_id == professional_id => Ok(rule),
            _ => Err(SchedulingError::NotFound("Availability rule".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_slot::ClockHour;
    use assert_matches::assert_matches;

    fn rule(professional_id: ProfessionalId, weekday: u8, start: u8, end: u8) -> AvailabilityRule {
        AvailabilityRule {
            id: RecordId::new(),
            professional_id,
            weekday,
            start_time: ClockHour::new(start).unwrap(),
            end_time: ClockHour::new(end).unwrap(),
            created_at: None,
        }
    }

    fn candidate(professional_id: ProfessionalId, weekday: u8, start: u8, end: u8) -> NewAvailabilityRule {
        NewAvailabilityRule {
            professional_id,
            weekday,
            start_time: ClockHour::new(start).unwrap(),
            end_time: ClockHour::new(end).unwrap(),
        }
    }

    #[test]
    fn test_adjacent_rules_are_allowed() {
        let pro = ProfessionalId::new();
        let existing = vec![rule(pro, 1, 9, 10)];
        assert!(validate_new_rule(&existing, &candidate(pro, 1, 10, 11)).is_ok());
        assert!(validate_new_rule(&existing, &candidate(pro, 1, 8, 9)).is_ok());
    }

    #[test]
    fn test_overlapping_rule_is_rejected() {
        let pro = ProfessionalId::new();
        let existing = vec![rule(pro, 1, 9, 12)];
        let err = validate_new_rule(&existing, &candidate(pro, 1, 11, 13)).unwrap_err();
        assert_eq!(err.existing_id, existing[0].id);
        assert_eq!(err.weekday, 1);
    }

    #[test]
    fn test_other_weekday_or_professional_does_not_collide() {
        let pro = ProfessionalId::new();
        let existing = vec![rule(pro, 1, 9, 12), rule(ProfessionalId::new(), 2, 9, 12)];
        assert!(validate_new_rule(&existing, &candidate(pro, 2, 9, 12)).is_ok());
    }

    #[test]
    fn test_rule_change_ignores_itself() {
        let pro = ProfessionalId::new();
        let existing = vec![rule(pro, 3, 9, 12)];
        let widened = candidate(pro, 3, 8, 13);
        assert!(validate_rule_change(&existing, &widened, Some(existing[0].id)).is_ok());
        assert!(validate_rule_change(&existing, &widened, None).is_err());
    }

    #[test]
    fn test_weekday_bounds() {
        assert_eq!(validate_weekday(0).unwrap(), 0);
        assert_eq!(validate_weekday(6).unwrap(), 6);
        assert_matches!(validate_weekday(7), Err(SchedulingError::Validation(_)));
        assert_matches!(validate_weekday(-1), Err(SchedulingError::Validation(_)));
    }

    #[tokio::test]
    async fn test_locks_are_keyed() {
        let locks = RuleWriteLocks::new();
        let pro = ProfessionalId::new();
        let _monday = locks.acquire(pro, 1).await;
        // a different weekday must not wait on Monday's guard
        let tuesday = tokio::time::timeout(std::time::Duration::from_millis(50), locks.acquire(pro, 2)).await;
        assert!(tuesday.is_ok());
        let monday_again = tokio::time::timeout(std::time::Duration::from_millis(50), locks.acquire(pro, 1)).await;
        assert!(monday_again.is_err());
    }

    #[tokio::test]
    async fn test_idle_locks_are_released() {
        let locks = RuleWriteLocks::new();
        let pro = ProfessionalId::new();
        let tracked = |locks: &RuleWriteLocks| locks.locks.lock().unwrap().len();

        drop(locks.acquire(pro, 1).await);
        let _wednesday = locks.acquire(pro, 3).await;
        assert_eq!(tracked(&locks), 1);

        let _thursday = locks.acquire(pro, 4).await;
        assert_eq!(tracked(&locks), 2);
    }
}
