// libs/availability-cell/src/services/overrides.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use shared_models::ids::{ProfessionalId, RecordId};

use crate::error::SchedulingError;
use crate::gateway::PersistenceGateway;
use crate::models::{CreateOverrideRequest, DateOverride, NewDateOverride, OverrideDay};
use crate::time_slot::TimeGrid;

/// Per-date exceptions to the weekly rules. Entries for the same date may
/// overlap; the resolver decides what they mean together.
pub struct OverrideStore {
    gateway: Arc<dyn PersistenceGateway>,
    grid: TimeGrid,
}

impl OverrideStore {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, grid: TimeGrid) -> Self {
        Self { gateway, grid }
    }

    pub async fn create(
        &self,
        professional_id: ProfessionalId,
        request: CreateOverrideRequest,
    ) -> Result<DateOverride, SchedulingError> {
        let (start_time, end_time) = self.grid.parse_range(&request.start_time, &request.end_time)?;
        debug!(
            "Creating {} override {} {}-{} for {}",
            if request.is_available { "available" } else { "unavailable" },
            request.for_date,
            start_time,
            end_time,
            professional_id
        );

        let entry = self
            .gateway
            .insert_override(NewDateOverride {
                professional_id,
                for_date: request.for_date,
                start_time,
                end_time,
                is_available: request.is_available,
                reason: request.reason.filter(|r| !r.trim().is_empty()),
            })
            .await?;

        info!("Date override {} created for {}", entry.id, professional_id);
        Ok(entry)
    }

    pub async fn list(
        &self,
        professional_id: ProfessionalId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DateOverride>, SchedulingError> {
        if let (Some(from), Some(to)) = (from, to) {
            if to < from {
                return Err(SchedulingError::Validation(format!(
                    "Date range end {} is before start {}",
                    to, from
                )));
            }
        }
        Ok(self.gateway.list_overrides(professional_id, from, to).await?)
    }

    /// Overrides grouped by date, dates ascending, for display.
    pub async fn list_grouped(
        &self,
        professional_id: ProfessionalId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<OverrideDay>, SchedulingError> {
        Ok(group_by_date(self.list(professional_id, from, to).await?))
    }

    pub async fn delete(&self, professional_id: ProfessionalId, override_id: RecordId) -> Result<(), SchedulingError> {
        if !self.gateway.delete_override(professional_id, override_id).await? {
            return Err(SchedulingError::NotFound("Date override".to_string()));
        }
        info!("Date override {} deleted", override_id);
        Ok(())
    }
}

pub fn group_by_date(overrides: Vec<DateOverride>) -> Vec<OverrideDay> {
    let mut days: BTreeMap<NaiveDate, Vec<DateOverride>> = BTreeMap::new();
    for entry in overrides {
        days.entry(entry.for_date).or_default().push(entry);
    }
    days.into_iter()
        .map(|(date, mut overrides)| {
            overrides.sort_by_key(|o| (o.start_time, o.end_time));
            OverrideDay { date, overrides }
        })
        .collect()
}
