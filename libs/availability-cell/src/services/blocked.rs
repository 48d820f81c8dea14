// libs/availability-cell/src/services/blocked.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use shared_models::ids::{ProfessionalId, RecordId};

use crate::error::SchedulingError;
use crate::gateway::PersistenceGateway;
use crate::models::{BlockedSlot, CreateBlockedSlotRequest, NewBlockedSlot};

/// Absolute spans of hard unavailability. Overlapping blocks are fine; they union.
pub struct BlockedSlotStore {
    gateway: Arc<dyn PersistenceGateway>,
}

impl BlockedSlotStore {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    pub async fn create(
        &self,
        professional_id: ProfessionalId,
        request: CreateBlockedSlotRequest,
    ) -> Result<BlockedSlot, SchedulingError> {
        if request.starts_at >= request.ends_at {
            return Err(SchedulingError::Validation(
                "Blocked slot must start before it ends".to_string(),
            ));
        }

        let slot = self
            .gateway
            .insert_blocked_slot(NewBlockedSlot {
                professional_id,
                starts_at: request.starts_at,
                ends_at: request.ends_at,
                reason: request.reason.filter(|r| !r.trim().is_empty()),
            })
            .await?;

        info!(
            "Blocked slot {} created for {} ({} to {})",
            slot.id, professional_id, slot.starts_at, slot.ends_at
        );
        Ok(slot)
    }

    pub async fn list(
        &self,
        professional_id: ProfessionalId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<BlockedSlot>, SchedulingError> {
        if let (Some(from), Some(to)) = (from, to) {
            if to <= from {
                return Err(SchedulingError::Validation(
                    "Range end must be after range start".to_string(),
                ));
            }
        }
        Ok(self.gateway.list_blocked_slots(professional_id, from, to).await?)
    }

    pub async fn delete(&self, professional_id: ProfessionalId, blocked_id: RecordId) -> Result<(), SchedulingError> {
        if !self.gateway.delete_blocked_slot(professional_id, blocked_id).await? {
            return Err(SchedulingError::NotFound("Blocked slot".to_string()));
        }
        info!("Blocked slot {} deleted", blocked_id);
        Ok(())
    }
}
