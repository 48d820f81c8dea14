use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{DateTime, NaiveDate, Utc};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::ids::{ProfessionalId, RecordId};
use shared_utils::clock::ClockSource;
use shared_utils::identity::{acts_for, IdentityGateway};

use crate::gateway::{PersistenceGateway, SupabaseGateway};
use crate::models::{
    AvailabilityQuery, CreateBlockedSlotRequest, CreateOverrideRequest, CreateRuleRequest,
    UpdateRuleRequest,
};
use crate::services::{
    slice_slots, AvailabilityResolver, BlockedSlotStore, OverrideStore, RuleStore, RuleWriteLocks,
};
use crate::time_slot::TimeGrid;

const DEFAULT_HORIZON_DAYS: i64 = 14;

/// Router state shared by every availability handler.
#[derive(Clone)]
pub struct AvailabilityState {
    pub config: Arc<AppConfig>,
    pub rule_locks: RuleWriteLocks,
    pub clock: Arc<dyn ClockSource>,
    pub identity: Arc<dyn IdentityGateway>,
}

impl AvailabilityState {
    pub fn new(
        config: Arc<AppConfig>,
        clock: Arc<dyn ClockSource>,
        identity: Arc<dyn IdentityGateway>,
    ) -> Self {
        Self {
            config,
            rule_locks: RuleWriteLocks::new(),
            clock,
            identity,
        }
    }

    fn grid(&self) -> TimeGrid {
        TimeGrid::from_config(&self.config.scheduling)
    }

    fn gateway(&self, token: Option<&str>) -> Arc<dyn PersistenceGateway> {
        Arc::new(SupabaseGateway::new(&self.config, token.map(str::to_string)))
    }

    fn resolver(&self) -> AvailabilityResolver {
        AvailabilityResolver::new(self.gateway(None), self.config.scheduling.max_query_days)
    }

    /// The caller must be the professional, or an admin.
    fn authorize(&self, user: &User, professional_id: ProfessionalId) -> Result<(), AppError> {
        if acts_for(self.identity.as_ref(), user, &professional_id.to_string())? {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Not authorized to manage availability for this professional".to_string(),
            ))
        }
    }
}

// Query parameters
#[derive(Debug, Deserialize)]
pub struct WindowsQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub duration_minutes: i64,
    pub step_minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub from: Option<NaiveDate>,
    pub duration_minutes: i64,
    pub horizon_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RulesQuery {
    pub weekday: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct OverridesQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub grouped: bool,
}

#[derive(Debug, Deserialize)]
pub struct BlockedQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_grid(State(state): State<Arc<AvailabilityState>>) -> Result<Json<Value>, AppError> {
    let grid = state.grid();
    Ok(Json(json!({
        "start": grid.first(),
        "end": grid.last(),
        "ticks": grid.ticks(),
    })))
}

#[axum::debug_handler]
pub async fn get_windows(
    State(state): State<Arc<AvailabilityState>>,
    Path(professional_id): Path<String>,
    Query(query): Query<WindowsQuery>,
) -> Result<Json<Value>, AppError> {
    let professional_id: ProfessionalId = professional_id.parse()?;

    let windows = state
        .resolver()
        .resolve(&AvailabilityQuery {
            professional_id,
            from: query.from,
            to: query.to,
            duration_minutes: query.duration_minutes,
            not_before: Some(state.clock.now()),
        })
        .await?;

    Ok(Json(json!({
        "professional_id": professional_id,
        "from": query.from,
        "to": query.to,
        "windows": windows,
        "total": windows.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_slots(
    State(state): State<Arc<AvailabilityState>>,
    Path(professional_id): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let professional_id: ProfessionalId = professional_id.parse()?;

    let windows = state
        .resolver()
        .resolve(&AvailabilityQuery {
            professional_id,
            from: query.from,
            to: query.to,
            duration_minutes: Some(query.duration_minutes),
            not_before: Some(state.clock.now()),
        })
        .await?;
    let slots = slice_slots(&windows, query.duration_minutes, query.step_minutes)?;

    Ok(Json(json!({
        "professional_id": professional_id,
        "available_slots": slots,
        "total_slots": slots.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_next_available(
    State(state): State<Arc<AvailabilityState>>,
    Path(professional_id): Path<String>,
    Query(query): Query<NextQuery>,
) -> Result<Json<Value>, AppError> {
    let professional_id: ProfessionalId = professional_id.parse()?;
    let now = state.clock.now();
    let horizon_days = query
        .horizon_days
        .unwrap_or(DEFAULT_HORIZON_DAYS.min(state.config.scheduling.max_query_days));

    let next = state
        .resolver()
        .next_available(
            professional_id,
            query.from.unwrap_or_else(|| now.date_naive()),
            query.duration_minutes,
            horizon_days,
            Some(now),
        )
        .await?;

    Ok(Json(json!({
        "professional_id": professional_id,
        "next_available": next,
    })))
}

// ==============================================================================
// PROTECTED RULE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_rules(
    State(state): State<Arc<AvailabilityState>>,
    Path(professional_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<RulesQuery>,
) -> Result<Json<Value>, AppError> {
    let professional_id: ProfessionalId = professional_id.parse()?;
    state.authorize(&user, professional_id)?;

    let store = RuleStore::new(state.gateway(Some(auth.token())), state.grid(), state.rule_locks.clone());
    let rules = store.list(professional_id, query.weekday).await?;

    Ok(Json(json!({
        "rules": rules,
        "total": rules.len(),
    })))
}

#[axum::debug_handler]
pub async fn create_rule(
    State(state): State<Arc<AvailabilityState>>,
    Path(professional_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateRuleRequest>,
) -> Result<Json<Value>, AppError> {
    let professional_id: ProfessionalId = professional_id.parse()?;
    state.authorize(&user, professional_id)?;

    let store = RuleStore::new(state.gateway(Some(auth.token())), state.grid(), state.rule_locks.clone());
    let rule = store.create(professional_id, request).await?;

    Ok(Json(json!(rule)))
}

#[axum::debug_handler]
pub async fn validate_rule(
    State(state): State<Arc<AvailabilityState>>,
    Path(professional_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateRuleRequest>,
) -> Result<Json<Value>, AppError> {
    let professional_id: ProfessionalId = professional_id.parse()?;
    state.authorize(&user, professional_id)?;

    let store = RuleStore::new(state.gateway(Some(auth.token())), state.grid(), state.rule_locks.clone());
    let candidate = store.check(professional_id, request).await?;

    Ok(Json(json!({
        "valid": true,
        "rule": candidate,
    })))
}

#[axum::debug_handler]
pub async fn update_rule(
    State(state): State<Arc<AvailabilityState>>,
    Path((professional_id, rule_id)): Path<(String, String)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateRuleRequest>,
) -> Result<Json<Value>, AppError> {
    let professional_id: ProfessionalId = professional_id.parse()?;
    let rule_id: RecordId = rule_id.parse()?;
    state.authorize(&user, professional_id)?;

    let store = RuleStore::new(state.gateway(Some(auth.token())), state.grid(), state.rule_locks.clone());
    let rule = store.update(professional_id, rule_id, request).await?;

    Ok(Json(json!(rule)))
}

#[axum::debug_handler]
pub async fn delete_rule(
    State(state): State<Arc<AvailabilityState>>,
    Path((professional_id, rule_id)): Path<(String, String)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let professional_id: ProfessionalId = professional_id.parse()?;
    let rule_id: RecordId = rule_id.parse()?;
    state.authorize(&user, professional_id)?;

    let store = RuleStore::new(state.gateway(Some(auth.token())), state.grid(), state.rule_locks.clone());
    store.delete(professional_id, rule_id).await?;

    Ok(Json(json!({ "success": true })))
}

// ==============================================================================
// PROTECTED OVERRIDE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_overrides(
    State(state): State<Arc<AvailabilityState>>,
    Path(professional_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<OverridesQuery>,
) -> Result<Json<Value>, AppError> {
    let professional_id: ProfessionalId = professional_id.parse()?;
    state.authorize(&user, professional_id)?;

    let store = OverrideStore::new(state.gateway(Some(auth.token())), state.grid());
    if query.grouped {
        let days = store.list_grouped(professional_id, query.from, query.to).await?;
        return Ok(Json(json!({
            "days": days,
            "total_days": days.len(),
        })));
    }

    let overrides = store.list(professional_id, query.from, query.to).await?;
    Ok(Json(json!({
        "overrides": overrides,
        "total": overrides.len(),
    })))
}

#[axum::debug_handler]
pub async fn create_override(
    State(state): State<Arc<AvailabilityState>>,
    Path(professional_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateOverrideRequest>,
) -> Result<Json<Value>, AppError> {
    let professional_id: ProfessionalId = professional_id.parse()?;
    state.authorize(&user, professional_id)?;

    let store = OverrideStore::new(state.gateway(Some(auth.token())), state.grid());
    let entry = store.create(professional_id, request).await?;

    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn delete_override(
    State(state): State<Arc<AvailabilityState>>,
    Path((professional_id, override_id)): Path<(String, String)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let professional_id: ProfessionalId = professional_id.parse()?;
    let override_id: RecordId = override_id.parse()?;
    state.authorize(&user, professional_id)?;

    let store = OverrideStore::new(state.gateway(Some(auth.token())), state.grid());
    store.delete(professional_id, override_id).await?;

    Ok(Json(json!({ "success": true })))
}

// ==============================================================================
// PROTECTED BLOCKED SLOT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_blocked(
    State(state): State<Arc<AvailabilityState>>,
    Path(professional_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<BlockedQuery>,
) -> Result<Json<Value>, AppError> {
    let professional_id: ProfessionalId = professional_id.parse()?;
    state.authorize(&user, professional_id)?;

    let store = BlockedSlotStore::new(state.gateway(Some(auth.token())));
    let blocked = store.list(professional_id, query.from, query.to).await?;

    Ok(Json(json!({
        "blocked_slots": blocked,
        "total": blocked.len(),
    })))
}

#[axum::debug_handler]
pub async fn create_blocked(
    State(state): State<Arc<AvailabilityState>>,
    Path(professional_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateBlockedSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let professional_id: ProfessionalId = professional_id.parse()?;
    state.authorize(&user, professional_id)?;

    let store = BlockedSlotStore::new(state.gateway(Some(auth.token())));
    let slot = store.create(professional_id, request).await?;

    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn delete_blocked(
    State(state): State<Arc<AvailabilityState>>,
    Path((professional_id, blocked_id)): Path<(String, String)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let professional_id: ProfessionalId = professional_id.parse()?;
    let blocked_id: RecordId = blocked_id.parse()?;
    state.authorize(&user, professional_id)?;

    let store = BlockedSlotStore::new(state.gateway(Some(auth.token())));
    store.delete(professional_id, blocked_id).await?;

    Ok(Json(json!({ "success": true })))
}
