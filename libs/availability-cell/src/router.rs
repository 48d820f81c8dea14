use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AvailabilityState};

pub fn availability_routes(state: Arc<AvailabilityState>) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/grid", get(handlers::get_grid))
        .route("/{professional_id}/windows", get(handlers::get_windows))
        .route("/{professional_id}/slots", get(handlers::get_slots))
        .route("/{professional_id}/next", get(handlers::get_next_available));

    // Protected routes (the professional or an admin)
    let protected_routes = Router::new()
        .route("/{professional_id}/rules", get(handlers::list_rules).post(handlers::create_rule))
        .route("/{professional_id}/rules/validate", post(handlers::validate_rule))
        .route(
            "/{professional_id}/rules/{rule_id}",
            put(handlers::update_rule).delete(handlers::delete_rule),
        )
        .route(
            "/{professional_id}/overrides",
            get(handlers::list_overrides).post(handlers::create_override),
        )
        .route(
            "/{professional_id}/overrides/{override_id}",
            axum::routing::delete(handlers::delete_override),
        )
        .route(
            "/{professional_id}/blocked",
            get(handlers::list_blocked).post(handlers::create_blocked),
        )
        .route(
            "/{professional_id}/blocked/{blocked_id}",
            axum::routing::delete(handlers::delete_blocked),
        )
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
