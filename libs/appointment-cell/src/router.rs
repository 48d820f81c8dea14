// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentState};

pub fn appointment_routes(state: Arc<AppointmentState>) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/{appointment_id}/window", get(handlers::get_window))
        .route(
            "/{appointment_id}/clinical-note",
            get(handlers::get_clinical_note).put(handlers::put_clinical_note),
        )
        .route("/{appointment_id}/join", post(handlers::join_session))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
