use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, AppointmentState};
use availability_cell::{availability_routes, AvailabilityState};
use shared_config::AppConfig;
use shared_utils::clock::{ClockSource, SystemClock};
use shared_utils::identity::{ClaimsIdentity, IdentityGateway};

pub fn create_router(config: Arc<AppConfig>) -> Router {
    let clock: Arc<dyn ClockSource> = Arc::new(SystemClock);
    let identity: Arc<dyn IdentityGateway> = Arc::new(ClaimsIdentity);

    let availability = AvailabilityState::new(config.clone(), clock.clone(), identity.clone());
    let appointments = AppointmentState::new(config, clock, identity);

    Router::new()
        .route("/", get(|| async { "Telehealth scheduling API is running!" }))
        .nest("/availability", availability_routes(Arc::new(availability)))
        .nest("/appointments", appointment_routes(Arc::new(appointments)))
}
