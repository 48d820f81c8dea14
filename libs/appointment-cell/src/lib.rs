pub mod gateway;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::AppointmentState;
pub use router::appointment_routes;
pub use services::window_guard::BookingWindowGuard;
