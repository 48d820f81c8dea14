pub mod error;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod time_slot;

pub use error::{OverlapError, SchedulingError};
pub use handlers::AvailabilityState;
pub use router::availability_routes;
pub use time_slot::{overlaps, ClockHour, Interval, TimeGrid};
