pub mod engine;
pub mod queries;

pub use engine::{ReservationEngine, RetryPolicy};
pub use queries::BookingQueries;
