pub mod booking;
pub mod error;
pub mod ids;
pub mod repository;
pub mod seat;

pub use booking::{Booking, BookingStatus, BookingWithSeat};
pub use error::{ErrorClass, ParseEnumError, ReservationError, StoreError};
pub use ids::{BookingId, Principal, SeatId};
pub use repository::{ReservationStore, UnitOfWork};
pub use seat::{validate_inventory, CabinSegment, NewSeat, Seat};

pub type CoreResult<T> = Result<T, ReservationError>;
