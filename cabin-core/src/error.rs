use crate::ids::{BookingId, SeatId};

/// How a failure should be treated by whoever called the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Seat or booking absent, or booking owned by someone else.
    NotFound,
    /// Seat already held by a Confirmed booking, or booking already cancelled.
    Conflict,
    /// Caller-supplied data rejected before touching the store.
    Invalid,
    /// Store unavailable or lock wait exceeded; safe to retry with backoff.
    Transient,
    /// Bug or unclassified backend failure. No retry advice.
    Internal,
}

/// Failure reported by a store implementation, already classified.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("store temporarily unavailable: {0}")]
    Transient(String),
    #[error("store failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("Seat not found: {0}")]
    SeatNotFound(SeatId),
    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),
    #[error("Seat is already booked: {0}")]
    SeatAlreadyBooked(SeatId),
    #[error("Booking is already cancelled: {0}")]
    AlreadyCancelled(BookingId),
    #[error("Invalid seat record: {0}")]
    InvalidSeat(String),
    #[error("Store temporarily unavailable")]
    Transient(#[source] StoreError),
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
    #[error("Store failure")]
    Store(#[source] StoreError),
}

impl ReservationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ReservationError::SeatNotFound(_) | ReservationError::BookingNotFound(_) => {
                ErrorClass::NotFound
            }
            ReservationError::SeatAlreadyBooked(_) | ReservationError::AlreadyCancelled(_) => {
                ErrorClass::Conflict
            }
            ReservationError::InvalidSeat(_) => ErrorClass::Invalid,
            ReservationError::Transient(_) => ErrorClass::Transient,
            ReservationError::InvariantViolation(_) | ReservationError::Store(_) => {
                ErrorClass::Internal
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

impl From<StoreError> for ReservationError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            ReservationError::Transient(err)
        } else {
            ReservationError::Store(err)
        }
    }
}

/// A persisted enum column held a value this build does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(ReservationError::SeatNotFound(SeatId::new()).class(), ErrorClass::NotFound);
        assert_eq!(ReservationError::BookingNotFound(BookingId::new()).class(), ErrorClass::NotFound);
        assert_eq!(ReservationError::SeatAlreadyBooked(SeatId::new()).class(), ErrorClass::Conflict);
        assert_eq!(ReservationError::AlreadyCancelled(BookingId::new()).class(), ErrorClass::Conflict);
        assert_eq!(
            ReservationError::InvariantViolation("x".into()).class(),
            ErrorClass::Internal
        );
    }

    #[test]
    fn test_store_errors_keep_transient_apart_from_conflict() {
        let transient: ReservationError = StoreError::Transient("lock timeout".into()).into();
        assert!(transient.is_retryable());

        let unique: ReservationError = StoreError::UniqueViolation("seats_code".into()).into();
        assert!(!unique.is_retryable());
        assert_eq!(unique.class(), ErrorClass::Internal);
    }

    #[test]
    fn test_public_message_hides_store_text() {
        let err: ReservationError = StoreError::Backend("relation \"bookings\" does not exist".into()).into();
        assert_eq!(err.to_string(), "Store failure");
    }
}
