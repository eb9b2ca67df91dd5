use cabin_core::{BookingWithSeat, CoreResult, Principal, ReservationError, ReservationStore, Seat, SeatId};
use std::sync::Arc;

/// Read-only projections over the seat inventory and the reservation ledger.
/// Each call is a fresh read; nothing is cached between requests.
pub struct BookingQueries {
    store: Arc<dyn ReservationStore>,
}

impl BookingQueries {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    /// Every booking `principal` owns, in any status, oldest first.
    pub async fn list_for_principal(&self, principal: &Principal) -> CoreResult<Vec<BookingWithSeat>> {
        Ok(self.store.bookings_for_principal(principal).await?)
    }

    /// Seats with no Confirmed booking, derived from the ledger rather than
    /// the cached availability flag.
    pub async fn list_available_seats(&self) -> CoreResult<Vec<Seat>> {
        Ok(self.store.available_seats().await?)
    }

    pub async fn list_seats(&self) -> CoreResult<Vec<Seat>> {
        Ok(self.store.all_seats().await?)
    }

    pub async fn get_seat(&self, id: SeatId) -> CoreResult<Seat> {
        self.store
            .seat(id)
            .await?
            .ok_or(ReservationError::SeatNotFound(id))
    }
}
