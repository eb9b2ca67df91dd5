use async_trait::async_trait;

use crate::booking::{Booking, BookingStatus, BookingWithSeat};
use crate::error::StoreError;
use crate::ids::{BookingId, Principal, SeatId};
use crate::seat::{NewSeat, Seat};

/// Backing store for seats and bookings.
///
/// Read projections run outside any unit of work; every mutation of the two
/// relations goes through a [`UnitOfWork`] obtained from [`begin`](Self::begin).
/// Tombstoned rows are excluded from every query unless a method says otherwise.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    /// All bookings (any status) owned by `principal`, oldest first, with
    /// their seat resolved even if that seat has since been tombstoned.
    async fn bookings_for_principal(
        &self,
        principal: &Principal,
    ) -> Result<Vec<BookingWithSeat>, StoreError>;

    /// Live seats with no Confirmed booking, computed from the ledger rather
    /// than the availability flag.
    async fn available_seats(&self) -> Result<Vec<Seat>, StoreError>;

    async fn all_seats(&self) -> Result<Vec<Seat>, StoreError>;

    async fn seat(&self, id: SeatId) -> Result<Option<Seat>, StoreError>;

    /// Tombstone the whole live inventory and insert `seats` in its place,
    /// atomically. Returns the inserted seats.
    async fn replace_inventory(&self, seats: Vec<NewSeat>) -> Result<Vec<Seat>, StoreError>;
}

/// One atomic group of reads and writes.
///
/// Nothing is visible to other callers until [`commit`](Self::commit)
/// succeeds. Dropping a unit of work without committing rolls it back.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Load a live seat and hold it against concurrent claims/releases until
    /// this unit of work ends.
    async fn lock_seat(&mut self, id: SeatId) -> Result<Option<Seat>, StoreError>;

    /// Load a seat whether or not it has been tombstoned.
    async fn seat_including_deleted(&mut self, id: SeatId) -> Result<Option<Seat>, StoreError>;

    /// Like [`lock_seat`](Self::lock_seat), but also returns a tombstoned
    /// seat. Release uses it so a retired seat's flag still follows the ledger.
    async fn lock_seat_including_deleted(&mut self, id: SeatId) -> Result<Option<Seat>, StoreError>;

    async fn confirmed_booking_for_seat(&mut self, id: SeatId) -> Result<Option<Booking>, StoreError>;

    /// Fails with [`StoreError::UniqueViolation`] if the seat already has a
    /// Confirmed booking.
    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError>;

    async fn set_seat_available(&mut self, id: SeatId, available: bool) -> Result<(), StoreError>;

    /// Load a live booking filtered by id *and* owner, locking it. A booking
    /// owned by someone else is indistinguishable from a missing one.
    async fn lock_booking_for_owner(
        &mut self,
        id: BookingId,
        owner: &Principal,
    ) -> Result<Option<Booking>, StoreError>;

    async fn set_booking_status(
        &mut self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
