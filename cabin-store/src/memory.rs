use async_trait::async_trait;
use cabin_core::{
    Booking, BookingId, BookingStatus, BookingWithSeat, NewSeat, Principal, ReservationStore,
    Seat, SeatId, StoreError, UnitOfWork,
};
use chrono::Utc;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

/// Operations that can be made to fail once, for exercising rollback and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    Begin,
    InsertBooking,
    SetSeatAvailable,
    SetBookingStatus,
    Commit,
}

#[derive(Debug, Default, Clone)]
struct Tables {
    seats: Vec<Seat>,
    bookings: Vec<Booking>,
}

impl Tables {
    fn live_seat(&self, id: SeatId) -> Option<&Seat> {
        self.seats.iter().find(|s| s.id == id && !s.is_deleted())
    }

    fn any_seat(&self, id: SeatId) -> Option<&Seat> {
        self.seats.iter().find(|s| s.id == id)
    }

    fn confirmed_for(&self, seat_id: SeatId) -> Option<&Booking> {
        self.bookings
            .iter()
            .find(|b| b.seat_id == seat_id && b.is_confirmed() && b.deleted_at.is_none())
    }

    fn sorted(mut seats: Vec<Seat>) -> Vec<Seat> {
        seats.sort_by(|a, b| (a.row_number, &a.code).cmp(&(b.row_number, &b.code)));
        seats
    }
}

#[derive(Debug, Default)]
struct Faults(StdMutex<Vec<(FaultPoint, StoreError)>>);

impl Faults {
    fn trip(&self, point: FaultPoint) -> Result<(), StoreError> {
        let mut pending = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.iter().position(|(p, _)| *p == point) {
            Some(idx) => Err(pending.remove(idx).1),
            None => Ok(()),
        }
    }
}

/// In-process store with the same contract as the PostgreSQL one.
///
/// A unit of work takes the table lock for its whole lifetime and mutates a
/// staged copy, so concurrent claims on any seat are serialized and an
/// uncommitted unit of work leaves nothing behind.
#[derive(Clone, Default)]
pub struct MemoryReservationStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
}

impl MemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call at `point` fail with `error`.
    pub fn inject_fault(&self, point: FaultPoint, error: StoreError) {
        self.faults
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((point, error));
    }

    /// Every booking ever written, including cancelled ones.
    pub async fn ledger(&self) -> Vec<Booking> {
        self.tables.lock().await.bookings.clone()
    }

    /// Overwrite a seat's catalog price. Used to show that bookings keep their snapshot.
    pub async fn reprice_seat(&self, id: SeatId, price: i64) -> bool {
        let mut tables = self.tables.lock().await;
        match tables.seats.iter_mut().find(|s| s.id == id && !s.is_deleted()) {
            Some(seat) => {
                seat.price = price;
                seat.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Overwrite a seat's availability flag without touching the ledger.
    pub async fn force_seat_flag(&self, id: SeatId, available: bool) -> bool {
        let mut tables = self.tables.lock().await;
        match tables.seats.iter_mut().find(|s| s.id == id) {
            Some(seat) => {
                seat.available = available;
                true
            }
            None => false,
        }
    }

    /// Append a booking as-is, skipping the one-Confirmed-per-seat rule.
    pub async fn plant_booking(&self, booking: Booking) {
        self.tables.lock().await.bookings.push(booking);
    }
}

#[async_trait]
impl ReservationStore for MemoryReservationStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        self.faults.trip(FaultPoint::Begin)?;
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            staged,
            faults: self.faults.clone(),
        }))
    }

    async fn bookings_for_principal(
        &self,
        principal: &Principal,
    ) -> Result<Vec<BookingWithSeat>, StoreError> {
        let tables = self.tables.lock().await;
        tables
            .bookings
            .iter()
            .filter(|b| &b.principal == principal && b.deleted_at.is_none())
            .map(|b| {
                let seat = tables.any_seat(b.seat_id).cloned().ok_or_else(|| {
                    StoreError::Backend(format!("booking {} references missing seat {}", b.id, b.seat_id))
                })?;
                Ok(BookingWithSeat {
                    booking: b.clone(),
                    seat,
                })
            })
            .collect()
    }

    async fn available_seats(&self) -> Result<Vec<Seat>, StoreError> {
        let tables = self.tables.lock().await;
        let seats = tables
            .seats
            .iter()
            .filter(|s| !s.is_deleted() && tables.confirmed_for(s.id).is_none())
            .cloned()
            .collect();
        Ok(Tables::sorted(seats))
    }

    async fn all_seats(&self) -> Result<Vec<Seat>, StoreError> {
        let tables = self.tables.lock().await;
        let seats = tables.seats.iter().filter(|s| !s.is_deleted()).cloned().collect();
        Ok(Tables::sorted(seats))
    }

    async fn seat(&self, id: SeatId) -> Result<Option<Seat>, StoreError> {
        Ok(self.tables.lock().await.live_seat(id).cloned())
    }

    async fn replace_inventory(&self, seats: Vec<NewSeat>) -> Result<Vec<Seat>, StoreError> {
        let now = Utc::now();
        let mut tables = self.tables.lock().await;
        let mut staged = tables.clone();

        let mut tombstoned = 0usize;
        for seat in staged.seats.iter_mut().filter(|s| !s.is_deleted()) {
            seat.deleted_at = Some(now);
            seat.updated_at = now;
            tombstoned += 1;
        }

        let mut inserted = Vec::with_capacity(seats.len());
        for record in seats {
            if staged.seats.iter().any(|s| !s.is_deleted() && s.code == record.code) {
                return Err(StoreError::UniqueViolation("seats_code_live_idx".into()));
            }
            let seat = record.into_seat(now);
            staged.seats.push(seat.clone());
            inserted.push(seat);
        }

        *tables = staged;
        info!(tombstoned, inserted = inserted.len(), "Seat inventory replaced");
        Ok(inserted)
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
    faults: Arc<Faults>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_seat(&mut self, id: SeatId) -> Result<Option<Seat>, StoreError> {
        Ok(self.staged.live_seat(id).cloned())
    }

    async fn seat_including_deleted(&mut self, id: SeatId) -> Result<Option<Seat>, StoreError> {
        Ok(self.staged.any_seat(id).cloned())
    }

    async fn lock_seat_including_deleted(&mut self, id: SeatId) -> Result<Option<Seat>, StoreError> {
        Ok(self.staged.any_seat(id).cloned())
    }

    async fn confirmed_booking_for_seat(&mut self, id: SeatId) -> Result<Option<Booking>, StoreError> {
        Ok(self.staged.confirmed_for(id).cloned())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
        self.faults.trip(FaultPoint::InsertBooking)?;
        if booking.is_confirmed() && self.staged.confirmed_for(booking.seat_id).is_some() {
            return Err(StoreError::UniqueViolation(
                "bookings_one_confirmed_per_seat_idx".into(),
            ));
        }
        self.staged.bookings.push(booking.clone());
        Ok(())
    }

    async fn set_seat_available(&mut self, id: SeatId, available: bool) -> Result<(), StoreError> {
        self.faults.trip(FaultPoint::SetSeatAvailable)?;
        if let Some(seat) = self.staged.seats.iter_mut().find(|s| s.id == id) {
            seat.available = available;
            seat.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn lock_booking_for_owner(
        &mut self,
        id: BookingId,
        owner: &Principal,
    ) -> Result<Option<Booking>, StoreError> {
        Ok(self
            .staged
            .bookings
            .iter()
            .find(|b| b.id == id && &b.principal == owner && b.deleted_at.is_none())
            .cloned())
    }

    async fn set_booking_status(
        &mut self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<(), StoreError> {
        self.faults.trip(FaultPoint::SetBookingStatus)?;
        if status == BookingStatus::Confirmed {
            let seat_id = self.staged.bookings.iter().find(|b| b.id == id).map(|b| b.seat_id);
            if let Some(other) = seat_id.and_then(|s| self.staged.confirmed_for(s)) {
                if other.id != id {
                    return Err(StoreError::UniqueViolation(
                        "bookings_one_confirmed_per_seat_idx".into(),
                    ));
                }
            }
        }
        if let Some(booking) = self.staged.bookings.iter_mut().find(|b| b.id == id) {
            booking.status = status;
            booking.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnitOfWork {
            mut guard,
            staged,
            faults,
        } = *self;
        faults.trip(FaultPoint::Commit)?;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cabin_core::CabinSegment;
    use std::collections::BTreeSet;

    fn record(code: &str, row: i32) -> NewSeat {
        NewSeat {
            code: code.into(),
            available: true,
            price: 15000,
            currency: "USD".into(),
            row_number: row,
            segment: CabinSegment::for_row(row),
            is_window: false,
            is_aisle: false,
            aircraft: "7M8".into(),
            characteristics: BTreeSet::new(),
        }
    }

    #[tokio::test]
    async fn test_uncommitted_unit_of_work_is_discarded() {
        let store = MemoryReservationStore::new();
        let seats = store.replace_inventory(vec![record("12A", 12)]).await.unwrap();
        let seat = &seats[0];

        {
            let mut uow = store.begin().await.unwrap();
            let booking = Booking::confirmed(Principal::new("7"), seat, Utc::now());
            uow.insert_booking(&booking).await.unwrap();
            uow.set_seat_available(seat.id, false).await.unwrap();
            // dropped without commit
        }

        assert!(store.ledger().await.is_empty());
        assert!(store.seat(seat.id).await.unwrap().unwrap().available);
    }

    #[tokio::test]
    async fn test_second_confirmed_booking_violates_unique_rule() {
        let store = MemoryReservationStore::new();
        let seats = store.replace_inventory(vec![record("12A", 12)]).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.insert_booking(&Booking::confirmed(Principal::new("7"), &seats[0], Utc::now()))
            .await
            .unwrap();
        let err = uow
            .insert_booking(&Booking::confirmed(Principal::new("8"), &seats[0], Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_replace_tombstones_previous_inventory() {
        let store = MemoryReservationStore::new();
        let old = store.replace_inventory(vec![record("1A", 1), record("1B", 1)]).await.unwrap();
        let new = store.replace_inventory(vec![record("1A", 1)]).await.unwrap();

        let live = store.all_seats().await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, new[0].id);
        assert!(store.seat(old[0].id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_inventory() {
        let store = MemoryReservationStore::new();
        store.replace_inventory(vec![record("1A", 1)]).await.unwrap();

        let err = store
            .replace_inventory(vec![record("2A", 2), record("2A", 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));

        let live = store.all_seats().await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].code, "1A");
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once() {
        let store = MemoryReservationStore::new();
        store.inject_fault(FaultPoint::Begin, StoreError::Transient("down".into()));

        assert!(store.begin().await.is_err());
        assert!(store.begin().await.is_ok());
    }
}
