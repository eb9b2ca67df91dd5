use cabin_core::{
    Booking, BookingId, BookingStatus, BookingWithSeat, CoreResult, Principal, ReservationError,
    ReservationStore, SeatId, StoreError,
};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Retry policy for transient store failures. Conflicts and not-found
/// outcomes are never retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
        }
    }

    /// Single attempt, no retry.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Exponential: base, 2*base, 4*base, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1u32 << exp)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50))
    }
}

/// Moves seat/booking pairs between availability states.
///
/// Every claim and release runs inside one unit of work from the injected
/// store; mutual exclusion between concurrent callers comes from the store
/// (row lock plus unique index), never from this type.
pub struct ReservationEngine {
    store: Arc<dyn ReservationStore>,
    retry: RetryPolicy,
}

impl ReservationEngine {
    pub fn new(store: Arc<dyn ReservationStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Reserve `seat_id` for `principal`.
    ///
    /// Exactly one of any number of concurrent claims on the same seat
    /// succeeds; the rest fail with [`ReservationError::SeatAlreadyBooked`].
    pub async fn claim(&self, principal: &Principal, seat_id: SeatId) -> CoreResult<BookingWithSeat> {
        self.with_retry("claim", || self.claim_once(principal, seat_id)).await
    }

    /// Cancel a booking owned by `principal` and make its seat claimable again.
    pub async fn release(&self, principal: &Principal, booking_id: BookingId) -> CoreResult<Booking> {
        self.with_retry("release", || self.release_once(principal, booking_id)).await
    }

    async fn claim_once(&self, principal: &Principal, seat_id: SeatId) -> CoreResult<BookingWithSeat> {
        let mut uow = self.store.begin().await?;

        let seat = uow
            .lock_seat(seat_id)
            .await?
            .ok_or(ReservationError::SeatNotFound(seat_id))?;

        if let Some(existing) = uow.confirmed_booking_for_seat(seat_id).await? {
            if seat.available {
                warn!(%seat_id, booking_id = %existing.id, "Seat flagged available while held; repairing flag");
                uow.set_seat_available(seat_id, false).await?;
                uow.commit().await?;
            }
            debug!(%seat_id, %principal, "Claim rejected: seat already booked");
            return Err(ReservationError::SeatAlreadyBooked(seat_id));
        }

        if !seat.available {
            warn!(%seat_id, "Seat flagged unavailable with no confirmed booking; ledger wins");
        }

        let booking = Booking::confirmed(principal.clone(), &seat, Utc::now());
        match uow.insert_booking(&booking).await {
            Err(StoreError::UniqueViolation(_)) => {
                debug!(%seat_id, %principal, "Claim lost the race on insert");
                return Err(ReservationError::SeatAlreadyBooked(seat_id));
            }
            other => other?,
        }
        uow.set_seat_available(seat_id, false).await?;

        let seat = uow.seat_including_deleted(seat_id).await?.ok_or_else(|| {
            ReservationError::InvariantViolation(format!("seat {seat_id} vanished mid-claim"))
        })?;

        uow.commit().await?;

        info!(booking_id = %booking.id, %seat_id, seat_code = %seat.code, %principal, "Seat claimed");
        Ok(BookingWithSeat { booking, seat })
    }

    async fn release_once(&self, principal: &Principal, booking_id: BookingId) -> CoreResult<Booking> {
        let mut uow = self.store.begin().await?;

        let mut booking = uow
            .lock_booking_for_owner(booking_id, principal)
            .await?
            .ok_or(ReservationError::BookingNotFound(booking_id))?;

        let was_confirmed = booking.is_confirmed();
        if let Err(err) = booking.cancel(Utc::now()) {
            debug!(%booking_id, %principal, "Release rejected: already cancelled");
            return Err(err);
        }

        // Seat first, so a concurrent claim on it waits for this unit of work.
        // Retired seats are included: their flag must still follow the ledger.
        let seat = uow
            .lock_seat_including_deleted(booking.seat_id)
            .await?
            .ok_or_else(|| {
                ReservationError::InvariantViolation(format!(
                    "booking {} references missing seat {}",
                    booking_id, booking.seat_id
                ))
            })?;
        uow.set_booking_status(booking_id, BookingStatus::Cancelled).await?;

        let still_held = uow.confirmed_booking_for_seat(seat.id).await?;
        if let Some(other) = &still_held {
            if was_confirmed {
                return Err(ReservationError::InvariantViolation(format!(
                    "seat {} still held by booking {} after cancelling {}",
                    seat.id, other.id, booking_id
                )));
            }
        }
        uow.set_seat_available(seat.id, still_held.is_none()).await?;
        if seat.is_deleted() {
            debug!(%booking_id, seat_id = %seat.id, "Released seat was retired by catalog replace");
        }

        uow.commit().await?;

        info!(%booking_id, seat_id = %booking.seat_id, %principal, "Booking cancelled");
        Ok(booking)
    }

    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut attempt_fn: F) -> CoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CoreResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_fn().await {
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(op, attempt, ?delay, error = %err, "Transient store failure, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
