use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ParseEnumError, ReservationError};
use crate::ids::{BookingId, Principal, SeatId};
use crate::seat::Seat;

/// Booking status in the lifecycle.
///
/// Claims create bookings directly as `Confirmed`; `Pending` is reserved for a
/// future approval step and is never produced today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(ParseEnumError {
                kind: "booking status",
                value: other.to_string(),
            }),
        }
    }
}

/// One reservation attempt by one principal for one seat.
///
/// Price and currency are a snapshot of the seat at claim time and are never
/// re-read from the seat afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub principal: Principal,
    pub seat_id: SeatId,
    pub status: BookingStatus,
    pub booked_at: DateTime<Utc>,
    /// Minor currency units, captured from the seat.
    pub price: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// A new Confirmed booking holding `seat` for `principal`.
    pub fn confirmed(principal: Principal, seat: &Seat, now: DateTime<Utc>) -> Self {
        Self {
            id: BookingId::new(),
            principal,
            seat_id: seat.id,
            status: BookingStatus::Confirmed,
            booked_at: now,
            price: seat.price,
            currency: seat.currency.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Transition to Cancelled. Any non-cancelled status may be cancelled;
    /// a second cancellation is rejected rather than ignored.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), ReservationError> {
        if self.status == BookingStatus::Cancelled {
            return Err(ReservationError::AlreadyCancelled(self.id));
        }
        self.status = BookingStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }
}

/// A booking with its seat relation resolved for the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingWithSeat {
    #[serde(flatten)]
    pub booking: Booking,
    pub seat: Seat,
}
