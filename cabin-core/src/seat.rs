use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{ParseEnumError, ReservationError};
use crate::ids::SeatId;

/// Cabin segment, derived from the row number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CabinSegment {
    First,
    Business,
    Economy,
}

impl CabinSegment {
    /// Rows 1-2 are First, 3-7 Business, everything behind is Economy.
    pub fn for_row(row_number: i32) -> Self {
        if row_number <= 2 {
            CabinSegment::First
        } else if row_number <= 7 {
            CabinSegment::Business
        } else {
            CabinSegment::Economy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CabinSegment::First => "FIRST",
            CabinSegment::Business => "BUSINESS",
            CabinSegment::Economy => "ECONOMY",
        }
    }
}

impl fmt::Display for CabinSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CabinSegment {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FIRST" => Ok(CabinSegment::First),
            "BUSINESS" => Ok(CabinSegment::Business),
            "ECONOMY" => Ok(CabinSegment::Economy),
            other => Err(ParseEnumError {
                kind: "cabin segment",
                value: other.to_string(),
            }),
        }
    }
}

/// One bookable physical seat on one aircraft configuration.
///
/// `available` is a cache of "no Confirmed booking references this seat".
/// Only the reservation engine writes it, and always inside the same unit of
/// work that changes the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub code: String,
    pub available: bool,
    /// Minor currency units (cents).
    pub price: i64,
    pub currency: String,
    pub row_number: i32,
    pub segment: CabinSegment,
    pub is_window: bool,
    pub is_aisle: bool,
    pub aircraft: String,
    pub characteristics: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Seat {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Flat seat record handed over by the catalog import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSeat {
    pub code: String,
    pub available: bool,
    pub price: i64,
    pub currency: String,
    pub row_number: i32,
    pub segment: CabinSegment,
    pub is_window: bool,
    pub is_aisle: bool,
    pub aircraft: String,
    #[serde(default)]
    pub characteristics: BTreeSet<String>,
}

impl NewSeat {
    pub fn validate(&self) -> Result<(), ReservationError> {
        if self.code.trim().is_empty() {
            return Err(ReservationError::InvalidSeat("seat code is empty".into()));
        }
        if self.row_number < 1 {
            return Err(ReservationError::InvalidSeat(format!(
                "seat {} has non-positive row {}",
                self.code, self.row_number
            )));
        }
        if self.price < 0 {
            return Err(ReservationError::InvalidSeat(format!(
                "seat {} has negative price",
                self.code
            )));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ReservationError::InvalidSeat(format!(
                "seat {} has malformed currency {:?}",
                self.code, self.currency
            )));
        }
        if self.segment != CabinSegment::for_row(self.row_number) {
            return Err(ReservationError::InvalidSeat(format!(
                "seat {} is in row {} but labelled {}",
                self.code, self.row_number, self.segment
            )));
        }
        Ok(())
    }

    /// Materialize as a live seat. Freshly imported seats have no bookings,
    /// so they always start available regardless of what the feed said.
    pub fn into_seat(self, now: DateTime<Utc>) -> Seat {
        Seat {
            id: SeatId::new(),
            code: self.code,
            available: true,
            price: self.price,
            currency: self.currency,
            row_number: self.row_number,
            segment: self.segment,
            is_window: self.is_window,
            is_aisle: self.is_aisle,
            aircraft: self.aircraft,
            characteristics: self.characteristics,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// Validate a full replacement inventory: every record on its own, plus
/// seat-code uniqueness across the whole set.
pub fn validate_inventory(seats: &[NewSeat]) -> Result<(), ReservationError> {
    let mut codes = HashSet::with_capacity(seats.len());
    for seat in seats {
        seat.validate()?;
        if !codes.insert(seat.code.as_str()) {
            return Err(ReservationError::InvalidSeat(format!(
                "duplicate seat code {}",
                seat.code
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat(code: &str, row: i32) -> NewSeat {
        NewSeat {
            code: code.to_string(),
            available: true,
            price: 15000,
            currency: "USD".to_string(),
            row_number: row,
            segment: CabinSegment::for_row(row),
            is_window: code.ends_with('A'),
            is_aisle: false,
            aircraft: "7M8".to_string(),
            characteristics: BTreeSet::new(),
        }
    }

    #[test]
    fn test_segment_boundaries() {
        assert_eq!(CabinSegment::for_row(1), CabinSegment::First);
        assert_eq!(CabinSegment::for_row(2), CabinSegment::First);
        assert_eq!(CabinSegment::for_row(3), CabinSegment::Business);
        assert_eq!(CabinSegment::for_row(7), CabinSegment::Business);
        assert_eq!(CabinSegment::for_row(8), CabinSegment::Economy);
        assert_eq!("BUSINESS".parse::<CabinSegment>().unwrap(), CabinSegment::Business);
        assert!("PREMIUM".parse::<CabinSegment>().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_records() {
        assert!(seat("12A", 12).validate().is_ok());

        let mut negative = seat("12A", 12);
        negative.price = -1;
        assert!(negative.validate().is_err());

        let mut bad_row = seat("0A", 0);
        bad_row.segment = CabinSegment::First;
        assert!(bad_row.validate().is_err());

        let mut bad_currency = seat("12A", 12);
        bad_currency.currency = "usd".into();
        assert!(bad_currency.validate().is_err());

        let mut mislabelled = seat("1A", 1);
        mislabelled.segment = CabinSegment::Economy;
        assert!(mislabelled.validate().is_err());
    }

    #[test]
    fn test_inventory_rejects_duplicate_codes() {
        let err = validate_inventory(&[seat("12A", 12), seat("12B", 12), seat("12A", 12)]).unwrap_err();
        assert!(matches!(err, ReservationError::InvalidSeat(msg) if msg.contains("12A")));
    }

    #[test]
    fn test_imported_seat_starts_available() {
        let mut record = seat("12A", 12);
        record.available = false;
        let live = record.into_seat(Utc::now());
        assert!(live.available);
        assert!(!live.is_deleted());
    }
}
