use cabin_core::{CabinSegment, NewSeat};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

use crate::importer::CatalogError;

/// Slot code marking an entry as a physical seat (as opposed to aisles,
/// galleys, exits and blanks that share the row layout).
const SEAT_SLOT: &str = "SEAT";
const WINDOW: &str = "W";
const AISLE: &str = "A";
/// ISO 4217 "no currency", used for seats the feed publishes without a price.
const NO_CURRENCY: &str = "XXX";

// ============================================================================
// External seat-map document
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatMapDocument {
    #[serde(default)]
    pub seats_itinerary_parts: Vec<ItineraryPart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryPart {
    #[serde(default)]
    pub segment_seat_maps: Vec<SegmentSeatMap>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSeatMap {
    #[serde(default)]
    pub passenger_seat_maps: Vec<PassengerSeatMap>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerSeatMap {
    #[serde(default)]
    pub seat_map: SeatMap,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatMap {
    #[serde(default)]
    pub aircraft: String,
    #[serde(default)]
    pub cabins: Vec<Cabin>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cabin {
    #[serde(default)]
    pub deck: Option<String>,
    #[serde(default)]
    pub seat_columns: Vec<String>,
    #[serde(default)]
    pub seat_rows: Vec<SeatRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatRow {
    pub row_number: i32,
    #[serde(default)]
    pub seat_codes: Vec<String>,
    #[serde(default)]
    pub seats: Vec<SeatEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatEntry {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub storefront_slot_code: String,
    #[serde(default)]
    pub seat_characteristics: Vec<String>,
    #[serde(default)]
    pub designations: Vec<String>,
    #[serde(default)]
    pub prices: Prices,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Prices {
    #[serde(default)]
    pub alternatives: Vec<Vec<PriceAlternative>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceAlternative {
    pub amount: f64,
    pub currency: String,
}

impl SeatEntry {
    /// First alternative of the first price group, in minor units.
    fn price(&self) -> (i64, String) {
        match self.prices.alternatives.first().and_then(|group| group.first()) {
            Some(alt) => ((alt.amount * 100.0).round() as i64, alt.currency.clone()),
            None => (0, NO_CURRENCY.to_string()),
        }
    }
}

// ============================================================================
// Flattening
// ============================================================================

/// Flatten every seat of every cabin of every passenger seat map into flat
/// import records. Non-seat slots are dropped.
pub fn flatten(document: &SeatMapDocument) -> Vec<NewSeat> {
    let mut seats = Vec::new();

    let seat_maps = document
        .seats_itinerary_parts
        .iter()
        .flat_map(|part| &part.segment_seat_maps)
        .flat_map(|segment| &segment.passenger_seat_maps)
        .map(|pax| &pax.seat_map);

    for seat_map in seat_maps {
        for cabin in &seat_map.cabins {
            for row in &cabin.seat_rows {
                for entry in &row.seats {
                    if entry.storefront_slot_code != SEAT_SLOT {
                        continue;
                    }
                    let Some(code) = entry.code.clone() else {
                        debug!(row = row.row_number, "Seat slot without a code, skipping");
                        continue;
                    };

                    let (price, currency) = entry.price();
                    let characteristics: BTreeSet<String> =
                        entry.seat_characteristics.iter().cloned().collect();

                    seats.push(NewSeat {
                        code,
                        available: entry.available,
                        price,
                        currency,
                        row_number: row.row_number,
                        segment: CabinSegment::for_row(row.row_number),
                        is_window: characteristics.contains(WINDOW),
                        is_aisle: characteristics.contains(AISLE),
                        aircraft: seat_map.aircraft.clone(),
                        characteristics,
                    });
                }
            }
        }
    }

    seats
}

/// Read and parse a seat-map document from disk.
pub async fn load_seat_map(path: impl AsRef<Path>) -> Result<SeatMapDocument, CatalogError> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
