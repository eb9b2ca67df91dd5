use cabin_core::{validate_inventory, ReservationError, ReservationStore, Seat};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::seat_map::{flatten, load_seat_map, SeatMapDocument};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read seat map: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed seat map: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Rejected(#[from] ReservationError),
}

/// Replaces the seat inventory with the contents of an external seat map.
pub struct CatalogImporter {
    store: Arc<dyn ReservationStore>,
}

impl CatalogImporter {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    pub async fn import_file(&self, path: impl AsRef<Path>) -> Result<Vec<Seat>, CatalogError> {
        let path = path.as_ref();
        info!("Importing seat map from {}", path.display());
        let document = load_seat_map(path).await?;
        self.import_document(&document).await
    }

    /// Flatten, validate, then clear-and-insert in one unit of work. A
    /// rejected import leaves the previous inventory untouched.
    pub async fn import_document(&self, document: &SeatMapDocument) -> Result<Vec<Seat>, CatalogError> {
        let records = flatten(document);
        validate_inventory(&records)?;

        let held_by_feed = records.iter().filter(|s| !s.available).count();
        if held_by_feed > 0 {
            warn!(
                held_by_feed,
                "Seat map marks seats unavailable; imported seats start available until booked"
            );
        }

        let seats = self
            .store
            .replace_inventory(records)
            .await
            .map_err(ReservationError::from)?;

        info!(count = seats.len(), "Seat map imported");
        Ok(seats)
    }
}
