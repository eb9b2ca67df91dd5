pub mod importer;
pub mod seat_map;

pub use importer::{CatalogError, CatalogImporter};
pub use seat_map::{flatten, load_seat_map, SeatMapDocument};
