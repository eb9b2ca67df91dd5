pub mod app_config;
pub mod database;
pub mod memory;
pub mod pg_store;

pub use database::DbClient;
pub use memory::{FaultPoint, MemoryReservationStore};
pub use pg_store::PgReservationStore;
