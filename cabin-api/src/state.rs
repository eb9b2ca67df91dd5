use cabin_booking::{BookingQueries, ReservationEngine, RetryPolicy};
use cabin_catalog::CatalogImporter;
use cabin_core::ReservationStore;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReservationEngine>,
    pub queries: Arc<BookingQueries>,
    pub importer: Arc<CatalogImporter>,
    pub auth: AuthConfig,
    /// Source document for `POST /v1/seats/import`. Import is refused when unset.
    pub seat_map_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        retry: RetryPolicy,
        auth: AuthConfig,
        seat_map_path: Option<PathBuf>,
    ) -> Self {
        Self {
            engine: Arc::new(ReservationEngine::new(store.clone(), retry)),
            queries: Arc::new(BookingQueries::new(store.clone())),
            importer: Arc::new(CatalogImporter::new(store)),
            auth,
            seat_map_path,
        }
    }
}
