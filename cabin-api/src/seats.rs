use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use cabin_core::{Seat, SeatId};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct ImportResponse {
    imported: usize,
}

/// Read-only catalog views. No principal required.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/seats", get(list_seats))
        .route("/v1/seats/available", get(list_available_seats))
        .route("/v1/seats/{seat_id}", get(get_seat))
}

/// Inventory replacement. Mounted behind the auth layer.
pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/v1/seats/import", post(import_seats))
}

async fn list_seats(State(state): State<AppState>) -> Result<Json<Vec<Seat>>, AppError> {
    Ok(Json(state.queries.list_seats().await?))
}

async fn list_available_seats(State(state): State<AppState>) -> Result<Json<Vec<Seat>>, AppError> {
    Ok(Json(state.queries.list_available_seats().await?))
}

async fn get_seat(
    State(state): State<AppState>,
    Path(seat_id): Path<Uuid>,
) -> Result<Json<Seat>, AppError> {
    Ok(Json(state.queries.get_seat(SeatId::from(seat_id)).await?))
}

async fn import_seats(State(state): State<AppState>) -> Result<Json<ImportResponse>, AppError> {
    let path = state
        .seat_map_path
        .as_ref()
        .ok_or_else(|| AppError::Validation("No seat map configured".to_string()))?;

    let seats = state.importer.import_file(path).await?;
    info!(count = seats.len(), "Seat inventory replaced via API");

    Ok(Json(ImportResponse {
        imported: seats.len(),
    }))
}
