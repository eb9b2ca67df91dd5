use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use cabin_core::{BookingId, BookingWithSeat, Principal, SeatId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ClaimSeatRequest {
    pub seat_id: Uuid,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

/// Routes that act on behalf of the authenticated principal.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(claim_seat).get(list_bookings))
        .route("/v1/bookings/{booking_id}/cancel", post(cancel_booking))
}

async fn claim_seat(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<ClaimSeatRequest>,
) -> Result<(StatusCode, Json<BookingWithSeat>), AppError> {
    let booked = state.engine.claim(&principal, SeatId::from(req.seat_id)).await?;
    Ok((StatusCode::CREATED, Json(booked)))
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<BookingWithSeat>>, AppError> {
    Ok(Json(state.queries.list_for_principal(&principal).await?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let booking_id = BookingId::from(booking_id);
    state.engine.release(&principal, booking_id).await?;
    Ok(Json(MessageResponse {
        message: format!("Booking {booking_id} cancelled"),
    }))
}
