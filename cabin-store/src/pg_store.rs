use async_trait::async_trait;
use cabin_core::{
    Booking, BookingId, BookingStatus, BookingWithSeat, NewSeat, Principal, ReservationStore,
    Seat, SeatId, StoreError, UnitOfWork,
};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

macro_rules! seat_columns {
    () => {
        "id, code, available, price, currency, row_number, segment, is_window, is_aisle, aircraft, characteristics, created_at, updated_at, deleted_at"
    };
}

macro_rules! booking_columns {
    () => {
        "id, principal_id, seat_id, status, booked_at, price, currency, created_at, updated_at, deleted_at"
    };
}

// 14 binds per seat; stays well under the 65535 parameter limit.
const INSERT_CHUNK: usize = 1000;

// serialization_failure, deadlock_detected, lock_not_available, query_canceled
const TRANSIENT_SQLSTATES: [&str; 4] = ["40001", "40P01", "55P03", "57014"];

pub struct PgReservationStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PgReservationStore {
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self { pool, lock_timeout_ms }
    }

    async fn begin_tx(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        // Scoped to this transaction only.
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        Ok(tx)
    }
}

/// Sort a sqlx failure into the store error taxonomy.
pub(crate) fn classify(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) => {
            let code = db.code();
            match code.as_deref() {
                Some("23505") => StoreError::UniqueViolation(
                    db.constraint().unwrap_or("unique constraint").to_string(),
                ),
                Some(c) if TRANSIENT_SQLSTATES.contains(&c) || c.starts_with("08") => {
                    StoreError::Transient(db.message().to_string())
                }
                _ => StoreError::Backend(err.to_string()),
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Transient(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    code: String,
    available: bool,
    price: i64,
    currency: String,
    row_number: i32,
    segment: String,
    is_window: bool,
    is_aisle: bool,
    aircraft: String,
    characteristics: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl SeatRow {
    fn into_seat(self) -> Result<Seat, StoreError> {
        let segment = self
            .segment
            .parse()
            .map_err(|e: cabin_core::ParseEnumError| StoreError::Backend(e.to_string()))?;

        Ok(Seat {
            id: SeatId::from(self.id),
            code: self.code,
            available: self.available,
            price: self.price,
            currency: self.currency,
            row_number: self.row_number,
            segment,
            is_window: self.is_window,
            is_aisle: self.is_aisle,
            aircraft: self.aircraft,
            characteristics: self.characteristics.into_iter().collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    principal_id: String,
    seat_id: Uuid,
    status: String,
    booked_at: DateTime<Utc>,
    price: i64,
    currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl BookingRow {
    fn into_booking(self) -> Result<Booking, StoreError> {
        let status = self
            .status
            .parse()
            .map_err(|e: cabin_core::ParseEnumError| StoreError::Backend(e.to_string()))?;

        Ok(Booking {
            id: BookingId::from(self.id),
            principal: Principal::new(self.principal_id),
            seat_id: SeatId::from(self.seat_id),
            status,
            booked_at: self.booked_at,
            price: self.price,
            currency: self.currency,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}

fn into_seats(rows: Vec<SeatRow>) -> Result<Vec<Seat>, StoreError> {
    rows.into_iter().map(SeatRow::into_seat).collect()
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.begin_tx().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn bookings_for_principal(
        &self,
        principal: &Principal,
    ) -> Result<Vec<BookingWithSeat>, StoreError> {
        let rows: Vec<BookingRow> = sqlx::query_as(concat!(
            "SELECT ",
            booking_columns!(),
            " FROM bookings WHERE principal_id = $1 AND deleted_at IS NULL ORDER BY created_at, id"
        ))
        .bind(principal.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        let seat_ids: Vec<Uuid> = rows.iter().map(|r| r.seat_id).collect();

        // Seats are resolved without the tombstone filter so history survives a catalog replace.
        let seat_rows: Vec<SeatRow> = sqlx::query_as(concat!(
            "SELECT ",
            seat_columns!(),
            " FROM seats WHERE id = ANY($1)"
        ))
        .bind(seat_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        let mut seats: HashMap<SeatId, Seat> = HashMap::with_capacity(seat_rows.len());
        for seat in into_seats(seat_rows)? {
            seats.insert(seat.id, seat);
        }

        rows.into_iter()
            .map(|row| {
                let booking = row.into_booking()?;
                let seat = seats.get(&booking.seat_id).cloned().ok_or_else(|| {
                    StoreError::Backend(format!(
                        "booking {} references missing seat {}",
                        booking.id, booking.seat_id
                    ))
                })?;
                Ok(BookingWithSeat { booking, seat })
            })
            .collect()
    }

    async fn available_seats(&self) -> Result<Vec<Seat>, StoreError> {
        let rows: Vec<SeatRow> = sqlx::query_as(concat!(
            "SELECT ",
            seat_columns!(),
            r#" FROM seats s
            WHERE s.deleted_at IS NULL
              AND NOT EXISTS (
                  SELECT 1 FROM bookings b
                  WHERE b.seat_id = s.id AND b.status = 'CONFIRMED' AND b.deleted_at IS NULL
              )
            ORDER BY s.row_number, s.code"#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        into_seats(rows)
    }

    async fn all_seats(&self) -> Result<Vec<Seat>, StoreError> {
        let rows: Vec<SeatRow> = sqlx::query_as(concat!(
            "SELECT ",
            seat_columns!(),
            " FROM seats WHERE deleted_at IS NULL ORDER BY row_number, code"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        into_seats(rows)
    }

    async fn seat(&self, id: SeatId) -> Result<Option<Seat>, StoreError> {
        let row: Option<SeatRow> = sqlx::query_as(concat!(
            "SELECT ",
            seat_columns!(),
            " FROM seats WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        row.map(SeatRow::into_seat).transpose()
    }

    async fn replace_inventory(&self, seats: Vec<NewSeat>) -> Result<Vec<Seat>, StoreError> {
        let now = Utc::now();
        let seats: Vec<Seat> = seats.into_iter().map(|s| s.into_seat(now)).collect();

        let mut tx = self.begin_tx().await?;

        let tombstoned = sqlx::query(
            "UPDATE seats SET deleted_at = $1, updated_at = $1 WHERE deleted_at IS NULL",
        )
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(classify)?
        .rows_affected();

        for chunk in seats.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new(concat!("INSERT INTO seats (", seat_columns!(), ") "));
            qb.push_values(chunk, |mut b, seat| {
                b.push_bind(seat.id.as_uuid())
                    .push_bind(seat.code.clone())
                    .push_bind(seat.available)
                    .push_bind(seat.price)
                    .push_bind(seat.currency.clone())
                    .push_bind(seat.row_number)
                    .push_bind(seat.segment.as_str())
                    .push_bind(seat.is_window)
                    .push_bind(seat.is_aisle)
                    .push_bind(seat.aircraft.clone())
                    .push_bind(seat.characteristics.iter().cloned().collect::<Vec<String>>())
                    .push_bind(seat.created_at)
                    .push_bind(seat.updated_at)
                    .push_bind(seat.deleted_at);
            });
            qb.build().execute(&mut *tx).await.map_err(classify)?;
        }

        tx.commit().await.map_err(classify)?;

        info!(tombstoned, inserted = seats.len(), "Seat inventory replaced");
        Ok(seats)
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_seat(&mut self, id: SeatId) -> Result<Option<Seat>, StoreError> {
        let row: Option<SeatRow> = sqlx::query_as(concat!(
            "SELECT ",
            seat_columns!(),
            " FROM seats WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;

        row.map(SeatRow::into_seat).transpose()
    }

    async fn seat_including_deleted(&mut self, id: SeatId) -> Result<Option<Seat>, StoreError> {
        let row: Option<SeatRow> = sqlx::query_as(concat!(
            "SELECT ",
            seat_columns!(),
            " FROM seats WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;

        row.map(SeatRow::into_seat).transpose()
    }

    async fn lock_seat_including_deleted(&mut self, id: SeatId) -> Result<Option<Seat>, StoreError> {
        let row: Option<SeatRow> = sqlx::query_as(concat!(
            "SELECT ",
            seat_columns!(),
            " FROM seats WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;

        row.map(SeatRow::into_seat).transpose()
    }

    async fn confirmed_booking_for_seat(&mut self, id: SeatId) -> Result<Option<Booking>, StoreError> {
        let row: Option<BookingRow> = sqlx::query_as(concat!(
            "SELECT ",
            booking_columns!(),
            " FROM bookings WHERE seat_id = $1 AND status = 'CONFIRMED' AND deleted_at IS NULL"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;

        row.map(BookingRow::into_booking).transpose()
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(concat!(
            "INSERT INTO bookings (",
            booking_columns!(),
            ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(booking.id.as_uuid())
        .bind(booking.principal.as_str())
        .bind(booking.seat_id.as_uuid())
        .bind(booking.status.as_str())
        .bind(booking.booked_at)
        .bind(booking.price)
        .bind(booking.currency.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .bind(booking.deleted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;

        Ok(())
    }

    async fn set_seat_available(&mut self, id: SeatId, available: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE seats SET available = $1, updated_at = NOW() WHERE id = $2")
            .bind(available)
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;

        Ok(())
    }

    async fn lock_booking_for_owner(
        &mut self,
        id: BookingId,
        owner: &Principal,
    ) -> Result<Option<Booking>, StoreError> {
        let row: Option<BookingRow> = sqlx::query_as(concat!(
            "SELECT ",
            booking_columns!(),
            " FROM bookings WHERE id = $1 AND principal_id = $2 AND deleted_at IS NULL FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .bind(owner.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;

        row.map(BookingRow::into_booking).transpose()
    }

    async fn set_booking_status(
        &mut self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE bookings SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.tx.commit().await.map_err(classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_transient() {
        assert!(classify(sqlx::Error::PoolTimedOut).is_transient());
        assert!(classify(sqlx::Error::PoolClosed).is_transient());
    }

    #[test]
    fn test_row_not_found_is_backend() {
        assert!(matches!(classify(sqlx::Error::RowNotFound), StoreError::Backend(_)));
    }

    #[test]
    fn test_seat_row_rejects_unknown_segment() {
        let now = Utc::now();
        let row = SeatRow {
            id: Uuid::new_v4(),
            code: "12A".into(),
            available: true,
            price: 15000,
            currency: "USD".into(),
            row_number: 12,
            segment: "PREMIUM".into(),
            is_window: true,
            is_aisle: false,
            aircraft: "7M8".into(),
            characteristics: vec!["W".into()],
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        assert!(row.into_seat().is_err());
    }
}
