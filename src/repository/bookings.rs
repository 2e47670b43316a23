//! Bookings repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::booking::{
        Booking, BookingItem, BookingQuery, BookingState, BookingStatus, BookingUser, NewBooking,
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookingsRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Booking>>;

    /// Store a new `WAITING` booking.
    ///
    /// The item is re-checked for availability atomically with the insert.
    async fn create(&self, booking: &NewBooking) -> AppResult<Booking>;

    /// Move a booking out of `WAITING` into `status`.
    ///
    /// Returns `None` when the booking is missing or no longer `WAITING`;
    /// of two concurrent callers at most one gets `Some`.
    async fn transition_from_waiting(&self, id: i64, status: BookingStatus) -> AppResult<Option<Booking>>;

    /// Bookings made by `booker_id`, filtered and paged, `start` descending
    async fn find_by_booker(&self, booker_id: i64, query: &BookingQuery) -> AppResult<Vec<Booking>>;

    /// Bookings on items owned by `owner_id`, filtered and paged, `start` descending
    async fn find_by_owner(&self, owner_id: i64, query: &BookingQuery) -> AppResult<Vec<Booking>>;

    /// Every booking of one item, `start` ascending
    async fn find_by_item(&self, item_id: i64) -> AppResult<Vec<Booking>>;
}

const BOOKING_SELECT: &str = r#"
    SELECT b.id, b.start_date, b.end_date, b.status,
           i.id AS item_id, i.name AS item_name, i.owner_id,
           u.id AS booker_id, u.name AS booker_name
    FROM bookings b
    JOIN items i ON b.item_id = i.id
    JOIN users u ON b.booker_id = u.id
"#;

/// Booking joined with its item and booker
#[derive(Debug, FromRow)]
struct BookingRow {
    id: i64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    status: String,
    item_id: i64,
    item_name: String,
    owner_id: i64,
    booker_id: i64,
    booker_name: String,
}

impl TryFrom<BookingRow> for Booking {
    type Error = AppError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            start: row.start_date,
            end: row.end_date,
            status: row.status.parse()?,
            item: BookingItem {
                id: row.item_id,
                name: row.item_name,
                owner_id: row.owner_id,
            },
            booker: BookingUser {
                id: row.booker_id,
                name: row.booker_name,
            },
        })
    }
}

fn into_bookings(rows: Vec<BookingRow>) -> AppResult<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

#[derive(Clone)]
pub struct PgBookingsRepository {
    pool: Pool<Postgres>,
}

impl PgBookingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Shared listing query; `party_column` selects booker or owner
    async fn find_filtered(
        &self,
        party_column: &str,
        party_id: i64,
        query: &BookingQuery,
    ) -> AppResult<Vec<Booking>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(BOOKING_SELECT);
        builder.push(format!(" WHERE {} = ", party_column));
        builder.push_bind(party_id);

        match query.state {
            BookingState::All => {}
            BookingState::Current => {
                builder.push(" AND b.start_date <= ");
                builder.push_bind(query.now);
                builder.push(" AND b.end_date > ");
                builder.push_bind(query.now);
            }
            BookingState::Past => {
                builder.push(" AND b.end_date < ");
                builder.push_bind(query.now);
            }
            BookingState::Future => {
                builder.push(" AND b.start_date > ");
                builder.push_bind(query.now);
            }
            BookingState::Waiting | BookingState::Approved | BookingState::Rejected => {
                if let Some(status) = query.state.status() {
                    builder.push(" AND b.status = ");
                    builder.push_bind(status.as_str());
                }
            }
        }

        builder.push(" ORDER BY b.start_date DESC, b.id DESC LIMIT ");
        builder.push_bind(query.page.size);
        builder.push(" OFFSET ");
        builder.push_bind(query.page.offset());

        let rows = builder
            .build_query_as::<BookingRow>()
            .fetch_all(&self.pool)
            .await?;
        into_bookings(rows)
    }
}

#[async_trait]
impl BookingsRepository for PgBookingsRepository {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Booking>> {
        sqlx::query_as::<_, BookingRow>(&format!("{} WHERE b.id = $1", BOOKING_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Booking::try_from)
            .transpose()
    }

    async fn create(&self, booking: &NewBooking) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await?;

        // Hold the item row so availability cannot flip under the insert
        let available: bool =
            sqlx::query_scalar::<_, bool>("SELECT available FROM items WHERE id = $1 FOR SHARE")
                .bind(booking.item_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Item {} not found", booking.item_id)))?;

        if !available {
            return Err(AppError::Validation("item not available".to_string()));
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO bookings (start_date, end_date, item_id, booker_id, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(booking.start)
        .bind(booking.end)
        .bind(booking.item_id)
        .bind(booking.booker_id)
        .bind(BookingStatus::Waiting.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, BookingRow>(&format!("{} WHERE b.id = $1", BOOKING_SELECT))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Booking::try_from(row)
    }

    async fn transition_from_waiting(&self, id: i64, status: BookingStatus) -> AppResult<Option<Booking>> {
        let mut tx = self.pool.begin().await?;

        // The conditional UPDATE takes the row lock itself. A concurrent
        // decider waits on it, re-evaluates the status predicate against the
        // committed row and updates nothing.
        let updated = sqlx::query("UPDATE bookings SET status = $1 WHERE id = $2 AND status = $3")
            .bind(status.as_str())
            .bind(id)
            .bind(BookingStatus::Waiting.as_str())
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        let row = sqlx::query_as::<_, BookingRow>(&format!("{} WHERE b.id = $1", BOOKING_SELECT))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Booking::try_from(row).map(Some)
    }

    async fn find_by_booker(&self, booker_id: i64, query: &BookingQuery) -> AppResult<Vec<Booking>> {
        self.find_filtered("b.booker_id", booker_id, query).await
    }

    async fn find_by_owner(&self, owner_id: i64, query: &BookingQuery) -> AppResult<Vec<Booking>> {
        self.find_filtered("i.owner_id", owner_id, query).await
    }

    async fn find_by_item(&self, item_id: i64) -> AppResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "{} WHERE b.item_id = $1 ORDER BY b.start_date ASC, b.id ASC",
            BOOKING_SELECT
        ))
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        into_bookings(rows)
    }
}
