//! Booking model, persisted lifecycle status and query-only state filter

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// Persisted booking lifecycle status.
///
/// `Waiting` is the only non-terminal status. `Canceled` has no transition
/// into it here and is kept as a reserved terminal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Waiting,
    Approved,
    Rejected,
    Canceled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Waiting => "WAITING",
            BookingStatus::Approved => "APPROVED",
            BookingStatus::Rejected => "REJECTED",
            BookingStatus::Canceled => "CANCELED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Waiting)
    }

    /// Status reached from `Waiting` by an owner decision
    pub fn decided(approved: bool) -> Self {
        if approved {
            BookingStatus::Approved
        } else {
            BookingStatus::Rejected
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = AppError;

    /// Parses the stored column value; anything else means a corrupt row.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(BookingStatus::Waiting),
            "APPROVED" => Ok(BookingStatus::Approved),
            "REJECTED" => Ok(BookingStatus::Rejected),
            "CANCELED" => Ok(BookingStatus::Canceled),
            other => Err(AppError::Internal(format!("unexpected booking status: {}", other))),
        }
    }
}

/// Filter accepted by the booking listings. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingState {
    All,
    Current,
    Past,
    Future,
    Waiting,
    Approved,
    Rejected,
}

impl FromStr for BookingState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALL" => Ok(BookingState::All),
            "CURRENT" => Ok(BookingState::Current),
            "PAST" => Ok(BookingState::Past),
            "FUTURE" => Ok(BookingState::Future),
            "WAITING" => Ok(BookingState::Waiting),
            "APPROVED" => Ok(BookingState::Approved),
            "REJECTED" => Ok(BookingState::Rejected),
            _ => Err(AppError::Validation(format!("unknown state: {}", s))),
        }
    }
}

impl BookingState {
    /// Persisted status this filter matches exactly, if it is a status filter
    pub fn status(&self) -> Option<BookingStatus> {
        match self {
            BookingState::Waiting => Some(BookingStatus::Waiting),
            BookingState::Approved => Some(BookingStatus::Approved),
            BookingState::Rejected => Some(BookingStatus::Rejected),
            _ => None,
        }
    }

    /// Whether `booking` belongs to this state at instant `now`
    pub fn matches(&self, booking: &Booking, now: DateTime<Utc>) -> bool {
        match self {
            BookingState::All => true,
            BookingState::Current => booking.start <= now && booking.end > now,
            BookingState::Past => booking.end < now,
            BookingState::Future => booking.start > now,
            BookingState::Waiting | BookingState::Approved | BookingState::Rejected => {
                self.status() == Some(booking.status)
            }
        }
    }
}

/// Item snapshot embedded in a booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingItem {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
}

/// Booker snapshot embedded in a booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BookingUser {
    pub id: i64,
    pub name: String,
}

/// A reservation of an item by a user over `[start, end)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Booking {
    pub id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: BookingStatus,
    pub item: BookingItem,
    pub booker: BookingUser,
}

/// Create booking request. A `status` sent by the caller is ignored.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBooking {
    pub item_id: i64,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Validated booking ready to be stored with status `Waiting`
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub item_id: i64,
    pub booker_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Page derived from the `from`/`size` pair of the listing endpoints.
///
/// `from` is rounded down to the page that contains it, so a `from` that is
/// not a multiple of `size` does not produce an exact offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
}

impl PageRequest {
    pub fn from_offset(from: i64, size: i64) -> AppResult<Self> {
        if from < 0 {
            return Err(AppError::Validation(format!("from must not be negative: {}", from)));
        }
        if size <= 0 {
            return Err(AppError::Validation(format!("size must be positive: {}", size)));
        }
        Ok(Self { page: from / size, size })
    }

    pub fn offset(&self) -> i64 {
        self.page * self.size
    }

    /// Apply this page to an already sorted sequence
    pub fn slice<T>(&self, rows: impl IntoIterator<Item = T>) -> Vec<T> {
        rows.into_iter()
            .skip(self.offset() as usize)
            .take(self.size as usize)
            .collect()
    }
}

/// Listing query with a single `now` snapshot shared by every row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookingQuery {
    pub state: BookingState,
    pub now: DateTime<Utc>,
    pub page: PageRequest,
}

/// Short booking form shown on the owner's item list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingShort {
    pub id: i64,
    pub booker_id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl From<&Booking> for BookingShort {
    fn from(b: &Booking) -> Self {
        Self {
            id: b.id,
            booker_id: b.booker.id,
            start: b.start,
            end: b.end,
        }
    }
}

/// Most recently concluded and soonest upcoming bookings of one item.
///
/// Status is deliberately not considered: a `WAITING` booking can be next.
pub fn last_and_next(
    bookings: &[Booking],
    now: DateTime<Utc>,
) -> (Option<BookingShort>, Option<BookingShort>) {
    let last = bookings
        .iter()
        .filter(|b| b.end < now)
        .max_by_key(|b| b.end)
        .map(BookingShort::from);
    let next = bookings
        .iter()
        .filter(|b| b.start > now)
        .min_by_key(|b| b.start)
        .map(BookingShort::from);
    (last, next)
}
