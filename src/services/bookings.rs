//! Booking engine: creation, owner decisions and filtered listings

use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::{
        booking::{Booking, BookingQuery, BookingState, BookingStatus, CreateBooking, NewBooking, PageRequest},
        user::User,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct BookingsService {
    repository: Repository,
}

impl BookingsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Create a booking request, always stored as `WAITING`.
    ///
    /// Preconditions are checked in order and the first failure wins:
    /// booker exists, item exists, item available, booker is not the owner,
    /// dates present with `end > start`. Overlapping bookings are accepted.
    pub async fn create_booking(&self, booker_id: i64, request: CreateBooking) -> AppResult<Booking> {
        self.require_user(booker_id).await?;

        let item = self
            .repository
            .items
            .find_by_id(request.item_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!("Booking create: item id={} not found", request.item_id);
                AppError::NotFound(format!("Item {} not found", request.item_id))
            })?;

        if !item.available {
            tracing::warn!("Booking create: item id={} is not available", item.id);
            return Err(AppError::Validation("item not available".to_string()));
        }

        if item.owner_id == booker_id {
            tracing::warn!("Booking create: owner id={} tried to book own item id={}", booker_id, item.id);
            return Err(AppError::Validation("owner cannot book own item".to_string()));
        }

        let (start, end) = match (request.start, request.end) {
            (Some(start), Some(end)) if end > start => (start, end),
            (start, end) => {
                tracing::warn!("Booking create: invalid dates start={:?} end={:?}", start, end);
                return Err(AppError::Validation("invalid dates".to_string()));
            }
        };

        let booking = self
            .repository
            .bookings
            .create(&NewBooking {
                item_id: item.id,
                booker_id,
                start,
                end,
            })
            .await?;

        tracing::info!(
            booking_id = booking.id,
            item_id = item.id,
            booker_id,
            "Booking created"
        );
        Ok(booking)
    }

    /// Approve or reject a `WAITING` booking as the item's owner.
    ///
    /// A booking that already left `WAITING` yields `Conflict`, even when the
    /// requested outcome equals the current one.
    pub async fn set_approval(&self, booking_id: i64, acting_user_id: i64, approved: bool) -> AppResult<Booking> {
        let booking = self.require_booking(booking_id).await?;

        if booking.item.owner_id != acting_user_id {
            tracing::warn!(
                "Booking decision: user id={} is not the owner of booking id={}",
                acting_user_id,
                booking_id
            );
            return Err(AppError::Validation("only owner may decide".to_string()));
        }

        if booking.status.is_terminal() {
            tracing::warn!(
                "Booking decision: booking id={} already {}",
                booking_id,
                booking.status
            );
            return Err(AppError::Conflict("already processed".to_string()));
        }

        let status = BookingStatus::decided(approved);
        match self.repository.bookings.transition_from_waiting(booking_id, status).await? {
            Some(updated) => {
                tracing::info!(booking_id, status = %updated.status, "Booking decided");
                Ok(updated)
            }
            None => {
                // another decision committed between our read and the update
                tracing::warn!("Booking decision: booking id={} decided concurrently", booking_id);
                Err(AppError::Conflict("already processed".to_string()))
            }
        }
    }

    /// Get a booking visible to its booker or to the item's owner
    pub async fn get_booking(&self, booking_id: i64, user_id: i64) -> AppResult<Booking> {
        let booking = self.require_booking(booking_id).await?;

        if booking.booker.id != user_id && booking.item.owner_id != user_id {
            tracing::warn!("Booking get: user id={} denied access to booking id={}", user_id, booking_id);
            return Err(AppError::Validation("access denied".to_string()));
        }

        Ok(booking)
    }

    /// Bookings made by `booker_id` in `state`, `start` descending
    pub async fn list_by_booker(&self, booker_id: i64, state: &str, from: i64, size: i64) -> AppResult<Vec<Booking>> {
        self.require_user(booker_id).await?;
        let query = Self::listing_query(state, from, size)?;

        let bookings = self.repository.bookings.find_by_booker(booker_id, &query).await?;
        tracing::debug!(
            "Bookings of booker id={}: state={:?} page={} -> {}",
            booker_id,
            query.state,
            query.page.page,
            bookings.len()
        );
        Ok(bookings)
    }

    /// Bookings on items owned by `owner_id` in `state`, `start` descending
    pub async fn list_by_owner(&self, owner_id: i64, state: &str, from: i64, size: i64) -> AppResult<Vec<Booking>> {
        self.require_user(owner_id).await?;
        let query = Self::listing_query(state, from, size)?;

        let bookings = self.repository.bookings.find_by_owner(owner_id, &query).await?;
        tracing::debug!(
            "Bookings of owner id={}: state={:?} page={} -> {}",
            owner_id,
            query.state,
            query.page.page,
            bookings.len()
        );
        Ok(bookings)
    }

    /// Parse the filter and page, and take the single `now` of this call
    fn listing_query(state: &str, from: i64, size: i64) -> AppResult<BookingQuery> {
        let state = state.parse::<BookingState>().map_err(|e| {
            tracing::warn!("Booking listing: unknown state {:?}", state);
            e
        })?;
        Ok(BookingQuery {
            state,
            now: Utc::now(),
            page: PageRequest::from_offset(from, size)?,
        })
    }

    async fn require_user(&self, user_id: i64) -> AppResult<User> {
        self.repository.users.find_by_id(user_id).await?.ok_or_else(|| {
            tracing::warn!("User id={} not found", user_id);
            AppError::NotFound(format!("User {} not found", user_id))
        })
    }

    async fn require_booking(&self, booking_id: i64) -> AppResult<Booking> {
        self.repository.bookings.find_by_id(booking_id).await?.ok_or_else(|| {
            tracing::warn!("Booking id={} not found", booking_id);
            AppError::NotFound(format!("Booking {} not found", booking_id))
        })
    }
}
