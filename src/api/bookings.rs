//! Booking endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppResult,
    models::booking::{Booking, CreateBooking},
};

use super::{AppJson, AppQuery, SharerUser};

/// Listing filter and page
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookingListQuery {
    /// ALL, CURRENT, PAST, FUTURE, WAITING, APPROVED or REJECTED (any case)
    pub state: Option<String>,
    /// Zero-based index of the first row, rounded down to a page boundary
    pub from: Option<i64>,
    /// Page size
    pub size: Option<i64>,
}

impl BookingListQuery {
    fn parts(&self) -> (&str, i64, i64) {
        (
            self.state.as_deref().unwrap_or("ALL"),
            self.from.unwrap_or(0),
            self.size.unwrap_or(10),
        )
    }
}

/// Owner decision on a booking
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DecisionQuery {
    /// true to approve, false to reject
    pub approved: bool,
}

/// Request a booking
#[utoipa::path(
    post,
    path = "/bookings",
    tag = "bookings",
    params(("X-Sharer-User-Id" = i64, Header, description = "Booker ID")),
    request_body = CreateBooking,
    responses(
        (status = 200, description = "Booking created as WAITING", body = Booking),
        (status = 400, description = "Malformed body, item not available, own item or invalid dates"),
        (status = 404, description = "User or item not found")
    )
)]
pub async fn create_booking(
    State(state): State<crate::AppState>,
    SharerUser(user_id): SharerUser,
    AppJson(request): AppJson<CreateBooking>,
) -> AppResult<Json<Booking>> {
    let booking = state.services.bookings.create_booking(user_id, request).await?;
    Ok(Json(booking))
}

/// Approve or reject a booking
#[utoipa::path(
    patch,
    path = "/bookings/{id}",
    tag = "bookings",
    params(
        ("id" = i64, Path, description = "Booking ID"),
        ("X-Sharer-User-Id" = i64, Header, description = "Item owner ID"),
        DecisionQuery
    ),
    responses(
        (status = 200, description = "Booking decided", body = Booking),
        (status = 400, description = "Missing approved flag or caller is not the item owner"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking already processed")
    )
)]
pub async fn decide_booking(
    State(state): State<crate::AppState>,
    SharerUser(user_id): SharerUser,
    Path(booking_id): Path<i64>,
    AppQuery(decision): AppQuery<DecisionQuery>,
) -> AppResult<Json<Booking>> {
    let booking = state
        .services
        .bookings
        .set_approval(booking_id, user_id, decision.approved)
        .await?;
    Ok(Json(booking))
}

/// Get a booking as its booker or item owner
#[utoipa::path(
    get,
    path = "/bookings/{id}",
    tag = "bookings",
    params(
        ("id" = i64, Path, description = "Booking ID"),
        ("X-Sharer-User-Id" = i64, Header, description = "Booker or item owner ID")
    ),
    responses(
        (status = 200, description = "Booking details", body = Booking),
        (status = 400, description = "Access denied"),
        (status = 404, description = "Booking not found")
    )
)]
pub async fn get_booking(
    State(state): State<crate::AppState>,
    SharerUser(user_id): SharerUser,
    Path(booking_id): Path<i64>,
) -> AppResult<Json<Booking>> {
    let booking = state.services.bookings.get_booking(booking_id, user_id).await?;
    Ok(Json(booking))
}

/// List the caller's bookings as booker
#[utoipa::path(
    get,
    path = "/bookings",
    tag = "bookings",
    params(
        ("X-Sharer-User-Id" = i64, Header, description = "Booker ID"),
        BookingListQuery
    ),
    responses(
        (status = 200, description = "Bookings, latest start first", body = Vec<Booking>),
        (status = 400, description = "Unknown state or bad page"),
        (status = 404, description = "User not found")
    )
)]
pub async fn list_booker_bookings(
    State(state): State<crate::AppState>,
    SharerUser(user_id): SharerUser,
    AppQuery(query): AppQuery<BookingListQuery>,
) -> AppResult<Json<Vec<Booking>>> {
    let (booking_state, from, size) = query.parts();
    let bookings = state
        .services
        .bookings
        .list_by_booker(user_id, booking_state, from, size)
        .await?;
    Ok(Json(bookings))
}

/// List bookings on the caller's items
#[utoipa::path(
    get,
    path = "/bookings/owner",
    tag = "bookings",
    params(
        ("X-Sharer-User-Id" = i64, Header, description = "Owner ID"),
        BookingListQuery
    ),
    responses(
        (status = 200, description = "Bookings, latest start first", body = Vec<Booking>),
        (status = 400, description = "Unknown state or bad page"),
        (status = 404, description = "User not found")
    )
)]
pub async fn list_owner_bookings(
    State(state): State<crate::AppState>,
    SharerUser(user_id): SharerUser,
    AppQuery(query): AppQuery<BookingListQuery>,
) -> AppResult<Json<Vec<Booking>>> {
    let (booking_state, from, size) = query.parts();
    let bookings = state
        .services
        .bookings
        .list_by_owner(user_id, booking_state, from, size)
        .await?;
    Ok(Json(bookings))
}
