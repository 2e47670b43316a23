//! Item endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppResult,
    models::{
        comment::{Comment, CreateComment},
        item::{CreateItem, Item, ItemDetails, UpdateItem},
    },
};

use super::{AppJson, AppQuery, SharerUser};

/// Free-text item search
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Matched against name and description, ignoring case
    #[serde(default)]
    pub text: String,
}

/// List an item
#[utoipa::path(
    post,
    path = "/items",
    tag = "items",
    params(("X-Sharer-User-Id" = i64, Header, description = "Owner ID")),
    request_body = CreateItem,
    responses(
        (status = 200, description = "Item created", body = Item),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Owner not found")
    )
)]
pub async fn create_item(
    State(state): State<crate::AppState>,
    SharerUser(owner_id): SharerUser,
    AppJson(item): AppJson<CreateItem>,
) -> AppResult<Json<Item>> {
    let created = state.services.items.create_item(owner_id, item).await?;
    Ok(Json(created))
}

/// Update an item
#[utoipa::path(
    patch,
    path = "/items/{id}",
    tag = "items",
    params(
        ("id" = i64, Path, description = "Item ID"),
        ("X-Sharer-User-Id" = i64, Header, description = "Owner ID")
    ),
    request_body = UpdateItem,
    responses(
        (status = 200, description = "Item updated", body = Item),
        (status = 403, description = "Caller does not own the item"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn update_item(
    State(state): State<crate::AppState>,
    SharerUser(owner_id): SharerUser,
    Path(item_id): Path<i64>,
    AppJson(update): AppJson<UpdateItem>,
) -> AppResult<Json<Item>> {
    let item = state.services.items.update_item(item_id, owner_id, update).await?;
    Ok(Json(item))
}

/// Get an item with its comments
#[utoipa::path(
    get,
    path = "/items/{id}",
    tag = "items",
    params(("id" = i64, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item details", body = ItemDetails),
        (status = 404, description = "Item not found")
    )
)]
pub async fn get_item(
    State(state): State<crate::AppState>,
    Path(item_id): Path<i64>,
) -> AppResult<Json<ItemDetails>> {
    let item = state.services.items.get_item_details(item_id).await?;
    Ok(Json(item))
}

/// List the caller's items with their last and next bookings
#[utoipa::path(
    get,
    path = "/items",
    tag = "items",
    params(("X-Sharer-User-Id" = i64, Header, description = "Owner ID")),
    responses(
        (status = 200, description = "Owner's items", body = Vec<ItemDetails>),
        (status = 404, description = "Owner not found")
    )
)]
pub async fn list_owner_items(
    State(state): State<crate::AppState>,
    SharerUser(owner_id): SharerUser,
) -> AppResult<Json<Vec<ItemDetails>>> {
    let items = state.services.items.list_by_owner(owner_id).await?;
    Ok(Json(items))
}

/// Search available items
#[utoipa::path(
    get,
    path = "/items/search",
    tag = "items",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching available items; empty for blank text", body = Vec<Item>)
    )
)]
pub async fn search_items(
    State(state): State<crate::AppState>,
    AppQuery(query): AppQuery<SearchQuery>,
) -> AppResult<Json<Vec<Item>>> {
    let items = state.services.items.search(&query.text).await?;
    Ok(Json(items))
}

/// Comment on an item after renting it
#[utoipa::path(
    post,
    path = "/items/{id}/comment",
    tag = "items",
    params(
        ("id" = i64, Path, description = "Item ID"),
        ("X-Sharer-User-Id" = i64, Header, description = "Author ID")
    ),
    request_body = CreateComment,
    responses(
        (status = 200, description = "Comment added", body = Comment),
        (status = 400, description = "Blank text or no finished booking of the item"),
        (status = 404, description = "Item or user not found")
    )
)]
pub async fn add_comment(
    State(state): State<crate::AppState>,
    SharerUser(author_id): SharerUser,
    Path(item_id): Path<i64>,
    AppJson(comment): AppJson<CreateComment>,
) -> AppResult<Json<Comment>> {
    let created = state.services.items.add_comment(item_id, author_id, comment).await?;
    Ok(Json(created))
}
