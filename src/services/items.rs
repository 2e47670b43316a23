//! Item catalog service: listings, search and comments

use chrono::Utc;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        booking::last_and_next,
        comment::{Comment, CreateComment, NewComment},
        item::{CreateItem, Item, ItemDetails, UpdateItem},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct ItemsService {
    repository: Repository,
}

impl ItemsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn create_item(&self, owner_id: i64, item: CreateItem) -> AppResult<Item> {
        item.validate()?;
        self.require_user(owner_id).await?;

        let created = self.repository.items.create(owner_id, &item).await?;
        tracing::info!("Item created: id={} owner={}", created.id, owner_id);
        Ok(created)
    }

    /// Update an item; only its owner may do so
    pub async fn update_item(&self, item_id: i64, owner_id: i64, update: UpdateItem) -> AppResult<Item> {
        update.validate()?;
        let mut item = self.get_item(item_id).await?;

        if item.owner_id != owner_id {
            tracing::warn!("Item update: user id={} does not own item id={}", owner_id, item_id);
            return Err(AppError::Forbidden("only the owner may edit an item".to_string()));
        }

        update.apply(&mut item);
        self.repository.items.update(&item).await
    }

    pub async fn get_item(&self, item_id: i64) -> AppResult<Item> {
        self.repository
            .items
            .find_by_id(item_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!("Item id={} not found", item_id);
                AppError::NotFound(format!("Item {} not found", item_id))
            })
    }

    /// One item with its comments. No booking projection.
    pub async fn get_item_details(&self, item_id: i64) -> AppResult<ItemDetails> {
        let item = self.get_item(item_id).await?;
        let comments = self.repository.comments.find_by_item(item.id).await?;
        Ok(ItemDetails::new(item, None, None, comments))
    }

    /// The owner's items, each with its last and next booking and its comments
    pub async fn list_by_owner(&self, owner_id: i64) -> AppResult<Vec<ItemDetails>> {
        self.require_user(owner_id).await?;
        let items = self.repository.items.find_by_owner(owner_id).await?;
        let now = Utc::now();

        let mut result = Vec::with_capacity(items.len());
        for item in items {
            let bookings = self.repository.bookings.find_by_item(item.id).await?;
            let comments = self.repository.comments.find_by_item(item.id).await?;
            let (last, next) = last_and_next(&bookings, now);
            result.push(ItemDetails::new(item, last, next, comments));
        }
        Ok(result)
    }

    /// Available items matching `text` in name or description. Blank text finds nothing.
    pub async fn search(&self, text: &str) -> AppResult<Vec<Item>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let items = self.repository.items.search_available(text).await?;
        tracing::debug!("Item search {:?} -> {}", text, items.len());
        Ok(items)
    }

    /// Comment on an item. The author must have a booking of it that already ended.
    pub async fn add_comment(&self, item_id: i64, author_id: i64, comment: CreateComment) -> AppResult<Comment> {
        comment.validate()?;
        if comment.text.trim().is_empty() {
            return Err(AppError::Validation("Text must not be blank".to_string()));
        }

        let item = self.get_item(item_id).await?;
        self.require_user(author_id).await?;

        let now = Utc::now();
        let bookings = self.repository.bookings.find_by_item(item.id).await?;
        let rented = bookings.iter().any(|b| b.booker.id == author_id && b.end < now);
        if !rented {
            tracing::warn!(
                "Comment: user id={} has no finished booking of item id={}",
                author_id,
                item.id
            );
            return Err(AppError::Validation(
                "only a user who has rented the item may comment".to_string(),
            ));
        }

        let created = self
            .repository
            .comments
            .create(&NewComment {
                item_id: item.id,
                author_id,
                text: comment.text,
                created: now,
            })
            .await?;

        tracing::info!(comment_id = created.id, item_id = item.id, author_id, "Comment added");
        Ok(created)
    }

    async fn require_user(&self, user_id: i64) -> AppResult<()> {
        match self.repository.users.find_by_id(user_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!("User {} not found", user_id))),
        }
    }
}
