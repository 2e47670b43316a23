//! Process-local store implementing every repository trait
//!
//! Keyed maps behind one async `RwLock`, with atomic counters handing out
//! identities. Each mutation runs its checks and its write under the same
//! write guard, so it is atomic with respect to every other call.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicI64, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{BookingsRepository, CommentsRepository, ItemsRepository, UsersRepository};
use crate::{
    error::{AppError, AppResult},
    models::{
        booking::{Booking, BookingItem, BookingQuery, BookingStatus, BookingUser, NewBooking},
        comment::{Comment, NewComment},
        item::{CreateItem, Item},
        user::{CreateUser, User},
    },
};

#[derive(Debug, Clone)]
struct StoredBooking {
    id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    item_id: i64,
    booker_id: i64,
    status: BookingStatus,
}

#[derive(Debug, Clone)]
struct StoredComment {
    id: i64,
    text: String,
    item_id: i64,
    author_id: i64,
    created: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    items: BTreeMap<i64, Item>,
    bookings: BTreeMap<i64, StoredBooking>,
    comments: BTreeMap<i64, StoredComment>,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }

    fn comment(&self, stored: &StoredComment) -> AppResult<Comment> {
        let author = self.users.get(&stored.author_id).ok_or_else(|| {
            AppError::Internal(format!("comment {} references missing user {}", stored.id, stored.author_id))
        })?;
        Ok(Comment {
            id: stored.id,
            text: stored.text.clone(),
            author_name: author.name.clone(),
            created: stored.created,
        })
    }

    /// Join a stored booking with its item and booker
    fn hydrate(&self, stored: &StoredBooking) -> AppResult<Booking> {
        let item = self.items.get(&stored.item_id).ok_or_else(|| {
            AppError::Internal(format!("booking {} references missing item {}", stored.id, stored.item_id))
        })?;
        let booker = self.users.get(&stored.booker_id).ok_or_else(|| {
            AppError::Internal(format!("booking {} references missing user {}", stored.id, stored.booker_id))
        })?;

        Ok(Booking {
            id: stored.id,
            start: stored.start,
            end: stored.end,
            status: stored.status,
            item: BookingItem {
                id: item.id,
                name: item.name.clone(),
                owner_id: item.owner_id,
            },
            booker: BookingUser {
                id: booker.id,
                name: booker.name.clone(),
            },
        })
    }

    /// Filter, sort by `start` descending and page
    fn select<F>(&self, query: &BookingQuery, party: F) -> AppResult<Vec<Booking>>
    where
        F: Fn(&Booking) -> bool,
    {
        let mut rows = Vec::new();
        for stored in self.bookings.values() {
            let booking = self.hydrate(stored)?;
            if party(&booking) && query.state.matches(&booking, query.now) {
                rows.push(booking);
            }
        }
        rows.sort_by(|a, b| b.start.cmp(&a.start).then(b.id.cmp(&a.id)));
        Ok(query.page.slice(rows))
    }
}

pub struct InMemoryStore {
    tables: RwLock<Tables>,
    next_user_id: AtomicI64,
    next_item_id: AtomicI64,
    next_booking_id: AtomicI64,
    next_comment_id: AtomicI64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_user_id: AtomicI64::new(1),
            next_item_id: AtomicI64::new(1),
            next_booking_id: AtomicI64::new(1),
            next_comment_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl UsersRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn email_exists(&self, email: &str) -> AppResult<bool> {
        Ok(self.tables.read().await.email_taken(email, None))
    }

    async fn create(&self, user: &CreateUser) -> AppResult<User> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&user.email, None) {
            return Err(AppError::Conflict(format!("Email {} is already in use", user.email)));
        }

        let created = User {
            id: self.next_user_id.fetch_add(1, Ordering::SeqCst),
            name: user.name.clone(),
            email: user.email.clone(),
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_all(&self) -> AppResult<Vec<User>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn update(&self, user: &User) -> AppResult<User> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&user.email, Some(user.id)) {
            return Err(AppError::Conflict(format!("Email {} is already in use", user.email)));
        }

        let stored = tables
            .users
            .get_mut(&user.id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.id)))?;
        stored.name = user.name.clone();
        stored.email = user.email.clone();
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        let referenced = tables.items.values().any(|i| i.owner_id == id)
            || tables.bookings.values().any(|b| b.booker_id == id)
            || tables.comments.values().any(|c| c.author_id == id);
        if referenced {
            return Err(AppError::Conflict(format!("User {} still has items, bookings or comments", id)));
        }
        Ok(tables.users.remove(&id).is_some())
    }
}

#[async_trait]
impl ItemsRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Item>> {
        Ok(self.tables.read().await.items.get(&id).cloned())
    }

    async fn create(&self, owner_id: i64, item: &CreateItem) -> AppResult<Item> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&owner_id) {
            return Err(AppError::NotFound(format!("User {} not found", owner_id)));
        }

        let created = Item {
            id: self.next_item_id.fetch_add(1, Ordering::SeqCst),
            name: item.name.clone(),
            description: item.description.clone(),
            available: item.available,
            owner_id,
            request_id: item.request_id,
        };
        tables.items.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, item: &Item) -> AppResult<Item> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .items
            .get_mut(&item.id)
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item.id)))?;

        // owner and originating request are fixed at creation
        stored.name = item.name.clone();
        stored.description = item.description.clone();
        stored.available = item.available;
        Ok(stored.clone())
    }

    async fn find_by_owner(&self, owner_id: i64) -> AppResult<Vec<Item>> {
        let tables = self.tables.read().await;
        Ok(tables
            .items
            .values()
            .filter(|i| i.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn search_available(&self, text: &str) -> AppResult<Vec<Item>> {
        let needle = text.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .items
            .values()
            .filter(|i| {
                i.available
                    && (i.name.to_lowercase().contains(&needle)
                        || i.description.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BookingsRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Booking>> {
        let tables = self.tables.read().await;
        tables.bookings.get(&id).map(|b| tables.hydrate(b)).transpose()
    }

    async fn create(&self, booking: &NewBooking) -> AppResult<Booking> {
        let mut tables = self.tables.write().await;

        let item = tables
            .items
            .get(&booking.item_id)
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", booking.item_id)))?;
        if !item.available {
            return Err(AppError::Validation("item not available".to_string()));
        }
        if !tables.users.contains_key(&booking.booker_id) {
            return Err(AppError::NotFound(format!("User {} not found", booking.booker_id)));
        }

        let stored = StoredBooking {
            id: self.next_booking_id.fetch_add(1, Ordering::SeqCst),
            start: booking.start,
            end: booking.end,
            item_id: booking.item_id,
            booker_id: booking.booker_id,
            status: BookingStatus::Waiting,
        };
        let created = tables.hydrate(&stored)?;
        tables.bookings.insert(stored.id, stored);
        Ok(created)
    }

    async fn transition_from_waiting(&self, id: i64, status: BookingStatus) -> AppResult<Option<Booking>> {
        let mut tables = self.tables.write().await;
        let stored = match tables.bookings.get_mut(&id) {
            Some(stored) if stored.status == BookingStatus::Waiting => {
                stored.status = status;
                stored.clone()
            }
            _ => return Ok(None),
        };
        tables.hydrate(&stored).map(Some)
    }

    async fn find_by_booker(&self, booker_id: i64, query: &BookingQuery) -> AppResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        tables.select(query, |b| b.booker.id == booker_id)
    }

    async fn find_by_owner(&self, owner_id: i64, query: &BookingQuery) -> AppResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        tables.select(query, |b| b.item.owner_id == owner_id)
    }

    async fn find_by_item(&self, item_id: i64) -> AppResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let mut rows = tables
            .bookings
            .values()
            .filter(|b| b.item_id == item_id)
            .map(|b| tables.hydrate(b))
            .collect::<AppResult<Vec<_>>>()?;
        rows.sort_by(|a, b| a.start.cmp(&b.start).then(a.id.cmp(&b.id)));
        Ok(rows)
    }
}

#[async_trait]
impl CommentsRepository for InMemoryStore {
    async fn create(&self, comment: &NewComment) -> AppResult<Comment> {
        let mut tables = self.tables.write().await;
        if !tables.items.contains_key(&comment.item_id) {
            return Err(AppError::NotFound(format!("Item {} not found", comment.item_id)));
        }

        let stored = StoredComment {
            id: self.next_comment_id.fetch_add(1, Ordering::SeqCst),
            text: comment.text.clone(),
            item_id: comment.item_id,
            author_id: comment.author_id,
            created: comment.created,
        };
        let created = tables.comment(&stored)?;
        tables.comments.insert(stored.id, stored);
        Ok(created)
    }

    async fn find_by_item(&self, item_id: i64) -> AppResult<Vec<Comment>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&StoredComment> =
            tables.comments.values().filter(|c| c.item_id == item_id).collect();
        rows.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        rows.into_iter().map(|c| tables.comment(c)).collect()
    }
}
