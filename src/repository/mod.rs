//! Repository layer: storage contracts and their implementations
//!
//! Services only see the traits below. [`Repository::new`] wires the
//! PostgreSQL implementations and [`Repository::in_memory`] wires a single
//! process-local [`memory::InMemoryStore`] behind all of them.

pub mod bookings;
pub mod comments;
pub mod items;
pub mod memory;
pub mod users;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

pub use bookings::BookingsRepository;
pub use comments::CommentsRepository;
pub use items::ItemsRepository;
pub use users::UsersRepository;

/// Container for the repositories injected into services
#[derive(Clone)]
pub struct Repository {
    pub users: Arc<dyn UsersRepository>,
    pub items: Arc<dyn ItemsRepository>,
    pub bookings: Arc<dyn BookingsRepository>,
    pub comments: Arc<dyn CommentsRepository>,
}

impl Repository {
    /// Create PostgreSQL-backed repositories sharing one pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            users: Arc::new(users::PgUsersRepository::new(pool.clone())),
            items: Arc::new(items::PgItemsRepository::new(pool.clone())),
            bookings: Arc::new(bookings::PgBookingsRepository::new(pool.clone())),
            comments: Arc::new(comments::PgCommentsRepository::new(pool)),
        }
    }

    /// Create repositories backed by one in-memory store
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::InMemoryStore::new());
        Self {
            users: store.clone(),
            items: store.clone(),
            bookings: store.clone(),
            comments: store,
        }
    }
}
