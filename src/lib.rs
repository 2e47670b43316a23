//! ShareIt item-sharing server
//!
//! Users list items they own, other users request time-bounded bookings of
//! those items, and owners approve or reject the requests. Exposed as a
//! REST JSON API over PostgreSQL or an in-memory store.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

impl AppState {
    /// State over a fresh in-memory store
    pub fn in_memory() -> Self {
        let repository = repository::Repository::in_memory();
        Self {
            config: Arc::new(AppConfig::in_memory()),
            services: Arc::new(services::Services::new(repository)),
        }
    }
}
