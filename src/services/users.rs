//! User directory service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::user::{CreateUser, UpdateUser, User},
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
}

impl UsersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Register a user; emails are unique regardless of case
    pub async fn create_user(&self, user: CreateUser) -> AppResult<User> {
        user.validate()?;

        if self.repository.users.email_exists(&user.email).await? {
            tracing::warn!("User create: email {} already in use", user.email);
            return Err(AppError::Conflict(format!("Email {} is already in use", user.email)));
        }

        let created = self.repository.users.create(&user).await?;
        tracing::info!("User created: id={}", created.id);
        Ok(created)
    }

    pub async fn get_user(&self, id: i64) -> AppResult<User> {
        self.repository
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        self.repository.users.find_all().await
    }

    /// Update name and/or email; a new email must not belong to another user
    pub async fn update_user(&self, id: i64, update: UpdateUser) -> AppResult<User> {
        update.validate()?;
        let mut user = self.get_user(id).await?;

        if let Some(ref email) = update.email {
            if !email.eq_ignore_ascii_case(&user.email) && self.repository.users.email_exists(email).await? {
                tracing::warn!("User update: email {} already in use", email);
                return Err(AppError::Conflict(format!("Email {} is already in use", email)));
            }
        }

        update.apply(&mut user);
        let updated = self.repository.users.update(&user).await?;
        tracing::info!("User updated: id={}", updated.id);
        Ok(updated)
    }

    /// Delete a user. Deleting an unknown id is not an error.
    pub async fn delete_user(&self, id: i64) -> AppResult<()> {
        if self.repository.users.delete(id).await? {
            tracing::info!("User deleted: id={}", id);
        } else {
            tracing::debug!("User delete: id={} did not exist", id);
        }
        Ok(())
    }
}
