//! Comments repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::comment::{Comment, NewComment},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentsRepository: Send + Sync {
    async fn create(&self, comment: &NewComment) -> AppResult<Comment>;

    /// Comments on one item, oldest first
    async fn find_by_item(&self, item_id: i64) -> AppResult<Vec<Comment>>;
}

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.text, u.name AS author_name, c.created
    FROM comments c
    JOIN users u ON c.author_id = u.id
"#;

#[derive(Clone)]
pub struct PgCommentsRepository {
    pool: Pool<Postgres>,
}

impl PgCommentsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentsRepository for PgCommentsRepository {
    async fn create(&self, comment: &NewComment) -> AppResult<Comment> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO comments (text, item_id, author_id, created)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&comment.text)
        .bind(comment.item_id)
        .bind(comment.author_id)
        .bind(comment.created)
        .fetch_one(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, Comment>(&format!("{} WHERE c.id = $1", COMMENT_SELECT))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_item(&self, item_id: i64) -> AppResult<Vec<Comment>> {
        let rows = sqlx::query_as::<_, Comment>(&format!(
            "{} WHERE c.item_id = $1 ORDER BY c.created ASC, c.id ASC",
            COMMENT_SELECT
        ))
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
