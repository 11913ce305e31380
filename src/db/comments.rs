//! Upload comments, append-only

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// A comment joined with its author's username
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentWithUser {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub username: String,
}

pub async fn insert(
    pool: &SqlitePool,
    user_id: i64,
    upload_id: i64,
    content: &str,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO comments (content, created_at, user_id, upload_id) VALUES (?, ?, ?, ?)",
    )
    .bind(content)
    .bind(Utc::now())
    .bind(user_id)
    .bind(upload_id)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Comments for an upload, oldest first
pub async fn list_for_upload(
    pool: &SqlitePool,
    upload_id: i64,
) -> Result<Vec<CommentWithUser>, sqlx::Error> {
    sqlx::query_as::<_, CommentWithUser>(
        "SELECT c.id, c.content, c.created_at, users.username
         FROM comments c JOIN users ON users.id = c.user_id
         WHERE c.upload_id = ?
         ORDER BY c.created_at ASC, c.id ASC",
    )
    .bind(upload_id)
    .fetch_all(pool)
    .await
}
