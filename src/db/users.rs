//! User accounts and points

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// A registered user
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

/// Insert a new user; the UNIQUE constraint on username surfaces
/// duplicates as a database error the caller maps to a validation flash
pub async fn create(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO users (username, password_hash, points, created_at) VALUES (?, ?, 0, ?)",
    )
    .bind(username)
    .bind(password_hash)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn find_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// All users, highest points first
pub async fn leaderboard(pool: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY points DESC, username ASC")
        .fetch_all(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn create_and_find_roundtrip() {
        let pool = db::connect_memory().await.unwrap();

        let id = create(&pool, "alice", "hash").await.unwrap();
        let user = find_by_username(&pool, "alice").await.unwrap().unwrap();

        assert_eq!(user.id, id);
        assert_eq!(user.points, 0);
        assert!(find_by_username(&pool, "bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_unique_violation() {
        let pool = db::connect_memory().await.unwrap();

        create(&pool, "alice", "hash").await.unwrap();
        let err = create(&pool, "alice", "other").await.unwrap_err();

        assert!(db::is_unique_violation(&err));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = 'alice'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn leaderboard_orders_by_points_desc() {
        let pool = db::connect_memory().await.unwrap();

        create(&pool, "low", "h").await.unwrap();
        let high = create(&pool, "high", "h").await.unwrap();
        sqlx::query("UPDATE users SET points = 30 WHERE id = ?")
            .bind(high)
            .execute(&pool)
            .await
            .unwrap();

        let board = leaderboard(&pool).await.unwrap();
        assert_eq!(board[0].username, "high");
        assert_eq!(board[1].username, "low");
    }
}
