//! Like toggle
//!
//! At most one like per (user, upload), enforced by the UNIQUE constraint
//! rather than a check-then-insert.

use sqlx::SqlitePool;

/// Toggle the like for (user, upload). Returns true when the upload is
/// now liked by this user, false when the like was removed.
pub async fn toggle(pool: &SqlitePool, user_id: i64, upload_id: i64) -> Result<bool, sqlx::Error> {
    let deleted = sqlx::query("DELETE FROM likes WHERE user_id = ? AND upload_id = ?")
        .bind(user_id)
        .bind(upload_id)
        .execute(pool)
        .await?
        .rows_affected();

    if deleted > 0 {
        return Ok(false);
    }

    // OR IGNORE: a concurrent toggle that won the insert leaves the pair
    // in the liked state either way
    sqlx::query("INSERT OR IGNORE INTO likes (user_id, upload_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(upload_id)
        .execute(pool)
        .await?;

    Ok(true)
}

/// Number of likes on an upload
pub async fn count_for_upload(pool: &SqlitePool, upload_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE upload_id = ?")
        .bind(upload_id)
        .fetch_one(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn setup() -> (SqlitePool, i64, i64) {
        let pool = db::connect_memory().await.unwrap();
        let user_id = db::users::create(&pool, "alice", "hash").await.unwrap();
        let outcome = db::uploads::record_upload(
            &pool,
            db::uploads::NewUpload {
                filename: "fox.jpg".to_string(),
                label: "red_fox".to_string(),
                summary_text: "A fox.".to_string(),
                stats_json: None,
                user_id,
                location: None,
            },
        )
        .await
        .unwrap();
        (pool, user_id, outcome.upload_id)
    }

    #[tokio::test]
    async fn toggle_is_its_own_inverse() {
        let (pool, user_id, upload_id) = setup().await;

        assert!(toggle(&pool, user_id, upload_id).await.unwrap());
        assert_eq!(count_for_upload(&pool, upload_id).await.unwrap(), 1);

        assert!(!toggle(&pool, user_id, upload_id).await.unwrap());
        assert_eq!(count_for_upload(&pool, upload_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn likes_from_different_users_are_independent() {
        let (pool, alice, upload_id) = setup().await;
        let bob = db::users::create(&pool, "bob", "hash").await.unwrap();

        toggle(&pool, alice, upload_id).await.unwrap();
        toggle(&pool, bob, upload_id).await.unwrap();
        assert_eq!(count_for_upload(&pool, upload_id).await.unwrap(), 2);

        toggle(&pool, alice, upload_id).await.unwrap();
        assert_eq!(count_for_upload(&pool, upload_id).await.unwrap(), 1);
    }
}
