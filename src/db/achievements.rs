//! User achievements, awarded at most once per name

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Achievement {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub awarded_at: DateTime<Utc>,
}

/// Award an achievement inside an open transaction. The UNIQUE(user_id,
/// name) constraint makes this safe under concurrent commits; returns
/// true only when this call actually inserted the row.
pub async fn award_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
    name: &str,
    description: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO achievements (user_id, name, description, awarded_at)
         VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(name)
    .bind(description)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn list_for_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<Achievement>, sqlx::Error> {
    sqlx::query_as::<_, Achievement>(
        "SELECT * FROM achievements WHERE user_id = ? ORDER BY awarded_at ASC, id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn award_is_idempotent_per_name() {
        let pool = db::connect_memory().await.unwrap();
        let user_id = db::users::create(&pool, "alice", "hash").await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        assert!(award_in_tx(&mut tx, user_id, "First Upload", "desc").await.unwrap());
        assert!(!award_in_tx(&mut tx, user_id, "First Upload", "desc").await.unwrap());
        tx.commit().await.unwrap();

        let list = list_for_user(&pool, user_id).await.unwrap();
        assert_eq!(list.len(), 1);
    }
}
