//! Server-side sessions
//!
//! The browser holds only an opaque uuid; user binding and pending flash
//! messages live in the sessions table. Flash messages are stored as a
//! JSON string array and drained on the next page render.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Sessions older than this are expired: `find` refuses to resolve them
/// and `create` sweeps them out
pub const SESSION_TTL_DAYS: i64 = 14;

fn expiry_cutoff() -> DateTime<Utc> {
    Utc::now() - Duration::days(SESSION_TTL_DAYS)
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: Option<i64>,
    pub flash: String,
    pub created_at: DateTime<Utc>,
}

/// Create a fresh anonymous session, sweeping expired rows while here
///
/// Anonymous traffic (crawlers, health probes hitting pages) mints a row
/// per visitor, so every mint also deletes rows past the TTL to keep the
/// table bounded.
pub async fn create(pool: &SqlitePool) -> Result<Session, sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE created_at < ?")
        .bind(expiry_cutoff())
        .execute(pool)
        .await?;

    let id = Uuid::new_v4().to_string();
    let created_at = Utc::now();

    sqlx::query("INSERT INTO sessions (id, user_id, flash, created_at) VALUES (?, NULL, '[]', ?)")
        .bind(&id)
        .bind(created_at)
        .execute(pool)
        .await?;

    Ok(Session {
        id,
        user_id: None,
        flash: "[]".to_string(),
        created_at,
    })
}

/// Look up a live session; an expired row is deleted and treated as absent
pub async fn find(pool: &SqlitePool, id: &str) -> Result<Option<Session>, sqlx::Error> {
    let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match session {
        Some(s) if s.created_at < expiry_cutoff() => {
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await?;
            Ok(None)
        }
        other => Ok(other),
    }
}

/// Bind the session to a logged-in user
pub async fn set_user(pool: &SqlitePool, id: &str, user_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sessions SET user_id = ? WHERE id = ?")
        .bind(user_id)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Drop the user binding (logout); safe to call repeatedly
pub async fn clear_user(pool: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sessions SET user_id = NULL WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Append a flash message for the next rendered page
///
/// A single statement appending via SQLite's json_insert, so concurrent
/// pushes cannot lose each other's messages. A vanished session is a
/// no-op.
pub async fn push_flash(pool: &SqlitePool, id: &str, message: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE sessions SET flash = json_insert(flash, '$[#]', ?) WHERE id = ?")
        .bind(message)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Take and clear pending flash messages
///
/// Read and clear run in one transaction so two concurrent renders of the
/// same session cannot both observe (or silently drop) a message.
pub async fn take_flash(pool: &SqlitePool, id: &str) -> Result<Vec<String>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let current: Option<(String,)> =
        sqlx::query_as("SELECT flash FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

    let Some((flash,)) = current else {
        return Ok(Vec::new());
    };

    sqlx::query("UPDATE sessions SET flash = '[]' WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(serde_json::from_str(&flash).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn flash_messages_drain_once() {
        let pool = db::connect_memory().await.unwrap();
        let session = create(&pool).await.unwrap();

        push_flash(&pool, &session.id, "one").await.unwrap();
        push_flash(&pool, &session.id, "two").await.unwrap();

        let messages = take_flash(&pool, &session.id).await.unwrap();
        assert_eq!(messages, vec!["one".to_string(), "two".to_string()]);

        let again = take_flash(&pool, &session.id).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn flash_preserves_quotes_and_unicode() {
        let pool = db::connect_memory().await.unwrap();
        let session = create(&pool).await.unwrap();

        let message = r#"Achievement "First Upload" déjà vu 🦊"#;
        push_flash(&pool, &session.id, message).await.unwrap();

        let messages = take_flash(&pool, &session.id).await.unwrap();
        assert_eq!(messages, vec![message.to_string()]);
    }

    async fn backdate(pool: &SqlitePool, id: &str, days: i64) {
        sqlx::query("UPDATE sessions SET created_at = ? WHERE id = ?")
            .bind(Utc::now() - Duration::days(days))
            .bind(id)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn expired_session_is_purged_on_lookup() {
        let pool = db::connect_memory().await.unwrap();
        let session = create(&pool).await.unwrap();
        backdate(&pool, &session.id, SESSION_TTL_DAYS + 1).await;

        assert!(find(&pool, &session.id).await.unwrap().is_none());

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn creating_a_session_sweeps_stale_rows() {
        let pool = db::connect_memory().await.unwrap();
        let stale = create(&pool).await.unwrap();
        backdate(&pool, &stale.id, SESSION_TTL_DAYS + 1).await;

        let fresh = create(&pool).await.unwrap();

        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM sessions")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(ids, vec![fresh.id]);
    }

    #[tokio::test]
    async fn session_within_ttl_still_resolves() {
        let pool = db::connect_memory().await.unwrap();
        let session = create(&pool).await.unwrap();
        backdate(&pool, &session.id, SESSION_TTL_DAYS - 1).await;

        assert!(find(&pool, &session.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn user_binding_set_and_clear() {
        let pool = db::connect_memory().await.unwrap();
        let user_id = db::users::create(&pool, "alice", "hash").await.unwrap();
        let session = create(&pool).await.unwrap();

        set_user(&pool, &session.id, user_id).await.unwrap();
        let loaded = find(&pool, &session.id).await.unwrap().unwrap();
        assert_eq!(loaded.user_id, Some(user_id));

        clear_user(&pool, &session.id).await.unwrap();
        clear_user(&pool, &session.id).await.unwrap(); // idempotent
        let loaded = find(&pool, &session.id).await.unwrap().unwrap();
        assert_eq!(loaded.user_id, None);
    }
}
