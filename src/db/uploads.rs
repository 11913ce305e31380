//! Upload rows and the atomic upload-commit transaction

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Points awarded for each accepted upload
pub const UPLOAD_REWARD_POINTS: i64 = 10;

/// A classified image upload
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Upload {
    pub id: i64,
    pub filename: String,
    pub label: String,
    pub summary_text: Option<String>,
    pub stats_json: Option<String>,
    pub upload_time: DateTime<Utc>,
    pub user_id: i64,
    pub location: Option<String>,
}

/// Upload joined with the uploader's username, for list pages
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UploadWithUser {
    pub id: i64,
    pub filename: String,
    pub label: String,
    pub summary_text: Option<String>,
    pub stats_json: Option<String>,
    pub upload_time: DateTime<Utc>,
    pub location: Option<String>,
    pub username: String,
}

/// Fields for a new upload row
#[derive(Debug)]
pub struct NewUpload {
    pub filename: String,
    pub label: String,
    pub summary_text: String,
    pub stats_json: Option<String>,
    pub user_id: i64,
    pub location: Option<String>,
}

/// What the commit transaction produced
#[derive(Debug)]
pub struct UploadOutcome {
    pub upload_id: i64,
    /// True when this commit awarded the "First Upload" achievement
    pub first_upload_awarded: bool,
}

/// Commit a completed upload as one unit: the upload row, the point
/// reward, and (for a first upload) the achievement. Runs only after both
/// collaborator calls have succeeded, so a failure earlier in the pipeline
/// leaves no rows behind.
pub async fn record_upload(
    pool: &SqlitePool,
    new: NewUpload,
) -> Result<UploadOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO uploads (filename, label, summary_text, stats_json, upload_time, user_id, location)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&new.filename)
    .bind(&new.label)
    .bind(&new.summary_text)
    .bind(&new.stats_json)
    .bind(Utc::now())
    .bind(new.user_id)
    .bind(&new.location)
    .execute(&mut *tx)
    .await?;
    let upload_id = result.last_insert_rowid();

    sqlx::query("UPDATE users SET points = points + ? WHERE id = ?")
        .bind(UPLOAD_REWARD_POINTS)
        .bind(new.user_id)
        .execute(&mut *tx)
        .await?;

    let upload_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM uploads WHERE user_id = ?")
        .bind(new.user_id)
        .fetch_one(&mut *tx)
        .await?;

    let first_upload_awarded = if upload_count == 1 {
        crate::db::achievements::award_in_tx(
            &mut tx,
            new.user_id,
            "First Upload",
            "Congratulations on uploading your first image!",
        )
        .await?
    } else {
        false
    };

    tx.commit().await?;

    Ok(UploadOutcome {
        upload_id,
        first_upload_awarded,
    })
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Upload>, sqlx::Error> {
    sqlx::query_as::<_, Upload>("SELECT * FROM uploads WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Feed listing, newest first, with an optional case-insensitive
/// substring match on location
pub async fn feed(
    pool: &SqlitePool,
    location: Option<&str>,
) -> Result<Vec<UploadWithUser>, sqlx::Error> {
    match location {
        Some(term) if !term.trim().is_empty() => {
            let pattern = format!("%{}%", term.trim());
            sqlx::query_as::<_, UploadWithUser>(
                "SELECT u.id, u.filename, u.label, u.summary_text, u.stats_json,
                        u.upload_time, u.location, users.username
                 FROM uploads u JOIN users ON users.id = u.user_id
                 WHERE u.location LIKE ? COLLATE NOCASE
                 ORDER BY u.upload_time DESC, u.id DESC",
            )
            .bind(pattern)
            .fetch_all(pool)
            .await
        }
        _ => {
            sqlx::query_as::<_, UploadWithUser>(
                "SELECT u.id, u.filename, u.label, u.summary_text, u.stats_json,
                        u.upload_time, u.location, users.username
                 FROM uploads u JOIN users ON users.id = u.user_id
                 ORDER BY u.upload_time DESC, u.id DESC",
            )
            .fetch_all(pool)
            .await
        }
    }
}

/// One user's uploads, newest first (profile page)
pub async fn list_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Upload>, sqlx::Error> {
    sqlx::query_as::<_, Upload>(
        "SELECT * FROM uploads WHERE user_id = ? ORDER BY upload_time DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn setup() -> (SqlitePool, i64) {
        let pool = db::connect_memory().await.unwrap();
        let user_id = db::users::create(&pool, "alice", "hash").await.unwrap();
        (pool, user_id)
    }

    fn new_upload(user_id: i64, location: Option<&str>) -> NewUpload {
        NewUpload {
            filename: "fox.jpg".to_string(),
            label: "red_fox".to_string(),
            summary_text: "A fox.".to_string(),
            stats_json: None,
            user_id,
            location: location.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn record_upload_awards_points_and_first_achievement() {
        let (pool, user_id) = setup().await;

        let outcome = record_upload(&pool, new_upload(user_id, None)).await.unwrap();
        assert!(outcome.first_upload_awarded);

        let user = db::users::find_by_id(&pool, user_id).await.unwrap().unwrap();
        assert_eq!(user.points, UPLOAD_REWARD_POINTS);

        // Second upload: more points, no second achievement
        let outcome = record_upload(&pool, new_upload(user_id, None)).await.unwrap();
        assert!(!outcome.first_upload_awarded);

        let user = db::users::find_by_id(&pool, user_id).await.unwrap().unwrap();
        assert_eq!(user.points, 2 * UPLOAD_REWARD_POINTS);

        let achievements = db::achievements::list_for_user(&pool, user_id).await.unwrap();
        assert_eq!(achievements.len(), 1);
        assert_eq!(achievements[0].name, "First Upload");
    }

    #[tokio::test]
    async fn feed_filters_location_case_insensitively() {
        let (pool, user_id) = setup().await;

        record_upload(&pool, new_upload(user_id, Some("Hyde Park"))).await.unwrap();
        record_upload(&pool, new_upload(user_id, Some("riverbank"))).await.unwrap();
        record_upload(&pool, new_upload(user_id, None)).await.unwrap();

        let filtered = feed(&pool, Some("park")).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].location.as_deref(), Some("Hyde Park"));

        let all = feed(&pool, None).await.unwrap();
        assert_eq!(all.len(), 3);

        // Blank filter behaves like no filter
        let blank = feed(&pool, Some("  ")).await.unwrap();
        assert_eq!(blank.len(), 3);
    }

    #[tokio::test]
    async fn feed_is_newest_first() {
        let (pool, user_id) = setup().await;

        let first = record_upload(&pool, new_upload(user_id, None)).await.unwrap();
        let second = record_upload(&pool, new_upload(user_id, None)).await.unwrap();

        let all = feed(&pool, None).await.unwrap();
        assert_eq!(all[0].id, second.upload_id);
        assert_eq!(all[1].id, first.upload_id);
    }
}
