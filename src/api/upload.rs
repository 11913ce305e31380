//! Upload pipeline and upload detail pages
//!
//! The POST handler is the one place in the application with real
//! sequencing: validate, persist the file, call the classifier, call the
//! summary generator, then commit every database effect in a single
//! transaction. Collaborator failure before the commit leaves the
//! database untouched.

use axum::extract::{Multipart, Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Extension, Form};
use serde::Deserialize;

use crate::api::pages;
use crate::auth::{CurrentUser, SessionCtx};
use crate::error::{AppError, AppResult};
use crate::services::{parse_stats_response, SpeciesStats};
use crate::{db, AppState};

/// Accepted image file extensions
const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// GET /upload
pub async fn upload_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionCtx>,
) -> AppResult<Html<String>> {
    let flashes = pages::drain_flash(&state, &ctx).await?;

    let body = r#"<form method="post" action="/upload" enctype="multipart/form-data">
<p><label>Image <input type="file" name="file" accept="image/*"></label></p>
<p><label>Location (optional) <input name="location" placeholder="e.g. Hyde Park"></label></p>
<p><button type="submit">Upload and classify</button></p>
</form>"#;

    Ok(pages::page("Upload", true, &flashes, body))
}

/// POST /upload
pub async fn upload(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionCtx>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut location: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart request: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read file: {}", e)))?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("location") => {
                let value = field.text().await.unwrap_or_default();
                let trimmed = value.trim().to_string();
                if !trimmed.is_empty() {
                    location = Some(trimmed);
                }
            }
            _ => {}
        }
    }

    let Some((original_filename, bytes)) = file else {
        return flash_redirect(&state, &ctx, "No file part in the request", "/upload").await;
    };
    if original_filename.is_empty() || bytes.is_empty() {
        return flash_redirect(&state, &ctx, "No file selected", "/upload").await;
    }
    if !allowed_extension(&original_filename) {
        return flash_redirect(
            &state,
            &ctx,
            "File type not allowed (png, jpg, jpeg, gif)",
            "/upload",
        )
        .await;
    }

    // Random prefix keeps concurrent same-name uploads from clobbering
    // each other on disk
    let stored_filename = format!(
        "{:08x}_{}",
        rand::random::<u32>(),
        sanitize_filename(&original_filename)
    );
    let file_path = state.config.upload_dir.join(&stored_filename);

    tokio::fs::create_dir_all(&state.config.upload_dir).await?;
    tokio::fs::write(&file_path, &bytes).await?;

    // Both collaborator calls must succeed before anything is persisted
    let label = match state.classifier.classify(&bytes, &stored_filename).await {
        Ok(label) => label,
        Err(e) => {
            tracing::warn!("classification failed: {}", e);
            let _ = tokio::fs::remove_file(&file_path).await;
            return flash_redirect(&state, &ctx, "Error processing the image", "/upload").await;
        }
    };

    let raw_summary = match state.summarizer.summarize(&label).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("summary generation failed: {}", e);
            let _ = tokio::fs::remove_file(&file_path).await;
            return flash_redirect(&state, &ctx, "Error processing the image", "/upload").await;
        }
    };

    let (stats, summary_text) = parse_stats_response(&raw_summary);
    let stats_json = stats
        .as_ref()
        .and_then(|s| serde_json::to_string(s).ok());

    let outcome = db::uploads::record_upload(
        &state.db,
        db::uploads::NewUpload {
            filename: stored_filename.clone(),
            label: label.clone(),
            summary_text: summary_text.clone(),
            stats_json,
            user_id: user.id,
            location,
        },
    )
    .await?;

    if outcome.first_upload_awarded {
        db::sessions::push_flash(&state.db, &ctx.id, "Achievement unlocked: First Upload!")
            .await?;
    }

    tracing::info!(
        upload_id = outcome.upload_id,
        user = %user.username,
        label = %label,
        "upload recorded"
    );

    let flashes = pages::drain_flash(&state, &ctx).await?;
    let mut body = format!(
        "<p>Classified as <strong>{}</strong></p>",
        pages::escape_html(&label)
    );
    if let Some(stats) = &stats {
        body.push_str(&stats_table_html(stats));
    }
    body.push_str(&format!(
        "<p>{}</p><p>Stored as <code>{}</code></p>\
         <p><a href=\"/upload/{}\">View &amp; comment</a></p>",
        pages::escape_html(&summary_text),
        pages::escape_html(&stored_filename),
        outcome.upload_id,
    ));

    Ok(pages::page("Result", true, &flashes, &body).into_response())
}

/// GET /upload/:id
pub async fn upload_detail(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionCtx>,
    Path(upload_id): Path<i64>,
) -> AppResult<Html<String>> {
    let upload = db::uploads::get(&state.db, upload_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("upload {}", upload_id)))?;

    let flashes = pages::drain_flash(&state, &ctx).await?;
    let comments = db::comments::list_for_upload(&state.db, upload_id).await?;
    let like_count = db::likes::count_for_upload(&state.db, upload_id).await?;

    let mut body = format!(
        "<p><strong>{}</strong> &mdash; {}</p>",
        pages::escape_html(&upload.label),
        pages::escape_html(&upload.filename),
    );
    if let Some(loc) = &upload.location {
        body.push_str(&format!("<p>Location: {}</p>", pages::escape_html(loc)));
    }
    if let Some(summary) = &upload.summary_text {
        body.push_str(&format!("<p>{}</p>", pages::escape_html(summary)));
    }
    if let Some(stats) = upload
        .stats_json
        .as_deref()
        .and_then(|s| serde_json::from_str::<SpeciesStats>(s).ok())
    {
        body.push_str(&stats_table_html(&stats));
    }
    body.push_str(&format!(
        "<p><a href=\"/like/{}\">&#10084; {}</a></p>",
        upload.id, like_count
    ));

    body.push_str("<h2>Comments</h2>");
    if comments.is_empty() {
        body.push_str("<p>No comments yet.</p>");
    } else {
        for c in &comments {
            body.push_str(&format!(
                "<div class=\"card\"><strong>{}</strong> ({}): {}</div>",
                pages::escape_html(&c.username),
                c.created_at.format("%Y-%m-%d %H:%M"),
                pages::escape_html(&c.content),
            ));
        }
    }
    body.push_str(&format!(
        r#"<form method="post" action="/upload/{}">
<p><textarea name="content" rows="3" cols="60"></textarea></p>
<p><button type="submit">Add comment</button></p>
</form>"#,
        upload.id
    ));

    Ok(pages::page("Upload detail", true, &flashes, &body))
}

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub content: String,
}

/// POST /upload/:id
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionCtx>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(upload_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    if db::uploads::get(&state.db, upload_id).await?.is_none() {
        return Err(AppError::NotFound(format!("upload {}", upload_id)));
    }

    let target = format!("/upload/{}", upload_id);
    let content = form.content.trim();
    if content.is_empty() {
        return flash_redirect(
            &state,
            &ctx,
            "Please enter some text for your comment.",
            &target,
        )
        .await;
    }

    db::comments::insert(&state.db, user.id, upload_id, content).await?;
    flash_redirect(&state, &ctx, "Comment added!", &target).await
}

async fn flash_redirect(
    state: &AppState,
    ctx: &SessionCtx,
    message: &str,
    target: &str,
) -> AppResult<Response> {
    db::sessions::push_flash(&state.db, &ctx.id, message).await?;
    Ok(Redirect::to(target).into_response())
}

fn stats_table_html(stats: &SpeciesStats) -> String {
    let mut rows = String::new();
    for (key, value) in stats {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        rows.push_str(&format!(
            "<tr><th>{}</th><td>{}</td></tr>",
            pages::escape_html(key),
            pages::escape_html(&rendered),
        ));
    }
    format!("<table>{}</table>", rows)
}

/// True when the filename carries an allow-listed extension
fn allowed_extension(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reduce an untrusted filename to a safe basename: path components and
/// control characters stripped, anything outside [A-Za-z0-9._-] replaced
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.').to_string();
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed
    }
}
