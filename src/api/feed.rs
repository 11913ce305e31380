//! Feed, like toggle, leaderboard, history

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Extension;
use serde::Deserialize;

use crate::api::pages;
use crate::auth::{CurrentUser, SessionCtx};
use crate::error::{AppError, AppResult};
use crate::services::SpeciesStats;
use crate::{db, AppState};

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub location: Option<String>,
}

/// GET /feed?location=…
pub async fn feed(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionCtx>,
    Query(query): Query<FeedQuery>,
) -> AppResult<Html<String>> {
    let flashes = pages::drain_flash(&state, &ctx).await?;
    let results = db::uploads::feed(&state.db, query.location.as_deref()).await?;

    let current = query.location.as_deref().unwrap_or("");
    let mut body = format!(
        r#"<form method="get" action="/feed">
<p><label>Filter by location <input name="location" value="{}"></label>
<button type="submit">Filter</button></p>
</form>"#,
        pages::escape_html(current),
    );

    if let Some(term) = query.location.as_deref().filter(|t| !t.trim().is_empty()) {
        body.push_str(&format!(
            "<p>Showing uploads near <strong>{}</strong> &mdash; <a href=\"/feed\">clear</a></p>",
            pages::escape_html(term)
        ));
    }

    if results.is_empty() {
        body.push_str("<p>No uploads found.</p>");
    } else {
        for r in &results {
            body.push_str(&upload_card(r));
        }
    }

    Ok(pages::page("Feed", true, &flashes, &body))
}

/// GET /like/:id
///
/// Strict toggle: one endpoint flips the like state for the current user,
/// then bounces back to wherever the click came from.
pub async fn like(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionCtx>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(upload_id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<Response> {
    if db::uploads::get(&state.db, upload_id).await?.is_none() {
        return Err(AppError::NotFound(format!("upload {}", upload_id)));
    }

    let now_liked = db::likes::toggle(&state.db, user.id, upload_id).await?;
    let message = if now_liked {
        "You liked the upload!"
    } else {
        "You removed your like."
    };
    db::sessions::push_flash(&state.db, &ctx.id, message).await?;

    let target = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("/feed")
        .to_string();
    Ok(Redirect::to(&target).into_response())
}

/// GET /leaderboard
pub async fn leaderboard(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionCtx>,
) -> AppResult<Html<String>> {
    let flashes = pages::drain_flash(&state, &ctx).await?;
    let users = db::users::leaderboard(&state.db).await?;

    let mut body = String::from("<table><tr><th>#</th><th>User</th><th>Points</th></tr>");
    for (rank, user) in users.iter().enumerate() {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            rank + 1,
            pages::escape_html(&user.username),
            user.points,
        ));
    }
    body.push_str("</table>");

    Ok(pages::page("Leaderboard", true, &flashes, &body))
}

/// GET /history (public)
pub async fn history(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionCtx>,
) -> AppResult<Html<String>> {
    let flashes = pages::drain_flash(&state, &ctx).await?;
    let results = db::uploads::feed(&state.db, None).await?;

    let mut body = String::new();
    if results.is_empty() {
        body.push_str("<p>Nothing has been uploaded yet.</p>");
    } else {
        for r in &results {
            body.push_str(&upload_card(r));
        }
    }

    Ok(pages::page("History", ctx.user_id.is_some(), &flashes, &body))
}

/// Render one upload as a feed/history card. Stored stats are parsed
/// best-effort; malformed stats render as absent.
fn upload_card(upload: &db::uploads::UploadWithUser) -> String {
    let mut card = format!(
        "<div class=\"card\"><a href=\"/upload/{}\"><strong>{}</strong></a> by {} ({})",
        upload.id,
        pages::escape_html(&upload.label),
        pages::escape_html(&upload.username),
        upload.upload_time.format("%Y-%m-%d %H:%M"),
    );
    if let Some(loc) = &upload.location {
        card.push_str(&format!(" &mdash; {}", pages::escape_html(loc)));
    }
    if let Some(summary) = &upload.summary_text {
        card.push_str(&format!("<p>{}</p>", pages::escape_html(summary)));
    }
    if let Some(stats) = upload
        .stats_json
        .as_deref()
        .and_then(|s| serde_json::from_str::<SpeciesStats>(s).ok())
    {
        card.push_str("<ul>");
        for (key, value) in &stats {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            card.push_str(&format!(
                "<li>{}: {}</li>",
                pages::escape_html(key),
                pages::escape_html(&rendered),
            ));
        }
        card.push_str("</ul>");
    }
    card.push_str("</div>");
    card
}
