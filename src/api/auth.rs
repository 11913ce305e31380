//! Registration, login, logout, profile

use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{extract::State, Extension, Form};
use serde::Deserialize;

use crate::api::pages;
use crate::auth::{password, CurrentUser, SessionCtx};
use crate::error::AppResult;
use crate::{db, AppState};

#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// GET /register
pub async fn register_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionCtx>,
) -> AppResult<Response> {
    if ctx.user_id.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let flashes = pages::drain_flash(&state, &ctx).await?;

    let body = r#"<form method="post" action="/register">
<p><label>Username <input name="username"></label></p>
<p><label>Password <input name="password" type="password"></label></p>
<p><button type="submit">Register</button></p>
</form>
<p>Already have an account? <a href="/login">Log in</a></p>"#;

    Ok(pages::page("Register", false, &flashes, body).into_response())
}

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionCtx>,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    if ctx.user_id.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        db::sessions::push_flash(
            &state.db,
            &ctx.id,
            "Please provide both username and password",
        )
        .await?;
        return Ok(Redirect::to("/register").into_response());
    }

    let password_hash = password::hash_password(&form.password)?;

    // The UNIQUE constraint is the source of truth for duplicates
    match db::users::create(&state.db, username, &password_hash).await {
        Ok(_) => {
            db::sessions::push_flash(
                &state.db,
                &ctx.id,
                "Registration successful. Please log in.",
            )
            .await?;
            Ok(Redirect::to("/login").into_response())
        }
        Err(e) if db::is_unique_violation(&e) => {
            db::sessions::push_flash(&state.db, &ctx.id, "Username already exists").await?;
            Ok(Redirect::to("/register").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /login
pub async fn login_form(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionCtx>,
) -> AppResult<Response> {
    if ctx.user_id.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let flashes = pages::drain_flash(&state, &ctx).await?;

    let body = r#"<form method="post" action="/login">
<p><label>Username <input name="username"></label></p>
<p><label>Password <input name="password" type="password"></label></p>
<p><button type="submit">Log in</button></p>
</form>
<p>New here? <a href="/register">Register</a></p>"#;

    Ok(pages::page("Log in", false, &flashes, body).into_response())
}

/// POST /login
///
/// Unknown username and wrong password produce the identical outcome so
/// responses carry no enumeration signal.
pub async fn login(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionCtx>,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    if ctx.user_id.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let user = db::users::find_by_username(&state.db, form.username.trim()).await?;
    let verified = match &user {
        Some(u) => password::verify_password(&u.password_hash, &form.password),
        None => false,
    };

    match (user, verified) {
        (Some(u), true) => {
            db::sessions::set_user(&state.db, &ctx.id, u.id).await?;
            db::sessions::push_flash(&state.db, &ctx.id, "Logged in successfully!").await?;
            Ok(Redirect::to("/").into_response())
        }
        _ => {
            db::sessions::push_flash(&state.db, &ctx.id, "Invalid username or password").await?;
            Ok(Redirect::to("/login").into_response())
        }
    }
}

/// GET /logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionCtx>,
) -> AppResult<Response> {
    db::sessions::clear_user(&state.db, &ctx.id).await?;
    db::sessions::push_flash(&state.db, &ctx.id, "You have been logged out.").await?;
    Ok(Redirect::to("/").into_response())
}

/// GET /profile
pub async fn profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionCtx>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> AppResult<Html<String>> {
    let flashes = pages::drain_flash(&state, &ctx).await?;
    let uploads = db::uploads::list_for_user(&state.db, user.id).await?;
    let achievements = db::achievements::list_for_user(&state.db, user.id).await?;

    let mut body = format!(
        "<p><strong>{}</strong> &mdash; {} points</p>",
        pages::escape_html(&user.username),
        user.points
    );

    body.push_str("<h2>Achievements</h2>");
    if achievements.is_empty() {
        body.push_str("<p>None yet.</p>");
    } else {
        body.push_str("<ul>");
        for a in &achievements {
            body.push_str(&format!(
                "<li><strong>{}</strong> ({}) &mdash; {}</li>",
                pages::escape_html(&a.name),
                a.awarded_at.format("%Y-%m-%d"),
                pages::escape_html(a.description.as_deref().unwrap_or("")),
            ));
        }
        body.push_str("</ul>");
    }

    body.push_str("<h2>Your uploads</h2>");
    if uploads.is_empty() {
        body.push_str("<p>No uploads yet. <a href=\"/upload\">Upload one</a>.</p>");
    } else {
        for u in &uploads {
            body.push_str(&format!(
                "<div class=\"card\"><a href=\"/upload/{}\">{}</a> &mdash; {} ({})</div>",
                u.id,
                pages::escape_html(&u.label),
                pages::escape_html(&u.filename),
                u.upload_time.format("%Y-%m-%d %H:%M"),
            ));
        }
    }

    Ok(pages::page("Profile", true, &flashes, &body))
}
