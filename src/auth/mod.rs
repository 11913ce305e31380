//! Session plumbing and route guarding
//!
//! Every request passes through `session_middleware`, which resolves (or
//! creates) a server-side session from the opaque session cookie and
//! stashes a `SessionCtx` in request extensions. Guarded routes add
//! `require_login`, which resolves the session's user or redirects to the
//! login page; the surface is a browser UI, so unauthenticated requests
//! get a redirect rather than a 401.

pub mod password;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use cookie::{Cookie, SameSite};

use crate::db;
use crate::AppState;

/// Per-request session context
#[derive(Debug, Clone)]
pub struct SessionCtx {
    pub id: String,
    pub user_id: Option<i64>,
}

/// The authenticated user, inserted by `require_login`
#[derive(Debug, Clone)]
pub struct CurrentUser(pub db::users::User);

/// Resolve or create the session for this request
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Health checks should not mint sessions
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let cookie_name = state.config.cookie_name.clone();
    let existing_id = cookie_value(request.headers(), &cookie_name);

    let (session, fresh) = match resolve_session(&state, existing_id.as_deref()).await {
        Ok(pair) => pair,
        Err(e) => return crate::AppError::from(e).into_response(),
    };

    request.extensions_mut().insert(SessionCtx {
        id: session.id.clone(),
        user_id: session.user_id,
    });

    let mut response = next.run(request).await;

    if fresh {
        let cookie = Cookie::build((cookie_name, session.id))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(cookie::time::Duration::days(db::sessions::SESSION_TTL_DAYS))
            .build();
        if let Ok(value) = cookie.to_string().parse() {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

async fn resolve_session(
    state: &AppState,
    existing_id: Option<&str>,
) -> Result<(db::sessions::Session, bool), sqlx::Error> {
    if let Some(id) = existing_id {
        if let Some(session) = db::sessions::find(&state.db, id).await? {
            return Ok((session, false));
        }
    }
    let session = db::sessions::create(&state.db).await?;
    Ok((session, true))
}

/// Require an authenticated user, redirecting to the login page otherwise
pub async fn require_login(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(ctx) = request.extensions().get::<SessionCtx>().cloned() else {
        return Redirect::to("/login").into_response();
    };

    let Some(user_id) = ctx.user_id else {
        return Redirect::to("/login").into_response();
    };

    match db::users::find_by_id(&state.db, user_id).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        Ok(None) => {
            // Stale binding to a user row that no longer exists
            let _ = db::sessions::clear_user(&state.db, &ctx.id).await;
            Redirect::to("/login").into_response()
        }
        Err(e) => crate::AppError::from(e).into_response(),
    }
}

/// Extract a cookie value from request headers
fn cookie_value(headers: &axum::http::HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';')
        .find_map(|kv| kv.trim().strip_prefix(&format!("{}=", name)))
        .map(str::to_string)
}
