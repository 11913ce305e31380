//! wildsnap - social wildlife photo classification service
//!
//! Thin orchestration over three collaborators: a SQLite database, an
//! external image classifier, and an external text-generation API. Users
//! upload a photo, get back a species label plus an AI-written summary,
//! and interact through likes, comments, a location-filtered feed, and a
//! points leaderboard.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod services;

pub use crate::config::Config;
pub use crate::error::{AppError, AppResult};

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::{middleware, Router};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::services::{Classifier, Summarizer};

/// Uploaded images may be a few megabytes; cap multipart bodies well
/// above that but below anything abusive
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Application state shared across handlers
///
/// Collaborator clients are constructed once at startup and injected
/// here; handlers never reach for ambient globals.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Config>,
    pub classifier: Arc<dyn Classifier>,
    pub summarizer: Arc<dyn Summarizer>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: Config,
        classifier: Arc<dyn Classifier>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            classifier,
            summarizer,
            startup_time: Utc::now(),
        }
    }
}

/// Build the application router
///
/// Guarded routes redirect unauthenticated browsers to the login page;
/// the session middleware wraps everything except the health endpoint.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/profile", get(api::auth::profile))
        .route("/logout", get(api::auth::logout))
        .route("/upload", get(api::upload::upload_form).post(api::upload::upload))
        .route(
            "/upload/:id",
            get(api::upload::upload_detail).post(api::upload::add_comment),
        )
        .route("/feed", get(api::feed::feed))
        .route("/like/:id", get(api::feed::like))
        .route("/leaderboard", get(api::feed::leaderboard))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_login,
        ));

    let public = Router::new()
        .route("/", get(api::pages::landing))
        .route("/register", get(api::auth::register_form).post(api::auth::register))
        .route("/login", get(api::auth::login_form).post(api::auth::login))
        .route("/history", get(api::feed::history))
        .merge(api::health::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::session_middleware,
        ))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
