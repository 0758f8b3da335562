//! REST API over the Leornian core services.
//!
//! # Responsibility
//! - Map HTTP routes onto core use-case services.
//! - Run blocking SQLite work off the async runtime threads.
//!
//! # Invariants
//! - Every request opens its own connection; nothing is shared across
//!   requests except immutable settings and the mail/captcha backends.
//! - Caller identity comes only from the `X-Remote-User` header.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod resources;

use crate::error::{ApiError, ApiResult};
use axum::routing::{get, post};
use axum::Router;
use leornian_core::captcha::CaptchaTransport;
use leornian_core::db::open_db;
use leornian_core::mail::Mailer;
use leornian_core::Settings;
use rusqlite::Connection;
use std::sync::Arc;

/// Shared, read-only server state.
pub struct AppState {
    pub settings: Settings,
    pub mailer: Arc<dyn Mailer>,
    /// Blocking transport; only called from blocking tasks.
    pub captcha: Arc<dyn CaptchaTransport + Send + Sync>,
}

/// Builds the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/notes/preview_html", post(handlers::preview_html))
        .route("/notes/{code}", get(handlers::get_note))
        .route("/collection", get(handlers::list_collection))
        .route("/collection/{code}/save", post(handlers::save_note))
        .route("/collection/{code}/unsave", post(handlers::unsave_note))
        .route("/authors/{username}", get(handlers::notes_by_author))
        .route("/drill", get(handlers::drill_peek))
        .route("/drill/draw", post(handlers::drill_draw))
        .route("/support/contact", post(handlers::contact_support));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .with_state(state)
}

/// Runs `work` with a fresh connection on the blocking thread pool.
pub(crate) async fn with_connection<T, F>(state: &Arc<AppState>, work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection, &AppState) -> ApiResult<T> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || {
        let mut conn = open_db(&state.settings.db_path)?;
        work(&mut conn, &state)
    })
    .await
    .map_err(|err| ApiError::Internal(format!("blocking task failed: {err}")))?
}
