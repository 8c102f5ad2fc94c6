pub mod auth;
pub mod carbon;
pub mod certifications;
pub mod csr;
pub mod notifications;
pub mod profile;
pub mod uploads;
pub mod workshops;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::db::AppState;
use crate::services::aggregation::Pagination;

/// Success body: `{ "success": true, "message"?, "data", "pagination"? }`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> Envelope<T> {
    pub fn data(data: T) -> Self {
        Envelope { success: true, message: None, data, pagination: None }
    }

    pub fn message(message: &'static str, data: T) -> Self {
        Envelope { message: Some(message), ..Self::data(data) }
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

/// Everything under `/api/v1`.
pub fn router(state: Arc<AppState>) -> Router {
    // CSV uploads and attachments share one cap.
    let upload_limit = state.config.max_csv_bytes;

    Router::new()
        .nest("/carbon-submissions", carbon::router(upload_limit))
        .nest(
            "/auth",
            Router::new()
                .route("/register", post(auth::register))
                .route("/login", post(auth::login))
                .route("/logout", post(auth::logout))
                .route("/me", get(auth::me)),
        )
        .nest(
            "/profile",
            Router::new()
                .route("/me", get(auth::me))
                .route("/update", put(profile::update_profile))
                .route("/change-password", put(profile::change_password)),
        )
        .nest(
            "/csr",
            Router::new()
                .route(
                    "/ajukan",
                    post(csr::submit).layer(DefaultBodyLimit::max(upload_limit)),
                )
                .route("/history", get(csr::history))
                .route("/history/:id", get(csr::detail))
                .route("/summary", get(csr::summary)),
        )
        .nest(
            "/certifications",
            Router::new()
                .route("/", get(certifications::list))
                .route("/apply", post(certifications::apply))
                .route("/:id", get(certifications::detail))
                .route("/:id/status", put(certifications::update_status)),
        )
        .route(
            "/workshops/register",
            post(workshops::register).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .nest(
            "/notifications",
            Router::new()
                .route("/", post(notifications::create))
                .route("/:id", get(notifications::list).delete(notifications::delete))
                .route("/:id/read", patch(notifications::mark_read)),
        )
        .with_state(state)
}
