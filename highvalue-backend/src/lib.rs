// High-value user analytics backend
// Segments high net-bet users into active and dormant groups and serves the
// result as JSON or HTML.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

pub mod analysis;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod render;
pub mod segmentation;
pub mod store;

use error::AnalyticsError;
use models::ApiResponse;
use store::ActivityStore;

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<dyn ActivityStore>,
    /// Inactivity threshold applied when a request names none.
    pub default_threshold_days: u32,
}

/// A pipeline failure together with what the request was trying to do.
#[derive(Debug)]
pub struct ApiError {
    context: &'static str,
    error: AnalyticsError,
}

impl ApiError {
    pub fn new(context: &'static str, error: AnalyticsError) -> Self {
        Self { context, error }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("{}: {}", self.context, self.error);

        let detail = match &self.error {
            // Driver detail stays in the logs.
            AnalyticsError::Connection(_) => "database connection unavailable".to_string(),
            other => other.to_string(),
        };

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::failure(self.context, detail)),
        )
            .into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .route(
            "/api/v1/users/high-value/report",
            get(handlers::high_value_report),
        )
        .route("/api/v1/users/high-value/active", get(handlers::active_users))
        .route("/api/v1/users/high-value/dormant", get(handlers::dormant_users))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
