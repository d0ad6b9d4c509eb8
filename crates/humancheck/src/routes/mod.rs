//! HTTP route handlers for HumanCheck.

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use humancheck_common::HumanCheckError;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod captcha;
mod health;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))

        // CAPTCHA endpoints
        .route("/challenge", get(captcha::get_challenge))
        .route("/verify", post(captcha::verify_challenge))
        .route("/captcha/{key}", get(captcha::render_once))

        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error returned from handlers
#[derive(Debug)]
pub struct ApiError(pub HumanCheckError);

impl From<HumanCheckError> for ApiError {
    fn from(err: HumanCheckError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Server-side details stay in the log
        let message = if status.is_server_error() {
            tracing::error!(error = %self.0, retryable = self.0.is_retryable(), "Request failed");
            status.canonical_reason().unwrap_or("Internal Server Error").to_string()
        } else {
            self.0.to_string()
        };

        let body = serde_json::json!({
            "error": message,
            "code": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}
