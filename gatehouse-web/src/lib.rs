//! Gatehouse Web Server
//!
//! HTTP surface of the auth core: login, refresh, registration, account
//! administration, and the per-request authorization filter in front of every
//! route.

pub mod filter;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

// Re-export main types
pub use filter::CurrentIdentity;
pub use server::{GatehouseServer, GatehouseServerBuilder};
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    middleware,
    response::{IntoResponse, Json, Response},
    Router,
};
use gatehouse_auth::{AuthError, AuthorizationFailure, StoreError};
use gatehouse_core::GatehouseError;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    let cors = if state.config.server.dev_mode {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin([
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ])
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_credentials(true)
            .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
    };

    // Layers run bottom-up: the filter attaches identity before the policy reads it
    Router::new()
        .nest("/api", routes::api_routes())
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            filter::enforce_access_policy,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            filter::authorization_filter,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}

/// Error types for the web server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Core(#[from] GatehouseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<AuthorizationFailure> for WebError {
    fn from(failure: AuthorizationFailure) -> Self {
        WebError::Auth(failure.into())
    }
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

fn auth_error_parts(err: &AuthError) -> (StatusCode, &'static str, String) {
    match err {
        AuthError::Authentication(failure) => (
            StatusCode::UNAUTHORIZED,
            failure.code(),
            failure.user_message().to_string(),
        ),
        AuthError::Token(token) => (StatusCode::UNAUTHORIZED, token.code(), token.to_string()),
        AuthError::Authorization(AuthorizationFailure::Unauthenticated) => (
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "Authentication is required to access this resource".to_string(),
        ),
        AuthError::Authorization(failure @ AuthorizationFailure::InsufficientRole { .. }) => {
            (StatusCode::FORBIDDEN, "forbidden", failure.to_string())
        }
        AuthError::Store(StoreError::NotFound(what)) => (
            StatusCode::NOT_FOUND,
            "not_found",
            format!("No such account: {}", what),
        ),
        AuthError::Store(StoreError::Conflict(what)) => (
            StatusCode::CONFLICT,
            "conflict",
            format!("{} is already taken", what),
        ),
        AuthError::Validation { .. } | AuthError::UnknownRole(_) => {
            (StatusCode::BAD_REQUEST, "invalid_request", err.to_string())
        }
        AuthError::Timeout { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            "timeout",
            "The request timed out; try again".to_string(),
        ),
        AuthError::Store(StoreError::Backend(_)) | AuthError::Hashing | AuthError::TokenCreation => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error".to_string(),
        ),
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            WebError::Auth(err) => auth_error_parts(err),
            WebError::Server(_) | WebError::Core(_) | WebError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": error_code,
            "message": message,
        }));

        (status, body).into_response()
    }
}
