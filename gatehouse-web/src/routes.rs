//! Route definitions
//!
//! Access rules live in the policy table, not here; every route below sits
//! behind the authorization filter.

use crate::{
    handlers::{self, admin, auth},
    AppState,
};
use axum::{
    routing::{get, post, put},
    Router,
};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Authentication
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/register", post(auth::register))
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        // Role catalog
        .route("/roles", get(handlers::list_roles))
        // Self-service
        .route("/users/me/password", post(auth::change_password))
        // Administration
        .route("/admin/users/{username}", get(admin::account_status))
        .route("/admin/users/{username}/unlock", post(admin::unlock))
        .route("/admin/users/{username}/activate", post(admin::activate))
        .route("/admin/users/{username}/deactivate", post(admin::deactivate))
        .route(
            "/admin/users/{username}/expire-password",
            post(admin::expire_password),
        )
        .route("/admin/users/{username}/roles", put(admin::assign_roles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use gatehouse_core::GatehouseConfig;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_check_route() {
        let mut config = GatehouseConfig::default();
        config.server.dev_mode = true;
        let state = AppState::new(config).await.unwrap();
        let app = api_routes().with_state(state);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
