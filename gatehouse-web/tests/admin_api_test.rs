//! Administrative and self-service account flows over HTTP

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use gatehouse_auth::Argon2Hasher;
use gatehouse_core::{BootstrapAdmin, GatehouseConfig};
use gatehouse_web::{create_app, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    admin_token: String,
}

impl TestApp {
    async fn new() -> Self {
        let mut config = GatehouseConfig::default();
        config.server.dev_mode = true;
        config.bootstrap_admin = Some(BootstrapAdmin {
            username: "root".into(),
            email: "root@example.com".into(),
            password: "root-password".into(),
            roles: vec!["ADMIN".into()],
        });
        let state = AppState::with_hasher(config, Arc::new(Argon2Hasher::low_cost()))
            .await
            .unwrap();

        let mut app = Self {
            router: create_app(state),
            admin_token: String::new(),
        };
        let login = app.login("root", "root-password").await;
        app.admin_token = login["accessToken"].as_str().unwrap().to_string();

        let (status, _) = app
            .call(
                "POST",
                "/api/auth/register",
                Some(json!({
                    "username": "staffer",
                    "email": "staffer@example.com",
                    "password": "password123"
                })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        app
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn admin(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call(method, uri, body, Some(&self.admin_token)).await
    }

    async fn login(&self, username: &str, password: &str) -> Value {
        let (status, body) = self
            .call(
                "POST",
                "/api/auth/login",
                Some(json!({ "username": username, "password": password })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body
    }
}

#[tokio::test]
async fn test_bootstrap_admin_holds_normalized_role() {
    let app = TestApp::new().await;
    let (status, me) = app
        .call("GET", "/api/auth/me", None, Some(&app.admin_token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["subject"], "root");
    assert_eq!(me["roles"], json!(["ROLE_ADMIN"]));
}

#[tokio::test]
async fn test_account_status_and_deactivation() {
    let app = TestApp::new().await;

    let (status, body) = app.admin("GET", "/api/admin/users/staffer", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "staffer");
    assert_eq!(body["state"], "ACTIVE_UNLOCKED");
    assert_eq!(body["credentialExpired"], false);

    let (status, body) = app
        .admin("POST", "/api/admin/users/staffer/deactivate", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "INACTIVE");

    let login = app.login("staffer", "password123").await;
    assert_eq!(login["success"], false);
    assert_eq!(login["message"], "Account has been disabled");

    let (status, _) = app
        .admin("POST", "/api/admin/users/staffer/activate", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.login("staffer", "password123").await["success"], true);
}

#[tokio::test]
async fn test_unknown_account_and_role_errors() {
    let app = TestApp::new().await;

    let (status, body) = app
        .admin("POST", "/api/admin/users/nobody/unlock", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = app
        .admin(
            "PUT",
            "/api/admin/users/staffer/roles",
            Some(json!({ "roles": ["ROLE_WIZARD"] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    let (status, _) = app
        .admin(
            "PUT",
            "/api/admin/users/staffer/roles",
            Some(json!({ "roles": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expired_password_must_be_changed() {
    let app = TestApp::new().await;
    let login = app.login("staffer", "password123").await;
    let token = login["accessToken"].as_str().unwrap().to_string();

    let (status, body) = app
        .admin("POST", "/api/admin/users/staffer/expire-password", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["credentialExpired"], true);

    let login = app.login("staffer", "password123").await;
    assert_eq!(login["success"], false);
    assert_eq!(login["message"], "Password has expired and must be changed");

    // Wrong current password
    let (status, _) = app
        .call(
            "POST",
            "/api/users/me/password",
            Some(json!({
                "currentPassword": "not-my-password",
                "newPassword": "fresh-password"
            })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(
            "POST",
            "/api/users/me/password",
            Some(json!({
                "currentPassword": "password123",
                "newPassword": "fresh-password"
            })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(app.login("staffer", "password123").await["success"], false);
    assert_eq!(app.login("staffer", "fresh-password").await["success"], true);
}

#[tokio::test]
async fn test_public_role_catalog_and_logout() {
    let app = TestApp::new().await;

    let (status, roles) = app.call("GET", "/api/roles", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = roles
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.first(), Some(&"ROLE_SUPER_ADMIN"));
    assert_eq!(names.last(), Some(&"ROLE_USER"));

    let (status, _) = app.call("POST", "/api/auth/logout", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call("POST", "/api/auth/logout", None, Some(&app.admin_token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}
