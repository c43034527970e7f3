//! Authentication handlers for login, token refresh, registration and logout

use crate::{AppState, CurrentIdentity, WebResult};
use axum::{extract::State, response::Json};
use gatehouse_auth::{AuthError, AuthenticationFailure, Identity, Registration, UserInfo};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

/// User login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login outcome; failures are reported in the body, not the status code
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LoginResponse {
    fn failure(message: &str) -> Self {
        Self {
            success: false,
            access_token: None,
            refresh_token: None,
            token_type: None,
            expires_in: None,
            user_info: None,
            message: Some(message.to_string()),
        }
    }
}

/// Token refresh request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Password change request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// User login endpoint
///
/// Credential failures answer 200 with `success: false`; only infrastructure
/// failures produce an error status.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> WebResult<Json<LoginResponse>> {
    match state.verifier.login(&request.username, &request.password).await {
        Ok(success) => Ok(Json(LoginResponse {
            success: true,
            access_token: Some(success.tokens.access_token),
            refresh_token: Some(success.tokens.refresh_token),
            token_type: Some(success.tokens.token_type),
            expires_in: Some(success.tokens.expires_in),
            user_info: Some(success.user_info),
            message: None,
        })),
        Err(AuthError::Authentication(failure)) => {
            let message = if state.config.security.detailed_login_errors {
                failure.user_message()
            } else {
                AuthenticationFailure::generic_message()
            };
            Ok(Json(LoginResponse::failure(message)))
        }
        Err(e) => Err(e.into()),
    }
}

/// Token refresh endpoint
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> WebResult<Json<RefreshResponse>> {
    let access_token = state.verifier.refresh(&request.refresh_token).await?;
    Ok(Json(RefreshResponse { access_token }))
}

/// User registration endpoint
pub async fn register(
    State(state): State<AppState>,
    Json(registration): Json<Registration>,
) -> WebResult<Json<Value>> {
    let user_info = state.verifier.register(registration).await?;
    Ok(Json(json!({
        "success": true,
        "userInfo": user_info,
    })))
}

/// Current identity, as carried by the access token
pub async fn me(CurrentIdentity(identity): CurrentIdentity) -> Json<Identity> {
    Json(identity)
}

/// Logout endpoint
///
/// Tokens stay valid until they expire; clients discard them.
pub async fn logout(CurrentIdentity(identity): CurrentIdentity) -> Json<Value> {
    info!("User logout: {}", identity.subject);
    Json(json!({
        "success": true,
        "message": "Logged out successfully",
    }))
}

/// Change the caller's own password
pub async fn change_password(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(request): Json<ChangePasswordRequest>,
) -> WebResult<Json<Value>> {
    state
        .accounts
        .change_password(
            &identity.subject,
            &request.current_password,
            &request.new_password,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Password changed",
    })))
}
