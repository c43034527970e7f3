//! Account administration handlers

use crate::{AppState, CurrentIdentity, WebResult};
use axum::{
    extract::{Path, State},
    response::Json,
};
use gatehouse_auth::AccountStatus;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct AssignRolesRequest {
    pub roles: Vec<String>,
}

pub async fn account_status(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> WebResult<Json<AccountStatus>> {
    Ok(Json(state.accounts.status(&username).await?))
}

pub async fn unlock(
    State(state): State<AppState>,
    CurrentIdentity(admin): CurrentIdentity,
    Path(username): Path<String>,
) -> WebResult<Json<AccountStatus>> {
    info!("{} unlocking {}", admin.subject, username);
    Ok(Json(state.accounts.unlock(&username).await?))
}

pub async fn activate(
    State(state): State<AppState>,
    CurrentIdentity(admin): CurrentIdentity,
    Path(username): Path<String>,
) -> WebResult<Json<AccountStatus>> {
    info!("{} activating {}", admin.subject, username);
    Ok(Json(state.accounts.activate(&username).await?))
}

pub async fn deactivate(
    State(state): State<AppState>,
    CurrentIdentity(admin): CurrentIdentity,
    Path(username): Path<String>,
) -> WebResult<Json<AccountStatus>> {
    info!("{} deactivating {}", admin.subject, username);
    Ok(Json(state.accounts.deactivate(&username).await?))
}

pub async fn expire_password(
    State(state): State<AppState>,
    CurrentIdentity(admin): CurrentIdentity,
    Path(username): Path<String>,
) -> WebResult<Json<AccountStatus>> {
    info!("{} expiring credentials of {}", admin.subject, username);
    Ok(Json(state.accounts.expire_credentials(&username).await?))
}

pub async fn assign_roles(
    State(state): State<AppState>,
    CurrentIdentity(admin): CurrentIdentity,
    Path(username): Path<String>,
    Json(request): Json<AssignRolesRequest>,
) -> WebResult<Json<AccountStatus>> {
    info!("{} assigning roles to {}", admin.subject, username);
    Ok(Json(
        state
            .accounts
            .assign_roles(&username, request.roles.as_slice())
            .await?,
    ))
}
