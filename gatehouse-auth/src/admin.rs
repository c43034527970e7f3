//! Administrative account actions

use crate::account::AccountState;
use crate::catalog::RoleCatalog;
use crate::error::{AuthError, AuthResult, AuthenticationFailure, StoreError};
use crate::password::SecretHasher;
use crate::principal::{NewPrincipal, Principal, UserInfo};
use crate::role::{Role, RoleName};
use crate::store::CredentialStore;
use crate::timeouts::Timeouts;
use crate::verifier::{validate_password, validate_username};
use chrono::{DateTime, Utc};
use gatehouse_core::SecurityConfig;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Account view returned by administrative actions
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    #[serde(flatten)]
    pub user: UserInfo,
    pub state: AccountState,
    pub failed_attempts: u32,
    pub credential_expired: bool,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&Principal> for AccountStatus {
    fn from(principal: &Principal) -> Self {
        Self {
            user: principal.to_user_info(),
            state: principal.security.state(),
            failed_attempts: principal.security.failed_attempts,
            credential_expired: principal.security.is_credential_expired,
            last_login_at: principal.security.last_login_at,
        }
    }
}

/// Unlock, activation, role assignment and password changes
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn SecretHasher>,
    catalog: Arc<RoleCatalog>,
    timeouts: Timeouts,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn SecretHasher>,
        catalog: Arc<RoleCatalog>,
        security: &SecurityConfig,
    ) -> Self {
        Self {
            store,
            hasher,
            catalog,
            timeouts: Timeouts::from_config(security),
        }
    }

    async fn require(&self, username: &str) -> AuthResult<Principal> {
        self.timeouts
            .store("find_by_username", self.store.find_by_username(username))
            .await?
            .ok_or_else(|| StoreError::NotFound(username.to_string()).into())
    }

    async fn reload(&self, principal: &Principal) -> AuthResult<AccountStatus> {
        let principal = self
            .timeouts
            .store("find_by_id", self.store.find_by_id(principal.id))
            .await?
            .ok_or_else(|| StoreError::NotFound(principal.username.clone()))?;
        Ok(AccountStatus::from(&principal))
    }

    pub async fn status(&self, username: &str) -> AuthResult<AccountStatus> {
        let principal = self.require(username).await?;
        Ok(AccountStatus::from(&principal))
    }

    pub async fn unlock(&self, username: &str) -> AuthResult<AccountStatus> {
        let principal = self.require(username).await?;
        self.timeouts
            .store("unlock", self.store.unlock(principal.id))
            .await?;
        info!("Account unlocked: {}", username);
        self.reload(&principal).await
    }

    pub async fn activate(&self, username: &str) -> AuthResult<AccountStatus> {
        self.set_active(username, true).await
    }

    pub async fn deactivate(&self, username: &str) -> AuthResult<AccountStatus> {
        self.set_active(username, false).await
    }

    async fn set_active(&self, username: &str, active: bool) -> AuthResult<AccountStatus> {
        let principal = self.require(username).await?;
        self.timeouts
            .store("set_active", self.store.set_active(principal.id, active))
            .await?;
        info!(
            "Account {}: {}",
            if active { "activated" } else { "deactivated" },
            username
        );
        self.reload(&principal).await
    }

    /// Force a password change at next login
    pub async fn expire_credentials(&self, username: &str) -> AuthResult<AccountStatus> {
        let principal = self.require(username).await?;
        self.timeouts
            .store(
                "set_credential_expired",
                self.store.set_credential_expired(principal.id, true),
            )
            .await?;
        info!("Credentials expired for: {}", username);
        self.reload(&principal).await
    }

    /// Resolve raw names (prefix optional) against the catalog
    pub fn resolve_roles<S: AsRef<str>>(&self, names: &[S]) -> AuthResult<Vec<Role>> {
        if names.is_empty() {
            return Err(AuthError::validation("roles", "at least one role is required"));
        }

        let mut roles: Vec<Role> = Vec::with_capacity(names.len());
        for raw in names {
            let raw = raw.as_ref();
            let name = RoleName::normalize(raw)
                .map_err(|e| AuthError::validation("roles", e.to_string()))?;
            let role = self
                .catalog
                .get(&name)
                .ok_or_else(|| AuthError::UnknownRole(name.to_string()))?;
            if !role.active {
                return Err(AuthError::validation(
                    "roles",
                    format!("role '{}' is inactive", name),
                ));
            }
            if !roles.iter().any(|r| r.id == role.id) {
                roles.push(role.clone());
            }
        }
        Ok(roles)
    }

    /// Replace a principal's role set
    pub async fn assign_roles<S: AsRef<str>>(
        &self,
        username: &str,
        names: &[S],
    ) -> AuthResult<AccountStatus> {
        let roles = self.resolve_roles(names)?;
        let principal = self.require(username).await?;
        self.timeouts
            .store("set_roles", self.store.set_roles(principal.id, &roles))
            .await?;

        let assigned: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        info!("Roles for {} set to {:?}", username, assigned);
        self.reload(&principal).await
    }

    /// Change a password after checking the current one
    pub async fn change_password(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        validate_password(new_password)?;
        if current_password == new_password {
            return Err(AuthError::validation(
                "newPassword",
                "must differ from the current password",
            ));
        }

        let principal = self.require(username).await?;

        let hasher = self.hasher.clone();
        let current = current_password.to_string();
        let stored = principal.password_hash.clone();
        let matches = self
            .timeouts
            .hash("verify_password", move || hasher.verify(&current, &stored))
            .await?;
        if !matches {
            return Err(AuthenticationFailure::BadCredential.into());
        }

        let password_hash = self.hash(new_password).await?;
        self.timeouts
            .store(
                "update_password",
                self.store.update_password(principal.id, &password_hash),
            )
            .await?;

        info!("Password changed for: {}", username);
        Ok(())
    }

    async fn hash(&self, password: &str) -> AuthResult<String> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        self.timeouts
            .hash("hash_password", move || hasher.hash(&password))
            .await?
    }

    /// Create an account with the given roles unless the username exists
    ///
    /// Returns `false` when the account was already present.
    pub async fn ensure_account<S: AsRef<str>>(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role_names: &[S],
    ) -> AuthResult<bool> {
        validate_username(username)?;
        validate_password(password)?;
        let roles = self.resolve_roles(role_names)?;

        if self
            .timeouts
            .store("find_by_username", self.store.find_by_username(username))
            .await?
            .is_some()
        {
            return Ok(false);
        }

        let password_hash = self.hash(password).await?;
        self.timeouts
            .store(
                "insert",
                self.store.insert(NewPrincipal {
                    username: username.to_string(),
                    email: email.to_string(),
                    password_hash,
                    full_name: None,
                    department: None,
                    roles,
                }),
            )
            .await?;

        info!("Provisioned account: {}", username);
        Ok(true)
    }
}
