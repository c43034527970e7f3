//! Credential verification: login, refresh and registration

use crate::account::AccountState;
use crate::catalog::RoleCatalog;
use crate::error::{AuthError, AuthResult, AuthenticationFailure, StoreError};
use crate::password::SecretHasher;
use crate::principal::{NewPrincipal, Principal, UserInfo};
use crate::store::CredentialStore;
use crate::timeouts::Timeouts;
use crate::token::{TokenCodec, TokenPair};
use chrono::Utc;
use gatehouse_core::SecurityConfig;
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Hashed once and verified against when the username is unknown
const DUMMY_SECRET: &str = "gatehouse-unknown-user";

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.\-]{3,32}$").expect("valid username regex"));

/// User registration request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

/// Successful login
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub tokens: TokenPair,
    pub user_info: UserInfo,
}

pub(crate) fn validate_username(username: &str) -> AuthResult<()> {
    if !USERNAME_PATTERN.is_match(username) {
        return Err(AuthError::validation(
            "username",
            "must be 3-32 letters, digits, '.', '_' or '-'",
        ));
    }
    Ok(())
}

pub(crate) fn validate_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::validation(
            "password",
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> AuthResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AuthError::validation("email", "must be a valid address")),
    }
}

/// Verifies credentials and issues tokens
#[derive(Clone)]
pub struct CredentialVerifier {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn SecretHasher>,
    codec: Arc<TokenCodec>,
    catalog: Arc<RoleCatalog>,
    timeouts: Timeouts,
    max_failed_attempts: u32,
    dummy_hash: Arc<OnceCell<String>>,
}

impl CredentialVerifier {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn SecretHasher>,
        codec: Arc<TokenCodec>,
        catalog: Arc<RoleCatalog>,
        security: &SecurityConfig,
    ) -> Self {
        Self {
            store,
            hasher,
            codec,
            catalog,
            timeouts: Timeouts::from_config(security),
            max_failed_attempts: security.max_failed_attempts,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    async fn secret_matches(&self, secret: &str, principal: &Principal) -> AuthResult<bool> {
        let hasher = self.hasher.clone();
        let secret = secret.to_string();
        let hash = principal.password_hash.clone();
        self.timeouts
            .hash("verify_password", move || hasher.verify(&secret, &hash))
            .await
    }

    /// Spend one verification on an unknown username so a miss costs as much
    /// as a wrong password
    async fn verify_against_dummy(&self, secret: &str) {
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| async {
                let hasher = self.hasher.clone();
                self.timeouts
                    .hash("hash_password", move || hasher.hash(DUMMY_SECRET))
                    .await?
            })
            .await;

        match dummy {
            Ok(hash) => {
                let hasher = self.hasher.clone();
                let secret = secret.to_string();
                let hash = hash.clone();
                let _ = self
                    .timeouts
                    .hash("verify_password", move || hasher.verify(&secret, &hash))
                    .await;
            }
            Err(e) => debug!("Dummy hash unavailable: {}", e),
        }
    }

    /// Authenticate a username and password and issue a token pair
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<LoginSuccess> {
        debug!("Login attempt for: {}", username);

        let Some(principal) = self
            .timeouts
            .store("find_by_username", self.store.find_by_username(username))
            .await?
        else {
            self.verify_against_dummy(password).await;
            warn!("Login failed: no such user '{}'", username);
            return Err(AuthenticationFailure::NoSuchUser.into());
        };

        if !self.secret_matches(password, &principal).await? {
            let outcome = self
                .timeouts
                .store(
                    "record_login_failure",
                    self.store
                        .record_login_failure(principal.id, self.max_failed_attempts),
                )
                .await;

            match outcome {
                Ok(security) if security.is_locked && !principal.security.is_locked => {
                    warn!(
                        "Account '{}' locked after {} failed attempts",
                        username, security.failed_attempts
                    );
                }
                Ok(security) => {
                    warn!(
                        "Login failed: bad credentials for '{}' ({} remaining)",
                        username,
                        security.remaining_attempts(self.max_failed_attempts)
                    );
                }
                Err(e) => {
                    error!("Failed to record login failure for '{}': {}", username, e);
                }
            }
            return Err(AuthenticationFailure::BadCredential.into());
        }

        match principal.security.state() {
            AccountState::Inactive => {
                warn!("Login refused: account '{}' is inactive", username);
                return Err(AuthenticationFailure::AccountInactive.into());
            }
            AccountState::ActiveLocked => {
                warn!("Login refused: account '{}' is locked", username);
                return Err(AuthenticationFailure::AccountLocked.into());
            }
            AccountState::ActiveUnlocked => {}
        }

        if principal.security.is_credential_expired {
            warn!("Login refused: credentials for '{}' have expired", username);
            return Err(AuthenticationFailure::CredentialExpired.into());
        }

        self.timeouts
            .store(
                "record_login_success",
                self.store.record_login_success(principal.id, Utc::now()),
            )
            .await?;

        let tokens = self.codec.issue_pair(&principal)?;
        info!("User logged in: {}", username);

        Ok(LoginSuccess {
            tokens,
            user_info: principal.to_user_info(),
        })
    }

    /// Mint a fresh access token from a refresh token
    ///
    /// Roles come from the store, not from the refresh token. The refresh
    /// token itself is not rotated.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<String> {
        let claims = self.codec.verify_refresh(refresh_token)?;

        let principal = self
            .timeouts
            .store("find_by_username", self.store.find_by_username(&claims.sub))
            .await?
            .ok_or(AuthenticationFailure::NoSuchUser)?;

        match principal.security.state() {
            AccountState::Inactive => return Err(AuthenticationFailure::AccountInactive.into()),
            AccountState::ActiveLocked => return Err(AuthenticationFailure::AccountLocked.into()),
            AccountState::ActiveUnlocked => {}
        }

        let access_token = self.codec.mint_access(&principal)?;
        info!("Access token refreshed for: {}", principal.username);
        Ok(access_token)
    }

    /// Create a principal holding the default role
    pub async fn register(&self, registration: Registration) -> AuthResult<UserInfo> {
        let username = registration.username.trim().to_string();
        let email = registration.email.trim().to_string();
        validate_username(&username)?;
        validate_email(&email)?;
        validate_password(&registration.password)?;

        let default_role = self
            .catalog
            .default_role()
            .cloned()
            .ok_or_else(|| AuthError::UnknownRole(crate::catalog::DEFAULT_ROLE.to_string()))?;

        if self
            .timeouts
            .store("find_by_username", self.store.find_by_username(&username))
            .await?
            .is_some()
        {
            debug!("Registration failed: username '{}' taken", username);
            return Err(StoreError::Conflict(format!("username '{}'", username)).into());
        }

        let hasher = self.hasher.clone();
        let password = registration.password;
        let password_hash = self
            .timeouts
            .hash("hash_password", move || hasher.hash(&password))
            .await??;

        let principal = self
            .timeouts
            .store(
                "insert",
                self.store.insert(NewPrincipal {
                    username,
                    email,
                    password_hash,
                    full_name: registration.full_name,
                    department: registration.department,
                    roles: vec![default_role],
                }),
            )
            .await?;

        info!("User registered: {}", principal.username);
        Ok(principal.to_user_info())
    }
}
