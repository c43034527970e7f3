//! Credential storage
//!
//! The verifier and the account service only see [`CredentialStore`]; the
//! in-memory store backs development and tests, the SQLite store backs
//! deployments with a `database_url`.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryCredentialStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCredentialStore;

use crate::account::AccountSecurity;
use crate::error::StoreError;
use crate::principal::{NewPrincipal, Principal, PrincipalId};
use crate::role::Role;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Principal>>;

    async fn find_by_id(&self, id: PrincipalId) -> StoreResult<Option<Principal>>;

    /// Create a principal; username and email must be unique
    async fn insert(&self, new: NewPrincipal) -> StoreResult<Principal>;

    /// Atomically count a failed login and lock at `max_attempts`
    ///
    /// Returns the security state after the increment.
    async fn record_login_failure(
        &self,
        id: PrincipalId,
        max_attempts: u32,
    ) -> StoreResult<AccountSecurity>;

    /// Reset the failure counter and stamp the login time
    async fn record_login_success(&self, id: PrincipalId, at: DateTime<Utc>) -> StoreResult<()>;

    async fn set_active(&self, id: PrincipalId, active: bool) -> StoreResult<()>;

    /// Clear the lock and the failure counter
    async fn unlock(&self, id: PrincipalId) -> StoreResult<()>;

    async fn set_credential_expired(&self, id: PrincipalId, expired: bool) -> StoreResult<()>;

    /// Replace the principal's role set
    async fn set_roles(&self, id: PrincipalId, roles: &[Role]) -> StoreResult<()>;

    /// Store a new hash and clear the expired-credential flag
    async fn update_password(&self, id: PrincipalId, password_hash: &str) -> StoreResult<()>;
}
