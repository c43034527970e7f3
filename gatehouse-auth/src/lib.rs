//! Gatehouse Auth - authentication and authorization core
//!
//! Leaf to root: role hierarchy and catalog, account state machine, token
//! codec, credential store, credential verifier, access policy table.

pub mod account;
pub mod admin;
pub mod assignments;
pub mod catalog;
pub mod error;
pub mod identity;
pub mod password;
pub mod policy;
pub mod principal;
pub mod role;
pub mod store;
pub mod timeouts;
pub mod token;
pub mod verifier;

pub use account::{AccountSecurity, AccountState};
pub use admin::{AccountService, AccountStatus};
pub use assignments::RoleAssignments;
pub use catalog::{RoleCatalog, DEFAULT_ROLE};
pub use error::{
    AuthError, AuthResult, AuthenticationFailure, AuthorizationFailure, StoreError, TokenError,
};
pub use identity::Identity;
pub use password::{Argon2Hasher, SecretHasher};
pub use policy::{AccessPolicy, Decision, PathPattern, PolicyRule, RoleRequirement};
pub use principal::{NewPrincipal, Principal, PrincipalId, UserInfo};
pub use role::{
    compare_authority, has_any_role, has_finance_scope, has_personnel_scope, highest_authority,
    DomainScope, DomainScopes, Role, RoleId, RoleName,
};
pub use store::{CredentialStore, MemoryCredentialStore};
#[cfg(feature = "sqlite")]
pub use store::SqliteCredentialStore;
pub use timeouts::Timeouts;
pub use token::{Claims, SigningKeys, TokenClaims, TokenCodec, TokenPair, TokenType};
pub use verifier::{CredentialVerifier, LoginSuccess, Registration};
