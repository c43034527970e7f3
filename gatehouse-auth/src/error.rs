//! Authentication and authorization error taxonomy
//!
//! Callers match on these variants; nothing from the JWT or database layers
//! leaks past this module as a raw error.

use crate::token::TokenType;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Why a login attempt was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationFailure {
    #[error("no such user")]
    NoSuchUser,
    #[error("bad credentials")]
    BadCredential,
    #[error("account is inactive")]
    AccountInactive,
    #[error("account is locked")]
    AccountLocked,
    #[error("credentials have expired")]
    CredentialExpired,
}

impl AuthenticationFailure {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AuthenticationFailure::NoSuchUser => "no_such_user",
            AuthenticationFailure::BadCredential => "bad_credential",
            AuthenticationFailure::AccountInactive => "account_inactive",
            AuthenticationFailure::AccountLocked => "account_locked",
            AuthenticationFailure::CredentialExpired => "credential_expired",
        }
    }

    /// Message shown to the person trying to log in
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthenticationFailure::NoSuchUser => "User does not exist",
            AuthenticationFailure::BadCredential => "Incorrect password",
            AuthenticationFailure::AccountInactive => "Account has been disabled",
            AuthenticationFailure::AccountLocked => {
                "Account is locked after too many failed attempts; contact an administrator"
            }
            AuthenticationFailure::CredentialExpired => "Password has expired and must be changed",
        }
    }

    /// The same message for every reason, for deployments that hide the cause
    pub fn generic_message() -> &'static str {
        "Invalid username or password"
    }
}

/// Why a token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    BadSignature,
    #[error("token uses an unsupported algorithm or format")]
    UnsupportedType,
    #[error("token is empty")]
    Empty,
    #[error("expected a {expected} token but got a {actual} token")]
    WrongType {
        expected: TokenType,
        actual: TokenType,
    },
}

impl TokenError {
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Expired => "token_expired",
            TokenError::Malformed => "token_malformed",
            TokenError::BadSignature => "token_bad_signature",
            TokenError::UnsupportedType => "token_unsupported",
            TokenError::Empty => "token_empty",
            TokenError::WrongType { .. } => "token_wrong_type",
        }
    }
}

/// Why the policy boundary refused a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationFailure {
    #[error("authentication required")]
    Unauthenticated,
    #[error("insufficient role: requires {required}")]
    InsufficientRole { required: String },
}

/// Credential store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("principal not found: {0}")]
    NotFound(String),
    #[error("{0} already exists")]
    Conflict(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Umbrella error for every auth operation
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Authentication(#[from] AuthenticationFailure),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationFailure),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("password hashing failed")]
    Hashing,
    #[error("token creation failed")]
    TokenCreation,
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },
}

impl AuthError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AuthError::Validation {
            field,
            message: message.into(),
        }
    }

    /// The authentication failure, if this is one
    pub fn as_authentication(&self) -> Option<AuthenticationFailure> {
        match self {
            AuthError::Authentication(failure) => Some(*failure),
            _ => None,
        }
    }
}
