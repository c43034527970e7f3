//! Signed bearer tokens
//!
//! Tokens are HS256 JWTs signed with one shared secret. Verification is all
//! or nothing: a token that fails any check yields a [`TokenError`] and no
//! claims.

use crate::error::{AuthError, AuthResult, TokenError};
use crate::principal::Principal;
use crate::role::RoleName;
use chrono::{DateTime, Duration, Utc};
use gatehouse_core::{SecurityConfig, MIN_SECRET_LEN};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// HMAC signing and verification keys, built once at startup
pub struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    pub fn from_secret(secret: &[u8]) -> AuthResult<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::validation(
                "jwt_secret",
                format!("must be at least {} bytes", MIN_SECRET_LEN),
            ));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        })
    }
}

impl std::fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKeys(..)")
    }
}

/// Token type enumeration
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// Application claims carried next to the registered ones
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<RoleName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub token_type: TokenType,
}

impl TokenClaims {
    pub fn refresh() -> Self {
        Self {
            roles: Vec::new(),
            display_name: None,
            email: None,
            department: None,
            token_type: TokenType::Refresh,
        }
    }
}

/// Full JWT claim set
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
    pub iss: String,
    #[serde(flatten)]
    pub custom: TokenClaims,
}

impl Claims {
    pub fn token_type(&self) -> TokenType {
        self.custom.token_type
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// JWT token pair (access + refresh)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Mints and verifies tokens
#[derive(Debug, Clone)]
pub struct TokenCodec {
    keys: Arc<SigningKeys>,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(
        keys: Arc<SigningKeys>,
        issuer: impl Into<String>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> AuthResult<Self> {
        if access_ttl <= Duration::zero() {
            return Err(AuthError::validation(
                "access_token_ttl",
                "must be positive",
            ));
        }
        if access_ttl >= refresh_ttl {
            return Err(AuthError::validation(
                "refresh_token_ttl",
                "must be longer than the access token lifetime",
            ));
        }

        let issuer = issuer.into();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.set_issuer(&[issuer.as_str()]);

        Ok(Self {
            keys,
            issuer,
            access_ttl,
            refresh_ttl,
            validation,
        })
    }

    pub fn from_config(security: &SecurityConfig) -> AuthResult<Self> {
        let keys = Arc::new(SigningKeys::from_secret(security.jwt_secret.as_bytes())?);
        let access_ttl = security
            .access_token_ttl()
            .ok_or_else(|| AuthError::validation("access_token_ttl", "out of range"))?;
        let refresh_ttl = security
            .refresh_token_ttl()
            .ok_or_else(|| AuthError::validation("refresh_token_ttl", "out of range"))?;
        Self::new(keys, security.issuer.clone(), access_ttl, refresh_ttl)
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign an arbitrary claim set for `subject`
    pub fn mint(&self, subject: &str, claims: TokenClaims, ttl: Duration) -> AuthResult<String> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            warn!("Token lifetime of {}s overflows the clock", ttl.num_seconds());
            AuthError::TokenCreation
        })?;
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            custom: claims,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding).map_err(|e| {
            warn!("Failed to encode {} token: {}", claims.custom.token_type, e);
            AuthError::TokenCreation
        })
    }

    /// Access token carrying roles and display attributes
    pub fn mint_access(&self, principal: &Principal) -> AuthResult<String> {
        let claims = TokenClaims {
            roles: principal.role_names(),
            display_name: Some(principal.display_name().to_string()),
            email: Some(principal.email.clone()),
            department: principal.department.clone(),
            token_type: TokenType::Access,
        };
        self.mint(&principal.username, claims, self.access_ttl)
    }

    /// Refresh token carrying only its type
    pub fn mint_refresh(&self, subject: &str) -> AuthResult<String> {
        self.mint(subject, TokenClaims::refresh(), self.refresh_ttl)
    }

    pub fn issue_pair(&self, principal: &Principal) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.mint_access(principal)?,
            refresh_token: self.mint_refresh(&principal.username)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Verify signature, issuer and expiry and return the trusted claims
    pub fn parse_and_verify(&self, token: &str) -> Result<Claims, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Empty);
        }

        decode::<Claims>(token, &self.keys.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let err = match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    ErrorKind::InvalidSignature => TokenError::BadSignature,
                    ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                        TokenError::UnsupportedType
                    }
                    _ => TokenError::Malformed,
                };
                debug!("Token verification failed: {} ({})", err, e);
                err
            })
    }

    fn expect_type(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = self.parse_and_verify(token)?;
        let actual = claims.token_type();
        if actual != expected {
            debug!("Rejected {} token where {} was required", actual, expected);
            return Err(TokenError::WrongType { expected, actual });
        }
        Ok(claims)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.expect_type(token, TokenType::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.expect_type(token, TokenType::Refresh)
    }

    /// True for expired tokens and for anything that fails to verify
    pub fn is_expired(&self, token: &str) -> bool {
        self.parse_and_verify(token).is_err()
    }

    /// Whether the token verifies, is unexpired and belongs to `expected_subject`
    pub fn validate(&self, token: &str, expected_subject: &str) -> bool {
        self.parse_and_verify(token)
            .map(|claims| claims.sub == expected_subject)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountSecurity;
    use crate::principal::PrincipalId;
    use crate::role::Role;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn codec() -> TokenCodec {
        let keys = Arc::new(SigningKeys::from_secret(SECRET).unwrap());
        TokenCodec::new(keys, "gatehouse", Duration::hours(1), Duration::hours(7)).unwrap()
    }

    fn principal() -> Principal {
        Principal {
            id: PrincipalId::new(),
            username: "testuser".into(),
            email: "test@example.com".into(),
            password_hash: String::new(),
            full_name: Some("Test User".into()),
            department: Some("Finance".into()),
            security: AccountSecurity::default(),
            roles: vec![
                Role::new("ROLE_FINANCE_MANAGER", "Finance Manager", Some(20)).unwrap(),
                Role::new("ROLE_USER", "User", Some(100)).unwrap(),
            ],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn access_token_round_trips_claims() {
        let codec = codec();
        let token = codec.mint_access(&principal()).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = codec.verify_access(&token).unwrap();
        assert_eq!(claims.sub, "testuser");
        assert_eq!(claims.iss, "gatehouse");
        assert_eq!(claims.token_type(), TokenType::Access);
        assert_eq!(
            claims.custom.roles,
            vec![
                RoleName::parse("ROLE_FINANCE_MANAGER").unwrap(),
                RoleName::parse("ROLE_USER").unwrap()
            ]
        );
        assert_eq!(claims.custom.display_name.as_deref(), Some("Test User"));
        assert_eq!(claims.custom.email.as_deref(), Some("test@example.com"));
        assert_eq!(claims.custom.department.as_deref(), Some("Finance"));
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn refresh_token_carries_only_its_type() {
        let codec = codec();
        let token = codec.mint_refresh("testuser").unwrap();
        let claims = codec.verify_refresh(&token).unwrap();
        assert_eq!(claims.custom, TokenClaims::refresh());
        assert_eq!(claims.exp - claims.iat, 7 * 3600);
    }

    #[test]
    fn mint_round_trips_arbitrary_claims() {
        let codec = codec();
        let claims = TokenClaims {
            roles: vec![RoleName::parse("ROLE_STAFF").unwrap()],
            display_name: None,
            email: Some("x@example.com".into()),
            department: None,
            token_type: TokenType::Access,
        };
        let token = codec.mint("x", claims.clone(), Duration::minutes(5)).unwrap();
        assert_eq!(codec.parse_and_verify(&token).unwrap().custom, claims);
    }

    #[test]
    fn past_expiry_is_expired_immediately() {
        let codec = codec();
        let token = codec
            .mint("testuser", TokenClaims::refresh(), Duration::seconds(-5))
            .unwrap();
        assert_eq!(codec.parse_and_verify(&token), Err(TokenError::Expired));
        assert!(codec.is_expired(&token));
        assert!(!codec.validate(&token, "testuser"));
    }

    #[test]
    fn validate_requires_matching_subject() {
        let codec = codec();
        let token = codec.mint_refresh("testuser").unwrap();
        assert!(codec.validate(&token, "testuser"));
        assert!(!codec.validate(&token, "someone-else"));
        assert!(!codec.is_expired(&token));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let codec = codec();
        let refresh = codec.mint_refresh("testuser").unwrap();
        assert_eq!(
            codec.verify_access(&refresh),
            Err(TokenError::WrongType {
                expected: TokenType::Access,
                actual: TokenType::Refresh
            })
        );
    }

    #[test]
    fn tampered_and_foreign_tokens_fail_closed() {
        let codec = codec();
        let token = codec.mint_access(&principal()).unwrap();

        let other_keys = Arc::new(SigningKeys::from_secret(b"another-secret-another-secret-32").unwrap());
        let other = TokenCodec::new(other_keys, "gatehouse", Duration::hours(1), Duration::hours(7)).unwrap();
        assert_eq!(other.parse_and_verify(&token), Err(TokenError::BadSignature));

        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = "eyJzdWIiOiJhZG1pbiJ9";
        let forged = parts.join(".");
        assert!(codec.parse_and_verify(&forged).is_err());

        assert_eq!(codec.parse_and_verify("not-a-jwt"), Err(TokenError::Malformed));
        assert_eq!(codec.parse_and_verify("   "), Err(TokenError::Empty));
        assert!(codec.is_expired("garbage"));
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let keys = Arc::new(SigningKeys::from_secret(SECRET).unwrap());
        let elsewhere =
            TokenCodec::new(keys, "elsewhere", Duration::hours(1), Duration::hours(7)).unwrap();
        let token = elsewhere.mint_refresh("testuser").unwrap();
        assert_eq!(codec().parse_and_verify(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn construction_checks_secret_and_lifetimes() {
        assert!(SigningKeys::from_secret(b"short").is_err());

        let keys = Arc::new(SigningKeys::from_secret(SECRET).unwrap());
        assert!(TokenCodec::new(keys.clone(), "g", Duration::hours(7), Duration::hours(7)).is_err());
        assert!(TokenCodec::new(keys, "g", Duration::zero(), Duration::hours(7)).is_err());

        let codec = TokenCodec::from_config(&SecurityConfig::default()).unwrap();
        assert_eq!(codec.refresh_ttl(), codec.access_ttl() * 7);

        let security = SecurityConfig {
            access_token_ttl_secs: i64::MAX,
            ..SecurityConfig::default()
        };
        assert!(TokenCodec::from_config(&security).is_err());
    }

    #[test]
    fn unrepresentable_expiry_is_a_creation_error() {
        let codec = codec();
        let forever = Duration::try_days(365 * 1_000_000).unwrap();
        assert!(matches!(
            codec.mint("testuser", TokenClaims::refresh(), forever),
            Err(AuthError::TokenCreation)
        ));
    }
}
