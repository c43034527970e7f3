//! Configuration management
//!
//! Configuration is read from an optional TOML file and then overlaid with
//! `GATEHOUSE_*` environment variables. It is loaded once at startup and
//! treated as immutable afterwards.

use crate::error::{ErrorContext, GatehouseError, GatehouseResult};
use crate::logging::LoggingConfig;
use crate::validation_error;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Minimum accepted length of the HMAC signing secret, in bytes
pub const MIN_SECRET_LEN: usize = 32;

/// Longest accepted access token lifetime (31 days)
pub const MAX_ACCESS_TTL_SECS: i64 = 31 * 24 * 60 * 60;

/// Longest accepted refresh token lifetime (366 days)
pub const MAX_REFRESH_TTL_SECS: i64 = 366 * 24 * 60 * 60;

const DEV_SECRET: &str = "gatehouse-dev-secret-change-me-in-production";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatehouseConfig {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    /// Role catalog seed; empty means the built-in catalog
    pub roles: Vec<RoleSeed>,
    pub access_policy: AccessPolicyConfig,
    /// Account provisioned at startup when no principal with its name exists
    pub bootstrap_admin: Option<BootstrapAdmin>,
    pub logging: LoggingConfig,
}

/// Initial administrator account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_admin_roles")]
    pub roles: Vec<String>,
}

fn default_admin_roles() -> Vec<String> {
    vec!["ROLE_SUPER_ADMIN".to_string()]
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub dev_mode: bool,
    /// SQLite URL; the in-memory credential store is used when unset
    pub database_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            dev_mode: false,
            database_url: None,
        }
    }
}

impl ServerConfig {
    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Token and credential settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Shared HMAC secret used to sign every token
    pub jwt_secret: String,
    /// Value of the `iss` claim
    pub issuer: String,
    /// Access token lifetime in seconds
    pub access_token_ttl_secs: i64,
    /// Refresh lifetime = access lifetime * ratio
    pub refresh_ttl_ratio: u32,
    /// Consecutive failures before an account is locked
    pub max_failed_attempts: u32,
    pub store_timeout_ms: u64,
    pub hash_timeout_ms: u64,
    /// Report the specific login failure reason instead of a generic message
    pub detailed_login_errors: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_SECRET.to_string(),
            issuer: "gatehouse".to_string(),
            access_token_ttl_secs: 24 * 60 * 60,
            refresh_ttl_ratio: 7,
            max_failed_attempts: 5,
            store_timeout_ms: 2_000,
            hash_timeout_ms: 5_000,
            detailed_login_errors: true,
        }
    }
}

impl SecurityConfig {
    /// `None` when the configured seconds do not fit a duration
    pub fn access_token_ttl(&self) -> Option<chrono::Duration> {
        chrono::Duration::try_seconds(self.access_token_ttl_secs)
    }

    /// Access lifetime times the ratio; `None` on overflow
    pub fn refresh_token_ttl(&self) -> Option<chrono::Duration> {
        self.refresh_token_ttl_secs()
            .and_then(chrono::Duration::try_seconds)
    }

    fn refresh_token_ttl_secs(&self) -> Option<i64> {
        self.access_token_ttl_secs
            .checked_mul(i64::from(self.refresh_ttl_ratio))
    }

    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store_timeout_ms)
    }

    pub fn hash_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.hash_timeout_ms)
    }

    /// Whether the development secret is still in use
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_SECRET
    }
}

/// One entry of the role catalog seed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSeed {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub priority: Option<i32>,
    /// Business domains this role covers (`finance`, `personnel`)
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default = "default_true")]
    pub system: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// What happens to anonymous requests that match no policy rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedPolicy {
    #[default]
    Deny,
    Permit,
}

/// Access policy table settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessPolicyConfig {
    pub unmatched_anonymous: UnmatchedPolicy,
    /// Ordered rules; empty means the built-in table
    pub rules: Vec<PolicyRuleConfig>,
}

/// A single `(pattern, requirement)` rule as written in TOML
///
/// `require` is one of `permit_all`, `authenticated`, `any_role`,
/// `minimum_authority`, `scope` or `deny_all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRuleConfig {
    pub pattern: String,
    #[serde(default)]
    pub method: Option<String>,
    pub require: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    /// Business domain for `scope` rules (`finance`, `personnel`)
    #[serde(default)]
    pub scope: Option<String>,
}

impl GatehouseConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> GatehouseResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| GatehouseError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_metadata("path", &path.display().to_string())
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> GatehouseResult<Self> {
        toml::from_str(content).map_err(|e| GatehouseError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })
    }

    /// Load from an optional file, then apply environment overrides
    ///
    /// Not validated yet: command-line overrides still apply on top, so
    /// callers run [`GatehouseConfig::validate`] once everything is merged.
    pub fn load(path: Option<&Path>) -> GatehouseResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay `GATEHOUSE_*` variables resolved through `lookup`
    pub fn apply_env_with<F>(&mut self, lookup: F) -> GatehouseResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("GATEHOUSE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("GATEHOUSE_PORT") {
            self.server.port = parse_env("GATEHOUSE_PORT", &port)?;
        }
        if let Some(dev) = lookup("GATEHOUSE_DEV_MODE") {
            self.server.dev_mode = parse_env("GATEHOUSE_DEV_MODE", &dev)?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.server.database_url = Some(url);
        }
        if let Some(secret) = lookup("GATEHOUSE_JWT_SECRET") {
            self.security.jwt_secret = secret;
        }
        if let Some(ttl) = lookup("GATEHOUSE_ACCESS_TTL_SECS") {
            self.security.access_token_ttl_secs = parse_env("GATEHOUSE_ACCESS_TTL_SECS", &ttl)?;
        }
        if let Some(max) = lookup("GATEHOUSE_MAX_FAILED_ATTEMPTS") {
            self.security.max_failed_attempts = parse_env("GATEHOUSE_MAX_FAILED_ATTEMPTS", &max)?;
        }
        if let Some(detailed) = lookup("GATEHOUSE_DETAILED_LOGIN_ERRORS") {
            self.security.detailed_login_errors =
                parse_env("GATEHOUSE_DETAILED_LOGIN_ERRORS", &detailed)?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> GatehouseResult<()> {
        let security = &self.security;

        if security.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(validation_error!(
                format!("jwt_secret must be at least {} bytes", MIN_SECRET_LEN),
                "security.jwt_secret",
                "config"
            ));
        }
        // The development secret is public, so anyone could sign tokens with it
        if security.uses_dev_secret() && !self.server.dev_mode {
            return Err(validation_error!(
                "the built-in development jwt_secret is only accepted in dev_mode",
                "security.jwt_secret",
                "config"
            ));
        }
        if !(1..=MAX_ACCESS_TTL_SECS).contains(&security.access_token_ttl_secs) {
            return Err(validation_error!(
                format!(
                    "access_token_ttl_secs must be between 1 and {}",
                    MAX_ACCESS_TTL_SECS
                ),
                "security.access_token_ttl_secs",
                "config"
            ));
        }
        if security.refresh_ttl_ratio <= 1 {
            return Err(validation_error!(
                "refresh_ttl_ratio must be greater than 1",
                "security.refresh_ttl_ratio",
                "config"
            ));
        }
        match security.refresh_token_ttl_secs() {
            Some(secs) if secs <= MAX_REFRESH_TTL_SECS => {}
            _ => {
                return Err(validation_error!(
                    format!(
                        "refresh lifetime (access_token_ttl_secs * refresh_ttl_ratio) must not exceed {} seconds",
                        MAX_REFRESH_TTL_SECS
                    ),
                    "security.refresh_ttl_ratio",
                    "config"
                ));
            }
        }
        if security.max_failed_attempts == 0 {
            return Err(validation_error!(
                "max_failed_attempts must be at least 1",
                "security.max_failed_attempts",
                "config"
            ));
        }
        if security.store_timeout_ms == 0 || security.hash_timeout_ms == 0 {
            return Err(validation_error!(
                "timeouts must be non-zero",
                "security.store_timeout_ms",
                "config"
            ));
        }
        for rule in &self.access_policy.rules {
            if !rule.pattern.starts_with('/') {
                return Err(validation_error!(
                    format!("policy pattern '{}' must start with '/'", rule.pattern),
                    "access_policy.rules",
                    "config"
                ));
            }
        }
        if let Some(admin) = &self.bootstrap_admin {
            if admin.password.chars().count() < 8 {
                return Err(validation_error!(
                    "bootstrap admin password must be at least 8 characters",
                    "bootstrap_admin.password",
                    "config"
                ));
            }
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> GatehouseResult<T> {
    value.trim().parse().map_err(|_| GatehouseError::Config {
        message: format!("Invalid value for {}: '{}'", key, value),
        source: None,
        context: ErrorContext::new("config").with_operation("apply_env"),
    })
}
