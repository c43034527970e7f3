//! Application state
//!
//! Everything here is built once at startup and shared read-only across
//! requests; the credential store is the only mutable component.

use crate::{WebError, WebResult};
use gatehouse_auth::{
    AccessPolicy, AccountService, Argon2Hasher, CredentialStore, CredentialVerifier,
    MemoryCredentialStore, RoleCatalog, SecretHasher, TokenCodec,
};
use gatehouse_core::GatehouseConfig;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatehouseConfig>,
    pub catalog: Arc<RoleCatalog>,
    pub codec: Arc<TokenCodec>,
    pub policy: Arc<AccessPolicy>,
    pub verifier: CredentialVerifier,
    pub accounts: AccountService,
}

impl AppState {
    /// Create application state with the production password hasher
    pub async fn new(config: GatehouseConfig) -> WebResult<Self> {
        Self::with_hasher(config, Arc::new(Argon2Hasher::default())).await
    }

    pub async fn with_hasher(
        config: GatehouseConfig,
        hasher: Arc<dyn SecretHasher>,
    ) -> WebResult<Self> {
        config.validate()?;
        if config.security.uses_dev_secret() {
            warn!("Development mode is using the built-in JWT secret; tokens are forgeable");
        }

        let catalog = Arc::new(RoleCatalog::from_config(&config)?);
        let codec = Arc::new(TokenCodec::from_config(&config.security)?);
        let policy = Arc::new(AccessPolicy::from_config(
            &config.access_policy,
            catalog.clone(),
        )?);
        let store = Self::open_store(&config, catalog.clone()).await?;

        let verifier = CredentialVerifier::new(
            store.clone(),
            hasher.clone(),
            codec.clone(),
            catalog.clone(),
            &config.security,
        );
        let accounts = AccountService::new(store, hasher, catalog.clone(), &config.security);

        if let Some(admin) = &config.bootstrap_admin {
            let created = accounts
                .ensure_account(
                    &admin.username,
                    &admin.email,
                    &admin.password,
                    admin.roles.as_slice(),
                )
                .await?;
            if created {
                info!("Created bootstrap admin account: {}", admin.username);
            }
        }

        Ok(Self {
            config: Arc::new(config),
            catalog,
            codec,
            policy,
            verifier,
            accounts,
        })
    }

    async fn open_store(
        config: &GatehouseConfig,
        catalog: Arc<RoleCatalog>,
    ) -> WebResult<Arc<dyn CredentialStore>> {
        match &config.server.database_url {
            #[cfg(feature = "sqlite")]
            Some(url) => {
                let store = gatehouse_auth::SqliteCredentialStore::connect(url, catalog)
                    .await
                    .map_err(|e| WebError::Config(format!("Failed to open database: {}", e)))?;
                info!("Using SQLite credential store");
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "sqlite"))]
            Some(_) => Err(WebError::Config(
                "database_url is set but SQLite support is not compiled in".to_string(),
            )),
            None => {
                info!("Using in-memory credential store");
                Ok(Arc::new(MemoryCredentialStore::new(catalog)))
            }
        }
    }
}
