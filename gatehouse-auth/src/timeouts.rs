//! Bounded store round-trips and off-runtime hashing

use crate::error::{AuthError, AuthResult, StoreError};
use gatehouse_core::SecurityConfig;
use std::future::Future;
use std::time::Duration;
use tracing::error;

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub store: Duration,
    pub hash: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from_config(&SecurityConfig::default())
    }
}

impl Timeouts {
    pub fn from_config(security: &SecurityConfig) -> Self {
        Self {
            store: security.store_timeout(),
            hash: security.hash_timeout(),
        }
    }

    /// Run a store call under the store timeout
    pub async fn store<T, F>(&self, operation: &'static str, fut: F) -> AuthResult<T>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.store, fut).await {
            Ok(result) => result.map_err(AuthError::from),
            Err(_) => {
                error!("Store operation '{}' timed out after {:?}", operation, self.store);
                Err(AuthError::Timeout { operation })
            }
        }
    }

    /// Run CPU-heavy hashing on the blocking pool under the hash timeout
    pub async fn hash<T, F>(&self, operation: &'static str, work: F) -> AuthResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        match tokio::time::timeout(self.hash, tokio::task::spawn_blocking(work)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!("Hashing task '{}' failed: {}", operation, e);
                Err(AuthError::Hashing)
            }
            Err(_) => {
                error!("Hashing task '{}' timed out after {:?}", operation, self.hash);
                Err(AuthError::Timeout { operation })
            }
        }
    }
}
