//! In-memory credential store

use super::{CredentialStore, StoreResult};
use crate::account::AccountSecurity;
use crate::assignments::RoleAssignments;
use crate::catalog::RoleCatalog;
use crate::error::StoreError;
use crate::principal::{NewPrincipal, Principal, PrincipalId};
use crate::role::Role;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct State {
    principals: HashMap<PrincipalId, Principal>,
    by_username: HashMap<String, PrincipalId>,
    by_email: HashMap<String, PrincipalId>,
    assignments: RoleAssignments,
}

impl State {
    /// Stored principal with its active roles resolved through the catalog
    fn load(&self, id: PrincipalId, catalog: &RoleCatalog) -> Option<Principal> {
        let mut principal = self.principals.get(&id)?.clone();
        let roles = self
            .assignments
            .roles_of(id)
            .filter_map(|role| catalog.get_by_id(role))
            .filter(|role| role.active)
            .cloned()
            .collect();
        principal.set_roles(roles);
        Some(principal)
    }

    fn get_mut(&mut self, id: PrincipalId) -> StoreResult<&mut Principal> {
        self.principals
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

/// Credential store held in process memory
#[derive(Clone)]
pub struct MemoryCredentialStore {
    state: Arc<RwLock<State>>,
    catalog: Arc<RoleCatalog>,
}

impl MemoryCredentialStore {
    pub fn new(catalog: Arc<RoleCatalog>) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            catalog,
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.principals.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Principal>> {
        let state = self.state.read().await;
        Ok(state
            .by_username
            .get(username)
            .and_then(|id| state.load(*id, &self.catalog)))
    }

    async fn find_by_id(&self, id: PrincipalId) -> StoreResult<Option<Principal>> {
        Ok(self.state.read().await.load(id, &self.catalog))
    }

    async fn insert(&self, new: NewPrincipal) -> StoreResult<Principal> {
        let mut state = self.state.write().await;
        let email_key = new.email.to_lowercase();

        if state.by_username.contains_key(&new.username) {
            return Err(StoreError::Conflict(format!("username '{}'", new.username)));
        }
        if state.by_email.contains_key(&email_key) {
            return Err(StoreError::Conflict(format!("email '{}'", new.email)));
        }

        let id = PrincipalId::new();
        let principal = Principal {
            id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            full_name: new.full_name,
            department: new.department,
            security: AccountSecurity::default(),
            roles: Vec::new(),
            created_at: Utc::now(),
        };

        state.by_username.insert(principal.username.clone(), id);
        state.by_email.insert(email_key, id);
        state.principals.insert(id, principal);
        state
            .assignments
            .replace(id, new.roles.iter().map(|r| r.id));

        debug!("Inserted principal {}", id);
        state
            .load(id, &self.catalog)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn record_login_failure(
        &self,
        id: PrincipalId,
        max_attempts: u32,
    ) -> StoreResult<AccountSecurity> {
        let mut state = self.state.write().await;
        let principal = state.get_mut(id)?;
        principal.security.on_login_failure(max_attempts);
        Ok(principal.security.clone())
    }

    async fn record_login_success(&self, id: PrincipalId, at: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.get_mut(id)?.security.on_login_success(at);
        Ok(())
    }

    async fn set_active(&self, id: PrincipalId, active: bool) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let security = &mut state.get_mut(id)?.security;
        if active {
            security.activate();
        } else {
            security.deactivate();
        }
        Ok(())
    }

    async fn unlock(&self, id: PrincipalId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.get_mut(id)?.security.unlock();
        Ok(())
    }

    async fn set_credential_expired(&self, id: PrincipalId, expired: bool) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.get_mut(id)?.security.is_credential_expired = expired;
        Ok(())
    }

    async fn set_roles(&self, id: PrincipalId, roles: &[Role]) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.get_mut(id)?;
        state.assignments.replace(id, roles.iter().map(|r| r.id));
        Ok(())
    }

    async fn update_password(&self, id: PrincipalId, password_hash: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let principal = state.get_mut(id)?;
        principal.password_hash = password_hash.to_string();
        principal.security.is_credential_expired = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_principal(catalog: &RoleCatalog, username: &str, email: &str) -> NewPrincipal {
        NewPrincipal {
            username: username.into(),
            email: email.into(),
            password_hash: "hash".into(),
            full_name: None,
            department: None,
            roles: catalog.default_role().cloned().into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn insert_and_find() {
        let catalog = Arc::new(RoleCatalog::builtin());
        let store = MemoryCredentialStore::new(catalog.clone());

        let created = store
            .insert(new_principal(&catalog, "alice", "alice@example.com"))
            .await
            .unwrap();
        assert_eq!(created.role_names()[0].as_str(), "ROLE_USER");

        let found = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(store.find_by_username("bob").await.unwrap().is_none());
        assert!(store.find_by_id(created.id).await.unwrap().is_some());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn duplicates_conflict() {
        let catalog = Arc::new(RoleCatalog::builtin());
        let store = MemoryCredentialStore::new(catalog.clone());
        store
            .insert(new_principal(&catalog, "alice", "alice@example.com"))
            .await
            .unwrap();

        let same_name = store
            .insert(new_principal(&catalog, "alice", "other@example.com"))
            .await;
        assert!(matches!(same_name, Err(StoreError::Conflict(_))));

        let same_email = store
            .insert(new_principal(&catalog, "alice2", "ALICE@example.com"))
            .await;
        assert!(matches!(same_email, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn concurrent_failures_are_counted_exactly() {
        let catalog = Arc::new(RoleCatalog::builtin());
        let store = MemoryCredentialStore::new(catalog.clone());
        let id = store
            .insert(new_principal(&catalog, "alice", "alice@example.com"))
            .await
            .unwrap()
            .id;

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.record_login_failure(id, 5).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let security = store.find_by_id(id).await.unwrap().unwrap().security;
        assert_eq!(security.failed_attempts, 20);
        assert!(security.is_locked);
    }

    #[tokio::test]
    async fn role_replacement_and_password_update() {
        let catalog = Arc::new(RoleCatalog::builtin());
        let store = MemoryCredentialStore::new(catalog.clone());
        let id = store
            .insert(new_principal(&catalog, "alice", "alice@example.com"))
            .await
            .unwrap()
            .id;

        let roles: Vec<Role> = ["ROLE_STAFF", "ROLE_ADMIN"]
            .iter()
            .map(|n| catalog.resolve(n).cloned().unwrap())
            .collect();
        store.set_roles(id, &roles).await.unwrap();
        let names: Vec<_> = store
            .find_by_id(id)
            .await
            .unwrap()
            .unwrap()
            .role_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["ROLE_ADMIN", "ROLE_STAFF"]);

        store.set_credential_expired(id, true).await.unwrap();
        store.update_password(id, "new-hash").await.unwrap();
        let principal = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(principal.password_hash, "new-hash");
        assert!(!principal.security.is_credential_expired);

        let missing = store.unlock(PrincipalId::new()).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn inactive_catalog_roles_are_not_loaded() {
        let mut seeds = crate::catalog::builtin_seeds();
        for seed in seeds.iter_mut().filter(|s| s.name == "ROLE_STAFF") {
            seed.active = false;
        }
        let catalog = Arc::new(RoleCatalog::from_seeds(&seeds).unwrap());
        let store = MemoryCredentialStore::new(catalog.clone());
        let id = store
            .insert(new_principal(&catalog, "alice", "alice@example.com"))
            .await
            .unwrap()
            .id;

        let roles: Vec<Role> = ["ROLE_STAFF", "ROLE_USER"]
            .iter()
            .map(|n| catalog.resolve(n).cloned().unwrap())
            .collect();
        store.set_roles(id, &roles).await.unwrap();

        let principal = store.find_by_id(id).await.unwrap().unwrap();
        let names: Vec<_> = principal.role_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["ROLE_USER"]);
    }
}
