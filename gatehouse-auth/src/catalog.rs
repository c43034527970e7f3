//! Role catalog: the role → capability table
//!
//! Built once at startup from the seed list and shared read-only. Labels,
//! priorities and domain scopes are looked up here by role identity.

use crate::error::{AuthError, AuthResult};
use crate::role::{
    compare_authority, has_finance_scope, has_personnel_scope, highest_authority, DomainScope,
    DomainScopes, Role, RoleId, RoleName,
};
use gatehouse_core::{GatehouseConfig, RoleSeed};
use std::collections::HashMap;
use tracing::debug;

/// Role assigned to newly registered principals
pub const DEFAULT_ROLE: &str = "ROLE_USER";

/// Built-in seed catalog
pub fn builtin_seeds() -> Vec<RoleSeed> {
    let seed = |name: &str, label: &str, priority: i32, scopes: &[&str]| RoleSeed {
        name: name.to_string(),
        label: label.to_string(),
        priority: Some(priority),
        scopes: scopes.iter().map(|s| s.to_string()).collect(),
        system: true,
        active: true,
    };

    vec![
        seed("ROLE_SUPER_ADMIN", "Super Administrator", 0, &["finance", "personnel"]),
        seed("ROLE_ADMIN", "Administrator", 10, &["finance", "personnel"]),
        seed("ROLE_FINANCE_MANAGER", "Finance Manager", 20, &["finance"]),
        seed("ROLE_HR_MANAGER", "HR Manager", 20, &["personnel"]),
        seed("ROLE_STAFF", "Staff", 50, &[]),
        seed(DEFAULT_ROLE, "User", 100, &[]),
    ]
}

/// Immutable role catalog
#[derive(Debug, Clone)]
pub struct RoleCatalog {
    /// Sorted from most to least authority
    roles: Vec<Role>,
    by_name: HashMap<RoleName, usize>,
    by_id: HashMap<RoleId, usize>,
}

impl RoleCatalog {
    /// Build the catalog from seeds, rejecting bad names and duplicates
    pub fn from_seeds(seeds: &[RoleSeed]) -> AuthResult<Self> {
        let mut roles = Vec::with_capacity(seeds.len());

        for seed in seeds {
            let name = RoleName::parse(&seed.name)
                .map_err(|e| AuthError::validation("roles", e.to_string()))?;

            let mut scopes = DomainScopes::NONE;
            for raw in &seed.scopes {
                let scope: DomainScope = raw
                    .parse()
                    .map_err(|e: String| AuthError::validation("roles", e))?;
                scopes.insert(scope);
            }

            roles.push(Role {
                id: RoleId::for_name(&name),
                name,
                label: seed.label.clone(),
                priority: seed.priority,
                scopes,
                system: seed.system,
                active: seed.active,
            });
        }

        roles.sort_by(compare_authority);

        let mut by_name = HashMap::with_capacity(roles.len());
        let mut by_id = HashMap::with_capacity(roles.len());
        for (index, role) in roles.iter().enumerate() {
            if by_name.insert(role.name.clone(), index).is_some() {
                return Err(AuthError::validation(
                    "roles",
                    format!("duplicate role '{}'", role.name),
                ));
            }
            by_id.insert(role.id, index);
        }

        debug!("Built role catalog with {} roles", roles.len());
        Ok(Self {
            roles,
            by_name,
            by_id,
        })
    }

    /// The built-in catalog
    pub fn builtin() -> Self {
        Self::from_seeds(&builtin_seeds()).expect("built-in role catalog is valid")
    }

    /// Configured catalog, or the built-in one when none is configured
    pub fn from_config(config: &GatehouseConfig) -> AuthResult<Self> {
        if config.roles.is_empty() {
            Ok(Self::builtin())
        } else {
            Self::from_seeds(&config.roles)
        }
    }

    /// All roles, most authority first
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn get(&self, name: &RoleName) -> Option<&Role> {
        self.by_name.get(name).map(|&i| &self.roles[i])
    }

    pub fn get_by_id(&self, id: RoleId) -> Option<&Role> {
        self.by_id.get(&id).map(|&i| &self.roles[i])
    }

    /// Look up a stored name, adding the namespace prefix if it is missing
    pub fn resolve(&self, raw: &str) -> Option<&Role> {
        RoleName::normalize(raw).ok().and_then(|name| self.get(&name))
    }

    pub fn label(&self, name: &RoleName) -> Option<&str> {
        self.get(name).map(|r| r.label.as_str())
    }

    /// Role given to new registrations
    pub fn default_role(&self) -> Option<&Role> {
        self.resolve(DEFAULT_ROLE)
    }

    /// Catalog entries for the given names; unknown names are skipped
    pub fn lookup_all<'a, I>(&self, names: I) -> Vec<&Role>
    where
        I: IntoIterator<Item = &'a RoleName>,
    {
        names.into_iter().filter_map(|n| self.get(n)).collect()
    }

    /// Combined domain scopes of the given role names
    pub fn scopes_of<'a, I>(&self, names: I) -> DomainScopes
    where
        I: IntoIterator<Item = &'a RoleName>,
    {
        let roles = self.lookup_all(names);
        DomainScopes {
            finance: has_finance_scope(roles.iter().copied()),
            personnel: has_personnel_scope(roles.iter().copied()),
        }
    }

    /// Highest-authority catalog role among the given names
    pub fn highest_authority_of<'a, I>(&self, names: I) -> Option<&Role>
    where
        I: IntoIterator<Item = &'a RoleName>,
    {
        highest_authority(self.lookup_all(names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(raw: &str) -> RoleName {
        RoleName::parse(raw).unwrap()
    }

    #[test]
    fn builtin_catalog_is_sorted_by_authority() {
        let catalog = RoleCatalog::builtin();
        let first = &catalog.roles()[0];
        assert_eq!(first.name.as_str(), "ROLE_SUPER_ADMIN");
        assert_eq!(
            catalog.roles().last().map(|r| r.name.as_str()),
            Some(DEFAULT_ROLE)
        );
        assert!(catalog.roles().iter().all(|r| r.system));
    }

    #[test]
    fn resolve_normalizes_bare_names() {
        let catalog = RoleCatalog::builtin();
        let role = catalog.resolve("ADMIN").unwrap();
        assert_eq!(role.name.as_str(), "ROLE_ADMIN");
        assert_eq!(role.label, "Administrator");
        assert!(catalog.resolve("ROLE_UNKNOWN").is_none());
        assert!(catalog.resolve("admin").is_none());
        assert_eq!(catalog.get_by_id(role.id).map(|r| &r.name), Some(&role.name));
    }

    #[test]
    fn scopes_come_from_the_table() {
        let catalog = RoleCatalog::builtin();

        let admin = catalog.scopes_of([&name("ROLE_ADMIN")]);
        assert!(admin.is_combined());

        let finance = catalog.scopes_of([&name("ROLE_FINANCE_MANAGER")]);
        assert!(finance.finance && !finance.personnel);

        let mixed = catalog.scopes_of([&name("ROLE_FINANCE_MANAGER"), &name("ROLE_HR_MANAGER")]);
        assert!(mixed.is_combined());

        let none = catalog.scopes_of([&name("ROLE_USER"), &name("ROLE_NOT_IN_CATALOG")]);
        assert_eq!(none, DomainScopes::NONE);
    }

    #[test]
    fn highest_authority_of_names() {
        let catalog = RoleCatalog::builtin();
        let names = [name("ROLE_USER"), name("ROLE_HR_MANAGER"), name("ROLE_STAFF")];
        assert_eq!(
            catalog.highest_authority_of(&names).map(|r| r.name.as_str()),
            Some("ROLE_HR_MANAGER")
        );
        let empty: &[RoleName] = &[];
        assert!(catalog.highest_authority_of(empty).is_none());
    }

    #[test]
    fn seeds_with_invalid_names_or_duplicates_are_rejected() {
        let mut seeds = builtin_seeds();
        seeds[0].name = "superadmin".into();
        assert!(RoleCatalog::from_seeds(&seeds).is_err());

        let mut seeds = builtin_seeds();
        let dup = seeds[1].clone();
        seeds.push(dup);
        assert!(RoleCatalog::from_seeds(&seeds).is_err());

        let mut seeds = builtin_seeds();
        seeds[0].scopes = vec!["marketing".into()];
        assert!(RoleCatalog::from_seeds(&seeds).is_err());
    }

    #[test]
    fn config_without_roles_uses_builtin() {
        let config = GatehouseConfig::default();
        let catalog = RoleCatalog::from_config(&config).unwrap();
        assert_eq!(catalog.roles().len(), builtin_seeds().len());
        assert_eq!(
            catalog.default_role().map(|r| r.name.as_str()),
            Some(DEFAULT_ROLE)
        );
    }
}
