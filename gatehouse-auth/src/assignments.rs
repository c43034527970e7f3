//! Principal ↔ role assignment index
//!
//! Two one-directional indices kept consistent by routing every mutation
//! through the methods below.

use crate::principal::PrincipalId;
use crate::role::RoleId;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct RoleAssignments {
    by_principal: HashMap<PrincipalId, BTreeSet<RoleId>>,
    by_role: HashMap<RoleId, BTreeSet<PrincipalId>>,
}

impl RoleAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a role; returns false if it was already held
    pub fn assign(&mut self, principal: PrincipalId, role: RoleId) -> bool {
        let added = self.by_principal.entry(principal).or_default().insert(role);
        if added {
            self.by_role.entry(role).or_default().insert(principal);
        }
        added
    }

    /// Take a role away; returns false if it was not held
    pub fn revoke(&mut self, principal: PrincipalId, role: RoleId) -> bool {
        let removed = self
            .by_principal
            .get_mut(&principal)
            .map(|roles| roles.remove(&role))
            .unwrap_or(false);

        if removed {
            if let Some(holders) = self.by_role.get_mut(&role) {
                holders.remove(&principal);
                if holders.is_empty() {
                    self.by_role.remove(&role);
                }
            }
        }
        removed
    }

    /// Replace a principal's whole role set
    pub fn replace<I>(&mut self, principal: PrincipalId, roles: I)
    where
        I: IntoIterator<Item = RoleId>,
    {
        let previous = self.by_principal.remove(&principal).unwrap_or_default();
        for role in previous {
            if let Some(holders) = self.by_role.get_mut(&role) {
                holders.remove(&principal);
                if holders.is_empty() {
                    self.by_role.remove(&role);
                }
            }
        }

        for role in roles {
            self.assign(principal, role);
        }
    }

    /// Drop a role from every principal holding it; returns how many lost it
    pub fn remove_role(&mut self, role: RoleId) -> usize {
        let holders = self.by_role.remove(&role).unwrap_or_default();
        for principal in &holders {
            if let Some(roles) = self.by_principal.get_mut(principal) {
                roles.remove(&role);
            }
        }
        holders.len()
    }

    pub fn roles_of(&self, principal: PrincipalId) -> impl Iterator<Item = RoleId> + '_ {
        self.by_principal
            .get(&principal)
            .into_iter()
            .flat_map(|roles| roles.iter().copied())
    }

    pub fn holders_of(&self, role: RoleId) -> impl Iterator<Item = PrincipalId> + '_ {
        self.by_role
            .get(&role)
            .into_iter()
            .flat_map(|holders| holders.iter().copied())
    }

    pub fn holds(&self, principal: PrincipalId, role: RoleId) -> bool {
        self.by_principal
            .get(&principal)
            .is_some_and(|roles| roles.contains(&role))
    }
}
