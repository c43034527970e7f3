//! Principal model

use crate::account::AccountSecurity;
use crate::role::{sort_by_authority, Role, RoleName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Principal identifier
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored principal with its security state and resolved roles
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: PrincipalId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub security: AccountSecurity,
    /// Catalog roles, most authority first
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl Principal {
    /// Full name, falling back to the username
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.username)
    }

    pub fn role_names(&self) -> Vec<RoleName> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }

    pub(crate) fn set_roles(&mut self, mut roles: Vec<Role>) {
        sort_by_authority(&mut roles);
        self.roles = roles;
    }

    pub fn to_user_info(&self) -> UserInfo {
        UserInfo {
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            department: self.department.clone(),
            roles: self.role_names(),
        }
    }
}

/// Public profile summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub roles: Vec<RoleName>,
}

/// Data for creating a principal; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub roles: Vec<Role>,
}
