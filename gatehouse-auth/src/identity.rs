//! Verified request identity

use crate::catalog::RoleCatalog;
use crate::role::{DomainScope, Role, RoleName};
use crate::token::{Claims, TokenType};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Identity attached to a request after its access token verified
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub subject: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub roles: Vec<RoleName>,
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    /// Build from verified access-token claims; other token types yield `None`
    pub fn from_claims(claims: Claims) -> Option<Self> {
        if claims.token_type() != TokenType::Access {
            return None;
        }
        let expires_at = claims.expires_at();
        Some(Self {
            subject: claims.sub,
            display_name: claims.custom.display_name,
            email: claims.custom.email,
            department: claims.custom.department,
            roles: claims.custom.roles,
            expires_at,
        })
    }

    pub fn has_role(&self, role: &RoleName) -> bool {
        self.roles.contains(role)
    }

    pub fn has_any_role(&self, required: &[RoleName]) -> bool {
        required.iter().any(|r| self.has_role(r))
    }

    /// Highest-authority role known to the catalog
    pub fn highest_role<'c>(&self, catalog: &'c RoleCatalog) -> Option<&'c Role> {
        catalog.highest_authority_of(&self.roles)
    }

    pub fn covers_scope(&self, catalog: &RoleCatalog, scope: DomainScope) -> bool {
        catalog.scopes_of(&self.roles).covers(scope)
    }
}
