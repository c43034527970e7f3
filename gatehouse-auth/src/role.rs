//! Role hierarchy model
//!
//! Roles carry an integer priority where a lower value means more authority.
//! A role without a priority ranks below every role that has one. Equal
//! priorities are ordered by role name so every comparison is total.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::LazyLock;
use thiserror::Error;
use uuid::Uuid;

use regex::Regex;

/// Namespace prefix every role name carries
pub const ROLE_PREFIX: &str = "ROLE_";

static ROLE_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ROLE_[A-Z][A-Z0-9_]*$").expect("role name pattern is valid"));

/// Namespace for deterministic role identifiers
const ROLE_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_3c2e_9b4d_4e1a_8f3b_2d7c_5e9a_1b04);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid role name '{0}': expected ROLE_ followed by an uppercase letter and [A-Z0-9_]*")]
pub struct InvalidRoleName(pub String);

/// A validated, namespaced role name such as `ROLE_ADMIN`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleName(String);

impl RoleName {
    /// Accept only names that already match the full pattern
    pub fn parse(raw: &str) -> Result<Self, InvalidRoleName> {
        if ROLE_NAME_PATTERN.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(InvalidRoleName(raw.to_string()))
        }
    }

    /// Add the namespace prefix to a stored bare name (`ADMIN`), then validate
    pub fn normalize(raw: &str) -> Result<Self, InvalidRoleName> {
        let trimmed = raw.trim();
        if trimmed.starts_with(ROLE_PREFIX) {
            Self::parse(trimmed)
        } else {
            Self::parse(&format!("{}{}", ROLE_PREFIX, trimmed))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name without the namespace prefix
    pub fn bare(&self) -> &str {
        &self.0[ROLE_PREFIX.len()..]
    }
}

impl std::fmt::Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RoleName {
    type Err = InvalidRoleName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoleName {
    type Error = InvalidRoleName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoleName> for String {
    fn from(value: RoleName) -> Self {
        value.0
    }
}

/// Stable role identifier, derived from the role name
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(Uuid);

impl RoleId {
    pub fn for_name(name: &RoleName) -> Self {
        Self(Uuid::new_v5(&ROLE_ID_NAMESPACE, name.as_str().as_bytes()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Business areas a role can be scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainScope {
    Finance,
    Personnel,
}

impl std::str::FromStr for DomainScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "finance" => Ok(DomainScope::Finance),
            "personnel" => Ok(DomainScope::Personnel),
            _ => Err(format!("Unknown domain scope: {}", s)),
        }
    }
}

impl std::fmt::Display for DomainScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainScope::Finance => write!(f, "finance"),
            DomainScope::Personnel => write!(f, "personnel"),
        }
    }
}

/// Which business areas a role covers
///
/// A role covering both is a "combined" variant; one covering a single area is
/// a "scoped" variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainScopes {
    pub finance: bool,
    pub personnel: bool,
}

impl DomainScopes {
    pub const NONE: DomainScopes = DomainScopes {
        finance: false,
        personnel: false,
    };

    pub const COMBINED: DomainScopes = DomainScopes {
        finance: true,
        personnel: true,
    };

    pub fn only(scope: DomainScope) -> Self {
        let mut scopes = Self::NONE;
        scopes.insert(scope);
        scopes
    }

    pub fn insert(&mut self, scope: DomainScope) {
        match scope {
            DomainScope::Finance => self.finance = true,
            DomainScope::Personnel => self.personnel = true,
        }
    }

    pub fn covers(&self, scope: DomainScope) -> bool {
        match scope {
            DomainScope::Finance => self.finance,
            DomainScope::Personnel => self.personnel,
        }
    }

    pub fn is_combined(&self) -> bool {
        self.finance && self.personnel
    }
}

/// A role in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: RoleName,
    /// Human-readable label
    pub label: String,
    /// Lower is more authority; `None` ranks below everything
    pub priority: Option<i32>,
    pub scopes: DomainScopes,
    /// Part of the immutable seed catalog
    pub system: bool,
    pub active: bool,
}

impl Role {
    /// Create a role; the name must already be fully namespaced
    pub fn new(
        name: &str,
        label: impl Into<String>,
        priority: Option<i32>,
    ) -> Result<Self, InvalidRoleName> {
        let name = RoleName::parse(name)?;
        Ok(Self {
            id: RoleId::for_name(&name),
            name,
            label: label.into(),
            priority,
            scopes: DomainScopes::NONE,
            system: false,
            active: true,
        })
    }

    pub fn with_scopes(mut self, scopes: DomainScopes) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn system(mut self) -> Self {
        self.system = true;
        self
    }

    /// Priority used for comparisons
    pub fn effective_priority(&self) -> i32 {
        self.priority.unwrap_or(i32::MAX)
    }

    /// Whether this role carries strictly more authority than `other`
    pub fn outranks(&self, other: &Role) -> bool {
        compare_authority(self, other) == Ordering::Less
    }
}

/// Total order on roles: `Less` means `a` carries more authority
pub fn compare_authority(a: &Role, b: &Role) -> Ordering {
    match (a.priority, b.priority) {
        (Some(pa), Some(pb)) => pa.cmp(&pb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.name.cmp(&b.name))
}

/// The role with the most authority, or `None` for an empty set
pub fn highest_authority<'a, I>(roles: I) -> Option<&'a Role>
where
    I: IntoIterator<Item = &'a Role>,
{
    roles.into_iter().min_by(|a, b| compare_authority(a, b))
}

/// Whether any held role is one of `required`
pub fn has_any_role<'a, I>(roles: I, required: &[RoleName]) -> bool
where
    I: IntoIterator<Item = &'a Role>,
{
    roles
        .into_iter()
        .any(|role| required.iter().any(|r| r == &role.name))
}

/// Whether any held role grants finance-area access
pub fn has_finance_scope<'a, I>(roles: I) -> bool
where
    I: IntoIterator<Item = &'a Role>,
{
    roles
        .into_iter()
        .any(|role| role.scopes.covers(DomainScope::Finance))
}

/// Whether any held role grants personnel-area access
pub fn has_personnel_scope<'a, I>(roles: I) -> bool
where
    I: IntoIterator<Item = &'a Role>,
{
    roles
        .into_iter()
        .any(|role| role.scopes.covers(DomainScope::Personnel))
}

/// Sort roles from most to least authority
pub fn sort_by_authority(roles: &mut [Role]) {
    roles.sort_by(compare_authority);
}
