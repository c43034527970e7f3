//! Access policy table
//!
//! An ordered list of `(pattern, requirement)` rules evaluated top to bottom;
//! the first rule whose pattern and method match decides the request. The
//! table is built at startup and never changes afterwards.

use crate::catalog::RoleCatalog;
use crate::error::{AuthError, AuthResult, AuthorizationFailure};
use crate::identity::Identity;
use crate::role::{DomainScope, RoleName, ROLE_PREFIX};
use gatehouse_core::{AccessPolicyConfig, PolicyRuleConfig, UnmatchedPolicy};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`: exactly one segment
    Any,
    /// `**`: zero or more segments
    AnyDepth,
}

/// Ant-style path pattern (`/api/admin/**`, `/api/users/*`, `/api/health`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> AuthResult<Self> {
        if !raw.starts_with('/') {
            return Err(AuthError::validation(
                "pattern",
                format!("'{}' must start with '/'", raw),
            ));
        }

        let segments = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "*" => Segment::Any,
                "**" => Segment::AnyDepth,
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        let path: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match_segments(&self.segments, &path)
    }
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((segment, rest)) => match path.split_first() {
            Some((head, tail)) => {
                let head_matches = match segment {
                    Segment::Literal(literal) => literal == head,
                    _ => true,
                };
                head_matches && match_segments(rest, tail)
            }
            None => false,
        },
    }
}

/// Who may access a matched path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRequirement {
    PermitAll,
    Authenticated,
    AnyRole(Vec<RoleName>),
    /// Highest held role must have priority at or below this value
    MinimumAuthority(i32),
    /// Some held role must cover this business domain
    Scope(DomainScope),
    DenyAll,
}

impl RoleRequirement {
    fn describe(&self) -> String {
        match self {
            RoleRequirement::PermitAll => "nothing".to_string(),
            RoleRequirement::Authenticated => "authentication".to_string(),
            RoleRequirement::AnyRole(roles) => roles
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join(" or "),
            RoleRequirement::MinimumAuthority(priority) => {
                format!("authority priority {} or higher", priority)
            }
            RoleRequirement::Scope(scope) => format!("{} access", scope),
            RoleRequirement::DenyAll => "access that is never granted".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PolicyRule {
    pub pattern: PathPattern,
    /// Upper-case HTTP method; `None` matches every method
    pub method: Option<String>,
    pub requirement: RoleRequirement,
}

impl PolicyRule {
    pub fn new(pattern: &str, requirement: RoleRequirement) -> AuthResult<Self> {
        Ok(Self {
            pattern: PathPattern::parse(pattern)?,
            method: None,
            requirement,
        })
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = Some(method.to_ascii_uppercase());
        self
    }

    fn applies_to(&self, method: &str, path: &str) -> bool {
        self.method
            .as_deref()
            .map_or(true, |m| m.eq_ignore_ascii_case(method))
            && self.pattern.matches(path)
    }

    fn from_config(config: &PolicyRuleConfig, catalog: &RoleCatalog) -> AuthResult<Self> {
        let requirement = match config.require.as_str() {
            "permit_all" => RoleRequirement::PermitAll,
            "authenticated" => RoleRequirement::Authenticated,
            "deny_all" => RoleRequirement::DenyAll,
            "any_role" => {
                if config.roles.is_empty() {
                    return Err(AuthError::validation(
                        "access_policy",
                        format!("rule '{}' needs at least one role", config.pattern),
                    ));
                }
                let mut roles = Vec::with_capacity(config.roles.len());
                for raw in &config.roles {
                    let name = RoleName::normalize(raw)
                        .map_err(|e| AuthError::validation("access_policy", e.to_string()))?;
                    if catalog.get(&name).is_none() {
                        return Err(AuthError::UnknownRole(name.to_string()));
                    }
                    roles.push(name);
                }
                RoleRequirement::AnyRole(roles)
            }
            "minimum_authority" => {
                let priority = config.priority.ok_or_else(|| {
                    AuthError::validation(
                        "access_policy",
                        format!("rule '{}' needs a priority", config.pattern),
                    )
                })?;
                RoleRequirement::MinimumAuthority(priority)
            }
            "scope" => {
                let scope = config
                    .scope
                    .as_deref()
                    .ok_or_else(|| {
                        AuthError::validation(
                            "access_policy",
                            format!("rule '{}' needs a scope", config.pattern),
                        )
                    })?
                    .parse()
                    .map_err(|e: String| AuthError::validation("access_policy", e))?;
                RoleRequirement::Scope(scope)
            }
            other => {
                return Err(AuthError::validation(
                    "access_policy",
                    format!("unknown requirement '{}'", other),
                ))
            }
        };

        let rule = Self::new(&config.pattern, requirement)?;
        Ok(match &config.method {
            Some(method) => rule.with_method(method),
            None => rule,
        })
    }
}

/// Outcome of evaluating a request against the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Permit,
    Deny(AuthorizationFailure),
}

impl Decision {
    pub fn is_permit(&self) -> bool {
        matches!(self, Decision::Permit)
    }
}

#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<PolicyRule>,
    unmatched_anonymous: UnmatchedPolicy,
    catalog: Arc<RoleCatalog>,
}

impl AccessPolicy {
    pub fn new(
        rules: Vec<PolicyRule>,
        unmatched_anonymous: UnmatchedPolicy,
        catalog: Arc<RoleCatalog>,
    ) -> Self {
        Self {
            rules,
            unmatched_anonymous,
            catalog,
        }
    }

    /// Configured table, or the built-in one when no rules are configured
    pub fn from_config(config: &AccessPolicyConfig, catalog: Arc<RoleCatalog>) -> AuthResult<Self> {
        let rules = if config.rules.is_empty() {
            builtin_rules()?
        } else {
            config
                .rules
                .iter()
                .map(|rule| PolicyRule::from_config(rule, &catalog))
                .collect::<AuthResult<Vec<_>>>()?
        };

        debug!("Access policy loaded with {} rules", rules.len());
        Ok(Self::new(rules, config.unmatched_anonymous, catalog))
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    pub fn evaluate(&self, method: &str, path: &str, identity: Option<&Identity>) -> Decision {
        let Some(rule) = self.rules.iter().find(|r| r.applies_to(method, path)) else {
            return match (identity, self.unmatched_anonymous) {
                (Some(_), _) | (None, UnmatchedPolicy::Permit) => Decision::Permit,
                (None, UnmatchedPolicy::Deny) => {
                    Decision::Deny(AuthorizationFailure::Unauthenticated)
                }
            };
        };

        let decision = self.check(&rule.requirement, identity);
        if !decision.is_permit() {
            debug!(
                "{} {} denied by rule '{}'",
                method,
                path,
                rule.pattern.as_str()
            );
        }
        decision
    }

    fn check(&self, requirement: &RoleRequirement, identity: Option<&Identity>) -> Decision {
        let insufficient = || {
            Decision::Deny(AuthorizationFailure::InsufficientRole {
                required: requirement.describe(),
            })
        };

        match (requirement, identity) {
            (RoleRequirement::PermitAll, _) => Decision::Permit,
            (RoleRequirement::DenyAll, _) => insufficient(),
            (_, None) => Decision::Deny(AuthorizationFailure::Unauthenticated),
            (RoleRequirement::Authenticated, Some(_)) => Decision::Permit,
            (RoleRequirement::AnyRole(required), Some(identity)) => {
                if identity.has_any_role(required) {
                    Decision::Permit
                } else {
                    insufficient()
                }
            }
            (RoleRequirement::MinimumAuthority(priority), Some(identity)) => {
                let held = identity
                    .highest_role(&self.catalog)
                    .map(|role| role.effective_priority())
                    .unwrap_or(i32::MAX);
                if held <= *priority {
                    Decision::Permit
                } else {
                    insufficient()
                }
            }
            (RoleRequirement::Scope(scope), Some(identity)) => {
                if identity.covers_scope(&self.catalog, *scope) {
                    Decision::Permit
                } else {
                    insufficient()
                }
            }
        }
    }
}

fn role(bare: &str) -> AuthResult<RoleName> {
    RoleName::parse(&format!("{}{}", ROLE_PREFIX, bare))
        .map_err(|e| AuthError::validation("access_policy", e.to_string()))
}

/// Default rule table
pub fn builtin_rules() -> AuthResult<Vec<PolicyRule>> {
    let admins = RoleRequirement::AnyRole(vec![role("SUPER_ADMIN")?, role("ADMIN")?]);

    Ok(vec![
        PolicyRule::new("/api/health", RoleRequirement::PermitAll)?,
        PolicyRule::new("/api/auth/login", RoleRequirement::PermitAll)?.with_method("POST"),
        PolicyRule::new("/api/auth/refresh", RoleRequirement::PermitAll)?.with_method("POST"),
        PolicyRule::new("/api/auth/register", RoleRequirement::PermitAll)?.with_method("POST"),
        PolicyRule::new("/api/auth/**", RoleRequirement::Authenticated)?,
        PolicyRule::new("/api/roles", RoleRequirement::PermitAll)?.with_method("GET"),
        PolicyRule::new("/api/admin/**", admins)?,
        PolicyRule::new("/api/finance/**", RoleRequirement::Scope(DomainScope::Finance))?,
        PolicyRule::new("/api/personnel/**", RoleRequirement::Scope(DomainScope::Personnel))?,
        PolicyRule::new("/api/users/**", RoleRequirement::Authenticated)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn identity(roles: &[&str]) -> Identity {
        Identity {
            subject: "alice".into(),
            display_name: None,
            email: None,
            department: None,
            roles: roles.iter().map(|r| RoleName::parse(r).unwrap()).collect(),
            expires_at: Utc::now(),
        }
    }

    fn policy(unmatched: UnmatchedPolicy) -> AccessPolicy {
        AccessPolicy::new(
            builtin_rules().unwrap(),
            unmatched,
            Arc::new(RoleCatalog::builtin()),
        )
    }

    #[test]
    fn ant_patterns() {
        let any_depth = PathPattern::parse("/api/admin/**").unwrap();
        assert!(any_depth.matches("/api/admin"));
        assert!(any_depth.matches("/api/admin/users/bob/unlock"));
        assert!(!any_depth.matches("/api/administrator"));

        let single = PathPattern::parse("/api/users/*").unwrap();
        assert!(single.matches("/api/users/42"));
        assert!(!single.matches("/api/users"));
        assert!(!single.matches("/api/users/42/avatar"));

        let middle = PathPattern::parse("/api/**/export").unwrap();
        assert!(middle.matches("/api/export"));
        assert!(middle.matches("/api/a/b/export"));
        assert!(!middle.matches("/api/a/b"));

        let exact = PathPattern::parse("/api/health").unwrap();
        assert!(exact.matches("/api/health/"));
        assert!(!exact.matches("/api/healthz"));

        assert!(PathPattern::parse("api/health").is_err());
    }

    #[test]
    fn first_match_wins_and_method_restricts() {
        let policy = policy(UnmatchedPolicy::Deny);
        assert!(policy.evaluate("POST", "/api/auth/login", None).is_permit());
        // GET on the login path falls through to the authenticated catch-all
        assert_eq!(
            policy.evaluate("GET", "/api/auth/login", None),
            Decision::Deny(AuthorizationFailure::Unauthenticated)
        );
        assert!(policy
            .evaluate("GET", "/api/auth/me", Some(&identity(&["ROLE_USER"])))
            .is_permit());
    }

    #[test]
    fn admin_paths_need_an_admin_role() {
        let policy = policy(UnmatchedPolicy::Deny);
        let path = "/api/admin/users/bob/unlock";

        assert_eq!(
            policy.evaluate("POST", path, None),
            Decision::Deny(AuthorizationFailure::Unauthenticated)
        );
        assert!(matches!(
            policy.evaluate("POST", path, Some(&identity(&["ROLE_STAFF"]))),
            Decision::Deny(AuthorizationFailure::InsufficientRole { .. })
        ));
        assert!(policy
            .evaluate("POST", path, Some(&identity(&["ROLE_USER", "ROLE_ADMIN"])))
            .is_permit());
    }

    #[test]
    fn domain_areas_follow_catalog_scopes() {
        let policy = policy(UnmatchedPolicy::Deny);
        let finance = "/api/finance/reports";
        let personnel = "/api/personnel/records";

        let hr = identity(&["ROLE_HR_MANAGER"]);
        assert!(matches!(
            policy.evaluate("GET", finance, Some(&hr)),
            Decision::Deny(AuthorizationFailure::InsufficientRole { .. })
        ));
        assert!(policy.evaluate("GET", personnel, Some(&hr)).is_permit());

        let accountant = identity(&["ROLE_USER", "ROLE_FINANCE_MANAGER"]);
        assert!(policy.evaluate("GET", finance, Some(&accountant)).is_permit());
        assert!(!policy.evaluate("GET", personnel, Some(&accountant)).is_permit());

        let admin = identity(&["ROLE_ADMIN"]);
        assert!(policy.evaluate("GET", finance, Some(&admin)).is_permit());
        assert!(policy.evaluate("GET", personnel, Some(&admin)).is_permit());

        assert!(!policy
            .evaluate("GET", finance, Some(&identity(&["ROLE_STAFF", "ROLE_USER"])))
            .is_permit());
        assert_eq!(
            policy.evaluate("GET", finance, None),
            Decision::Deny(AuthorizationFailure::Unauthenticated)
        );
    }

    #[test]
    fn minimum_authority_uses_highest_held_role() {
        let policy = AccessPolicy::new(
            vec![PolicyRule::new("/api/reports/**", RoleRequirement::MinimumAuthority(20)).unwrap()],
            UnmatchedPolicy::Deny,
            Arc::new(RoleCatalog::builtin()),
        );
        let path = "/api/reports/quarterly";
        assert!(policy
            .evaluate("GET", path, Some(&identity(&["ROLE_HR_MANAGER"])))
            .is_permit());
        assert!(policy
            .evaluate("GET", path, Some(&identity(&["ROLE_SUPER_ADMIN"])))
            .is_permit());
        assert!(!policy
            .evaluate("GET", path, Some(&identity(&["ROLE_STAFF", "ROLE_USER"])))
            .is_permit());
        // Roles outside the catalog carry no authority
        assert!(!policy
            .evaluate("GET", path, Some(&identity(&["ROLE_GHOST"])))
            .is_permit());
    }

    #[test]
    fn unmatched_paths() {
        let deny = policy(UnmatchedPolicy::Deny);
        assert_eq!(
            deny.evaluate("GET", "/somewhere/else", None),
            Decision::Deny(AuthorizationFailure::Unauthenticated)
        );
        assert!(deny
            .evaluate("GET", "/somewhere/else", Some(&identity(&[])))
            .is_permit());

        let permit = policy(UnmatchedPolicy::Permit);
        assert!(permit.evaluate("GET", "/somewhere/else", None).is_permit());
    }

    #[test]
    fn deny_all_refuses_everyone() {
        let policy = AccessPolicy::new(
            vec![PolicyRule::new("/internal/**", RoleRequirement::DenyAll).unwrap()],
            UnmatchedPolicy::Permit,
            Arc::new(RoleCatalog::builtin()),
        );
        assert!(!policy
            .evaluate("GET", "/internal/x", Some(&identity(&["ROLE_SUPER_ADMIN"])))
            .is_permit());
        assert!(!policy.evaluate("GET", "/internal/x", None).is_permit());
    }

    #[test]
    fn rules_from_config() {
        let catalog = Arc::new(RoleCatalog::builtin());
        let config = AccessPolicyConfig {
            unmatched_anonymous: UnmatchedPolicy::Deny,
            rules: vec![
                PolicyRuleConfig {
                    pattern: "/api/hr/**".into(),
                    method: Some("get".into()),
                    require: "any_role".into(),
                    roles: vec!["HR_MANAGER".into()],
                    priority: None,
                    scope: None,
                },
                PolicyRuleConfig {
                    pattern: "/api/open".into(),
                    method: None,
                    require: "permit_all".into(),
                    roles: vec![],
                    priority: None,
                    scope: None,
                },
                PolicyRuleConfig {
                    pattern: "/api/ledger/**".into(),
                    method: None,
                    require: "scope".into(),
                    roles: vec![],
                    priority: None,
                    scope: Some("finance".into()),
                },
            ],
        };
        let policy = AccessPolicy::from_config(&config, catalog.clone()).unwrap();
        assert_eq!(policy.rules().len(), 3);
        assert_eq!(
            policy.rules()[2].requirement,
            RoleRequirement::Scope(DomainScope::Finance)
        );
        assert!(!policy
            .evaluate("GET", "/api/ledger/2024", Some(&identity(&["ROLE_HR_MANAGER"])))
            .is_permit());
        assert_eq!(policy.rules()[0].method.as_deref(), Some("GET"));
        assert!(policy
            .evaluate("GET", "/api/hr/staff", Some(&identity(&["ROLE_HR_MANAGER"])))
            .is_permit());
        assert!(policy.evaluate("GET", "/api/open", None).is_permit());

        let mut bad = config.clone();
        bad.rules[0].roles = vec!["WIZARD".into()];
        assert!(matches!(
            AccessPolicy::from_config(&bad, catalog.clone()),
            Err(AuthError::UnknownRole(_))
        ));

        let mut bad = config.clone();
        bad.rules[2].scope = Some("marketing".into());
        assert!(AccessPolicy::from_config(&bad, catalog.clone()).is_err());

        let mut bad = config;
        bad.rules[1].require = "maybe".into();
        assert!(AccessPolicy::from_config(&bad, catalog).is_err());
    }
}
