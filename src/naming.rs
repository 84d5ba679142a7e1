//! # Deployment Naming
//!
//! Maps a raw tenant identifier to the name that scopes every per-tenant resource.
//!
//! The default [`NamingPolicy::Substitute`] replaces each `.` with `-` and nothing
//! else. It is deterministic but not injective: `a.b` and `a-b` both become `a-b`.
//! That collision is accepted and documented rather than silently patched; deployments
//! that must rule it out select [`NamingPolicy::Escaped`] (reversible) or
//! [`NamingPolicy::HashSuffix`].
//!
//! Tenant ids are validated before any policy applies: [`TenantId::new`] trims
//! surrounding whitespace, then rejects an empty id and any id with whitespace inside
//! it. `" bob "` is the tenant `bob`; `"bob smith"` is refused with `INVALID_TENANT`.

use crate::error::{ProvisioningError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Character not allowed in deployment names.
pub const SEPARATOR: char = '.';

/// Character written in place of [`SEPARATOR`].
pub const SUBSTITUTE: char = '-';

/// Escape sequence for [`SEPARATOR`] under [`NamingPolicy::Escaped`].
const ESCAPED_SEPARATOR: &str = "-d-";

/// Escape sequence for [`SUBSTITUTE`] under [`NamingPolicy::Escaped`].
const ESCAPED_SUBSTITUTE: &str = "--";

const HASH_SUFFIX_LEN: usize = 8;

/// Opaque tenant identifier, typically an email-like user name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ProvisioningError::InvalidTenant(
                "tenant identifier cannot be empty".to_string(),
            ));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(ProvisioningError::InvalidTenant(format!(
                "tenant identifier '{trimmed}' contains whitespace"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Separator-free identifier used to name per-tenant resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentName(String);

impl DeploymentName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<prefix>-<name>`, the deploy unit name for a per-tenant stack.
    pub fn stack_name(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.0)
    }

    /// `<name>-<label><index>`, used to keep sibling resources distinct.
    pub fn indexed(&self, label: &str, index: usize) -> String {
        format!("{}-{label}{index}", self.0)
    }
}

impl fmt::Display for DeploymentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Replace every separator with the substitute. Total and side-effect free.
pub fn normalize(tenant: &TenantId) -> DeploymentName {
    DeploymentName(substitute(tenant.as_str()))
}

fn substitute(raw: &str) -> String {
    raw.chars()
        .map(|c| if c == SEPARATOR { SUBSTITUTE } else { c })
        .collect()
}

/// Collision policy for deriving deployment names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// `.` → `-`. Collides for identifiers differing only by `.` vs `-`.
    #[default]
    Substitute,
    /// `-` → `--` and `.` → `-d-`. Injective; see [`decode_escaped`].
    Escaped,
    /// Substitute, then `-` plus the first 8 hex chars of SHA-256 of the raw id.
    HashSuffix,
}

impl NamingPolicy {
    pub fn apply(&self, tenant: &TenantId) -> DeploymentName {
        match self {
            NamingPolicy::Substitute => normalize(tenant),
            NamingPolicy::Escaped => DeploymentName(escape(tenant.as_str())),
            NamingPolicy::HashSuffix => {
                let digest = Sha256::digest(tenant.as_str().as_bytes());
                let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
                DeploymentName(format!(
                    "{}{SUBSTITUTE}{}",
                    substitute(tenant.as_str()),
                    &hex[..HASH_SUFFIX_LEN]
                ))
            }
        }
    }
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            SUBSTITUTE => escaped.push_str(ESCAPED_SUBSTITUTE),
            SEPARATOR => escaped.push_str(ESCAPED_SEPARATOR),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Recover the raw identifier from an [`NamingPolicy::Escaped`] name.
///
/// Returns `None` when the name contains a `-` that is not part of an escape
/// sequence, i.e. it was not produced by the escaped policy.
pub fn decode_escaped(name: &DeploymentName) -> Option<String> {
    let mut decoded = String::with_capacity(name.0.len());
    let mut chars = name.0.chars();
    while let Some(c) = chars.next() {
        if c != SUBSTITUTE {
            decoded.push(c);
            continue;
        }
        match chars.next() {
            Some(SUBSTITUTE) => decoded.push(SUBSTITUTE),
            Some('d') if chars.next() == Some(SUBSTITUTE) => decoded.push(SEPARATOR),
            _ => return None,
        }
    }
    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(raw: &str) -> TenantId {
        TenantId::new(raw).unwrap()
    }

    #[test]
    fn test_normalize_replaces_separators() {
        assert_eq!(normalize(&tenant("alice.smith")).as_str(), "alice-smith");
        assert_eq!(normalize(&tenant("a.b.c")).as_str(), "a-b-c");
        assert_eq!(normalize(&tenant("bob")).as_str(), "bob");
    }

    #[test]
    fn test_normalize_leaves_other_characters() {
        assert_eq!(
            normalize(&tenant("first.last@corp")).as_str(),
            "first-last@corp"
        );
    }

    #[test]
    fn test_substitute_policy_collision_is_known() {
        let dotted = normalize(&tenant("a.b"));
        let dashed = normalize(&tenant("a-b"));
        assert_eq!(dotted, dashed);
    }

    #[test]
    fn test_escaped_policy_separates_colliding_ids() {
        let policy = NamingPolicy::Escaped;
        let dotted = policy.apply(&tenant("a.b"));
        let dashed = policy.apply(&tenant("a-b"));
        assert_eq!(dotted.as_str(), "a-d-b");
        assert_eq!(dashed.as_str(), "a--b");
        assert_ne!(dotted, dashed);
        assert!(!dotted.as_str().contains(SEPARATOR));
    }

    #[test]
    fn test_decode_escaped_round_trip() {
        let name = NamingPolicy::Escaped.apply(&tenant("x-.y.-z"));
        assert_eq!(decode_escaped(&name).as_deref(), Some("x-.y.-z"));
    }

    #[test]
    fn test_decode_escaped_rejects_foreign_names() {
        let name = normalize(&tenant("a.b"));
        assert_eq!(decode_escaped(&name), None);
    }

    #[test]
    fn test_hash_suffix_policy() {
        let policy = NamingPolicy::HashSuffix;
        let dotted = policy.apply(&tenant("a.b"));
        let dashed = policy.apply(&tenant("a-b"));
        assert!(dotted.as_str().starts_with("a-b-"));
        assert_eq!(dotted.as_str().len(), "a-b-".len() + HASH_SUFFIX_LEN);
        assert_ne!(dotted, dashed);
        assert_eq!(dotted, policy.apply(&tenant("a.b")));
    }

    #[test]
    fn test_tenant_id_validation() {
        assert!(TenantId::new("").is_err());
        assert!(TenantId::new("   ").is_err());
        assert!(TenantId::new("al ice").is_err());
        assert_eq!(TenantId::new(" alice ").unwrap().as_str(), "alice");
    }

    #[test]
    fn test_resource_name_helpers() {
        let name = normalize(&tenant("alice.smith"));
        assert_eq!(name.stack_name("Ec2Stack"), "Ec2Stack-alice-smith");
        assert_eq!(name.indexed("Instance", 2), "alice-smith-Instance2");
    }
}
