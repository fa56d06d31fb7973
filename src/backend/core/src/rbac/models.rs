//! RBAC data models: identifiers, permissions, and the persisted assignment rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{AccessError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed user identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

/// Strongly-typed role identifier (`admin`, `user`, `viewer`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub String);

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RoleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permission
// ═══════════════════════════════════════════════════════════════════════════════

/// An atomic capability in `resource:action` form, for example:
/// - `user:manage`
/// - `workspace:create`
/// - `audit:export`
///
/// Permissions compare by exact value. There are no wildcards: a role that
/// should hold everything is granted every permission explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission {
    /// The resource type (e.g., "workspace", "provider").
    pub resource: String,
    /// The action (e.g., "create", "read", "manage").
    pub action: String,
}

impl Permission {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// Parse a permission from a colon-separated string like `"user:manage"`.
    pub fn parse(s: &str) -> Option<Self> {
        let (resource, action) = s.split_once(':')?;
        if resource.is_empty() || action.is_empty() || action.contains(':') {
            return None;
        }
        Some(Self::new(resource, action))
    }

    /// Like [`Permission::parse`], but failing with a validation error.
    pub fn parse_strict(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| {
            AccessError::validation(format!("invalid permission '{}': expected resource:action", s))
        })
    }

    /// Return the canonical string form `"resource:action"`.
    pub fn as_string(&self) -> String {
        format!("{}:{}", self.resource, self.action)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

impl TryFrom<String> for Permission {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid permission: {}", value))
    }
}

impl From<Permission> for String {
    fn from(p: Permission) -> Self {
        p.as_string()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Persisted rows
// ═══════════════════════════════════════════════════════════════════════════════

/// A user's direct assignment to a role. `(user_id, role)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub id: Uuid,
    pub user_id: UserId,
    pub role: RoleId,
    pub created_at: DateTime<Utc>,
}

impl UserRole {
    pub fn new(user_id: UserId, role: RoleId) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            role,
            created_at: Utc::now(),
        }
    }
}

/// A grant of a permission to a role. `(role, permission)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermission {
    pub id: Uuid,
    pub role: RoleId,
    pub permission: Permission,
    pub created_at: DateTime<Utc>,
}

impl RolePermission {
    pub fn new(role: RoleId, permission: Permission) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            permission,
            created_at: Utc::now(),
        }
    }
}

/// Number of direct assignments held by one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCount {
    pub role: RoleId,
    pub count: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_parse() {
        let p = Permission::parse("user:manage").unwrap();
        assert_eq!(p.resource, "user");
        assert_eq!(p.action, "manage");
        assert_eq!(p.to_string(), "user:manage");
    }

    #[test]
    fn test_permission_parse_rejects_malformed() {
        assert!(Permission::parse("usermanage").is_none());
        assert!(Permission::parse(":manage").is_none());
        assert!(Permission::parse("user:").is_none());
        assert!(Permission::parse("a:b:c").is_none());
        assert!(Permission::parse_strict("nope").is_err());
    }

    #[test]
    fn test_permission_serializes_as_string() {
        let p = Permission::new("workspace", "read");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"workspace:read\"");

        let back: Permission = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
        assert!(serde_json::from_str::<Permission>("\"broken\"").is_err());
    }

    #[test]
    fn test_identifiers_display() {
        assert_eq!(UserId::new("u-1").to_string(), "u-1");
        assert_eq!(RoleId::from("admin").as_str(), "admin");
    }
}
