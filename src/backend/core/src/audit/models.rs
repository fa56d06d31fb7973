//! Audit record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::rbac::models::UserId;

/// Address recorded when the caller supplied none.
pub const DEFAULT_IP_ADDRESS: &str = "127.0.0.1";

/// Actions the core records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    RoleAssign,
    RoleRemove,
    PermissionGrant,
    PermissionRevoke,
    PermissionCheck,
    UserLogout,
    OidcLogout,
    BatchLogout,
    TokenCleanup,
    TokenUnblacklist,
    AuditExport,
    AuditCleanup,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleAssign => "role_assign",
            Self::RoleRemove => "role_remove",
            Self::PermissionGrant => "permission_grant",
            Self::PermissionRevoke => "permission_revoke",
            Self::PermissionCheck => "permission_check",
            Self::UserLogout => "user_logout",
            Self::OidcLogout => "oidc_logout",
            Self::BatchLogout => "batch_logout",
            Self::TokenCleanup => "token_cleanup",
            Self::TokenUnblacklist => "token_unblacklist",
            Self::AuditExport => "audit_export",
            Self::AuditCleanup => "audit_cleanup",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted audit record. Entries are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    /// Acting user; `None` for system operations such as bootstrap.
    pub user_id: Option<UserId>,
    pub action: String,
    pub resource: String,
    pub details: Value,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Event builder
// ═══════════════════════════════════════════════════════════════════════════════

/// An audit event before it is stamped and stored.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub user_id: Option<UserId>,
    pub action: AuditAction,
    pub resource: String,
    pub details: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
}

impl AuditEvent {
    pub fn new(action: AuditAction, resource: impl Into<String>) -> Self {
        Self {
            user_id: None,
            action,
            resource: resource.into(),
            details: Value::Object(Default::default()),
            ip_address: None,
            user_agent: None,
            success: true,
        }
    }

    pub fn user(mut self, user_id: &UserId) -> Self {
        self.user_id = Some(user_id.clone());
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    /// Stamp id and time, filling the default client address.
    pub fn into_entry(self) -> AuditLogEntry {
        AuditLogEntry {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            action: self.action.as_str().to_string(),
            resource: self.resource,
            details: self.details,
            ip_address: self
                .ip_address
                .filter(|ip| !ip.is_empty())
                .unwrap_or_else(|| DEFAULT_IP_ADDRESS.to_string()),
            user_agent: self.user_agent,
            success: self.success,
            created_at: Utc::now(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Queries
// ═══════════════════════════════════════════════════════════════════════════════

/// Filter for audit queries. Every set criterion must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    pub user_id: Option<UserId>,
    pub action: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl AuditFilter {
    pub fn for_user(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    /// Whether at least one selection criterion is set.
    pub fn has_criteria(&self) -> bool {
        self.user_id.is_some() || self.action.is_some() || self.start.is_some() || self.end.is_some()
    }

    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.user_id
            .as_ref()
            .map_or(true, |u| entry.user_id.as_ref() == Some(u))
            && self.action.as_ref().map_or(true, |a| &entry.action == a)
            && self.start.map_or(true, |s| entry.created_at >= s)
            && self.end.map_or(true, |e| entry.created_at <= e)
    }
}

/// A `(label, count)` pair in a statistics breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountEntry {
    pub key: String,
    pub count: u64,
}

/// Aggregates over a time window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStats {
    pub total_events: u64,
    pub unique_users: u64,
    pub failed_events: u64,
    /// Most frequent actions, descending
    pub top_actions: Vec<CountEntry>,
    /// Most frequent resources, descending
    pub top_resources: Vec<CountEntry>,
    /// Events per calendar day (`YYYY-MM-DD`), ascending
    pub events_by_day: Vec<CountEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_default_ip_filled() {
        let entry = AuditEvent::new(AuditAction::UserLogout, "POST /api/v1/auth/logout").into_entry();
        assert_eq!(entry.ip_address, DEFAULT_IP_ADDRESS);
        assert_eq!(entry.action, "user_logout");
        assert!(entry.success);

        let entry = AuditEvent::new(AuditAction::UserLogout, "x")
            .client(Some("10.0.0.7".into()), Some("curl/8".into()))
            .into_entry();
        assert_eq!(entry.ip_address, "10.0.0.7");
    }

    #[test]
    fn test_filter_matching() {
        let entry = AuditEvent::new(AuditAction::RoleAssign, "role:admin")
            .user(&UserId::new("alice"))
            .into_entry();

        assert!(AuditFilter::for_user("alice").matches(&entry));
        assert!(!AuditFilter::for_user("bob").matches(&entry));
        assert!(!AuditFilter::for_user("alice").action("role_remove").matches(&entry));

        let now = Utc::now();
        let window = AuditFilter::default().between(now - Duration::hours(1), now + Duration::hours(1));
        assert!(window.matches(&entry));
        assert!(window.has_criteria());
        assert!(!AuditFilter::default().page(10, 0).has_criteria());
    }
}
