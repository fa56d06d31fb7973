//! Append-only audit trail shared by every service.
//!
//! Recording never fails the calling operation: a store error is logged,
//! counted, and swallowed.

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::models::{AuditAction, AuditEvent, AuditLogEntry};
use super::store::AuditStore;
use crate::rbac::models::UserId;
use crate::telemetry::{AccessMetrics, SensitiveFieldRedactor};

#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn AuditStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    /// Record a successful action performed by `user_id`.
    pub async fn log_action(&self, user_id: &UserId, action: AuditAction, resource: &str, details: Value) {
        self.record(AuditEvent::new(action, resource).user(user_id).details(details))
            .await;
    }

    /// Stamp, scrub, and store an event.
    pub async fn record(&self, event: AuditEvent) {
        let mut entry = event.into_entry();
        SensitiveFieldRedactor::global().redact_json_values(&mut entry.details);
        self.write(entry).await;
    }

    async fn write(&self, entry: AuditLogEntry) {
        info!(
            target: "audit",
            audit_id = %entry.id,
            user_id = entry.user_id.as_ref().map(|u| u.as_str()).unwrap_or("system"),
            action = %entry.action,
            resource = %entry.resource,
            success = entry.success,
            "audit event"
        );
        AccessMetrics::audit_event(&entry.action);

        if let Err(e) = self.store.append(&entry).await {
            AccessMetrics::audit_write_failure();
            warn!(
                audit_id = %entry.id,
                action = %entry.action,
                error = %e,
                "Failed to persist audit entry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::store::InMemoryAuditStore;
    use crate::error::{AccessError, Result};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    use crate::audit::models::{AuditFilter, AuditStats};

    struct BrokenStore;

    #[async_trait]
    impl AuditStore for BrokenStore {
        async fn append(&self, _: &AuditLogEntry) -> Result<()> {
            Err(AccessError::internal("disk full"))
        }
        async fn query(&self, _: &AuditFilter, _: usize, _: usize) -> Result<Vec<AuditLogEntry>> {
            Ok(vec![])
        }
        async fn count(&self, _: &AuditFilter) -> Result<u64> {
            Ok(0)
        }
        async fn delete_before(&self, _: DateTime<Utc>) -> Result<u64> {
            Ok(0)
        }
        async fn stats(&self, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<AuditStats> {
            Ok(AuditStats::default())
        }
    }

    #[tokio::test]
    async fn test_details_are_scrubbed() {
        let store = Arc::new(InMemoryAuditStore::new());
        let trail = AuditTrail::new(store.clone());

        trail
            .log_action(
                &UserId::new("alice"),
                AuditAction::UserLogout,
                "POST /api/v1/auth/logout",
                json!({
                    "token_hash": "ab12",
                    "note": "Bearer eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiIxIn0.sig",
                }),
            )
            .await;

        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].details["token_hash"], "ab12");
        assert!(!entries[0].details["note"].as_str().unwrap().contains("eyJ"));
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let trail = AuditTrail::new(Arc::new(BrokenStore));
        trail
            .log_action(&UserId::new("alice"), AuditAction::RoleAssign, "role:admin", json!({}))
            .await;
    }
}
