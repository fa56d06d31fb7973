//! Administrative operations over the audit trail.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{info, instrument};

use super::export::ExportFormat;
use super::models::{AuditAction, AuditEvent, AuditFilter, AuditLogEntry, AuditStats};
use super::trail::AuditTrail;
use crate::config::AuditConfig;
use crate::error::{AccessError, Result};
use crate::rbac::models::UserId;

/// One page of audit query results.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditLogEntry>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
}

/// Rendered export payload.
#[derive(Debug, Clone)]
pub struct AuditExport {
    pub format: ExportFormat,
    pub records: usize,
    pub body: Vec<u8>,
}

pub struct AuditService {
    trail: AuditTrail,
    config: AuditConfig,
}

impl AuditService {
    pub fn new(trail: AuditTrail, config: AuditConfig) -> Self {
        Self { trail, config }
    }

    fn check_window(filter: &AuditFilter) -> Result<()> {
        if let (Some(start), Some(end)) = (filter.start, filter.end) {
            if start > end {
                return Err(AccessError::validation("start time must not be after end time"));
            }
        }
        Ok(())
    }

    /// Query the trail. At least one of user, action, or time bound is required.
    #[instrument(skip(self))]
    pub async fn audit_logs(&self, filter: &AuditFilter) -> Result<AuditPage> {
        if !filter.has_criteria() {
            return Err(AccessError::validation(
                "at least one of user_id, action, start or end is required",
            ));
        }
        Self::check_window(filter)?;

        let limit = filter.limit.filter(|l| *l > 0).unwrap_or(self.config.default_page_size);
        let offset = filter.offset.unwrap_or(0);

        let store = self.trail.store();
        let entries = store.query(filter, limit, offset).await?;
        let total = store.count(filter).await?;

        Ok(AuditPage {
            entries,
            total,
            limit,
            offset,
        })
    }

    pub async fn audit_stats(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<AuditStats> {
        if start > end {
            return Err(AccessError::validation("start time must not be after end time"));
        }
        self.trail.store().stats(start, end).await
    }

    /// Render every matching entry (up to the export cap) and record the export.
    #[instrument(skip(self), fields(format = ?format))]
    pub async fn export(&self, actor: &UserId, filter: &AuditFilter, format: ExportFormat) -> Result<AuditExport> {
        Self::check_window(filter)?;

        let entries = self
            .trail
            .store()
            .query(filter, self.config.max_export_records, 0)
            .await?;
        let body = format.render(&entries)?;

        self.trail
            .log_action(
                actor,
                AuditAction::AuditExport,
                "audit_logs",
                json!({
                    "format": format,
                    "records": entries.len(),
                }),
            )
            .await;

        info!(records = entries.len(), "Audit logs exported");

        Ok(AuditExport {
            format,
            records: entries.len(),
            body,
        })
    }

    /// Delete entries older than `retention_days`. Returns how many were removed.
    #[instrument(skip(self))]
    pub async fn cleanup(&self, actor: Option<&UserId>, retention_days: i64) -> Result<u64> {
        if retention_days <= 0 {
            return Err(AccessError::validation("retention days must be positive"));
        }

        let cutoff = Utc::now() - Duration::days(retention_days);
        let removed = self.trail.store().delete_before(cutoff).await?;

        let mut event = AuditEvent::new(AuditAction::AuditCleanup, "audit_logs").details(json!({
            "retention_days": retention_days,
            "cutoff": cutoff.to_rfc3339(),
            "deleted": removed,
        }));
        if let Some(actor) = actor {
            event = event.user(actor);
        }
        self.trail.record(event).await;

        info!(removed, retention_days, "Audit log cleanup complete");
        Ok(removed)
    }

    /// Cleanup with the configured retention.
    pub async fn cleanup_default(&self, actor: Option<&UserId>) -> Result<u64> {
        self.cleanup(actor, self.config.retention_days).await
    }
}
