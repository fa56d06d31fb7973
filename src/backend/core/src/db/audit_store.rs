//! PostgreSQL implementation of [`AuditStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::models::{AuditFilter, AuditLogEntry, AuditStats, CountEntry};
use crate::audit::store::{AuditStore, TOP_N};
use crate::error::Result;
use crate::rbac::models::UserId;

#[derive(Clone)]
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ranked(&self, column: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<CountEntry>> {
        // `column` is one of two fixed identifiers, never caller input.
        let sql = format!(
            r#"
            SELECT {column} AS key, COUNT(*) AS count
            FROM audit_logs
            WHERE created_at BETWEEN $1 AND $2
            GROUP BY {column}
            ORDER BY count DESC, key
            LIMIT $3
            "#
        );

        let rows = sqlx::query_as::<_, CountRow>(&sql)
            .bind(start)
            .bind(end)
            .bind(TOP_N as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(CountEntry::from).collect())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Row Types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
struct AuditLogRow {
    id: Uuid,
    user_id: Option<String>,
    action: String,
    resource: String,
    details: serde_json::Value,
    ip_address: String,
    user_agent: Option<String>,
    success: bool,
    created_at: DateTime<Utc>,
}

impl From<AuditLogRow> for AuditLogEntry {
    fn from(row: AuditLogRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id.map(UserId),
            action: row.action,
            resource: row.resource,
            details: row.details,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            success: row.success,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CountRow {
    key: String,
    count: i64,
}

impl From<CountRow> for CountEntry {
    fn from(row: CountRow) -> Self {
        Self {
            key: row.key,
            count: row.count as u64,
        }
    }
}

const FILTER_CLAUSE: &str = r#"
    ($1::text IS NULL OR user_id = $1)
    AND ($2::text IS NULL OR action = $2)
    AND ($3::timestamptz IS NULL OR created_at >= $3)
    AND ($4::timestamptz IS NULL OR created_at <= $4)
"#;

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn append(&self, entry: &AuditLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs
                (id, user_id, action, resource, details, ip_address, user_agent, success, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.user_id.as_ref().map(|u| u.as_str()))
        .bind(&entry.action)
        .bind(&entry.resource)
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .bind(entry.user_agent.as_deref())
        .bind(entry.success)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query(&self, filter: &AuditFilter, limit: usize, offset: usize) -> Result<Vec<AuditLogEntry>> {
        let sql = format!(
            r#"
            SELECT id, user_id, action, resource, details, ip_address, user_agent, success, created_at
            FROM audit_logs
            WHERE {FILTER_CLAUSE}
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#
        );

        let rows = sqlx::query_as::<_, AuditLogRow>(&sql)
            .bind(filter.user_id.as_ref().map(|u| u.as_str()))
            .bind(filter.action.as_deref())
            .bind(filter.start)
            .bind(filter.end)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(AuditLogEntry::from).collect())
    }

    async fn count(&self, filter: &AuditFilter) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM audit_logs WHERE {FILTER_CLAUSE}");

        let count: i64 = sqlx::query_scalar(&sql)
            .bind(filter.user_id.as_ref().map(|u| u.as_str()))
            .bind(filter.action.as_deref())
            .bind(filter.start)
            .bind(filter.end)
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM audit_logs WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn stats(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<AuditStats> {
        let (total, unique_users, failed): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(DISTINCT user_id),
                   COUNT(*) FILTER (WHERE NOT success)
            FROM audit_logs
            WHERE created_at BETWEEN $1 AND $2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        let days = sqlx::query_as::<_, CountRow>(
            r#"
            SELECT to_char(date_trunc('day', created_at), 'YYYY-MM-DD') AS key, COUNT(*) AS count
            FROM audit_logs
            WHERE created_at BETWEEN $1 AND $2
            GROUP BY key
            ORDER BY key
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(AuditStats {
            total_events: total as u64,
            unique_users: unique_users as u64,
            failed_events: failed as u64,
            top_actions: self.ranked("action", start, end).await?,
            top_resources: self.ranked("resource", start, end).await?,
            events_by_day: days.into_iter().map(CountEntry::from).collect(),
        })
    }
}
