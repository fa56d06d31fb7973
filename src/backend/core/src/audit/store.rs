//! Persistence seam for audit records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::models::{AuditFilter, AuditLogEntry, AuditStats, CountEntry};
use crate::error::Result;

/// How many entries the `top_*` breakdowns keep.
pub const TOP_N: usize = 10;

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditLogEntry) -> Result<()>;

    /// Matching entries, newest first, after `offset`, at most `limit`.
    async fn query(&self, filter: &AuditFilter, limit: usize, offset: usize) -> Result<Vec<AuditLogEntry>>;

    async fn count(&self, filter: &AuditFilter) -> Result<u64>;

    /// Delete entries created strictly before `cutoff`.
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn stats(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<AuditStats>;
}

/// Process-local audit store.
#[derive(Default)]
pub struct InMemoryAuditStore {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of every entry, oldest first.
    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.read().clone()
    }
}

fn ranked(counts: HashMap<String, u64>) -> Vec<CountEntry> {
    let mut ranked: Vec<CountEntry> = counts
        .into_iter()
        .map(|(key, count)| CountEntry { key, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    ranked.truncate(TOP_N);
    ranked
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: &AuditLogEntry) -> Result<()> {
        self.entries.write().push(entry.clone());
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter, limit: usize, offset: usize) -> Result<Vec<AuditLogEntry>> {
        let entries = self.entries.read();
        Ok(entries
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &AuditFilter) -> Result<u64> {
        Ok(self.entries.read().iter().filter(|e| filter.matches(e)).count() as u64)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.created_at >= cutoff);
        Ok((before - entries.len()) as u64)
    }

    async fn stats(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<AuditStats> {
        let entries = self.entries.read();
        let window = entries
            .iter()
            .filter(|e| e.created_at >= start && e.created_at <= end);

        let mut stats = AuditStats::default();
        let mut users = HashSet::new();
        let mut actions: HashMap<String, u64> = HashMap::new();
        let mut resources: HashMap<String, u64> = HashMap::new();
        let mut days: BTreeMap<String, u64> = BTreeMap::new();

        for entry in window {
            stats.total_events += 1;
            if !entry.success {
                stats.failed_events += 1;
            }
            if let Some(user) = &entry.user_id {
                users.insert(user.clone());
            }
            *actions.entry(entry.action.clone()).or_default() += 1;
            *resources.entry(entry.resource.clone()).or_default() += 1;
            *days
                .entry(entry.created_at.format("%Y-%m-%d").to_string())
                .or_default() += 1;
        }

        stats.unique_users = users.len() as u64;
        stats.top_actions = ranked(actions);
        stats.top_resources = ranked(resources);
        stats.events_by_day = days
            .into_iter()
            .map(|(key, count)| CountEntry { key, count })
            .collect();
        Ok(stats)
    }
}
