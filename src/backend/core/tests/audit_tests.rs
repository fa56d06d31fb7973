//! Integration tests for the audit trail, queries, export and retention.

use access_core::audit::{
    AuditAction, AuditEvent, AuditFilter, AuditService, AuditStore, AuditTrail, ExportFormat,
    InMemoryAuditStore,
};
use access_core::config::AuditConfig;
use access_core::error::ErrorKind;
use access_core::rbac::UserId;
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;

// ============================================================================
// Test Utilities
// ============================================================================

fn setup() -> (AuditService, AuditTrail, Arc<InMemoryAuditStore>) {
    let store = Arc::new(InMemoryAuditStore::new());
    let trail = AuditTrail::new(store.clone());
    let config = AuditConfig {
        default_page_size: 3,
        max_export_records: 100,
        ..AuditConfig::default()
    };
    (AuditService::new(trail.clone(), config), trail, store)
}

async fn seed(trail: &AuditTrail) {
    let alice = UserId::new("alice");
    let bob = UserId::new("bob");
    for i in 0..4 {
        trail
            .log_action(&alice, AuditAction::UserLogout, "POST /api/v1/auth/logout", json!({ "n": i }))
            .await;
    }
    trail
        .log_action(&bob, AuditAction::RoleAssign, "role:operator", json!({}))
        .await;
    trail
        .record(AuditEvent::new(AuditAction::PermissionCheck, "read:vm").user(&bob).failed())
        .await;
}

// ============================================================================
// Recording
// ============================================================================

#[tokio::test]
async fn test_details_are_redacted_before_storage() {
    let (_, trail, store) = setup();
    trail
        .log_action(
            &UserId::new("alice"),
            AuditAction::UserLogout,
            "POST /api/v1/auth/logout",
            json!({ "note": "Bearer eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiJVIn0.c2ln", "auth_type": "jwt" }),
        )
        .await;

    let entry = &store.entries()[0];
    let note = entry.details["note"].as_str().unwrap();
    assert!(!note.contains("eyJhbGciOiJIUzI1NiJ9"));
    assert_eq!(entry.details["auth_type"], "jwt");
    assert_eq!(entry.ip_address, "127.0.0.1");
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_query_pages_newest_first() {
    let (svc, trail, _) = setup();
    seed(&trail).await;

    let first = svc.audit_logs(&AuditFilter::for_user("alice")).await.unwrap();
    assert_eq!(first.total, 4);
    assert_eq!(first.limit, 3);
    assert_eq!(first.entries.len(), 3);
    assert_eq!(first.entries[0].details["n"], 3);

    let second = svc
        .audit_logs(&AuditFilter::for_user("alice").page(3, 3))
        .await
        .unwrap();
    assert_eq!(second.entries.len(), 1);
    assert_eq!(second.entries[0].details["n"], 0);
}

#[tokio::test]
async fn test_query_requires_criteria() {
    let (svc, _, _) = setup();
    let err = svc.audit_logs(&AuditFilter::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_query_rejects_inverted_window() {
    let (svc, _, _) = setup();
    let now = Utc::now();
    let filter = AuditFilter::default().between(now, now - Duration::hours(1));
    assert_eq!(svc.audit_logs(&filter).await.unwrap_err().kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_filter_by_action() {
    let (svc, trail, _) = setup();
    seed(&trail).await;

    let page = svc
        .audit_logs(&AuditFilter::default().action("role_assign"))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.entries[0].resource, "role:operator");
}

#[tokio::test]
async fn test_stats_over_window() {
    let (svc, trail, _) = setup();
    seed(&trail).await;

    let now = Utc::now();
    let stats = svc
        .audit_stats(now - Duration::hours(1), now + Duration::hours(1))
        .await
        .unwrap();

    assert_eq!(stats.total_events, 6);
    assert_eq!(stats.unique_users, 2);
    assert_eq!(stats.failed_events, 1);
    assert_eq!(stats.top_actions[0].key, "user_logout");
    assert_eq!(stats.top_actions[0].count, 4);
    assert_eq!(stats.events_by_day.iter().map(|d| d.count).sum::<u64>(), 6);
}

// ============================================================================
// Export
// ============================================================================

#[tokio::test]
async fn test_empty_exports() {
    let (svc, _, _) = setup();
    let admin = UserId::new("admin");
    let filter = AuditFilter::for_user("nobody");

    let json = svc.export(&admin, &filter, ExportFormat::Json).await.unwrap();
    assert_eq!(json.records, 0);
    assert_eq!(json.body, b"[]");

    let csv = svc.export(&admin, &filter, ExportFormat::Csv).await.unwrap();
    let text = String::from_utf8(csv.body).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.starts_with("ID,User ID,Action"));
}

#[tokio::test]
async fn test_export_is_itself_audited() {
    let (svc, trail, store) = setup();
    seed(&trail).await;
    let admin = UserId::new("admin");

    let export = svc
        .export(&admin, &AuditFilter::for_user("bob"), ExportFormat::Csv)
        .await
        .unwrap();
    assert_eq!(export.records, 2);
    assert_eq!(String::from_utf8(export.body).unwrap().lines().count(), 3);

    let last = store.entries().into_iter().last().unwrap();
    assert_eq!(last.action, "audit_export");
    assert_eq!(last.user_id, Some(admin));
    assert_eq!(last.details["records"], 2);
}

// ============================================================================
// Retention
// ============================================================================

#[tokio::test]
async fn test_cleanup_rejects_non_positive_days() {
    let (svc, _, _) = setup();
    assert_eq!(svc.cleanup(None, 0).await.unwrap_err().kind(), ErrorKind::Validation);
    assert_eq!(svc.cleanup(None, -5).await.unwrap_err().kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_cleanup_removes_only_old_entries() {
    let (svc, trail, store) = setup();
    seed(&trail).await;

    let mut old = AuditEvent::new(AuditAction::UserLogout, "POST /api/v1/auth/logout").into_entry();
    old.created_at = Utc::now() - Duration::days(120);
    store.append(&old).await.unwrap();

    let removed = svc.cleanup(Some(&UserId::new("admin")), 90).await.unwrap();
    assert_eq!(removed, 1);

    let entries = store.entries();
    assert!(entries.iter().all(|e| e.id != old.id));
    let last = entries.last().unwrap();
    assert_eq!(last.action, "audit_cleanup");
    assert_eq!(last.details["deleted"], 1);
}
