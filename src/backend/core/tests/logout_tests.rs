//! Integration tests for the unified logout service.

use access_core::audit::{AuditTrail, InMemoryAuditStore};
use access_core::cache::{CacheBackend, CacheStats, InMemoryBackend};
use access_core::config::{BlacklistConfig, OidcConfig, OidcProviderConfig};
use access_core::error::{AccessError, ErrorKind, Result};
use access_core::rbac::UserId;
use access_core::session::{
    token_hash, HttpOidcClient, LogoutMethod, LogoutRequest, LogoutService, OidcClient, TokenBlacklist,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Test Utilities
// ============================================================================

/// Delegates to an in-memory backend but refuses writes and deletes on one key.
struct FlakyBackend {
    inner: InMemoryBackend,
    failing_key: String,
}

#[async_trait]
impl CacheBackend for FlakyBackend {
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        if key == self.failing_key {
            return Err(AccessError::internal("simulated cache outage"));
        }
        self.inner.set(key, value, ttl).await
    }
    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }
    async fn delete(&self, key: &str) -> Result<bool> {
        if key == self.failing_key {
            return Err(AccessError::internal("simulated cache outage"));
        }
        self.inner.delete(key).await
    }
    async fn count_prefix(&self, prefix: &str) -> Result<u64> {
        self.inner.count_prefix(prefix).await
    }
    async fn purge_expired(&self, prefix: &str) -> Result<u64> {
        self.inner.purge_expired(prefix).await
    }
    async fn stats(&self) -> Result<CacheStats> {
        self.inner.stats().await
    }
    fn name(&self) -> &'static str {
        "flaky"
    }
}

/// OIDC client whose end-session succeeds and whose URL builder can fail.
struct StubOidc {
    end_session_fails: bool,
    url_fails: bool,
}

#[async_trait]
impl OidcClient for StubOidc {
    async fn end_session(&self, _: &UserId, provider: &str, _: Option<&str>, _: Option<&str>) -> Result<()> {
        if self.end_session_fails {
            return Err(AccessError::unavailable(provider.to_string(), "connection refused"));
        }
        Ok(())
    }

    async fn logout_url(&self, provider: &str, _: Option<&str>) -> Result<String> {
        if self.url_fails {
            return Err(AccessError::unavailable(provider.to_string(), "discovery failed"));
        }
        Ok(format!("https://{}/logout", provider))
    }
}

/// OIDC client whose end-session never completes.
struct HangingOidc;

#[async_trait]
impl OidcClient for HangingOidc {
    async fn end_session(&self, _: &UserId, _: &str, _: Option<&str>, _: Option<&str>) -> Result<()> {
        std::future::pending().await
    }

    async fn logout_url(&self, provider: &str, _: Option<&str>) -> Result<String> {
        Ok(format!("https://{}/logout", provider))
    }
}

fn service(backend: Arc<dyn CacheBackend>) -> (LogoutService, Arc<InMemoryAuditStore>) {
    let audit = Arc::new(InMemoryAuditStore::new());
    let config = BlacklistConfig::default();
    let blacklist = TokenBlacklist::new(backend, &config);
    (
        LogoutService::new(blacklist, AuditTrail::new(audit.clone()), &config),
        audit,
    )
}

fn with_stub(svc: LogoutService, stub: StubOidc) -> LogoutService {
    svc.with_oidc(Arc::new(stub), &OidcConfig::default())
}

// ============================================================================
// JWT
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_jwt_blacklist_expires_after_token_lifetime() {
    let (svc, _) = service(Arc::new(InMemoryBackend::new()));
    let u = UserId::new("U");

    let resp = svc.logout(&u, "abc.def.ghi").await.unwrap();
    assert!(resp.success);
    assert!(svc.blacklist().is_blacklisted("abc.def.ghi").await.unwrap());

    tokio::time::advance(Duration::from_secs(15 * 60 - 1)).await;
    assert!(svc.blacklist().is_blacklisted("abc.def.ghi").await.unwrap());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(!svc.blacklist().is_blacklisted("abc.def.ghi").await.unwrap());
}

#[tokio::test]
async fn test_repeated_logout_is_idempotent() {
    let (svc, _) = service(Arc::new(InMemoryBackend::new()));
    let u = UserId::new("U");
    svc.logout(&u, "tok").await.unwrap();
    svc.logout(&u, "tok").await.unwrap();
    assert_eq!(svc.logout_stats().await.unwrap().blacklist.total_blacklisted_tokens, 1);
}

#[tokio::test]
async fn test_unknown_auth_type_is_validation() {
    let (svc, audit) = service(Arc::new(InMemoryBackend::new()));
    let mut req = LogoutRequest::jwt("U", "tok");
    req.auth_type = "saml".to_string();

    let err = svc.logout_with_context(req).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(audit.len(), 1);
    assert!(!audit.entries()[0].success);
}

#[tokio::test]
async fn test_typed_method_entry_point() {
    let (svc, audit) = service(Arc::new(InMemoryBackend::new()));
    let u = UserId::new("U");

    let resp = svc
        .logout_with_method(&u, LogoutMethod::Jwt { token: "typed.tok.en".to_string() })
        .await
        .unwrap();

    assert_eq!(resp.message, "JWT logout successful");
    assert!(svc.blacklist().is_blacklisted("typed.tok.en").await.unwrap());
    assert_eq!(audit.entries()[0].details["token_hash"], token_hash("typed.tok.en"));
}

// ============================================================================
// Blacklist administration
// ============================================================================

#[tokio::test]
async fn test_remove_from_blacklist_is_audited() {
    let (svc, audit) = service(Arc::new(InMemoryBackend::new()));
    let u = UserId::new("U");
    let admin = UserId::new("admin");
    svc.logout(&u, "abc.def.ghi").await.unwrap();

    assert!(svc.remove_from_blacklist(&admin, "abc.def.ghi").await.unwrap());
    assert!(!svc.blacklist().is_blacklisted("abc.def.ghi").await.unwrap());
    assert!(!svc.remove_from_blacklist(&admin, "abc.def.ghi").await.unwrap());

    let entries = audit.entries();
    assert_eq!(entries.len(), 3);
    let lifted = &entries[1];
    assert_eq!(lifted.action, "token_unblacklist");
    assert_eq!(lifted.user_id.as_ref(), Some(&admin));
    assert!(lifted.success);
    assert_eq!(lifted.details["token_hash"], token_hash("abc.def.ghi"));
    assert_eq!(lifted.details["removed"], true);
    assert_eq!(entries[2].details["removed"], false);
    assert!(!lifted.details.to_string().contains("abc.def.ghi"));
}

#[tokio::test]
async fn test_failed_blacklist_removal_is_audited() {
    let backend = FlakyBackend {
        inner: InMemoryBackend::new(),
        failing_key: format!("blacklist:{}", token_hash("t2")),
    };
    let (svc, audit) = service(Arc::new(backend));

    assert!(svc.remove_from_blacklist(&UserId::new("admin"), "t2").await.is_err());

    let entry = &audit.entries()[0];
    assert_eq!(entry.action, "token_unblacklist");
    assert!(!entry.success);
    assert!(entry.details["error"].is_string());
}

// ============================================================================
// OIDC
// ============================================================================

#[tokio::test]
async fn test_oidc_logout_returns_url() {
    let (svc, audit) = service(Arc::new(InMemoryBackend::new()));
    let svc = with_stub(svc, StubOidc { end_session_fails: false, url_fails: false });

    let resp = svc
        .logout_with_context(LogoutRequest::oidc("U", "idp.example.com").redirect_to("https://app/bye"))
        .await
        .unwrap();

    assert!(resp.success);
    assert_eq!(resp.logout_url.as_deref(), Some("https://idp.example.com/logout"));
    assert_eq!(resp.post_logout_redirect_uri.as_deref(), Some("https://app/bye"));
    assert_eq!(audit.entries()[0].action, "oidc_logout");
}

#[tokio::test]
async fn test_oidc_url_failure_degrades_to_success() {
    let (svc, audit) = service(Arc::new(InMemoryBackend::new()));
    let svc = with_stub(svc, StubOidc { end_session_fails: false, url_fails: true });

    let resp = svc
        .logout_with_context(LogoutRequest::oidc("U", "keycloak"))
        .await
        .unwrap();

    assert!(resp.success);
    assert!(resp.logout_url.is_none());

    let entry = &audit.entries()[0];
    assert!(entry.success);
    assert!(entry.details["logout_url_error"].is_string());
    assert_eq!(entry.details["logout_url_generated"], false);
}

#[tokio::test]
async fn test_oidc_end_session_failure_is_audited() {
    let (svc, audit) = service(Arc::new(InMemoryBackend::new()));
    let svc = with_stub(svc, StubOidc { end_session_fails: true, url_fails: false });

    let err = svc
        .logout_with_context(LogoutRequest::oidc("U", "keycloak"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert!(!audit.entries()[0].success);
}

#[tokio::test(start_paused = true)]
async fn test_oidc_end_session_is_bounded_by_timeout() {
    let (svc, audit) = service(Arc::new(InMemoryBackend::new()));
    let config = OidcConfig {
        request_timeout: Duration::from_secs(3),
        ..OidcConfig::default()
    };
    let svc = svc.with_oidc(Arc::new(HangingOidc), &config);

    let started = tokio::time::Instant::now();
    let err = svc
        .logout_with_context(LogoutRequest::oidc("U", "keycloak"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert!(started.elapsed() >= Duration::from_secs(3));

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "oidc_logout");
    assert!(!entries[0].success);
}

#[tokio::test]
async fn test_oidc_against_http_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("id_token_hint", "idt-123"))
        .and(query_param("client_id", "portal"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut providers = HashMap::new();
    providers.insert(
        "keycloak".to_string(),
        OidcProviderConfig {
            client_id: "portal".to_string(),
            end_session_endpoint: format!("{}/protocol/openid-connect/logout", server.uri()),
        },
    );
    let oidc_config = OidcConfig {
        request_timeout: Duration::from_secs(2),
        providers,
    };

    let (svc, _) = service(Arc::new(InMemoryBackend::new()));
    let svc = svc.with_oidc(Arc::new(HttpOidcClient::new(&oidc_config).unwrap()), &oidc_config);

    let resp = svc
        .logout_with_context(LogoutRequest::oidc("U", "keycloak").id_token("idt-123"))
        .await
        .unwrap();

    let url = resp.logout_url.unwrap();
    assert!(url.starts_with(&server.uri()));
    assert!(url.ends_with("client_id=portal"));
}

// ============================================================================
// Batch
// ============================================================================

#[tokio::test]
async fn test_batch_logout_reports_partial_failure() {
    let backend = Arc::new(FlakyBackend {
        inner: InMemoryBackend::new(),
        failing_key: format!("blacklist:{}", token_hash("t2")),
    });
    let (svc, audit) = service(backend);
    let u = UserId::new("U");
    let tokens = vec!["t1".to_string(), "t2".to_string(), "t3".to_string()];

    let err = svc.batch_logout(&u, &tokens).await.unwrap_err();
    assert_eq!(err.failed_count(), Some(1));
    assert_eq!(err.user_message(), "batch logout failed for 1 tokens");
    assert_eq!(err.details().context["failed_indices"], serde_json::json!([1]));

    assert!(svc.blacklist().is_blacklisted("t1").await.unwrap());
    assert!(!svc.blacklist().is_blacklisted("t2").await.unwrap());
    assert!(svc.blacklist().is_blacklisted("t3").await.unwrap());

    let summary = audit.entries().into_iter().last().unwrap();
    assert_eq!(summary.action, "batch_logout");
    assert!(!summary.success);
}

#[tokio::test]
async fn test_batch_logout_all_succeed() {
    let (svc, _) = service(Arc::new(InMemoryBackend::new()));
    let tokens: Vec<String> = (0..5).map(|i| format!("tok-{i}")).collect();
    let summary = svc.batch_logout(&UserId::new("U"), &tokens).await.unwrap();
    assert_eq!(summary.blacklisted, 5);
}

// ============================================================================
// Maintenance
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cleanup_removes_expired_entries() {
    let (svc, _) = service(Arc::new(InMemoryBackend::new()));
    let u = UserId::new("U");
    svc.logout(&u, "a").await.unwrap();
    svc.logout(&u, "b").await.unwrap();

    tokio::time::advance(Duration::from_secs(16 * 60)).await;
    assert_eq!(svc.cleanup_expired_tokens(Some(&u)).await.unwrap(), 2);
    assert_eq!(svc.logout_stats().await.unwrap().blacklist.total_blacklisted_tokens, 0);
}
