//! Unified logout for JWT and OIDC sessions.
//!
//! Every branch records an audit entry before it returns, whether it
//! succeeded or not.

use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use super::blacklist::{token_hash, TokenBlacklist};
use super::dto::{BatchLogoutSummary, LogoutMethod, LogoutRequest, LogoutResponse, LogoutStats};
use super::oidc::OidcClient;
use crate::audit::{AuditAction, AuditEvent, AuditTrail};
use crate::config::{BlacklistConfig, OidcConfig};
use crate::error::{AccessError, Result};
use crate::rbac::models::UserId;
use crate::telemetry::AccessMetrics;

/// Resource recorded for logout audit entries.
pub const LOGOUT_RESOURCE: &str = "POST /api/v1/auth/logout";

#[derive(Debug, Clone, Default)]
struct ClientInfo {
    ip_address: Option<String>,
    user_agent: Option<String>,
}

pub struct LogoutService {
    blacklist: TokenBlacklist,
    oidc: Option<Arc<dyn OidcClient>>,
    audit: AuditTrail,
    token_max_lifetime: Duration,
    oidc_timeout: Duration,
}

impl LogoutService {
    pub fn new(blacklist: TokenBlacklist, audit: AuditTrail, config: &BlacklistConfig) -> Self {
        Self {
            blacklist,
            oidc: None,
            audit,
            token_max_lifetime: config.token_max_lifetime,
            oidc_timeout: OidcConfig::default().request_timeout,
        }
    }

    pub fn with_oidc(mut self, client: Arc<dyn OidcClient>, config: &OidcConfig) -> Self {
        self.oidc = Some(client);
        self.oidc_timeout = config.request_timeout;
        self
    }

    pub fn blacklist(&self) -> &TokenBlacklist {
        &self.blacklist
    }

    async fn audit(&self, user: &UserId, action: AuditAction, details: Value, success: bool, client: &ClientInfo) {
        self.audit
            .record(
                AuditEvent::new(action, LOGOUT_RESOURCE)
                    .user(user)
                    .details(details)
                    .client(client.ip_address.clone(), client.user_agent.clone())
                    .success(success),
            )
            .await;
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.oidc_timeout, call).await {
            Ok(result) => result,
            Err(elapsed) => Err(AccessError::from(elapsed)),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entry points
    // ─────────────────────────────────────────────────────────────────────────

    /// JWT logout shorthand.
    pub async fn logout(&self, user: &UserId, token: &str) -> Result<LogoutResponse> {
        self.logout_with_context(LogoutRequest::jwt(user.clone(), token)).await
    }

    /// Dispatch on the request's auth type. Unknown types fail `Validation`.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, auth_type = %request.auth_type))]
    pub async fn logout_with_context(&self, request: LogoutRequest) -> Result<LogoutResponse> {
        let client = ClientInfo {
            ip_address: request.ip_address.clone(),
            user_agent: request.user_agent.clone(),
        };

        let method = match request.method() {
            Ok(method) => method,
            Err(e) => {
                AccessMetrics::logout("invalid", "rejected");
                self.audit(
                    &request.user_id,
                    AuditAction::UserLogout,
                    json!({ "auth_type": request.auth_type, "error": e.user_message() }),
                    false,
                    &client,
                )
                .await;
                return Err(e);
            }
        };

        self.dispatch(&request.user_id, method, &client).await
    }

    pub async fn logout_with_method(&self, user: &UserId, method: LogoutMethod) -> Result<LogoutResponse> {
        self.dispatch(user, method, &ClientInfo::default()).await
    }

    async fn dispatch(&self, user: &UserId, method: LogoutMethod, client: &ClientInfo) -> Result<LogoutResponse> {
        match method {
            LogoutMethod::Jwt { token } => self.jwt_logout(user, &token, client).await,
            LogoutMethod::Oidc {
                provider,
                id_token,
                post_logout_redirect_uri,
            } => {
                self.oidc_logout(
                    user,
                    &provider,
                    id_token.as_deref(),
                    post_logout_redirect_uri,
                    client,
                )
                .await
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // JWT
    // ─────────────────────────────────────────────────────────────────────────

    async fn jwt_logout(&self, user: &UserId, token: &str, client: &ClientInfo) -> Result<LogoutResponse> {
        let hash = token_hash(token);
        let outcome = self.blacklist.add(token, self.token_max_lifetime).await;

        let mut details = json!({ "auth_type": "jwt", "token_hash": hash });
        if let Err(e) = &outcome {
            details["error"] = json!(e.user_message());
        }
        self.audit(user, AuditAction::UserLogout, details, outcome.is_ok(), client)
            .await;

        match outcome {
            Ok(()) => {
                AccessMetrics::logout("jwt", "ok");
                info!(user_id = %user, "JWT logout successful");
                Ok(LogoutResponse {
                    success: true,
                    message: "JWT logout successful".to_string(),
                    logout_url: None,
                    post_logout_redirect_uri: None,
                })
            }
            Err(e) => {
                AccessMetrics::logout("jwt", "error");
                error!(user_id = %user, error = %e, "Failed to blacklist token");
                Err(e)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // OIDC
    // ─────────────────────────────────────────────────────────────────────────

    async fn oidc_logout(
        &self,
        user: &UserId,
        provider: &str,
        id_token: Option<&str>,
        post_logout_redirect_uri: Option<String>,
        client: &ClientInfo,
    ) -> Result<LogoutResponse> {
        let oidc = match &self.oidc {
            Some(oidc) => oidc.clone(),
            None => {
                let e = AccessError::validation("OIDC logout is not configured");
                AccessMetrics::logout("oidc", "rejected");
                self.audit(
                    user,
                    AuditAction::OidcLogout,
                    json!({ "provider": provider, "error": e.user_message() }),
                    false,
                    client,
                )
                .await;
                return Err(e);
            }
        };

        let redirect = post_logout_redirect_uri.as_deref();

        if let Err(e) = self
            .bounded(oidc.end_session(user, provider, id_token, redirect))
            .await
        {
            AccessMetrics::logout("oidc", "error");
            error!(user_id = %user, provider, error = %e, "OIDC end-session failed");
            self.audit(
                user,
                AuditAction::OidcLogout,
                json!({ "auth_type": "oidc", "provider": provider, "error": e.user_message() }),
                false,
                client,
            )
            .await;
            return Err(e);
        }

        let mut details = json!({ "auth_type": "oidc", "provider": provider });
        let logout_url = match self.bounded(oidc.logout_url(provider, redirect)).await {
            Ok(url) => Some(url),
            Err(e) => {
                AccessMetrics::oidc_logout_url_failure(provider);
                warn!(user_id = %user, provider, error = %e, "Failed to build OIDC logout URL");
                details["logout_url_error"] = json!(e.user_message());
                None
            }
        };
        details["logout_url_generated"] = json!(logout_url.is_some());

        self.audit(user, AuditAction::OidcLogout, details, true, client).await;
        AccessMetrics::logout("oidc", "ok");
        info!(user_id = %user, provider, "OIDC logout successful");

        Ok(LogoutResponse {
            success: true,
            message: "OIDC logout successful".to_string(),
            logout_url,
            post_logout_redirect_uri,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Batch and maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Blacklist every token in order, continuing past failures.
    ///
    /// On any failure the error carries the failure count and the failed
    /// positions; tokens that succeeded stay blacklisted.
    #[instrument(skip(self, tokens), fields(user_id = %user, count = tokens.len()))]
    pub async fn batch_logout(&self, user: &UserId, tokens: &[String]) -> Result<BatchLogoutSummary> {
        let client = ClientInfo::default();
        let mut failed = Vec::new();

        for (index, token) in tokens.iter().enumerate() {
            if self.jwt_logout(user, token, &client).await.is_err() {
                failed.push(index);
            }
        }

        self.audit(
            user,
            AuditAction::BatchLogout,
            json!({
                "total": tokens.len(),
                "failed": failed.len(),
                "failed_indices": failed,
            }),
            failed.is_empty(),
            &client,
        )
        .await;

        if !failed.is_empty() {
            warn!(failed = failed.len(), total = tokens.len(), "Batch logout incomplete");
            return Err(AccessError::batch_logout_failed(failed, tokens.len()));
        }

        info!(total = tokens.len(), "Batch logout successful");
        Ok(BatchLogoutSummary {
            total: tokens.len(),
            blacklisted: tokens.len(),
        })
    }

    /// Lift the revocation of `token`. Returns whether it was blacklisted.
    #[instrument(skip(self, token), fields(actor = %actor))]
    pub async fn remove_from_blacklist(&self, actor: &UserId, token: &str) -> Result<bool> {
        let hash = token_hash(token);
        let outcome = self.blacklist.remove(token).await;

        let mut details = json!({ "token_hash": hash });
        match &outcome {
            Ok(removed) => details["removed"] = json!(removed),
            Err(e) => details["error"] = json!(e.user_message()),
        }
        self.audit
            .record(
                AuditEvent::new(AuditAction::TokenUnblacklist, "token_blacklist")
                    .user(actor)
                    .details(details)
                    .success(outcome.is_ok()),
            )
            .await;

        match &outcome {
            Ok(removed) => info!(token_hash = %hash, removed = *removed, "Token removed from blacklist"),
            Err(e) => error!(token_hash = %hash, error = %e, "Failed to remove token from blacklist"),
        }
        outcome
    }

    pub async fn logout_stats(&self) -> Result<LogoutStats> {
        Ok(LogoutStats {
            blacklist: self.blacklist.stats().await?,
            token_max_lifetime_secs: self.token_max_lifetime.as_secs(),
        })
    }

    /// Sweep expired blacklist entries and record the sweep.
    pub async fn cleanup_expired_tokens(&self, actor: Option<&UserId>) -> Result<u64> {
        let outcome = self.blacklist.cleanup_expired().await;

        let details = match &outcome {
            Ok(purged) => json!({ "purged": purged }),
            Err(e) => json!({ "error": e.user_message() }),
        };
        let mut event = AuditEvent::new(AuditAction::TokenCleanup, "token_blacklist")
            .details(details)
            .success(outcome.is_ok());
        if let Some(actor) = actor {
            event = event.user(actor);
        }
        self.audit.record(event).await;

        if let Err(e) = &outcome {
            error!(error = %e, "Failed to clean up expired tokens");
        }
        outcome
    }
}
