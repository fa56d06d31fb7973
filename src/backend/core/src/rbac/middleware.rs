//! Axum authorization gate backed by the RBAC engine.
//!
//! Authentication happens upstream: something must insert an
//! [`AuthenticatedUser`] into the request extensions before this layer runs.

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::warn;

use super::models::{Permission, UserId};
use super::service::RbacService;
use crate::error::{AccessError, ErrorCode, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// Request context
// ═══════════════════════════════════════════════════════════════════════════════

/// Identity established by the authentication layer.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

impl AuthenticatedUser {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Inserted by [`RequirePermissionService`] after a successful check.
#[derive(Debug, Clone)]
pub struct RbacContext {
    pub user_id: UserId,
    pub checked_permission: Permission,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RbacContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        parts.extensions.get::<RbacContext>().cloned().ok_or_else(|| {
            AccessError::internal("RbacContext extracted on a route without RequirePermissionLayer").into_response()
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer
// ═══════════════════════════════════════════════════════════════════════════════

/// Layer that rejects requests whose user lacks a permission.
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/api/v1/audit/export", get(export_audit))
///     .layer(RequirePermissionLayer::new(rbac.clone(), "audit:export")?);
/// ```
#[derive(Clone)]
pub struct RequirePermissionLayer {
    rbac: Arc<RbacService>,
    permission: Permission,
}

impl RequirePermissionLayer {
    /// Fails with `Validation` if `permission` is not `resource:action`.
    pub fn new(rbac: Arc<RbacService>, permission: &str) -> Result<Self> {
        Ok(Self {
            rbac,
            permission: Permission::parse_strict(permission)?,
        })
    }

    pub fn from_permission(rbac: Arc<RbacService>, permission: Permission) -> Self {
        Self { rbac, permission }
    }
}

impl<S> Layer<S> for RequirePermissionLayer {
    type Service = RequirePermissionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePermissionService {
            inner,
            rbac: self.rbac.clone(),
            permission: self.permission.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Service
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct RequirePermissionService<S> {
    inner: S,
    rbac: Arc<RbacService>,
    permission: Permission,
}

impl<S> Service<Request<Body>> for RequirePermissionService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let rbac = self.rbac.clone();
        let permission = self.permission.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let user_id = match request.extensions().get::<AuthenticatedUser>() {
                Some(user) => user.user_id.clone(),
                None => {
                    return Ok(AccessError::new(ErrorCode::Unauthorized, "Authentication required").into_response())
                }
            };

            match rbac.check_permission(&user_id, &permission).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(user_id = %user_id, permission = %permission, "Permission denied");
                    let denied = AccessError::new(ErrorCode::Forbidden, format!("missing permission {}", permission))
                        .with_context("permission", permission.as_string());
                    return Ok(denied.into_response());
                }
                Err(e) => return Ok(e.into_response()),
            }

            request.extensions_mut().insert(RbacContext {
                user_id,
                checked_permission: permission,
            });

            inner.call(request).await
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditTrail, InMemoryAuditStore};
    use crate::rbac::models::RoleId;
    use crate::rbac::roles::RbacConfig;
    use crate::rbac::store::InMemoryRbacStore;
    use axum::{http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    async fn rbac() -> Arc<RbacService> {
        let svc = RbacService::new(
            Arc::new(InMemoryRbacStore::new()),
            RbacConfig::defaults(),
            AuditTrail::new(Arc::new(InMemoryAuditStore::new())),
        )
        .await
        .unwrap();
        svc.assign_role(&UserId::new("alice"), &RoleId::new("viewer"))
            .await
            .unwrap();
        Arc::new(svc)
    }

    async fn handler(ctx: RbacContext) -> String {
        format!("{} ok {}", ctx.user_id, ctx.checked_permission)
    }

    fn request(user: Option<&str>) -> Request<Body> {
        let mut req = Request::builder().uri("/").body(Body::empty()).unwrap();
        if let Some(user) = user {
            req.extensions_mut().insert(AuthenticatedUser::new(user));
        }
        req
    }

    async fn app(permission: &str) -> Router {
        Router::new()
            .route("/", get(handler))
            .layer(RequirePermissionLayer::new(rbac().await, permission).unwrap())
    }

    #[tokio::test]
    async fn test_allowed_request_passes() {
        let resp = app("workspace:read").await.oneshot(request(Some("alice"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_denied_request_is_forbidden() {
        let resp = app("workspace:delete").await.oneshot(request(Some("alice"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_anonymous_request_is_unauthorized() {
        let resp = app("workspace:read").await.oneshot(request(None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_context_without_layer_is_internal_error() {
        let app = Router::new().route("/", get(handler));
        let resp = app.oneshot(request(Some("alice"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_malformed_permission_rejected() {
        assert!(RequirePermissionLayer::new(rbac().await, "workspace").is_err());
    }
}
