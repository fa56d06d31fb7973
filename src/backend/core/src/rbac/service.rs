//! RBAC engine: role assignment, role grants, and permission resolution.
//!
//! Every check reads the store. The only precomputed state is the role
//! hierarchy, which is immutable for the life of the service.

use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::hierarchy::RoleHierarchy;
use super::models::{Permission, RoleCount, RoleId, RolePermission, UserId, UserRole};
use super::roles::RbacConfig;
use super::store::RbacStore;
use crate::audit::{AuditAction, AuditEvent, AuditTrail};
use crate::error::{AccessError, Result};
use crate::telemetry::AccessMetrics;

pub struct RbacService {
    store: Arc<dyn RbacStore>,
    hierarchy: RoleHierarchy,
    config: RbacConfig,
    audit: AuditTrail,
    record_checks: bool,
}

impl RbacService {
    /// Build the hierarchy and seed default grants.
    ///
    /// Fails only if the inheritance table has a cycle. Seeding skips rows
    /// that already exist and logs rows it cannot write.
    pub async fn new(store: Arc<dyn RbacStore>, config: RbacConfig, audit: AuditTrail) -> Result<Self> {
        let hierarchy = RoleHierarchy::build(&config.hierarchy)?;

        let service = Self {
            store,
            hierarchy,
            config,
            audit,
            record_checks: true,
        };
        service.bootstrap().await;
        Ok(service)
    }

    /// Toggle audit entries for permission checks.
    pub fn with_check_auditing(mut self, enabled: bool) -> Self {
        self.record_checks = enabled;
        self
    }

    pub fn hierarchy(&self) -> &RoleHierarchy {
        &self.hierarchy
    }

    pub fn config(&self) -> &RbacConfig {
        &self.config
    }

    async fn bootstrap(&self) {
        let mut seeded = 0usize;
        let mut failed = 0usize;

        for (role, permissions) in &self.config.default_permissions {
            for permission in permissions {
                match self.store.find_role_permission(role, permission).await {
                    Ok(Some(_)) => continue,
                    Ok(None) => {}
                    Err(e) => {
                        failed += 1;
                        warn!(role = %role, permission = %permission, error = %e, "Failed to look up default grant");
                        continue;
                    }
                }

                match self
                    .store
                    .insert_role_permission(&RolePermission::new(role.clone(), permission.clone()))
                    .await
                {
                    Ok(()) => seeded += 1,
                    Err(e) => {
                        failed += 1;
                        warn!(role = %role, permission = %permission, error = %e, "Failed to seed default grant");
                    }
                }
            }
        }

        info!(
            seeded,
            failed,
            total = self.config.default_grant_count(),
            "RBAC default permissions initialized"
        );
    }

    async fn audit_mutation<T>(
        &self,
        user: Option<&UserId>,
        action: AuditAction,
        resource: String,
        details: serde_json::Value,
        outcome: &Result<T>,
    ) {
        let (details, success) = match outcome {
            Ok(_) => (details, true),
            Err(e) => {
                let mut details = details;
                if let Some(map) = details.as_object_mut() {
                    map.insert("error".to_string(), json!(e.user_message()));
                }
                (details, false)
            }
        };

        let mut event = AuditEvent::new(action, resource).details(details).success(success);
        if let Some(user) = user {
            event = event.user(user);
        }
        self.audit.record(event).await;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Role assignment
    // ─────────────────────────────────────────────────────────────────────────

    /// Assign `role` to `user`. Fails with `Conflict` if already assigned.
    #[instrument(skip(self), fields(user = %user, role = %role))]
    pub async fn assign_role(&self, user: &UserId, role: &RoleId) -> Result<()> {
        let outcome = async {
            if self.store.find_user_role(user, role).await?.is_some() {
                return Err(AccessError::conflict("user role", format!("{}:{}", user, role)));
            }
            self.store
                .insert_user_role(&UserRole::new(user.clone(), role.clone()))
                .await
        }
        .await;

        AccessMetrics::role_mutation("assign", if outcome.is_ok() { "ok" } else { "error" });
        self.audit_mutation(
            Some(user),
            AuditAction::RoleAssign,
            format!("role:{}", role),
            json!({ "role": role }),
            &outcome,
        )
        .await;

        if outcome.is_ok() {
            info!("Role assigned");
        }
        outcome
    }

    /// Remove `role` from `user`. Fails with `NotFound` if not assigned.
    #[instrument(skip(self), fields(user = %user, role = %role))]
    pub async fn remove_role(&self, user: &UserId, role: &RoleId) -> Result<()> {
        let outcome = async {
            match self.store.delete_user_role(user, role).await? {
                0 => Err(AccessError::not_found("user role", format!("{}:{}", user, role))),
                _ => Ok(()),
            }
        }
        .await;

        AccessMetrics::role_mutation("remove", if outcome.is_ok() { "ok" } else { "error" });
        self.audit_mutation(
            Some(user),
            AuditAction::RoleRemove,
            format!("role:{}", role),
            json!({ "role": role }),
            &outcome,
        )
        .await;

        if outcome.is_ok() {
            info!("Role removed");
        }
        outcome
    }

    /// Direct assignment only.
    pub async fn has_role(&self, user: &UserId, role: &RoleId) -> Result<bool> {
        Ok(self.store.count_user_role(user, role).await? > 0)
    }

    /// Directly assigned roles.
    pub async fn user_roles(&self, user: &UserId) -> Result<Vec<RoleId>> {
        self.store.list_user_roles(user).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Role grants
    // ─────────────────────────────────────────────────────────────────────────

    #[instrument(skip(self), fields(role = %role, permission = %permission))]
    pub async fn grant_permission(&self, role: &RoleId, permission: &Permission) -> Result<()> {
        let outcome = async {
            if self.store.find_role_permission(role, permission).await?.is_some() {
                return Err(AccessError::conflict("role permission", format!("{}:{}", role, permission)));
            }
            self.store
                .insert_role_permission(&RolePermission::new(role.clone(), permission.clone()))
                .await
        }
        .await;

        AccessMetrics::role_mutation("grant", if outcome.is_ok() { "ok" } else { "error" });
        self.audit_mutation(
            None,
            AuditAction::PermissionGrant,
            format!("role:{}", role),
            json!({ "role": role, "permission": permission }),
            &outcome,
        )
        .await;

        outcome
    }

    #[instrument(skip(self), fields(role = %role, permission = %permission))]
    pub async fn revoke_permission(&self, role: &RoleId, permission: &Permission) -> Result<()> {
        let outcome = async {
            match self.store.delete_role_permission(role, permission).await? {
                0 => Err(AccessError::not_found("role permission", format!("{}:{}", role, permission))),
                _ => Ok(()),
            }
        }
        .await;

        AccessMetrics::role_mutation("revoke", if outcome.is_ok() { "ok" } else { "error" });
        self.audit_mutation(
            None,
            AuditAction::PermissionRevoke,
            format!("role:{}", role),
            json!({ "role": role, "permission": permission }),
            &outcome,
        )
        .await;

        outcome
    }

    /// Direct grants of `role`, excluding anything inherited.
    pub async fn role_permissions(&self, role: &RoleId) -> Result<Vec<Permission>> {
        self.store.list_role_permissions(role).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resolution
    // ─────────────────────────────────────────────────────────────────────────

    /// Held roles plus everything they inherit.
    async fn effective_roles(&self, user: &UserId) -> Result<Vec<RoleId>> {
        let held = self.store.list_user_roles(user).await?;
        let expanded: BTreeSet<RoleId> = held
            .iter()
            .flat_map(|role| self.hierarchy.expand(role))
            .collect();
        Ok(expanded.into_iter().collect())
    }

    /// Audit a check outcome. A failed lookup is recorded as a denial with the error.
    async fn record_check(&self, user: &UserId, resource: String, details: serde_json::Value, outcome: &Result<bool>) {
        if !self.record_checks {
            return;
        }
        let mut details = details;
        let success = match outcome {
            Ok(allowed) => {
                details["allowed"] = json!(allowed);
                *allowed
            }
            Err(e) => {
                details["error"] = json!(e.user_message());
                false
            }
        };
        self.audit
            .record(
                AuditEvent::new(AuditAction::PermissionCheck, resource)
                    .user(user)
                    .details(details)
                    .success(success),
            )
            .await;
    }

    /// Whether `user` holds `permission` through any direct or inherited role.
    #[instrument(skip(self), fields(user = %user, permission = %permission))]
    pub async fn check_permission(&self, user: &UserId, permission: &Permission) -> Result<bool> {
        let _timer = AccessMetrics::time_permission_check();
        let outcome = async {
            let roles = self.effective_roles(user).await?;
            self.store.any_role_has_permission(&roles, permission).await
        }
        .await;

        match &outcome {
            Ok(allowed) => {
                AccessMetrics::permission_check(&permission.as_string(), *allowed);
                debug!(allowed = *allowed, "Permission check");
            }
            Err(e) => warn!(error = %e, "Permission check failed"),
        }

        self.record_check(
            user,
            format!("permission:{}", permission),
            json!({ "permission": permission }),
            &outcome,
        )
        .await;
        outcome
    }

    /// True on the first permission the user holds.
    #[instrument(skip(self, permissions), fields(user = %user, count = permissions.len()))]
    pub async fn check_any(&self, user: &UserId, permissions: &[Permission]) -> Result<bool> {
        let _timer = AccessMetrics::time_permission_check();
        let mut matched = None;
        let outcome = async {
            let roles = self.effective_roles(user).await?;
            for permission in permissions {
                if self.store.any_role_has_permission(&roles, permission).await? {
                    matched = Some(permission.clone());
                    return Ok(true);
                }
            }
            Ok::<_, AccessError>(false)
        }
        .await;

        if let Err(e) = &outcome {
            warn!(error = %e, "Permission check failed");
        }
        self.record_check(
            user,
            "permission:any".to_string(),
            json!({ "permissions": permissions, "matched": matched }),
            &outcome,
        )
        .await;
        outcome
    }

    /// False on the first permission the user lacks. An empty list is vacuously true.
    #[instrument(skip(self, permissions), fields(user = %user, count = permissions.len()))]
    pub async fn check_all(&self, user: &UserId, permissions: &[Permission]) -> Result<bool> {
        let _timer = AccessMetrics::time_permission_check();
        let mut missing = None;
        let outcome = async {
            let roles = self.effective_roles(user).await?;
            for permission in permissions {
                if !self.store.any_role_has_permission(&roles, permission).await? {
                    missing = Some(permission.clone());
                    return Ok(false);
                }
            }
            Ok::<_, AccessError>(true)
        }
        .await;

        if let Err(e) = &outcome {
            warn!(error = %e, "Permission check failed");
        }
        self.record_check(
            user,
            "permission:all".to_string(),
            json!({ "permissions": permissions, "missing": missing }),
            &outcome,
        )
        .await;
        outcome
    }

    /// Deduplicated union of grants across held and inherited roles.
    pub async fn user_effective_permissions(&self, user: &UserId) -> Result<BTreeSet<Permission>> {
        let mut permissions = BTreeSet::new();
        for role in self.effective_roles(user).await? {
            permissions.extend(self.store.list_role_permissions(&role).await?);
        }
        Ok(permissions)
    }

    /// Transitive closure of `role`, excluding itself.
    pub fn inherited_roles(&self, role: &RoleId) -> BTreeSet<RoleId> {
        self.hierarchy.inherited_roles(role)
    }

    /// Whether `user` holds `role` directly or through a role that inherits it.
    pub async fn has_inherited_role(&self, user: &UserId, role: &RoleId) -> Result<bool> {
        let held = self.store.list_user_roles(user).await?;
        Ok(held.iter().any(|h| self.hierarchy.grants(h, role)))
    }

    pub async fn role_distribution(&self) -> Result<Vec<RoleCount>> {
        self.store.role_distribution().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditStore;
    use crate::error::{ErrorCode, ErrorKind};
    use crate::rbac::store::InMemoryRbacStore;

    async fn service() -> (RbacService, Arc<InMemoryAuditStore>) {
        let audit_store = Arc::new(InMemoryAuditStore::new());
        let svc = RbacService::new(
            Arc::new(InMemoryRbacStore::new()),
            RbacConfig::defaults(),
            AuditTrail::new(audit_store.clone()),
        )
        .await
        .unwrap();
        (svc, audit_store)
    }

    #[tokio::test]
    async fn test_bootstrap_seeds_defaults() {
        let (svc, _) = service().await;
        assert_eq!(svc.role_permissions(&RoleId::new("admin")).await.unwrap().len(), 18);
        assert_eq!(svc.role_permissions(&RoleId::new("viewer")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let store = Arc::new(InMemoryRbacStore::new());
        let trail = AuditTrail::new(Arc::new(InMemoryAuditStore::new()));
        RbacService::new(store.clone(), RbacConfig::defaults(), trail.clone())
            .await
            .unwrap();
        let svc = RbacService::new(store, RbacConfig::defaults(), trail).await.unwrap();
        assert_eq!(svc.role_permissions(&RoleId::new("user")).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_cycle_fails_construction() {
        let config = RbacConfig::empty().with_role("a", ["b"]).with_role("b", ["a"]);
        let err = RbacService::new(
            Arc::new(InMemoryRbacStore::new()),
            config,
            AuditTrail::new(Arc::new(InMemoryAuditStore::new())),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.code(), ErrorCode::RoleHierarchyCycle);
    }

    #[tokio::test]
    async fn test_inherited_permission_via_default_table() {
        let (svc, _) = service().await;
        let alice = UserId::new("alice");
        svc.assign_role(&alice, &RoleId::new("user")).await.unwrap();

        assert!(svc.check_permission(&alice, &Permission::new("workspace", "create")).await.unwrap());
        assert!(!svc.check_permission(&alice, &Permission::new("user", "manage")).await.unwrap());
        assert!(svc.has_inherited_role(&alice, &RoleId::new("viewer")).await.unwrap());
        assert!(!svc.has_role(&alice, &RoleId::new("viewer")).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_mutation_is_audited() {
        let (svc, audit) = service().await;
        let bob = UserId::new("bob");
        let err = svc.remove_role(&bob, &RoleId::new("admin")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let entries = audit.entries();
        let last = entries.last().unwrap();
        assert_eq!(last.action, "role_remove");
        assert!(!last.success);
        assert!(last.details["error"].is_string());
    }

    #[tokio::test]
    async fn test_check_auditing_can_be_disabled() {
        let (svc, audit) = service().await;
        let svc = svc.with_check_auditing(false);
        let before = audit.len();
        svc.check_permission(&UserId::new("x"), &Permission::new("workspace", "read"))
            .await
            .unwrap();
        assert_eq!(audit.len(), before);
    }

    #[tokio::test]
    async fn test_check_all_empty_is_true() {
        let (svc, _) = service().await;
        let nobody = UserId::new("nobody");
        assert!(svc.check_all(&nobody, &[]).await.unwrap());
        assert!(!svc.check_any(&nobody, &[]).await.unwrap());
    }
}
