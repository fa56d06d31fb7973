//! Persistence seam for role assignments and role grants.
//!
//! Inserts report duplicates as `Conflict`; the uniqueness of `(user, role)`
//! and `(role, permission)` is enforced by the store, not by callers.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};

use super::models::{Permission, RoleCount, RoleId, RolePermission, UserId, UserRole};
use crate::error::{AccessError, Result};

#[async_trait]
pub trait RbacStore: Send + Sync {
    async fn find_user_role(&self, user: &UserId, role: &RoleId) -> Result<Option<UserRole>>;
    async fn insert_user_role(&self, row: &UserRole) -> Result<()>;
    /// Returns the number of rows removed.
    async fn delete_user_role(&self, user: &UserId, role: &RoleId) -> Result<u64>;
    async fn list_user_roles(&self, user: &UserId) -> Result<Vec<RoleId>>;
    async fn count_user_role(&self, user: &UserId, role: &RoleId) -> Result<u64>;
    async fn role_distribution(&self) -> Result<Vec<RoleCount>>;

    async fn find_role_permission(&self, role: &RoleId, permission: &Permission) -> Result<Option<RolePermission>>;
    async fn insert_role_permission(&self, row: &RolePermission) -> Result<()>;
    async fn delete_role_permission(&self, role: &RoleId, permission: &Permission) -> Result<u64>;
    async fn list_role_permissions(&self, role: &RoleId) -> Result<Vec<Permission>>;

    /// Whether any role in `roles` is granted `permission` directly.
    async fn any_role_has_permission(&self, roles: &[RoleId], permission: &Permission) -> Result<bool>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-memory store
// ═══════════════════════════════════════════════════════════════════════════════

/// Concurrent in-memory store keyed by the natural unique pairs.
#[derive(Default)]
pub struct InMemoryRbacStore {
    user_roles: DashMap<(UserId, RoleId), UserRole>,
    role_permissions: DashMap<(RoleId, Permission), RolePermission>,
}

impl InMemoryRbacStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RbacStore for InMemoryRbacStore {
    async fn find_user_role(&self, user: &UserId, role: &RoleId) -> Result<Option<UserRole>> {
        Ok(self
            .user_roles
            .get(&(user.clone(), role.clone()))
            .map(|r| r.value().clone()))
    }

    async fn insert_user_role(&self, row: &UserRole) -> Result<()> {
        match self.user_roles.entry((row.user_id.clone(), row.role.clone())) {
            Entry::Occupied(_) => Err(AccessError::conflict(
                "user role",
                format!("{}:{}", row.user_id, row.role),
            )),
            Entry::Vacant(slot) => {
                slot.insert(row.clone());
                Ok(())
            }
        }
    }

    async fn delete_user_role(&self, user: &UserId, role: &RoleId) -> Result<u64> {
        Ok(self
            .user_roles
            .remove(&(user.clone(), role.clone()))
            .map_or(0, |_| 1))
    }

    async fn list_user_roles(&self, user: &UserId) -> Result<Vec<RoleId>> {
        let mut roles: Vec<RoleId> = self
            .user_roles
            .iter()
            .filter(|e| &e.key().0 == user)
            .map(|e| e.key().1.clone())
            .collect();
        roles.sort();
        Ok(roles)
    }

    async fn count_user_role(&self, user: &UserId, role: &RoleId) -> Result<u64> {
        Ok(u64::from(self.user_roles.contains_key(&(user.clone(), role.clone()))))
    }

    async fn role_distribution(&self) -> Result<Vec<RoleCount>> {
        let mut counts: BTreeMap<RoleId, u64> = BTreeMap::new();
        for entry in self.user_roles.iter() {
            *counts.entry(entry.key().1.clone()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(role, count)| RoleCount { role, count })
            .collect())
    }

    async fn find_role_permission(&self, role: &RoleId, permission: &Permission) -> Result<Option<RolePermission>> {
        Ok(self
            .role_permissions
            .get(&(role.clone(), permission.clone()))
            .map(|r| r.value().clone()))
    }

    async fn insert_role_permission(&self, row: &RolePermission) -> Result<()> {
        match self.role_permissions.entry((row.role.clone(), row.permission.clone())) {
            Entry::Occupied(_) => Err(AccessError::conflict(
                "role permission",
                format!("{}:{}", row.role, row.permission),
            )),
            Entry::Vacant(slot) => {
                slot.insert(row.clone());
                Ok(())
            }
        }
    }

    async fn delete_role_permission(&self, role: &RoleId, permission: &Permission) -> Result<u64> {
        Ok(self
            .role_permissions
            .remove(&(role.clone(), permission.clone()))
            .map_or(0, |_| 1))
    }

    async fn list_role_permissions(&self, role: &RoleId) -> Result<Vec<Permission>> {
        let permissions: BTreeSet<Permission> = self
            .role_permissions
            .iter()
            .filter(|e| &e.key().0 == role)
            .map(|e| e.key().1.clone())
            .collect();
        Ok(permissions.into_iter().collect())
    }

    async fn any_role_has_permission(&self, roles: &[RoleId], permission: &Permission) -> Result<bool> {
        Ok(roles
            .iter()
            .any(|role| self.role_permissions.contains_key(&(role.clone(), permission.clone()))))
    }
}
