//! Built-in roles and the default permission table.
//!
//! | Role   | Inherits     | Default permissions                                  |
//! |--------|--------------|------------------------------------------------------|
//! | admin  | user, viewer | every built-in permission                            |
//! | user   | viewer       | create/read/update workspaces, read providers        |
//! | viewer | none         | read workspaces and providers                        |
//!
//! The table is materialized by [`RbacConfig::defaults`] and injected into the
//! service at construction; nothing here is global or mutable.

use std::collections::{BTreeMap, BTreeSet};

use super::models::{Permission, RoleId};

/// Built-in roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredefinedRole {
    Admin,
    User,
    Viewer,
}

impl PredefinedRole {
    /// Get the role identifier string.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Viewer => "viewer",
        }
    }

    pub fn role_id(&self) -> RoleId {
        RoleId::new(self.id())
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Admin => "Full access to users, system settings, audit logs, workspaces and providers",
            Self::User => "Create and manage own workspaces; read providers",
            Self::Viewer => "Read-only access to workspaces and providers",
        }
    }

    /// Roles this role inherits directly.
    pub fn inherits(&self) -> &'static [PredefinedRole] {
        match self {
            Self::Admin => &[Self::User, Self::Viewer],
            Self::User => &[Self::Viewer],
            Self::Viewer => &[],
        }
    }

    /// Default permission grants for this role.
    pub fn permissions(&self) -> BTreeSet<Permission> {
        match self {
            Self::Admin => builtin_permissions().into_iter().collect(),
            Self::User => [
                Permission::new("workspace", "create"),
                Permission::new("workspace", "read"),
                Permission::new("workspace", "update"),
                Permission::new("provider", "read"),
            ]
            .into_iter()
            .collect(),
            Self::Viewer => [
                Permission::new("workspace", "read"),
                Permission::new("provider", "read"),
            ]
            .into_iter()
            .collect(),
        }
    }

    pub fn all() -> [PredefinedRole; 3] {
        [Self::Admin, Self::User, Self::Viewer]
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().into_iter().find(|r| r.id() == id)
    }
}

/// Every permission the platform defines.
pub fn builtin_permissions() -> Vec<Permission> {
    const TABLE: &[(&str, &[&str])] = &[
        ("user", &["create", "read", "update", "delete", "manage"]),
        ("system", &["read", "update", "manage"]),
        ("audit", &["read", "export", "manage"]),
        ("workspace", &["create", "read", "update", "delete", "manage"]),
        ("provider", &["read", "manage"]),
    ];

    TABLE
        .iter()
        .flat_map(|(resource, actions)| actions.iter().map(move |a| Permission::new(*resource, *a)))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Engine configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Static RBAC configuration: the inheritance table and the permissions
/// seeded at bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RbacConfig {
    /// role → roles it inherits directly
    pub hierarchy: BTreeMap<RoleId, Vec<RoleId>>,
    /// role → permissions seeded at construction
    pub default_permissions: BTreeMap<RoleId, BTreeSet<Permission>>,
}

impl RbacConfig {
    /// An empty configuration: no inheritance and nothing to seed.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in admin/user/viewer table.
    pub fn defaults() -> Self {
        PredefinedRole::all()
            .into_iter()
            .fold(Self::empty(), |config, role| {
                config
                    .with_role(role.id(), role.inherits().iter().map(|r| r.id()))
                    .with_default_permissions(role.id(), role.permissions())
            })
    }

    /// Declare a role and the roles it inherits directly.
    pub fn with_role<I, S>(mut self, role: impl Into<RoleId>, inherits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<RoleId>,
    {
        self.hierarchy
            .insert(role.into(), inherits.into_iter().map(Into::into).collect());
        self
    }

    /// Add permissions seeded for `role` at bootstrap.
    pub fn with_default_permissions<I>(mut self, role: impl Into<RoleId>, permissions: I) -> Self
    where
        I: IntoIterator<Item = Permission>,
    {
        self.default_permissions
            .entry(role.into())
            .or_default()
            .extend(permissions);
        self
    }

    /// Total number of rows bootstrap will try to seed.
    pub fn default_grant_count(&self) -> usize {
        self.default_permissions.values().map(BTreeSet::len).sum()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_gets_every_builtin_permission() {
        let admin = PredefinedRole::Admin.permissions();
        assert_eq!(admin.len(), builtin_permissions().len());
        assert!(admin.contains(&Permission::new("audit", "export")));
        assert!(admin.contains(&Permission::new("user", "manage")));
    }

    #[test]
    fn test_user_and_viewer_permissions() {
        let user = PredefinedRole::User.permissions();
        assert!(user.contains(&Permission::new("workspace", "update")));
        assert!(!user.contains(&Permission::new("workspace", "delete")));

        let viewer = PredefinedRole::Viewer.permissions();
        assert_eq!(viewer.len(), 2);
        assert!(!viewer.contains(&Permission::new("workspace", "create")));
    }

    #[test]
    fn test_defaults_table() {
        let config = RbacConfig::defaults();
        assert_eq!(
            config.hierarchy[&RoleId::new("admin")],
            vec![RoleId::new("user"), RoleId::new("viewer")]
        );
        assert!(config.hierarchy[&RoleId::new("viewer")].is_empty());
        assert_eq!(config.default_grant_count(), 18 + 4 + 2);
    }

    #[test]
    fn test_defaults_is_pure() {
        assert_eq!(RbacConfig::defaults(), RbacConfig::defaults());
    }

    #[test]
    fn test_role_ids() {
        assert_eq!(PredefinedRole::from_id("user"), Some(PredefinedRole::User));
        assert_eq!(PredefinedRole::from_id("operator"), None);
    }
}
