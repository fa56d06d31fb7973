//! Role-Based Access Control with role inheritance.
//!
//! - **Models**: user/role identifiers, `resource:action` permissions, assignment rows
//! - **Roles**: built-in admin/user/viewer table and [`RbacConfig`]
//! - **Hierarchy**: validated inheritance DAG with precomputed closures
//! - **Store**: persistence seam (in-memory here, PostgreSQL in `db`)
//! - **Service**: assignment, grants and permission resolution, all audited
//! - **Middleware**: tower layer answering 403 when a permission is missing
//!
//! # Usage
//!
//! ```rust,ignore
//! use access_core::rbac::{RbacConfig, RbacService, InMemoryRbacStore, Permission};
//!
//! let rbac = RbacService::new(Arc::new(InMemoryRbacStore::new()), RbacConfig::defaults(), trail).await?;
//! rbac.assign_role(&"alice".into(), &"user".into()).await?;
//! assert!(rbac.check_permission(&"alice".into(), &Permission::new("workspace", "read")).await?);
//! ```

pub mod hierarchy;
pub mod middleware;
pub mod models;
pub mod roles;
pub mod service;
pub mod store;

pub use hierarchy::{HierarchyError, RoleHierarchy};
pub use middleware::{AuthenticatedUser, RbacContext, RequirePermissionLayer, RequirePermissionService};
pub use models::{Permission, RoleCount, RoleId, RolePermission, UserId, UserRole};
pub use roles::{builtin_permissions, PredefinedRole, RbacConfig};
pub use service::RbacService;
pub use store::{InMemoryRbacStore, RbacStore};
