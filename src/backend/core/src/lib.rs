#![allow(clippy::result_large_err)]
//! # Access Core
//!
//! Access control for a multi-cloud management platform.
//!
//! ## Architecture
//!
//! - **RBAC**: role assignment, role grants, and permission checks with role inheritance
//! - **Session**: unified JWT/OIDC logout over a TTL-bounded token blacklist
//! - **Audit**: append-only trail of every decision, with query, export and retention
//! - **Cache**: in-memory and Redis backends for the blacklist
//! - **DB**: PostgreSQL stores and migrations
//! - **Telemetry**: structured logging with credential redaction, Prometheus metrics

pub mod app;
pub mod audit;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod rbac;
pub mod session;
pub mod telemetry;

pub use error::{AccessError, ErrorCode, ErrorContext, ErrorDetails, ErrorKind, ErrorSeverity, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::app::AppState;
    pub use crate::audit::{
        AuditAction, AuditEvent, AuditFilter, AuditLogEntry, AuditService, AuditStats, AuditStore,
        AuditTrail, ExportFormat, InMemoryAuditStore,
    };
    pub use crate::cache::{CacheBackend, CacheStats, InMemoryBackend, RedisBackend};
    pub use crate::config::Config;
    pub use crate::error::{AccessError, ErrorCode, ErrorContext, ErrorDetails, ErrorKind, ErrorSeverity, Result};
    pub use crate::rbac::{
        AuthenticatedUser, InMemoryRbacStore, Permission, PredefinedRole, RbacConfig, RbacContext, RbacService,
        RbacStore, RequirePermissionLayer, RoleCount, RoleHierarchy, RoleId, UserId,
    };
    pub use crate::session::{
        HttpOidcClient, LogoutMethod, LogoutRequest, LogoutResponse, LogoutService, OidcClient, TokenBlacklist,
    };
}
