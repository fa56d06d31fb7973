//! Audit trail: append-only records of every access decision and session change.
//!
//! ```text
//!   RbacService ─┐
//!                ├──► AuditTrail ──► redact ──► AuditStore (memory | postgres)
//!  LogoutService ┘                                   │
//!                                    AuditService ◄──┘ query / stats / export / cleanup
//! ```

pub mod export;
pub mod models;
pub mod service;
pub mod store;
pub mod trail;

pub use export::ExportFormat;
pub use models::{AuditAction, AuditEvent, AuditFilter, AuditLogEntry, AuditStats, CountEntry};
pub use service::{AuditExport, AuditPage, AuditService};
pub use store::{AuditStore, InMemoryAuditStore};
pub use trail::AuditTrail;
