//! Session invalidation: token blacklist, OIDC logout, and the unified logout service.
//!
//! ```text
//!   LogoutRequest ──► LogoutMethod ──┬─ Jwt  ──► TokenBlacklist ──► CacheBackend
//!                                    └─ Oidc ──► OidcClient (end-session, logout URL)
//! ```

pub mod blacklist;
pub mod dto;
pub mod oidc;
pub mod service;

pub use blacklist::{token_hash, BlacklistStats, TokenBlacklist};
pub use dto::{BatchLogoutSummary, LogoutMethod, LogoutRequest, LogoutResponse, LogoutStats};
pub use oidc::{HttpOidcClient, OidcClient};
pub use service::{LogoutService, LOGOUT_RESOURCE};
