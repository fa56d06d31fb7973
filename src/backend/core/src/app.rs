//! Service wiring shared by the CLI and embedding hosts.

use std::sync::Arc;
use tracing::info;

use crate::audit::{AuditService, AuditStore, AuditTrail, InMemoryAuditStore};
use crate::cache::{self, CacheBackend, InMemoryBackend};
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::rbac::{InMemoryRbacStore, RbacConfig, RbacService, RbacStore};
use crate::session::{HttpOidcClient, LogoutService, TokenBlacklist};

/// Fully wired access-control services.
#[derive(Clone)]
pub struct AppState {
    pub rbac: Arc<RbacService>,
    pub logout: Arc<LogoutService>,
    pub audit: Arc<AuditService>,
    pub trail: AuditTrail,
    pub database: Option<Database>,
}

impl AppState {
    /// PostgreSQL stores and the Redis blacklist.
    pub async fn connect(config: &Config) -> Result<Self> {
        let database = Database::connect(&config.database).await?;
        let cache = cache::connect_redis(&config.redis).await?;

        let state = Self::build(
            config,
            Arc::new(database.rbac_store()),
            Arc::new(database.audit_store()),
            cache,
        )
        .await?;

        info!("Access control services connected");
        Ok(Self {
            database: Some(database),
            ..state
        })
    }

    /// Process-local stores, for development and tests.
    pub async fn in_memory(config: &Config) -> Result<Self> {
        Self::build(
            config,
            Arc::new(InMemoryRbacStore::new()),
            Arc::new(InMemoryAuditStore::new()),
            Arc::new(InMemoryBackend::new()),
        )
        .await
    }

    pub async fn build(
        config: &Config,
        rbac_store: Arc<dyn RbacStore>,
        audit_store: Arc<dyn AuditStore>,
        cache: Arc<dyn CacheBackend>,
    ) -> Result<Self> {
        let trail = AuditTrail::new(audit_store);

        let rbac = RbacService::new(rbac_store, RbacConfig::defaults(), trail.clone())
            .await?
            .with_check_auditing(config.audit.record_permission_checks);

        let blacklist = TokenBlacklist::new(cache, &config.blacklist);
        let mut logout = LogoutService::new(blacklist, trail.clone(), &config.blacklist);
        if !config.oidc.providers.is_empty() {
            let client = HttpOidcClient::new(&config.oidc)?;
            logout = logout.with_oidc(Arc::new(client), &config.oidc);
        }

        let audit = AuditService::new(trail.clone(), config.audit.clone());

        Ok(Self {
            rbac: Arc::new(rbac),
            logout: Arc::new(logout),
            audit: Arc::new(audit),
            trail,
            database: None,
        })
    }
}
