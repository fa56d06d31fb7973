//! PostgreSQL persistence.
//!
//! Uses sqlx for the connection pool and embedded migrations; the store
//! implementations live in [`rbac_store`] and [`audit_store`].

pub mod audit_store;
pub mod rbac_store;

pub use audit_store::PgAuditStore;
pub use rbac_store::PgRbacStore;

use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Instant;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::error::Result;

/// Database connection pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

/// Result of a liveness probe.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseHealth {
    pub healthy: bool,
    pub latency_ms: u64,
    pub pool_size: u32,
    pub idle_connections: usize,
}

impl Database {
    /// Open the pool and, if configured, apply pending migrations.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.url)
            .await?;

        let db = Self { pool };
        if config.run_migrations {
            db.migrate().await?;
        }

        info!(
            max_connections = config.max_connections,
            "Database pool ready"
        );
        Ok(db)
    }

    /// Run migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health(&self) -> DatabaseHealth {
        let started = Instant::now();
        let healthy = match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                false
            }
        };

        DatabaseHealth {
            healthy,
            latency_ms: started.elapsed().as_millis() as u64,
            pool_size: self.pool.size(),
            idle_connections: self.pool.num_idle(),
        }
    }

    pub fn rbac_store(&self) -> PgRbacStore {
        PgRbacStore::new(self.pool.clone())
    }

    pub fn audit_store(&self) -> PgAuditStore {
        PgAuditStore::new(self.pool.clone())
    }
}
