//! PostgreSQL implementation of [`RbacStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AccessError, Result};
use crate::rbac::models::{Permission, RoleCount, RoleId, RolePermission, UserId, UserRole};
use crate::rbac::store::RbacStore;

#[derive(Clone)]
pub struct PgRbacStore {
    pool: PgPool,
}

impl PgRbacStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Row Types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
struct UserRoleRow {
    id: Uuid,
    user_id: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl From<UserRoleRow> for UserRole {
    fn from(row: UserRoleRow) -> Self {
        Self {
            id: row.id,
            user_id: UserId(row.user_id),
            role: RoleId(row.role),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RolePermissionRow {
    id: Uuid,
    role: String,
    permission: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<RolePermissionRow> for RolePermission {
    type Error = AccessError;

    fn try_from(row: RolePermissionRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            role: RoleId(row.role),
            permission: Permission::parse_strict(&row.permission)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RoleCountRow {
    role: String,
    count: i64,
}

/// Map a unique violation to `Conflict`; anything else goes through the
/// generic conversion.
fn insert_error(error: sqlx::Error, entity: &str, id: String) -> AccessError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => AccessError::conflict(entity, id),
        _ => AccessError::from(error),
    }
}

#[async_trait]
impl RbacStore for PgRbacStore {
    async fn find_user_role(&self, user: &UserId, role: &RoleId) -> Result<Option<UserRole>> {
        let row = sqlx::query_as::<_, UserRoleRow>(
            r#"
            SELECT id, user_id, role, created_at
            FROM user_roles
            WHERE user_id = $1 AND role = $2
            "#,
        )
        .bind(user.as_str())
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRole::from))
    }

    async fn insert_user_role(&self, row: &UserRole) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (id, user_id, role, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(row.id)
        .bind(row.user_id.as_str())
        .bind(row.role.as_str())
        .bind(row.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(e, "user role", format!("{}:{}", row.user_id, row.role)))?;

        Ok(())
    }

    async fn delete_user_role(&self, user: &UserId, role: &RoleId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role = $2")
            .bind(user.as_str())
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_user_roles(&self, user: &UserId) -> Result<Vec<RoleId>> {
        let roles: Vec<String> =
            sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role")
                .bind(user.as_str())
                .fetch_all(&self.pool)
                .await?;

        Ok(roles.into_iter().map(RoleId).collect())
    }

    async fn count_user_role(&self, user: &UserId, role: &RoleId) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE user_id = $1 AND role = $2")
                .bind(user.as_str())
                .bind(role.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(count as u64)
    }

    async fn role_distribution(&self) -> Result<Vec<RoleCount>> {
        let rows = sqlx::query_as::<_, RoleCountRow>(
            r#"
            SELECT role, COUNT(*) AS count
            FROM user_roles
            GROUP BY role
            ORDER BY role
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| RoleCount {
                role: RoleId(r.role),
                count: r.count as u64,
            })
            .collect())
    }

    async fn find_role_permission(&self, role: &RoleId, permission: &Permission) -> Result<Option<RolePermission>> {
        let row = sqlx::query_as::<_, RolePermissionRow>(
            r#"
            SELECT id, role, permission, created_at
            FROM role_permissions
            WHERE role = $1 AND permission = $2
            "#,
        )
        .bind(role.as_str())
        .bind(permission.as_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(RolePermission::try_from).transpose()
    }

    async fn insert_role_permission(&self, row: &RolePermission) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO role_permissions (id, role, permission, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(row.id)
        .bind(row.role.as_str())
        .bind(row.permission.as_string())
        .bind(row.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(e, "role permission", format!("{}:{}", row.role, row.permission)))?;

        Ok(())
    }

    async fn delete_role_permission(&self, role: &RoleId, permission: &Permission) -> Result<u64> {
        let result = sqlx::query("DELETE FROM role_permissions WHERE role = $1 AND permission = $2")
            .bind(role.as_str())
            .bind(permission.as_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_role_permissions(&self, role: &RoleId) -> Result<Vec<Permission>> {
        let raw: Vec<String> = sqlx::query_scalar(
            "SELECT permission FROM role_permissions WHERE role = $1 ORDER BY permission",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;

        raw.iter().map(|p| Permission::parse_strict(p)).collect()
    }

    async fn any_role_has_permission(&self, roles: &[RoleId], permission: &Permission) -> Result<bool> {
        if roles.is_empty() {
            return Ok(false);
        }
        let roles: Vec<String> = roles.iter().map(|r| r.0.clone()).collect();

        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM role_permissions
                WHERE role = ANY($1) AND permission = $2
            )
            "#,
        )
        .bind(roles)
        .bind(permission.as_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
