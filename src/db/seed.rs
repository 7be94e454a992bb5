//! Catalog seeding: materialize the static permission catalog into the
//! roles / permissions / role_permission tables and migrate legacy
//! single-role labels into role assignments. Safe to run repeatedly.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::authz::{default_grants, roles, PERMISSION_CATALOG, ROLE_CATALOG};

pub async fn seed_rbac(pool: &SqlitePool) -> anyhow::Result<()> {
    let now = Utc::now();

    // Roles and permissions are upserted by their stable slug/key.
    for role in ROLE_CATALOG {
        sqlx::query(
            "INSERT INTO roles (id, name, label, created_at, updated_at) VALUES (?, ?, ?, ?, ?) ON CONFLICT (name) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(role.name)
        .bind(role.label)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;
    }

    for perm in PERMISSION_CATALOG {
        sqlx::query(
            "INSERT INTO permissions (id, key, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?) ON CONFLICT (key) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(perm.key)
        .bind(perm.description)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;
    }

    // Role grants are a full replace per role, matching how the access
    // screen replaces role sets.
    for role in ROLE_CATALOG {
        let role_id: Uuid = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
            .bind(role.name)
            .fetch_one(pool)
            .await?;

        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM role_permission WHERE role_id = ?")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        for key in default_grants(role.name) {
            let permission_id: Uuid = sqlx::query_scalar("SELECT id FROM permissions WHERE key = ?")
                .bind(key)
                .fetch_one(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO role_permission (role_id, permission_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(role_id)
            .bind(permission_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
    }

    // Legacy users.role labels become role assignments. The label stays
    // behind as a display cache; resolve() only reads role_user.
    let users = sqlx::query("SELECT id, role FROM users WHERE deleted_at IS NULL")
        .fetch_all(pool)
        .await?;

    for row in users {
        let user_id: Uuid = row.try_get("id")?;
        let legacy: Option<String> = row.try_get("role")?;

        let role_name = match legacy.as_deref() {
            Some(roles::ADMIN) => roles::ADMIN,
            Some(roles::PROVIDER_MANAGER) => roles::PROVIDER_MANAGER,
            _ => roles::SUPPORT_WORKER,
        };

        let role_id: Uuid = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
            .bind(role_name)
            .fetch_one(pool)
            .await?;

        sqlx::query(
            "INSERT OR IGNORE INTO role_user (user_id, role_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(role_id)
        .bind(now)
        .execute(pool)
        .await?;
    }

    Ok(())
}
