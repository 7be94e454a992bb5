use std::collections::{HashMap, HashSet};

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

use super::{permissions, roles, Scope, ScopeResource};

/// Principal represents the authenticated user with their cached role set,
/// role-derived permission keys, and per-permission overrides.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub roles: HashSet<String>,
    role_permissions: HashSet<String>,
    /// key -> allowed. Row absent means "inherit from roles".
    overrides: HashMap<String, bool>,
}

impl Principal {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            roles: HashSet::new(),
            role_permissions: HashSet::new(),
            overrides: HashMap::new(),
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = String>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn with_role_permissions(mut self, keys: impl IntoIterator<Item = String>) -> Self {
        self.role_permissions = keys.into_iter().collect();
        self
    }

    pub fn with_overrides(mut self, overrides: impl IntoIterator<Item = (String, bool)>) -> Self {
        self.overrides = overrides.into_iter().collect();
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Resolve one permission key.
    ///
    /// Evaluation order:
    /// 1. explicit deny override -> deny
    /// 2. explicit allow override -> allow
    /// 3. any held role grants the key -> allow
    /// 4. deny
    pub fn can(&self, permission: &str) -> bool {
        match self.overrides.get(permission) {
            Some(false) => {
                tracing::debug!(
                    user_id = %self.user_id,
                    permission = %permission,
                    "deny override"
                );
                false
            }
            Some(true) => true,
            None => self.role_permissions.contains(permission),
        }
    }

    /// Like [`can`](Self::can) but turns a denial into `AppError::Forbidden`.
    pub fn require(&self, permission: &str) -> AppResult<()> {
        if self.can(permission) {
            Ok(())
        } else {
            tracing::debug!(
                user_id = %self.user_id,
                permission = %permission,
                "permission denied"
            );
            Err(AppError::forbidden(format!("missing permission {permission}")))
        }
    }

    /// Scope filter: whether listings of `resource` are global or restricted
    /// to rows owned by / assigned to this user.
    ///
    /// Support workers are always Owned-scoped for clients, whatever else
    /// they have been granted.
    pub fn scope_for(&self, resource: ScopeResource) -> Scope {
        let global = match resource {
            ScopeResource::Shifts => self.can(permissions::SHIFTS_MANAGE_ANY),
            ScopeResource::Timesheets => self.can(permissions::TIMESHEETS_MANAGE_ANY),
            ScopeResource::Clients => {
                self.can(permissions::CLIENTS_VIEW_ANY) && !self.has_role(roles::SUPPORT_WORKER)
            }
        };

        if global {
            Scope::Global
        } else {
            Scope::Owned
        }
    }
}

/// Load the acting user's principal from storage. Three reads, no writes;
/// the snapshot is used for every decision within the request.
pub async fn load_principal(pool: &SqlitePool, user_id: Uuid) -> AppResult<Principal> {
    let role_names: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT r.name
        FROM roles r
        INNER JOIN role_user ru ON r.id = ru.role_id
        WHERE ru.user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let role_permissions: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT p.key
        FROM permissions p
        INNER JOIN role_permission rp ON p.id = rp.permission_id
        INNER JOIN role_user ru ON ru.role_id = rp.role_id
        WHERE ru.user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let overrides: Vec<(String, bool)> = sqlx::query_as(
        r#"
        SELECT p.key, pu.allowed
        FROM permission_user pu
        INNER JOIN permissions p ON p.id = pu.permission_id
        WHERE pu.user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(Principal::new(user_id)
        .with_roles(role_names)
        .with_role_permissions(role_permissions)
        .with_overrides(overrides))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn support_worker(user_id: Uuid) -> Principal {
        Principal::new(user_id)
            .with_roles(vec![roles::SUPPORT_WORKER.to_string()])
            .with_role_permissions(
                crate::authz::default_grants(roles::SUPPORT_WORKER)
                    .into_iter()
                    .map(String::from),
            )
    }

    #[test]
    fn deny_override_beats_role_grant() {
        let principal = support_worker(Uuid::new_v4())
            .with_overrides(vec![(permissions::TIMESHEETS_CREATE.to_string(), false)]);

        assert!(!principal.can(permissions::TIMESHEETS_CREATE));
        // Other role grants are unaffected
        assert!(principal.can(permissions::TIMESHEETS_VIEW_ANY));
    }

    #[test]
    fn allow_override_works_without_any_roles() {
        let principal = Principal::new(Uuid::new_v4())
            .with_overrides(vec![(permissions::SETTINGS_ACCESS_MANAGE.to_string(), true)]);

        assert!(principal.can(permissions::SETTINGS_ACCESS_MANAGE));
    }

    #[test]
    fn no_roles_no_overrides_denies_everything() {
        let principal = Principal::new(Uuid::new_v4());

        for perm in crate::authz::PERMISSION_CATALOG {
            assert!(!principal.can(perm.key), "{} should deny", perm.key);
        }
    }

    #[test]
    fn unknown_key_is_denied() {
        let principal = support_worker(Uuid::new_v4());
        assert!(!principal.can("definitely.not.a.permission"));
    }

    #[test]
    fn removing_override_reverts_to_role_value() {
        let user_id = Uuid::new_v4();
        let with_deny = support_worker(user_id)
            .with_overrides(vec![(permissions::TIMESHEETS_CREATE.to_string(), false)]);
        assert!(!with_deny.can(permissions::TIMESHEETS_CREATE));

        // "inherit" is modelled as the override row being absent
        let inherited = support_worker(user_id);
        assert!(inherited.can(permissions::TIMESHEETS_CREATE));
        assert!(!inherited.can(permissions::SHIFTS_MANAGE_ANY));
    }

    #[test]
    fn scope_shifts_follows_manage_any() {
        let staff = support_worker(Uuid::new_v4());
        assert_eq!(staff.scope_for(ScopeResource::Shifts), Scope::Owned);

        let manager = Principal::new(Uuid::new_v4())
            .with_role_permissions(vec![permissions::SHIFTS_MANAGE_ANY.to_string()]);
        assert_eq!(manager.scope_for(ScopeResource::Shifts), Scope::Global);
    }

    #[test]
    fn support_worker_is_owned_scoped_for_clients_despite_grants() {
        // clients.viewAny is part of the support worker grant set, but the
        // role itself pins the scope to assigned clients only.
        let staff = support_worker(Uuid::new_v4());
        assert!(staff.can(permissions::CLIENTS_VIEW_ANY));
        assert_eq!(staff.scope_for(ScopeResource::Clients), Scope::Owned);

        let manager = Principal::new(Uuid::new_v4())
            .with_role_permissions(vec![permissions::CLIENTS_VIEW_ANY.to_string()]);
        assert_eq!(manager.scope_for(ScopeResource::Clients), Scope::Global);
    }

    #[test]
    fn deny_override_narrows_scope_to_owned() {
        let manager = Principal::new(Uuid::new_v4())
            .with_role_permissions(vec![permissions::TIMESHEETS_MANAGE_ANY.to_string()])
            .with_overrides(vec![(permissions::TIMESHEETS_MANAGE_ANY.to_string(), false)]);

        assert_eq!(manager.scope_for(ScopeResource::Timesheets), Scope::Owned);
    }
}
