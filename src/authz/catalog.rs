//! Static permission catalog and default role grants.
//!
//! Pure data: the seeder materializes this into the roles / permissions /
//! role_permission tables, and tests use it to build realistic principals.
//! Keys that gate subsystems living outside this service (branding,
//! terminology, reports) are still registered here so the resolver can
//! answer for them.

use super::{permissions as p, roles};

#[derive(Debug, Clone, Copy)]
pub struct PermissionDef {
    pub key: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct RoleDef {
    pub name: &'static str,
    pub label: &'static str,
}

pub const ROLE_CATALOG: &[RoleDef] = &[
    RoleDef { name: roles::ADMIN, label: "Administrator" },
    RoleDef { name: roles::PROVIDER_MANAGER, label: "Provider Manager" },
    RoleDef { name: roles::SUPPORT_WORKER, label: "Support Worker" },
];

pub const PERMISSION_CATALOG: &[PermissionDef] = &[
    PermissionDef { key: p::STAFF_VIEW_ANY, description: "View staff" },
    PermissionDef { key: p::STAFF_CREATE, description: "Create staff" },
    PermissionDef { key: p::STAFF_UPDATE, description: "Update staff" },
    PermissionDef { key: p::STAFF_INVITE, description: "Invite staff" },
    PermissionDef { key: p::STAFF_ASSIGNMENTS_UPDATE, description: "Assign clients to staff" },
    PermissionDef { key: p::WORKERS_VIEW_ANY, description: "View workers" },
    PermissionDef { key: p::REPORTS_VIEW_ANY, description: "View reports" },
    PermissionDef { key: p::ROSTERING_VIEW_ANY, description: "View rostering" },
    PermissionDef { key: p::FLEET_VIEW_ANY, description: "View fleet management" },
    PermissionDef { key: p::CALENDAR_VIEW_ANY, description: "View calendar" },
    PermissionDef { key: p::SHIFTS_VIEW_ANY, description: "View shifts" },
    PermissionDef { key: p::SHIFTS_CREATE, description: "Create shifts" },
    PermissionDef { key: p::SHIFTS_UPDATE, description: "Update shifts" },
    PermissionDef { key: p::SHIFTS_MANAGE_ANY, description: "Manage any staff shifts" },
    PermissionDef { key: p::TIMESHEETS_VIEW_ANY, description: "View timesheets" },
    PermissionDef { key: p::TIMESHEETS_CREATE, description: "Create timesheets" },
    PermissionDef { key: p::TIMESHEETS_UPDATE, description: "Update timesheets" },
    PermissionDef { key: p::TIMESHEETS_APPROVE, description: "Approve/reject timesheets" },
    PermissionDef { key: p::TIMESHEETS_MANAGE_ANY, description: "Manage any staff timesheets" },
    PermissionDef { key: p::CLIENTS_VIEW_ANY, description: "View clients" },
    PermissionDef { key: p::CLIENTS_CREATE, description: "Create clients" },
    PermissionDef { key: p::CLIENTS_UPDATE, description: "Update clients" },
    PermissionDef { key: p::CLIENTS_ASSIGNMENTS_UPDATE, description: "Manage client assignments" },
    PermissionDef { key: p::SETTINGS_ACCESS_MANAGE, description: "Manage user access (roles & overrides)" },
    PermissionDef { key: p::SETTINGS_TERMINOLOGY_MANAGE, description: "Manage UI terminology (labels)" },
    PermissionDef { key: p::SETTINGS_BRANDING_MANAGE, description: "Manage organisation branding (colors, logo)" },
];

/// Default permission grants per role. Unknown role names grant nothing.
pub fn default_grants(role_name: &str) -> Vec<&'static str> {
    match role_name {
        // Admin gets everything in the catalog
        roles::ADMIN => PERMISSION_CATALOG.iter().map(|perm| perm.key).collect(),

        roles::PROVIDER_MANAGER => vec![
            p::STAFF_VIEW_ANY,
            p::STAFF_CREATE,
            p::STAFF_UPDATE,
            p::STAFF_INVITE,
            p::STAFF_ASSIGNMENTS_UPDATE,
            p::WORKERS_VIEW_ANY,
            p::REPORTS_VIEW_ANY,
            p::ROSTERING_VIEW_ANY,
            p::FLEET_VIEW_ANY,
            p::CALENDAR_VIEW_ANY,
            p::SHIFTS_VIEW_ANY,
            p::SHIFTS_CREATE,
            p::SHIFTS_UPDATE,
            p::SHIFTS_MANAGE_ANY,
            p::TIMESHEETS_VIEW_ANY,
            p::TIMESHEETS_CREATE,
            p::TIMESHEETS_UPDATE,
            p::TIMESHEETS_APPROVE,
            p::TIMESHEETS_MANAGE_ANY,
            p::CLIENTS_VIEW_ANY,
            p::CLIENTS_CREATE,
            p::CLIENTS_UPDATE,
            p::CLIENTS_ASSIGNMENTS_UPDATE,
            p::SETTINGS_TERMINOLOGY_MANAGE,
        ],

        roles::SUPPORT_WORKER => vec![
            p::CLIENTS_VIEW_ANY,
            p::CALENDAR_VIEW_ANY,
            p::SHIFTS_VIEW_ANY,
            p::TIMESHEETS_VIEW_ANY,
            p::TIMESHEETS_CREATE,
            p::TIMESHEETS_UPDATE,
        ],

        _ => Vec::new(),
    }
}
