//! Authorization module - permission resolution and scope filtering
//!
//! Decisions combine three sources with strict precedence:
//! - per-user overrides (explicit deny, then explicit allow)
//! - role-derived permissions
//! - fail-closed default (deny)

mod catalog;
mod principal;

pub use catalog::{default_grants, PermissionDef, RoleDef, PERMISSION_CATALOG, ROLE_CATALOG};
pub use principal::{load_principal, Principal};

/// Whether a listing operation sees every row or only rows owned by /
/// assigned to the acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Owned,
}

/// Resource families the scope filter knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeResource {
    Shifts,
    Timesheets,
    Clients,
}

/// Well-known role names
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const PROVIDER_MANAGER: &str = "provider_manager";
    pub const SUPPORT_WORKER: &str = "support_worker";
}

/// Well-known permission keys
pub mod permissions {
    // Staff
    pub const STAFF_VIEW_ANY: &str = "staff.viewAny";
    pub const STAFF_CREATE: &str = "staff.create";
    pub const STAFF_UPDATE: &str = "staff.update";
    pub const STAFF_INVITE: &str = "staff.invite";
    pub const STAFF_ASSIGNMENTS_UPDATE: &str = "staff.assignments.update";

    // Modules
    pub const WORKERS_VIEW_ANY: &str = "workers.viewAny";
    pub const REPORTS_VIEW_ANY: &str = "reports.viewAny";
    pub const ROSTERING_VIEW_ANY: &str = "rostering.viewAny";
    pub const FLEET_VIEW_ANY: &str = "fleet.viewAny";
    pub const CALENDAR_VIEW_ANY: &str = "calendar.viewAny";

    // Shifts
    pub const SHIFTS_VIEW_ANY: &str = "shifts.viewAny";
    pub const SHIFTS_CREATE: &str = "shifts.create";
    pub const SHIFTS_UPDATE: &str = "shifts.update";
    pub const SHIFTS_MANAGE_ANY: &str = "shifts.manageAny";

    // Timesheets
    pub const TIMESHEETS_VIEW_ANY: &str = "timesheets.viewAny";
    pub const TIMESHEETS_CREATE: &str = "timesheets.create";
    pub const TIMESHEETS_UPDATE: &str = "timesheets.update";
    pub const TIMESHEETS_APPROVE: &str = "timesheets.approve";
    pub const TIMESHEETS_MANAGE_ANY: &str = "timesheets.manageAny";

    // Clients
    pub const CLIENTS_VIEW_ANY: &str = "clients.viewAny";
    pub const CLIENTS_CREATE: &str = "clients.create";
    pub const CLIENTS_UPDATE: &str = "clients.update";
    pub const CLIENTS_ASSIGNMENTS_UPDATE: &str = "clients.assignments.update";

    // Settings
    pub const SETTINGS_ACCESS_MANAGE: &str = "settings.access.manage";
    pub const SETTINGS_TERMINOLOGY_MANAGE: &str = "settings.terminology.manage";
    pub const SETTINGS_BRANDING_MANAGE: &str = "settings.branding.manage";
}
