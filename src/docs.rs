use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::auth::register,
        routes::auth::login,
        routes::auth::sso_callback,
        routes::auth::me,
        routes::auth::logout,
        routes::access::index,
        routes::access::update_user_access,
        routes::access::approve_user,
        routes::staff::list_staff,
        routes::staff::get_staff,
        routes::staff::update_staff,
        routes::staff::update_assignments,
        routes::clients::list_clients,
        routes::clients::create_client,
        routes::clients::get_client,
        routes::clients::update_client,
        routes::clients::update_assignments,
        routes::shifts::list_shifts,
        routes::shifts::create_shift,
        routes::shifts::get_shift,
        routes::shifts::update_shift,
        routes::calendar::events,
        routes::calendar::create_shift,
        routes::calendar::patch_shift,
        routes::timesheets::list_timesheets,
        routes::timesheets::create_timesheet,
        routes::timesheets::get_timesheet,
        routes::timesheets::update_timesheet,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::auth::MessageResponse,
            models::user::User,
            models::user::AuthResponse,
            models::user::LoginRequest,
            models::user::RegisterRequest,
            models::user::SsoCallbackRequest,
            models::user::StaffProfile,
            models::user::StaffProfileInput,
            models::user::StaffUpdateRequest,
            models::user::StaffDetail,
            models::rbac::Role,
            models::rbac::Permission,
            models::rbac::OverrideMode,
            models::rbac::AccessUpdateRequest,
            models::rbac::ApproveUserRequest,
            models::rbac::AccessUser,
            models::rbac::AccessIndexResponse,
            models::client::Client,
            models::client::ClientStatus,
            models::client::ClientCreateRequest,
            models::client::ClientUpdateRequest,
            models::client::AssignWorkersRequest,
            models::client::AssignClientsRequest,
            models::client::ClientDetail,
            models::client::SupportWorker,
            models::shift::Shift,
            models::shift::ShiftStatus,
            models::shift::ShiftCreateRequest,
            models::shift::ShiftUpdateRequest,
            models::shift::ShiftPatchRequest,
            models::shift::CalendarEvent,
            models::timesheet::Timesheet,
            models::timesheet::TimesheetStatus,
            models::timesheet::TimesheetCreateRequest,
            models::timesheet::TimesheetUpdateRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Authentication and account approval gate"),
        (name = "Access", description = "Roles, permission overrides, approvals"),
        (name = "Staff", description = "Staff records and client assignments"),
        (name = "Clients", description = "Clients and support worker assignments"),
        (name = "Shifts", description = "Shift scheduling"),
        (name = "Calendar", description = "Calendar feed and drag/drop updates"),
        (name = "Timesheets", description = "Timesheet logging and approval"),
        (name = "Health", description = "Service health"),
    )
)]
pub struct ApiDoc;

pub fn swagger_routes() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
