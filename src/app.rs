use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, patch, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{access, auth, calendar, clients, health, shifts, staff, timesheets};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            event_bus,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;

    let (event_bus, rx) = init_event_bus();
    tokio::spawn(start_activity_listener(rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/sso/callback", post(auth::sso_callback))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let access_routes = Router::new()
        .route("/", get(access::index))
        .route("/users/:user_id", put(access::update_user_access))
        .route("/users/:user_id/approve", post(access::approve_user));

    let staff_routes = Router::new()
        .route("/", get(staff::list_staff))
        .route("/:id", get(staff::get_staff).put(staff::update_staff))
        .route("/:id/assignments", put(staff::update_assignments));

    let client_routes = Router::new()
        .route("/", get(clients::list_clients).post(clients::create_client))
        .route("/:id", get(clients::get_client).put(clients::update_client))
        .route("/:id/assignments", put(clients::update_assignments));

    let shift_routes = Router::new()
        .route("/", get(shifts::list_shifts).post(shifts::create_shift))
        .route("/:id", get(shifts::get_shift).put(shifts::update_shift));

    let calendar_routes = Router::new()
        .route("/events", get(calendar::events))
        .route("/shifts", post(calendar::create_shift))
        .route("/shifts/:id", patch(calendar::patch_shift));

    let timesheet_routes = Router::new()
        .route("/", get(timesheets::list_timesheets).post(timesheets::create_timesheet))
        .route("/:id", get(timesheets::get_timesheet).put(timesheets::update_timesheet));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/settings/access", access_routes)
        .nest("/staff", staff_routes)
        .nest("/clients", client_routes)
        .nest("/shifts", shift_routes)
        .nest("/calendar", calendar_routes)
        .nest("/timesheets", timesheet_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
