//! Dashboard - JSON API for the cascade front-end
//!
//! Provides:
//! - The cascading matrix with per-plan expansion
//! - Plan create / intervene / edit / delete through the intervention workflow
//! - Staff management and bulk import
//! - Summary counters, "my plans" and the part-time roster
//! - Backend settings and sign-in

pub mod routes;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::assist::Suggester;
use crate::config::{BackendSettings, Config};
use crate::gateway::Gateway;
use crate::store::LocalStore;
use crate::traversal::ExpansionState;

/// Dashboard state shared across handlers
pub struct DashboardState {
    pub config: Config,
    pub gateway: Arc<Gateway>,
    pub suggester: Arc<dyn Suggester>,
    pub store: Arc<LocalStore>,
    /// Endpoint in effect at startup, if any
    pub backend: Option<BackendSettings>,
    /// Expanded plan ids of the matrix view
    pub expanded: RwLock<ExpansionState>,
    pub started_at: Instant,
}

pub type SharedState = Arc<DashboardState>;

impl DashboardState {
    pub fn new(
        config: Config,
        gateway: Arc<Gateway>,
        suggester: Arc<dyn Suggester>,
        store: Arc<LocalStore>,
        backend: Option<BackendSettings>,
    ) -> Self {
        Self {
            config,
            gateway,
            suggester,
            store,
            backend,
            expanded: RwLock::new(ExpansionState::new()),
            started_at: Instant::now(),
        }
    }
}

/// Create the dashboard router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        // Node
        .route("/health", get(routes::health))
        .route("/api/status", get(routes::api_status))
        .route("/api/reload", post(routes::api_reload))
        // Session
        .route("/api/session", get(routes::api_session))
        .route("/api/login", post(routes::api_login))
        .route("/api/logout", post(routes::api_logout))
        // Matrix
        .route("/api/matrix", get(routes::api_matrix))
        .route("/api/matrix/toggle", post(routes::api_toggle))
        // Plans
        .route("/api/plans", post(routes::api_save_plan))
        .route("/api/plans/suggest", post(routes::api_suggest))
        .route(
            "/api/plans/:id",
            get(routes::api_plan).delete(routes::api_delete_plan),
        )
        .route("/api/plans/:id/targets", get(routes::api_targets))
        // Staff
        .route("/api/staff", get(routes::api_list_staff).post(routes::api_create_staff))
        .route("/api/staff/import", post(routes::api_import_staff))
        .route(
            "/api/staff/:id",
            put(routes::api_update_staff).delete(routes::api_delete_staff),
        )
        // Views
        .route("/api/summary", get(routes::api_summary))
        .route("/api/my-plans/:id", get(routes::api_my_plans))
        .route("/api/part-time", get(routes::api_part_time))
        // Settings
        .route(
            "/api/settings",
            get(routes::api_settings)
                .put(routes::api_save_settings)
                .delete(routes::api_clear_settings),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
