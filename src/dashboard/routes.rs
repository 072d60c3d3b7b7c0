//! Dashboard HTTP routes
//!
//! Handlers for the JSON API. Every handler reads the current snapshot from
//! the gateway; writes go through the gateway (or the intervention workflow)
//! and answer from the reloaded snapshot.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::SharedState;
use crate::config::{BackendEndpoint, ConfigSource};
use crate::error::CascadeError;
use crate::gateway::{BackendKind, GatewayError, SnapshotSource, SCHEMA_SQL};
use crate::import::{self, ImportPreview};
use crate::model::{
    IndicatorDraft, NewStaff, PlanId, PlanStatus, PlanType, ResultPlan, StaffId, StaffMember,
};
use crate::session::{self, SessionError};
use crate::summary::{self, MyPlans, OrgSummary, ProgressRow, RosterEntry};
use crate::traversal::{self, VisibleNode, VisibleTree};
use crate::workflow::{self, InterventionWorkflow, PlanForm, WorkflowError};

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

/// Map an error to a status code and message
fn reject(e: impl Into<CascadeError>) -> (StatusCode, String) {
    let e = e.into();
    let status = match &e {
        CascadeError::NotFound(_)
        | CascadeError::Gateway(GatewayError::UnknownPlan(_) | GatewayError::UnknownStaff(_))
        | CascadeError::Workflow(WorkflowError::UnknownPlan(_) | WorkflowError::UnknownStaff(_)) => {
            StatusCode::NOT_FOUND
        }
        CascadeError::Gateway(GatewayError::DuplicateBusinessKey(_)) => StatusCode::CONFLICT,
        CascadeError::Session(SessionError::UnknownBusinessKey(_)) => StatusCode::UNAUTHORIZED,
        CascadeError::Workflow(WorkflowError::AssistUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
        CascadeError::Gateway(GatewayError::Backend(_))
        | CascadeError::Workflow(WorkflowError::Gateway(GatewayError::Backend(_))) => {
            StatusCode::BAD_GATEWAY
        }
        other if other.is_client_error() => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        warn!(status = status.as_u16(), error = %e, "Request failed");
    }
    (status, e.to_string())
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    "OK"
}

// === Node ===

#[derive(Serialize)]
pub struct StatusResponse {
    pub hostname: String,
    pub version: String,
    pub uptime_secs: u64,
    pub backend: BackendKind,
    pub source: SnapshotSource,
    pub endpoint: Option<String>,
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
    pub staff: usize,
    pub plans: usize,
    pub warnings: Vec<String>,
    pub assist_available: bool,
}

/// GET /api/status
pub async fn api_status(State(state): State<SharedState>) -> Json<StatusResponse> {
    let snap = state.gateway.snapshot().await;

    Json(StatusResponse {
        hostname: hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string()),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        backend: state.gateway.backend_kind(),
        source: snap.source,
        endpoint: state.backend.as_ref().map(|b| b.endpoint.url.clone()),
        generation: snap.generation,
        loaded_at: snap.loaded_at,
        staff: snap.org.len(),
        plans: snap.goals.len(),
        warnings: snap.warnings.clone(),
        assist_available: state.suggester.is_available(),
    })
}

/// POST /api/reload
pub async fn api_reload(State(state): State<SharedState>) -> ApiResult<StatusResponse> {
    let snap = state.gateway.reload().await.map_err(reject)?;
    state.expanded.write().await.retain_existing(&snap.goals);
    Ok(api_status(State(state)).await)
}

// === Session ===

#[derive(Deserialize)]
pub struct LoginRequest {
    pub business_key: String,
}

/// POST /api/login
///
/// Identification only; see the session module.
pub async fn api_login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<StaffMember> {
    let snap = state.gateway.snapshot().await;
    let member = session::login(&state.store, &snap.org, &req.business_key).map_err(reject)?;
    Ok(Json(member))
}

/// GET /api/session
pub async fn api_session(State(state): State<SharedState>) -> ApiResult<Option<StaffMember>> {
    let snap = state.gateway.snapshot().await;
    let member = session::restore(&state.store, &snap.org).map_err(reject)?;
    Ok(Json(member))
}

/// POST /api/logout
pub async fn api_logout(State(state): State<SharedState>) -> Result<StatusCode, (StatusCode, String)> {
    session::logout(&state.store).map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

// === Matrix ===

/// GET /api/matrix
pub async fn api_matrix(State(state): State<SharedState>) -> Json<VisibleTree> {
    let snap = state.gateway.snapshot().await;
    let expanded = state.expanded.read().await;
    Json(traversal::render(&snap.goals, &snap.org, &expanded))
}

#[derive(Deserialize)]
pub struct ToggleRequest {
    pub plan_id: PlanId,
}

#[derive(Serialize)]
pub struct ToggleResponse {
    pub plan_id: PlanId,
    pub expanded: bool,
    pub tree: VisibleTree,
}

/// POST /api/matrix/toggle
pub async fn api_toggle(
    State(state): State<SharedState>,
    Json(req): Json<ToggleRequest>,
) -> ApiResult<ToggleResponse> {
    let snap = state.gateway.snapshot().await;
    if !snap.goals.contains(&req.plan_id) {
        return Err(reject(GatewayError::UnknownPlan(req.plan_id)));
    }

    let mut expanded = state.expanded.write().await;
    let now_expanded = expanded.toggle(&req.plan_id);
    let tree = traversal::render(&snap.goals, &snap.org, &expanded);

    Ok(Json(ToggleResponse {
        plan_id: req.plan_id,
        expanded: now_expanded,
        tree,
    }))
}

// === Plans ===

/// GET /api/plans/:id
pub async fn api_plan(
    State(state): State<SharedState>,
    Path(id): Path<PlanId>,
) -> ApiResult<VisibleNode> {
    let snap = state.gateway.snapshot().await;
    let expanded = state.expanded.read().await;
    traversal::render_plan(&snap.goals, &snap.org, &expanded, &id)
        .map(Json)
        .ok_or_else(|| reject(GatewayError::UnknownPlan(id)))
}

/// GET /api/plans/:id/targets
pub async fn api_targets(
    State(state): State<SharedState>,
    Path(id): Path<PlanId>,
) -> ApiResult<Vec<StaffMember>> {
    let snap = state.gateway.snapshot().await;
    let targets = workflow::intervention_targets(&snap, &id).map_err(reject)?;
    Ok(Json(targets.into_iter().cloned().collect()))
}

/// Which form the save request fills
#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SaveTarget {
    TopLevel { owner: StaffId },
    Intervention { parent: PlanId, target: StaffId },
    Edit { plan_id: PlanId },
}

#[derive(Debug, Deserialize)]
pub struct SavePlanRequest {
    #[serde(flatten)]
    pub target: SaveTarget,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub plan_type: Option<PlanType>,
    #[serde(default)]
    pub status: Option<PlanStatus>,
    #[serde(default)]
    pub indicators: Vec<IndicatorDraft>,
}

#[derive(Serialize)]
pub struct SavedPlan {
    pub plan_id: PlanId,
    pub node: Option<VisibleNode>,
}

/// POST /api/plans - create, intervene or edit through the workflow
pub async fn api_save_plan(
    State(state): State<SharedState>,
    Json(req): Json<SavePlanRequest>,
) -> ApiResult<SavedPlan> {
    let snap = state.gateway.snapshot().await;
    let mut wf = InterventionWorkflow::new();

    let opened = match &req.target {
        SaveTarget::TopLevel { owner } => wf.open_top_level(&snap, owner),
        SaveTarget::Intervention { parent, target } => wf.open_intervention(&snap, parent, target),
        SaveTarget::Edit { plan_id } => wf.open_edit(&snap, plan_id),
    };
    opened.map_err(reject)?;

    if let Some(form) = wf.form_mut() {
        form.title = req.title;
        form.description = req.description;
        form.indicators = req.indicators;
        if let Some(t) = req.plan_type {
            form.plan_type = t;
        }
        if let Some(s) = req.status {
            form.status = s;
        }
    }

    let plan_id = wf.submit(&state.gateway).await.map_err(reject)?;

    let snap = state.gateway.snapshot().await;
    let expanded = state.expanded.read().await;
    Ok(Json(SavedPlan {
        node: traversal::render_plan(&snap.goals, &snap.org, &expanded, &plan_id),
        plan_id,
    }))
}

#[derive(Deserialize)]
pub struct SuggestRequest {
    pub parent: PlanId,
    pub target: StaffId,
}

#[derive(Serialize)]
pub struct SuggestResponse {
    pub suggested: bool,
    pub form: Option<PlanForm>,
}

/// POST /api/plans/suggest - a pre-filled intervention form
pub async fn api_suggest(
    State(state): State<SharedState>,
    Json(req): Json<SuggestRequest>,
) -> ApiResult<SuggestResponse> {
    let snap = state.gateway.snapshot().await;
    let mut wf = InterventionWorkflow::new();
    wf.open_intervention(&snap, &req.parent, &req.target)
        .map_err(reject)?;

    let suggested = wf
        .request_suggestion(&snap, state.suggester.as_ref())
        .await
        .map_err(reject)?;

    Ok(Json(SuggestResponse {
        suggested,
        form: wf.form().cloned(),
    }))
}

#[derive(Serialize)]
pub struct DeletePlanResponse {
    pub removed: Vec<PlanId>,
}

/// DELETE /api/plans/:id - removes the plan and everything cascaded from it
pub async fn api_delete_plan(
    State(state): State<SharedState>,
    Path(id): Path<PlanId>,
) -> ApiResult<DeletePlanResponse> {
    let removed = state.gateway.delete_plan(&id).await.map_err(reject)?;

    let mut expanded = state.expanded.write().await;
    for plan in &removed {
        expanded.collapse(plan);
    }
    Ok(Json(DeletePlanResponse { removed }))
}

// === Staff ===

/// GET /api/staff
pub async fn api_list_staff(State(state): State<SharedState>) -> Json<Vec<StaffMember>> {
    let snap = state.gateway.snapshot().await;
    Json(snap.org.members().to_vec())
}

#[derive(Serialize)]
pub struct CreatedStaff {
    pub id: StaffId,
}

/// POST /api/staff
pub async fn api_create_staff(
    State(state): State<SharedState>,
    Json(new): Json<NewStaff>,
) -> ApiResult<CreatedStaff> {
    let id = state.gateway.create_staff(new).await.map_err(reject)?;
    Ok(Json(CreatedStaff { id }))
}

/// PUT /api/staff/:id
pub async fn api_update_staff(
    State(state): State<SharedState>,
    Path(id): Path<StaffId>,
    Json(update): Json<NewStaff>,
) -> ApiResult<StaffMember> {
    let member = update.into_member(id);
    state
        .gateway
        .update_staff(member.clone())
        .await
        .map_err(reject)?;
    Ok(Json(member))
}

#[derive(Serialize)]
pub struct DeleteStaffResponse {
    pub removed_plans: Vec<PlanId>,
}

/// DELETE /api/staff/:id
pub async fn api_delete_staff(
    State(state): State<SharedState>,
    Path(id): Path<StaffId>,
) -> ApiResult<DeleteStaffResponse> {
    let removed_plans = state.gateway.delete_staff(&id).await.map_err(reject)?;
    Ok(Json(DeleteStaffResponse { removed_plans }))
}

#[derive(Deserialize)]
pub struct ImportRequest {
    pub rows: Vec<Value>,
    /// Create the accepted rows; refused while any row is rejected
    #[serde(default)]
    pub commit: bool,
}

#[derive(Serialize)]
pub struct ImportResponse {
    pub preview: ImportPreview,
    pub created: Vec<StaffId>,
}

/// POST /api/staff/import
pub async fn api_import_staff(
    State(state): State<SharedState>,
    Json(req): Json<ImportRequest>,
) -> ApiResult<ImportResponse> {
    let snap = state.gateway.snapshot().await;
    let preview = import::preview_rows(&req.rows, &snap.org);

    if !req.commit {
        return Ok(Json(ImportResponse {
            preview,
            created: Vec::new(),
        }));
    }
    if !preview.is_clean() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("{} rows were rejected; fix them before importing", preview.rejected.len()),
        ));
    }

    let created = state
        .gateway
        .bulk_create_staff(preview.accepted.clone())
        .await
        .map_err(reject)?;
    info!(count = created.len(), "Staff imported");
    Ok(Json(ImportResponse { preview, created }))
}

// === Views ===

#[derive(Deserialize, Default)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: String,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub summary: OrgSummary,
    pub progress: Vec<ProgressRow>,
}

/// GET /api/summary
pub async fn api_summary(
    State(state): State<SharedState>,
    Query(q): Query<SearchQuery>,
) -> Json<SummaryResponse> {
    let snap = state.gateway.snapshot().await;
    Json(SummaryResponse {
        summary: summary::org_summary(&snap.org, &snap.goals),
        progress: summary::progress(&snap.org, &snap.goals, &q.search, q.limit),
    })
}

/// GET /api/my-plans/:id
pub async fn api_my_plans(
    State(state): State<SharedState>,
    Path(id): Path<StaffId>,
) -> ApiResult<MyPlans> {
    let snap = state.gateway.snapshot().await;
    summary::my_plans(&snap.org, &snap.goals, &id)
        .map(Json)
        .ok_or_else(|| reject(GatewayError::UnknownStaff(id)))
}

#[derive(Serialize)]
pub struct PartTimeResponse {
    pub roster: Vec<RosterEntry>,
    pub leader_plans: Vec<ResultPlan>,
}

/// GET /api/part-time
pub async fn api_part_time(
    State(state): State<SharedState>,
    Query(q): Query<SearchQuery>,
) -> Json<PartTimeResponse> {
    let snap = state.gateway.snapshot().await;
    Json(PartTimeResponse {
        roster: summary::part_time_roster(&snap.org, &snap.goals, &q.search),
        leader_plans: summary::leader_plans(&snap.org, &snap.goals, "")
            .into_iter()
            .cloned()
            .collect(),
    })
}

// === Settings ===

#[derive(Serialize)]
pub struct EndpointView {
    pub url: String,
    pub masked_key: String,
}

impl From<&BackendEndpoint> for EndpointView {
    fn from(e: &BackendEndpoint) -> Self {
        Self {
            url: e.url.clone(),
            masked_key: e.masked_key(),
        }
    }
}

#[derive(Serialize)]
pub struct SettingsResponse {
    pub active: Option<EndpointView>,
    pub active_source: Option<ConfigSource>,
    pub saved_override: Option<EndpointView>,
    pub schema_sql: &'static str,
}

/// GET /api/settings
pub async fn api_settings(State(state): State<SharedState>) -> ApiResult<SettingsResponse> {
    let saved = state.store.backend_override().map_err(reject)?;
    Ok(Json(SettingsResponse {
        active: state.backend.as_ref().map(|b| EndpointView::from(&b.endpoint)),
        active_source: state.backend.as_ref().map(|b| b.source),
        saved_override: saved.as_ref().map(EndpointView::from),
        schema_sql: SCHEMA_SQL,
    }))
}

#[derive(Deserialize)]
pub struct SettingsRequest {
    pub url: String,
    pub key: String,
}

#[derive(Serialize)]
pub struct SettingsSaved {
    pub saved: EndpointView,
    pub restart_required: bool,
}

/// PUT /api/settings - takes effect on the next start
pub async fn api_save_settings(
    State(state): State<SharedState>,
    Json(req): Json<SettingsRequest>,
) -> ApiResult<SettingsSaved> {
    let endpoint = BackendEndpoint::new(&req.url, &req.key).map_err(reject)?;
    state.store.set_backend_override(&endpoint).map_err(reject)?;
    info!(url = %endpoint.url, "Backend override saved");

    Ok(Json(SettingsSaved {
        saved: EndpointView::from(&endpoint),
        restart_required: true,
    }))
}

/// DELETE /api/settings
pub async fn api_clear_settings(
    State(state): State<SharedState>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.store.clear_backend_override().map_err(reject)?;
    info!("Backend override cleared");
    Ok(StatusCode::NO_CONTENT)
}
