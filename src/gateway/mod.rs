//! Persistence gateway
//!
//! Owns the backend chosen at startup and the current immutable snapshot of
//! both trees. Every write is followed by a full reload (fire-and-refetch);
//! readers only ever see whole snapshots.
//!
//! Writes are serialized through one async mutex. Reloads take a generation
//! ticket and are discarded if a newer snapshot was committed first, so a slow
//! reload can never overwrite a fresher one.

pub mod memory;
pub mod remote;
pub mod rows;

/// DDL for a fresh remote backend
pub const SCHEMA_SQL: &str = include_str!("../../schema.sql");

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::BackendEndpoint;
use crate::demo;
use crate::goals::{GoalTree, LinkError};
use crate::model::{
    Dataset, IndicatorDraft, NewStaff, PlanDraft, PlanId, PlanStatus, PlanType, StaffId,
    StaffMember,
};
use crate::org::{HierarchyError, OrgHierarchy};

pub use memory::InMemoryBackend;
pub use remote::RemoteBackend;
pub use rows::DecodeError;

/// Failure reported by a backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Errors surfaced by gateway operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error("unknown plan: {0}")]
    UnknownPlan(PlanId),

    #[error("unknown staff member: {0}")]
    UnknownStaff(StaffId),

    #[error("business key {0} is already in use")]
    DuplicateBusinessKey(String),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl GatewayError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        GatewayError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    InMemory,
    Remote,
}

/// Columns of a plan row, without its indicators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanFields {
    pub owner_id: StaffId,
    pub parent_id: Option<PlanId>,
    pub title: String,
    pub description: String,
    pub plan_type: PlanType,
    pub status: PlanStatus,
}

/// Result of a bulk load
#[derive(Debug, Clone, Default)]
pub struct Loaded {
    pub dataset: Dataset,
    /// Rows dropped because they failed validation
    pub skipped: Vec<DecodeError>,
}

impl Loaded {
    pub fn clean(dataset: Dataset) -> Self {
        Self {
            dataset,
            skipped: Vec::new(),
        }
    }
}

/// A store the gateway can read from and write to
///
/// Implementations perform exactly the requested step; validation, cascades
/// and reloads are the gateway's job.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Fetch staff, plans and indicators in full
    async fn load_all(&self) -> Result<Loaded, BackendError>;

    /// Insert all records or none; returns assigned ids in input order
    async fn insert_staff(&self, staff: &[NewStaff]) -> Result<Vec<StaffId>, BackendError>;

    async fn update_staff(&self, member: &StaffMember) -> Result<(), BackendError>;

    async fn delete_staff(&self, id: &str) -> Result<(), BackendError>;

    async fn insert_plan(&self, fields: &PlanFields) -> Result<PlanId, BackendError>;

    async fn update_plan(&self, id: &str, fields: &PlanFields) -> Result<(), BackendError>;

    /// Drop every indicator of `plan_id` and insert `indicators` in order
    async fn replace_indicators(
        &self,
        plan_id: &str,
        indicators: &[IndicatorDraft],
    ) -> Result<(), BackendError>;

    /// Delete plans (and their indicators) in the given order
    async fn delete_plans(&self, ids: &[PlanId]) -> Result<(), BackendError>;
}

/// Where the current snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    InMemory,
    Remote,
    /// The configured backend failed its first load
    DemoFallback,
}

/// Immutable view of both trees at one generation
#[derive(Debug)]
pub struct Snapshot {
    pub generation: u64,
    pub org: OrgHierarchy,
    pub goals: GoalTree,
    pub loaded_at: DateTime<Utc>,
    pub source: SnapshotSource,
    /// Non-fatal problems found while loading
    pub warnings: Vec<String>,
}

impl Snapshot {
    fn build(generation: u64, loaded: Loaded, source: SnapshotSource, notice: Option<&str>) -> Self {
        let mut warnings: Vec<String> = notice.map(str::to_string).into_iter().collect();
        warnings.extend(loaded.skipped.iter().map(|e| format!("skipped {}", e)));

        let org = OrgHierarchy::new(loaded.dataset.staff);
        let goals = GoalTree::new(loaded.dataset.plans);

        for id in org.validate_forest() {
            warn!(staff_id = %id, "Staff member is on a reporting cycle");
            warnings.push(format!("staff member {} is on a reporting cycle", id));
        }
        for v in goals.violations(&org) {
            debug!(plan_id = %v.plan_id, error = %v.error, "Stored plan breaks a cascade rule");
        }

        Self {
            generation,
            org,
            goals,
            loaded_at: Utc::now(),
            source,
            warnings,
        }
    }
}

pub struct Gateway {
    backend: Arc<dyn Backend>,
    current: RwLock<Arc<Snapshot>>,
    generation: AtomicU64,
    write_lock: Mutex<()>,
    /// Set when running on the demo dataset after a failed first load
    fallback: Option<String>,
}

impl Gateway {
    fn with_snapshot(backend: Arc<dyn Backend>, loaded: Loaded, fallback: Option<String>) -> Self {
        let source = match (&fallback, backend.kind()) {
            (Some(_), _) => SnapshotSource::DemoFallback,
            (None, BackendKind::InMemory) => SnapshotSource::InMemory,
            (None, BackendKind::Remote) => SnapshotSource::Remote,
        };
        let snapshot = Snapshot::build(1, loaded, source, fallback.as_deref());

        Self {
            backend,
            current: RwLock::new(Arc::new(snapshot)),
            generation: AtomicU64::new(1),
            write_lock: Mutex::new(()),
            fallback,
        }
    }

    /// Gateway over a process-local store seeded with `seed`
    pub fn in_memory(seed: Dataset) -> Self {
        let backend = Arc::new(InMemoryBackend::new(seed.clone()));
        Self::with_snapshot(backend, Loaded::clean(seed), None)
    }

    /// Load from `backend`, failing if the first load fails
    pub async fn new(backend: Arc<dyn Backend>) -> Result<Self, GatewayError> {
        let loaded = backend.load_all().await?;
        Ok(Self::with_snapshot(backend, loaded, None))
    }

    /// Load from `backend`, falling back to the demo dataset if that fails
    ///
    /// After a fallback all writes go to an in-memory store seeded with the
    /// demo data, so the session stays internally consistent.
    pub async fn connect(backend: Arc<dyn Backend>) -> Self {
        match backend.load_all().await {
            Ok(loaded) => Self::with_snapshot(backend, loaded, None),
            Err(e) => {
                warn!(error = %e, "Initial load failed, serving demo dataset");
                let notice = format!("backend unavailable ({}); showing demo data", e);
                let seed = demo::dataset();
                let backend = Arc::new(InMemoryBackend::new(seed.clone()));
                Self::with_snapshot(backend, Loaded::clean(seed), Some(notice))
            }
        }
    }

    /// Remote gateway when an endpoint is configured, demo mode otherwise
    pub async fn open(endpoint: Option<&BackendEndpoint>) -> Result<Self, GatewayError> {
        match endpoint {
            Some(endpoint) => {
                info!(url = %endpoint.url, "Using remote backend");
                let backend = Arc::new(RemoteBackend::new(endpoint)?);
                Ok(Self::connect(backend).await)
            }
            None => {
                info!("No backend configured, using in-memory demo data");
                Ok(Self::in_memory(demo::dataset()))
            }
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Reason the gateway is serving demo data, if it is
    pub fn fallback_notice(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }

    /// Refetch everything and publish a new snapshot
    ///
    /// Returns the committed snapshot, which is a newer one than this
    /// reload produced when a concurrent reload won.
    pub async fn reload(&self) -> Result<Arc<Snapshot>, GatewayError> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let loaded = self.backend.load_all().await?;

        let source = self.current.read().await.source;
        let fresh = Arc::new(Snapshot::build(ticket, loaded, source, self.fallback.as_deref()));

        let mut current = self.current.write().await;
        if current.generation > ticket {
            debug!(ticket, committed = current.generation, "Discarding stale reload");
            return Ok(current.clone());
        }
        *current = fresh.clone();
        debug!(
            generation = ticket,
            staff = fresh.org.len(),
            plans = fresh.goals.len(),
            "Snapshot reloaded"
        );
        Ok(fresh)
    }

    /// Reload after a write attempt and hand back the write's own outcome
    async fn settle<T>(
        &self,
        action: &'static str,
        outcome: Result<T, BackendError>,
    ) -> Result<T, GatewayError> {
        let reloaded = self.reload().await;

        match outcome {
            Ok(value) => {
                if let Err(e) = reloaded {
                    warn!(action, error = %e, "Write succeeded but reload failed");
                }
                Ok(value)
            }
            Err(e) => {
                warn!(action, error = %e, "Write failed");
                if let Err(re) = reloaded {
                    warn!(action, error = %re, "Reconciling reload failed");
                }
                Err(match e {
                    BackendError::Conflict(msg) => GatewayError::DuplicateBusinessKey(msg),
                    other => GatewayError::Backend(other),
                })
            }
        }
    }

    // ---- staff -------------------------------------------------------

    fn check_new_staff(snap: &Snapshot, new: &NewStaff) -> Result<(), GatewayError> {
        if new.business_key.trim().is_empty() {
            return Err(GatewayError::invalid("business_key", "must not be empty"));
        }
        if new.name.trim().is_empty() {
            return Err(GatewayError::invalid("name", "must not be empty"));
        }
        if snap.org.find_by_business_key(&new.business_key).is_some() {
            return Err(GatewayError::DuplicateBusinessKey(new.business_key.clone()));
        }
        if let Some(sup) = new.superior_id.as_deref() {
            if !snap.org.contains(sup) {
                return Err(GatewayError::UnknownStaff(sup.to_string()));
            }
        }
        Ok(())
    }

    pub async fn create_staff(&self, new: NewStaff) -> Result<StaffId, GatewayError> {
        let mut ids = self.bulk_create_staff(vec![new]).await?;
        ids.pop()
            .ok_or_else(|| BackendError::Decode("insert returned no id".to_string()).into())
    }

    /// Insert many members in one write; all are validated first
    pub async fn bulk_create_staff(
        &self,
        staff: Vec<NewStaff>,
    ) -> Result<Vec<StaffId>, GatewayError> {
        let _guard = self.write_lock.lock().await;
        let snap = self.snapshot().await;

        for (i, new) in staff.iter().enumerate() {
            Self::check_new_staff(&snap, new)?;
            if staff[..i].iter().any(|s| s.business_key == new.business_key) {
                return Err(GatewayError::DuplicateBusinessKey(new.business_key.clone()));
            }
        }
        if staff.is_empty() {
            return Ok(Vec::new());
        }

        let outcome = self.backend.insert_staff(&staff).await;
        let ids = self.settle("create_staff", outcome).await?;
        info!(count = ids.len(), "Staff created");
        Ok(ids)
    }

    /// Replace a member's record
    ///
    /// Rejected when it would close a reporting cycle or leave any plan
    /// violating the cascade rules it satisfied before.
    pub async fn update_staff(&self, member: StaffMember) -> Result<(), GatewayError> {
        let _guard = self.write_lock.lock().await;
        let snap = self.snapshot().await;

        if !snap.org.contains(&member.id) {
            return Err(GatewayError::UnknownStaff(member.id.clone()));
        }
        if member.business_key.trim().is_empty() {
            return Err(GatewayError::invalid("business_key", "must not be empty"));
        }
        if member.name.trim().is_empty() {
            return Err(GatewayError::invalid("name", "must not be empty"));
        }
        if let Some(other) = snap.org.find_by_business_key(&member.business_key) {
            if other.id != member.id {
                return Err(GatewayError::DuplicateBusinessKey(member.business_key.clone()));
            }
        }
        if let Some(sup) = member.superior_id.as_deref() {
            if !snap.org.contains(sup) {
                return Err(GatewayError::UnknownStaff(sup.to_string()));
            }
        }
        if snap.org.would_create_cycle(&member.id, member.superior_id.as_deref()) {
            return Err(HierarchyError::Cycle(member.id.clone()).into());
        }

        let edited = OrgHierarchy::new(
            snap.org
                .members()
                .iter()
                .map(|m| if m.id == member.id { member.clone() } else { m.clone() })
                .collect(),
        );
        let before: Vec<PlanId> = snap
            .goals
            .violations(&snap.org)
            .into_iter()
            .map(|v| v.plan_id)
            .collect();
        if let Some(v) = snap
            .goals
            .violations(&edited)
            .into_iter()
            .find(|v| !before.contains(&v.plan_id))
        {
            return Err(v.error.into());
        }

        let outcome = self.backend.update_staff(&member).await;
        self.settle("update_staff", outcome).await?;
        info!(staff_id = %member.id, "Staff updated");
        Ok(())
    }

    /// Delete a member, detaching subordinates and removing their plans
    ///
    /// Returns the ids of the plans removed along with the member.
    pub async fn delete_staff(&self, id: &str) -> Result<Vec<PlanId>, GatewayError> {
        let _guard = self.write_lock.lock().await;
        let snap = self.snapshot().await;

        if !snap.org.contains(id) {
            return Err(GatewayError::UnknownStaff(id.to_string()));
        }

        let mut doomed: Vec<PlanId> = Vec::new();
        for plan in snap.goals.plans_of(id) {
            for d in snap.goals.descendants(&plan.id) {
                if !doomed.contains(&d) {
                    doomed.push(d);
                }
            }
            if !doomed.contains(&plan.id) {
                doomed.push(plan.id.clone());
            }
        }
        let detached: Vec<StaffMember> = snap
            .org
            .direct_subordinates(id)
            .into_iter()
            .map(|m| StaffMember {
                superior_id: None,
                ..m.clone()
            })
            .collect();

        let outcome = async {
            for member in &detached {
                self.backend.update_staff(member).await?;
            }
            self.backend.delete_plans(&doomed).await?;
            self.backend.delete_staff(id).await
        }
        .await;
        self.settle("delete_staff", outcome).await?;

        info!(staff_id = %id, plans = doomed.len(), detached = detached.len(), "Staff deleted");
        Ok(doomed)
    }

    /// Make sure the default administrator exists in the backend
    pub async fn seed_admin(&self) -> Result<StaffId, GatewayError> {
        let admin = demo::admin();
        let existing = self
            .snapshot()
            .await
            .org
            .find_by_business_key(&admin.business_key)
            .cloned();

        match existing {
            Some(found) => {
                let id = found.id.clone();
                self.update_staff(StaffMember {
                    name: admin.name,
                    position: admin.position,
                    role: admin.role,
                    gender: admin.gender,
                    superior_id: None,
                    ..found
                })
                .await?;
                Ok(id)
            }
            None => {
                self.create_staff(NewStaff {
                    business_key: admin.business_key,
                    name: admin.name,
                    position: admin.position,
                    role: admin.role,
                    gender: admin.gender,
                    superior_id: None,
                    is_part_time: false,
                })
                .await
            }
        }
    }

    // ---- plans -------------------------------------------------------

    /// Insert or update one plan and replace its indicators
    ///
    /// The draft inserts when its id is absent or an unpersisted draft id;
    /// otherwise the plan with that id is updated in place.
    pub async fn upsert_plan(
        &self,
        draft: PlanDraft,
        owner: &str,
        parent: Option<&str>,
    ) -> Result<PlanId, GatewayError> {
        let _guard = self.write_lock.lock().await;
        let snap = self.snapshot().await;

        if draft.title.trim().is_empty() {
            return Err(GatewayError::invalid("title", "must not be empty"));
        }
        let parent = parent.filter(|p| !p.is_empty());
        snap.goals.check_link(&snap.org, owner, parent)?;

        let existing = if draft.is_insert() {
            None
        } else {
            let id = draft.id.clone().unwrap_or_default();
            if !snap.goals.contains(&id) {
                return Err(GatewayError::UnknownPlan(id));
            }
            let below_itself = parent.is_some_and(|p| {
                p == id || snap.goals.descendants(&id).iter().any(|d| d == p)
            });
            if below_itself {
                return Err(GatewayError::invalid("parent", "a plan cannot sit below itself"));
            }
            Some(id)
        };

        let fields = PlanFields {
            owner_id: owner.to_string(),
            parent_id: parent.map(str::to_string),
            title: draft.title.trim().to_string(),
            description: draft.description,
            plan_type: draft.plan_type.unwrap_or_default(),
            status: draft.status.unwrap_or_default(),
        };

        let outcome = async {
            let id = match &existing {
                Some(id) => {
                    self.backend.update_plan(id, &fields).await?;
                    id.clone()
                }
                None => self.backend.insert_plan(&fields).await?,
            };
            self.backend.replace_indicators(&id, &draft.indicators).await?;
            Ok::<_, BackendError>(id)
        }
        .await;
        let id = self.settle("upsert_plan", outcome).await?;

        info!(
            plan_id = %id,
            owner = %owner,
            parent = parent.unwrap_or("-"),
            inserted = existing.is_none(),
            "Plan saved"
        );
        Ok(id)
    }

    /// Delete a plan and every plan cascaded from it
    ///
    /// Descendants are removed before their parents. Returns every removed
    /// id in deletion order.
    pub async fn delete_plan(&self, id: &str) -> Result<Vec<PlanId>, GatewayError> {
        let _guard = self.write_lock.lock().await;
        let snap = self.snapshot().await;

        if !snap.goals.contains(id) {
            return Err(GatewayError::UnknownPlan(id.to_string()));
        }
        let mut doomed = snap.goals.descendants(id);
        doomed.push(id.to_string());

        let outcome = self.backend.delete_plans(&doomed).await;
        self.settle("delete_plan", outcome).await?;

        info!(plan_id = %id, removed = doomed.len(), "Plan deleted");
        Ok(doomed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Gender, IndicatorDraft, Perspective, Role};

    fn draft(title: &str) -> PlanDraft {
        PlanDraft {
            title: title.to_string(),
            indicators: vec![IndicatorDraft {
                text: "Output".to_string(),
                target: "100%".to_string(),
                perspective: Perspective::Quantity,
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_inserts_under_parent() {
        let gw = Gateway::in_memory(demo::dataset());
        let id = gw.upsert_plan(draft("Intervensi"), "2", Some("rhk-1")).await.unwrap();

        let snap = gw.snapshot().await;
        assert!(id.starts_with("rhk-"));
        let kids: Vec<_> = snap.goals.children_of("rhk-1").iter().map(|p| p.id.clone()).collect();
        assert_eq!(kids, vec![id.clone()]);
        assert_eq!(snap.goals.get(&id).unwrap().indicators.len(), 1);
        assert!(snap.generation > 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_skipped_level() {
        let gw = Gateway::in_memory(demo::dataset());
        let err = gw.upsert_plan(draft("x"), "3", Some("rhk-1")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Link(LinkError::NotDirectSubordinate { .. })));
        assert_eq!(gw.snapshot().await.goals.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_with_draft_id_inserts() {
        let gw = Gateway::in_memory(demo::dataset());
        let mut d = draft("Baru");
        d.id = Some("draft-1".to_string());
        let id = gw.upsert_plan(d, "1", None).await.unwrap();
        assert_ne!(id, "draft-1");
        assert_eq!(gw.snapshot().await.goals.roots_of("1").len(), 2);
    }

    #[tokio::test]
    async fn test_edit_replaces_indicators_in_place() {
        let gw = Gateway::in_memory(demo::dataset());
        let snap = gw.snapshot().await;
        let mut d = PlanDraft::from(snap.goals.get("rhk-1").unwrap());
        d.title = "Judul baru".to_string();
        d.indicators.clear();

        let id = gw.upsert_plan(d, "1", None).await.unwrap();
        assert_eq!(id, "rhk-1");
        let plan = gw.snapshot().await.goals.get("rhk-1").cloned().unwrap();
        assert_eq!(plan.title, "Judul baru");
        assert!(plan.indicators.is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_plan_is_rejected() {
        let gw = Gateway::in_memory(demo::dataset());
        let mut d = draft("x");
        d.id = Some("rhk-404".to_string());
        assert_eq!(
            gw.upsert_plan(d, "1", None).await.unwrap_err(),
            GatewayError::UnknownPlan("rhk-404".to_string())
        );
    }

    #[tokio::test]
    async fn test_delete_plan_cascades() {
        let gw = Gateway::in_memory(demo::dataset());
        let child = gw.upsert_plan(draft("P2"), "2", Some("rhk-1")).await.unwrap();
        let grandchild = gw.upsert_plan(draft("P3"), "3", Some(&child)).await.unwrap();

        let removed = gw.delete_plan("rhk-1").await.unwrap();
        assert_eq!(removed, vec![grandchild, child, "rhk-1".to_string()]);
        assert!(gw.snapshot().await.goals.is_empty());
    }

    #[tokio::test]
    async fn test_create_staff_visible_immediately() {
        let gw = Gateway::in_memory(demo::dataset());
        let id = gw
            .create_staff(NewStaff {
                business_key: "200001012020011001".to_string(),
                name: "Budi".to_string(),
                position: "Analis".to_string(),
                role: Role::Pelaksana,
                gender: Gender::Male,
                superior_id: Some("4".to_string()),
                is_part_time: false,
            })
            .await
            .unwrap();

        let snap = gw.snapshot().await;
        let subs: Vec<_> = snap.org.direct_subordinates("4").iter().map(|m| m.id.clone()).collect();
        assert!(subs.contains(&id));
    }

    #[tokio::test]
    async fn test_duplicate_business_key_rejected() {
        let gw = Gateway::in_memory(demo::dataset());
        let err = gw
            .create_staff(NewStaff {
                business_key: demo::ADMIN_BUSINESS_KEY.to_string(),
                name: "Dup".to_string(),
                position: String::new(),
                role: Role::Pelaksana,
                gender: Gender::Female,
                superior_id: None,
                is_part_time: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::DuplicateBusinessKey(_)));
    }

    #[tokio::test]
    async fn test_update_staff_rejects_cycle_and_broken_links() {
        let gw = Gateway::in_memory(demo::dataset());
        let snap = gw.snapshot().await;

        let mut top = snap.org.get("1").cloned().unwrap();
        top.superior_id = Some("5".to_string());
        assert!(matches!(
            gw.update_staff(top).await,
            Err(GatewayError::Hierarchy(HierarchyError::Cycle(_)))
        ));

        gw.upsert_plan(draft("P2"), "2", Some("rhk-1")).await.unwrap();
        let mut asisten = snap.org.get("2").cloned().unwrap();
        asisten.superior_id = None;
        assert!(matches!(
            gw.update_staff(asisten).await,
            Err(GatewayError::Link(LinkError::NotDirectSubordinate { .. }))
        ));
    }

    #[tokio::test]
    async fn test_delete_staff_detaches_and_removes_plans() {
        let gw = Gateway::in_memory(demo::dataset());
        let child = gw.upsert_plan(draft("P2"), "2", Some("rhk-1")).await.unwrap();

        let removed = gw.delete_staff("1").await.unwrap();
        assert_eq!(removed, vec![child, "rhk-1".to_string()]);

        let snap = gw.snapshot().await;
        assert!(!snap.org.contains("1"));
        assert_eq!(snap.org.get("2").unwrap().superior_id, None);
        assert!(snap.goals.is_empty());
    }

    #[tokio::test]
    async fn test_seed_admin_is_idempotent() {
        let gw = Gateway::in_memory(Dataset::default());
        let first = gw.seed_admin().await.unwrap();
        let second = gw.seed_admin().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(gw.snapshot().await.org.len(), 1);
    }
}
