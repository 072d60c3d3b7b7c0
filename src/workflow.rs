//! Intervention workflow
//!
//! A short-lived state machine that creates or edits one plan:
//!
//! ```text
//! Closed --open_*--> Open --submit--> Submitting --ok--> Closed
//!                     ^                    |
//!                     +------- error ------+
//! ```
//!
//! Owner and parent are fixed when the workflow opens; the form only carries
//! the plan body. A failed submit returns to `Open` with the error recorded
//! on the form so nothing the user typed is lost.

use serde::Serialize;
use tracing::{debug, info};

use crate::assist::Suggester;
use crate::gateway::{Gateway, GatewayError, Snapshot};
use crate::goals::LinkError;
use crate::model::{
    IndicatorDraft, PlanDraft, PlanId, PlanStatus, PlanType, ResultPlan, StaffId, StaffMember,
};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("no plan form is open")]
    NotOpen,

    #[error("a submit is already in progress")]
    Busy,

    #[error("unknown plan: {0}")]
    UnknownPlan(PlanId),

    #[error("unknown staff member: {0}")]
    UnknownStaff(StaffId),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("{0}")]
    Validation(String),

    #[error("suggestions need a parent plan and a configured service")]
    AssistUnavailable,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// What the open form will produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InterventionContext {
    NewTopLevel {
        owner: StaffId,
    },
    NewIntervention {
        parent: PlanId,
        target: StaffId,
    },
    EditExisting {
        plan: PlanId,
        owner: StaffId,
        parent: Option<PlanId>,
    },
}

impl InterventionContext {
    /// Member who will own the saved plan
    pub fn owner(&self) -> &str {
        match self {
            InterventionContext::NewTopLevel { owner } => owner,
            InterventionContext::NewIntervention { target, .. } => target,
            InterventionContext::EditExisting { owner, .. } => owner,
        }
    }

    pub fn parent(&self) -> Option<&str> {
        match self {
            InterventionContext::NewTopLevel { .. } => None,
            InterventionContext::NewIntervention { parent, .. } => Some(parent),
            InterventionContext::EditExisting { parent, .. } => parent.as_deref(),
        }
    }
}

/// Editable plan body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanForm {
    /// Set when editing an existing plan
    pub id: Option<PlanId>,
    pub title: String,
    pub description: String,
    pub plan_type: PlanType,
    pub status: PlanStatus,
    pub indicators: Vec<IndicatorDraft>,
    /// Why the last submit failed
    pub last_error: Option<String>,
}

impl PlanForm {
    fn blank() -> Self {
        Self {
            indicators: vec![IndicatorDraft::default()],
            ..Default::default()
        }
    }

    fn from_plan(plan: &ResultPlan) -> Self {
        let draft = PlanDraft::from(plan);
        Self {
            id: draft.id,
            title: draft.title,
            description: draft.description,
            plan_type: plan.plan_type,
            status: plan.status,
            indicators: draft.indicators,
            last_error: None,
        }
    }

    pub fn add_indicator(&mut self) -> &mut IndicatorDraft {
        self.indicators.push(IndicatorDraft::default());
        let last = self.indicators.len() - 1;
        &mut self.indicators[last]
    }

    pub fn remove_indicator(&mut self, index: usize) -> Option<IndicatorDraft> {
        (index < self.indicators.len()).then(|| self.indicators.remove(index))
    }

    pub fn indicator_mut(&mut self, index: usize) -> Option<&mut IndicatorDraft> {
        self.indicators.get_mut(index)
    }

    fn to_draft(&self) -> PlanDraft {
        PlanDraft {
            id: self.id.clone(),
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            plan_type: Some(self.plan_type),
            status: Some(self.status),
            // Rows left completely blank are not saved
            indicators: self
                .indicators
                .iter()
                .filter(|i| !i.text.trim().is_empty() || !i.target.trim().is_empty())
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Closed,
    Open {
        context: InterventionContext,
        form: PlanForm,
    },
    Submitting {
        context: InterventionContext,
        form: PlanForm,
    },
}

/// Members a plan can be intervened into
pub fn intervention_targets<'a>(
    snapshot: &'a Snapshot,
    parent: &str,
) -> Result<Vec<&'a StaffMember>, WorkflowError> {
    let plan = snapshot
        .goals
        .get(parent)
        .ok_or_else(|| WorkflowError::UnknownPlan(parent.to_string()))?;
    Ok(snapshot.org.direct_subordinates(&plan.owner_id))
}

#[derive(Debug, Default)]
pub struct InterventionWorkflow {
    state: WorkflowState,
}

impl InterventionWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, WorkflowState::Open { .. })
    }

    pub fn context(&self) -> Option<&InterventionContext> {
        match &self.state {
            WorkflowState::Closed => None,
            WorkflowState::Open { context, .. } | WorkflowState::Submitting { context, .. } => {
                Some(context)
            }
        }
    }

    pub fn form(&self) -> Option<&PlanForm> {
        match &self.state {
            WorkflowState::Closed => None,
            WorkflowState::Open { form, .. } | WorkflowState::Submitting { form, .. } => Some(form),
        }
    }

    /// The form, while it may be edited
    pub fn form_mut(&mut self) -> Option<&mut PlanForm> {
        match &mut self.state {
            WorkflowState::Open { form, .. } => Some(form),
            _ => None,
        }
    }

    fn open(&mut self, context: InterventionContext, form: PlanForm) -> Result<(), WorkflowError> {
        if matches!(self.state, WorkflowState::Submitting { .. }) {
            return Err(WorkflowError::Busy);
        }
        debug!(?context, "Plan form opened");
        self.state = WorkflowState::Open { context, form };
        Ok(())
    }

    /// New root plan for `owner`
    pub fn open_top_level(&mut self, snapshot: &Snapshot, owner: &str) -> Result<(), WorkflowError> {
        snapshot.goals.check_link(&snapshot.org, owner, None)?;
        self.open(
            InterventionContext::NewTopLevel {
                owner: owner.to_string(),
            },
            PlanForm::blank(),
        )
    }

    /// New plan for `target` cascaded from `parent`
    pub fn open_intervention(
        &mut self,
        snapshot: &Snapshot,
        parent: &str,
        target: &str,
    ) -> Result<(), WorkflowError> {
        if !snapshot.goals.contains(parent) {
            return Err(WorkflowError::UnknownPlan(parent.to_string()));
        }
        if !snapshot.org.contains(target) {
            return Err(WorkflowError::UnknownStaff(target.to_string()));
        }
        snapshot.goals.check_link(&snapshot.org, target, Some(parent))?;

        self.open(
            InterventionContext::NewIntervention {
                parent: parent.to_string(),
                target: target.to_string(),
            },
            PlanForm::blank(),
        )
    }

    /// Edit an existing plan in place
    pub fn open_edit(&mut self, snapshot: &Snapshot, plan_id: &str) -> Result<(), WorkflowError> {
        let plan = snapshot
            .goals
            .get(plan_id)
            .ok_or_else(|| WorkflowError::UnknownPlan(plan_id.to_string()))?;

        self.open(
            InterventionContext::EditExisting {
                plan: plan.id.clone(),
                owner: plan.owner_id.clone(),
                parent: plan.parent_id.clone(),
            },
            PlanForm::from_plan(plan),
        )
    }

    /// Discard the form; a no-op when already closed
    pub fn close(&mut self) {
        if !matches!(self.state, WorkflowState::Submitting { .. }) {
            self.state = WorkflowState::Closed;
        }
    }

    /// Suggestions are offered only with a parent plan in context
    pub fn assist_available(&self, suggester: &dyn Suggester) -> bool {
        self.is_open()
            && suggester.is_available()
            && self.context().and_then(|c| c.parent()).is_some()
    }

    /// Ask for a suggestion and pre-fill the form with it
    ///
    /// Returns whether the form changed. Title, description and indicators
    /// are replaced together; with no suggestion the form is left as is.
    pub async fn request_suggestion(
        &mut self,
        snapshot: &Snapshot,
        suggester: &dyn Suggester,
    ) -> Result<bool, WorkflowError> {
        if !self.is_open() {
            return Err(WorkflowError::NotOpen);
        }
        if !self.assist_available(suggester) {
            return Err(WorkflowError::AssistUnavailable);
        }
        let context = self.context().cloned().ok_or(WorkflowError::NotOpen)?;
        let parent_id = context.parent().ok_or(WorkflowError::AssistUnavailable)?;

        let parent = snapshot
            .goals
            .get(parent_id)
            .ok_or_else(|| WorkflowError::UnknownPlan(parent_id.to_string()))?;
        let target = snapshot
            .org
            .get(context.owner())
            .ok_or_else(|| WorkflowError::UnknownStaff(context.owner().to_string()))?;

        let Some(suggestion) = suggester.suggest(parent, target.role, &target.position).await else {
            return Ok(false);
        };

        let form = self.form_mut().ok_or(WorkflowError::NotOpen)?;
        form.title = suggestion.title;
        form.description = suggestion.description;
        form.indicators = suggestion.indicators;
        Ok(true)
    }

    /// Save the form through the gateway
    ///
    /// On success the workflow closes and the gateway has already reloaded.
    /// On failure it stays open with `last_error` set.
    pub async fn submit(&mut self, gateway: &Gateway) -> Result<PlanId, WorkflowError> {
        let (context, mut form) = match std::mem::take(&mut self.state) {
            WorkflowState::Open { context, form } => (context, form),
            other => {
                let busy = matches!(other, WorkflowState::Submitting { .. });
                self.state = other;
                return Err(if busy { WorkflowError::Busy } else { WorkflowError::NotOpen });
            }
        };

        if form.title.trim().is_empty() {
            let err = WorkflowError::Validation("title must not be empty".to_string());
            form.last_error = Some(err.to_string());
            self.state = WorkflowState::Open { context, form };
            return Err(err);
        }

        let draft = form.to_draft();
        self.state = WorkflowState::Submitting {
            context: context.clone(),
            form,
        };

        let in_flight = ReopenOnDrop(&mut self.state);
        let result = gateway
            .upsert_plan(draft, context.owner(), context.parent())
            .await;
        drop(in_flight);

        match result {
            Ok(id) => {
                info!(plan_id = %id, owner = %context.owner(), "Plan form submitted");
                self.state = WorkflowState::Closed;
                Ok(id)
            }
            Err(e) => {
                if let Some(form) = self.form_mut() {
                    form.last_error = Some(e.to_string());
                }
                Err(e.into())
            }
        }
    }
}

/// Puts a `Submitting` state back to `Open`
///
/// Held across the gateway call so a cancelled submit leaves an editable
/// form rather than a workflow stuck in `Submitting`.
struct ReopenOnDrop<'a>(&'a mut WorkflowState);

impl Drop for ReopenOnDrop<'_> {
    fn drop(&mut self) {
        if let WorkflowState::Submitting { context, form } = std::mem::take(self.0) {
            *self.0 = WorkflowState::Open { context, form };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::assist::Suggestion;
    use crate::demo;
    use crate::gateway::{Backend, BackendError, BackendKind, InMemoryBackend, Loaded, PlanFields};
    use crate::model::{NewStaff, Perspective, Role};

    struct FixedSuggester(Option<Suggestion>);

    #[async_trait::async_trait]
    impl Suggester for FixedSuggester {
        fn is_available(&self) -> bool {
            true
        }

        async fn suggest(&self, _: &ResultPlan, _: Role, _: &str) -> Option<Suggestion> {
            self.0.clone()
        }
    }

    /// Loads normally but never finishes a plan write
    struct StalledWrites(InMemoryBackend);

    #[async_trait::async_trait]
    impl Backend for StalledWrites {
        fn kind(&self) -> BackendKind {
            BackendKind::InMemory
        }

        async fn load_all(&self) -> Result<Loaded, BackendError> {
            self.0.load_all().await
        }

        async fn insert_staff(&self, staff: &[NewStaff]) -> Result<Vec<StaffId>, BackendError> {
            self.0.insert_staff(staff).await
        }

        async fn update_staff(&self, member: &StaffMember) -> Result<(), BackendError> {
            self.0.update_staff(member).await
        }

        async fn delete_staff(&self, id: &str) -> Result<(), BackendError> {
            self.0.delete_staff(id).await
        }

        async fn insert_plan(&self, _: &PlanFields) -> Result<PlanId, BackendError> {
            std::future::pending().await
        }

        async fn update_plan(&self, _: &str, _: &PlanFields) -> Result<(), BackendError> {
            std::future::pending().await
        }

        async fn replace_indicators(
            &self,
            plan_id: &str,
            indicators: &[IndicatorDraft],
        ) -> Result<(), BackendError> {
            self.0.replace_indicators(plan_id, indicators).await
        }

        async fn delete_plans(&self, ids: &[PlanId]) -> Result<(), BackendError> {
            self.0.delete_plans(ids).await
        }
    }

    fn suggestion() -> Suggestion {
        Suggestion {
            title: "Evaluasi Kelembagaan".to_string(),
            description: "Penataan organisasi".to_string(),
            indicators: vec![IndicatorDraft {
                text: "Rekomendasi".to_string(),
                target: "2 dokumen".to_string(),
                perspective: Perspective::Quantity,
            }],
        }
    }

    #[tokio::test]
    async fn test_intervention_submit_closes_and_links() {
        let gw = Gateway::in_memory(demo::dataset());
        let snap = gw.snapshot().await;
        let mut wf = InterventionWorkflow::new();

        wf.open_intervention(&snap, "rhk-1", "2").unwrap();
        wf.form_mut().unwrap().title = "Intervensi Asisten".to_string();
        let id = wf.submit(&gw).await.unwrap();

        assert_eq!(wf.state(), &WorkflowState::Closed);
        let snap = gw.snapshot().await;
        assert_eq!(snap.goals.get(&id).unwrap().parent_id.as_deref(), Some("rhk-1"));
        // The blank starter row is not saved
        assert!(snap.goals.get(&id).unwrap().indicators.is_empty());
    }

    #[tokio::test]
    async fn test_open_intervention_rejects_non_subordinate() {
        let gw = Gateway::in_memory(demo::dataset());
        let snap = gw.snapshot().await;
        let mut wf = InterventionWorkflow::new();

        let err = wf.open_intervention(&snap, "rhk-1", "3").unwrap_err();
        assert!(matches!(err, WorkflowError::Link(LinkError::NotDirectSubordinate { .. })));
        assert!(!wf.is_open());

        let targets: Vec<_> = intervention_targets(&snap, "rhk-1")
            .unwrap()
            .iter()
            .map(|m| m.id.clone())
            .collect();
        assert_eq!(targets, vec!["2"]);
    }

    #[tokio::test]
    async fn test_empty_title_keeps_form_open() {
        let gw = Gateway::in_memory(demo::dataset());
        let snap = gw.snapshot().await;
        let mut wf = InterventionWorkflow::new();

        wf.open_top_level(&snap, "1").unwrap();
        wf.form_mut().unwrap().description = "keep me".to_string();
        assert!(matches!(wf.submit(&gw).await, Err(WorkflowError::Validation(_))));

        let form = wf.form().unwrap();
        assert!(wf.is_open());
        assert_eq!(form.description, "keep me");
        assert!(form.last_error.is_some());
    }

    #[tokio::test]
    async fn test_gateway_failure_returns_to_open() {
        let gw = Gateway::in_memory(demo::dataset());
        let snap = gw.snapshot().await;
        let mut wf = InterventionWorkflow::new();
        wf.open_intervention(&snap, "rhk-1", "2").unwrap();
        wf.form_mut().unwrap().title = "Orphan".to_string();

        // Parent disappears between open and submit
        gw.delete_plan("rhk-1").await.unwrap();
        let err = wf.submit(&gw).await.unwrap_err();

        assert!(matches!(err, WorkflowError::Gateway(_)));
        assert!(wf.is_open());
        assert_eq!(wf.form().unwrap().title, "Orphan");
        assert!(wf.form().unwrap().last_error.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_submit_leaves_form_open() {
        let backend = Arc::new(StalledWrites(InMemoryBackend::new(demo::dataset())));
        let gw = Gateway::new(backend).await.unwrap();
        let snap = gw.snapshot().await;
        let mut wf = InterventionWorkflow::new();
        wf.open_intervention(&snap, "rhk-1", "2").unwrap();
        wf.form_mut().unwrap().title = "Tertunda".to_string();

        let timed_out = tokio::time::timeout(Duration::from_millis(50), wf.submit(&gw)).await;
        assert!(timed_out.is_err());

        assert!(wf.is_open());
        assert_eq!(wf.form().unwrap().title, "Tertunda");
        wf.open_edit(&snap, "rhk-1").unwrap();
        wf.close();
        assert_eq!(wf.state(), &WorkflowState::Closed);
    }

    #[tokio::test]
    async fn test_edit_prefills_and_updates_in_place() {
        let gw = Gateway::in_memory(demo::dataset());
        let snap = gw.snapshot().await;
        let mut wf = InterventionWorkflow::new();

        wf.open_edit(&snap, "rhk-1").unwrap();
        let form = wf.form_mut().unwrap();
        assert_eq!(form.indicators.len(), 1);
        form.add_indicator().text = "Survei".to_string();
        let id = wf.submit(&gw).await.unwrap();

        assert_eq!(id, "rhk-1");
        assert_eq!(gw.snapshot().await.goals.get("rhk-1").unwrap().indicators.len(), 2);
    }

    #[tokio::test]
    async fn test_suggestion_replaces_form_wholesale() {
        let gw = Gateway::in_memory(demo::dataset());
        let snap = gw.snapshot().await;
        let mut wf = InterventionWorkflow::new();
        wf.open_intervention(&snap, "rhk-1", "2").unwrap();
        wf.form_mut().unwrap().title = "mine".to_string();

        let none = FixedSuggester(None);
        assert!(!wf.request_suggestion(&snap, &none).await.unwrap());
        assert_eq!(wf.form().unwrap().title, "mine");

        let some = FixedSuggester(Some(suggestion()));
        assert!(wf.request_suggestion(&snap, &some).await.unwrap());
        assert_eq!(wf.form().unwrap(), &PlanForm {
            title: "Evaluasi Kelembagaan".to_string(),
            description: "Penataan organisasi".to_string(),
            indicators: suggestion().indicators,
            ..PlanForm::default()
        });
    }

    #[tokio::test]
    async fn test_assist_not_offered_for_top_level() {
        let gw = Gateway::in_memory(demo::dataset());
        let snap = gw.snapshot().await;
        let mut wf = InterventionWorkflow::new();
        wf.open_top_level(&snap, "1").unwrap();

        let s = FixedSuggester(Some(suggestion()));
        assert!(!wf.assist_available(&s));
        assert!(matches!(
            wf.request_suggestion(&snap, &s).await,
            Err(WorkflowError::AssistUnavailable)
        ));
    }
}
