//! Process-local backend
//!
//! Writes mutate a collection in place and are visible to the very next
//! `load_all`. Ids are prefixed uuids so they never collide with the demo
//! dataset or the unpersisted-draft sentinel.

use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Backend, BackendError, BackendKind, Loaded, PlanFields};
use crate::model::{
    Dataset, Indicator, IndicatorDraft, NewStaff, PlanId, ResultPlan, StaffId, StaffMember,
};

pub struct InMemoryBackend {
    data: RwLock<Dataset>,
}

impl InMemoryBackend {
    pub fn new(seed: Dataset) -> Self {
        Self {
            data: RwLock::new(seed),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(Dataset::default())
    }
}

fn next_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

fn key_taken(data: &Dataset, key: &str, except: Option<&str>) -> bool {
    data.staff
        .iter()
        .any(|m| m.business_key == key && Some(m.id.as_str()) != except)
}

#[async_trait::async_trait]
impl Backend for InMemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::InMemory
    }

    async fn load_all(&self) -> Result<Loaded, BackendError> {
        Ok(Loaded::clean(self.data.read().await.clone()))
    }

    async fn insert_staff(&self, staff: &[NewStaff]) -> Result<Vec<StaffId>, BackendError> {
        let mut data = self.data.write().await;

        // All or nothing, like a single multi-row insert
        for (i, new) in staff.iter().enumerate() {
            let repeated = staff[..i].iter().any(|s| s.business_key == new.business_key);
            if repeated || key_taken(&data, &new.business_key, None) {
                return Err(BackendError::Conflict(format!(
                    "business key {} already exists",
                    new.business_key
                )));
            }
        }

        let mut ids = Vec::with_capacity(staff.len());
        for new in staff {
            let id = next_id("emp");
            data.staff.push(new.clone().into_member(id.clone()));
            ids.push(id);
        }
        Ok(ids)
    }

    async fn update_staff(&self, member: &StaffMember) -> Result<(), BackendError> {
        let mut data = self.data.write().await;
        if key_taken(&data, &member.business_key, Some(&member.id)) {
            return Err(BackendError::Conflict(format!(
                "business key {} already exists",
                member.business_key
            )));
        }

        let slot = data
            .staff
            .iter_mut()
            .find(|m| m.id == member.id)
            .ok_or_else(|| BackendError::NotFound(format!("staff {}", member.id)))?;
        *slot = member.clone();
        Ok(())
    }

    async fn delete_staff(&self, id: &str) -> Result<(), BackendError> {
        let mut data = self.data.write().await;
        let before = data.staff.len();
        data.staff.retain(|m| m.id != id);
        if data.staff.len() == before {
            return Err(BackendError::NotFound(format!("staff {}", id)));
        }
        Ok(())
    }

    async fn insert_plan(&self, fields: &PlanFields) -> Result<PlanId, BackendError> {
        let id = next_id("rhk");
        self.data.write().await.plans.push(ResultPlan {
            id: id.clone(),
            owner_id: fields.owner_id.clone(),
            parent_id: fields.parent_id.clone(),
            title: fields.title.clone(),
            description: fields.description.clone(),
            plan_type: fields.plan_type,
            status: fields.status,
            indicators: Vec::new(),
        });
        Ok(id)
    }

    async fn update_plan(&self, id: &str, fields: &PlanFields) -> Result<(), BackendError> {
        let mut data = self.data.write().await;
        let plan = data
            .plans
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| BackendError::NotFound(format!("plan {}", id)))?;

        plan.owner_id = fields.owner_id.clone();
        plan.parent_id = fields.parent_id.clone();
        plan.title = fields.title.clone();
        plan.description = fields.description.clone();
        plan.plan_type = fields.plan_type;
        plan.status = fields.status;
        Ok(())
    }

    async fn replace_indicators(
        &self,
        plan_id: &str,
        indicators: &[IndicatorDraft],
    ) -> Result<(), BackendError> {
        let mut data = self.data.write().await;
        let plan = data
            .plans
            .iter_mut()
            .find(|p| p.id == plan_id)
            .ok_or_else(|| BackendError::NotFound(format!("plan {}", plan_id)))?;

        plan.indicators = indicators
            .iter()
            .map(|d| Indicator {
                id: next_id("ind"),
                text: d.text.clone(),
                target: d.target.clone(),
                perspective: d.perspective,
            })
            .collect();
        Ok(())
    }

    async fn delete_plans(&self, ids: &[PlanId]) -> Result<(), BackendError> {
        let mut data = self.data.write().await;
        data.plans.retain(|p| !ids.contains(&p.id));
        Ok(())
    }
}
