//! Domain records shared by every layer
//!
//! - Staff members and the roles of the reporting hierarchy
//! - Result plans (RHK) and their indicators (IKI)
//! - Draft shapes submitted by forms and imports

pub mod plan;
pub mod staff;

pub use plan::{
    Indicator, IndicatorDraft, Perspective, PlanDraft, PlanStatus, PlanType, ResultPlan,
    DRAFT_ID_PREFIX,
};
pub use staff::{Gender, NewStaff, Role, StaffMember};

use serde::{Deserialize, Serialize};

/// Identifier of a staff member
pub type StaffId = String;

/// Identifier of a result plan
pub type PlanId = String;

/// Identifier of an indicator
pub type IndicatorId = String;

/// A tag string that is not part of its closed set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownTag {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownTag {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Everything a full reload brings back from a backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub staff: Vec<StaffMember>,
    pub plans: Vec<ResultPlan>,
}

impl Dataset {
    pub fn new(staff: Vec<StaffMember>, plans: Vec<ResultPlan>) -> Self {
        Self { staff, plans }
    }

    pub fn is_empty(&self) -> bool {
        self.staff.is_empty() && self.plans.is_empty()
    }
}
