//! Result plans (RHK) and indicators (IKI)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{IndicatorId, PlanId, StaffId, UnknownTag};

/// Ids with this prefix were never persisted; upserting them inserts
pub const DRAFT_ID_PREFIX: &str = "draft-";

/// Measurement perspective of an indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Perspective {
    #[default]
    #[serde(rename = "Kualitas")]
    Quality,
    #[serde(rename = "Kuantitas")]
    Quantity,
    #[serde(rename = "Waktu")]
    Time,
    #[serde(rename = "Biaya")]
    Cost,
}

impl Perspective {
    pub const ALL: [Perspective; 4] = [
        Perspective::Quality,
        Perspective::Quantity,
        Perspective::Time,
        Perspective::Cost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Perspective::Quality => "Kualitas",
            Perspective::Quantity => "Kuantitas",
            Perspective::Time => "Waktu",
            Perspective::Cost => "Biaya",
        }
    }
}

impl fmt::Display for Perspective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Perspective {
    type Err = UnknownTag;

    /// Accepts the stored names and their English equivalents
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kualitas" | "quality" => Ok(Perspective::Quality),
            "kuantitas" | "quantity" => Ok(Perspective::Quantity),
            "waktu" | "time" => Ok(Perspective::Time),
            "biaya" | "cost" => Ok(Perspective::Cost),
            _ => Err(UnknownTag::new("perspective", s)),
        }
    }
}

/// Primary or supplementary plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlanType {
    #[default]
    #[serde(rename = "Utama")]
    Primary,
    #[serde(rename = "Tambahan")]
    Supplementary,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Primary => "Utama",
            PlanType::Supplementary => "Tambahan",
        }
    }
}

impl FromStr for PlanType {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utama" | "primary" => Ok(PlanType::Primary),
            "tambahan" | "supplementary" => Ok(PlanType::Supplementary),
            _ => Err(UnknownTag::new("plan type", s)),
        }
    }
}

/// Review status of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlanStatus {
    #[default]
    Draft,
    Review,
    Approved,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Draft => "Draft",
            PlanStatus::Review => "Review",
            PlanStatus::Approved => "Approved",
        }
    }
}

impl FromStr for PlanStatus {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(PlanStatus::Draft),
            "review" => Ok(PlanStatus::Review),
            "approved" => Ok(PlanStatus::Approved),
            _ => Err(UnknownTag::new("plan status", s)),
        }
    }
}

/// A measurable sub-target of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub id: IndicatorId,
    pub text: String,
    pub target: String,
    pub perspective: Perspective,
}

/// An indicator row as edited on a form; ids are assigned on save
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorDraft {
    pub text: String,
    pub target: String,
    #[serde(default)]
    pub perspective: Perspective,
}

impl From<&Indicator> for IndicatorDraft {
    fn from(ind: &Indicator) -> Self {
        Self {
            text: ind.text.clone(),
            target: ind.target.clone(),
            perspective: ind.perspective,
        }
    }
}

/// A performance goal owned by one staff member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPlan {
    pub id: PlanId,
    pub owner_id: StaffId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<PlanId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub plan_type: PlanType,
    #[serde(default)]
    pub status: PlanStatus,
    #[serde(default)]
    pub indicators: Vec<Indicator>,
}

/// The partial plan handed to an upsert
///
/// Owner and parent travel separately so a form never decides them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDraft {
    #[serde(default)]
    pub id: Option<PlanId>,
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

impl PlanDraft {
    /// True when upserting this draft must create a new row
    pub fn is_insert(&self) -> bool {
        match self.id.as_deref() {
            None => true,
            Some(id) => id.is_empty() || id.starts_with(DRAFT_ID_PREFIX),
        }
    }

    /// Materialize the draft with store-assigned ids
    pub fn into_plan(
        self,
        id: PlanId,
        owner_id: StaffId,
        parent_id: Option<PlanId>,
        mut next_indicator_id: impl FnMut() -> IndicatorId,
    ) -> ResultPlan {
        ResultPlan {
            id,
            owner_id,
            parent_id,
            title: self.title,
            description: self.description,
            plan_type: self.plan_type.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            indicators: self
                .indicators
                .into_iter()
                .map(|d| Indicator {
                    id: next_indicator_id(),
                    text: d.text,
                    target: d.target,
                    perspective: d.perspective,
                })
                .collect(),
        }
    }
}

impl From<&ResultPlan> for PlanDraft {
    fn from(plan: &ResultPlan) -> Self {
        Self {
            id: Some(plan.id.clone()),
            title: plan.title.clone(),
            description: plan.description.clone(),
            plan_type: Some(plan.plan_type),
            status: Some(plan.status),
            indicators: plan.indicators.iter().map(IndicatorDraft::from).collect(),
        }
    }
}
