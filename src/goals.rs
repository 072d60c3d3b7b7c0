//! Goal tree
//!
//! Result plans indexed by owner and by parent. A plan with a parent must be
//! owned by a direct subordinate of the parent's owner, so every cascade edge
//! goes exactly one reporting level down.

use std::collections::{HashMap, HashSet};

use crate::model::{PlanId, ResultPlan, StaffId};
use crate::org::OrgHierarchy;

/// Why a plan may not sit where it was placed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("unknown plan owner: {0}")]
    UnknownOwner(StaffId),

    #[error("administrative staff member {0} cannot own plans")]
    AdminOwner(StaffId),

    #[error("unknown parent plan: {0}")]
    UnknownParent(PlanId),

    #[error("{owner} is not a direct subordinate of {parent_owner}, owner of the parent plan")]
    NotDirectSubordinate { owner: StaffId, parent_owner: StaffId },
}

/// A stored plan that breaks a cascade rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkViolation {
    pub plan_id: PlanId,
    pub error: LinkError,
}

/// Indexed view of the result plans
#[derive(Debug, Clone, Default)]
pub struct GoalTree {
    plans: Vec<ResultPlan>,
    by_id: HashMap<PlanId, usize>,
    by_owner: HashMap<StaffId, Vec<usize>>,
    children: HashMap<PlanId, Vec<usize>>,
}

impl GoalTree {
    pub fn new(plans: Vec<ResultPlan>) -> Self {
        let mut by_id = HashMap::with_capacity(plans.len());
        let mut by_owner: HashMap<StaffId, Vec<usize>> = HashMap::new();
        let mut children: HashMap<PlanId, Vec<usize>> = HashMap::new();

        for (idx, plan) in plans.iter().enumerate() {
            by_id.insert(plan.id.clone(), idx);
            by_owner.entry(plan.owner_id.clone()).or_default().push(idx);
            if let Some(parent) = &plan.parent_id {
                children.entry(parent.clone()).or_default().push(idx);
            }
        }

        Self {
            plans,
            by_id,
            by_owner,
            children,
        }
    }

    pub fn plans(&self) -> &[ResultPlan] {
        &self.plans
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ResultPlan> {
        self.by_id.get(id).map(|&idx| &self.plans[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// All plans owned by `member`, cascaded or not
    pub fn plans_of(&self, member: &str) -> Vec<&ResultPlan> {
        self.indexed(self.by_owner.get(member))
    }

    /// Top-level plans of `member`
    pub fn roots_of(&self, member: &str) -> Vec<&ResultPlan> {
        self.plans_of(member)
            .into_iter()
            .filter(|p| p.parent_id.is_none())
            .collect()
    }

    pub fn children_of(&self, plan: &str) -> Vec<&ResultPlan> {
        self.indexed(self.children.get(plan))
    }

    /// Every plan below `plan`, children before their parents
    pub fn descendants(&self, plan: &str) -> Vec<PlanId> {
        let mut out = Vec::new();
        let mut visited = HashSet::from([plan.to_string()]);
        self.collect_descendants(plan, &mut visited, &mut out);
        out
    }

    fn collect_descendants(&self, plan: &str, visited: &mut HashSet<PlanId>, out: &mut Vec<PlanId>) {
        for child in self.children_of(plan) {
            if visited.insert(child.id.clone()) {
                self.collect_descendants(&child.id, visited, out);
                out.push(child.id.clone());
            }
        }
    }

    /// Check that `owner` may hold a plan under `parent`
    pub fn check_link(
        &self,
        org: &OrgHierarchy,
        owner: &str,
        parent: Option<&str>,
    ) -> Result<(), LinkError> {
        let member = org
            .get(owner)
            .ok_or_else(|| LinkError::UnknownOwner(owner.to_string()))?;
        if member.role.is_admin() {
            return Err(LinkError::AdminOwner(owner.to_string()));
        }

        let Some(parent) = parent else {
            return Ok(());
        };
        let parent_plan = self
            .get(parent)
            .ok_or_else(|| LinkError::UnknownParent(parent.to_string()))?;

        if org.is_direct_subordinate(owner, &parent_plan.owner_id) {
            Ok(())
        } else {
            Err(LinkError::NotDirectSubordinate {
                owner: owner.to_string(),
                parent_owner: parent_plan.owner_id.clone(),
            })
        }
    }

    /// Stored plans that no longer satisfy the cascade rules
    pub fn violations(&self, org: &OrgHierarchy) -> Vec<LinkViolation> {
        self.plans
            .iter()
            .filter_map(|plan| {
                self.check_link(org, &plan.owner_id, plan.parent_id.as_deref())
                    .err()
                    .map(|error| LinkViolation {
                        plan_id: plan.id.clone(),
                        error,
                    })
            })
            .collect()
    }

    fn indexed(&self, idxs: Option<&Vec<usize>>) -> Vec<&ResultPlan> {
        idxs.map(|idxs| idxs.iter().map(|&idx| &self.plans[idx]).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Gender, PlanStatus, PlanType, Role, StaffMember};

    fn member(id: &str, role: Role, superior: Option<&str>) -> StaffMember {
        StaffMember {
            id: id.to_string(),
            business_key: format!("nip-{}", id),
            name: id.to_uppercase(),
            position: String::new(),
            role,
            gender: Gender::Female,
            superior_id: superior.map(str::to_string),
            is_part_time: false,
        }
    }

    fn plan(id: &str, owner: &str, parent: Option<&str>) -> ResultPlan {
        ResultPlan {
            id: id.to_string(),
            owner_id: owner.to_string(),
            parent_id: parent.map(str::to_string),
            title: format!("Plan {}", id),
            description: String::new(),
            plan_type: PlanType::Primary,
            status: PlanStatus::Draft,
            indicators: vec![],
        }
    }

    fn org() -> OrgHierarchy {
        OrgHierarchy::new(vec![
            member("admin", Role::Admin, None),
            member("a", Role::Sekda, None),
            member("b", Role::Asisten, Some("a")),
            member("c", Role::Kabag, Some("b")),
        ])
    }

    #[test]
    fn test_roots_and_children() {
        let tree = GoalTree::new(vec![
            plan("p1", "a", None),
            plan("p2", "b", Some("p1")),
            plan("p3", "b", Some("p1")),
            plan("p4", "c", Some("p2")),
            plan("p5", "b", None),
        ]);

        let roots: Vec<_> = tree.roots_of("a").iter().map(|p| p.id.as_str()).collect();
        assert_eq!(roots, vec!["p1"]);
        let roots_b: Vec<_> = tree.roots_of("b").iter().map(|p| p.id.as_str()).collect();
        assert_eq!(roots_b, vec!["p5"]);
        let kids: Vec<_> = tree.children_of("p1").iter().map(|p| p.id.as_str()).collect();
        assert_eq!(kids, vec!["p2", "p3"]);
        assert_eq!(tree.plans_of("b").len(), 3);
    }

    #[test]
    fn test_descendants_post_order() {
        let tree = GoalTree::new(vec![
            plan("p1", "a", None),
            plan("p2", "b", Some("p1")),
            plan("p4", "c", Some("p2")),
            plan("p3", "b", Some("p1")),
        ]);
        assert_eq!(tree.descendants("p1"), vec!["p4", "p2", "p3"]);
        assert!(tree.descendants("p4").is_empty());
    }

    #[test]
    fn test_check_link_enforces_one_level() {
        let org = org();
        let tree = GoalTree::new(vec![plan("p1", "a", None), plan("p2", "b", Some("p1"))]);

        assert!(tree.check_link(&org, "b", Some("p1")).is_ok());
        assert!(tree.check_link(&org, "c", Some("p2")).is_ok());
        assert_eq!(
            tree.check_link(&org, "c", Some("p1")),
            Err(LinkError::NotDirectSubordinate {
                owner: "c".to_string(),
                parent_owner: "a".to_string(),
            })
        );
        assert_eq!(
            tree.check_link(&org, "admin", None),
            Err(LinkError::AdminOwner("admin".to_string()))
        );
        assert_eq!(
            tree.check_link(&org, "b", Some("gone")),
            Err(LinkError::UnknownParent("gone".to_string()))
        );
    }

    #[test]
    fn test_violations_report_dangling_links() {
        let org = org();
        let tree = GoalTree::new(vec![
            plan("p1", "a", None),
            plan("p2", "c", Some("p1")),
            plan("p3", "ghost", None),
        ]);
        let bad: Vec<_> = tree.violations(&org).into_iter().map(|v| v.plan_id).collect();
        assert_eq!(bad, vec!["p2", "p3"]);
    }
}
