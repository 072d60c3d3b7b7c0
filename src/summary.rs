//! Read-only views over a snapshot
//!
//! Dashboard counters, the per-member progress table, a member's own plans
//! with their cascade context, and the part-time roster.

use serde::Serialize;

use crate::goals::GoalTree;
use crate::model::{PlanStatus, ResultPlan, Role, StaffMember};
use crate::org::OrgHierarchy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrgSummary {
    pub total_staff: usize,
    pub total_plans: usize,
    pub draft_plans: usize,
    /// Members with a superior who own no plan yet
    pub subordinates_without_plans: usize,
}

pub fn org_summary(org: &OrgHierarchy, goals: &GoalTree) -> OrgSummary {
    OrgSummary {
        total_staff: org.len(),
        total_plans: goals.len(),
        draft_plans: goals
            .plans()
            .iter()
            .filter(|p| p.status == PlanStatus::Draft)
            .count(),
        subordinates_without_plans: org
            .members()
            .iter()
            .filter(|m| m.superior_id.is_some() && goals.plans_of(&m.id).is_empty())
            .count(),
    }
}

fn matches_search(member: &StaffMember, needle: &str) -> bool {
    needle.is_empty()
        || member.name.to_lowercase().contains(needle)
        || member.business_key.contains(needle)
}

/// One line of the progress table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressRow {
    pub staff_id: String,
    pub name: String,
    pub position: String,
    pub role: Role,
    pub plan_count: usize,
    pub filled: bool,
}

/// Plan-filling progress per member, filtered by name or business key
pub fn progress(
    org: &OrgHierarchy,
    goals: &GoalTree,
    search: &str,
    limit: Option<usize>,
) -> Vec<ProgressRow> {
    let needle = search.trim().to_lowercase();
    org.members()
        .iter()
        .filter(|m| !m.role.is_admin())
        .filter(|m| matches_search(m, &needle))
        .take(limit.unwrap_or(usize::MAX))
        .map(|m| {
            let plan_count = goals.plans_of(&m.id).len();
            ProgressRow {
                staff_id: m.id.clone(),
                name: m.name.clone(),
                position: m.position.clone(),
                role: m.role,
                plan_count,
                filled: plan_count > 0,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnPlan {
    pub plan: ResultPlan,
    /// Title of the plan this one was cascaded from
    pub parent_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MyPlans {
    pub member: StaffMember,
    pub superior: Option<StaffMember>,
    pub plans: Vec<OwnPlan>,
}

/// A member's plans alongside their superior
pub fn my_plans(org: &OrgHierarchy, goals: &GoalTree, member_id: &str) -> Option<MyPlans> {
    let member = org.get(member_id)?;
    let plans = goals
        .plans_of(member_id)
        .into_iter()
        .map(|plan| OwnPlan {
            parent_title: plan
                .parent_id
                .as_deref()
                .and_then(|p| goals.get(p))
                .map(|p| p.title.clone()),
            plan: plan.clone(),
        })
        .collect();

    Some(MyPlans {
        member: member.clone(),
        superior: org.superior_of(member_id).cloned(),
        plans,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub member: StaffMember,
    pub plans: Vec<ResultPlan>,
}

/// Part-time members and their plans, filtered by name or business key
pub fn part_time_roster(org: &OrgHierarchy, goals: &GoalTree, search: &str) -> Vec<RosterEntry> {
    let needle = search.trim().to_lowercase();
    org.members()
        .iter()
        .filter(|m| m.is_part_time && matches_search(m, &needle))
        .map(|m| RosterEntry {
            member: m.clone(),
            plans: goals.plans_of(&m.id).into_iter().cloned().collect(),
        })
        .collect()
}

/// Root plans of the top-level members, filtered by title
pub fn leader_plans<'a>(org: &OrgHierarchy, goals: &'a GoalTree, search: &str) -> Vec<&'a ResultPlan> {
    let needle = search.trim().to_lowercase();
    org.top_level_members()
        .into_iter()
        .flat_map(|leader| goals.roots_of(&leader.id))
        .filter(|p| needle.is_empty() || p.title.to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo;

    fn demo_trees() -> (OrgHierarchy, GoalTree) {
        let data = demo::dataset();
        (OrgHierarchy::new(data.staff), GoalTree::new(data.plans))
    }

    #[test]
    fn test_summary_counts() {
        let (org, goals) = demo_trees();
        let s = org_summary(&org, &goals);
        assert_eq!(s.total_staff, 6);
        assert_eq!(s.total_plans, 1);
        assert_eq!(s.draft_plans, 0);
        // Members 2..=5 report to someone and have no plans
        assert_eq!(s.subordinates_without_plans, 4);
    }

    #[test]
    fn test_progress_search_and_admin_excluded() {
        let (org, goals) = demo_trees();
        let all = progress(&org, &goals, "", None);
        assert_eq!(all.len(), 5);
        assert!(all[0].filled);
        assert!(!all[1].filled);

        let rina = progress(&org, &goals, "rina", None);
        assert_eq!(rina.len(), 1);
        assert_eq!(rina[0].staff_id, "5");
        assert_eq!(progress(&org, &goals, "1980", None)[0].staff_id, "3");
        assert_eq!(progress(&org, &goals, "", Some(2)).len(), 2);
    }

    #[test]
    fn test_my_plans_includes_superior() {
        let (org, goals) = demo_trees();
        let mine = my_plans(&org, &goals, "2").unwrap();
        assert_eq!(mine.superior.unwrap().id, "1");
        assert!(mine.plans.is_empty());

        let top = my_plans(&org, &goals, "1").unwrap();
        assert!(top.superior.is_none());
        assert_eq!(top.plans[0].parent_title, None);
        assert!(my_plans(&org, &goals, "nobody").is_none());
    }

    #[test]
    fn test_part_time_roster_and_leader_plans() {
        let data = demo::dataset();
        let mut staff = data.staff;
        staff[5].is_part_time = true;
        let org = OrgHierarchy::new(staff);
        let goals = GoalTree::new(data.plans);

        let roster = part_time_roster(&org, &goals, "");
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].member.id, "5");
        assert!(part_time_roster(&org, &goals, "adi").is_empty());

        assert_eq!(leader_plans(&org, &goals, "reformasi").len(), 1);
        assert!(leader_plans(&org, &goals, "keuangan").is_empty());
    }
}
