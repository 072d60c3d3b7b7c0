//! Traversal of the goal tree for rendering
//!
//! Derives the visible portion of the cascade from a snapshot and a set of
//! expanded plan ids. Rendering never mutates either tree; toggling an id in
//! the expansion set is the only state change.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::goals::GoalTree;
use crate::model::{Indicator, PlanId, PlanStatus, PlanType, ResultPlan, Role, StaffId, StaffMember};
use crate::org::OrgHierarchy;

/// Plan ids whose children are shown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionState {
    expanded: BTreeSet<PlanId>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip `id`; returns whether it is now expanded
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.expanded.remove(id) {
            false
        } else {
            self.expanded.insert(id.to_string());
            true
        }
    }

    pub fn expand(&mut self, id: &str) {
        self.expanded.insert(id.to_string());
    }

    pub fn collapse(&mut self, id: &str) {
        self.expanded.remove(id);
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }

    /// Forget ids that vanished in a reload
    pub fn retain_existing(&mut self, goals: &GoalTree) {
        self.expanded.retain(|id| goals.contains(id));
    }
}

impl<S: AsRef<str>> FromIterator<S> for ExpansionState {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            expanded: iter.into_iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }
}

/// Owner display data on a plan card
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerCard {
    pub id: StaffId,
    pub name: String,
    pub position: String,
    pub role: Role,
    pub role_label: &'static str,
}

impl From<&StaffMember> for OwnerCard {
    fn from(m: &StaffMember) -> Self {
        Self {
            id: m.id.clone(),
            name: m.name.clone(),
            position: m.position.clone(),
            role: m.role,
            role_label: m.role.label(),
        }
    }
}

/// One rendered plan and, when expanded, its rendered children
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibleNode {
    pub plan_id: PlanId,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub plan_type: PlanType,
    pub status: PlanStatus,
    pub depth: usize,
    pub owner: OwnerCard,
    pub indicators: Vec<Indicator>,
    /// Total children, visible or not
    pub child_count: usize,
    pub expanded: bool,
    /// Owner has direct subordinates to intervene into
    pub can_intervene: bool,
    pub children: Vec<VisibleNode>,
}

/// A top-level member and their root plans
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderSection {
    pub leader: OwnerCard,
    pub roots: Vec<VisibleNode>,
}

/// The whole cascade as currently visible
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VisibleTree {
    pub sections: Vec<LeaderSection>,
}

impl VisibleTree {
    /// Count of rendered plan nodes
    pub fn visible_count(&self) -> usize {
        fn count(node: &VisibleNode) -> usize {
            1 + node.children.iter().map(count).sum::<usize>()
        }
        self.sections
            .iter()
            .flat_map(|s| s.roots.iter())
            .map(count)
            .sum()
    }
}

/// Render every leader section
pub fn render(goals: &GoalTree, org: &OrgHierarchy, expanded: &ExpansionState) -> VisibleTree {
    let mut visited = HashSet::new();
    let sections = org
        .top_level_members()
        .into_iter()
        .map(|leader| LeaderSection {
            leader: OwnerCard::from(leader),
            roots: goals
                .roots_of(&leader.id)
                .into_iter()
                .filter_map(|plan| visit(goals, org, expanded, plan, 0, &mut visited))
                .collect(),
        })
        .collect();

    VisibleTree { sections }
}

/// Render the subtree rooted at one plan
pub fn render_plan(
    goals: &GoalTree,
    org: &OrgHierarchy,
    expanded: &ExpansionState,
    plan_id: &str,
) -> Option<VisibleNode> {
    let plan = goals.get(plan_id)?;
    visit(goals, org, expanded, plan, 0, &mut HashSet::new())
}

fn visit(
    goals: &GoalTree,
    org: &OrgHierarchy,
    expanded: &ExpansionState,
    plan: &ResultPlan,
    depth: usize,
    visited: &mut HashSet<PlanId>,
) -> Option<VisibleNode> {
    // A plan whose owner is gone is not drawn
    let owner = org.get(&plan.owner_id)?;
    if !visited.insert(plan.id.clone()) {
        return None;
    }

    let children = goals.children_of(&plan.id);
    let is_expanded = expanded.is_expanded(&plan.id);
    let visible_children = if is_expanded {
        children
            .iter()
            .filter_map(|child| visit(goals, org, expanded, child, depth + 1, visited))
            .collect()
    } else {
        Vec::new()
    };

    Some(VisibleNode {
        plan_id: plan.id.clone(),
        title: plan.title.clone(),
        description: plan.description.clone(),
        plan_type: plan.plan_type,
        status: plan.status,
        depth,
        owner: OwnerCard::from(owner),
        indicators: plan.indicators.clone(),
        child_count: children.len(),
        expanded: is_expanded,
        can_intervene: !org.direct_subordinates(&owner.id).is_empty(),
        children: visible_children,
    })
}

/// Indented text outline of a rendered tree
pub fn render_outline(tree: &VisibleTree) -> String {
    let mut out = String::new();

    for section in &tree.sections {
        let _ = writeln!(
            out,
            "== {} ({}) ==",
            section.leader.name, section.leader.position
        );
        if section.roots.is_empty() {
            let _ = writeln!(out, "  (no top-level plans yet)");
        }
        for root in &section.roots {
            outline_node(&mut out, root);
        }
    }

    out
}

fn outline_node(out: &mut String, node: &VisibleNode) {
    let indent = "  ".repeat(node.depth + 1);
    let marker = match (node.child_count, node.expanded) {
        (0, _) => "-",
        (_, true) => "v",
        (_, false) => ">",
    };

    let _ = writeln!(
        out,
        "{}{} [{}] {} | {} ({}) | {}",
        indent,
        marker,
        node.plan_id,
        node.title,
        node.owner.name,
        node.owner.role_label,
        node.status.as_str()
    );
    for ind in &node.indicators {
        let _ = writeln!(
            out,
            "{}    * {} -> {} ({})",
            indent, ind.text, ind.target, ind.perspective
        );
    }
    if node.child_count > 0 && !node.expanded {
        let _ = writeln!(out, "{}    ({} interventions hidden)", indent, node.child_count);
    }
    for child in &node.children {
        outline_node(out, child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Gender, Perspective};

    fn member(id: &str, role: Role, superior: Option<&str>) -> StaffMember {
        StaffMember {
            id: id.to_string(),
            business_key: id.to_string(),
            name: format!("Name {}", id),
            position: format!("Pos {}", id),
            role,
            gender: Gender::Male,
            superior_id: superior.map(str::to_string),
            is_part_time: false,
        }
    }

    fn plan(id: &str, owner: &str, parent: Option<&str>) -> ResultPlan {
        ResultPlan {
            id: id.to_string(),
            owner_id: owner.to_string(),
            parent_id: parent.map(str::to_string),
            title: format!("Title {}", id),
            description: String::new(),
            plan_type: PlanType::Primary,
            status: PlanStatus::Draft,
            indicators: vec![Indicator {
                id: format!("ind-{}", id),
                text: "Output".to_string(),
                target: "100%".to_string(),
                perspective: Perspective::Quantity,
            }],
        }
    }

    fn fixture() -> (GoalTree, OrgHierarchy) {
        let org = OrgHierarchy::new(vec![
            member("a", Role::Sekda, None),
            member("b", Role::Asisten, Some("a")),
            member("b2", Role::Asisten, Some("a")),
            member("c", Role::Kabag, Some("b")),
        ]);
        let goals = GoalTree::new(vec![
            plan("p1", "a", None),
            plan("p2", "b", Some("p1")),
            plan("p3", "b2", Some("p1")),
            plan("p4", "c", Some("p2")),
        ]);
        (goals, org)
    }

    #[test]
    fn test_collapsed_shows_roots_only() {
        let (goals, org) = fixture();
        let tree = render(&goals, &org, &ExpansionState::new());

        assert_eq!(tree.sections.len(), 1);
        let root = &tree.sections[0].roots[0];
        assert_eq!(root.plan_id, "p1");
        assert_eq!(root.child_count, 2);
        assert!(root.children.is_empty());
        assert!(root.can_intervene);
        assert_eq!(tree.visible_count(), 1);
    }

    #[test]
    fn test_expansion_is_per_node() {
        let (goals, org) = fixture();
        let expanded: ExpansionState = ["p1"].into_iter().collect();
        let tree = render(&goals, &org, &expanded);

        let root = &tree.sections[0].roots[0];
        let kids: Vec<_> = root.children.iter().map(|c| c.plan_id.as_str()).collect();
        assert_eq!(kids, vec!["p2", "p3"]);
        assert_eq!(root.children[0].depth, 1);
        assert!(root.children[0].children.is_empty());
        assert_eq!(root.children[0].child_count, 1);
        assert!(!root.children[1].can_intervene);
    }

    #[test]
    fn test_toggle_on_off_on_is_idempotent() {
        let (goals, org) = fixture();
        let mut state = ExpansionState::new();

        assert!(state.toggle("p1"));
        let first = render(&goals, &org, &state);
        assert!(!state.toggle("p1"));
        let collapsed = render(&goals, &org, &state);
        assert!(state.toggle("p1"));
        let again = render(&goals, &org, &state);

        assert_eq!(first, again);
        assert_ne!(first, collapsed);
    }

    #[test]
    fn test_parent_cycle_is_not_revisited() {
        let org = OrgHierarchy::new(vec![member("a", Role::Sekda, None)]);
        let goals = GoalTree::new(vec![plan("x", "a", Some("y")), plan("y", "a", Some("x"))]);
        let expanded: ExpansionState = ["x", "y"].into_iter().collect();

        let node = render_plan(&goals, &org, &expanded, "x").unwrap();
        assert_eq!(node.children.len(), 1);
        assert!(node.children[0].children.is_empty());
    }

    #[test]
    fn test_retain_existing_drops_deleted_ids() {
        let (goals, _) = fixture();
        let mut state: ExpansionState = ["p1", "gone"].into_iter().collect();
        state.retain_existing(&goals);
        assert!(state.is_expanded("p1"));
        assert!(!state.is_expanded("gone"));
    }

    #[test]
    fn test_outline_marks_hidden_children() {
        let (goals, org) = fixture();
        let outline = render_outline(&render(&goals, &org, &ExpansionState::new()));
        assert!(outline.contains("> [p1] Title p1"));
        assert!(outline.contains("(2 interventions hidden)"));
    }
}
