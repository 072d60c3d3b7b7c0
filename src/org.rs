//! Reporting hierarchy
//!
//! Staff members linked to a single superior, indexed once per snapshot.
//! The reporting graph must be a forest; members pointing at an unknown
//! superior are treated as roots rather than rejected.

use std::collections::{HashMap, HashSet};

use crate::model::{StaffId, StaffMember};

/// Errors found while walking superior links
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    #[error("unknown staff member: {0}")]
    UnknownMember(StaffId),

    #[error("reporting cycle through staff member {0}")]
    Cycle(StaffId),
}

/// Indexed view of the staff forest
#[derive(Debug, Clone, Default)]
pub struct OrgHierarchy {
    members: Vec<StaffMember>,
    by_id: HashMap<StaffId, usize>,
    by_business_key: HashMap<String, usize>,
    /// superior id -> subordinate positions, in load order
    subordinates: HashMap<StaffId, Vec<usize>>,
}

impl OrgHierarchy {
    pub fn new(members: Vec<StaffMember>) -> Self {
        let mut by_id = HashMap::with_capacity(members.len());
        let mut by_business_key = HashMap::with_capacity(members.len());
        let mut subordinates: HashMap<StaffId, Vec<usize>> = HashMap::new();

        for (idx, member) in members.iter().enumerate() {
            by_id.insert(member.id.clone(), idx);
            by_business_key
                .entry(member.business_key.clone())
                .or_insert(idx);
            if let Some(superior) = &member.superior_id {
                subordinates.entry(superior.clone()).or_default().push(idx);
            }
        }

        Self {
            members,
            by_id,
            by_business_key,
            subordinates,
        }
    }

    pub fn members(&self) -> &[StaffMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&StaffMember> {
        self.by_id.get(id).map(|&idx| &self.members[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Exact match on the business key
    pub fn find_by_business_key(&self, key: &str) -> Option<&StaffMember> {
        self.by_business_key.get(key).map(|&idx| &self.members[idx])
    }

    /// Resolved superior; `None` for roots and for dangling references
    pub fn superior_of(&self, id: &str) -> Option<&StaffMember> {
        self.get(id)
            .and_then(|m| m.superior_id.as_deref())
            .and_then(|sup| self.get(sup))
    }

    /// Members heading the line organization: no (resolvable) superior, not admin
    pub fn top_level_members(&self) -> Vec<&StaffMember> {
        self.members
            .iter()
            .filter(|m| !m.role.is_admin())
            .filter(|m| match m.superior_id.as_deref() {
                None => true,
                Some(sup) => !self.contains(sup),
            })
            .collect()
    }

    pub fn direct_subordinates(&self, id: &str) -> Vec<&StaffMember> {
        self.subordinates
            .get(id)
            .map(|idxs| {
                idxs.iter()
                    .map(|&idx| &self.members[idx])
                    .filter(|m| m.id != id)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_direct_subordinate(&self, subordinate: &str, superior: &str) -> bool {
        subordinate != superior
            && self
                .get(subordinate)
                .and_then(|m| m.superior_id.as_deref())
                .is_some_and(|sup| sup == superior)
    }

    /// Superiors of `id`, nearest first
    pub fn superior_chain(&self, id: &str) -> Result<Vec<&StaffMember>, HierarchyError> {
        let start = self
            .get(id)
            .ok_or_else(|| HierarchyError::UnknownMember(id.to_string()))?;

        let mut seen: HashSet<&str> = HashSet::from([start.id.as_str()]);
        let mut chain = Vec::new();
        let mut current = start;

        while let Some(superior) = current
            .superior_id
            .as_deref()
            .and_then(|sup| self.get(sup))
        {
            if !seen.insert(superior.id.as_str()) {
                return Err(HierarchyError::Cycle(superior.id.clone()));
            }
            chain.push(superior);
            current = superior;
        }

        Ok(chain)
    }

    /// Ids of members whose superior chain revisits a node
    pub fn validate_forest(&self) -> Vec<StaffId> {
        self.members
            .iter()
            .filter(|m| matches!(self.superior_chain(&m.id), Err(HierarchyError::Cycle(_))))
            .map(|m| m.id.clone())
            .collect()
    }

    /// Would pointing `member` at `new_superior` close a loop?
    pub fn would_create_cycle(&self, member: &str, new_superior: Option<&str>) -> bool {
        let Some(mut cursor) = new_superior else {
            return false;
        };

        let mut seen: HashSet<&str> = HashSet::new();
        loop {
            if cursor == member {
                return true;
            }
            if !seen.insert(cursor) {
                // Pre-existing cycle above; not introduced by this edit
                return false;
            }
            match self.get(cursor).and_then(|m| m.superior_id.as_deref()) {
                Some(next) => cursor = next,
                None => return false,
            }
        }
    }
}
