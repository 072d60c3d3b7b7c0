//! Staff members and organizational roles

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{StaffId, UnknownTag};

/// Organizational level, in fixed order from the administrative role down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// System administrator; owns no plans
    Admin,
    /// Regional secretary, top of the line organization
    Sekda,
    Asisten,
    Kabag,
    Kasubag,
    Pelaksana,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Sekda,
        Role::Asisten,
        Role::Kabag,
        Role::Kasubag,
        Role::Pelaksana,
    ];

    /// Wire/storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Sekda => "SEKDA",
            Role::Asisten => "ASISTEN",
            Role::Kabag => "KABAG",
            Role::Kasubag => "KASUBAG",
            Role::Pelaksana => "PELAKSANA",
        }
    }

    /// Human-readable label used on plan cards
    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Administrator",
            Role::Sekda => "Sekretaris Daerah",
            Role::Asisten => "Asisten",
            Role::Kabag => "Kepala Bagian",
            Role::Kasubag => "Kepala Sub Bagian",
            Role::Pelaksana => "Pelaksana",
        }
    }

    /// Position in the fixed order (0 = administrative role)
    pub fn rank(&self) -> usize {
        Role::ALL.iter().position(|r| r == self).unwrap_or(Role::ALL.len())
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Role::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == upper)
            .ok_or_else(|| UnknownTag::new("role", s))
    }
}

/// Gender tag as stored (`L` / `P`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "L")]
    Male,
    #[serde(rename = "P")]
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "L",
            Gender::Female => "P",
        }
    }
}

impl FromStr for Gender {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(Gender::Male),
            "P" => Ok(Gender::Female),
            _ => Err(UnknownTag::new("gender", s)),
        }
    }
}

/// A staff member of the reporting hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: StaffId,
    /// Employee number; the only login credential
    pub business_key: String,
    pub name: String,
    pub position: String,
    pub role: Role,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superior_id: Option<StaffId>,
    #[serde(default)]
    pub is_part_time: bool,
}

/// A staff record before the store has assigned its id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStaff {
    pub business_key: String,
    pub name: String,
    pub position: String,
    pub role: Role,
    pub gender: Gender,
    #[serde(default)]
    pub superior_id: Option<StaffId>,
    #[serde(default)]
    pub is_part_time: bool,
}

impl NewStaff {
    pub fn into_member(self, id: StaffId) -> StaffMember {
        StaffMember {
            id,
            business_key: self.business_key,
            name: self.name,
            position: self.position,
            role: self.role,
            gender: self.gender,
            superior_id: self.superior_id,
            is_part_time: self.is_part_time,
        }
    }
}
