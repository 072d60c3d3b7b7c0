//! Built-in demo dataset
//!
//! Served when no backend is configured and when the first load from a
//! configured backend fails.

use crate::model::{
    Dataset, Gender, Indicator, Perspective, PlanStatus, PlanType, ResultPlan, Role, StaffMember,
};

/// Business key of the default administrator
pub const ADMIN_BUSINESS_KEY: &str = "admin123";

fn member(
    id: &str,
    business_key: &str,
    name: &str,
    position: &str,
    role: Role,
    gender: Gender,
    superior: Option<&str>,
) -> StaffMember {
    StaffMember {
        id: id.to_string(),
        business_key: business_key.to_string(),
        name: name.to_string(),
        position: position.to_string(),
        role,
        gender,
        superior_id: superior.map(str::to_string),
        is_part_time: false,
    }
}

/// The default administrator record, also used to seed a fresh backend
pub fn admin() -> StaffMember {
    member(
        "admin-0",
        ADMIN_BUSINESS_KEY,
        "Administrator BKPSDM",
        "Sistem Admin",
        Role::Admin,
        Gender::Male,
        None,
    )
}

pub fn staff() -> Vec<StaffMember> {
    vec![
        admin(),
        member(
            "1",
            "197001011990011001",
            "Drs. H. Adi Santoso, M.Si",
            "Sekretaris Daerah",
            Role::Sekda,
            Gender::Male,
            None,
        ),
        member(
            "2",
            "197502021995021002",
            "Ir. Bambang Heru",
            "Asisten Pemerintahan & Kesra",
            Role::Asisten,
            Gender::Male,
            Some("1"),
        ),
        member(
            "3",
            "198003032000032003",
            "Siti Rahmawati, SH",
            "Kepala Bagian Organisasi",
            Role::Kabag,
            Gender::Female,
            Some("2"),
        ),
        member(
            "4",
            "198504042005041004",
            "Dedi Kurniawan, S.Sos",
            "Kepala Sub Bagian Kinerja",
            Role::Kasubag,
            Gender::Male,
            Some("3"),
        ),
        member(
            "5",
            "199005052010052005",
            "Rina Amalia",
            "Analis Kebijakan Pelaksana",
            Role::Pelaksana,
            Gender::Female,
            Some("4"),
        ),
    ]
}

pub fn plans() -> Vec<ResultPlan> {
    vec![ResultPlan {
        id: "rhk-1".to_string(),
        owner_id: "1".to_string(),
        parent_id: None,
        title: "Meningkatkan Kualitas Reformasi Birokrasi Pemerintah Daerah".to_string(),
        description: "Tercapainya indeks reformasi birokrasi dengan predikat A.".to_string(),
        plan_type: PlanType::Primary,
        status: PlanStatus::Approved,
        indicators: vec![Indicator {
            id: "ind-1".to_string(),
            text: "Indeks RB".to_string(),
            target: "85.00".to_string(),
            perspective: Perspective::Quality,
        }],
    }]
}

pub fn dataset() -> Dataset {
    Dataset::new(staff(), plans())
}
