//! Bulk staff import
//!
//! Accepts the JSON array a spreadsheet export produces: one object per row,
//! loosely named columns. Each row is validated on its own so a preview can
//! show what will be created and what was rejected, and why.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::{Gender, NewStaff, Role};
use crate::org::OrgHierarchy;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("import file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("import file must contain a JSON array of rows")]
    NotAnArray,

    #[error("import contains no rows")]
    Empty,
}

/// Why a single row was not accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    /// 1-based, as a spreadsheet shows it
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportPreview {
    pub accepted: Vec<NewStaff>,
    pub rejected: Vec<RejectedRow>,
}

impl ImportPreview {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// How a field is found among loosely named headers
///
/// Template headers win when present. Otherwise the first header containing
/// a fragment is used, ignoring headers that name a different subject.
struct Columns {
    exact: &'static [&'static str],
    fragments: &'static [&'static str],
    skip: &'static [&'static str],
}

// Headers about the superior, not the member being imported
const SUPERIOR_HINTS: &[&str] = &["atasan", "superior"];

const BUSINESS_KEY_COLUMNS: Columns = Columns {
    exact: &["nip", "business_key", "nip pegawai"],
    fragments: &["nip", "business_key", "nomor"],
    skip: SUPERIOR_HINTS,
};
const NAME_COLUMNS: Columns = Columns {
    exact: &["nama", "name", "nama pegawai"],
    fragments: &["nama", "name", "pegawai"],
    skip: SUPERIOR_HINTS,
};
const POSITION_COLUMNS: Columns = Columns {
    exact: &["jabatan", "position"],
    fragments: &["jabatan", "position", "tugas"],
    skip: SUPERIOR_HINTS,
};
const ROLE_COLUMNS: Columns = Columns {
    exact: &["role", "level"],
    fragments: &["role", "level"],
    skip: SUPERIOR_HINTS,
};
const GENDER_COLUMNS: Columns = Columns {
    exact: &["gender", "jk", "jenis kelamin"],
    fragments: &["gender", "jk", "kelamin"],
    skip: &[],
};
const SUPERIOR_COLUMNS: Columns = Columns {
    exact: &["nip atasan", "atasan", "superior", "superior_id"],
    fragments: SUPERIOR_HINTS,
    skip: &["nama", "name"],
};
const PART_TIME_COLUMNS: Columns = Columns {
    exact: &["part_time", "paruh waktu"],
    fragments: &["part_time", "paruh"],
    skip: &[],
};

fn column<'a>(row: &'a Map<String, Value>, columns: &Columns) -> Option<&'a Value> {
    let header = |k: &str| k.trim().to_lowercase();
    row.iter()
        .find(|(k, _)| columns.exact.contains(&header(k).as_str()))
        .or_else(|| {
            row.iter().find(|(k, _)| {
                let k = header(k);
                columns.fragments.iter().any(|f| k.contains(f))
                    && !columns.skip.iter().any(|s| k.contains(s))
            })
        })
        .map(|(_, v)| v)
}

/// Cell as trimmed text; numbers keep their digits
fn text(row: &Map<String, Value>, columns: &Columns) -> Option<String> {
    let s = match column(row, columns)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn flag(row: &Map<String, Value>, columns: &Columns) -> bool {
    match column(row, columns) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "ya" | "yes" | "y"
        ),
        _ => false,
    }
}

fn parse_row(row: &Value, org: &OrgHierarchy) -> Result<NewStaff, String> {
    let row = row.as_object().ok_or("row is not an object")?;

    let business_key = text(row, &BUSINESS_KEY_COLUMNS).ok_or("missing business key (NIP)")?;
    let name = text(row, &NAME_COLUMNS).ok_or("missing name")?;
    let position = text(row, &POSITION_COLUMNS).unwrap_or_default();

    let role = match text(row, &ROLE_COLUMNS) {
        Some(r) => r.parse::<Role>().map_err(|e| e.to_string())?,
        None => Role::Pelaksana,
    };
    let gender = match text(row, &GENDER_COLUMNS) {
        Some(g) => g.parse::<Gender>().map_err(|e| e.to_string())?,
        None => return Err("missing gender (L/P)".to_string()),
    };

    // Superior by id or by business key of an existing member
    let superior_id = match text(row, &SUPERIOR_COLUMNS) {
        None => None,
        Some(sup) => {
            let found = org
                .get(&sup)
                .or_else(|| org.find_by_business_key(&sup))
                .ok_or_else(|| format!("unknown superior '{}'", sup))?;
            Some(found.id.clone())
        }
    };

    Ok(NewStaff {
        business_key,
        name,
        position,
        role,
        gender,
        superior_id,
        is_part_time: flag(row, &PART_TIME_COLUMNS),
    })
}

/// Validate rows against the current hierarchy
pub fn preview_rows(rows: &[Value], org: &OrgHierarchy) -> ImportPreview {
    let mut preview = ImportPreview::default();

    for (i, row) in rows.iter().enumerate() {
        let outcome = parse_row(row, org).and_then(|staff| {
            if org.find_by_business_key(&staff.business_key).is_some() {
                Err(format!("business key {} already exists", staff.business_key))
            } else if preview
                .accepted
                .iter()
                .any(|s| s.business_key == staff.business_key)
            {
                Err(format!("business key {} repeated in file", staff.business_key))
            } else {
                Ok(staff)
            }
        });

        match outcome {
            Ok(staff) => preview.accepted.push(staff),
            Err(reason) => preview.rejected.push(RejectedRow { row: i + 1, reason }),
        }
    }

    preview
}

pub fn preview_json(input: &str, org: &OrgHierarchy) -> Result<ImportPreview, ImportError> {
    let value: Value = serde_json::from_str(input)?;
    let rows = value.as_array().ok_or(ImportError::NotAnArray)?;
    if rows.is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(preview_rows(rows, org))
}
