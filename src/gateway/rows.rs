//! Relational row shapes
//!
//! Explicit decoding of rows returned by the remote store and the payloads
//! written back to it. Decoding rejects missing required columns and unknown
//! tag values instead of coercing them; nullable columns default.

use serde::Serialize;
use serde_json::Value;

use crate::model::{
    Gender, Indicator, IndicatorDraft, Perspective, PlanStatus, PlanType, ResultPlan, Role,
    StaffMember,
};

/// A row that could not be turned into a domain record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{table} row {row}: {reason}")]
pub struct DecodeError {
    pub table: &'static str,
    /// Row id when known, otherwise its position
    pub row: String,
    pub reason: String,
}

struct RowReader<'a> {
    table: &'static str,
    row: String,
    obj: &'a serde_json::Map<String, Value>,
}

impl<'a> RowReader<'a> {
    fn new(table: &'static str, position: usize, value: &'a Value) -> Result<Self, DecodeError> {
        let obj = value.as_object().ok_or_else(|| DecodeError {
            table,
            row: position.to_string(),
            reason: "not a JSON object".to_string(),
        })?;

        let row = obj
            .get("id")
            .and_then(id_string)
            .unwrap_or_else(|| position.to_string());

        Ok(Self { table, row, obj })
    }

    fn err(&self, reason: impl Into<String>) -> DecodeError {
        DecodeError {
            table: self.table,
            row: self.row.clone(),
            reason: reason.into(),
        }
    }

    fn id(&self, column: &str) -> Result<String, DecodeError> {
        self.opt_id(column)?
            .ok_or_else(|| self.err(format!("missing {}", column)))
    }

    /// Null, absent and empty ids all mean "no reference"
    fn opt_id(&self, column: &str) -> Result<Option<String>, DecodeError> {
        match self.obj.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => match id_string(v) {
                Some(s) if s.is_empty() => Ok(None),
                Some(s) => Ok(Some(s)),
                None => Err(self.err(format!("{} is not an id", column))),
            },
        }
    }

    fn text(&self, column: &str) -> Result<String, DecodeError> {
        match self.obj.get(column) {
            Some(Value::String(s)) => Ok(s.clone()),
            None | Some(Value::Null) => Err(self.err(format!("missing {}", column))),
            Some(_) => Err(self.err(format!("{} is not text", column))),
        }
    }

    fn opt_text(&self, column: &str) -> Result<Option<String>, DecodeError> {
        match self.obj.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.err(format!("{} is not text", column))),
        }
    }

    fn tag<T: std::str::FromStr>(&self, column: &str) -> Result<Option<T>, DecodeError>
    where
        T::Err: std::fmt::Display,
    {
        match self.opt_text(column)? {
            None => Ok(None),
            Some(s) => s.parse::<T>().map(Some).map_err(|e| self.err(e.to_string())),
        }
    }

    fn flag(&self, column: &str) -> Result<bool, DecodeError> {
        match self.obj.get(column) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(self.err(format!("{} is not a boolean", column))),
        }
    }
}

fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode one `staff` row
pub fn decode_staff(position: usize, value: &Value) -> Result<StaffMember, DecodeError> {
    let r = RowReader::new("staff", position, value)?;

    Ok(StaffMember {
        id: r.id("id")?,
        business_key: r.text("business_key")?,
        name: r.text("name")?,
        position: r.opt_text("position")?.unwrap_or_default(),
        role: r
            .tag::<Role>("role")?
            .ok_or_else(|| r.err("missing role"))?,
        gender: r
            .tag::<Gender>("gender")?
            .ok_or_else(|| r.err("missing gender"))?,
        superior_id: r.opt_id("superior_id")?,
        is_part_time: r.flag("is_part_time")?,
    })
}

/// Decode one `result_plans` row with its embedded `indicators`
///
/// A malformed indicator is reported next to the plan instead of failing it,
/// so one bad row never hides the plan or the subtree hanging off it.
pub fn decode_plan(
    position: usize,
    value: &Value,
) -> Result<(ResultPlan, Vec<DecodeError>), DecodeError> {
    let r = RowReader::new("result_plans", position, value)?;

    let mut plan = ResultPlan {
        id: r.id("id")?,
        owner_id: r.id("staff_id")?,
        parent_id: r.opt_id("parent_plan_id")?,
        title: r.text("title")?,
        description: r.opt_text("description")?.unwrap_or_default(),
        plan_type: r.tag::<PlanType>("type")?.unwrap_or_default(),
        status: r.tag::<PlanStatus>("status")?.unwrap_or_default(),
        indicators: Vec::new(),
    };

    let skipped = match r.obj.get("indicators") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(rows)) => {
            let (indicators, skipped) = decode_table(rows, decode_indicator);
            plan.indicators = indicators;
            skipped
        }
        Some(_) => vec![r.err("indicators is not an array")],
    };

    Ok((plan, skipped))
}

/// Decode the `result_plans` table, flattening indicator errors into the
/// skipped list
pub fn decode_plans(rows: &[Value]) -> (Vec<ResultPlan>, Vec<DecodeError>) {
    let (decoded, mut skipped) = decode_table(rows, decode_plan);
    let mut plans = Vec::with_capacity(decoded.len());
    for (plan, nested) in decoded {
        skipped.extend(nested);
        plans.push(plan);
    }
    (plans, skipped)
}

/// Decode one `indicators` row
pub fn decode_indicator(position: usize, value: &Value) -> Result<Indicator, DecodeError> {
    let r = RowReader::new("indicators", position, value)?;

    Ok(Indicator {
        id: r.id("id")?,
        text: r.text("text")?,
        target: r.opt_text("target")?.unwrap_or_default(),
        perspective: r
            .tag::<Perspective>("perspective")?
            .ok_or_else(|| r.err("missing perspective"))?,
    })
}

/// Decode a whole table, keeping good rows and reporting bad ones
pub fn decode_table<T>(
    rows: &[Value],
    decode: impl Fn(usize, &Value) -> Result<T, DecodeError>,
) -> (Vec<T>, Vec<DecodeError>) {
    let mut good = Vec::with_capacity(rows.len());
    let mut bad = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        match decode(i, row) {
            Ok(v) => good.push(v),
            Err(e) => bad.push(e),
        }
    }
    (good, bad)
}

/// `staff` insert/update payload
#[derive(Debug, Serialize)]
pub struct StaffRow<'a> {
    pub business_key: &'a str,
    pub name: &'a str,
    pub position: &'a str,
    pub role: &'static str,
    pub gender: &'static str,
    pub superior_id: Option<&'a str>,
    pub is_part_time: bool,
}

impl<'a> StaffRow<'a> {
    pub fn new(
        business_key: &'a str,
        name: &'a str,
        position: &'a str,
        role: Role,
        gender: Gender,
        superior_id: Option<&'a str>,
        is_part_time: bool,
    ) -> Self {
        Self {
            business_key,
            name,
            position,
            role: role.as_str(),
            gender: gender.as_str(),
            superior_id: superior_id.filter(|s| !s.is_empty()),
            is_part_time,
        }
    }
}

/// `result_plans` insert/update payload
#[derive(Debug, Serialize)]
pub struct PlanRow<'a> {
    pub staff_id: &'a str,
    pub parent_plan_id: Option<&'a str>,
    pub title: &'a str,
    pub description: &'a str,
    #[serde(rename = "type")]
    pub plan_type: &'static str,
    pub status: &'static str,
}

/// `indicators` insert payload
#[derive(Debug, Serialize)]
pub struct IndicatorRow<'a> {
    pub plan_id: &'a str,
    pub text: &'a str,
    pub target: &'a str,
    pub perspective: &'static str,
}

impl<'a> IndicatorRow<'a> {
    pub fn new(plan_id: &'a str, draft: &'a IndicatorDraft) -> Self {
        Self {
            plan_id,
            text: &draft.text,
            target: &draft.target,
            perspective: draft.perspective.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_staff_defaults_nullable_columns() {
        let row = json!({
            "id": "e1",
            "business_key": "197001011990011001",
            "name": "Adi",
            "position": "Sekretaris Daerah",
            "role": "SEKDA",
            "gender": "L",
            "superior_id": null,
            "is_part_time": null
        });
        let m = decode_staff(0, &row).unwrap();
        assert_eq!(m.superior_id, None);
        assert!(!m.is_part_time);
        assert_eq!(m.role, Role::Sekda);
    }

    #[test]
    fn test_decode_staff_rejects_unknown_role() {
        let row = json!({
            "id": 7,
            "business_key": "x",
            "name": "X",
            "role": "DIREKTUR",
            "gender": "L"
        });
        let err = decode_staff(3, &row).unwrap_err();
        assert_eq!(err.row, "7");
        assert!(err.reason.contains("DIREKTUR"));
    }

    #[test]
    fn test_decode_plan_with_embedded_indicators() {
        let row = json!({
            "id": "p1",
            "staff_id": "e1",
            "parent_plan_id": "",
            "title": "Indeks RB",
            "description": null,
            "type": "Utama",
            "status": "Approved",
            "indicators": [
                {"id": "i1", "plan_id": "p1", "text": "Indeks", "target": "85.00", "perspective": "Kualitas"}
            ]
        });
        let (p, skipped) = decode_plan(0, &row).unwrap();
        assert!(skipped.is_empty());
        assert_eq!(p.parent_id, None);
        assert_eq!(p.description, "");
        assert_eq!(p.status, PlanStatus::Approved);
        assert_eq!(p.indicators.len(), 1);
        assert_eq!(p.indicators[0].perspective, Perspective::Quality);
    }

    #[test]
    fn test_bad_indicator_does_not_drop_its_plan() {
        let rows = vec![
            json!({
                "id": "p1",
                "staff_id": "e1",
                "title": "Indeks RB",
                "indicators": [
                    {"id": "i1", "plan_id": "p1", "text": "Indeks", "target": "85", "perspective": "Kualitas"},
                    {"id": "i2", "plan_id": "p1", "text": "Tepat waktu", "target": "100%"}
                ]
            }),
            json!({"id": "p2", "staff_id": "e2", "parent_plan_id": "p1", "title": "Turunan"}),
        ];

        let (plans, skipped) = decode_plans(&rows);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].id, "p1");
        assert_eq!(plans[0].indicators.len(), 1);
        assert_eq!(plans[0].indicators[0].id, "i1");
        assert_eq!(plans[1].parent_id.as_deref(), Some("p1"));
        assert_eq!(
            skipped,
            vec![DecodeError {
                table: "indicators",
                row: "i2".to_string(),
                reason: "missing perspective".to_string(),
            }]
        );
    }

    #[test]
    fn test_non_array_indicators_keeps_plan() {
        let row = json!({"id": "p1", "staff_id": "e1", "title": "T", "indicators": "x"});
        let (plan, skipped) = decode_plan(0, &row).unwrap();
        assert!(plan.indicators.is_empty());
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].table, "result_plans");
    }

    #[test]
    fn test_decode_table_keeps_good_rows() {
        let rows = vec![
            json!({"id": "i1", "text": "a", "target": "1", "perspective": "Waktu"}),
            json!({"id": "i2", "text": "b", "target": "2", "perspective": "Mutu"}),
            json!("garbage"),
        ];
        let (good, bad) = decode_table(&rows, decode_indicator);
        assert_eq!(good.len(), 1);
        assert_eq!(bad.len(), 2);
        assert_eq!(bad[1].row, "2");
    }

    #[test]
    fn test_staff_row_drops_empty_superior() {
        let row = StaffRow::new("k", "n", "p", Role::Kabag, Gender::Female, Some(""), true);
        let v = serde_json::to_value(&row).unwrap();
        assert_eq!(v["superior_id"], Value::Null);
        assert_eq!(v["role"], "KABAG");
        assert_eq!(v["gender"], "P");
    }
}
