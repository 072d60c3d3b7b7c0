//! Remote relational backend
//!
//! Speaks the PostgREST dialect exposed by hosted Postgres services:
//! one table per resource under `/rest/v1`, filters as `column=op.value`
//! query parameters, and `apikey` plus bearer auth on every request.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::rows::{self, IndicatorRow, PlanRow, StaffRow};
use super::{Backend, BackendError, BackendKind, Loaded, PlanFields};
use crate::config::BackendEndpoint;
use crate::model::{Dataset, IndicatorDraft, NewStaff, PlanId, StaffId, StaffMember};

const STAFF: &str = "staff";
const PLANS: &str = "result_plans";
const INDICATORS: &str = "indicators";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Network(e.to_string())
        }
    }
}

pub struct RemoteBackend {
    http_client: reqwest::Client,
    base_url: String,
    key: String,
}

impl RemoteBackend {
    pub fn new(endpoint: &BackendEndpoint) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            base_url: endpoint.url.trim_end_matches('/').to_string(),
            key: endpoint.key.clone(),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}/rest/v1/{}", self.base_url, table))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, BackendError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %body, "Backend request rejected");
        Err(match status {
            StatusCode::CONFLICT => BackendError::Conflict(body),
            StatusCode::NOT_FOUND => BackendError::NotFound(body),
            _ => BackendError::Status {
                status: status.as_u16(),
                body,
            },
        })
    }

    async fn select(&self, table: &str, columns: &str) -> Result<Vec<Value>, BackendError> {
        let response = self
            .send(self.request(Method::GET, table).query(&[("select", columns)]))
            .await?;
        Ok(response.json().await?)
    }

    /// Insert rows and return what the store wrote back
    async fn insert<T: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &T,
    ) -> Result<Vec<Value>, BackendError> {
        let response = self
            .send(
                self.request(Method::POST, table)
                    .header("Prefer", "return=representation")
                    .json(body),
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn patch<T: Serialize>(&self, table: &str, id: &str, body: &T) -> Result<(), BackendError> {
        self.send(
            self.request(Method::PATCH, table)
                .query(&[("id", format!("eq.{}", id))])
                .json(body),
        )
        .await?;
        Ok(())
    }

    async fn delete_where(&self, table: &str, column: &str, filter: String) -> Result<(), BackendError> {
        self.send(self.request(Method::DELETE, table).query(&[(column, filter)]))
            .await?;
        Ok(())
    }
}

fn returned_id(row: &Value) -> Result<String, BackendError> {
    match row.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(BackendError::Decode("inserted row has no id".to_string())),
    }
}

/// `in.("a","b")` filter value
fn in_list(ids: &[PlanId]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

fn staff_row(member: &StaffMember) -> StaffRow<'_> {
    StaffRow::new(
        &member.business_key,
        &member.name,
        &member.position,
        member.role,
        member.gender,
        member.superior_id.as_deref(),
        member.is_part_time,
    )
}

fn plan_row(fields: &PlanFields) -> PlanRow<'_> {
    PlanRow {
        staff_id: &fields.owner_id,
        parent_plan_id: fields.parent_id.as_deref(),
        title: &fields.title,
        description: &fields.description,
        plan_type: fields.plan_type.as_str(),
        status: fields.status.as_str(),
    }
}

#[async_trait::async_trait]
impl Backend for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn load_all(&self) -> Result<Loaded, BackendError> {
        let (staff_rows, plan_rows) = tokio::try_join!(
            self.select(STAFF, "*"),
            self.select(PLANS, "*,indicators(*)"),
        )?;

        let (staff, mut skipped) = rows::decode_table(&staff_rows, rows::decode_staff);
        let (plans, bad_plans) = rows::decode_plans(&plan_rows);
        skipped.extend(bad_plans);

        for e in &skipped {
            warn!(error = %e, "Skipping malformed row");
        }

        Ok(Loaded {
            dataset: Dataset::new(staff, plans),
            skipped,
        })
    }

    async fn insert_staff(&self, staff: &[NewStaff]) -> Result<Vec<StaffId>, BackendError> {
        let payload: Vec<StaffRow<'_>> = staff
            .iter()
            .map(|s| {
                StaffRow::new(
                    &s.business_key,
                    &s.name,
                    &s.position,
                    s.role,
                    s.gender,
                    s.superior_id.as_deref(),
                    s.is_part_time,
                )
            })
            .collect();

        let returned = self.insert(STAFF, &payload).await?;
        returned.iter().map(returned_id).collect()
    }

    async fn update_staff(&self, member: &StaffMember) -> Result<(), BackendError> {
        self.patch(STAFF, &member.id, &staff_row(member)).await
    }

    async fn delete_staff(&self, id: &str) -> Result<(), BackendError> {
        self.delete_where(STAFF, "id", format!("eq.{}", id)).await
    }

    async fn insert_plan(&self, fields: &PlanFields) -> Result<PlanId, BackendError> {
        let returned = self.insert(PLANS, &[plan_row(fields)]).await?;
        returned
            .first()
            .ok_or_else(|| BackendError::Decode("insert returned no rows".to_string()))
            .and_then(returned_id)
    }

    async fn update_plan(&self, id: &str, fields: &PlanFields) -> Result<(), BackendError> {
        self.patch(PLANS, id, &plan_row(fields)).await
    }

    async fn replace_indicators(
        &self,
        plan_id: &str,
        indicators: &[IndicatorDraft],
    ) -> Result<(), BackendError> {
        self.delete_where(INDICATORS, "plan_id", format!("eq.{}", plan_id))
            .await?;

        if indicators.is_empty() {
            return Ok(());
        }
        let payload: Vec<IndicatorRow<'_>> = indicators
            .iter()
            .map(|d| IndicatorRow::new(plan_id, d))
            .collect();
        self.insert(INDICATORS, &payload).await?;
        Ok(())
    }

    async fn delete_plans(&self, ids: &[PlanId]) -> Result<(), BackendError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.delete_where(INDICATORS, "plan_id", in_list(ids)).await?;

        // One at a time, in the given order, so children go before parents
        for id in ids {
            self.delete_where(PLANS, "id", format!("eq.{}", id)).await?;
        }
        Ok(())
    }
}
