//! Intervention suggestions
//!
//! Given a parent plan and the target's role and position, a suggester
//! proposes a title, description and indicators for the subordinate plan.
//! Suggesters never fail past this boundary: any problem becomes `None`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::AssistConfig;
use crate::model::{IndicatorDraft, Perspective, ResultPlan, Role};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A proposed plan body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
    pub description: String,
    pub indicators: Vec<IndicatorDraft>,
}

#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned HTTP {0}")]
    Status(u16),

    #[error("response had no text")]
    Empty,

    #[error("response is not a suggestion: {0}")]
    Malformed(String),
}

#[async_trait::async_trait]
pub trait Suggester: Send + Sync {
    /// Whether suggestions can be requested at all
    fn is_available(&self) -> bool;

    async fn suggest(&self, parent: &ResultPlan, role: Role, position: &str) -> Option<Suggestion>;
}

/// Used when no API key is configured or assist is switched off
pub struct DisabledSuggester;

#[async_trait::async_trait]
impl Suggester for DisabledSuggester {
    fn is_available(&self) -> bool {
        false
    }

    async fn suggest(&self, _parent: &ResultPlan, _role: Role, _position: &str) -> Option<Suggestion> {
        None
    }
}

/// Suggester backed by the Gemini `generateContent` endpoint
pub struct GeminiSuggester {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiSuggester {
    pub fn new(config: &AssistConfig, api_key: String) -> Result<Self, AssistError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    async fn request(&self, prompt: String) -> Result<Suggestion, AssistError> {
        // Key in a header, never in the URL
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema(),
            }
        });

        let resp = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AssistError::Status(status.as_u16()));
        }

        let payload: Value = resp.json().await?;
        let text = response_text(&payload).ok_or(AssistError::Empty)?;
        parse_suggestion(&text)
    }
}

#[async_trait::async_trait]
impl Suggester for GeminiSuggester {
    fn is_available(&self) -> bool {
        true
    }

    async fn suggest(&self, parent: &ResultPlan, role: Role, position: &str) -> Option<Suggestion> {
        info!(model = %self.model, parent = %parent.id, role = %role, "Requesting suggestion");
        match self.request(build_prompt(parent, role, position)).await {
            Ok(s) => {
                debug!(indicators = s.indicators.len(), "Suggestion received");
                Some(s)
            }
            Err(e) => {
                warn!(error = %e, "Suggestion unavailable");
                None
            }
        }
    }
}

/// Pick the suggester for this process
pub fn from_config(config: &AssistConfig, api_key: Option<String>) -> Arc<dyn Suggester> {
    let key = match api_key {
        Some(key) if config.enabled => key,
        _ => {
            info!("Suggestion service disabled");
            return Arc::new(DisabledSuggester);
        }
    };

    match GeminiSuggester::new(config, key) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            warn!(error = %e, "Could not build suggestion client");
            Arc::new(DisabledSuggester)
        }
    }
}

pub fn build_prompt(parent: &ResultPlan, role: Role, position: &str) -> String {
    format!(
        "Berikan saran intervensi Rencana Hasil Kerja (RHK) untuk bawahan berdasarkan RHK atasan berikut:\n\
         \n\
         RHK Atasan: \"{}\"\n\
         Deskripsi Atasan: \"{}\"\n\
         \n\
         Profil Bawahan:\n\
         - Jabatan: {}\n\
         - Role: {}\n\
         \n\
         Tujuan: Buat 1 RHK intervensi yang selaras dengan RHK atasan dan sesuai dengan tugas pokok bawahan. \
         Sertakan juga minimal 2 Indikator Kinerja Individu (IKI) yang relevan \
         (Aspek: Kualitas, Kuantitas, Waktu, atau Biaya).",
        parent.title, parent.description, position, role
    )
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING", "description": "Judul RHK yang disarankan" },
            "description": { "type": "STRING", "description": "Deskripsi RHK yang disarankan" },
            "indicators": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "text": { "type": "STRING", "description": "Uraian indikator" },
                        "target": { "type": "STRING", "description": "Target capaian" },
                        "perspective": {
                            "type": "STRING",
                            "description": "Aspek (Kualitas/Kuantitas/Waktu/Biaya)"
                        }
                    },
                    "required": ["text", "target", "perspective"]
                }
            }
        },
        "required": ["title", "description", "indicators"]
    })
}

/// Concatenated text parts of the first candidate
fn response_text(payload: &Value) -> Option<String> {
    let parts = payload["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[derive(Deserialize)]
struct RawSuggestion {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    indicators: Vec<RawIndicator>,
}

#[derive(Deserialize)]
struct RawIndicator {
    text: String,
    #[serde(default)]
    target: String,
    #[serde(default)]
    perspective: String,
}

/// Parse the model's JSON answer
///
/// An unrecognized perspective falls back to the default; the user reviews
/// every suggested row before saving.
pub fn parse_suggestion(text: &str) -> Result<Suggestion, AssistError> {
    let trimmed = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let raw: RawSuggestion =
        serde_json::from_str(trimmed).map_err(|e| AssistError::Malformed(e.to_string()))?;

    if raw.title.trim().is_empty() {
        return Err(AssistError::Malformed("empty title".to_string()));
    }

    Ok(Suggestion {
        title: raw.title.trim().to_string(),
        description: raw.description.trim().to_string(),
        indicators: raw
            .indicators
            .into_iter()
            .filter(|i| !i.text.trim().is_empty())
            .map(|i| IndicatorDraft {
                text: i.text.trim().to_string(),
                target: i.target.trim().to_string(),
                perspective: i.perspective.parse::<Perspective>().unwrap_or_default(),
            })
            .collect(),
    })
}
