//! Node configuration
//!
//! The TOML file covers where the node keeps its local state, which port the
//! dashboard binds and how the suggestion service is reached. The backend
//! endpoint is resolved separately: a locally saved override wins over the
//! environment, and no endpoint at all means in-memory demo mode.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Primary environment variable for the backend URL
pub const ENV_BACKEND_URL: &str = "CASCADE_BACKEND_URL";
/// Primary environment variable for the backend key
pub const ENV_BACKEND_KEY: &str = "CASCADE_BACKEND_KEY";
const ENV_BACKEND_URL_FALLBACK: &str = "SUPABASE_URL";
const ENV_BACKEND_KEY_FALLBACK: &str = "SUPABASE_ANON_KEY";

pub const ENV_ASSIST_KEY: &str = "GEMINI_API_KEY";
const ENV_ASSIST_KEY_FALLBACK: &str = "API_KEY";

const MIN_KEY_LEN: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("backend URL must start with https://")]
    InsecureUrl,

    #[error("backend key must be at least 20 characters")]
    ShortKey,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub assist: AssistConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory holding the local settings database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
        }
    }
}

/// Suggestion service settings; the API key only comes from the environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_assist_model")]
    pub model: String,

    #[serde(default = "default_assist_base_url")]
    pub base_url: String,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_assist_model(),
            base_url: default_assist_base_url(),
        }
    }
}

// Defaults
fn default_data_dir() -> PathBuf { PathBuf::from("./cascade-data") }
fn default_http_port() -> u16 { 8080 }
fn default_true() -> bool { true }
fn default_assist_model() -> String { "gemini-2.0-flash".to_string() }
fn default_assist_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

impl Config {
    /// Read `path`, or defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn local_db_path(&self) -> PathBuf {
        self.node.data_dir.join("local.db")
    }
}

/// URL and key of a remote relational store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendEndpoint {
    pub url: String,
    pub key: String,
}

impl BackendEndpoint {
    /// Build an endpoint from user input, trimming surrounding whitespace
    pub fn new(url: &str, key: &str) -> Result<Self, ConfigError> {
        let endpoint = Self {
            url: url.trim().to_string(),
            key: key.trim().to_string(),
        };
        endpoint.validate()?;
        Ok(endpoint)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.url.starts_with("https://") {
            return Err(ConfigError::InsecureUrl);
        }
        if self.key.len() < MIN_KEY_LEN {
            return Err(ConfigError::ShortKey);
        }
        Ok(())
    }

    /// Key with all but its edges hidden, for display
    pub fn masked_key(&self) -> String {
        let chars: Vec<char> = self.key.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    LocalOverride,
    Environment,
}

/// The endpoint in effect and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub endpoint: BackendEndpoint,
    pub source: ConfigSource,
}

fn first_set(env: &impl Fn(&str) -> Option<String>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env(name))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Pick the backend endpoint: local override, then environment
///
/// An environment pair that fails validation is ignored with a warning
/// rather than aborting startup.
pub fn resolve_backend(
    local: Option<BackendEndpoint>,
    env: impl Fn(&str) -> Option<String>,
) -> Option<BackendSettings> {
    if let Some(endpoint) = local {
        return Some(BackendSettings {
            endpoint,
            source: ConfigSource::LocalOverride,
        });
    }

    let url = first_set(&env, &[ENV_BACKEND_URL, ENV_BACKEND_URL_FALLBACK])?;
    let key = first_set(&env, &[ENV_BACKEND_KEY, ENV_BACKEND_KEY_FALLBACK])?;
    match BackendEndpoint::new(&url, &key) {
        Ok(endpoint) => Some(BackendSettings {
            endpoint,
            source: ConfigSource::Environment,
        }),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring backend settings from environment");
            None
        }
    }
}

/// Suggestion service key from the environment
pub fn resolve_assist_key(env: impl Fn(&str) -> Option<String>) -> Option<String> {
    first_set(&env, &[ENV_ASSIST_KEY, ENV_ASSIST_KEY_FALLBACK])
}

/// Process environment lookup for the resolvers
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const KEY: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6";

    #[test]
    fn test_local_override_wins() {
        let local = BackendEndpoint::new("https://local.example.co", KEY).unwrap();
        let env = env_of(&[(ENV_BACKEND_URL, "https://env.example.co"), (ENV_BACKEND_KEY, KEY)]);

        let settings = resolve_backend(Some(local.clone()), env).unwrap();
        assert_eq!(settings.source, ConfigSource::LocalOverride);
        assert_eq!(settings.endpoint, local);
    }

    #[test]
    fn test_env_fallback_names() {
        let env = env_of(&[("SUPABASE_URL", "https://x.supabase.co"), ("SUPABASE_ANON_KEY", KEY)]);
        let settings = resolve_backend(None, env).unwrap();
        assert_eq!(settings.source, ConfigSource::Environment);
        assert_eq!(settings.endpoint.url, "https://x.supabase.co");
    }

    #[test]
    fn test_absent_or_invalid_env_means_demo_mode() {
        assert!(resolve_backend(None, env_of(&[])).is_none());
        let env = env_of(&[(ENV_BACKEND_URL, "http://plain.example"), (ENV_BACKEND_KEY, KEY)]);
        assert!(resolve_backend(None, env).is_none());
    }

    #[test]
    fn test_endpoint_validation() {
        assert!(matches!(
            BackendEndpoint::new("http://x", KEY),
            Err(ConfigError::InsecureUrl)
        ));
        assert!(matches!(
            BackendEndpoint::new("https://x", "short"),
            Err(ConfigError::ShortKey)
        ));
        let ok = BackendEndpoint::new("  https://x.co ", KEY).unwrap();
        assert_eq!(ok.url, "https://x.co");
        assert_eq!(ok.masked_key(), "eyJh...cCI6");
    }

    #[test]
    fn test_assist_key_resolution() {
        assert_eq!(
            resolve_assist_key(env_of(&[("API_KEY", "abc")])),
            Some("abc".to_string())
        );
        assert_eq!(resolve_assist_key(env_of(&[(ENV_ASSIST_KEY, "  ")])), None);
    }
}
