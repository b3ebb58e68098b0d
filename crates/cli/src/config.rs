//! Configuration loading from cloudlens.toml plus environment overrides.

use runtime::{AgentConfig, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT};
use serde::Deserialize;
use sources::{GcpAuth, GcpConfig};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "cloudlens.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub gcp: GcpSection,
    pub agent: AgentSection,
}

/// Gemini settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model: String,

    /// Gemini API key. Usually supplied via `GEMINI_API_KEY` instead.
    pub api_key: Option<String>,

    /// Per-call limit for a model round-trip.
    pub timeout_secs: u64,

    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,

    /// Override the API endpoint (proxies, local emulators).
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            timeout_secs: 60,
            temperature: None,
            max_output_tokens: None,
            base_url: None,
        }
    }
}

/// Project, billing export and credentials.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GcpSection {
    #[serde(flatten)]
    pub project: GcpConfig,

    /// Static OAuth access token. Without one, tokens come from the GCE
    /// metadata server.
    pub access_token: Option<String>,
}

/// Conversation loop settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_rounds: usize,
    pub tool_timeout_secs: u64,
    pub system_prompt: Option<String>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_rounds: runtime::DEFAULT_MAX_ROUNDS,
            tool_timeout_secs: 30,
            system_prompt: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load `path` if given, else `cloudlens.toml` when it exists, else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::load(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply environment overrides. `lookup` is normally `std::env::var`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Some(project) = lookup("GCP_PROJECT_ID") {
            self.gcp.project.project_id = project;
        }
        if let Some(dataset) = lookup("BILLING_DATASET") {
            self.gcp.project.billing_dataset = dataset;
        }
        if let Some(flag) = lookup("USE_FIRESTORE_CACHE") {
            self.gcp.project.use_firestore_cache = parse_flag(&flag).ok_or_else(|| {
                ConfigError::InvalidEnv {
                    key: "USE_FIRESTORE_CACHE",
                    value: flag,
                }
            })?;
        }
        if let Some(token) = lookup("GCP_ACCESS_TOKEN") {
            self.gcp.access_token = Some(token);
        }
        Ok(())
    }

    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.model
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    pub fn gcp_auth(&self) -> GcpAuth {
        match &self.gcp.access_token {
            Some(token) => GcpAuth::AccessToken(token.clone()),
            None => GcpAuth::MetadataServer,
        }
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_rounds: self.agent.max_rounds,
            model_timeout: Duration::from_secs(self.model.timeout_secs),
            system_prompt: self
                .agent
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.agent.tool_timeout_secs)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("Gemini API key not configured: set model.api_key or GEMINI_API_KEY")]
    MissingApiKey,

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_file() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.model.model, "gemini-2.5-pro");
        assert_eq!(config.model.timeout_secs, 60);
        assert_eq!(config.gcp.project.billing_dataset, "billing_export");
        assert!(config.gcp.project.use_firestore_cache);
        assert_eq!(config.agent.max_rounds, 6);
        assert_eq!(config.tool_timeout(), Duration::from_secs(30));
        assert!(matches!(config.api_key(), Err(ConfigError::MissingApiKey)));
        assert!(matches!(config.gcp_auth(), GcpAuth::MetadataServer));
    }

    #[test]
    fn parse_full_file() {
        let config = Config::parse(
            r#"
            [model]
            model = "gemini-2.5-flash"
            api_key = "from-file"
            temperature = 0.2

            [gcp]
            project_id = "acme-prod"
            billing_dataset = "finops"
            use_firestore_cache = false

            [agent]
            max_rounds = 4
            system_prompt = "Be brief."
            "#,
        )
        .unwrap();

        assert_eq!(config.api_key().unwrap(), "from-file");
        assert_eq!(config.model.temperature, Some(0.2));
        assert_eq!(config.gcp.project.project_id, "acme-prod");
        assert_eq!(config.gcp.project.billing_dataset, "finops");
        assert!(!config.gcp.project.use_firestore_cache);

        let agent = config.agent_config();
        assert_eq!(agent.max_rounds, 4);
        assert_eq!(agent.system_prompt, "Be brief.");
    }

    #[test]
    fn env_overrides_file() {
        let mut config = Config::parse("[gcp]\nproject_id = \"from-file\"\n").unwrap();
        config
            .apply_env(env(&[
                ("GEMINI_API_KEY", "env-key"),
                ("GCP_PROJECT_ID", "from-env"),
                ("BILLING_DATASET", "exports"),
                ("USE_FIRESTORE_CACHE", "False"),
                ("GCP_ACCESS_TOKEN", "ya29.token"),
            ]))
            .unwrap();

        assert_eq!(config.api_key().unwrap(), "env-key");
        assert_eq!(config.gcp.project.project_id, "from-env");
        assert_eq!(config.gcp.project.billing_dataset, "exports");
        assert!(!config.gcp.project.use_firestore_cache);
        assert!(matches!(config.gcp_auth(), GcpAuth::AccessToken(ref t) if t == "ya29.token"));
    }

    #[test]
    fn blank_env_is_ignored_and_bad_flag_rejected() {
        let mut config = Config::parse("[gcp]\nproject_id = \"keep\"\n").unwrap();
        config.apply_env(env(&[("GCP_PROJECT_ID", "  ")])).unwrap();
        assert_eq!(config.gcp.project.project_id, "keep");

        let err = config
            .apply_env(env(&[("USE_FIRESTORE_CACHE", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key: "USE_FIRESTORE_CACHE", .. }));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            Config::parse("[agent]\nmax_rounds = \"six\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
