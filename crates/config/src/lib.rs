//! Configuration loading, validation, and management for chatrelay.
//!
//! Loads configuration from `~/.chatrelay/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model used when a request does not name one.
pub const DEFAULT_MODEL_ID: &str = "us.amazon.nova-micro-v1:0";

/// Personality used when a request does not name one.
pub const DEFAULT_PERSONALITY: &str = "basic";

/// The root configuration structure.
///
/// Maps directly to `~/.chatrelay/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model identifier used when a request omits `model`
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Personality key used when a request omits `personality`
    #[serde(default = "default_personality")]
    pub default_personality: String,

    /// Upper bound on model calls in one turn (tool round-trips included)
    #[serde(default = "default_max_model_calls")]
    pub max_model_calls: usize,

    /// AWS region, credentials and endpoint overrides
    #[serde(default)]
    pub aws: AwsConfig,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Volatile history configuration
    #[serde(default)]
    pub history: HistoryConfig,

    /// Retrieval tool configuration
    #[serde(default)]
    pub knowledge_bases: KnowledgeBasesConfig,

    /// Persistent session storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_model() -> String {
    DEFAULT_MODEL_ID.into()
}
fn default_personality() -> String {
    DEFAULT_PERSONALITY.into()
}
fn default_max_model_calls() -> usize {
    10
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,

    /// Bedrock API key; takes precedence over access keys for Bedrock calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,

    /// Override for `https://bedrock-runtime.<region>.amazonaws.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrock_endpoint: Option<String>,

    /// Override for `https://bedrock-agent-runtime.<region>.amazonaws.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_runtime_endpoint: Option<String>,

    /// Override for `https://s3.<region>.amazonaws.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_endpoint: Option<String>,
}

fn default_region() -> String {
    "us-east-1".into()
}

impl AwsConfig {
    /// Whether access-key (SigV4) credentials are configured.
    pub fn has_access_keys(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            bearer_token: None,
            bedrock_endpoint: None,
            agent_runtime_endpoint: None,
            s3_endpoint: None,
        }
    }
}

impl std::fmt::Debug for AwsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsConfig")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &redact(&self.secret_access_key))
            .field("session_token", &redact(&self.session_token))
            .field("bearer_token", &redact(&self.bearer_token))
            .field("bedrock_endpoint", &self.bedrock_endpoint)
            .field("agent_runtime_endpoint", &self.agent_runtime_endpoint)
            .field("s3_endpoint", &self.s3_endpoint)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Maximum accepted request body, in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Exchanges kept by the in-memory sliding window
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

fn default_window_size() -> usize {
    10
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
        }
    }
}

/// One pre-bound knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    pub id: String,

    /// Region hosting the knowledge base; falls back to `[aws].region`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBasesConfig {
    #[serde(default = "default_fomc_kb")]
    pub fomc: KnowledgeBaseConfig,

    #[serde(default = "default_scotus_kb")]
    pub scotus: KnowledgeBaseConfig,

    /// Default result-count limit when the model does not pass one
    #[serde(default = "default_number_of_results")]
    pub number_of_results: u32,

    /// Default minimum relevance score when the model does not pass one
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

fn default_fomc_kb() -> KnowledgeBaseConfig {
    KnowledgeBaseConfig {
        id: "P7J0PZOXSE".into(),
        region: Some("us-east-1".into()),
    }
}
fn default_scotus_kb() -> KnowledgeBaseConfig {
    KnowledgeBaseConfig {
        id: "XPXXQUL4A6".into(),
        region: Some("us-east-1".into()),
    }
}
fn default_number_of_results() -> u32 {
    5
}
fn default_min_score() -> f64 {
    0.4
}

impl Default for KnowledgeBasesConfig {
    fn default() -> Self {
        Self {
            fomc: default_fomc_kb(),
            scotus: default_scotus_kb(),
            number_of_results: default_number_of_results(),
            min_score: default_min_score(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Session bucket used by the CLI when `--bucket` is not given.
    /// HTTP requests always name their own bucket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_bucket: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.chatrelay/config.toml),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides (highest priority).
    ///
    /// - `CHATRELAY_MODEL`, `CHATRELAY_PERSONALITY`, `CHATRELAY_SESSION_BUCKET`
    /// - `AWS_REGION` (or `AWS_DEFAULT_REGION`)
    /// - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`
    /// - `AWS_BEARER_TOKEN_BEDROCK`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| var(key).filter(|v| !v.is_empty());

        if let Some(model) = var("CHATRELAY_MODEL") {
            self.default_model = model;
        }
        if let Some(personality) = var("CHATRELAY_PERSONALITY") {
            self.default_personality = personality;
        }
        if let Some(bucket) = var("CHATRELAY_SESSION_BUCKET") {
            self.storage.session_bucket = Some(bucket);
        }
        if let Some(region) = var("AWS_REGION").or_else(|| var("AWS_DEFAULT_REGION")) {
            self.aws.region = region;
        }

        // Access keys travel as a pair; a lone id or secret from the
        // environment must not mix with the other half from the file.
        if let (Some(id), Some(secret)) = (var("AWS_ACCESS_KEY_ID"), var("AWS_SECRET_ACCESS_KEY")) {
            self.aws.access_key_id = Some(id);
            self.aws.secret_access_key = Some(secret);
            self.aws.session_token = var("AWS_SESSION_TOKEN");
        }
        if let Some(token) = var("AWS_BEARER_TOKEN_BEDROCK") {
            self.aws.bearer_token = Some(token);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".chatrelay")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "default_model must not be empty".into(),
            ));
        }

        if self.max_model_calls == 0 {
            return Err(ConfigError::ValidationError(
                "max_model_calls must be at least 1".into(),
            ));
        }

        if self.history.window_size == 0 {
            return Err(ConfigError::ValidationError(
                "history.window_size must be at least 1".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.knowledge_bases.min_score) {
            return Err(ConfigError::ValidationError(
                "knowledge_bases.min_score must be between 0.0 and 1.0".into(),
            ));
        }

        if self.aws.access_key_id.is_some() != self.aws.secret_access_key.is_some() {
            return Err(ConfigError::ValidationError(
                "aws.access_key_id and aws.secret_access_key must be set together".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config --init`).
    pub fn default_toml() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Self::default())
            .map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Render as TOML with every secret replaced by a marker.
    pub fn redacted_toml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        for secret in [
            &mut shown.aws.access_key_id,
            &mut shown.aws.secret_access_key,
            &mut shown.aws.session_token,
            &mut shown.aws.bearer_token,
        ] {
            if secret.is_some() {
                *secret = Some("[REDACTED]".into());
            }
        }
        toml::to_string_pretty(&shown).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default_personality: default_personality(),
            max_model_calls: default_max_model_calls(),
            aws: AwsConfig::default(),
            gateway: GatewayConfig::default(),
            history: HistoryConfig::default(),
            knowledge_bases: KnowledgeBasesConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to serialize config: {0}")]
    SerializeError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_model, "us.amazon.nova-micro-v1:0");
        assert_eq!(config.default_personality, "basic");
        assert_eq!(config.history.window_size, 10);
        assert_eq!(config.knowledge_bases.fomc.id, "P7J0PZOXSE");
        assert_eq!(config.knowledge_bases.scotus.id, "XPXXQUL4A6");
        assert_eq!(config.knowledge_bases.number_of_results, 5);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.knowledge_bases.fomc.id, config.knowledge_bases.fomc.id);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_model, DEFAULT_MODEL_ID);
    }

    #[test]
    fn load_from_file_with_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_personality = "fomc"

[aws]
region = "eu-west-1"

[knowledge_bases.scotus]
id = "KB123"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_personality, "fomc");
        assert_eq!(config.aws.region, "eu-west-1");
        assert_eq!(config.knowledge_bases.scotus.id, "KB123");
        assert!(config.knowledge_bases.scotus.region.is_none());
        assert_eq!(config.knowledge_bases.fomc.id, "P7J0PZOXSE");
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_model = [").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn zero_window_rejected() {
        let mut config = AppConfig::default();
        config.history.window_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn half_configured_access_keys_rejected() {
        let mut config = AppConfig::default();
        config.aws.access_key_id = Some("AKID".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[
            ("CHATRELAY_MODEL", "us.anthropic.claude-sonnet-4-20250514-v1:0"),
            ("CHATRELAY_SESSION_BUCKET", "my-sessions"),
            ("AWS_REGION", "us-west-2"),
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "SECRET"),
            ("AWS_BEARER_TOKEN_BEDROCK", "bedrock-key"),
        ]));
        assert_eq!(config.default_model, "us.anthropic.claude-sonnet-4-20250514-v1:0");
        assert_eq!(config.storage.session_bucket.as_deref(), Some("my-sessions"));
        assert_eq!(config.aws.region, "us-west-2");
        assert!(config.aws.has_access_keys());
        assert!(config.aws.session_token.is_none());
        assert_eq!(config.aws.bearer_token.as_deref(), Some("bedrock-key"));
    }

    #[test]
    fn lone_access_key_from_env_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("AWS_ACCESS_KEY_ID", "AKID")]));
        assert!(config.aws.access_key_id.is_none());
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("CHATRELAY_MODEL", "")]));
        assert_eq!(config.default_model, DEFAULT_MODEL_ID);
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.aws.secret_access_key = Some("super-secret".into());
        config.aws.bearer_token = Some("bedrock-key".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("bedrock-key"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn redacted_toml_hides_secrets() {
        let mut config = AppConfig::default();
        config.aws.access_key_id = Some("AKIDEXAMPLE".into());
        config.aws.secret_access_key = Some("wJalrXUtnFEMI".into());
        config.aws.bearer_token = Some("bedrock-api-key".into());

        let rendered = config.redacted_toml().unwrap();
        assert!(!rendered.contains("AKIDEXAMPLE"));
        assert!(!rendered.contains("wJalrXUtnFEMI"));
        assert!(!rendered.contains("bedrock-api-key"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("session_token"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml().unwrap();
        assert!(toml_str.contains("us.amazon.nova-micro-v1:0"));
        assert!(toml_str.contains("P7J0PZOXSE"));
    }
}
