//! Configuration management for reposage
//!
//! Settings load from environment variables with defaults, then an optional
//! JSON file overlays them. The per-stage model table is the single place
//! where model, sampling kind and output limit are chosen for each prompt.
//!
//! # Environment Variables
//!
//! - `REPOSAGE_PROVIDER`: ollama|openai|anthropic|gemini|xai|groq (also claude, grok) - default: "openai"
//! - `REPOSAGE_MODEL`: model used by every stage - default: "gpt-4o-mini"
//! - `REPOSAGE_<STAGE>_MODEL`: per-stage override, e.g. `REPOSAGE_CALL_HIERARCHY_MODEL`
//! - `REPOSAGE_LLM_ENDPOINT`: custom base URL for the LLM provider
//! - `GITHUB_TOKEN`: optional bearer token for the GitHub API
//! - `REPOSAGE_GITHUB_API_URL`: default: "https://api.github.com"
//! - `REPOSAGE_REQUEST_TIMEOUT`: timeout in seconds - default: "120"
//! - `REPOSAGE_MAX_TOKENS_PER_REQUEST`: token ceiling before files are summarized - default: "10000"
//! - `REPOSAGE_STRUCTURED_OUTPUT`: ask for JSON-schema output (true|false) - default: "true"
//! - `REPOSAGE_INCLUDE_MARKDOWN`: analyze markdown files too (true|false) - default: "false"
//! - `REPOSAGE_LOG_LEVEL`: logging level - default: "info"
//!
//! Provider credentials (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `OLLAMA_HOST`, ...)
//! are read by genai directly.
//!
//! # Config file
//!
//! ```json
//! {
//!   "max_tokens_per_request": 8000,
//!   "stages": [
//!     { "name": "call_hierarchy", "model": "o3-mini", "kind": "reasoning", "max_tokens": 5000 }
//!   ]
//! }
//! ```

use crate::github::{FetchError, GitHubClient, DEFAULT_API_URL};
use crate::pipeline::config::{DEFAULT_MAX_TOKENS_PER_REQUEST, DEFAULT_MODEL};
use crate::pipeline::{ModelKind, PipelineConfig, Stage, StageConfig, StageTable};
use genai::adapter::AdapterKind;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid provider: {0}. Valid options: ollama, openai, anthropic, gemini, xai, groq")]
    InvalidProvider(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to read config file {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    FileParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Accepts genai's lowercase adapter names plus the common product names
pub fn parse_provider(name: &str) -> Result<AdapterKind, ConfigError> {
    let lower = name.trim().to_lowercase();
    let canonical = match lower.as_str() {
        "claude" => "anthropic",
        "grok" => "xai",
        other => other,
    };
    AdapterKind::from_lower_str(canonical).ok_or_else(|| ConfigError::InvalidProvider(name.to_string()))
}

/// One entry of the config file's `stages` list; unset fields keep the
/// value already in the table
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageOverride {
    pub name: Stage,
    pub model: Option<String>,
    pub kind: Option<ModelKind>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_tokens_per_request: Option<usize>,
    pub structured_output: Option<bool>,
    pub include_markdown: Option<bool>,
    #[serde(default)]
    pub stages: Vec<StageOverride>,
}

impl ConfigFile {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::FileParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReposageConfig {
    pub provider: AdapterKind,
    /// Model every stage starts from before overrides
    pub model: String,
    pub stages: StageTable,
    pub llm_endpoint: Option<String>,
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub request_timeout_secs: u64,
    pub max_tokens_per_request: usize,
    pub structured_output: bool,
    pub include_markdown: bool,
    pub log_level: String,
}

impl Default for ReposageConfig {
    /// Loads from `REPOSAGE_*` variables, falling back to defaults for
    /// anything unset or unparseable
    fn default() -> Self {
        let provider = match env::var("REPOSAGE_PROVIDER") {
            Ok(name) => parse_provider(&name).unwrap_or_else(|err| {
                warn!("{}, using openai", err);
                AdapterKind::OpenAI
            }),
            Err(_) => AdapterKind::OpenAI,
        };

        let model = env_string("REPOSAGE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let mut stages = StageTable::uniform(&model);
        for stage in Stage::ALL {
            if let Some(stage_model) = env_string(&stage.model_env_var()) {
                let current = stages.get(stage).clone();
                stages.set(
                    stage,
                    StageConfig::new(stage_model, current.kind, current.max_tokens),
                );
            }
        }

        Self {
            provider,
            model,
            stages,
            llm_endpoint: env_string("REPOSAGE_LLM_ENDPOINT"),
            github_token: env_string("GITHUB_TOKEN"),
            github_api_url: env_string("REPOSAGE_GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            request_timeout_secs: env_parsed("REPOSAGE_REQUEST_TIMEOUT")
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_tokens_per_request: env_parsed("REPOSAGE_MAX_TOKENS_PER_REQUEST")
                .unwrap_or(DEFAULT_MAX_TOKENS_PER_REQUEST),
            structured_output: env_parsed("REPOSAGE_STRUCTURED_OUTPUT").unwrap_or(true),
            include_markdown: env_parsed("REPOSAGE_INCLUDE_MARKDOWN").unwrap_or(false),
            log_level: env_string("REPOSAGE_LOG_LEVEL")
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
                .to_lowercase(),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.trim().parse::<T>().ok())
}

impl ReposageConfig {
    /// `<config dir>/reposage/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("reposage").join("config.json"))
    }

    /// Environment first, then the config file on top. An explicit `path`
    /// must exist; the default location is used only when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let file_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.is_file()),
        };
        if let Some(file_path) = file_path {
            debug!(path = %file_path.display(), "Loading config file");
            config.apply_file(ConfigFile::read(&file_path)?)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn apply_file(&mut self, file: ConfigFile) -> Result<(), ConfigError> {
        if let Some(provider) = file.provider {
            self.provider = parse_provider(&provider)?;
        }
        if let Some(model) = file.model {
            // A new base model only replaces stages still on the old one
            for stage in Stage::ALL {
                let current = self.stages.get(stage).clone();
                if current.model == self.model {
                    self.stages.set(
                        stage,
                        StageConfig::new(model.clone(), current.kind, current.max_tokens),
                    );
                }
            }
            self.model = model;
        }
        if let Some(max_tokens) = file.max_tokens_per_request {
            self.max_tokens_per_request = max_tokens;
        }
        if let Some(structured) = file.structured_output {
            self.structured_output = structured;
        }
        if let Some(include) = file.include_markdown {
            self.include_markdown = include;
        }

        for entry in file.stages {
            let current = self.stages.get(entry.name).clone();
            self.stages.set(
                entry.name,
                StageConfig::new(
                    entry.model.unwrap_or(current.model),
                    entry.kind.unwrap_or(current.kind),
                    entry.max_tokens.unwrap_or(current.max_tokens),
                ),
            );
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
            return Err(ConfigError::ValidationFailed(
                "Request timeout cannot exceed 10 minutes".to_string(),
            ));
        }

        if self.max_tokens_per_request == 0 {
            return Err(ConfigError::ValidationFailed(
                "Max tokens per request must be greater than zero".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        if Url::parse(&self.github_api_url).is_err() {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid GitHub API URL: {}",
                self.github_api_url
            )));
        }

        for (stage, config) in self.stages.iter() {
            if config.model.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "Stage {} has no model",
                    stage
                )));
            }
            if config.max_tokens == 0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "Stage {} ({:?} model) needs max_tokens greater than zero",
                    stage, config.kind
                )));
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new()
            .with_stages(self.stages.clone())
            .with_max_tokens_per_request(self.max_tokens_per_request)
            .with_structured_output(self.structured_output)
            .with_markdown(self.include_markdown)
    }

    pub fn github_client(&self) -> Result<GitHubClient, FetchError> {
        GitHubClient::with_base_url(
            &self.github_api_url,
            self.github_token.clone(),
            self.request_timeout(),
        )
    }
}

impl fmt::Display for ReposageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reposage Configuration:")?;
        writeln!(f, "  Provider: {}", self.provider)?;
        writeln!(f, "  Model: {}", self.model)?;
        for (stage, config) in self.stages.iter() {
            writeln!(
                f,
                "    {}: {} ({:?}, max {} tokens)",
                stage, config.model, config.kind, config.max_tokens
            )?;
        }
        if let Some(ref endpoint) = self.llm_endpoint {
            writeln!(f, "  LLM Endpoint: {}", endpoint)?;
        }
        writeln!(f, "  GitHub API: {}", self.github_api_url)?;
        writeln!(
            f,
            "  GitHub Token: {}",
            if self.github_token.is_some() { "set" } else { "not set" }
        )?;
        writeln!(f, "  Request Timeout: {}s", self.request_timeout_secs)?;
        writeln!(f, "  Max Tokens Per Request: {}", self.max_tokens_per_request)?;
        writeln!(f, "  Structured Output: {}", self.structured_output)?;
        writeln!(f, "  Include Markdown: {}", self.include_markdown)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    fn clean_env() -> Vec<EnvGuard> {
        let mut guards: Vec<EnvGuard> = [
            "REPOSAGE_PROVIDER",
            "REPOSAGE_MODEL",
            "REPOSAGE_LLM_ENDPOINT",
            "GITHUB_TOKEN",
            "REPOSAGE_GITHUB_API_URL",
            "REPOSAGE_REQUEST_TIMEOUT",
            "REPOSAGE_MAX_TOKENS_PER_REQUEST",
            "REPOSAGE_STRUCTURED_OUTPUT",
            "REPOSAGE_INCLUDE_MARKDOWN",
            "REPOSAGE_LOG_LEVEL",
        ]
        .iter()
        .map(|key| EnvGuard::unset(key))
        .collect();
        for stage in Stage::ALL {
            guards.push(EnvGuard::unset(&stage.model_env_var()));
        }
        guards
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = clean_env();

        let config = ReposageConfig::default();

        assert_eq!(config.provider, AdapterKind::OpenAI);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.github_api_url, DEFAULT_API_URL);
        assert!(config.github_token.is_none());
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.max_tokens_per_request, 10_000);
        assert!(config.structured_output);
        assert!(!config.include_markdown);
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let mut guards = clean_env();
        guards.extend([
            EnvGuard::set("REPOSAGE_PROVIDER", "Claude"),
            EnvGuard::set("REPOSAGE_MODEL", "claude-sonnet"),
            EnvGuard::set("REPOSAGE_CALL_HIERARCHY_MODEL", "claude-opus"),
            EnvGuard::set("GITHUB_TOKEN", "ghp_test"),
            EnvGuard::set("REPOSAGE_REQUEST_TIMEOUT", "60"),
            EnvGuard::set("REPOSAGE_MAX_TOKENS_PER_REQUEST", "2500"),
            EnvGuard::set("REPOSAGE_STRUCTURED_OUTPUT", "false"),
            EnvGuard::set("REPOSAGE_LOG_LEVEL", "DEBUG"),
        ]);

        let config = ReposageConfig::default();

        assert_eq!(config.provider, AdapterKind::Anthropic);
        assert_eq!(config.stages.get(Stage::CodeAnalysis).model, "claude-sonnet");
        assert_eq!(config.stages.get(Stage::CallHierarchy).model, "claude-opus");
        assert_eq!(config.github_token.as_deref(), Some("ghp_test"));
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.max_tokens_per_request, 2500);
        assert!(!config.structured_output);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_unparseable_values_fall_back() {
        let mut guards = clean_env();
        guards.extend([
            EnvGuard::set("REPOSAGE_PROVIDER", "not-a-provider"),
            EnvGuard::set("REPOSAGE_REQUEST_TIMEOUT", "soon"),
        ]);

        let config = ReposageConfig::default();
        assert_eq!(config.provider, AdapterKind::OpenAI);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_parse_provider_aliases() {
        assert_eq!(parse_provider("ollama").unwrap(), AdapterKind::Ollama);
        assert_eq!(parse_provider("grok").unwrap(), AdapterKind::Xai);
        assert_eq!(parse_provider("GROQ").unwrap(), AdapterKind::Groq);
        assert!(matches!(
            parse_provider("skynet"),
            Err(ConfigError::InvalidProvider(_))
        ));
    }

    #[test]
    #[serial]
    fn test_config_file_overlays_env() {
        let mut guards = clean_env();
        guards.push(EnvGuard::set("REPOSAGE_MAX_TOKENS_PER_REQUEST", "2500"));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "max_tokens_per_request": 8000,
                "stages": [
                    {{ "name": "call_hierarchy", "model": "o3-mini", "kind": "reasoning" }},
                    {{ "name": "code_analysis", "max_tokens": 3000 }}
                ]
            }}"#
        )
        .unwrap();

        let config = ReposageConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.max_tokens_per_request, 8000);

        let hierarchy = config.stages.get(Stage::CallHierarchy);
        assert_eq!(hierarchy.model, "o3-mini");
        assert_eq!(hierarchy.kind, ModelKind::Reasoning);
        assert_eq!(hierarchy.max_tokens, 5000);

        let analysis = config.stages.get(Stage::CodeAnalysis);
        assert_eq!(analysis.model, DEFAULT_MODEL);
        assert_eq!(analysis.max_tokens, 3000);

        let pipeline = config.to_pipeline_config();
        assert_eq!(pipeline.max_tokens_per_request, 8000);
        assert_eq!(pipeline.stage(Stage::CallHierarchy).kind.temperature(), 1.0);
    }

    #[test]
    #[serial]
    fn test_file_model_keeps_stage_overrides() {
        let mut guards = clean_env();
        guards.push(EnvGuard::set("REPOSAGE_PROJECT_SUMMARY_MODEL", "gpt-4o"));

        let mut config = ReposageConfig::default();
        config
            .apply_file(ConfigFile {
                model: Some("gpt-4.1-mini".to_string()),
                ..ConfigFile::default()
            })
            .unwrap();

        assert_eq!(config.stages.get(Stage::FileSelection).model, "gpt-4.1-mini");
        assert_eq!(config.stages.get(Stage::ProjectSummary).model, "gpt-4o");
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_an_error() {
        let _guards = clean_env();
        let dir = tempfile::tempdir().unwrap();
        let result = ReposageConfig::load(Some(&dir.path().join("nope.json")));
        assert!(matches!(result, Err(ConfigError::FileRead { .. })));
    }

    #[test]
    #[serial]
    fn test_unknown_file_keys_are_rejected() {
        let _guards = clean_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "max_tokens": 5 }}"#).unwrap();

        let result = ReposageConfig::load(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::FileParse { .. })));
    }

    #[test]
    #[serial]
    fn test_validation() {
        let _guards = clean_env();

        let mut config = ReposageConfig::default();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ReposageConfig::default();
        config.request_timeout_secs = 601;
        assert!(config.validate().is_err());

        let mut config = ReposageConfig::default();
        config.max_tokens_per_request = 0;
        assert!(config.validate().is_err());

        let mut config = ReposageConfig::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = ReposageConfig::default();
        config.stages.set(
            Stage::CallHierarchy,
            StageConfig::new("o3-mini", ModelKind::Reasoning, 0),
        );
        assert!(config.validate().is_err());

        let mut config = ReposageConfig::default();
        config
            .stages
            .set(Stage::ContentSummary, StageConfig::new(" ", ModelKind::Standard, 10));
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_config_display() {
        let _guards = clean_env();
        let display = format!("{}", ReposageConfig::default());
        assert!(display.contains("Reposage Configuration:"));
        assert!(display.contains("call_hierarchy: gpt-4o-mini"));
        assert!(display.contains("GitHub Token: not set"));
    }
}
