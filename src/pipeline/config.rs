use crate::llm::LLMRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS_PER_REQUEST: usize = 10_000;

/// One prompt stage of the analysis, each with its own model settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ProjectStructure,
    FileSelection,
    ContentSummary,
    CodeAnalysis,
    CallHierarchy,
    ProjectSummary,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::ProjectStructure,
        Stage::FileSelection,
        Stage::ContentSummary,
        Stage::CodeAnalysis,
        Stage::CallHierarchy,
        Stage::ProjectSummary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ProjectStructure => "project_structure",
            Stage::FileSelection => "file_selection",
            Stage::ContentSummary => "content_summary",
            Stage::CodeAnalysis => "code_analysis",
            Stage::CallHierarchy => "call_hierarchy",
            Stage::ProjectSummary => "project_summary",
        }
    }

    /// Environment variable overriding this stage's model,
    /// e.g. `REPOSAGE_CALL_HIERARCHY_MODEL`
    pub fn model_env_var(&self) -> String {
        format!("REPOSAGE_{}_MODEL", self.as_str().to_uppercase())
    }

    /// Output token limit used when nothing else is configured
    pub fn default_max_tokens(&self) -> u32 {
        match self {
            Stage::ProjectStructure => 2000,
            Stage::FileSelection => 2000,
            Stage::ContentSummary => 2000,
            Stage::CodeAnalysis => 4000,
            Stage::CallHierarchy => 5000,
            Stage::ProjectSummary => 5000,
        }
    }

    fn index(&self) -> usize {
        match self {
            Stage::ProjectStructure => 0,
            Stage::FileSelection => 1,
            Stage::ContentSummary => 2,
            Stage::CodeAnalysis => 3,
            Stage::CallHierarchy => 4,
            Stage::ProjectSummary => 5,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s.trim())
            .ok_or_else(|| {
                format!(
                    "unknown stage '{}', expected one of: {}",
                    s,
                    Stage::ALL.map(|s| s.as_str()).join(", ")
                )
            })
    }
}

/// Sampling policy of a model family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Standard,
    /// Reasoning models only accept the default temperature
    Reasoning,
}

impl ModelKind {
    pub fn temperature(&self) -> f32 {
        match self {
            ModelKind::Standard => 0.3,
            ModelKind::Reasoning => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub model: String,
    #[serde(default)]
    pub kind: ModelKind,
    pub max_tokens: u32,
}

impl StageConfig {
    pub fn new(model: impl Into<String>, kind: ModelKind, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            kind,
            max_tokens,
        }
    }

    /// Single-prompt request carrying this stage's model settings
    pub fn request(&self, prompt: impl Into<String>) -> LLMRequest {
        LLMRequest::prompt(prompt)
            .with_model(self.model.clone())
            .with_temperature(self.kind.temperature())
            .with_max_tokens(self.max_tokens)
    }
}

/// Model settings for every [`Stage`]
#[derive(Debug, Clone, PartialEq)]
pub struct StageTable {
    entries: [StageConfig; 6],
}

impl StageTable {
    /// Same standard model for every stage with per-stage default limits
    pub fn uniform(model: &str) -> Self {
        Self {
            entries: Stage::ALL
                .map(|stage| StageConfig::new(model, ModelKind::Standard, stage.default_max_tokens())),
        }
    }

    pub fn get(&self, stage: Stage) -> &StageConfig {
        &self.entries[stage.index()]
    }

    pub fn set(&mut self, stage: Stage, config: StageConfig) {
        self.entries[stage.index()] = config;
    }

    pub fn with_stage(mut self, stage: Stage, config: StageConfig) -> Self {
        self.set(stage, config);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, &StageConfig)> {
        Stage::ALL.into_iter().map(move |stage| (stage, self.get(stage)))
    }
}

impl Default for StageTable {
    fn default() -> Self {
        Self::uniform(DEFAULT_MODEL)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub stages: StageTable,
    /// Ceiling for the running token estimate before files get summarized
    pub max_tokens_per_request: usize,
    /// Ask providers for JSON-schema constrained output where a stage wants JSON
    pub use_structured_output: bool,
    /// Keep markdown files among the classifier's candidates
    pub include_markdown: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stages: StageTable::default(),
            max_tokens_per_request: DEFAULT_MAX_TOKENS_PER_REQUEST,
            use_structured_output: true,
            include_markdown: false,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stages(mut self, stages: StageTable) -> Self {
        self.stages = stages;
        self
    }

    pub fn with_max_tokens_per_request(mut self, max_tokens: usize) -> Self {
        self.max_tokens_per_request = max_tokens;
        self
    }

    pub fn with_structured_output(mut self, enabled: bool) -> Self {
        self.use_structured_output = enabled;
        self
    }

    pub fn with_markdown(mut self, include: bool) -> Self {
        self.include_markdown = include;
        self
    }

    pub fn stage(&self, stage: Stage) -> &StageConfig {
        self.stages.get(stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_tokens_per_request, 10_000);
        assert!(config.use_structured_output);
        assert!(!config.include_markdown);
        assert_eq!(config.stage(Stage::CodeAnalysis).model, DEFAULT_MODEL);
        assert_eq!(config.stage(Stage::CallHierarchy).max_tokens, 5000);
    }

    #[test]
    fn test_builder_pattern() {
        let stages = StageTable::uniform("gpt-4o").with_stage(
            Stage::CallHierarchy,
            StageConfig::new("o3-mini", ModelKind::Reasoning, 8000),
        );
        let config = PipelineConfig::new()
            .with_stages(stages)
            .with_max_tokens_per_request(500)
            .with_structured_output(false)
            .with_markdown(true);

        assert_eq!(config.max_tokens_per_request, 500);
        assert!(!config.use_structured_output);
        assert!(config.include_markdown);
        assert_eq!(config.stage(Stage::ProjectSummary).model, "gpt-4o");
        assert_eq!(config.stage(Stage::CallHierarchy).kind, ModelKind::Reasoning);
    }

    #[test]
    fn test_stage_names_round_trip() {
        for stage in Stage::ALL {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
            assert_eq!(stage.to_string(), stage.as_str());
        }
        assert!("nope".parse::<Stage>().is_err());
        assert_eq!(
            Stage::CodeAnalysis.model_env_var(),
            "REPOSAGE_CODE_ANALYSIS_MODEL"
        );
    }

    #[test]
    fn test_stage_request_uses_kind_temperature() {
        let request = StageConfig::new("o1-mini", ModelKind::Reasoning, 1234).request("hello");
        assert_eq!(request.model.as_deref(), Some("o1-mini"));
        assert_eq!(request.temperature, Some(1.0));
        assert_eq!(request.max_tokens, Some(1234));
        assert_eq!(request.user_text(), "hello");

        let request = StageConfig::new("gpt-4o", ModelKind::Standard, 10).request("x");
        assert_eq!(request.temperature, Some(0.3));
    }

    #[test]
    fn test_stage_config_deserializes_without_kind() {
        let config: StageConfig =
            serde_json::from_str(r#"{"model":"gpt-4o","max_tokens":100}"#).unwrap();
        assert_eq!(config.kind, ModelKind::Standard);
    }
}
