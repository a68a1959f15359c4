//! Error taxonomy for an analysis run

use crate::github::FetchError;
use crate::llm::BackendError;
use crate::pipeline::Stage;
use thiserror::Error;

/// Terminal outcome of a failed (or refused) analysis run.
///
/// Structured-extraction failures never show up here: they are absorbed
/// where they happen with a degraded value. What remains are failures of
/// the calls themselves, bad input, and the two control signals.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid GitHub repository URL: {0}")]
    InvalidRepoUrl(String),

    #[error("Failed to {operation}: {source}")]
    UpstreamFetch {
        operation: String,
        #[source]
        source: FetchError,
    },

    #[error("LLM call failed during {stage}: {source}")]
    LlmCall {
        stage: Stage,
        #[source]
        source: BackendError,
    },

    #[error("Analysis canceled by user")]
    Canceled,

    #[error("An analysis is already running for session '{active_session}'")]
    AlreadyAnalyzing { active_session: String },
}

impl AnalysisError {
    pub fn upstream(operation: impl Into<String>, source: FetchError) -> Self {
        AnalysisError::UpstreamFetch {
            operation: operation.into(),
            source,
        }
    }

    pub fn llm(stage: Stage, source: BackendError) -> Self {
        AnalysisError::LlmCall { stage, source }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, AnalysisError::Canceled)
    }

    /// Short label of the stage that failed, for user-facing messages
    pub fn stage_label(&self) -> &str {
        match self {
            AnalysisError::InvalidRepoUrl(_) => "input validation",
            AnalysisError::UpstreamFetch { operation, .. } => operation,
            AnalysisError::LlmCall { stage, .. } => stage.as_str(),
            AnalysisError::Canceled => "cancellation",
            AnalysisError::AlreadyAnalyzing { .. } => "admission",
        }
    }
}
