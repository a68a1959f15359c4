use serde::Serialize;
use std::fmt;

/// Where a run is in the pipeline.
///
/// A run walks the states in declaration order; `Canceled` and `Failed`
/// can be entered from any state that is not yet terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnalysisState {
    Idle,
    Initializing,
    FetchingMetadata,
    FetchingTree,
    UnderstandingProject,
    SelectingFiles,
    /// `current` is 1-based
    AnalyzingFiles { current: usize, total: usize },
    ComposingHierarchy,
    ComposingSummary,
    Complete,
    Canceled,
    Failed,
}

impl AnalysisState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AnalysisState::Complete | AnalysisState::Canceled | AnalysisState::Failed
        )
    }
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisState::Idle => f.write_str("idle"),
            AnalysisState::Initializing => f.write_str("initializing"),
            AnalysisState::FetchingMetadata => f.write_str("fetching repository metadata"),
            AnalysisState::FetchingTree => f.write_str("fetching file tree"),
            AnalysisState::UnderstandingProject => f.write_str("understanding project"),
            AnalysisState::SelectingFiles => f.write_str("selecting files"),
            AnalysisState::AnalyzingFiles { current, total } => {
                write!(f, "analyzing files ({}/{})", current, total)
            }
            AnalysisState::ComposingHierarchy => f.write_str("composing call hierarchy"),
            AnalysisState::ComposingSummary => f.write_str("composing summary"),
            AnalysisState::Complete => f.write_str("complete"),
            AnalysisState::Canceled => f.write_str("canceled"),
            AnalysisState::Failed => f.write_str("failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(AnalysisState::Complete.is_terminal());
        assert!(AnalysisState::Canceled.is_terminal());
        assert!(AnalysisState::Failed.is_terminal());
        assert!(!AnalysisState::AnalyzingFiles { current: 1, total: 2 }.is_terminal());
        assert!(!AnalysisState::Idle.is_terminal());
    }

    #[test]
    fn test_display_and_serialize() {
        let state = AnalysisState::AnalyzingFiles { current: 3, total: 7 };
        assert_eq!(state.to_string(), "analyzing files (3/7)");
        assert_eq!(
            serde_json::to_value(state).unwrap(),
            serde_json::json!({"state": "analyzing_files", "current": 3, "total": 7})
        );
    }
}
