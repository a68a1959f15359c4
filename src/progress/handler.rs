//! Progress handler trait and events

use crate::pipeline::{AnalysisState, Stage};
use std::sync::Mutex;
use std::time::Duration;

/// Events emitted while an analysis runs
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Run registered and about to start
    Started { repo: String, session_id: String },

    /// Pipeline moved to a new state
    StateChanged { state: AnalysisState },

    /// The host returned only part of the recursive tree
    TreeTruncated { entries: usize },

    /// README could not be fetched; the placeholder is used instead
    ReadmeUnavailable { path: String, error: String },

    /// Relevance selection finished
    FilesSelected {
        strategy: String,
        selected: usize,
        candidates: usize,
    },

    FileStarted {
        path: String,
        index: usize,
        total: usize,
    },

    /// Content was replaced by its summary to stay under the token ceiling
    FileSummarized {
        path: String,
        original_tokens: usize,
        summary_tokens: usize,
        total_tokens: usize,
    },

    FileComplete {
        path: String,
        degraded_metadata: bool,
        duration: Duration,
    },

    LlmRequestStarted { stage: Stage },

    LlmResponseReceived {
        stage: Stage,
        response_time: Duration,
    },

    Completed {
        files_analyzed: usize,
        total_tokens: usize,
        total_time: Duration,
    },

    Canceled { session_id: String },

    Failed { stage: String, error: String },
}

/// Receives progress events
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Keeps every event, for tests and for callers that replay a run
#[derive(Debug, Default)]
pub struct CollectingHandler {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// States in the order they were entered
    pub fn states(&self) -> Vec<AnalysisState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::StateChanged { state } => Some(state),
                _ => None,
            })
            .collect()
    }
}

impl ProgressHandler for CollectingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    impl ProgressHandler for CountingHandler {
        fn on_progress(&self, _event: &ProgressEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_progress_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = CountingHandler {
            count: count.clone(),
        };

        handler.on_progress(&ProgressEvent::Started {
            repo: "octo/demo".to_string(),
            session_id: "s1".to_string(),
        });
        handler.on_progress(&ProgressEvent::StateChanged {
            state: AnalysisState::FetchingTree,
        });
        handler.on_progress(&ProgressEvent::Completed {
            files_analyzed: 3,
            total_tokens: 1200,
            total_time: Duration::from_secs(5),
        });

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_collecting_handler_states() {
        let handler = CollectingHandler::new();
        handler.on_progress(&ProgressEvent::StateChanged {
            state: AnalysisState::Initializing,
        });
        handler.on_progress(&ProgressEvent::LlmRequestStarted {
            stage: Stage::ProjectStructure,
        });
        handler.on_progress(&ProgressEvent::StateChanged {
            state: AnalysisState::Complete,
        });

        assert_eq!(handler.events().len(), 3);
        assert_eq!(
            handler.states(),
            vec![AnalysisState::Initializing, AnalysisState::Complete]
        );
        NoOpHandler.on_progress(&ProgressEvent::Canceled {
            session_id: "s1".to_string(),
        });
    }
}
