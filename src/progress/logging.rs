//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { repo, session_id } => {
                info!(repo = %repo, session = %session_id, "Starting analysis");
            }
            ProgressEvent::StateChanged { state } => {
                info!(state = %state, "Pipeline state");
            }
            ProgressEvent::TreeTruncated { entries } => {
                warn!(entries, "File tree truncated by host, analyzing partial tree");
            }
            ProgressEvent::ReadmeUnavailable { path, error } => {
                warn!(path = %path, error = %error, "README unavailable, using placeholder");
            }
            ProgressEvent::FilesSelected {
                strategy,
                selected,
                candidates,
            } => {
                info!(strategy = %strategy, selected, candidates, "Files selected");
            }
            ProgressEvent::FileStarted { path, index, total } => {
                info!(
                    path = %path,
                    progress = format!("{}/{}", index, total),
                    "Analyzing file"
                );
            }
            ProgressEvent::FileSummarized {
                path,
                original_tokens,
                summary_tokens,
                total_tokens,
            } => {
                info!(
                    path = %path,
                    original_tokens,
                    summary_tokens,
                    total_tokens,
                    "Token ceiling reached, analyzing summary"
                );
            }
            ProgressEvent::FileComplete {
                path,
                degraded_metadata,
                duration,
            } => {
                if *degraded_metadata {
                    warn!(
                        path = %path,
                        duration_ms = duration.as_millis(),
                        "File analyzed, metadata could not be parsed"
                    );
                } else {
                    debug!(
                        path = %path,
                        duration_ms = duration.as_millis(),
                        "File analysis complete"
                    );
                }
            }
            ProgressEvent::LlmRequestStarted { stage } => {
                debug!(stage = %stage, "Sending request to LLM");
            }
            ProgressEvent::LlmResponseReceived {
                stage,
                response_time,
            } => {
                debug!(
                    stage = %stage,
                    response_time_ms = response_time.as_millis(),
                    "Received LLM response"
                );
            }
            ProgressEvent::Completed {
                files_analyzed,
                total_tokens,
                total_time,
            } => {
                info!(
                    files = files_analyzed,
                    tokens = total_tokens,
                    total_time_ms = total_time.as_millis(),
                    "Analysis complete"
                );
            }
            ProgressEvent::Canceled { session_id } => {
                info!(session = %session_id, "Analysis canceled by user");
            }
            ProgressEvent::Failed { stage, error } => {
                warn!(stage = %stage, error = %error, "Analysis failed");
            }
        }
    }
}
