use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::analysis::AnalysisResult;
use super::config::PipelineConfig;
use super::context::RunContext;
use super::phases::{analyze, budget, classify, fetch, hierarchy, select, summary, understand};
use super::session::{AnalyzerProcessState, SessionRegistry};
use super::state::AnalysisState;
use crate::error::AnalysisError;
use crate::github::{RepoLocator, SourceHost};
use crate::llm::LLMClient;
use crate::progress::{LoggingHandler, ProgressEvent, ProgressHandler};
use crate::tree::FileTreeNode;

/// Drives one repository through the whole pipeline.
///
/// Runs are admitted through the shared [`SessionRegistry`]: only one
/// session analyzes at a time, and restarting a session evicts its previous
/// run. A canceled run resolves to `Ok(None)`.
pub struct AnalysisOrchestrator {
    llm: Arc<dyn LLMClient>,
    host: Arc<dyn SourceHost>,
    registry: Arc<SessionRegistry>,
    config: PipelineConfig,
    progress: Arc<dyn ProgressHandler>,
}

impl AnalysisOrchestrator {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        host: Arc<dyn SourceHost>,
        registry: Arc<SessionRegistry>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            llm,
            host,
            registry,
            config,
            progress: Arc::new(LoggingHandler),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run_analysis(
        &self,
        repo_url: &str,
        session_id: &str,
    ) -> Result<Option<AnalysisResult>, AnalysisError> {
        self.run(repo_url, session_id, None).await
    }

    /// Like [`AnalysisOrchestrator::run_analysis`], also canceling the run
    /// when `signal` fires
    pub async fn run_analysis_with_signal(
        &self,
        repo_url: &str,
        session_id: &str,
        signal: &CancellationToken,
    ) -> Result<Option<AnalysisResult>, AnalysisError> {
        self.run(repo_url, session_id, Some(signal)).await
    }

    /// Cancels a session's run. Returns `false` for an unknown session.
    pub fn cancel(&self, session_id: &str) -> bool {
        self.registry.cancel(session_id)
    }

    pub fn force_terminate_all(&self) {
        self.registry.force_terminate_all();
    }

    pub fn reset_state(&self) {
        self.registry.reset_state();
    }

    pub fn process_state(&self) -> AnalyzerProcessState {
        self.registry.state()
    }

    async fn run(
        &self,
        repo_url: &str,
        session_id: &str,
        signal: Option<&CancellationToken>,
    ) -> Result<Option<AnalysisResult>, AnalysisError> {
        let locator = RepoLocator::parse(repo_url)?;
        let session = self.registry.begin(session_id, signal)?;

        let ctx = RunContext::new(
            Arc::clone(&self.llm),
            Arc::clone(&self.host),
            self.config.clone(),
            session,
            Arc::clone(&self.progress),
            locator,
        );
        ctx.emit(ProgressEvent::Started {
            repo: ctx.locator().to_string(),
            session_id: session_id.to_string(),
        });

        match self.execute(&ctx).await {
            Ok(result) => Ok(Some(result)),
            Err(AnalysisError::Canceled) => {
                info!(session = session_id, "Analysis canceled");
                ctx.transition(AnalysisState::Canceled);
                ctx.emit(ProgressEvent::Canceled {
                    session_id: session_id.to_string(),
                });
                Ok(None)
            }
            Err(err) => {
                error!(session = session_id, stage = err.stage_label(), error = %err, "Analysis failed");
                ctx.transition(AnalysisState::Failed);
                ctx.emit(ProgressEvent::Failed {
                    stage: err.stage_label().to_string(),
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn execute(&self, ctx: &RunContext) -> Result<AnalysisResult, AnalysisError> {
        let start = Instant::now();

        ctx.transition(AnalysisState::Initializing);
        ctx.checkpoint()?;

        ctx.transition(AnalysisState::FetchingMetadata);
        let metadata = fetch::fetch_metadata(ctx).await?;

        ctx.transition(AnalysisState::FetchingTree);
        let snapshot = fetch::fetch_snapshot(ctx, metadata).await?;
        let file_tree = FileTreeNode::from_entries(snapshot.tree());
        let path_digest = snapshot.path_digest();

        ctx.transition(AnalysisState::UnderstandingProject);
        let readme = fetch::fetch_readme(ctx, &snapshot).await?;
        let understanding = understand::execute(ctx, &snapshot, &readme).await?;

        ctx.transition(AnalysisState::SelectingFiles);
        let skip = classify::SkipList::for_config(ctx.config().include_markdown);
        let candidates = classify::classify_static(snapshot.tree(), &skip);
        debug!(candidates = candidates.len(), "Static classification done");
        let selection = select::execute(ctx, &candidates, &understanding).await?;

        let total = selection.files.len();
        let mut budget = budget::TokenBudget::new(ctx.config().max_tokens_per_request);
        let mut files = Vec::with_capacity(total);

        for (index, file) in selection.files.iter().enumerate() {
            ctx.checkpoint()?;
            ctx.transition(AnalysisState::AnalyzingFiles {
                current: index + 1,
                total,
            });
            ctx.emit(ProgressEvent::FileStarted {
                path: file.path.clone(),
                index: index + 1,
                total,
            });
            let file_start = Instant::now();

            let content = fetch::fetch_file(ctx, &file.path).await?;
            let prepared =
                budget::prepare_content(ctx, &mut budget, &file.path, content, &path_digest)
                    .await?;
            let record = analyze::execute(ctx, &file.path, &prepared, &path_digest).await?;

            ctx.emit(ProgressEvent::FileComplete {
                path: file.path.clone(),
                degraded_metadata: record.metadata.is_degraded(),
                duration: file_start.elapsed(),
            });
            files.push(record);
        }

        ctx.transition(AnalysisState::ComposingHierarchy);
        let call_hierarchy = hierarchy::execute(ctx, &understanding, &files).await?;

        ctx.transition(AnalysisState::ComposingSummary);
        let summary = summary::execute(
            ctx,
            &snapshot,
            &understanding,
            &file_tree,
            &files,
            &call_hierarchy,
        )
        .await?;

        ctx.checkpoint()?;
        ctx.transition(AnalysisState::Complete);
        ctx.emit(ProgressEvent::Completed {
            files_analyzed: files.len(),
            total_tokens: budget.total(),
            total_time: start.elapsed(),
        });

        Ok(AnalysisResult {
            snapshot,
            file_tree,
            readme,
            project_understanding: understanding,
            candidate_count: candidates.len(),
            selection_strategy: selection.strategy.to_string(),
            files,
            call_hierarchy,
            summary,
            total_tokens: budget.total(),
            duration: start.elapsed(),
            completed_at: chrono::Utc::now(),
        })
    }
}
