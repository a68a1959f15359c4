//! Per-run context shared by the pipeline phases

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::error::AnalysisError;
use crate::github::{FetchError, RepoLocator, SourceHost};
use crate::llm::{LLMClient, LLMRequest, LLMResponse, ResponseSchema};
use crate::progress::{ProgressEvent, ProgressHandler};

use super::config::{PipelineConfig, Stage};
use super::session::SessionHandle;
use super::state::AnalysisState;

/// Everything one run needs: collaborators, configuration and its session.
///
/// Every outbound call goes through [`RunContext::call_llm`] or
/// [`RunContext::fetch`], which race the call against the session's abort
/// signal and poll the cancellation flag again once the call returns.
pub struct RunContext {
    llm: Arc<dyn LLMClient>,
    host: Arc<dyn SourceHost>,
    config: PipelineConfig,
    session: SessionHandle,
    progress: Arc<dyn ProgressHandler>,
    locator: RepoLocator,
}

impl RunContext {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        host: Arc<dyn SourceHost>,
        config: PipelineConfig,
        session: SessionHandle,
        progress: Arc<dyn ProgressHandler>,
        locator: RepoLocator,
    ) -> Self {
        Self {
            llm,
            host,
            config,
            session,
            progress,
            locator,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn host(&self) -> &dyn SourceHost {
        self.host.as_ref()
    }

    pub fn locator(&self) -> &RepoLocator {
        &self.locator
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn emit(&self, event: ProgressEvent) {
        self.progress.on_progress(&event);
    }

    pub fn transition(&self, state: AnalysisState) {
        self.session.set_state(state);
        self.emit(ProgressEvent::StateChanged { state });
    }

    /// Fails with [`AnalysisError::Canceled`] once the run was canceled
    pub fn checkpoint(&self) -> Result<(), AnalysisError> {
        if self.session.is_canceled() {
            return Err(AnalysisError::Canceled);
        }
        Ok(())
    }

    pub async fn call_llm(
        &self,
        stage: Stage,
        request: LLMRequest,
    ) -> Result<LLMResponse, AnalysisError> {
        self.checkpoint()?;

        let guard = self.session.track_request();
        self.emit(ProgressEvent::LlmRequestStarted { stage });
        let start = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = guard.token().cancelled() => None,
            result = self.llm.chat(request) => Some(result),
        };
        drop(guard);

        self.checkpoint()?;
        let response = match outcome {
            Some(result) => result.map_err(|source| AnalysisError::llm(stage, source))?,
            None => return Err(AnalysisError::Canceled),
        };

        self.emit(ProgressEvent::LlmResponseReceived {
            stage,
            response_time: start.elapsed(),
        });
        Ok(response)
    }

    /// Sends `prompt` with the stage's configured model settings
    pub async fn call_stage(&self, stage: Stage, prompt: String) -> Result<String, AnalysisError> {
        let request = self.config.stage(stage).request(prompt);
        Ok(self.call_llm(stage, request).await?.content)
    }

    /// Like [`RunContext::call_stage`], constraining the output to `schema`
    /// when structured output is enabled
    pub async fn call_stage_structured(
        &self,
        stage: Stage,
        prompt: String,
        schema: ResponseSchema,
    ) -> Result<String, AnalysisError> {
        let mut request = self.config.stage(stage).request(prompt);
        if self.config.use_structured_output {
            request = request.with_response_schema(schema);
        }
        Ok(self.call_llm(stage, request).await?.content)
    }

    /// Runs a source-control call under the run's abort signal
    pub async fn fetch<T, F>(&self, operation: &str, call: F) -> Result<T, AnalysisError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        self.checkpoint()?;

        let outcome = tokio::select! {
            biased;
            _ = self.session.token().cancelled() => None,
            result = call => Some(result),
        };

        self.checkpoint()?;
        match outcome {
            Some(result) => result.map_err(|source| AnalysisError::upstream(operation, source)),
            None => Err(AnalysisError::Canceled),
        }
    }
}
