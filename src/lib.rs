//! reposage - LLM-powered explanations of GitHub repositories
//!
//! A run reads a repository's metadata and recursive file tree, builds an
//! understanding of the project, narrows the files down to the ones that
//! matter and analyzes them one by one under a token budget. It then
//! composes a call hierarchy and a project summary.
//!
//! # Core Concepts
//!
//! - **Sessions**: every run is registered in a [`SessionRegistry`] under a
//!   session id. Only one session analyzes at a time, and restarting a
//!   session evicts its previous run.
//! - **Cancellation**: cooperative. Every outbound call races the session's
//!   [`CancellationToken`](tokio_util::sync::CancellationToken) and the
//!   flag is polled between steps; a canceled run resolves to `Ok(None)`.
//! - **Degraded fallbacks**: unparseable model output (file metadata,
//!   relevance rankings) is replaced locally instead of failing the run.
//!
//! # Example Usage
//!
//! ```no_run
//! use reposage::{AnalysisOrchestrator, GitHubClient, ReposageConfig, SessionRegistry};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ReposageConfig::load(None)?;
//! let llm = reposage::llm::select_llm_client(&config).await?.client;
//! let host = Arc::new(config.github_client()?);
//!
//! let orchestrator = AnalysisOrchestrator::new(
//!     llm,
//!     host,
//!     Arc::new(SessionRegistry::new()),
//!     config.to_pipeline_config(),
//! );
//!
//! if let Some(result) = orchestrator
//!     .run_analysis("https://github.com/octo/demo", "session-1")
//!     .await?
//! {
//!     println!("{}", reposage::report::render_markdown(&result));
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod github;
pub mod llm;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod tree;
pub mod util;

pub use config::{ConfigError, ReposageConfig};
pub use error::AnalysisError;
pub use github::{FetchError, GitHubClient, RepoLocator, SourceHost};
pub use llm::{BackendError, LLMClient};
pub use pipeline::{
    AnalysisOrchestrator, AnalysisResult, AnalysisState, AnalyzerProcessState, PipelineConfig,
    SessionRegistry, Stage,
};
pub use tree::FileTreeNode;
pub use util::{init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_reposage() {
        assert_eq!(NAME, "reposage");
    }
}
