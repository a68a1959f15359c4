pub mod analysis;
pub mod config;
pub mod context;
pub mod orchestrator;
pub mod phases;
pub mod session;
pub mod state;

pub use analysis::AnalysisResult;
pub use config::{ModelKind, PipelineConfig, Stage, StageConfig, StageTable};
pub use context::RunContext;
pub use orchestrator::AnalysisOrchestrator;
pub use phases::analyze::{DegradedMetadata, FileAnalysisRecord, FileMetadata};
pub use session::{AnalyzerProcessState, RequestGuard, SessionHandle, SessionRegistry};
pub use state::AnalysisState;
