use crate::error::AnalysisError;
use crate::github::RepositorySnapshot;
use crate::pipeline::config::Stage;
use crate::pipeline::context::RunContext;

fn build_prompt(snapshot: &RepositorySnapshot, readme: &str) -> String {
    let metadata =
        serde_json::to_string(snapshot.metadata()).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"You are a senior developer familiar with most programming languages, frameworks and project types.

Repository metadata:
{}

README:
{}

Analyze this repository's file structure and give a brief understanding of the project.
Identify the main components, the tech stack and the architecture from the file names and layout.
Keep the response concise.

File structure:
{}
"#,
        metadata,
        readme,
        snapshot.path_digest()
    )
}

/// Free-text understanding of the project from its metadata, README and
/// path listing
pub async fn execute(
    ctx: &RunContext,
    snapshot: &RepositorySnapshot,
    readme: &str,
) -> Result<String, AnalysisError> {
    let prompt = build_prompt(snapshot, readme);
    ctx.call_stage(Stage::ProjectStructure, prompt).await
}
