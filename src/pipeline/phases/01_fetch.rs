use crate::error::AnalysisError;
use crate::github::{RecursiveTree, RepoMetadata, RepositorySnapshot};
use crate::pipeline::context::RunContext;
use crate::progress::ProgressEvent;
use tracing::{debug, warn};

pub const README_PLACEHOLDER: &str = "No Readme file found";

pub async fn fetch_metadata(ctx: &RunContext) -> Result<RepoMetadata, AnalysisError> {
    let metadata = ctx
        .fetch(
            "fetch repository metadata",
            ctx.host().get_repo_metadata(ctx.locator()),
        )
        .await?;
    debug!(
        repo = %ctx.locator(),
        branch = %metadata.default_branch,
        "Repository metadata fetched"
    );
    Ok(metadata)
}

/// Recursive tree of the default branch. A truncated listing is reported
/// and used as is.
pub async fn fetch_tree(ctx: &RunContext, branch: &str) -> Result<RecursiveTree, AnalysisError> {
    let tree = ctx
        .fetch(
            "fetch file tree",
            ctx.host().get_recursive_tree(ctx.locator(), branch),
        )
        .await?;

    if tree.truncated {
        ctx.emit(ProgressEvent::TreeTruncated {
            entries: tree.entries.len(),
        });
    }
    debug!(entries = tree.entries.len(), "File tree fetched");
    Ok(tree)
}

pub async fn fetch_snapshot(
    ctx: &RunContext,
    metadata: RepoMetadata,
) -> Result<RepositorySnapshot, AnalysisError> {
    let tree = fetch_tree(ctx, &metadata.default_branch).await?;
    Ok(RepositorySnapshot::new(metadata, tree.entries))
}

/// README text, or [`README_PLACEHOLDER`] when the repository has none or
/// it cannot be fetched. Only cancellation escapes.
pub async fn fetch_readme(
    ctx: &RunContext,
    snapshot: &RepositorySnapshot,
) -> Result<String, AnalysisError> {
    let Some(entry) = snapshot.readme_entry() else {
        debug!("Repository has no README");
        return Ok(README_PLACEHOLDER.to_string());
    };

    match ctx
        .fetch(
            "fetch README",
            ctx.host().get_file_content(ctx.locator(), &entry.path),
        )
        .await
    {
        Ok(content) => Ok(content),
        Err(AnalysisError::Canceled) => Err(AnalysisError::Canceled),
        Err(err) => {
            warn!(path = %entry.path, error = %err, "Error fetching README");
            ctx.emit(ProgressEvent::ReadmeUnavailable {
                path: entry.path.clone(),
                error: err.to_string(),
            });
            Ok(README_PLACEHOLDER.to_string())
        }
    }
}

/// Content of one selected file; failures are fatal
pub async fn fetch_file(ctx: &RunContext, path: &str) -> Result<String, AnalysisError> {
    ctx.fetch(
        &format!("fetch content of {}", path),
        ctx.host().get_file_content(ctx.locator(), path),
    )
    .await
}
