use crate::error::AnalysisError;
use std::fmt;
use url::Url;

/// Owner/name pair identifying a hosted repository
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoLocator {
    pub owner: String,
    pub repo: String,
}

impl RepoLocator {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Parses a repository URL such as `https://github.com/owner/repo.git`.
    ///
    /// The first two non-empty path segments are the owner and the
    /// repository; a trailing `.git` is stripped from the latter.
    pub fn parse(input: &str) -> Result<Self, AnalysisError> {
        let url = Url::parse(input.trim())
            .map_err(|_| AnalysisError::InvalidRepoUrl(input.to_string()))?;

        let mut segments = url
            .path_segments()
            .into_iter()
            .flatten()
            .filter(|segment| !segment.is_empty());

        let owner = segments.next();
        let repo = segments.next();

        match (owner, repo) {
            (Some(owner), Some(repo)) => {
                let repo = repo.strip_suffix(".git").unwrap_or(repo);
                if repo.is_empty() {
                    return Err(AnalysisError::InvalidRepoUrl(input.to_string()));
                }
                Ok(Self::new(owner, repo))
            }
            _ => Err(AnalysisError::InvalidRepoUrl(input.to_string())),
        }
    }
}

impl fmt::Display for RepoLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
