//! GitHub REST client

use super::error::FetchError;
use super::locator::RepoLocator;
use super::types::{RecursiveTree, RepoMetadata, TreeEntry};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Read access to a hosted repository.
///
/// Futures returned by these methods are dropped when the owning analysis
/// is canceled, so implementations must not leave shared state half-written
/// across an await point.
#[async_trait]
pub trait SourceHost: Send + Sync {
    async fn get_repo_metadata(&self, locator: &RepoLocator) -> Result<RepoMetadata, FetchError>;

    async fn get_recursive_tree(
        &self,
        locator: &RepoLocator,
        branch: &str,
    ) -> Result<RecursiveTree, FetchError>;

    /// Decoded UTF-8 (lossy) content of a single file
    async fn get_file_content(&self, locator: &RepoLocator, path: &str)
        -> Result<String, FetchError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct ApiOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiRepo {
    name: String,
    owner: ApiOwner,
    default_branch: String,
    description: Option<String>,
    language: Option<String>,
    html_url: String,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    topics: Vec<String>,
}

impl From<ApiRepo> for RepoMetadata {
    fn from(repo: ApiRepo) -> Self {
        RepoMetadata {
            owner: repo.owner.login,
            name: repo.name,
            default_branch: repo.default_branch,
            description: repo.description,
            language: repo.language,
            html_url: repo.html_url,
            stargazers_count: repo.stargazers_count,
            topics: repo.topics,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiTree {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct ApiContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// [`SourceHost`] backed by the GitHub REST API
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(token: Option<String>, timeout: Duration) -> Result<Self, FetchError> {
        Self::with_base_url(DEFAULT_API_URL, token, timeout)
    }

    /// Client for a GitHub Enterprise instance or a test server
    pub fn with_base_url(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| FetchError::Network(format!("invalid API URL '{}': {}", base_url, e)))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Network(format!("API URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        debug!(url = %url, "GitHub request");

        let mut request = self
            .http
            .get(url)
            .header(USER_AGENT, "reposage")
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or(body);
            warn!(status = status.as_u16(), message = %message, "GitHub request failed");
            return Err(FetchError::Http {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<T>().await.map_err(FetchError::from)
    }
}

/// Decodes a base64 `contents` payload; GitHub wraps it at 60 columns
pub(crate) fn decode_content(encoded: &str) -> Result<String, FetchError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[async_trait]
impl SourceHost for GitHubClient {
    async fn get_repo_metadata(&self, locator: &RepoLocator) -> Result<RepoMetadata, FetchError> {
        let url = self.endpoint(["repos", &locator.owner, &locator.repo])?;
        let repo: ApiRepo = self.get_json(url).await?;
        Ok(repo.into())
    }

    async fn get_recursive_tree(
        &self,
        locator: &RepoLocator,
        branch: &str,
    ) -> Result<RecursiveTree, FetchError> {
        let mut url =
            self.endpoint(["repos", &locator.owner, &locator.repo, "git", "trees", branch])?;
        url.query_pairs_mut().append_pair("recursive", "1");

        let tree: ApiTree = self.get_json(url).await?;
        Ok(RecursiveTree {
            entries: tree.tree,
            truncated: tree.truncated,
        })
    }

    async fn get_file_content(
        &self,
        locator: &RepoLocator,
        path: &str,
    ) -> Result<String, FetchError> {
        let segments = ["repos", locator.owner.as_str(), locator.repo.as_str(), "contents"]
            .into_iter()
            .chain(path.split('/').filter(|s| !s.is_empty()));
        let url = self.endpoint(segments)?;

        let value: serde_json::Value = self.get_json(url).await?;
        if value.is_array() {
            return Err(FetchError::NotAFile(path.to_string()));
        }
        let content: ApiContent =
            serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))?;

        if content.kind != "file" {
            return Err(FetchError::NotAFile(path.to_string()));
        }
        match (content.encoding.as_deref(), content.content) {
            (Some("base64"), Some(encoded)) => decode_content(&encoded),
            (_, Some(raw)) => Ok(raw),
            (_, None) => Err(FetchError::Decode(format!("no content returned for {}", path))),
        }
    }

    fn name(&self) -> &str {
        "GitHub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_content_handles_line_wrapping() {
        let encoded = "aGVsbG8g\nd29ybGQ=\n";
        assert_eq!(decode_content(encoded).unwrap(), "hello world");
    }

    #[test]
    fn test_decode_content_rejects_garbage() {
        assert!(matches!(
            decode_content("!!!not base64!!!"),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client =
            GitHubClient::with_base_url("https://ghe.example.com/api/v3/", None, Duration::from_secs(5))
                .unwrap();
        let url = client
            .endpoint(["repos", "o", "r", "contents", "dir with space", "a#b.rs"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/o/r/contents/dir%20with%20space/a%23b.rs"
        );
    }

    #[test]
    fn test_blank_token_is_ignored() {
        let client = GitHubClient::new(Some("  ".to_string()), Duration::from_secs(5)).unwrap();
        assert!(client.token.is_none());
    }
}
