//! In-memory source host for tests

use super::client::SourceHost;
use super::error::FetchError;
use super::locator::RepoLocator;
use super::types::{RecursiveTree, RepoMetadata, TreeEntry};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Serves one repository from memory and records every file request
#[derive(Debug)]
pub struct MockSourceHost {
    metadata: RepoMetadata,
    tree: RecursiveTree,
    files: HashMap<String, String>,
    failing_paths: HashSet<String>,
    metadata_error: Option<FetchError>,
    tree_error: Option<FetchError>,
    requested: Mutex<Vec<String>>,
}

impl MockSourceHost {
    pub fn new(owner: &str, name: &str) -> Self {
        Self {
            metadata: RepoMetadata {
                owner: owner.to_string(),
                name: name.to_string(),
                default_branch: "main".to_string(),
                description: Some(format!("{} test repository", name)),
                language: None,
                html_url: format!("https://github.com/{}/{}", owner, name),
                stargazers_count: 0,
                topics: Vec::new(),
            },
            tree: RecursiveTree::default(),
            files: HashMap::new(),
            failing_paths: HashSet::new(),
            metadata_error: None,
            tree_error: None,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn with_metadata(mut self, metadata: RepoMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Adds a blob to the tree together with its content
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.tree
            .entries
            .push(TreeEntry::blob(path, content.len() as u64));
        self.files.insert(path.to_string(), content.to_string());
        self
    }

    pub fn with_dir(mut self, path: &str) -> Self {
        self.tree.entries.push(TreeEntry::tree(path));
        self
    }

    pub fn with_truncated_tree(mut self) -> Self {
        self.tree.truncated = true;
        self
    }

    /// Content requests for `path` answer with a 500
    pub fn with_failing_path(mut self, path: &str) -> Self {
        self.failing_paths.insert(path.to_string());
        self
    }

    pub fn with_metadata_error(mut self, error: FetchError) -> Self {
        self.metadata_error = Some(error);
        self
    }

    pub fn with_tree_error(mut self, error: FetchError) -> Self {
        self.tree_error = Some(error);
        self
    }

    pub fn locator(&self) -> RepoLocator {
        RepoLocator::new(&self.metadata.owner, &self.metadata.name)
    }

    pub fn url(&self) -> String {
        self.metadata.html_url.clone()
    }

    /// Paths passed to `get_file_content`, in call order
    pub fn requested_paths(&self) -> Vec<String> {
        lock(&self.requested).clone()
    }
}

#[async_trait]
impl SourceHost for MockSourceHost {
    async fn get_repo_metadata(&self, _locator: &RepoLocator) -> Result<RepoMetadata, FetchError> {
        match &self.metadata_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.metadata.clone()),
        }
    }

    async fn get_recursive_tree(
        &self,
        _locator: &RepoLocator,
        _branch: &str,
    ) -> Result<RecursiveTree, FetchError> {
        match &self.tree_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.tree.clone()),
        }
    }

    async fn get_file_content(
        &self,
        _locator: &RepoLocator,
        path: &str,
    ) -> Result<String, FetchError> {
        lock(&self.requested).push(path.to_string());

        if self.failing_paths.contains(path) {
            return Err(FetchError::Http {
                status: 500,
                message: format!("simulated failure for {}", path),
            });
        }
        self.files.get(path).cloned().ok_or_else(|| FetchError::Http {
            status: 404,
            message: "Not Found".to_string(),
        })
    }

    fn name(&self) -> &str {
        "MockSourceHost"
    }
}
