//! Source-control data model

use serde::{Deserialize, Serialize};

/// Repository metadata as reported by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Git object type of a tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    /// Submodule reference
    Commit,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Blob => "blob",
            EntryKind::Tree => "tree",
            EntryKind::Commit => "commit",
        }
    }
}

/// One entry of the flat recursive tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl TreeEntry {
    pub fn blob(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Blob,
            size: Some(size),
        }
    }

    pub fn tree(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Tree,
            size: None,
        }
    }

    pub fn is_blob(&self) -> bool {
        self.kind == EntryKind::Blob
    }
}

/// Recursive tree listing for one commit-ish
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecursiveTree {
    pub entries: Vec<TreeEntry>,
    /// The host stopped listing before the whole tree was returned
    pub truncated: bool,
}

/// Immutable view of a repository at the time it was fetched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositorySnapshot {
    metadata: RepoMetadata,
    tree: Vec<TreeEntry>,
}

impl RepositorySnapshot {
    pub fn new(metadata: RepoMetadata, tree: Vec<TreeEntry>) -> Self {
        Self { metadata, tree }
    }

    pub fn metadata(&self) -> &RepoMetadata {
        &self.metadata
    }

    pub fn owner(&self) -> &str {
        &self.metadata.owner
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn default_branch(&self) -> &str {
        &self.metadata.default_branch
    }

    pub fn tree(&self) -> &[TreeEntry] {
        &self.tree
    }

    /// All tree paths, one per line, in host order
    pub fn path_digest(&self) -> String {
        self.tree
            .iter()
            .map(|entry| entry.path.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// First entry whose lower-cased path starts with `readme`
    pub fn readme_entry(&self) -> Option<&TreeEntry> {
        self.tree
            .iter()
            .find(|entry| entry.is_blob() && entry.path.to_lowercase().starts_with("readme"))
    }
}
