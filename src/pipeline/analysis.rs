use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::github::{RepoMetadata, RepositorySnapshot};
use crate::tree::FileTreeNode;

use super::phases::analyze::{FileAnalysisRecord, FileMetadata};

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub snapshot: RepositorySnapshot,
    pub file_tree: FileTreeNode,
    /// README text, or the placeholder when there was none
    pub readme: String,
    pub project_understanding: String,
    /// Number of files that survived static filtering
    pub candidate_count: usize,
    pub selection_strategy: String,
    /// Per-file analyses in selection order
    pub files: Vec<FileAnalysisRecord>,
    pub call_hierarchy: String,
    pub summary: String,
    pub total_tokens: usize,
    pub duration: Duration,
    pub completed_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn repository(&self) -> &RepoMetadata {
        self.snapshot.metadata()
    }

    pub fn metadata(&self) -> Vec<&FileMetadata> {
        self.files.iter().map(|f| &f.metadata).collect()
    }

    pub fn file(&self, path: &str) -> Option<&FileAnalysisRecord> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn summarized_files(&self) -> usize {
        self.files.iter().filter(|f| f.summarized).count()
    }
}
