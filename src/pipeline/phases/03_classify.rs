use crate::github::TreeEntry;
use serde::Serialize;

/// Suffixes (matched case-insensitively against the whole path) of files
/// that carry no logic worth analyzing
const SKIP_SUFFIXES: &[&str] = &[
    ".css",
    ".scss",
    ".less",
    ".svg",
    ".png",
    ".jpg",
    ".jpeg",
    ".gif",
    ".ico",
    ".lock",
    ".txt",
    "license",
    "changelog",
    ".gitignore",
    ".env.example",
    ".eslintrc",
    ".prettierrc",
    "package-lock.json",
    "yarn.lock",
];

const MARKDOWN_SUFFIX: &str = ".md";

/// A blob that survived static filtering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateFile {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipList {
    suffixes: Vec<String>,
}

impl SkipList {
    /// Skips markdown along with assets, locks and housekeeping files
    pub fn standard() -> Self {
        let mut list = Self::keep_markdown();
        list.suffixes.push(MARKDOWN_SUFFIX.to_string());
        list
    }

    /// Same as [`SkipList::standard`] but lets documentation through
    pub fn keep_markdown() -> Self {
        Self {
            suffixes: SKIP_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn for_config(include_markdown: bool) -> Self {
        if include_markdown {
            Self::keep_markdown()
        } else {
            Self::standard()
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        let lower = path.to_lowercase();
        self.suffixes.iter().any(|suffix| lower.ends_with(suffix.as_str()))
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::standard()
    }
}

/// Blobs whose path matches no skip suffix, in tree order
pub fn classify_static(entries: &[TreeEntry], skip: &SkipList) -> Vec<CandidateFile> {
    entries
        .iter()
        .filter(|entry| entry.is_blob() && !skip.matches(&entry.path))
        .map(|entry| CandidateFile {
            path: entry.path.clone(),
            size: entry.size,
        })
        .collect()
}
