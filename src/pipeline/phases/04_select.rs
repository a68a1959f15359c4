//! Relevance selection as an ordered chain of strategies
//!
//! One LLM call ranks the candidates. Its raw answer is read first as
//! structured JSON, then scanned for candidate paths mentioned in prose,
//! and when neither yields anything a static heuristic decides. Whatever a
//! strategy returns is intersected with the static candidates again, so a
//! file the model recommends that the classifier excluded never gets in.

use super::classify::CandidateFile;
use crate::error::AnalysisError;
use crate::llm::ResponseSchema;
use crate::pipeline::config::Stage;
use crate::pipeline::context::RunContext;
use crate::progress::ProgressEvent;
use crate::util::json_extract::extract_as;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Lower-cased name fragments of manifests and build configs
pub const IMPORTANT_FILES: &[&str] = &[
    "package.json",
    "tsconfig.json",
    "vite.config",
    "next.config",
    "webpack.config",
    "docker-compose",
    "dockerfile",
];

fn source_file_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\.(js|jsx|ts|tsx|py|java|go|rb|php|cs)$").expect("valid regex")
    })
}

fn top_dir_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(src|app|lib|config|core|server|client)/").expect("valid regex")
    })
}

/// What every strategy gets to look at
pub struct SelectionInput<'a> {
    pub candidates: &'a [CandidateFile],
    /// Raw text of the ranking call; `None` when the call failed
    pub raw_response: Option<&'a str>,
}

pub trait SelectionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` means this strategy has no answer and the next one is tried
    fn select(&self, input: &SelectionInput<'_>) -> Option<Vec<CandidateFile>>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SelectionPayload {
    Object {
        #[serde(rename = "importantFiles")]
        important_files: Vec<String>,
    },
    List(Vec<String>),
}

impl SelectionPayload {
    fn into_paths(self) -> Vec<String> {
        match self {
            SelectionPayload::Object { important_files } => important_files,
            SelectionPayload::List(paths) => paths,
        }
    }
}

fn retain_named(candidates: &[CandidateFile], names: &HashSet<&str>) -> Vec<CandidateFile> {
    candidates
        .iter()
        .filter(|file| names.contains(file.path.as_str()))
        .cloned()
        .collect()
}

/// `{"importantFiles": [...]}` or a bare array, wherever it sits in the text
pub struct StructuredResponse;

impl SelectionStrategy for StructuredResponse {
    fn name(&self) -> &'static str {
        "structured_response"
    }

    fn select(&self, input: &SelectionInput<'_>) -> Option<Vec<CandidateFile>> {
        let raw = input.raw_response?;
        let (payload, tier) = match extract_as::<SelectionPayload>(raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(error = %err, "Selection response is not JSON");
                return None;
            }
        };
        debug!(?tier, "Parsed selection response");

        let paths = payload.into_paths();
        let names: HashSet<&str> = paths.iter().map(String::as_str).collect();
        let selected = retain_named(input.candidates, &names);
        (!selected.is_empty()).then_some(selected)
    }
}

/// Candidate paths quoted anywhere in the raw answer
pub struct MentionedPaths;

fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/')
}

fn starts_at_boundary(before: &str) -> bool {
    before.chars().next_back().map_or(true, |c| !is_path_char(c))
}

fn ends_at_boundary(after: &str) -> bool {
    let mut chars = after.chars();
    match chars.next() {
        None => true,
        // Sentence punctuation right after a path
        Some('.') => chars.next().map_or(true, |c| !is_path_char(c) || c == '.'),
        Some(c) => !is_path_char(c),
    }
}

/// Whether `path` occurs in `text` as a whole path, not as part of a longer one
pub fn mentions_path(text: &str, path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    text.match_indices(path).any(|(start, _)| {
        starts_at_boundary(&text[..start]) && ends_at_boundary(&text[start + path.len()..])
    })
}

impl SelectionStrategy for MentionedPaths {
    fn name(&self) -> &'static str {
        "mentioned_paths"
    }

    fn select(&self, input: &SelectionInput<'_>) -> Option<Vec<CandidateFile>> {
        let raw = input.raw_response?;
        let selected: Vec<CandidateFile> = input
            .candidates
            .iter()
            .filter(|file| mentions_path(raw, &file.path))
            .cloned()
            .collect();
        (!selected.is_empty()).then_some(selected)
    }
}

/// Manifests, build configs, source files and files under common top-level
/// code directories
pub struct StaticHeuristic;

pub fn is_heuristically_important(path: &str) -> bool {
    let lower = path.to_lowercase();
    IMPORTANT_FILES.iter().any(|name| lower.contains(name))
        || source_file_re().is_match(path)
        || top_dir_re().is_match(path)
}

impl SelectionStrategy for StaticHeuristic {
    fn name(&self) -> &'static str {
        "static_heuristic"
    }

    fn select(&self, input: &SelectionInput<'_>) -> Option<Vec<CandidateFile>> {
        Some(
            input
                .candidates
                .iter()
                .filter(|file| is_heuristically_important(&file.path))
                .cloned()
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub files: Vec<CandidateFile>,
    /// Name of the strategy that produced `files`
    pub strategy: &'static str,
}

pub fn default_chain() -> Vec<Box<dyn SelectionStrategy>> {
    vec![
        Box::new(StructuredResponse),
        Box::new(MentionedPaths),
        Box::new(StaticHeuristic),
    ]
}

/// Tries each strategy in order; the first answer wins, narrowed to the
/// candidate set
pub fn run_chain(
    chain: &[Box<dyn SelectionStrategy>],
    input: &SelectionInput<'_>,
) -> Selection {
    let allowed: HashSet<&str> = input.candidates.iter().map(|f| f.path.as_str()).collect();

    for strategy in chain {
        if let Some(files) = strategy.select(input) {
            let files: Vec<CandidateFile> = files
                .into_iter()
                .filter(|file| allowed.contains(file.path.as_str()))
                .collect();
            return Selection {
                files,
                strategy: strategy.name(),
            };
        }
        debug!(strategy = strategy.name(), "Selection strategy had no answer");
    }

    Selection {
        files: Vec::new(),
        strategy: "none",
    }
}

fn selection_schema() -> ResponseSchema {
    ResponseSchema::new(
        "file_selection",
        json!({
            "type": "object",
            "properties": {
                "importantFiles": {
                    "type": "array",
                    "items": { "type": "string" }
                }
            },
            "required": ["importantFiles"],
            "additionalProperties": false
        }),
    )
}

fn build_prompt(candidates: &[CandidateFile], understanding: &str) -> String {
    let file_list = candidates
        .iter()
        .map(|f| f.path.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a senior developer familiar with most programming languages, frameworks and project types.
Identify every file needed to understand this codebase, especially its logical flow. Ignore documentation files.

Project understanding:
{}

File list:
{}

Respond with ONLY a JSON object of the form {{"importantFiles": ["path1", "path2"]}} using full paths from the list.
Do not use markdown formatting or add any explanation.
"#,
        understanding, file_list
    )
}

/// Narrows the candidates to the files worth analyzing. A failed ranking
/// call degrades to the fallback strategies; cancellation does not.
pub async fn execute(
    ctx: &RunContext,
    candidates: &[CandidateFile],
    understanding: &str,
) -> Result<Selection, AnalysisError> {
    if candidates.is_empty() {
        return Ok(Selection {
            files: Vec::new(),
            strategy: "none",
        });
    }

    let prompt = build_prompt(candidates, understanding);
    let raw = match ctx
        .call_stage_structured(Stage::FileSelection, prompt, selection_schema())
        .await
    {
        Ok(text) => Some(text),
        Err(AnalysisError::Canceled) => return Err(AnalysisError::Canceled),
        Err(err) => {
            warn!(error = %err, "File selection call failed, using fallback filtering");
            None
        }
    };

    let input = SelectionInput {
        candidates,
        raw_response: raw.as_deref(),
    };
    let selection = run_chain(&default_chain(), &input);

    ctx.emit(ProgressEvent::FilesSelected {
        strategy: selection.strategy.to_string(),
        selected: selection.files.len(),
        candidates: candidates.len(),
    });
    Ok(selection)
}
