//! Final project summary
//!
//! The model is asked for a fixed five-section narrative. With structured
//! output enabled it answers in JSON, which is folded back into the same
//! narrative; any other answer is kept as written.

use super::analyze::FileAnalysisRecord;
use super::hierarchy::metadata_json;
use crate::error::AnalysisError;
use crate::github::RepositorySnapshot;
use crate::llm::ResponseSchema;
use crate::pipeline::config::Stage;
use crate::pipeline::context::RunContext;
use crate::tree::FileTreeNode;
use crate::util::json_extract::extract_as;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

/// Sections of the summary template, in output order
const SECTION_TITLES: [&str; 5] = [
    "Main purpose and functionality",
    "Tech stack and architecture",
    "Key components and their interactions",
    "Notable features",
    "Code organization and structure",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarySections {
    #[serde(default)]
    pub intro: String,
    pub main_purpose: String,
    pub tech_stack: String,
    pub key_components: String,
    pub notable_features: String,
    pub code_organization: String,
    #[serde(default)]
    pub overall: String,
}

impl SummarySections {
    fn sections(&self) -> [&str; 5] {
        [
            self.main_purpose.as_str(),
            self.tech_stack.as_str(),
            self.key_components.as_str(),
            self.notable_features.as_str(),
            self.code_organization.as_str(),
        ]
    }

    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if !self.intro.trim().is_empty() {
            lines.push(self.intro.trim().to_string());
        }
        for (index, (title, body)) in SECTION_TITLES.iter().zip(self.sections()).enumerate() {
            lines.push(format!("{}. **{}**: {}", index + 1, title, body.trim()));
        }
        if !self.overall.trim().is_empty() {
            lines.push(self.overall.trim().to_string());
        }
        lines.join("\n")
    }
}

/// Renders a JSON summary into the narrative template; anything that does
/// not carry all five sections passes through untouched
pub fn reformat_summary(raw: &str) -> String {
    match extract_as::<SummarySections>(raw) {
        Ok((sections, _)) => sections.render(),
        Err(err) => {
            debug!(error = %err, "Summary is not structured, keeping raw text");
            raw.to_string()
        }
    }
}

fn summary_schema() -> ResponseSchema {
    let text = json!({ "type": "string" });
    ResponseSchema::new(
        "project_summary",
        json!({
            "type": "object",
            "properties": {
                "intro": text,
                "mainPurpose": text,
                "techStack": text,
                "keyComponents": text,
                "notableFeatures": text,
                "codeOrganization": text,
                "overall": text
            },
            "required": [
                "intro", "mainPurpose", "techStack", "keyComponents",
                "notableFeatures", "codeOrganization", "overall"
            ],
            "additionalProperties": false
        }),
    )
}

fn build_prompt(
    snapshot: &RepositorySnapshot,
    understanding: &str,
    file_tree: &FileTreeNode,
    files: &[FileAnalysisRecord],
    call_hierarchy: &str,
) -> String {
    let metadata = snapshot.metadata();
    let repository = json!({
        "name": metadata.name,
        "description": metadata.description,
        "language": metadata.language,
    });
    let tree = serde_json::to_string(file_tree).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"Summarize this project for someone who wants to understand how it works and what it is for.
Base the summary on the following:

Repository info: {}
Project understanding: {}
File tree: {}
File metadata: {}
Call hierarchy: {}

Follow this template:

"This project is a...
  1. **Main purpose and functionality**:
  2. **Tech stack and architecture**:
  3. **Key components and their interactions**:
  4. **Notable features**:
  5. **Code organization and structure**:
  Overall..."

Answer only in the format above with no header or preamble, and end with a one line statement
starting with "Overall,".
"#,
        repository,
        understanding,
        tree,
        metadata_json(files),
        call_hierarchy
    )
}

pub async fn execute(
    ctx: &RunContext,
    snapshot: &RepositorySnapshot,
    understanding: &str,
    file_tree: &FileTreeNode,
    files: &[FileAnalysisRecord],
    call_hierarchy: &str,
) -> Result<String, AnalysisError> {
    let prompt = build_prompt(snapshot, understanding, file_tree, files, call_hierarchy);
    let raw = ctx
        .call_stage_structured(Stage::ProjectSummary, prompt, summary_schema())
        .await?;
    Ok(reformat_summary(&raw))
}
