use super::budget::PreparedContent;
use crate::error::AnalysisError;
use crate::llm::ResponseSchema;
use crate::pipeline::config::Stage;
use crate::pipeline::context::RunContext;
use crate::util::json_extract::extract_json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

pub const FALLBACK_PURPOSE: &str = "Extracted from text analysis";
pub const PARSE_ERROR: &str = "Failed to parse JSON metadata";
const RAW_TEXT_LIMIT: usize = 200;

/// Stand-in for metadata the model did not return as a JSON object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedMetadata {
    pub name: String,
    pub path: String,
    #[serde(rename = "mainPurpose")]
    pub main_purpose: String,
    pub error: String,
    /// Start of the unparseable response
    #[serde(rename = "rawText")]
    pub raw_text: String,
}

impl DegradedMetadata {
    pub fn new(path: &str, raw: &str) -> Self {
        Self {
            name: file_name(path).to_string(),
            path: path.to_string(),
            main_purpose: FALLBACK_PURPOSE.to_string(),
            error: PARSE_ERROR.to_string(),
            raw_text: raw.chars().take(RAW_TEXT_LIMIT).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FileMetadata {
    Parsed(Map<String, Value>),
    Degraded(DegradedMetadata),
}

impl FileMetadata {
    pub fn is_degraded(&self) -> bool {
        matches!(self, FileMetadata::Degraded(_))
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            FileMetadata::Parsed(map) => map.get(key).cloned(),
            FileMetadata::Degraded(degraded) => match serde_json::to_value(degraded) {
                Ok(Value::Object(map)) => map.get(key).cloned(),
                _ => None,
            },
        }
    }
}

/// Analysis of one file, in selection order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnalysisRecord {
    pub path: String,
    pub text_analysis: String,
    #[serde(rename = "jsonMetadata")]
    pub metadata: FileMetadata,
    /// The analysis was done on a summary of the file
    pub summarized: bool,
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Reads the metadata response; anything but a JSON object degrades
pub fn parse_metadata(path: &str, raw: &str) -> FileMetadata {
    match extract_json(raw) {
        Ok((Value::Object(map), tier)) => {
            debug!(path, ?tier, "Parsed file metadata");
            FileMetadata::Parsed(map)
        }
        Ok((other, _)) => {
            warn!(path, kind = json_kind(&other), "File metadata is not a JSON object");
            FileMetadata::Degraded(DegradedMetadata::new(path, raw))
        }
        Err(err) => {
            warn!(path, error = %err, "Could not parse file metadata");
            FileMetadata::Degraded(DegradedMetadata::new(path, raw))
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn metadata_schema() -> ResponseSchema {
    let strings = json!({ "type": "array", "items": { "type": "string" } });
    ResponseSchema::new(
        "file_metadata",
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "path": { "type": "string" },
                "imports": strings,
                "mainPurpose": { "type": "string" },
                "type": { "type": "string" },
                "functions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "purpose": { "type": "string" },
                            "input": { "type": "string" },
                            "output": { "type": "string" }
                        },
                        "required": ["name", "purpose", "input", "output"],
                        "additionalProperties": false
                    }
                },
                "exports": strings,
                "dependencies": strings,
                "finalReturnType": { "type": "string" }
            },
            "required": [
                "name", "path", "imports", "mainPurpose", "type",
                "functions", "exports", "dependencies", "finalReturnType"
            ],
            "additionalProperties": false
        }),
    )
}

fn build_analysis_prompt(path: &str, content: &str, path_digest: &str) -> String {
    format!(
        r#"You are a senior developer familiar with most programming languages, frameworks and project types.
The file below belongs to a project with this file tree:

{}

Explain the key functionality and role of the code file ({}) in this format and nothing else:
A one or two line description of the file.
**1. Main purpose and responsibilities**:
**2. Key functions and their purposes**: (inputs and their types, the processing done, outputs and their types)
**3. Important interactions with other parts of the system**:
**4. Notable features or patterns**:
Overall, ...

Code:
{}
"#,
        path_digest, path, content
    )
}

fn build_metadata_prompt(path: &str, content: &str, path_digest: &str) -> String {
    format!(
        r#"You are a senior developer familiar with most programming languages, frameworks and project types.
The file below belongs to a project with this file tree:

{}

Describe the code file ({}) as a JSON object with this shape:
{{
  "name": "",
  "path": "",
  "imports": [],
  "mainPurpose": "",
  "type": "",
  "functions": [{{"name": "", "purpose": "", "input": "", "output": ""}}],
  "exports": [],
  "dependencies": [],
  "finalReturnType": ""
}}

Code:
{}

Reply with the JSON object only, without markdown formatting or explanation.
"#,
        path_digest, path, content
    )
}

/// Two calls per file: a prose explanation, then structured metadata.
/// Unparseable metadata degrades; a failed call aborts the run.
pub async fn execute(
    ctx: &RunContext,
    path: &str,
    content: &PreparedContent,
    path_digest: &str,
) -> Result<FileAnalysisRecord, AnalysisError> {
    let text_analysis = ctx
        .call_stage(
            Stage::CodeAnalysis,
            build_analysis_prompt(path, &content.text, path_digest),
        )
        .await?;

    let raw_metadata = ctx
        .call_stage_structured(
            Stage::CodeAnalysis,
            build_metadata_prompt(path, &content.text, path_digest),
            metadata_schema(),
        )
        .await?;

    Ok(FileAnalysisRecord {
        path: path.to_string(),
        text_analysis,
        metadata: parse_metadata(path, &raw_metadata),
        summarized: content.summarized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_metadata_is_parsed() {
        let metadata = parse_metadata("src/a.js", "```json\n{\"name\":\"a\"}\n```");
        let expected: Map<String, Value> =
            serde_json::from_str(r#"{"name":"a"}"#).unwrap();
        assert_eq!(metadata, FileMetadata::Parsed(expected));
        assert!(!metadata.is_degraded());
    }

    #[test]
    fn test_prose_metadata_degrades() {
        let metadata = parse_metadata("src/util/a.js", "not json at all");
        assert_eq!(
            serde_json::to_value(&metadata).unwrap(),
            json!({
                "name": "a.js",
                "path": "src/util/a.js",
                "mainPurpose": "Extracted from text analysis",
                "error": "Failed to parse JSON metadata",
                "rawText": "not json at all"
            })
        );
        assert_eq!(metadata.get("name"), Some(json!("a.js")));
    }

    #[test]
    fn test_non_object_json_degrades() {
        assert!(parse_metadata("a.py", "[1, 2, 3]").is_degraded());
        assert!(parse_metadata("a.py", "\"just a string\"").is_degraded());
    }

    #[test]
    fn test_raw_text_is_truncated_to_200_chars() {
        let raw = "é".repeat(500);
        match parse_metadata("a.rs", &raw) {
            FileMetadata::Degraded(degraded) => {
                assert_eq!(degraded.raw_text.chars().count(), 200);
            }
            other => panic!("expected degraded metadata, got {:?}", other),
        }
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = FileAnalysisRecord {
            path: "a.rs".to_string(),
            text_analysis: "text".to_string(),
            metadata: parse_metadata("a.rs", "{}"),
            summarized: true,
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "path": "a.rs",
                "textAnalysis": "text",
                "jsonMetadata": {},
                "summarized": true
            })
        );
    }
}
