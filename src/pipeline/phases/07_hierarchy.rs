use super::analyze::{FileAnalysisRecord, FileMetadata};
use crate::error::AnalysisError;
use crate::pipeline::config::Stage;
use crate::pipeline::context::RunContext;

pub(crate) fn metadata_json(files: &[FileAnalysisRecord]) -> String {
    let metadata: Vec<&FileMetadata> = files.iter().map(|f| &f.metadata).collect();
    serde_json::to_string_pretty(&metadata).unwrap_or_else(|_| "[]".to_string())
}

fn build_prompt(understanding: &str, files: &[FileAnalysisRecord]) -> String {
    format!(
        r#"You are a senior developer familiar with most programming languages, frameworks and project types.
From the project understanding and file metadata below, build a call hierarchy showing how the
application flows from its entry point through the various files and functions.
Focus on the main execution path and the important calls between files.

Project understanding:
{}

File metadata:
{}

Present the call hierarchy in a clear structure covering:
1. A visual mapping of function calls
2. The entry point file
3. The main execution flow
4. Important function calls between files
5. Dependencies between modules

The visual mapping should look like this:

📁 rootFunction(param1: Type) → ReturnType [src/rootFile.js]
├─ 🔷 childFunction1(arg1: Type) → ReturnType [src/childFile1.js]
│   ├─ 🟣 subFunction1(a: Type) → ReturnType [src/subFile1.js]
│   └─ 🟠 subFunction2() → ReturnType [src/subFile2.js]
└─ 🔶 childFunction2(data: Type) → ReturnType [src/childFile2.js]
    └─ 🟢 subFunction3(config: Type) → ReturnType [src/subFile3.js]
"#,
        understanding,
        metadata_json(files)
    )
}

/// Call-hierarchy narrative over every analyzed file, returned verbatim
pub async fn execute(
    ctx: &RunContext,
    understanding: &str,
    files: &[FileAnalysisRecord],
) -> Result<String, AnalysisError> {
    ctx.call_stage(Stage::CallHierarchy, build_prompt(understanding, files))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::phases::analyze::parse_metadata;

    #[test]
    fn test_prompt_lists_metadata_in_order() {
        let files = vec![
            FileAnalysisRecord {
                path: "src/main.rs".to_string(),
                text_analysis: "entry".to_string(),
                metadata: parse_metadata("src/main.rs", r#"{"name":"main.rs"}"#),
                summarized: false,
            },
            FileAnalysisRecord {
                path: "src/lib.rs".to_string(),
                text_analysis: "library".to_string(),
                metadata: parse_metadata("src/lib.rs", "garbled"),
                summarized: false,
            },
        ];

        let prompt = build_prompt("A CLI tool", &files);
        assert!(prompt.contains("A CLI tool"));
        let main = prompt.find("\"main.rs\"").unwrap();
        let lib = prompt.find("\"lib.rs\"").unwrap();
        assert!(main < lib);
        assert!(prompt.contains("Failed to parse JSON metadata"));
    }

    #[test]
    fn test_empty_metadata_is_an_empty_array() {
        assert_eq!(metadata_json(&[]), "[]");
    }
}
