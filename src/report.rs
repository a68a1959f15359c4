//! Markdown report and JSON sidecar for a finished analysis
//!
//! Both renderings carry the same sections in the same order: project
//! details, project understanding, file tree, call hierarchy, per-file
//! analyses and summary. Writing them out is left to the caller.

use crate::pipeline::AnalysisResult;
use crate::tree::FileTreeNode;
use serde_json::{json, Value};
use std::fmt::Write;
use url::Url;

const TREE_INDENT: &str = "&nbsp;&nbsp;&nbsp;&nbsp;";

/// `{html_url}/blob/{branch}/{path}` with every path segment percent-encoded
pub fn blob_link(html_url: &str, branch: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    match Url::parse(html_url) {
        Ok(mut url) if !url.cannot_be_a_base() => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty();
                segments.push("blob");
                segments.push(branch);
                segments.extend(path.split('/'));
            }
            url.to_string()
        }
        _ => format!("{}/blob/{}/{}", html_url.trim_end_matches('/'), branch, path),
    }
}

/// Nested listing with a folder line per directory and a linked line per file
pub fn render_file_tree(root: &FileTreeNode, html_url: &str, branch: &str) -> String {
    let mut out = String::new();
    for child in root.children() {
        render_node(child, "", html_url, branch, &mut out);
    }
    out
}

fn render_node(node: &FileTreeNode, indent: &str, html_url: &str, branch: &str, out: &mut String) {
    if node.is_directory() {
        let _ = writeln!(out, "{}📁 {}/<br>", indent, node.name());
        let child_indent = format!("{}{}", indent, TREE_INDENT);
        for child in node.children() {
            render_node(child, &child_indent, html_url, branch, out);
        }
    } else {
        let _ = writeln!(
            out,
            "{}📄 [{}]({})<br>",
            indent,
            node.name(),
            blob_link(html_url, branch, node.path())
        );
    }
}

fn or_na(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("N/A")
}

pub fn render_markdown(result: &AnalysisResult) -> String {
    let repo = result.repository();
    let mut md = String::new();

    let _ = writeln!(md, "# 🔍 Repository Insights\n");

    let _ = writeln!(md, "## 📃 Project Details");
    let _ = writeln!(md, "- **Name:** {}", repo.name);
    let _ = writeln!(md, "- **Description:** {}", or_na(repo.description.as_deref()));
    let _ = writeln!(md, "- **Primary Language:** {}", or_na(repo.language.as_deref()));
    let _ = writeln!(md, "- **Repository:** {}\n", repo.html_url);

    let _ = writeln!(md, "## 🤓 Project Understanding");
    push_details(&mut md, "Peek Under the Hood 👀", &result.project_understanding);

    let _ = writeln!(md, "## 🌲 Project Structure");
    push_details(
        &mut md,
        "File Tree",
        &render_file_tree(&result.file_tree, &repo.html_url, &repo.default_branch),
    );

    let _ = writeln!(md, "## 📞 Call Hierarchy");
    push_details(
        &mut md,
        "Detailed Function Call Hierarchy",
        &result.call_hierarchy,
    );

    let _ = writeln!(md, "## 📈 File Analyses");
    if result.files.is_empty() {
        let _ = writeln!(md, "_No files were selected for analysis._\n");
    }
    for file in &result.files {
        let link = blob_link(&repo.html_url, &repo.default_branch, &file.path);
        let mut body = file.text_analysis.trim().to_string();
        if file.summarized {
            body.push_str("\n\n_Analyzed from a summary of the file to stay within the token budget._");
        }
        body.push_str("\n\n---");
        push_details(
            &mut md,
            &format!("File: <a href=\"{}\">{}</a>", link, file.path),
            &body,
        );
    }

    let _ = writeln!(md, "## ✒️ Project Summary");
    let _ = writeln!(md, "{}\n", result.summary.trim());
    let _ = writeln!(
        md,
        "_Generated {} from {} analyzed files._",
        result.completed_at.format("%Y-%m-%d %H:%M UTC"),
        result.files.len()
    );
    md
}

fn push_details(md: &mut String, summary: &str, body: &str) {
    let _ = writeln!(md, "<details>");
    let _ = writeln!(md, "  <summary><strong>{}</strong></summary>\n", summary);
    let _ = writeln!(md, "{}\n", body.trim_end());
    let _ = writeln!(md, "</details>\n");
}

/// Same data as the markdown report, for programmatic consumers
pub fn report_json(result: &AnalysisResult) -> Value {
    let repo = result.repository();
    let analyses: Vec<Value> = result
        .files
        .iter()
        .map(|file| {
            json!({
                "path": file.path,
                "analysis": file.text_analysis,
                "summarized": file.summarized,
            })
        })
        .collect();

    json!({
        "repository": {
            "name": repo.name,
            "owner": repo.owner,
            "description": repo.description,
            "language": repo.language,
            "url": repo.html_url,
            "defaultBranch": repo.default_branch,
        },
        "projectUnderstanding": result.project_understanding,
        "fileTree": result.file_tree,
        "fileMetadata": result.metadata(),
        "callHierarchy": result.call_hierarchy,
        "fileAnalysis": analyses,
        "summary": result.summary,
        "stats": {
            "candidates": result.candidate_count,
            "analyzed": result.files.len(),
            "summarized": result.summarized_files(),
            "selectionStrategy": result.selection_strategy,
            "totalTokens": result.total_tokens,
            "durationMs": u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
            "completedAt": result.completed_at.to_rfc3339(),
        },
    })
}

pub fn render_json(result: &AnalysisResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&report_json(result))
}
