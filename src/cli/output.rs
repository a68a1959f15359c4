//! Report output for the CLI
//!
//! Rendering lives in [`crate::report`]; this module picks the format and
//! puts the result on stdout or on disk.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::commands::ReportFormatArg;
use crate::pipeline::AnalysisResult;
use crate::report;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Markdown,
    Json,
}

impl From<ReportFormatArg> for OutputFormat {
    fn from(arg: ReportFormatArg) -> Self {
        match arg {
            ReportFormatArg::Markdown => OutputFormat::Markdown,
            ReportFormatArg::Json => OutputFormat::Json,
        }
    }
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self, result: &AnalysisResult) -> Result<String> {
        match self.format {
            OutputFormat::Markdown => Ok(report::render_markdown(result)),
            OutputFormat::Json => {
                report::render_json(result).context("Failed to serialize report to JSON")
            }
        }
    }

    /// Writes the report to `path`. A markdown report also gets its JSON
    /// sidecar next to it. Returns every file written.
    pub fn write(&self, result: &AnalysisResult, path: &Path) -> Result<Vec<PathBuf>> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let mut written = Vec::new();
        write_file(path, &self.format(result)?)?;
        written.push(path.to_path_buf());

        if self.format == OutputFormat::Markdown {
            let sidecar = sidecar_path(path);
            let json = report::render_json(result).context("Failed to serialize report to JSON")?;
            write_file(&sidecar, &json)?;
            written.push(sidecar);
        }
        Ok(written)
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// `report.md` becomes `report.json`
pub fn sidecar_path(path: &Path) -> PathBuf {
    path.with_extension("json")
}

/// Default report file name, e.g. `octo-demo-analysis.md`
pub fn default_file_name(result: &AnalysisResult, format: OutputFormat) -> String {
    let extension = match format {
        OutputFormat::Markdown => "md",
        OutputFormat::Json => "json",
    };
    format!(
        "{}-{}-analysis.{}",
        result.snapshot.owner(),
        result.snapshot.name(),
        extension
    )
}
