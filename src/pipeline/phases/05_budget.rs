//! Cumulative token budget across the file loop
//!
//! The estimate is a quarter of the character count. The running total
//! only grows, so under sustained pressure later files are summarized
//! before analysis rather than sent whole.

use crate::error::AnalysisError;
use crate::pipeline::config::Stage;
use crate::pipeline::context::RunContext;
use crate::progress::ProgressEvent;

pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetDecision {
    /// Content fits; analyze it as is
    Direct { tokens: usize },
    /// Content would push the total past the ceiling
    Summarize { tokens: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBudget {
    ceiling: usize,
    total: usize,
}

impl TokenBudget {
    pub fn new(ceiling: usize) -> Self {
        Self { ceiling, total: 0 }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn plan(&self, content: &str) -> BudgetDecision {
        let tokens = estimate_tokens(content);
        if self.total.saturating_add(tokens) > self.ceiling {
            BudgetDecision::Summarize { tokens }
        } else {
            BudgetDecision::Direct { tokens }
        }
    }

    /// Adds the estimate for `text` and returns the new total
    pub fn charge(&mut self, text: &str) -> usize {
        self.total = self.total.saturating_add(estimate_tokens(text));
        self.total
    }
}

/// Text handed to the code analyzer for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedContent {
    pub text: String,
    pub summarized: bool,
}

fn build_summary_prompt(content: &str, path_digest: &str) -> String {
    format!(
        r#"You are a senior developer familiar with most programming languages, frameworks and project types.
The code below belongs to a project with this file tree:

{}

Summarize the key aspects of this code, focusing on its main functionality and structure:

{}
"#,
        path_digest, content
    )
}

/// Charges `content` against the budget, summarizing it first when it
/// does not fit. A summarized file is charged for its summary only.
pub async fn prepare_content(
    ctx: &RunContext,
    budget: &mut TokenBudget,
    path: &str,
    content: String,
    path_digest: &str,
) -> Result<PreparedContent, AnalysisError> {
    match budget.plan(&content) {
        BudgetDecision::Direct { .. } => {
            budget.charge(&content);
            Ok(PreparedContent {
                text: content,
                summarized: false,
            })
        }
        BudgetDecision::Summarize { tokens } => {
            let prompt = build_summary_prompt(&content, path_digest);
            let summary = ctx.call_stage(Stage::ContentSummary, prompt).await?;
            let total = budget.charge(&summary);

            ctx.emit(ProgressEvent::FileSummarized {
                path: path.to_string(),
                original_tokens: tokens,
                summary_tokens: estimate_tokens(&summary),
                total_tokens: total,
            });
            Ok(PreparedContent {
                text: summary,
                summarized: true,
            })
        }
    }
}
