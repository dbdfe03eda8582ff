//! Writing review results to disk.

use crate::review::{ReviewResult, ReviewStatus};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default output directory, relative to the project.
pub const DEFAULT_OUTPUT_DIR: &str = "ai-code-review-docs";

/// File format of a saved review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// File name for a result: `<review-type>-<model>-<timestamp>.<ext>`.
///
/// Characters that are awkward in file names (`:` and `/` in model ids)
/// become `-`.
pub fn output_file_name(result: &ReviewResult, format: OutputFormat) -> String {
    let model = result
        .models_used
        .first()
        .map(String::as_str)
        .unwrap_or("unknown");
    let model: String = model
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '-' })
        .collect();
    format!(
        "{}-{}-{}.{}",
        result.review_type.as_str(),
        model,
        result.timestamp.format("%Y-%m-%dT%H-%M-%S"),
        format.extension()
    )
}

/// Render a result as a standalone markdown document.
pub fn render_markdown(result: &ReviewResult) -> String {
    let mut doc = format!(
        "# {}: {}\n\n",
        result.review_type.title(),
        result.project_name
    );
    doc.push_str(&format!(
        "> Generated {} with {}. Passes: {}. Status: {}.\n\n",
        result.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        if result.models_used.is_empty() {
            "no model".to_string()
        } else {
            result.models_used.join(", ")
        },
        result.total_passes,
        result.status
    ));
    if result.potentially_truncated {
        doc.push_str(
            "> **Warning:** the review was forced into a single pass larger than the usable context window; output may be truncated.\n\n",
        );
    }

    doc.push_str(result.content.trim());
    doc.push_str("\n\n");

    let failures = result.failure_notes();
    if !failures.is_empty() {
        doc.push_str(&failures);
        doc.push('\n');
    }

    doc.push_str("## Cost\n\n```text\n");
    doc.push_str(&result.cost.to_string());
    doc.push_str("\n```\n");
    if let Some(per_pass) = &result.cost.per_pass_costs
        && per_pass.len() > 1
    {
        doc.push_str("\n| Pass | Input tokens | Output tokens | Cost |\n|---|---|---|---|\n");
        for pass in per_pass {
            doc.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                pass.pass_number,
                pass.input_tokens,
                pass.output_tokens,
                crate::cost::format_cost(pass.estimated_cost)
            ));
        }
    }
    if let Some(consolidation) = &result.cost.consolidation {
        doc.push_str(&format!(
            "\nConsolidation: {} input / {} output tokens, {}\n",
            consolidation.input_tokens,
            consolidation.output_tokens,
            crate::cost::format_cost(consolidation.estimated_cost)
        ));
    }
    doc
}

/// Save `result` under `output_dir`, returning the written path.
pub fn write_review(
    result: &ReviewResult,
    output_dir: &Path,
    format: OutputFormat,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir).with_context(|| {
        format!("Failed to create output directory: {}", output_dir.display())
    })?;
    let path = output_dir.join(output_file_name(result, format));
    let content = match format {
        OutputFormat::Markdown => render_markdown(result),
        OutputFormat::Json => {
            serde_json::to_string_pretty(result).context("Failed to serialize review result")?
        }
    };
    fs::write(&path, content)
        .with_context(|| format!("Failed to write review: {}", path.display()))?;

    if let ReviewStatus::Incomplete { reason } = &result.status {
        tracing::warn!(path = %path.display(), reason = %reason, "Saved incomplete review");
    } else {
        tracing::info!(path = %path.display(), "Saved review");
    }
    Ok(path)
}
