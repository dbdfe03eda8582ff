//! Prompt rendering for review passes and consolidation.
//!
//! Built-in templates cover every review type. A project can override the
//! pass template for one review type by placing `<review-type>.md` in its
//! prompts directory (default `.ai-review/prompts/`):
//!
//! ```text
//! .ai-review/prompts/
//! ├── security.md
//! └── architectural.md
//! ```
//!
//! Templates use `{{PLACEHOLDER}}` markers: `PROJECT`, `REVIEW_TITLE`,
//! `FOCUS`, `PASS_INFO`, `CONTEXT`, `FILES` and `SCHEMA`.

pub mod templates;

use crate::files::FileUnit;
use crate::review::{PassFailure, PassOutput, ReviewType};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

/// Inputs for one pass prompt.
#[derive(Debug, Clone)]
pub struct PassPrompt<'a> {
    pub project_name: &'a str,
    pub review_type: ReviewType,
    pub pass_number: u32,
    pub total_passes: u32,
    /// Digest of earlier passes; `None` on pass 1.
    pub context: Option<&'a str>,
    pub files: Vec<&'a FileUnit>,
}

/// Inputs for the consolidation prompt.
#[derive(Debug, Clone)]
pub struct ConsolidationPrompt<'a> {
    pub project_name: &'a str,
    pub review_type: ReviewType,
    pub partials: &'a [PassOutput],
    pub failures: &'a [PassFailure],
}

/// Renders prompts from review inputs.
pub trait PromptRenderer: Send + Sync {
    fn render_pass(&self, prompt: &PassPrompt<'_>) -> String;

    fn render_consolidation(&self, prompt: &ConsolidationPrompt<'_>) -> String;
}

/// Placeholder-substitution renderer with optional per-review-type overrides.
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    overrides: HashMap<ReviewType, String>,
}

impl TemplateRenderer {
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Load overrides from `dir`. A missing directory means no overrides.
    pub fn with_overrides_dir(dir: &Path) -> Result<Self> {
        let mut renderer = Self::builtin();
        if !dir.is_dir() {
            return Ok(renderer);
        }
        for review_type in ReviewType::ALL {
            let path = dir.join(format!("{}.md", review_type));
            if !path.is_file() {
                continue;
            }
            let template = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt template: {}", path.display()))?;
            tracing::info!(review_type = %review_type, path = %path.display(), "Using custom prompt template");
            renderer.overrides.insert(review_type, template);
        }
        Ok(renderer)
    }

    pub fn with_override(mut self, review_type: ReviewType, template: impl Into<String>) -> Self {
        self.overrides.insert(review_type, template.into());
        self
    }

    pub fn has_override(&self, review_type: ReviewType) -> bool {
        self.overrides.contains_key(&review_type)
    }
}

/// Fenced block per file, language tag from the extension.
pub fn format_files(files: &[&FileUnit]) -> String {
    let mut out = String::new();
    for file in files {
        let lang = file.extension.as_deref().unwrap_or("");
        let _ = writeln!(
            out,
            "### File: {}\n\n```{}\n{}\n```\n",
            file.relative_path,
            lang,
            file.content.trim_end()
        );
    }
    out
}

fn pass_info(prompt: &PassPrompt<'_>) -> String {
    if prompt.total_passes <= 1 {
        return "This review covers the whole codebase in a single pass.".to_string();
    }
    let mut info = format!(
        "This is pass {} of {} of a multi-pass review. Review only the files below; other \
         files are covered by other passes.",
        prompt.pass_number, prompt.total_passes
    );
    if prompt.pass_number > 1 {
        info.push_str(" Use the context from previous passes to avoid repeating findings and to spot cross-file issues.");
    }
    info
}

impl PromptRenderer for TemplateRenderer {
    fn render_pass(&self, prompt: &PassPrompt<'_>) -> String {
        let template = self
            .overrides
            .get(&prompt.review_type)
            .map(String::as_str)
            .unwrap_or(templates::PASS_TEMPLATE);

        template
            .replace("{{PROJECT}}", prompt.project_name)
            .replace("{{REVIEW_TYPE}}", prompt.review_type.as_str())
            .replace("{{REVIEW_TITLE}}", prompt.review_type.title())
            .replace("{{FOCUS}}", templates::focus(prompt.review_type))
            .replace("{{PASS_INFO}}", &pass_info(prompt))
            .replace("{{CONTEXT}}", prompt.context.unwrap_or(""))
            .replace("{{SCHEMA}}", templates::SCHEMA_INSTRUCTIONS)
            .replace("{{FILES}}", &format_files(&prompt.files))
    }

    fn render_consolidation(&self, prompt: &ConsolidationPrompt<'_>) -> String {
        let mut partials = String::new();
        for partial in prompt.partials {
            let _ = writeln!(
                partials,
                "## Pass {} ({} files: {})\n\n{}\n",
                partial.pass_number,
                partial.files.len(),
                partial.files.join(", "),
                partial.review.to_markdown()
            );
        }

        let failures = if prompt.failures.is_empty() {
            String::new()
        } else {
            let passes: Vec<String> = prompt
                .failures
                .iter()
                .map(|f| f.pass_number.to_string())
                .collect();
            format!(
                "Passes {} failed and are missing; state that their files were not reviewed.",
                passes.join(", ")
            )
        };

        templates::CONSOLIDATION_TEMPLATE
            .replace("{{PROJECT}}", prompt.project_name)
            .replace("{{REVIEW_TITLE}}", prompt.review_type.title())
            .replace("{{PASS_COUNT}}", &prompt.partials.len().to_string())
            .replace("{{FAILURES}}", &failures)
            .replace("{{PARTIALS}}", &partials)
    }
}
