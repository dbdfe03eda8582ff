//! Cross-pass review context.
//!
//! [`ReviewContext`] accumulates what earlier passes learned (code elements,
//! findings, file summaries, notes) and renders a bounded digest for the next
//! pass. Lists are append-only and keep insertion order, so pass N's entries
//! always follow pass N-1's. The context is owned by one orchestrator run and
//! moves between processes only through [`ReviewContext::to_json`] and
//! [`ReviewContext::from_json`].
//!
//! ## Example
//!
//! ```
//! use ai_code_review::context::ReviewContext;
//! use ai_code_review::review::{ReviewType, Severity};
//!
//! let mut context = ReviewContext::new("demo", ReviewType::Security, vec!["src/db.rs".into()]);
//! context.start_pass();
//! context.add_finding("issue", "SQL built with format!", Some("src/db.rs".into()), Severity::High);
//! context.start_pass();
//!
//! let digest = context.generate_next_pass_context(&["src/db.rs".into()], 2_000);
//! assert!(digest.contains("SQL built with format!"));
//! ```

mod types;

pub use types::{
    CodeElement, CodeElementKind, ContextFinding, ContextNote, DEFAULT_IMPORTANCE, FileSummary,
    MAX_IMPORTANCE,
};

use crate::review::{ReviewType, Severity};
use crate::util::truncate_at_char_boundary;
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Code elements below this importance are left out of the digest.
const DIGEST_MIN_IMPORTANCE: u8 = 5;

const PRIORITY_TARGET_SUMMARY: u8 = 7;
const PRIORITY_OTHER_SUMMARY: u8 = 4;
const PRIORITY_NOTE: u8 = 5;

/// Accumulated knowledge of a multi-pass review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewContext {
    pub project_name: String,
    pub review_type: ReviewType,
    /// Every file in the review, relative paths.
    pub files: Vec<String>,
    current_pass: u32,
    code_elements: Vec<CodeElement>,
    findings: Vec<ContextFinding>,
    file_summaries: Vec<FileSummary>,
    general_notes: Vec<ContextNote>,
}

impl ReviewContext {
    pub fn new(project_name: impl Into<String>, review_type: ReviewType, files: Vec<String>) -> Self {
        Self {
            project_name: project_name.into(),
            review_type,
            files,
            current_pass: 0,
            code_elements: Vec::new(),
            findings: Vec::new(),
            file_summaries: Vec::new(),
            general_notes: Vec::new(),
        }
    }

    /// Advance to the next pass and return its number (1-based).
    pub fn start_pass(&mut self) -> u32 {
        self.current_pass += 1;
        self.current_pass
    }

    pub fn current_pass(&self) -> u32 {
        self.current_pass
    }

    pub fn code_elements(&self) -> &[CodeElement] {
        &self.code_elements
    }

    pub fn findings(&self) -> &[ContextFinding] {
        &self.findings
    }

    pub fn file_summaries(&self) -> &[FileSummary] {
        &self.file_summaries
    }

    pub fn general_notes(&self) -> &[ContextNote] {
        &self.general_notes
    }

    pub fn add_code_element(&mut self, element: CodeElement) {
        let importance = element.importance.min(MAX_IMPORTANCE);
        self.code_elements.push(CodeElement {
            importance,
            ..element
        });
    }

    pub fn add_finding(
        &mut self,
        kind: impl Into<String>,
        description: impl Into<String>,
        file: Option<String>,
        severity: Severity,
    ) {
        self.findings.push(ContextFinding {
            kind: kind.into(),
            description: description.into(),
            file,
            severity,
            pass: self.current_pass,
        });
    }

    pub fn add_file_summary(
        &mut self,
        path: impl Into<String>,
        file_type: impl Into<String>,
        description: impl Into<String>,
        key_elements: Vec<String>,
    ) {
        self.file_summaries.push(FileSummary {
            path: path.into(),
            file_type: file_type.into(),
            description: description.into(),
            key_elements,
            pass: self.current_pass,
        });
    }

    pub fn add_general_note(&mut self, note: impl Into<String>) {
        self.general_notes.push(ContextNote {
            text: note.into(),
            pass: self.current_pass,
        });
    }

    /// Digest of earlier passes for the pass reviewing `target_files`,
    /// at most `max_context_length` bytes.
    ///
    /// Entries are dropped lowest priority first, then oldest, until the
    /// rendered digest fits. Findings rank by severity; summaries of target
    /// files outrank other summaries; code elements rank by importance.
    pub fn generate_next_pass_context(
        &self,
        target_files: &[String],
        max_context_length: usize,
    ) -> String {
        let targets: HashSet<&str> = target_files.iter().map(String::as_str).collect();
        let mut entries = self.digest_entries(&targets);

        let mut rendered = self.render_digest(&entries);
        while rendered.len() > max_context_length && !entries.is_empty() {
            let victim = entries
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| (e.priority, e.pass, e.order))
                .map(|(i, _)| i);
            if let Some(index) = victim {
                entries.remove(index);
            }
            rendered = self.render_digest(&entries);
        }

        if rendered.len() > max_context_length {
            rendered = truncate_at_char_boundary(&rendered, max_context_length).to_string();
        }
        rendered
    }

    fn digest_entries(&self, targets: &HashSet<&str>) -> Vec<DigestEntry> {
        let mut entries = Vec::new();
        let mut order = 0usize;
        let mut push = |entries: &mut Vec<DigestEntry>, section, priority, pass, text: String| {
            entries.push(DigestEntry {
                section,
                priority,
                pass,
                order,
                text,
            });
            order += 1;
        };

        for finding in &self.findings {
            let location = finding
                .file
                .as_deref()
                .map(|f| format!(" ({})", f))
                .unwrap_or_default();
            push(
                &mut entries,
                DigestSection::Findings,
                finding.severity.weight(),
                finding.pass,
                format!(
                    "[{}] {}: {}{}",
                    finding.severity, finding.kind, finding.description, location
                ),
            );
        }

        for summary in &self.file_summaries {
            let priority = if targets.contains(summary.path.as_str()) {
                PRIORITY_TARGET_SUMMARY
            } else {
                PRIORITY_OTHER_SUMMARY
            };
            let mut text = format!(
                "{} ({}): {}",
                summary.path, summary.file_type, summary.description
            );
            if !summary.key_elements.is_empty() {
                text.push_str(&format!(" [key: {}]", summary.key_elements.join(", ")));
            }
            push(
                &mut entries,
                DigestSection::FileSummaries,
                priority,
                summary.pass,
                text,
            );
        }

        for element in self
            .code_elements
            .iter()
            .filter(|e| e.importance >= DIGEST_MIN_IMPORTANCE)
        {
            let signature = element
                .signature
                .as_deref()
                .map(|s| format!(" `{}`", s))
                .unwrap_or_default();
            push(
                &mut entries,
                DigestSection::CodeElements,
                2 + element.importance / 2,
                0,
                format!(
                    "{} {} in {}{}",
                    element.kind, element.name, element.file, signature
                ),
            );
        }

        for note in &self.general_notes {
            push(
                &mut entries,
                DigestSection::Notes,
                PRIORITY_NOTE,
                note.pass,
                note.text.clone(),
            );
        }

        entries
    }

    fn render_digest(&self, entries: &[DigestEntry]) -> String {
        let mut out = format!(
            "## Context from previous passes\n\nProject: {}. Review type: {}. Passes completed: {}.\n",
            self.project_name,
            self.review_type,
            self.current_pass.saturating_sub(1)
        );
        for section in DigestSection::ORDER {
            let mut lines = entries.iter().filter(|e| e.section == section).peekable();
            if lines.peek().is_none() {
                continue;
            }
            out.push_str(&format!("\n### {}\n", section.title()));
            for entry in lines {
                out.push_str("- ");
                out.push_str(&entry.text);
                out.push('\n');
            }
        }
        out
    }

    /// Serialize the full context.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize review context")
    }

    /// Restore a context produced by [`Self::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse review context")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DigestSection {
    Findings,
    FileSummaries,
    CodeElements,
    Notes,
}

impl DigestSection {
    const ORDER: [DigestSection; 4] = [
        DigestSection::Findings,
        DigestSection::FileSummaries,
        DigestSection::CodeElements,
        DigestSection::Notes,
    ];

    fn title(&self) -> &'static str {
        match self {
            Self::Findings => "Findings so far",
            Self::FileSummaries => "Files already reviewed",
            Self::CodeElements => "Important code elements",
            Self::Notes => "Notes",
        }
    }
}

#[derive(Debug, Clone)]
struct DigestEntry {
    section: DigestSection,
    priority: u8,
    pass: u32,
    order: usize,
    text: String,
}
