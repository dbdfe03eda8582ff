//! Structured output of a single review pass.
//!
//! Each pass asks the model for a JSON object:
//!
//! ```json
//! {
//!   "summary": "...",
//!   "issues": [{"title": "...", "description": "...", "priority": "high",
//!               "file": "src/db.rs", "line": 42, "suggestion": "..."}],
//!   "fileSummaries": [{"path": "...", "type": "module", "description": "...",
//!                      "keyElements": ["..."]}],
//!   "codeElements": [{"type": "function", "name": "...", "file": "...",
//!                     "signature": "...", "importance": 7}],
//!   "notes": ["..."]
//! }
//! ```
//!
//! Models do not always comply, so parsing is lenient: code fences and
//! surrounding prose are stripped, and text with no JSON object becomes a
//! plain-text summary.
//!
//! ## Example
//!
//! ```
//! use ai_code_review::review::PartialReview;
//!
//! let review = PartialReview::parse(r#"```json
//! {"summary": "Looks fine", "issues": [{"title": "Unchecked index", "priority": "high"}]}
//! ```"#);
//! assert!(review.is_structured());
//! assert_eq!(review.issues.len(), 1);
//!
//! let prose = PartialReview::parse("Nothing to report.");
//! assert!(!prose.is_structured());
//! assert_eq!(prose.summary, "Nothing to report.");
//! ```

use super::types::Severity;
use crate::util::{extract_json_object, strip_code_fences};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Write as _;

/// A single issue reported by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewIssue {
    pub title: String,
    pub description: String,
    #[serde(alias = "severity")]
    pub priority: Severity,
    /// File path relative to the project root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Line number (1-based). Accepts numbers or numeric strings.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_line"
    )]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ReviewIssue {
    pub fn new(priority: Severity, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            priority,
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// `file:line`, `file`, or `None`.
    pub fn location(&self) -> Option<String> {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => Some(format!("{}:{}", file, line)),
            (Some(file), None) => Some(file.clone()),
            _ => None,
        }
    }
}

fn deserialize_line<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .split(['-', ':', ','])
            .next()
            .and_then(|s| s.trim().parse().ok()),
        _ => None,
    })
}

/// Per-file summary as reported by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportedFileSummary {
    pub path: String,
    #[serde(rename = "type", alias = "fileType")]
    pub file_type: String,
    pub description: String,
    pub key_elements: Vec<String>,
}

/// Code element as reported by the model. `kind` stays free text here and is
/// normalized when merged into the review context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportedCodeElement {
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    pub name: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<u8>,
}

/// Parsed result of one review pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialReview {
    pub summary: String,
    pub issues: Vec<ReviewIssue>,
    pub file_summaries: Vec<ReportedFileSummary>,
    pub code_elements: Vec<ReportedCodeElement>,
    pub notes: Vec<String>,
    #[serde(skip)]
    structured: bool,
}

impl PartialReview {
    /// Parse model output, falling back to plain text.
    pub fn parse(text: &str) -> Self {
        let body = strip_code_fences(text);
        if let Some(json) = extract_json_object(body) {
            match serde_json::from_str::<PartialReview>(&json) {
                Ok(mut review) => {
                    review.structured = true;
                    return review;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Pass output was not valid review JSON");
                }
            }
        }
        Self::plain(text)
    }

    /// Unstructured review carrying `text` as its summary.
    pub fn plain(text: &str) -> Self {
        Self {
            summary: text.trim().to_string(),
            ..Default::default()
        }
    }

    /// Whether the model returned the requested JSON shape.
    pub fn is_structured(&self) -> bool {
        self.structured
    }

    /// Render as markdown, issues ordered by priority.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        if !self.summary.is_empty() {
            let _ = writeln!(out, "{}\n", self.summary.trim());
        }

        if !self.issues.is_empty() {
            let mut issues: Vec<&ReviewIssue> = self.issues.iter().collect();
            issues.sort_by_key(|issue| issue.priority);
            let _ = writeln!(out, "### Issues\n");
            for issue in issues {
                let _ = write!(
                    out,
                    "- {} **{}** ({})",
                    issue.priority.emoji(),
                    issue.title,
                    issue.priority
                );
                if let Some(location) = issue.location() {
                    let _ = write!(out, " `{}`", location);
                }
                out.push('\n');
                if !issue.description.is_empty() {
                    let _ = writeln!(out, "  {}", issue.description.trim());
                }
                if let Some(suggestion) = &issue.suggestion {
                    let _ = writeln!(out, "  *Suggestion:* {}", suggestion.trim());
                }
            }
            out.push('\n');
        }

        if !self.notes.is_empty() {
            let _ = writeln!(out, "### Notes\n");
            for note in &self.notes {
                let _ = writeln!(out, "- {}", note);
            }
            out.push('\n');
        }

        out.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "summary": "Two problems found.",
        "issues": [
            {"title": "Weak hash", "description": "md5 used", "priority": "critical",
             "file": "src/auth.rs", "line": "12-14", "suggestion": "Use argon2"},
            {"title": "Long function", "severity": "low"}
        ],
        "fileSummaries": [
            {"path": "src/auth.rs", "type": "module", "description": "Login", "keyElements": ["login"]}
        ],
        "codeElements": [
            {"type": "function", "name": "login", "file": "src/auth.rs", "importance": 8}
        ],
        "notes": ["Auth is centralised"]
    }"#;

    #[test]
    fn test_parse_full_review() {
        let review = PartialReview::parse(FULL);
        assert!(review.is_structured());
        assert_eq!(review.summary, "Two problems found.");
        assert_eq!(review.issues.len(), 2);
        assert_eq!(review.issues[0].priority, Severity::Critical);
        assert_eq!(review.issues[0].line, Some(12));
        assert_eq!(review.issues[1].priority, Severity::Low);
        assert_eq!(review.file_summaries[0].file_type, "module");
        assert_eq!(review.code_elements[0].kind, "function");
        assert_eq!(review.code_elements[0].importance, Some(8));
        assert_eq!(review.notes, vec!["Auth is centralised"]);
    }

    #[test]
    fn test_parse_fenced_json_with_prose() {
        let text = format!("Here you go:\n```json\n{}\n```\nThanks", FULL);
        let review = PartialReview::parse(&text);
        assert!(review.is_structured());
        assert_eq!(review.issues.len(), 2);
    }

    #[test]
    fn test_parse_plain_text_fallback() {
        let review = PartialReview::parse("  The code is fine.  ");
        assert!(!review.is_structured());
        assert_eq!(review.summary, "The code is fine.");
        assert!(review.issues.is_empty());
    }

    #[test]
    fn test_parse_invalid_json_falls_back() {
        let review = PartialReview::parse(r#"{"issues": "not a list"}"#);
        assert!(!review.is_structured());
        assert_eq!(review.summary, r#"{"issues": "not a list"}"#);
    }

    #[test]
    fn test_to_markdown_orders_by_priority() {
        let review = PartialReview {
            summary: "Summary".into(),
            issues: vec![
                ReviewIssue::new(Severity::Low, "Minor"),
                ReviewIssue::new(Severity::Critical, "Major")
                    .with_file("src/lib.rs")
                    .with_line(3)
                    .with_suggestion("Fix it"),
            ],
            notes: vec!["note".into()],
            ..Default::default()
        };
        let md = review.to_markdown();
        let major = md.find("Major").unwrap();
        let minor = md.find("Minor").unwrap();
        assert!(major < minor);
        assert!(md.contains("`src/lib.rs:3`"));
        assert!(md.contains("*Suggestion:* Fix it"));
        assert!(md.contains("### Notes"));
    }

    #[test]
    fn test_issue_location() {
        assert_eq!(ReviewIssue::new(Severity::Info, "x").location(), None);
        assert_eq!(
            ReviewIssue::new(Severity::Info, "x").with_file("a.rs").location(),
            Some("a.rs".into())
        );
    }
}
