//! Final result of a review run.

use super::findings::{PartialReview, ReviewIssue};
use super::types::ReviewType;
use crate::cost::ReviewCost;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether every planned pass produced output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Complete,
    /// Some passes are missing; `reason` says why (cancellation, fatal error,
    /// exhausted retries).
    Incomplete { reason: String },
}

impl ReviewStatus {
    pub fn incomplete(reason: impl Into<String>) -> Self {
        Self::Incomplete {
            reason: reason.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Incomplete { reason } => write!(f, "incomplete ({})", reason),
        }
    }
}

/// A pass that produced no output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassFailure {
    pub pass_number: u32,
    pub files: Vec<String>,
    pub error: String,
    /// Generation calls made for this pass, fallback included.
    pub attempts: u32,
}

/// Output of one successful pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassOutput {
    pub pass_number: u32,
    /// Model that produced the output (the fallback, if one was used).
    pub model: String,
    pub files: Vec<String>,
    pub review: PartialReview,
}

/// Everything a review run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResult {
    pub project_name: String,
    pub review_type: ReviewType,
    /// Final review text (consolidated, concatenated or single-pass markdown).
    pub content: String,
    /// Issues from every successful pass.
    pub issues: Vec<ReviewIssue>,
    pub cost: ReviewCost,
    pub models_used: Vec<String>,
    pub total_passes: u32,
    pub status: ReviewStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pass_failures: Vec<PassFailure>,
    /// Whether a writer model merged the partial reviews.
    pub consolidated: bool,
    /// Set when a forced single pass exceeded the usable context window.
    pub potentially_truncated: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pass_outputs: Vec<PassOutput>,
}

impl ReviewResult {
    pub fn succeeded_passes(&self) -> usize {
        self.pass_outputs.len()
    }

    /// Markdown footer listing failed passes, empty when there are none.
    pub fn failure_notes(&self) -> String {
        if self.pass_failures.is_empty() {
            return String::new();
        }
        let mut notes = String::from("## Failed passes\n\n");
        for failure in &self.pass_failures {
            notes.push_str(&format!(
                "- Pass {} ({} files, {} attempts): {}\n",
                failure.pass_number,
                failure.files.len(),
                failure.attempts,
                failure.error
            ));
        }
        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_and_serde() {
        let status = ReviewStatus::incomplete("cancelled");
        assert_eq!(status.to_string(), "incomplete (cancelled)");
        assert!(!status.is_complete());

        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"state":"incomplete","reason":"cancelled"}"#);
        let complete = serde_json::to_string(&ReviewStatus::Complete).unwrap();
        assert_eq!(complete, r#"{"state":"complete"}"#);
    }

    #[test]
    fn test_failure_notes() {
        let mut result = ReviewResult {
            project_name: "demo".into(),
            review_type: ReviewType::Security,
            content: String::new(),
            issues: vec![],
            cost: crate::cost::CostAccountant::new(None).snapshot(),
            models_used: vec![],
            total_passes: 2,
            status: ReviewStatus::Complete,
            pass_failures: vec![],
            consolidated: false,
            potentially_truncated: false,
            timestamp: Utc::now(),
            pass_outputs: vec![],
        };
        assert!(result.failure_notes().is_empty());

        result.pass_failures.push(PassFailure {
            pass_number: 2,
            files: vec!["a.rs".into(), "b.rs".into()],
            error: "Rate limited by provider: quota".into(),
            attempts: 4,
        });
        let notes = result.failure_notes();
        assert!(notes.contains("Pass 2 (2 files, 4 attempts)"));
        assert!(notes.contains("quota"));
    }
}
