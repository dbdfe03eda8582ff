//! Review vocabulary: review types, per-pass findings and the final result.
//!
//! ## Components
//!
//! - [`types`]: [`ReviewType`] and [`Severity`]
//! - [`findings`]: [`PartialReview`], the lenient parse of one pass's output
//! - [`result`]: [`ReviewResult`] handed to the output writer

pub mod findings;
pub mod result;
pub mod types;

pub use findings::{PartialReview, ReportedCodeElement, ReportedFileSummary, ReviewIssue};
pub use result::{PassFailure, PassOutput, ReviewResult, ReviewStatus};
pub use types::{ReviewType, Severity};
