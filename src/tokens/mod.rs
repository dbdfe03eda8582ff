//! Token estimation for files and file sets.
//!
//! Estimates are byte-ratio heuristics, not tokenizer output. Each provider
//! gets its own bytes-per-token ratio; unknown providers use a conservative
//! ratio that over-estimates rather than under-estimates.

use crate::files::FileUnit;
use crate::models::ProviderKind;
use crate::review::ReviewType;
use serde::{Deserialize, Serialize};

/// Ratio used when the provider is unknown. Lower means more tokens.
pub const CONSERVATIVE_BYTES_PER_TOKEN: f64 = 3.0;

/// Average bytes of source code per token for a provider's tokenizer.
pub fn bytes_per_token(provider: ProviderKind) -> f64 {
    match provider {
        ProviderKind::Gemini => 4.0,
        ProviderKind::Anthropic => 3.5,
        ProviderKind::OpenAi => 4.0,
        ProviderKind::OpenRouter => 3.5,
    }
}

/// Fixed prompt cost added once per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOverhead {
    pub system_prompt: usize,
    pub schema_instructions: usize,
    pub examples: usize,
}

impl PromptOverhead {
    pub fn for_review_type(review_type: ReviewType) -> Self {
        let system_prompt = match review_type {
            ReviewType::QuickFixes => 450,
            ReviewType::Architectural => 700,
            ReviewType::Security => 650,
            ReviewType::Performance => 600,
            ReviewType::UnusedCode => 550,
            ReviewType::BestPractices => 600,
            ReviewType::Evaluation => 750,
        };
        Self {
            system_prompt,
            schema_instructions: 450,
            examples: 400,
        }
    }

    pub fn total(&self) -> usize {
        self.system_prompt + self.schema_instructions + self.examples
    }
}

/// Token estimate for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTokenEstimate {
    pub relative_path: String,
    pub tokens: usize,
    pub size_bytes: usize,
    pub tokens_per_byte: f64,
    /// File plus prompt overhead does not fit the context window on its own.
    pub exceeds_context_window: bool,
}

/// Options for [`TokenEstimator::estimate_set`].
#[derive(Debug, Clone)]
pub struct EstimateOptions {
    pub context_window: usize,
    pub prompt_overhead: PromptOverhead,
    pub context_maintenance_factor: f64,
}

/// Aggregate estimate for a file set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenAnalysis {
    pub files: Vec<FileTokenEstimate>,
    pub total_tokens: usize,
    pub total_size_bytes: usize,
    pub file_count: usize,
    pub prompt_overhead_tokens: usize,
    /// File tokens plus prompt overhead.
    pub estimated_total_tokens: usize,
    pub context_window_size: usize,
    pub exceeds_context_window: bool,
    pub estimated_passes_needed: usize,
}

/// Byte-ratio token estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenEstimator {
    bytes_per_token: f64,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(CONSERVATIVE_BYTES_PER_TOKEN)
    }
}

impl TokenEstimator {
    /// Non-finite or non-positive ratios fall back to the conservative ratio.
    pub fn new(bytes_per_token: f64) -> Self {
        let bytes_per_token = if bytes_per_token.is_finite() && bytes_per_token > 0.0 {
            bytes_per_token
        } else {
            tracing::warn!(
                bytes_per_token,
                "Invalid bytes-per-token ratio; using conservative default"
            );
            CONSERVATIVE_BYTES_PER_TOKEN
        };
        Self { bytes_per_token }
    }

    pub fn for_provider(provider: ProviderKind) -> Self {
        Self::new(bytes_per_token(provider))
    }

    pub fn bytes_per_token(&self) -> f64 {
        self.bytes_per_token
    }

    /// Tokens in `text`; at least 1 for non-empty text.
    pub fn estimate_text(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        ((text.len() as f64 / self.bytes_per_token).ceil() as usize).max(1)
    }

    pub fn estimate_file(
        &self,
        file: &FileUnit,
        context_window: usize,
        prompt_overhead: usize,
    ) -> FileTokenEstimate {
        let tokens = self.estimate_text(&file.content);
        let size_bytes = file.size_bytes();
        FileTokenEstimate {
            relative_path: file.relative_path.clone(),
            tokens,
            size_bytes,
            tokens_per_byte: if size_bytes == 0 {
                0.0
            } else {
                tokens as f64 / size_bytes as f64
            },
            exceeds_context_window: tokens + prompt_overhead > context_window,
        }
    }

    /// Estimate a whole file set. Prompt overhead is counted once.
    pub fn estimate_set(&self, files: &[FileUnit], options: &EstimateOptions) -> TokenAnalysis {
        let overhead = options.prompt_overhead.total();
        let estimates: Vec<FileTokenEstimate> = files
            .iter()
            .map(|f| self.estimate_file(f, options.context_window, overhead))
            .collect();

        let total_tokens: usize = estimates.iter().map(|e| e.tokens).sum();
        let total_size_bytes: usize = estimates.iter().map(|e| e.size_bytes).sum();
        let estimated_total_tokens = total_tokens + overhead;
        let exceeds_context_window = estimated_total_tokens > options.context_window;

        let estimated_passes_needed = if files.is_empty() {
            0
        } else {
            let usable = usable_tokens(options.context_window, options.context_maintenance_factor);
            if estimated_total_tokens <= usable {
                1
            } else {
                let per_pass = usable.saturating_sub(overhead).max(1);
                total_tokens.div_ceil(per_pass)
            }
        };

        TokenAnalysis {
            file_count: estimates.len(),
            files: estimates,
            total_tokens,
            total_size_bytes,
            prompt_overhead_tokens: overhead,
            estimated_total_tokens,
            context_window_size: options.context_window,
            exceeds_context_window,
            estimated_passes_needed,
        }
    }
}

/// Tokens available per pass after reserving the maintenance share.
pub fn usable_tokens(context_window: usize, context_maintenance_factor: f64) -> usize {
    let factor = context_maintenance_factor.clamp(0.0, 1.0);
    (context_window as f64 * (1.0 - factor)).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(rel: &str, bytes: usize) -> FileUnit {
        FileUnit::new(rel, rel, "x".repeat(bytes))
    }

    fn options(context_window: usize) -> EstimateOptions {
        EstimateOptions {
            context_window,
            prompt_overhead: PromptOverhead::for_review_type(ReviewType::QuickFixes),
            context_maintenance_factor: 0.15,
        }
    }

    #[test]
    fn test_estimate_text_rounds_up_and_never_zero() {
        let estimator = TokenEstimator::new(4.0);
        assert_eq!(estimator.estimate_text(""), 0);
        assert_eq!(estimator.estimate_text("a"), 1);
        assert_eq!(estimator.estimate_text("abcd"), 1);
        assert_eq!(estimator.estimate_text("abcde"), 2);
    }

    #[test]
    fn test_invalid_ratio_falls_back() {
        assert_eq!(
            TokenEstimator::new(0.0).bytes_per_token(),
            CONSERVATIVE_BYTES_PER_TOKEN
        );
        assert_eq!(
            TokenEstimator::new(f64::NAN).bytes_per_token(),
            CONSERVATIVE_BYTES_PER_TOKEN
        );
    }

    #[test]
    fn test_provider_ratios() {
        assert_eq!(TokenEstimator::for_provider(ProviderKind::Gemini).bytes_per_token(), 4.0);
        assert_eq!(
            TokenEstimator::for_provider(ProviderKind::Anthropic).bytes_per_token(),
            3.5
        );
    }

    #[test]
    fn test_estimate_file_flags_oversized() {
        let estimator = TokenEstimator::new(4.0);
        let estimate = estimator.estimate_file(&file("big.rs", 4_000), 1_000, 100);
        assert_eq!(estimate.tokens, 1_000);
        assert!(estimate.exceeds_context_window);
        assert!((estimate.tokens_per_byte - 0.25).abs() < f64::EPSILON);

        let small = estimator.estimate_file(&file("small.rs", 400), 1_000, 100);
        assert!(!small.exceeds_context_window);
    }

    #[test]
    fn test_estimate_set_adds_overhead_once() {
        let estimator = TokenEstimator::new(4.0);
        let files = vec![file("a.rs", 400), file("b.rs", 800)];
        let analysis = estimator.estimate_set(&files, &options(100_000));
        let overhead = PromptOverhead::for_review_type(ReviewType::QuickFixes).total();

        assert_eq!(analysis.file_count, 2);
        assert_eq!(analysis.total_tokens, 300);
        assert_eq!(analysis.total_size_bytes, 1_200);
        assert_eq!(analysis.prompt_overhead_tokens, overhead);
        assert_eq!(analysis.estimated_total_tokens, 300 + overhead);
        assert!(!analysis.exceeds_context_window);
        assert_eq!(analysis.estimated_passes_needed, 1);
    }

    #[test]
    fn test_estimate_set_empty() {
        let analysis = TokenEstimator::default().estimate_set(&[], &options(100_000));
        assert_eq!(analysis.file_count, 0);
        assert_eq!(analysis.total_tokens, 0);
        assert_eq!(analysis.estimated_passes_needed, 0);
    }

    #[test]
    fn test_estimate_set_passes_needed() {
        let estimator = TokenEstimator::new(1.0);
        // usable = 8_500, per pass = 8_500 - overhead
        let files = vec![file("a.rs", 20_000)];
        let analysis = estimator.estimate_set(&files, &options(10_000));
        let overhead = analysis.prompt_overhead_tokens;
        assert!(analysis.exceeds_context_window);
        assert_eq!(
            analysis.estimated_passes_needed,
            20_000usize.div_ceil(8_500 - overhead)
        );
    }

    #[test]
    fn test_usable_tokens() {
        assert_eq!(usable_tokens(200_000, 0.15), 170_000);
        assert_eq!(usable_tokens(200_000, 0.0), 200_000);
    }
}
