//! Capacity planning: decide between one pass and many, and pack files into
//! passes.
//!
//! The usable window per pass is `context_window * (1 - factor)`; the
//! reserved share carries the cross-pass context digest. Files are ranked by
//! importance (entry points first, then larger files, ties by original order)
//! and packed first-fit. A file is never split; one that cannot fit a pass
//! on its own is placed alone and flagged as oversized.
//!
//! ```
//! use ai_code_review::planner::CapacityPlanner;
//! use ai_code_review::tokens::{FileTokenEstimate, TokenAnalysis};
//!
//! let estimate = |path: &str, tokens: usize| FileTokenEstimate {
//!     relative_path: path.into(),
//!     tokens,
//!     size_bytes: tokens * 4,
//!     tokens_per_byte: 0.25,
//!     exceeds_context_window: false,
//! };
//! let files = vec![estimate("a.rs", 60_000), estimate("b.rs", 60_000)];
//! let analysis = TokenAnalysis {
//!     total_tokens: 120_000,
//!     total_size_bytes: 480_000,
//!     file_count: 2,
//!     prompt_overhead_tokens: 1_000,
//!     estimated_total_tokens: 121_000,
//!     context_window_size: 100_000,
//!     exceeds_context_window: true,
//!     estimated_passes_needed: 2,
//!     files,
//! };
//!
//! let plan = CapacityPlanner::new(100_000, 0.15).unwrap().plan(&analysis);
//! assert!(plan.chunking_recommended);
//! assert_eq!(plan.pass_count(), 2);
//! ```

use crate::errors::PlanningError;
use crate::tokens::{TokenAnalysis, usable_tokens};
use serde::{Deserialize, Serialize};

/// Share of the context window reserved for the cross-pass digest.
pub const DEFAULT_CONTEXT_MAINTENANCE_FACTOR: f64 = 0.15;

/// File stems treated as entry points when ranking.
const ENTRY_POINT_STEMS: &[&str] = &[
    "main", "index", "app", "lib", "server", "cli", "mod", "__main__", "__init__",
];

/// Files reviewed together in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChunk {
    /// Relative paths, in review order.
    pub files: Vec<String>,
    /// Sum of the files' token estimates, prompt overhead excluded.
    pub estimated_tokens: usize,
    /// 1 is reviewed first.
    pub priority: u32,
    /// A single file larger than the per-pass budget.
    pub oversized: bool,
}

/// Result of a capacity-planning decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub chunking_recommended: bool,
    pub chunks: Vec<FileChunk>,
    pub reason: String,
    pub usable_tokens_per_pass: usize,
}

impl ChunkPlan {
    pub fn pass_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn oversized_files(&self) -> Vec<&str> {
        self.chunks
            .iter()
            .filter(|c| c.oversized)
            .flat_map(|c| c.files.iter().map(String::as_str))
            .collect()
    }

    /// Collapse every chunk into one, for forced single-pass runs.
    pub fn merged(&self) -> ChunkPlan {
        let files: Vec<String> = self.chunks.iter().flat_map(|c| c.files.clone()).collect();
        let estimated_tokens = self.chunks.iter().map(|c| c.estimated_tokens).sum();
        let chunks = if files.is_empty() {
            Vec::new()
        } else {
            vec![FileChunk {
                oversized: estimated_tokens > self.usable_tokens_per_pass,
                files,
                estimated_tokens,
                priority: 1,
            }]
        };
        ChunkPlan {
            chunking_recommended: false,
            chunks,
            reason: "Single pass forced".to_string(),
            usable_tokens_per_pass: self.usable_tokens_per_pass,
        }
    }
}

/// Whether a path names a likely entry point.
pub fn is_entry_point(relative_path: &str) -> bool {
    let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
    let stem = name.split('.').next().unwrap_or(name).to_lowercase();
    ENTRY_POINT_STEMS.contains(&stem.as_str())
}

/// Plans passes against one model's context window.
#[derive(Debug, Clone)]
pub struct CapacityPlanner {
    context_window: usize,
    context_maintenance_factor: f64,
    batch_token_limit: Option<usize>,
}

impl CapacityPlanner {
    pub fn new(
        context_window: usize,
        context_maintenance_factor: f64,
    ) -> Result<Self, PlanningError> {
        if context_window == 0 {
            return Err(PlanningError::InvalidContextWindow(context_window));
        }
        if !(0.0..1.0).contains(&context_maintenance_factor) {
            return Err(PlanningError::InvalidMaintenanceFactor(
                context_maintenance_factor,
            ));
        }
        Ok(Self {
            context_window,
            context_maintenance_factor,
            batch_token_limit: None,
        })
    }

    /// Cap file tokens per pass below the window-derived budget.
    pub fn with_batch_token_limit(mut self, limit: Option<usize>) -> Self {
        self.batch_token_limit = limit.filter(|l| *l > 0);
        self
    }

    pub fn usable_tokens(&self) -> usize {
        usable_tokens(self.context_window, self.context_maintenance_factor)
    }

    pub fn context_maintenance_factor(&self) -> f64 {
        self.context_maintenance_factor
    }

    /// File-token budget of one pass after prompt overhead.
    fn chunk_budget(&self, prompt_overhead: usize) -> usize {
        let budget = self.usable_tokens().saturating_sub(prompt_overhead).max(1);
        match self.batch_token_limit {
            Some(limit) => budget.min(limit),
            None => budget,
        }
    }

    pub fn plan(&self, analysis: &TokenAnalysis) -> ChunkPlan {
        let usable = self.usable_tokens();

        if analysis.files.is_empty() {
            return ChunkPlan {
                chunking_recommended: false,
                chunks: Vec::new(),
                reason: "No files to review; no chunking needed".to_string(),
                usable_tokens_per_pass: usable,
            };
        }

        let budget = self.chunk_budget(analysis.prompt_overhead_tokens);
        let within_batch_limit = self
            .batch_token_limit
            .is_none_or(|limit| analysis.total_tokens <= limit);

        if analysis.estimated_total_tokens <= usable && within_batch_limit {
            return ChunkPlan {
                chunking_recommended: false,
                chunks: vec![FileChunk {
                    files: analysis
                        .files
                        .iter()
                        .map(|f| f.relative_path.clone())
                        .collect(),
                    estimated_tokens: analysis.total_tokens,
                    priority: 1,
                    oversized: false,
                }],
                reason: format!(
                    "Estimated {} tokens fit within the usable window of {} tokens",
                    analysis.estimated_total_tokens, usable
                ),
                usable_tokens_per_pass: usable,
            };
        }

        let mut ranked: Vec<usize> = (0..analysis.files.len()).collect();
        ranked.sort_by(|&a, &b| {
            let fa = &analysis.files[a];
            let fb = &analysis.files[b];
            is_entry_point(&fb.relative_path)
                .cmp(&is_entry_point(&fa.relative_path))
                .then(fb.tokens.cmp(&fa.tokens))
                .then(a.cmp(&b))
        });

        let mut chunks: Vec<FileChunk> = Vec::new();
        for index in ranked {
            let file = &analysis.files[index];
            if file.tokens > budget {
                tracing::warn!(
                    file = %file.relative_path,
                    tokens = file.tokens,
                    budget,
                    "File exceeds the per-pass budget; reviewing it alone"
                );
                chunks.push(FileChunk {
                    files: vec![file.relative_path.clone()],
                    estimated_tokens: file.tokens,
                    priority: 0,
                    oversized: true,
                });
                continue;
            }

            match chunks
                .iter_mut()
                .find(|c| !c.oversized && c.estimated_tokens + file.tokens <= budget)
            {
                Some(chunk) => {
                    chunk.files.push(file.relative_path.clone());
                    chunk.estimated_tokens += file.tokens;
                }
                None => chunks.push(FileChunk {
                    files: vec![file.relative_path.clone()],
                    estimated_tokens: file.tokens,
                    priority: 0,
                    oversized: false,
                }),
            }
        }

        for (i, chunk) in chunks.iter_mut().enumerate() {
            chunk.priority = i as u32 + 1;
        }

        let oversized = chunks.iter().filter(|c| c.oversized).count();
        let mut reason = format!(
            "Estimated {} tokens exceed the usable window of {} tokens ({}% of {} reserved for context); split into {} passes",
            analysis.estimated_total_tokens,
            usable,
            (self.context_maintenance_factor * 100.0).round(),
            self.context_window,
            chunks.len()
        );
        if oversized > 0 {
            reason.push_str(&format!(
                "; {} oversized file(s) reviewed alone",
                oversized
            ));
        }

        ChunkPlan {
            chunking_recommended: true,
            chunks,
            reason,
            usable_tokens_per_pass: usable,
        }
    }
}

/// Plan with default options.
pub fn plan(
    analysis: &TokenAnalysis,
    context_window: usize,
    context_maintenance_factor: f64,
) -> Result<ChunkPlan, PlanningError> {
    Ok(CapacityPlanner::new(context_window, context_maintenance_factor)?.plan(analysis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::FileTokenEstimate;
    use std::collections::HashSet;

    fn analysis(files: &[(&str, usize)], overhead: usize, context_window: usize) -> TokenAnalysis {
        let files: Vec<FileTokenEstimate> = files
            .iter()
            .map(|(path, tokens)| FileTokenEstimate {
                relative_path: path.to_string(),
                tokens: *tokens,
                size_bytes: tokens * 4,
                tokens_per_byte: 0.25,
                exceeds_context_window: tokens + overhead > context_window,
            })
            .collect();
        let total_tokens: usize = files.iter().map(|f| f.tokens).sum();
        TokenAnalysis {
            total_size_bytes: total_tokens * 4,
            file_count: files.len(),
            prompt_overhead_tokens: overhead,
            estimated_total_tokens: total_tokens + overhead,
            context_window_size: context_window,
            exceeds_context_window: total_tokens + overhead > context_window,
            estimated_passes_needed: 0,
            total_tokens,
            files,
        }
    }

    #[test]
    fn test_scenario_oversized_file_isolated() {
        let a = analysis(
            &[("src/a.ts", 40_000), ("src/b.ts", 90_000), ("src/c.ts", 500_000)],
            1_500,
            200_000,
        );
        let plan = plan(&a, 200_000, 0.15).unwrap();

        assert!(plan.chunking_recommended);
        assert_eq!(plan.usable_tokens_per_pass, 170_000);
        assert_eq!(plan.chunks.len(), 2);

        assert_eq!(plan.chunks[0].files, vec!["src/c.ts"]);
        assert!(plan.chunks[0].oversized);

        assert_eq!(plan.chunks[1].files, vec!["src/b.ts", "src/a.ts"]);
        assert_eq!(plan.chunks[1].estimated_tokens, 130_000);
        assert!(!plan.chunks[1].oversized);
        assert_eq!(plan.oversized_files(), vec!["src/c.ts"]);
        assert!(plan.reason.contains("oversized"));
    }

    #[test]
    fn test_fits_in_single_pass_keeps_original_order() {
        let a = analysis(&[("z.rs", 1_000), ("main.rs", 500)], 1_500, 200_000);
        let plan = plan(&a, 200_000, 0.15).unwrap();
        assert!(!plan.chunking_recommended);
        assert_eq!(plan.chunks.len(), 1);
        assert_eq!(plan.chunks[0].files, vec!["z.rs", "main.rs"]);
        assert_eq!(plan.chunks[0].estimated_tokens, 1_500);
    }

    #[test]
    fn test_zero_files() {
        let a = analysis(&[], 1_500, 200_000);
        let plan = plan(&a, 200_000, 0.15).unwrap();
        assert!(!plan.chunking_recommended);
        assert!(plan.chunks.is_empty());
        assert!(plan.reason.contains("no chunking needed"));
    }

    #[test]
    fn test_invalid_configuration() {
        assert_eq!(
            CapacityPlanner::new(200_000, 1.0).unwrap_err(),
            PlanningError::InvalidMaintenanceFactor(1.0)
        );
        assert_eq!(
            CapacityPlanner::new(200_000, -0.1).unwrap_err(),
            PlanningError::InvalidMaintenanceFactor(-0.1)
        );
        assert_eq!(
            CapacityPlanner::new(0, 0.15).unwrap_err(),
            PlanningError::InvalidContextWindow(0)
        );
    }

    #[test]
    fn test_entry_points_ranked_first() {
        let a = analysis(
            &[("src/util.rs", 60_000), ("src/main.rs", 10_000), ("src/big.rs", 80_000)],
            1_000,
            100_000,
        );
        let plan = plan(&a, 100_000, 0.15).unwrap();
        assert!(plan.chunking_recommended);
        assert_eq!(plan.chunks[0].files[0], "src/main.rs");
        assert_eq!(plan.chunks[0].priority, 1);
    }

    #[test]
    fn test_equal_sizes_keep_original_order() {
        let a = analysis(
            &[("a.rs", 50_000), ("b.rs", 50_000), ("c.rs", 50_000)],
            1_000,
            100_000,
        );
        let plan = plan(&a, 100_000, 0.15).unwrap();
        let order: Vec<&str> = plan
            .chunks
            .iter()
            .flat_map(|c| c.files.iter().map(String::as_str))
            .collect();
        assert_eq!(order, vec!["a.rs", "b.rs", "c.rs"]);
    }

    #[test]
    fn test_every_file_in_exactly_one_chunk_within_budget() {
        let sizes: Vec<(String, usize)> = (0..40)
            .map(|i| (format!("src/f{}.rs", i), 1_000 + (i * 7_919) % 30_000))
            .collect();
        let refs: Vec<(&str, usize)> = sizes.iter().map(|(p, t)| (p.as_str(), *t)).collect();
        let a = analysis(&refs, 2_000, 64_000);
        let plan = plan(&a, 64_000, 0.2).unwrap();

        let mut seen = HashSet::new();
        for chunk in &plan.chunks {
            for file in &chunk.files {
                assert!(seen.insert(file.clone()), "{} assigned twice", file);
            }
            if !chunk.oversized {
                assert!(chunk.estimated_tokens + 2_000 <= plan.usable_tokens_per_pass);
            }
        }
        assert_eq!(seen.len(), 40);
        let priorities: Vec<u32> = plan.chunks.iter().map(|c| c.priority).collect();
        assert_eq!(priorities, (1..=plan.chunks.len() as u32).collect::<Vec<_>>());
    }

    #[test]
    fn test_batch_token_limit_forces_smaller_chunks() {
        let a = analysis(&[("a.rs", 3_000), ("b.rs", 3_000), ("c.rs", 3_000)], 500, 200_000);
        let planner = CapacityPlanner::new(200_000, 0.15)
            .unwrap()
            .with_batch_token_limit(Some(6_000));
        let plan = planner.plan(&a);
        assert!(plan.chunking_recommended);
        assert_eq!(plan.chunks.len(), 2);
        assert_eq!(plan.chunks[0].files, vec!["a.rs", "b.rs"]);
    }

    #[test]
    fn test_merged_plan() {
        let a = analysis(&[("a.rs", 50_000), ("b.rs", 50_000)], 1_000, 100_000);
        let plan = plan(&a, 100_000, 0.15).unwrap();
        assert_eq!(plan.pass_count(), 2);
        let merged = plan.merged();
        assert_eq!(merged.pass_count(), 1);
        assert_eq!(merged.chunks[0].files.len(), 2);
        assert!(merged.chunks[0].oversized);
        assert!(!merged.chunking_recommended);
    }
}
