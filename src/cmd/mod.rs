//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `review`   | `Review`         |
//! | `estimate` | `Estimate`       |
//! | `models`   | `Models`         |
//! | `config`   | `Config`         |

pub mod config;
pub mod estimate;
pub mod models;
pub mod review;

pub use config::cmd_config;
pub use estimate::cmd_estimate;
pub use models::cmd_models;
pub use review::cmd_review;

use ai_code_review::config::Config;
use ai_code_review::files::{DiscoveryOptions, FileUnit, discover_files, read_files};
use ai_code_review::models::{ModelInfo, ModelRegistry};
use ai_code_review::planner::{CapacityPlanner, ChunkPlan};
use ai_code_review::review::ReviewType;
use ai_code_review::tokens::{EstimateOptions, PromptOverhead, TokenAnalysis, TokenEstimator};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Files, model and pass plan shared by `review` and `estimate`.
pub struct ReviewSetup {
    pub files: Vec<FileUnit>,
    pub model: ModelInfo,
    pub analysis: TokenAnalysis,
    pub plan: ChunkPlan,
    pub context_maintenance_factor: f64,
}

/// Resolve `model_id`, applying the config's context window override.
pub fn resolve_model(
    registry: &dyn ModelRegistry,
    config: &Config,
    model_id: &str,
) -> Result<ModelInfo> {
    let mut model = registry
        .resolve(model_id)
        .with_context(|| format!("Cannot use model '{}'", model_id))?;
    if let Some(window) = config.toml.tokens.context_window {
        model.context_window = window;
    }
    Ok(model)
}

/// Discover and read the files under `targets`.
pub async fn load_files(
    config: &Config,
    targets: &[PathBuf],
    include_tests: bool,
) -> Result<Vec<FileUnit>> {
    let targets = if targets.is_empty() {
        vec![config.project_dir.clone()]
    } else {
        targets.to_vec()
    };
    let options = DiscoveryOptions {
        include_tests: config.include_tests(include_tests),
        ..DiscoveryOptions::default()
    }
    .with_excludes(&config.toml.files.exclude)?;

    let paths = discover_files(&config.project_dir, &targets, &options)?;
    let files = read_files(&config.project_dir, paths).await;
    if files.is_empty() {
        anyhow::bail!("No reviewable source files found in the given targets");
    }
    Ok(files)
}

/// Estimate tokens for `files` and plan passes against `model`.
pub fn plan_review(
    config: &Config,
    files: Vec<FileUnit>,
    model: ModelInfo,
    review_type: ReviewType,
    factor_override: Option<f64>,
    batch_limit_override: Option<usize>,
) -> Result<ReviewSetup> {
    let context_maintenance_factor = config.context_maintenance_factor(factor_override);
    let planner = CapacityPlanner::new(model.context_window, context_maintenance_factor)?
        .with_batch_token_limit(config.batch_token_limit(batch_limit_override));

    let estimator = match config.toml.tokens.bytes_per_token {
        Some(ratio) => TokenEstimator::new(ratio),
        None => TokenEstimator::for_provider(model.provider),
    };
    let analysis = estimator.estimate_set(
        &files,
        &EstimateOptions {
            context_window: model.context_window,
            prompt_overhead: PromptOverhead::for_review_type(review_type),
            context_maintenance_factor,
        },
    );
    let plan = planner.plan(&analysis);
    tracing::debug!(
        files = analysis.file_count,
        tokens = analysis.estimated_total_tokens,
        passes = plan.pass_count(),
        "Planned review"
    );

    Ok(ReviewSetup {
        files,
        model,
        analysis,
        plan,
        context_maintenance_factor,
    })
}

/// Estimated input cost of running `plan`: each pass pays the prompt
/// overhead, and later passes also carry the context digest.
pub fn estimated_plan_cost(setup: &ReviewSetup) -> f64 {
    let overhead = setup.analysis.prompt_overhead_tokens as u64;
    let digest = (setup.model.context_window as f64 * setup.context_maintenance_factor) as u64;
    setup
        .plan
        .chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let carried = if i == 0 { 0 } else { digest };
            let input = chunk.estimated_tokens as u64 + overhead + carried;
            ai_code_review::cost::estimate_cost(input, &setup.model.pricing)
        })
        .sum()
}
