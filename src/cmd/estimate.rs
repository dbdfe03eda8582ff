//! Token and cost estimate without calling a provider: `ai-code-review estimate`.

use anyhow::Result;
use console::style;
use std::path::PathBuf;

use super::super::{Cli, EstimateArgs};
use super::{estimated_plan_cost, load_files, plan_review, resolve_model};

/// Largest files listed in the breakdown.
const TOP_FILES: usize = 10;

pub async fn cmd_estimate(cli: &Cli, project_dir: PathBuf, args: &EstimateArgs) -> Result<()> {
    use ai_code_review::config::Config;
    use ai_code_review::cost::format_cost;
    use ai_code_review::models::StaticModelRegistry;

    let config = Config::new(project_dir, cli.verbose, cli.yes)?;
    let registry = StaticModelRegistry::builtin();
    let model = resolve_model(&registry, &config, &config.model_id(args.model.as_deref()))?;
    if let Some(warning) = model.lifecycle_warning() {
        println!("{} {}", style("Warning:").yellow().bold(), warning);
    }

    let files = load_files(&config, &args.targets, args.include_tests).await?;
    let setup = plan_review(
        &config,
        files,
        model,
        args.review_type,
        args.context_maintenance_factor,
        args.batch_token_limit,
    )?;
    let analysis = &setup.analysis;
    let plan = &setup.plan;

    println!();
    println!(
        "{} for {}",
        style(args.review_type.title()).bold(),
        style(config.project_name()).cyan()
    );
    println!("{}", "=".repeat(50));
    println!("Model:            {}", setup.model.id);
    println!("Context window:   {} tokens", analysis.context_window_size);
    println!(
        "Usable per pass:  {} tokens ({:.0}% reserved for carried context)",
        plan.usable_tokens_per_pass,
        setup.context_maintenance_factor * 100.0
    );
    println!("Files:            {}", analysis.file_count);
    println!("Size:             {} bytes", analysis.total_size_bytes);
    println!("File tokens:      {}", analysis.total_tokens);
    println!("Prompt overhead:  {}", analysis.prompt_overhead_tokens);
    println!("Estimated total:  {} tokens", analysis.estimated_total_tokens);
    println!();

    let mut largest: Vec<_> = analysis.files.iter().collect();
    largest.sort_by(|a, b| b.tokens.cmp(&a.tokens));
    println!("Largest files:");
    for estimate in largest.iter().take(TOP_FILES) {
        let marker = if estimate.exceeds_context_window {
            style(" (exceeds context window)").red().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:>8} tokens  {}{}",
            estimate.tokens, estimate.relative_path, marker
        );
    }
    println!();

    if plan.chunking_recommended {
        println!(
            "{} {} passes",
            style("Multi-pass review:").yellow().bold(),
            plan.pass_count()
        );
        println!("  {}", style(&plan.reason).dim());
        for (i, chunk) in plan.chunks.iter().enumerate() {
            println!(
                "  Pass {}: {} files, ~{} tokens{}",
                i + 1,
                chunk.files.len(),
                chunk.estimated_tokens,
                if chunk.oversized { " (oversized)" } else { "" }
            );
            if cli.verbose {
                for file in &chunk.files {
                    println!("      {}", style(file).dim());
                }
            }
        }
    } else {
        println!("{} {}", style("Single pass:").green().bold(), plan.reason);
    }
    println!();
    println!(
        "Estimated cost:   {}",
        style(format_cost(estimated_plan_cost(&setup))).bold()
    );
    if !setup.model.registered {
        println!(
            "{}",
            style("Model is not in the registry; pricing is unknown and shown as zero").dim()
        );
    }
    Ok(())
}
