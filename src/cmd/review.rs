//! Running a review: `ai-code-review review`.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use super::super::{Cli, ReviewArgs};
use super::{ReviewSetup, estimated_plan_cost, load_files, plan_review, resolve_model};

pub async fn cmd_review(cli: &Cli, project_dir: PathBuf, args: &ReviewArgs) -> Result<()> {
    use ai_code_review::config::Config;
    use ai_code_review::cost::format_cost;
    use ai_code_review::errors::ReviewError;
    use ai_code_review::models::StaticModelRegistry;
    use ai_code_review::orchestrator::{OrchestratorOptions, PassOrchestrator};
    use ai_code_review::output::write_review;
    use ai_code_review::prompts::TemplateRenderer;
    use ai_code_review::providers::{api_key_env_vars, router_from_env};
    use ai_code_review::ui::ReviewUI;
    use tokio_util::sync::CancellationToken;

    let config = Config::new(project_dir, cli.verbose, cli.yes)?;
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }
    let registry = StaticModelRegistry::builtin();

    let model = resolve_model(&registry, &config, &config.model_id(args.model.as_deref()))?;
    let writer_model = config
        .writer_model_id(args.writer_model.as_deref())
        .map(|id| resolve_model(&registry, &config, &id))
        .transpose()?;
    let fallback_model = config
        .fallback_model_id(args.fallback_model.as_deref())
        .or_else(|| model.fallback.clone())
        .map(|id| resolve_model(&registry, &config, &id))
        .transpose()?;

    let mut retry = config.toml.retry.to_policy();
    if let Some(max) = args.max_retries {
        retry.max_attempts = max.saturating_add(1);
    }
    let pass_timeout = args
        .pass_timeout
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| config.toml.retry.pass_timeout());

    // Fail before reading files when the analysis model has no key.
    let router = router_from_env(pass_timeout);
    if !router.has(model.provider) {
        anyhow::bail!(
            "No API key for {} (model {}). Set {}.",
            model.provider,
            model.id,
            api_key_env_vars(model.provider).join(" or ")
        );
    }

    let ui = Arc::new(ReviewUI::new(cli.verbose));
    if let Some(warning) = model.lifecycle_warning() {
        tracing::warn!(model = %model.id, "{}", warning);
        ui.warn(&warning);
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
    ui.print_header(
        &config.project_name(),
        args.review_type.title(),
        &setup.model.id,
        setup.files.len(),
    );

    if !confirm_multi_pass(cli, args, &config, &setup)? {
        println!("Review cancelled");
        return Ok(());
    }

    let mut options = OrchestratorOptions::new(
        config.project_name(),
        args.review_type,
        setup.model.clone(),
    );
    options.writer_model = writer_model;
    options.fallback_model = fallback_model;
    options.retry = retry;
    options.pass_timeout = pass_timeout;
    options.context_maintenance_factor = setup.context_maintenance_factor;
    options.force_single_pass = args.force_single_pass;

    let prompts_dir = config
        .prompts_dir()
        .unwrap_or_else(|| config.state_dir().join("prompts"));
    let renderer = TemplateRenderer::with_overrides_dir(&prompts_dir)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted; finishing the current pass before stopping...");
            ctrl_c.cancel();
        }
    });

    let store = config.checkpoint_store();
    let orchestrator = PassOrchestrator::new(Arc::new(router), Arc::new(renderer), options)
        .with_observer(ui.clone())
        .with_cancellation(cancel)
        .with_checkpoint_store(store.clone());

    let outcome = match store.load() {
        Ok(Some(checkpoint)) if args.resume => {
            orchestrator
                .resume(&setup.files, &setup.plan, checkpoint)
                .await
        }
        Ok(Some(checkpoint)) => {
            ui.warn(&format!(
                "Found an unfinished run from {}; pass --resume to continue it. Starting over.",
                checkpoint.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            orchestrator.run(&setup.files, &setup.plan).await
        }
        Ok(None) => {
            if args.resume {
                ui.warn("No checkpoint to resume; starting a new review");
            }
            orchestrator.run(&setup.files, &setup.plan).await
        }
        Err(e) if args.resume => return Err(e.context("Cannot resume review")),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable checkpoint");
            orchestrator.run(&setup.files, &setup.plan).await
        }
    };

    let result = match outcome {
        Ok(result) => result,
        Err(ReviewError::Fatal { pass, source }) => {
            return Err(anyhow::Error::new(source).context(format!(
                "Review failed at pass {} before any pass completed",
                pass
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let output_dir = config.output_dir(args.output_dir.as_deref());
    let format = args.output_format.unwrap_or(config.toml.output.format);
    let path = write_review(&result, &output_dir, format)?;

    println!();
    println!("Review saved to {}", path.display());
    println!("Estimated cost: {}", format_cost(result.cost.estimated_cost));
    if !result.status.is_complete() {
        println!("Review is {}", result.status);
    }
    Ok(())
}

/// Ask before running more than one pass unless the user opted in.
fn confirm_multi_pass(
    cli: &Cli,
    args: &ReviewArgs,
    config: &ai_code_review::config::Config,
    setup: &ReviewSetup,
) -> Result<bool> {
    use ai_code_review::cost::format_cost;
    use dialoguer::Confirm;

    let passes = setup.plan.pass_count();
    if passes <= 1
        || args.force_single_pass
        || args.multi_pass
        || cli.yes
        || config.toml.multi_pass.auto_confirm
    {
        return Ok(true);
    }

    let prompt = format!(
        "{} tokens exceed the usable window of {}; review in {} passes (estimated {})?",
        setup.analysis.estimated_total_tokens,
        setup.plan.usable_tokens_per_pass,
        passes,
        format_cost(estimated_plan_cost(setup))
    );
    if !console::user_attended() {
        anyhow::bail!(
            "{} Non-interactive runs must pass --multi-pass (or --yes).",
            prompt.trim_end_matches('?')
        );
    }
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact()
        .unwrap_or(false))
}
