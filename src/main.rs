use ai_code_review::output::OutputFormat;
use ai_code_review::review::ReviewType;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "ai-code-review")]
#[command(
    version,
    about = "AI-powered code review across Gemini, Anthropic, OpenAI and OpenRouter"
)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Review files or directories with an AI model
    Review(ReviewArgs),
    /// Estimate tokens, passes and cost without calling a model
    Estimate(EstimateArgs),
    /// List supported models
    Models {
        /// Only this provider (gemini, anthropic, openai, openrouter)
        #[arg(short, long)]
        provider: Option<String>,

        /// Include deprecated models
        #[arg(long)]
        all: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Args)]
pub struct ReviewArgs {
    /// Files or directories to review (defaults to the project directory)
    pub targets: Vec<PathBuf>,

    /// Review type
    #[arg(short = 't', long = "type", default_value = "quick-fixes")]
    pub review_type: ReviewType,

    /// Analysis model, provider:model-name
    #[arg(short, long)]
    pub model: Option<String>,

    /// Model that consolidates multi-pass output
    #[arg(long)]
    pub writer_model: Option<String>,

    /// Model tried when rate limits persist
    #[arg(long)]
    pub fallback_model: Option<String>,

    /// Run multiple passes without asking
    #[arg(long, conflicts_with = "force_single_pass")]
    pub multi_pass: bool,

    /// Review everything in one pass even if it exceeds the context window
    #[arg(long)]
    pub force_single_pass: bool,

    /// Share of each context window reserved for carried context (0.0-1.0)
    #[arg(long)]
    pub context_maintenance_factor: Option<f64>,

    /// Maximum file tokens per pass
    #[arg(long)]
    pub batch_token_limit: Option<usize>,

    /// Include test files
    #[arg(long)]
    pub include_tests: bool,

    #[arg(long, value_enum)]
    pub output_format: Option<OutputFormat>,

    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Continue an interrupted multi-pass review
    #[arg(long)]
    pub resume: bool,

    /// Retries per pass after the first attempt
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Timeout per generation call, in seconds
    #[arg(long)]
    pub pass_timeout: Option<u64>,
}

#[derive(Args)]
pub struct EstimateArgs {
    /// Files or directories to estimate (defaults to the project directory)
    pub targets: Vec<PathBuf>,

    #[arg(short = 't', long = "type", default_value = "quick-fixes")]
    pub review_type: ReviewType,

    #[arg(short, long)]
    pub model: Option<String>,

    #[arg(long)]
    pub context_maintenance_factor: Option<f64>,

    #[arg(long)]
    pub batch_token_limit: Option<usize>,

    #[arg(long)]
    pub include_tests: bool,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default config.toml file
    Init,
}

/// Logs go to stderr so stdout stays clean for results.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Review(args) => cmd::cmd_review(&cli, project_dir, args).await?,
        Commands::Estimate(args) => cmd::cmd_estimate(&cli, project_dir, args).await?,
        Commands::Models { provider, all } => cmd::cmd_models(provider.as_deref(), *all)?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
