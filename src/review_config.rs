//! Unified configuration file for ai-code-review.
//!
//! Read from `.ai-review/config.toml` in the project, or from
//! `~/.config/ai-code-review/config.toml` when the project has none.
//! Every section and key is optional.
//!
//! # Configuration File Format
//!
//! ```toml
//! [model]
//! name = "gemini:gemini-2.5-pro"
//! writer = "anthropic:claude-sonnet-4"
//! fallback = "gemini:gemini-2.5-flash"
//!
//! [multi_pass]
//! context_maintenance_factor = 0.15
//! batch_token_limit = 200000
//! auto_confirm = false
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_secs = 2
//! max_delay_secs = 60
//! pass_timeout_secs = 300
//!
//! [tokens]
//! bytes_per_token = 3.5
//! context_window = 500000
//!
//! [files]
//! include_tests = false
//! exclude = ["**/generated/**", "*.min.js"]
//!
//! [output]
//! directory = "ai-code-review-docs"
//! format = "markdown"
//!
//! [prompts]
//! directory = ".ai-review/prompts"
//! ```

use crate::models::ModelId;
use crate::orchestrator::{DEFAULT_PASS_TIMEOUT, RetryPolicy};
use crate::output::{DEFAULT_OUTPUT_DIR, OutputFormat};
use crate::planner::DEFAULT_CONTEXT_MAINTENANCE_FACTOR;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory holding per-project state and configuration.
pub const CONFIG_DIR: &str = ".ai-review";

/// Config file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// Model used when neither config, environment nor CLI name one.
pub const DEFAULT_MODEL: &str = "gemini:gemini-2.5-pro";

/// Model selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSection {
    /// Analysis model, `provider:model-name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Model that consolidates multi-pass output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writer: Option<String>,
    /// Model tried once a pass exhausts its retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

/// Multi-pass planning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiPassSection {
    /// Share of each context window reserved for carried-over context.
    #[serde(default = "default_context_maintenance_factor")]
    pub context_maintenance_factor: f64,
    /// Upper bound on tokens per pass, below the usable window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_token_limit: Option<usize>,
    /// Run multi-pass reviews without asking.
    #[serde(default)]
    pub auto_confirm: bool,
}

fn default_context_maintenance_factor() -> f64 {
    DEFAULT_CONTEXT_MAINTENANCE_FACTOR
}

impl Default for MultiPassSection {
    fn default() -> Self {
        Self {
            context_maintenance_factor: default_context_maintenance_factor(),
            batch_token_limit: None,
            auto_confirm: false,
        }
    }
}

/// Retry and timeout settings for generation calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    #[serde(default = "default_pass_timeout_secs")]
    pub pass_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_secs() -> u64 {
    2
}

fn default_max_delay_secs() -> u64 {
    60
}

fn default_pass_timeout_secs() -> u64 {
    DEFAULT_PASS_TIMEOUT.as_secs()
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_secs: default_initial_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            pass_timeout_secs: default_pass_timeout_secs(),
        }
    }
}

impl RetrySection {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_secs(self.initial_delay_secs),
            max_delay: Duration::from_secs(self.max_delay_secs),
            ..RetryPolicy::default()
        }
    }

    pub fn pass_timeout(&self) -> Duration {
        Duration::from_secs(self.pass_timeout_secs)
    }
}

/// Token estimation overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokensSection {
    /// Replaces the provider's bytes-per-token ratio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_per_token: Option<f64>,
    /// Replaces the model's context window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<usize>,
}

/// File discovery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilesSection {
    #[serde(default)]
    pub include_tests: bool,
    /// Glob patterns matched against project-relative paths.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            format: OutputFormat::default(),
        }
    }
}

/// Prompt template overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptsSection {
    /// Directory of `<review-type>.md` templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

/// The complete config.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewToml {
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub multi_pass: MultiPassSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub tokens: TokensSection,
    #[serde(default)]
    pub files: FilesSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub prompts: PromptsSection,
}

impl ReviewToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config.toml")
    }

    /// Project config path, if the project has one.
    pub fn project_path(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// User-level config path under the platform config directory.
    pub fn user_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ai-code-review").join(CONFIG_FILE))
    }

    /// Load the project config, then the user config, then defaults.
    ///
    /// Returns the path that was loaded, if any.
    pub fn discover(project_dir: &Path) -> Result<(Self, Option<PathBuf>)> {
        let candidates = std::iter::once(Self::project_path(project_dir)).chain(Self::user_path());
        for path in candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading config");
                return Ok((Self::load(&path)?, Some(path)));
            }
        }
        Ok((Self::default(), None))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Check values that parse but cannot work, returning warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (key, value) in [
            ("model.name", &self.model.name),
            ("model.writer", &self.model.writer),
            ("model.fallback", &self.model.fallback),
        ] {
            if let Some(id) = value
                && let Err(e) = ModelId::parse(id)
            {
                warnings.push(format!("Invalid {}: {}", key, e));
            }
        }

        let factor = self.multi_pass.context_maintenance_factor;
        if !(0.0..1.0).contains(&factor) {
            warnings.push(format!(
                "Invalid multi_pass.context_maintenance_factor {}: must be in [0, 1)",
                factor
            ));
        }
        if self.multi_pass.batch_token_limit == Some(0) {
            warnings.push("multi_pass.batch_token_limit must be greater than zero".to_string());
        }
        if self.retry.max_attempts == 0 {
            warnings.push("retry.max_attempts must be at least 1".to_string());
        }
        if self.retry.pass_timeout_secs == 0 {
            warnings.push("retry.pass_timeout_secs must be greater than zero".to_string());
        }
        if let Some(ratio) = self.tokens.bytes_per_token
            && !(ratio.is_finite() && ratio > 0.0)
        {
            warnings.push(format!("Invalid tokens.bytes_per_token {}", ratio));
        }
        if self.tokens.context_window == Some(0) {
            warnings.push("tokens.context_window must be greater than zero".to_string());
        }
        for pattern in &self.files.exclude {
            if let Err(e) = glob::Pattern::new(pattern) {
                warnings.push(format!("Invalid files.exclude pattern '{}': {}", pattern, e));
            }
        }

        warnings
    }
}
