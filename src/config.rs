use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::orchestrator::CheckpointStore;
use crate::review_config::{CONFIG_DIR, DEFAULT_MODEL, ReviewToml};

/// Environment variable naming the analysis model.
pub const MODEL_ENV: &str = "AI_CODE_REVIEW_MODEL";
/// Environment variable naming the consolidation model.
pub const WRITER_MODEL_ENV: &str = "AI_CODE_REVIEW_WRITER_MODEL";

/// Runtime configuration for a command.
///
/// Layers the config file, environment variables and CLI flags. Accessors
/// taking a `cli` argument apply precedence CLI → environment → file →
/// default.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub toml: ReviewToml,
    /// Config file that was loaded, if any.
    pub config_file: Option<PathBuf>,
    pub verbose: bool,
    pub yes: bool,
}

impl Config {
    pub fn new(project_dir: PathBuf, verbose: bool, yes: bool) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let (toml, config_file) = ReviewToml::discover(&project_dir)?;
        Ok(Self {
            project_dir,
            toml,
            config_file,
            verbose,
            yes,
        })
    }

    /// Build from an already-parsed config, skipping discovery.
    pub fn from_toml(project_dir: PathBuf, toml: ReviewToml) -> Self {
        Self {
            project_dir,
            toml,
            config_file: None,
            verbose: false,
            yes: false,
        }
    }

    /// Name of the project directory.
    pub fn project_name(&self) -> String {
        self.project_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    }

    pub fn state_dir(&self) -> PathBuf {
        self.project_dir.join(CONFIG_DIR)
    }

    pub fn model_id(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| env_value(MODEL_ENV))
            .or_else(|| self.toml.model.name.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn writer_model_id(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| env_value(WRITER_MODEL_ENV))
            .or_else(|| self.toml.model.writer.clone())
    }

    pub fn fallback_model_id(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| self.toml.model.fallback.clone())
    }

    pub fn context_maintenance_factor(&self, cli: Option<f64>) -> f64 {
        cli.unwrap_or(self.toml.multi_pass.context_maintenance_factor)
    }

    pub fn batch_token_limit(&self, cli: Option<usize>) -> Option<usize> {
        cli.or(self.toml.multi_pass.batch_token_limit)
    }

    pub fn include_tests(&self, cli: bool) -> bool {
        cli || self.toml.files.include_tests
    }

    /// Output directory, resolved against the project directory.
    pub fn output_dir(&self, cli: Option<&Path>) -> PathBuf {
        let dir = cli.unwrap_or(&self.toml.output.directory);
        self.resolve(dir)
    }

    /// Prompt override directory, if configured.
    pub fn prompts_dir(&self) -> Option<PathBuf> {
        self.toml.prompts.directory.as_deref().map(|d| self.resolve(d))
    }

    pub fn checkpoint_store(&self) -> CheckpointStore {
        CheckpointStore::for_project(&self.project_dir)
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }
}

/// Non-empty value of an environment variable.
pub fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn config_with(toml: &str) -> Config {
        Config::from_toml(
            PathBuf::from("/work/demo"),
            ReviewToml::parse(toml).unwrap(),
        )
    }

    #[test]
    fn test_cli_overrides_file() {
        let config = config_with(
            "[model]\nwriter = \"gemini:gemini-2.5-pro\"\nfallback = \"gemini:gemini-2.5-flash\"\n[multi_pass]\ncontext_maintenance_factor = 0.3\nbatch_token_limit = 1000",
        );
        assert_eq!(
            config.writer_model_id(Some("openai:gpt-4.1")).as_deref(),
            Some("openai:gpt-4.1")
        );
        assert_eq!(
            config.fallback_model_id(None).as_deref(),
            Some("gemini:gemini-2.5-flash")
        );
        assert_eq!(config.context_maintenance_factor(None), 0.3);
        assert_eq!(config.context_maintenance_factor(Some(0.1)), 0.1);
        assert_eq!(config.batch_token_limit(None), Some(1000));
        assert_eq!(config.batch_token_limit(Some(5)), Some(5));
        assert_eq!(
            config.model_id(Some("anthropic:claude-sonnet-4")),
            "anthropic:claude-sonnet-4"
        );
    }

    #[test]
    fn test_paths_resolve_against_project() {
        let config = config_with("[output]\ndirectory = \"reviews\"\n[prompts]\ndirectory = \"/opt/prompts\"");
        assert_eq!(config.project_name(), "demo");
        assert_eq!(config.output_dir(None), PathBuf::from("/work/demo/reviews"));
        assert_eq!(
            config.output_dir(Some(Path::new("/tmp/out"))),
            PathBuf::from("/tmp/out")
        );
        assert_eq!(config.prompts_dir(), Some(PathBuf::from("/opt/prompts")));
        assert_eq!(
            config.checkpoint_store().path(),
            Path::new("/work/demo/.ai-review/checkpoint.json")
        );
    }

    #[test]
    fn test_new_loads_project_config() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".ai-review")).unwrap();
        fs::write(
            dir.path().join(".ai-review/config.toml"),
            "[files]\ninclude_tests = true",
        )
        .unwrap();
        let config = Config::new(dir.path().to_path_buf(), true, false).unwrap();
        assert!(config.verbose);
        assert!(config.include_tests(false));
        assert_eq!(config.project_dir, dir.path().canonicalize().unwrap());
        assert!(config.config_file.is_some());
    }

    #[test]
    fn test_new_missing_dir_is_error() {
        let dir = tempdir().unwrap();
        let result = Config::new(dir.path().join("missing"), false, false);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to resolve project directory")
        );
    }
}
