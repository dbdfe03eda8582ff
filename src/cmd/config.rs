//! Configuration view and validation commands: `ai-code-review config`.

use anyhow::Result;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use ai_code_review::config::Config;
    use ai_code_review::review_config::ReviewToml;

    let config_path = ReviewToml::project_path(project_dir);

    match command {
        None | Some(ConfigCommands::Show) => {
            let config = Config::new(project_dir.to_path_buf(), false, false)?;
            println!();
            println!("ai-code-review Configuration");
            println!("============================");
            println!();
            match &config.config_file {
                Some(path) => println!("Config file: {}", path.display()),
                None => println!("No config file found; using defaults"),
            }
            println!();

            let rendered = toml::to_string_pretty(&config.toml)?;
            println!("{}", rendered.trim_end());
            println!();

            println!("Effective values (with env overrides):");
            println!("  model = \"{}\"", config.model_id(None));
            match config.writer_model_id(None) {
                Some(writer) => println!("  writer = \"{}\"", writer),
                None => println!("  writer = (analysis model)"),
            }
            println!("  output = \"{}\"", config.output_dir(None).display());
            println!("  checkpoint = \"{}\"", config.checkpoint_store().path().display());
            println!();
            if config.config_file.is_none() {
                println!("Run 'ai-code-review config init' to create a config file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let (toml, source) = ReviewToml::discover(project_dir)?;
            let Some(source) = source else {
                println!("No config file found. Using defaults (valid).");
                return Ok(());
            };
            let warnings = toml.validate();
            if warnings.is_empty() {
                println!("Configuration is valid: {}", source.display());
            } else {
                println!("Configuration warnings in {}:", source.display());
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("config.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            ReviewToml::default().save(&config_path)?;

            println!("Created config.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [model] name, writer, fallback");
            println!("  - [multi_pass] context_maintenance_factor, batch_token_limit");
            println!("  - [retry] attempts, delays and pass timeout");
            println!("  - [files] include_tests, exclude");
            println!();
        }
    }

    Ok(())
}
