//! Model registry listing: `ai-code-review models`.

use anyhow::Result;
use console::style;

pub fn cmd_models(provider: Option<&str>, all: bool) -> Result<()> {
    use ai_code_review::cost::format_cost;
    use ai_code_review::models::{ProviderKind, StaticModelRegistry};
    use ai_code_review::providers::api_key_for;

    let registry = StaticModelRegistry::builtin();
    let providers: Vec<ProviderKind> = match provider {
        Some(name) => vec![name.parse()?],
        None => ProviderKind::ALL.to_vec(),
    };

    for kind in providers {
        let mut models = registry.for_provider(kind);
        models.retain(|m| all || !m.deprecated);
        models.sort_by(|a, b| a.id.cmp(&b.id));

        let key_status = if api_key_for(kind).is_some() {
            style("API key set").green()
        } else {
            style("no API key").dim()
        };
        println!();
        println!("{} ({})", style(kind).bold(), key_status);
        if models.is_empty() {
            println!("  {}", style("no models").dim());
            continue;
        }
        for model in models {
            let (input, output) = model.pricing.base_rates();
            let mut notes = Vec::new();
            if model.pricing.is_tiered() {
                notes.push("tiered pricing".to_string());
            }
            if model.deprecated {
                notes.push(style("deprecated").red().to_string());
            }
            if let Some(retiring) = &model.retiring {
                notes.push(style(format!("retiring: {}", retiring)).yellow().to_string());
            }
            if let Some(fallback) = &model.fallback {
                notes.push(format!("fallback {}", fallback));
            }
            println!(
                "  {:<40} {:>9} ctx  {} / {} per 1M{}",
                model.id,
                model.context_window,
                format_cost(input),
                format_cost(output),
                if notes.is_empty() {
                    String::new()
                } else {
                    format!("  [{}]", notes.join(", "))
                }
            );
        }
    }
    if !all {
        println!();
        println!("{}", style("Deprecated models hidden; use --all to show them").dim());
    }
    Ok(())
}
