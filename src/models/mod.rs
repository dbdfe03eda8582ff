//! Model identifiers, capabilities and the registry seam.
//!
//! Models are addressed as `provider:model-name`, e.g. `gemini:gemini-2.5-pro`
//! or `openrouter:anthropic/claude-sonnet-4`. The planner and cost accountant
//! only ever read from a [`ModelRegistry`]; the built-in table lives in
//! [`registry`].

pub mod registry;

use crate::cost::ModelPricing;
use crate::errors::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use registry::StaticModelRegistry;

/// Context window assumed for models missing from the registry.
pub const DEFAULT_CONTEXT_WINDOW: usize = 128_000;

/// AI provider backing a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "openrouter")]
    OpenRouter,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Gemini,
        ProviderKind::Anthropic,
        ProviderKind::OpenAi,
        ProviderKind::OpenRouter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "openrouter" => Ok(Self::OpenRouter),
            other => Err(ModelError::UnknownProvider(other.to_string())),
        }
    }
}

/// A parsed `provider:model-name` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelId {
    pub provider: ProviderKind,
    pub name: String,
}

impl ModelId {
    pub fn parse(id: &str) -> Result<Self, ModelError> {
        let (provider, name) = id
            .trim()
            .split_once(':')
            .ok_or_else(|| ModelError::InvalidModelId(id.to_string()))?;
        if name.trim().is_empty() {
            return Err(ModelError::InvalidModelId(id.to_string()));
        }
        Ok(Self {
            provider: provider.parse()?,
            name: name.trim().to_string(),
        })
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.name)
    }
}

impl FromStr for ModelId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Capabilities and pricing of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Full identifier, `provider:model-name`.
    pub id: String,
    pub provider: ProviderKind,
    /// Name sent to the provider API.
    pub api_name: String,
    pub display_name: String,
    /// Context window in tokens.
    pub context_window: usize,
    pub pricing: ModelPricing,
    #[serde(default)]
    pub deprecated: bool,
    /// Retirement notice, e.g. the announced shutdown date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retiring: Option<String>,
    /// Cheaper sibling used when rate limits persist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    /// Whether this entry came from the registry table.
    #[serde(default = "default_registered")]
    pub registered: bool,
}

fn default_registered() -> bool {
    true
}

impl ModelInfo {
    /// Placeholder for a model the registry does not know about.
    ///
    /// Uses a conservative context window and zero pricing.
    pub fn unregistered(id: &ModelId) -> Self {
        Self {
            id: id.to_string(),
            provider: id.provider,
            api_name: id.name.clone(),
            display_name: id.name.clone(),
            context_window: DEFAULT_CONTEXT_WINDOW,
            pricing: ModelPricing::free(),
            deprecated: false,
            retiring: None,
            fallback: None,
            registered: false,
        }
    }

    /// Warning text for deprecated or retiring models.
    pub fn lifecycle_warning(&self) -> Option<String> {
        match (&self.retiring, self.deprecated) {
            (Some(notice), _) => Some(format!("{} is retiring: {}", self.id, notice)),
            (None, true) => Some(format!(
                "{} is deprecated and may stop working; consider a newer model",
                self.id
            )),
            (None, false) => None,
        }
    }
}

/// Read-only lookup of model capabilities.
pub trait ModelRegistry: Send + Sync {
    /// Exact lookup by full identifier.
    fn lookup(&self, id: &str) -> Option<ModelInfo>;

    /// All known models.
    fn models(&self) -> Vec<ModelInfo>;

    /// Parse `id` and look it up, falling back to an unregistered placeholder.
    fn resolve(&self, id: &str) -> Result<ModelInfo, ModelError> {
        let parsed = ModelId::parse(id)?;
        match self.lookup(&parsed.to_string()) {
            Some(info) => Ok(info),
            None => {
                tracing::warn!(
                    model = %parsed,
                    context_window = DEFAULT_CONTEXT_WINDOW,
                    "Model not in registry; using conservative defaults and zero pricing"
                );
                Ok(ModelInfo::unregistered(&parsed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_id() {
        let id = ModelId::parse("gemini:gemini-2.5-pro").unwrap();
        assert_eq!(id.provider, ProviderKind::Gemini);
        assert_eq!(id.name, "gemini-2.5-pro");
        assert_eq!(id.to_string(), "gemini:gemini-2.5-pro");
    }

    #[test]
    fn test_parse_openrouter_id_keeps_slash() {
        let id: ModelId = "openrouter:anthropic/claude-sonnet-4".parse().unwrap();
        assert_eq!(id.provider, ProviderKind::OpenRouter);
        assert_eq!(id.name, "anthropic/claude-sonnet-4");
    }

    #[test]
    fn test_parse_model_id_errors() {
        assert_eq!(
            ModelId::parse("gpt-4o"),
            Err(ModelError::InvalidModelId("gpt-4o".into()))
        );
        assert_eq!(
            ModelId::parse("openai:"),
            Err(ModelError::InvalidModelId("openai:".into()))
        );
        assert_eq!(
            ModelId::parse("mistral:large"),
            Err(ModelError::UnknownProvider("mistral".into()))
        );
    }

    #[test]
    fn test_provider_aliases() {
        assert_eq!("google".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::OpenRouter.to_string(), "openrouter");
    }

    #[test]
    fn test_unregistered_model_defaults() {
        let id = ModelId::parse("openai:gpt-9").unwrap();
        let info = ModelInfo::unregistered(&id);
        assert!(!info.registered);
        assert_eq!(info.context_window, DEFAULT_CONTEXT_WINDOW);
        assert_eq!(info.pricing.cost(1_000_000, 1_000_000), 0.0);
    }

    #[test]
    fn test_lifecycle_warning() {
        let id = ModelId::parse("anthropic:claude-old").unwrap();
        let mut info = ModelInfo::unregistered(&id);
        assert!(info.lifecycle_warning().is_none());

        info.deprecated = true;
        assert!(info.lifecycle_warning().unwrap().contains("deprecated"));

        info.retiring = Some("2026-01-05".into());
        assert!(info.lifecycle_warning().unwrap().contains("2026-01-05"));
    }
}
