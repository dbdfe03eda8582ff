//! Built-in model table.
//!
//! Prices are USD per million tokens. Gemini Pro models bill prompts above
//! 200k tokens at a higher tier.

use super::{ModelInfo, ModelRegistry, ProviderKind};
use crate::cost::{ModelPricing, PricingTier};
use std::collections::BTreeMap;

struct Entry {
    provider: ProviderKind,
    name: &'static str,
    api_name: &'static str,
    display_name: &'static str,
    context_window: usize,
    pricing: PricingSpec,
    deprecated: bool,
    retiring: Option<&'static str>,
    fallback: Option<&'static str>,
}

#[derive(Clone, Copy)]
enum PricingSpec {
    Flat(f64, f64),
    GeminiProTiered,
}

impl PricingSpec {
    fn to_pricing(self) -> ModelPricing {
        match self {
            Self::Flat(input, output) => ModelPricing::flat(input, output),
            Self::GeminiProTiered => ModelPricing::tiered(vec![
                PricingTier::new(0, 1.25, 10.0),
                PricingTier::new(200_000, 2.50, 15.0),
            ]),
        }
    }
}

const BUILTIN: &[Entry] = &[
    // Gemini
    Entry {
        provider: ProviderKind::Gemini,
        name: "gemini-2.5-pro",
        api_name: "gemini-2.5-pro",
        display_name: "Gemini 2.5 Pro",
        context_window: 1_000_000,
        pricing: PricingSpec::GeminiProTiered,
        deprecated: false,
        retiring: None,
        fallback: Some("gemini:gemini-2.5-flash"),
    },
    Entry {
        provider: ProviderKind::Gemini,
        name: "gemini-2.5-flash",
        api_name: "gemini-2.5-flash",
        display_name: "Gemini 2.5 Flash",
        context_window: 1_000_000,
        pricing: PricingSpec::Flat(0.30, 2.50),
        deprecated: false,
        retiring: None,
        fallback: Some("gemini:gemini-2.5-flash-lite"),
    },
    Entry {
        provider: ProviderKind::Gemini,
        name: "gemini-2.5-flash-lite",
        api_name: "gemini-2.5-flash-lite",
        display_name: "Gemini 2.5 Flash-Lite",
        context_window: 1_000_000,
        pricing: PricingSpec::Flat(0.10, 0.40),
        deprecated: false,
        retiring: None,
        fallback: None,
    },
    Entry {
        provider: ProviderKind::Gemini,
        name: "gemini-2.0-flash",
        api_name: "gemini-2.0-flash",
        display_name: "Gemini 2.0 Flash",
        context_window: 1_000_000,
        pricing: PricingSpec::Flat(0.10, 0.40),
        deprecated: true,
        retiring: Some("superseded by gemini-2.5-flash"),
        fallback: None,
    },
    // Anthropic
    Entry {
        provider: ProviderKind::Anthropic,
        name: "claude-opus-4",
        api_name: "claude-opus-4-20250514",
        display_name: "Claude Opus 4",
        context_window: 200_000,
        pricing: PricingSpec::Flat(15.0, 75.0),
        deprecated: false,
        retiring: None,
        fallback: Some("anthropic:claude-sonnet-4"),
    },
    Entry {
        provider: ProviderKind::Anthropic,
        name: "claude-sonnet-4",
        api_name: "claude-sonnet-4-20250514",
        display_name: "Claude Sonnet 4",
        context_window: 200_000,
        pricing: PricingSpec::Flat(3.0, 15.0),
        deprecated: false,
        retiring: None,
        fallback: Some("anthropic:claude-3-5-haiku"),
    },
    Entry {
        provider: ProviderKind::Anthropic,
        name: "claude-3-5-haiku",
        api_name: "claude-3-5-haiku-20241022",
        display_name: "Claude 3.5 Haiku",
        context_window: 200_000,
        pricing: PricingSpec::Flat(0.80, 4.0),
        deprecated: false,
        retiring: None,
        fallback: None,
    },
    Entry {
        provider: ProviderKind::Anthropic,
        name: "claude-3-opus",
        api_name: "claude-3-opus-20240229",
        display_name: "Claude 3 Opus",
        context_window: 200_000,
        pricing: PricingSpec::Flat(15.0, 75.0),
        deprecated: true,
        retiring: Some("2026-01-05"),
        fallback: Some("anthropic:claude-sonnet-4"),
    },
    // OpenAI
    Entry {
        provider: ProviderKind::OpenAi,
        name: "gpt-4.1",
        api_name: "gpt-4.1",
        display_name: "GPT-4.1",
        context_window: 1_047_576,
        pricing: PricingSpec::Flat(2.0, 8.0),
        deprecated: false,
        retiring: None,
        fallback: Some("openai:gpt-4.1-mini"),
    },
    Entry {
        provider: ProviderKind::OpenAi,
        name: "gpt-4.1-mini",
        api_name: "gpt-4.1-mini",
        display_name: "GPT-4.1 mini",
        context_window: 1_047_576,
        pricing: PricingSpec::Flat(0.40, 1.60),
        deprecated: false,
        retiring: None,
        fallback: None,
    },
    Entry {
        provider: ProviderKind::OpenAi,
        name: "gpt-4o",
        api_name: "gpt-4o",
        display_name: "GPT-4o",
        context_window: 128_000,
        pricing: PricingSpec::Flat(2.50, 10.0),
        deprecated: false,
        retiring: None,
        fallback: Some("openai:gpt-4o-mini"),
    },
    Entry {
        provider: ProviderKind::OpenAi,
        name: "gpt-4o-mini",
        api_name: "gpt-4o-mini",
        display_name: "GPT-4o mini",
        context_window: 128_000,
        pricing: PricingSpec::Flat(0.15, 0.60),
        deprecated: false,
        retiring: None,
        fallback: None,
    },
    Entry {
        provider: ProviderKind::OpenAi,
        name: "o3",
        api_name: "o3",
        display_name: "o3",
        context_window: 200_000,
        pricing: PricingSpec::Flat(2.0, 8.0),
        deprecated: false,
        retiring: None,
        fallback: Some("openai:gpt-4.1"),
    },
    // OpenRouter
    Entry {
        provider: ProviderKind::OpenRouter,
        name: "anthropic/claude-sonnet-4",
        api_name: "anthropic/claude-sonnet-4",
        display_name: "Claude Sonnet 4 (OpenRouter)",
        context_window: 200_000,
        pricing: PricingSpec::Flat(3.0, 15.0),
        deprecated: false,
        retiring: None,
        fallback: None,
    },
    Entry {
        provider: ProviderKind::OpenRouter,
        name: "google/gemini-2.5-pro",
        api_name: "google/gemini-2.5-pro",
        display_name: "Gemini 2.5 Pro (OpenRouter)",
        context_window: 1_000_000,
        pricing: PricingSpec::GeminiProTiered,
        deprecated: false,
        retiring: None,
        fallback: None,
    },
    Entry {
        provider: ProviderKind::OpenRouter,
        name: "openai/gpt-4o",
        api_name: "openai/gpt-4o",
        display_name: "GPT-4o (OpenRouter)",
        context_window: 128_000,
        pricing: PricingSpec::Flat(2.50, 10.0),
        deprecated: false,
        retiring: None,
        fallback: None,
    },
];

impl Entry {
    fn to_info(&self) -> ModelInfo {
        ModelInfo {
            id: format!("{}:{}", self.provider, self.name),
            provider: self.provider,
            api_name: self.api_name.to_string(),
            display_name: self.display_name.to_string(),
            context_window: self.context_window,
            pricing: self.pricing.to_pricing(),
            deprecated: self.deprecated,
            retiring: self.retiring.map(str::to_string),
            fallback: self.fallback.map(str::to_string),
            registered: true,
        }
    }
}

/// In-memory registry keyed by full model identifier.
#[derive(Debug, Clone, Default)]
pub struct StaticModelRegistry {
    models: BTreeMap<String, ModelInfo>,
}

impl StaticModelRegistry {
    /// Registry with no entries; populate with [`Self::with_model`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry populated from the built-in table.
    pub fn builtin() -> Self {
        BUILTIN
            .iter()
            .fold(Self::empty(), |registry, entry| registry.with_model(entry.to_info()))
    }

    pub fn with_model(mut self, info: ModelInfo) -> Self {
        self.models.insert(info.id.clone(), info);
        self
    }

    /// Models for one provider, in identifier order.
    pub fn for_provider(&self, provider: ProviderKind) -> Vec<ModelInfo> {
        self.models
            .values()
            .filter(|m| m.provider == provider)
            .cloned()
            .collect()
    }
}

impl ModelRegistry for StaticModelRegistry {
    fn lookup(&self, id: &str) -> Option<ModelInfo> {
        self.models.get(id.trim()).cloned()
    }

    fn models(&self) -> Vec<ModelInfo> {
        self.models.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_contains_every_provider() {
        let registry = StaticModelRegistry::builtin();
        for provider in ProviderKind::ALL {
            assert!(
                !registry.for_provider(provider).is_empty(),
                "no models for {}",
                provider
            );
        }
    }

    #[test]
    fn test_lookup_known_model() {
        let registry = StaticModelRegistry::builtin();
        let info = registry.lookup("anthropic:claude-sonnet-4").unwrap();
        assert_eq!(info.context_window, 200_000);
        assert_eq!(info.api_name, "claude-sonnet-4-20250514");
        assert!(!info.deprecated);
    }

    #[test]
    fn test_gemini_pro_is_tiered() {
        let registry = StaticModelRegistry::builtin();
        let info = registry.lookup("gemini:gemini-2.5-pro").unwrap();
        assert!(info.pricing.is_tiered());
        assert_eq!(info.pricing.base_rates(), (1.25, 10.0));
    }

    #[test]
    fn test_fallbacks_resolve_to_registered_models() {
        let registry = StaticModelRegistry::builtin();
        for model in registry.models() {
            if let Some(fallback) = model.fallback {
                assert!(
                    registry.lookup(&fallback).is_some(),
                    "{} falls back to unknown {}",
                    model.id,
                    fallback
                );
            }
        }
    }

    #[test]
    fn test_resolve_unknown_model_uses_placeholder() {
        let registry = StaticModelRegistry::builtin();
        let info = registry.resolve("openai:gpt-next").unwrap();
        assert!(!info.registered);
        assert_eq!(info.api_name, "gpt-next");
        assert!(registry.resolve("not-a-model").is_err());
    }

    #[test]
    fn test_deprecated_models_flagged() {
        let registry = StaticModelRegistry::builtin();
        let info = registry.lookup("anthropic:claude-3-opus").unwrap();
        assert!(info.deprecated);
        assert!(info.lifecycle_warning().is_some());
    }
}
