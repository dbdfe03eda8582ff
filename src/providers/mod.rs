//! Model providers behind one async trait.
//!
//! Each provider turns a prompt into a [`Generation`] or a typed
//! [`GenerationError`]. Providers are selected once at startup into a
//! [`ProviderRouter`]; the orchestrator never branches on provider kind.

mod anthropic;
mod gemini;
pub mod mock;
mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use mock::ScriptedProvider;
pub use openai::OpenAiProvider;

pub use crate::errors::GenerationError;

use crate::models::{ModelInfo, ProviderKind};
use crate::util::truncate_at_char_boundary;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Longest provider error body kept in error messages.
const MAX_ERROR_BODY: usize = 500;

/// Output of one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A model API.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Send `prompt` to `model` (the provider's API model name).
    async fn generate(&self, prompt: &str, model: &str) -> Result<Generation, GenerationError>;
}

/// Dispatches generation calls to the provider owning each model.
#[derive(Clone, Default)]
pub struct ProviderRouter {
    providers: HashMap<ProviderKind, Arc<dyn GenerationProvider>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` for its own kind.
    pub fn with_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.insert(provider.kind(), provider);
        self
    }

    pub fn insert(&mut self, kind: ProviderKind, provider: Arc<dyn GenerationProvider>) {
        self.providers.insert(kind, provider);
    }

    pub fn has(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    pub async fn generate(
        &self,
        prompt: &str,
        model: &ModelInfo,
    ) -> Result<Generation, GenerationError> {
        let provider = self.providers.get(&model.provider).ok_or_else(|| {
            GenerationError::AuthFailure(format!(
                "No {} provider configured; set {}",
                model.provider,
                api_key_env_vars(model.provider).join(" or ")
            ))
        })?;
        tracing::debug!(
            model = %model.id,
            prompt_bytes = prompt.len(),
            "Sending generation request"
        );
        provider.generate(prompt, &model.api_name).await
    }
}

/// Environment variables checked for a provider's API key, in order.
pub fn api_key_env_vars(kind: ProviderKind) -> &'static [&'static str] {
    match kind {
        ProviderKind::Gemini => &[
            "AI_CODE_REVIEW_GOOGLE_API_KEY",
            "GOOGLE_API_KEY",
            "GEMINI_API_KEY",
        ],
        ProviderKind::Anthropic => &["AI_CODE_REVIEW_ANTHROPIC_API_KEY", "ANTHROPIC_API_KEY"],
        ProviderKind::OpenAi => &["AI_CODE_REVIEW_OPENAI_API_KEY", "OPENAI_API_KEY"],
        ProviderKind::OpenRouter => &["AI_CODE_REVIEW_OPENROUTER_API_KEY", "OPENROUTER_API_KEY"],
    }
}

/// First non-empty API key for `kind` in the environment.
pub fn api_key_for(kind: ProviderKind) -> Option<String> {
    api_key_env_vars(kind)
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
}

/// Build the HTTP provider for `kind`.
pub fn create_provider(
    kind: ProviderKind,
    api_key: String,
    timeout: Duration,
) -> Arc<dyn GenerationProvider> {
    match kind {
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(api_key, timeout)),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(api_key, timeout)),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::openai(api_key, timeout)),
        ProviderKind::OpenRouter => Arc::new(OpenAiProvider::openrouter(api_key, timeout)),
    }
}

/// Router with every provider whose API key is set.
pub fn router_from_env(timeout: Duration) -> ProviderRouter {
    ProviderKind::ALL
        .into_iter()
        .fold(ProviderRouter::new(), |router, kind| match api_key_for(kind) {
            Some(key) => router.with_provider(create_provider(kind, key, timeout)),
            None => router,
        })
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Map an HTTP error status to a generation error.
pub(crate) fn classify_status(
    status: reqwest::StatusCode,
    retry_after: Option<Duration>,
    body: &str,
    timeout: Duration,
) -> GenerationError {
    let message = format!(
        "HTTP {}: {}",
        status.as_u16(),
        truncate_at_char_boundary(body.trim(), MAX_ERROR_BODY)
    );
    match status.as_u16() {
        429 => GenerationError::RateLimited {
            message,
            retry_after,
        },
        401 | 403 => GenerationError::AuthFailure(message),
        408 | 504 => GenerationError::Timeout(timeout),
        _ => GenerationError::ProviderUnavailable(message),
    }
}

pub(crate) fn classify_transport(error: reqwest::Error, timeout: Duration) -> GenerationError {
    if error.is_timeout() {
        GenerationError::Timeout(timeout)
    } else {
        GenerationError::ProviderUnavailable(error.to_string())
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Send a JSON request and decode a JSON response, classifying failures.
pub(crate) async fn send_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<T, GenerationError> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_transport(e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(status, retry_after, &body, timeout));
    }

    response.json::<T>().await.map_err(|e| {
        GenerationError::ProviderUnavailable(format!("Malformed provider response: {}", e))
    })
}
