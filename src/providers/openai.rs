//! OpenAI-compatible chat completions client, used for OpenAI and OpenRouter.

use super::{Generation, GenerationError, GenerationProvider, http_client, send_json};
use crate::models::ProviderKind;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

pub struct OpenAiProvider {
    kind: ProviderKind,
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn openai(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self::with_kind(ProviderKind::OpenAi, OPENAI_BASE_URL, api_key, timeout)
    }

    pub fn openrouter(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self::with_kind(
            ProviderKind::OpenRouter,
            OPENROUTER_BASE_URL,
            api_key,
            timeout,
        )
    }

    fn with_kind(
        kind: ProviderKind,
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            kind,
            client: http_client(timeout),
            api_key: api_key.into(),
            base_url: base_url.to_string(),
            timeout,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl ChatResponse {
    fn into_generation(self) -> Result<Generation, GenerationError> {
        let text = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if text.is_empty() {
            return Err(GenerationError::ProviderUnavailable(
                "Chat completion returned no content".to_string(),
            ));
        }
        Ok(Generation {
            text,
            input_tokens: self.usage.prompt_tokens,
            output_tokens: self.usage.completion_tokens,
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn generate(&self, prompt: &str, model: &str) -> Result<Generation, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}]
        });
        let mut request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);
        if self.kind == ProviderKind::OpenRouter {
            request = request.header("X-Title", "ai-code-review");
        }

        let response: ChatResponse = send_json(request, self.timeout).await?;
        response.into_generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let json = r#"{
            "choices": [{"message": {"role": "assistant", "content": "done"}}],
            "usage": {"prompt_tokens": 50, "completion_tokens": 5, "total_tokens": 55}
        }"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        let generation = response.into_generation().unwrap();
        assert_eq!(generation.text, "done");
        assert_eq!(generation.input_tokens, 50);
        assert_eq!(generation.output_tokens, 5);
    }

    #[test]
    fn test_kinds() {
        let timeout = Duration::from_secs(5);
        assert_eq!(OpenAiProvider::openai("k", timeout).kind(), ProviderKind::OpenAi);
        assert_eq!(
            OpenAiProvider::openrouter("k", timeout).kind(),
            ProviderKind::OpenRouter
        );
    }
}
