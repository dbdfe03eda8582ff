//! In-memory provider that replays scripted responses, for tests.

use super::{Generation, GenerationError, GenerationProvider};
use crate::models::ProviderKind;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

type Scripted = (Option<Duration>, Result<Generation, GenerationError>);

/// Replays queued results in order and records every call.
///
/// An exhausted script answers with `ProviderUnavailable`. Entries queued
/// with [`ScriptedProvider::push_delayed`] sleep before answering.
pub struct ScriptedProvider {
    kind: ProviderKind,
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response with token counts derived from lengths.
    pub fn push_ok(&self, text: impl Into<String>) {
        let text = text.into();
        let output_tokens = (text.len() as u64).div_ceil(4);
        self.push(Ok(Generation {
            text,
            input_tokens: 1_000,
            output_tokens,
        }));
    }

    pub fn push_err(&self, error: GenerationError) {
        self.push(Err(error));
    }

    pub fn push(&self, result: Result<Generation, GenerationError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back((None, result));
        }
    }

    /// Queue a result that is only returned after `delay`.
    pub fn push_delayed(&self, delay: Duration, result: Result<Generation, GenerationError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back((Some(delay), result));
        }
    }

    /// Model names of every call so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.iter().map(|(model, _)| model.clone()).collect())
            .unwrap_or_default()
    }

    /// Prompts of every call so far.
    pub fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.iter().map(|(_, prompt)| prompt.clone()).collect())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn generate(&self, prompt: &str, model: &str) -> Result<Generation, GenerationError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((model.to_string(), prompt.to_string()));
        }
        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());
        match next {
            Some((Some(delay), result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            Some((None, result)) => result,
            None => Err(GenerationError::ProviderUnavailable(
                "scripted provider has no responses left".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_then_exhausts() {
        let provider = ScriptedProvider::new(ProviderKind::Gemini);
        provider.push_ok("first");
        provider.push_err(GenerationError::AuthFailure("bad key".into()));

        assert_eq!(provider.generate("p1", "m").await.unwrap().text, "first");
        assert!(matches!(
            provider.generate("p2", "m").await,
            Err(GenerationError::AuthFailure(_))
        ));
        assert!(matches!(
            provider.generate("p3", "m").await,
            Err(GenerationError::ProviderUnavailable(_))
        ));
        assert_eq!(provider.call_count(), 3);
        assert_eq!(provider.prompts(), vec!["p1", "p2", "p3"]);
    }
}
