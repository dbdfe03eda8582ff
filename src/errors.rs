//! Typed error hierarchy for the review core.
//!
//! One enum per subsystem:
//! - `PlanningError`: capacity-planning misconfiguration, fatal before any pass
//! - `ModelError`: malformed or unknown `provider:model` identifiers
//! - `CostError`: out-of-order cost accounting
//! - `GenerationError`: a single provider call failed
//! - `ReviewError`: orchestration failures surfaced to the caller

use std::time::Duration;
use thiserror::Error;

/// Errors raised while planning passes against a context window.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanningError {
    #[error("Context maintenance factor must be in [0, 1), got {0}")]
    InvalidMaintenanceFactor(f64),

    #[error("Context window must be greater than zero, got {0}")]
    InvalidContextWindow(usize),
}

/// Errors raised while parsing or resolving model identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Invalid model identifier '{0}': expected the form provider:model-name")]
    InvalidModelId(String),

    #[error("Unknown provider '{0}'. Valid providers: gemini, anthropic, openai, openrouter")]
    UnknownProvider(String),
}

/// Errors raised by the cost accountant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CostError {
    #[error("Pass {pass} recorded out of order (last recorded pass was {last})")]
    PassOutOfOrder { pass: u32, last: u32 },
}

/// Failure of a single model-generation call.
///
/// The orchestrator inspects the variant to decide between retrying,
/// falling back to another model, or aborting the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("Rate limited by provider: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),
}

impl GenerationError {
    /// Rate limits and timeouts are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Timeout(_))
    }

    /// Authentication and availability failures end the run.
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }

    /// Server-suggested wait before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Errors surfaced by the pass orchestrator.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("No files to review")]
    NoFiles,

    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error(transparent)]
    Cost(#[from] CostError),

    #[error("Pass {pass} failed and no earlier pass completed: {source}")]
    Fatal {
        pass: u32,
        #[source]
        source: GenerationError,
    },

    #[error("All {passes} passes failed after retries; last error (pass {pass}): {source}")]
    AllPassesFailed {
        passes: u32,
        pass: u32,
        #[source]
        source: GenerationError,
    },

    #[error("Invalid orchestrator transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
