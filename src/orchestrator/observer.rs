//! Progress notifications from the orchestrator.

use crate::cost::PassCost;
use crate::errors::GenerationError;
use crate::planner::ChunkPlan;
use crate::review::ReviewResult;
use std::time::Duration;

/// Receives progress events. Every method defaults to a no-op.
pub trait PassObserver: Send + Sync {
    fn on_plan(&self, _plan: &ChunkPlan) {}

    fn on_pass_start(&self, _pass: u32, _total: u32, _files: &[String]) {}

    fn on_retry(&self, _pass: u32, _attempt: u32, _error: &GenerationError, _delay: Duration) {}

    fn on_fallback(&self, _pass: u32, _model: &str) {}

    fn on_pass_complete(&self, _pass: u32, _cost: &PassCost) {}

    fn on_pass_failed(&self, _pass: u32, _error: &GenerationError) {}

    fn on_consolidation_start(&self, _model: &str, _partials: usize) {}

    fn on_consolidation_complete(&self, _consolidated: bool) {}

    fn on_finish(&self, _result: &ReviewResult) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PassObserver for NoopObserver {}
