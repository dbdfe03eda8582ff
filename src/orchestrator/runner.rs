//! Multi-pass review execution.
//!
//! [`PassOrchestrator`] walks a [`ChunkPlan`] one chunk at a time. Each pass
//! gets the files of its chunk plus a digest of what earlier passes found;
//! its output is parsed and folded back into the [`ReviewContext`]. When two
//! or more passes succeed, a writer model merges the partial reviews.
//!
//! Failure handling per pass:
//! - rate limits and timeouts are retried with backoff, then tried once on
//!   the fallback model;
//! - a pass that still fails is recorded and the run moves on;
//! - authentication or availability failures stop the run. Completed passes
//!   are kept and returned as an incomplete review; with no completed pass
//!   the error is returned.
//!
//! Cancellation is checked between passes. A cancelled run returns what it
//! has, marked incomplete, without calling the writer model.

use super::checkpoint::{CHECKPOINT_VERSION, CheckpointStore, RunCheckpoint};
use super::observer::{NoopObserver, PassObserver};
use super::retry::RetryPolicy;
use super::state::{OrchestratorState, StateMachine};
use crate::context::{CodeElement, CodeElementKind, ReviewContext};
use crate::cost::CostAccountant;
use crate::errors::{GenerationError, ReviewError};
use crate::files::{FileUnit, fingerprint};
use crate::models::ModelInfo;
use crate::planner::{ChunkPlan, DEFAULT_CONTEXT_MAINTENANCE_FACTOR, FileChunk};
use crate::prompts::{ConsolidationPrompt, PassPrompt, PromptRenderer};
use crate::providers::{Generation, ProviderRouter};
use crate::review::{
    PartialReview, PassFailure, PassOutput, ReviewResult, ReviewStatus, ReviewType,
};
use crate::tokens::CONSERVATIVE_BYTES_PER_TOKEN;
use crate::util::truncate_at_char_boundary;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default limit on a single generation call.
pub const DEFAULT_PASS_TIMEOUT: Duration = Duration::from_secs(300);

/// Longest pass summary carried forward as a note.
const MAX_SUMMARY_NOTE: usize = 1_000;

/// Settings for one review run.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub project_name: String,
    pub review_type: ReviewType,
    pub model: ModelInfo,
    /// Model that merges partial reviews; the analysis model when unset.
    pub writer_model: Option<ModelInfo>,
    /// Tried once when retries on the analysis model are exhausted.
    pub fallback_model: Option<ModelInfo>,
    pub retry: RetryPolicy,
    pub pass_timeout: Duration,
    pub context_maintenance_factor: f64,
    /// Review every file in one call, ignoring the plan's chunks.
    pub force_single_pass: bool,
}

impl OrchestratorOptions {
    pub fn new(project_name: impl Into<String>, review_type: ReviewType, model: ModelInfo) -> Self {
        Self {
            project_name: project_name.into(),
            review_type,
            model,
            writer_model: None,
            fallback_model: None,
            retry: RetryPolicy::default(),
            pass_timeout: DEFAULT_PASS_TIMEOUT,
            context_maintenance_factor: DEFAULT_CONTEXT_MAINTENANCE_FACTOR,
            force_single_pass: false,
        }
    }

    pub fn writer(&self) -> &ModelInfo {
        self.writer_model.as_ref().unwrap_or(&self.model)
    }

    /// Byte budget for the cross-pass digest: the reserved share of the
    /// window at the conservative bytes-per-token ratio.
    pub fn digest_budget_bytes(&self) -> usize {
        (self.model.context_window as f64
            * self.context_maintenance_factor
            * CONSERVATIVE_BYTES_PER_TOKEN) as usize
    }
}

struct Attempted {
    generation: Generation,
    model: ModelInfo,
    attempts: u32,
}

struct Failed {
    error: GenerationError,
    attempts: u32,
}

/// Mutable state of one run, restorable from a checkpoint.
struct RunState {
    run_id: Uuid,
    machine: StateMachine,
    context: ReviewContext,
    accountant: CostAccountant,
    outputs: Vec<PassOutput>,
    failures: Vec<PassFailure>,
    models_used: Vec<String>,
    next_chunk: usize,
}

impl RunState {
    fn note_model(&mut self, model: &str) {
        if !self.models_used.iter().any(|m| m == model) {
            self.models_used.push(model.to_string());
        }
    }
}

/// Drives review passes against a provider router.
pub struct PassOrchestrator {
    router: Arc<ProviderRouter>,
    renderer: Arc<dyn PromptRenderer>,
    options: OrchestratorOptions,
    observer: Arc<dyn PassObserver>,
    cancel: CancellationToken,
    checkpoints: Option<CheckpointStore>,
}

impl PassOrchestrator {
    pub fn new(
        router: Arc<ProviderRouter>,
        renderer: Arc<dyn PromptRenderer>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            router,
            renderer,
            options,
            observer: Arc::new(NoopObserver),
            cancel: CancellationToken::new(),
            checkpoints: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PassObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_checkpoint_store(mut self, store: CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Chunks this run executes: the plan's, or all files merged into one
    /// when a single pass is forced.
    pub fn effective_plan(&self, plan: &ChunkPlan) -> ChunkPlan {
        if self.options.force_single_pass {
            plan.merged()
        } else {
            plan.clone()
        }
    }

    /// Run a fresh review of `files` following `plan`.
    pub async fn run(
        &self,
        files: &[FileUnit],
        plan: &ChunkPlan,
    ) -> Result<ReviewResult, ReviewError> {
        let context = ReviewContext::new(
            self.options.project_name.clone(),
            self.options.review_type,
            files.iter().map(|f| f.relative_path.clone()).collect(),
        );
        let state = RunState {
            run_id: Uuid::new_v4(),
            machine: StateMachine::new(),
            context,
            accountant: CostAccountant::new(Some(self.options.context_maintenance_factor)),
            outputs: Vec::new(),
            failures: Vec::new(),
            models_used: Vec::new(),
            next_chunk: 0,
        };
        self.execute(files, plan, state).await
    }

    /// Continue the run saved in `checkpoint`.
    ///
    /// The checkpoint must come from the same files, review type, model and
    /// plan.
    pub async fn resume(
        &self,
        files: &[FileUnit],
        plan: &ChunkPlan,
        checkpoint: RunCheckpoint,
    ) -> Result<ReviewResult, ReviewError> {
        let effective = self.effective_plan(plan);
        if !checkpoint.matches(
            &fingerprint(files),
            self.options.review_type,
            &self.options.model.id,
            &effective.chunks,
        ) {
            return Err(ReviewError::Checkpoint(anyhow::anyhow!(
                "Checkpoint from {} does not match the current files, review type, model or plan",
                checkpoint.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
            )));
        }
        tracing::info!(
            run_id = %checkpoint.run_id,
            next_chunk = checkpoint.next_chunk,
            "Resuming review from checkpoint"
        );

        let state = RunState {
            run_id: checkpoint.run_id,
            machine: StateMachine::new(),
            context: checkpoint.context,
            accountant: CostAccountant::restore(
                Some(self.options.context_maintenance_factor),
                checkpoint.pass_costs,
            ),
            outputs: checkpoint.outputs,
            failures: checkpoint.failures,
            models_used: checkpoint.models_used,
            next_chunk: checkpoint.next_chunk,
        };
        self.execute(files, plan, state).await
    }

    async fn execute(
        &self,
        files: &[FileUnit],
        plan: &ChunkPlan,
        mut state: RunState,
    ) -> Result<ReviewResult, ReviewError> {
        let potentially_truncated = self.options.force_single_pass
            && (plan.chunks.len() > 1 || plan.chunks.iter().any(|c| c.oversized));
        let plan = self.effective_plan(plan);
        if files.is_empty() || plan.chunks.is_empty() {
            return Err(ReviewError::NoFiles);
        }

        let _lock = match &self.checkpoints {
            Some(store) => Some(store.lock().map_err(ReviewError::Checkpoint)?),
            None => None,
        };
        let file_set_fingerprint = fingerprint(files);
        let by_path: HashMap<&str, &FileUnit> = files
            .iter()
            .map(|f| (f.relative_path.as_str(), f))
            .collect();

        let chunks = &plan.chunks;
        let total = chunks.len() as u32;
        if potentially_truncated {
            tracing::warn!(
                tokens = chunks[0].estimated_tokens,
                usable = plan.usable_tokens_per_pass,
                "Single pass forced beyond the usable context window; the review may be truncated"
            );
        }
        self.observer.on_plan(&plan);

        let mut fatal: Option<(u32, GenerationError)> = None;
        let mut last_failure: Option<(u32, GenerationError)> = None;
        let mut cancelled = false;
        // The checkpoint stays on the first failed chunk so a resume retries it.
        let mut checkpoint_held = false;

        while state.next_chunk < chunks.len() {
            if self.cancel.is_cancelled() {
                tracing::info!(
                    completed = state.outputs.len(),
                    remaining = chunks.len() - state.next_chunk,
                    "Review cancelled between passes"
                );
                cancelled = true;
                break;
            }

            let chunk = &chunks[state.next_chunk];
            state.machine.transition(OrchestratorState::PassExecuting)?;
            let pass = state.context.start_pass();
            self.observer.on_pass_start(pass, total, &chunk.files);

            let prompt = self.render_pass(&state.context, chunk, pass, total, &by_path);
            let outcome = self
                .generate_with_retry(pass, &prompt, &self.options.model, true)
                .await;

            match outcome {
                Ok(attempted) => {
                    let review = PartialReview::parse(&attempted.generation.text);
                    let cost = state.accountant.record_pass(
                        pass,
                        attempted.generation.input_tokens,
                        attempted.generation.output_tokens,
                        &attempted.model.pricing,
                    )?;
                    state.machine.transition(OrchestratorState::PassMerging)?;
                    merge_into_context(&mut state.context, pass, &review);
                    if !review.is_structured() {
                        tracing::warn!(pass, "Pass output was not structured JSON; kept as text");
                    }
                    tracing::info!(
                        pass,
                        model = %attempted.model.id,
                        attempts = attempted.attempts,
                        input_tokens = cost.input_tokens,
                        output_tokens = cost.output_tokens,
                        "Pass complete"
                    );
                    state.note_model(&attempted.model.id);
                    state.outputs.push(PassOutput {
                        pass_number: pass,
                        model: attempted.model.id.clone(),
                        files: chunk.files.clone(),
                        review,
                    });
                    self.observer.on_pass_complete(pass, &cost);
                }
                Err(failed) => {
                    self.observer.on_pass_failed(pass, &failed.error);
                    state.failures.push(PassFailure {
                        pass_number: pass,
                        files: chunk.files.clone(),
                        error: failed.error.to_string(),
                        attempts: failed.attempts,
                    });
                    if failed.error.is_fatal() {
                        tracing::error!(pass, error = %failed.error, "Fatal provider error; stopping");
                        state.machine.transition(OrchestratorState::Error)?;
                        fatal = Some((pass, failed.error));
                        break;
                    }
                    tracing::warn!(
                        pass,
                        attempts = failed.attempts,
                        error = %failed.error,
                        "Pass failed after retries; continuing with the next pass"
                    );
                    state.machine.transition(OrchestratorState::PassMerging)?;
                    last_failure = Some((pass, failed.error));
                    checkpoint_held = true;
                }
            }

            state.next_chunk += 1;
            if !checkpoint_held {
                self.save_checkpoint(&state, &file_set_fingerprint, chunks);
            }
            if state.next_chunk < chunks.len() {
                state.machine.transition(OrchestratorState::Continuing)?;
            }
        }

        if let Some((pass, error)) = fatal {
            if state.outputs.is_empty() {
                return Err(ReviewError::Fatal {
                    pass,
                    source: error,
                });
            }
            let status = ReviewStatus::incomplete(format!("pass {} failed: {}", pass, error));
            let content = concatenate(&state.outputs, Some(&status));
            return Ok(self.finish(state, content, status, total, false, potentially_truncated));
        }

        if cancelled {
            state.machine.transition(OrchestratorState::Done)?;
            let status = ReviewStatus::incomplete(format!(
                "cancelled after {} of {} passes",
                state.outputs.len(),
                total
            ));
            let content = concatenate(&state.outputs, Some(&status));
            return Ok(self.finish(state, content, status, total, false, potentially_truncated));
        }

        if state.outputs.is_empty() {
            let (pass, error) = last_failure.unwrap_or((
                total,
                GenerationError::ProviderUnavailable("no pass produced output".to_string()),
            ));
            return Err(ReviewError::AllPassesFailed {
                passes: total,
                pass,
                source: error,
            });
        }

        let (content, consolidated) = if state.outputs.len() >= 2 {
            state.machine.transition(OrchestratorState::Consolidating)?;
            self.consolidate(&mut state).await
        } else {
            (state.outputs[0].review.to_markdown(), false)
        };
        state.machine.transition(OrchestratorState::Done)?;

        let status = if state.failures.is_empty() {
            ReviewStatus::Complete
        } else {
            ReviewStatus::incomplete(format!(
                "{} of {} passes failed",
                state.failures.len(),
                total
            ))
        };
        if status.is_complete()
            && let Some(store) = &self.checkpoints
            && let Err(e) = store.clear()
        {
            tracing::warn!(error = %e, "Failed to remove checkpoint");
        }
        Ok(self.finish(state, content, status, total, consolidated, potentially_truncated))
    }

    fn render_pass(
        &self,
        context: &ReviewContext,
        chunk: &FileChunk,
        pass: u32,
        total: u32,
        by_path: &HashMap<&str, &FileUnit>,
    ) -> String {
        let digest = (pass > 1).then(|| {
            context.generate_next_pass_context(&chunk.files, self.options.digest_budget_bytes())
        });
        let files: Vec<&FileUnit> = chunk
            .files
            .iter()
            .filter_map(|path| {
                let file = by_path.get(path.as_str()).copied();
                if file.is_none() {
                    tracing::warn!(file = %path, "Planned file missing from the loaded set");
                }
                file
            })
            .collect();

        self.renderer.render_pass(&PassPrompt {
            project_name: &self.options.project_name,
            review_type: self.options.review_type,
            pass_number: pass,
            total_passes: total,
            context: digest.as_deref(),
            files,
        })
    }

    async fn call(&self, prompt: &str, model: &ModelInfo) -> Result<Generation, GenerationError> {
        match tokio::time::timeout(self.options.pass_timeout, self.router.generate(prompt, model))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(self.options.pass_timeout)),
        }
    }

    /// Call `model` with retries, then the fallback model once if allowed.
    async fn generate_with_retry(
        &self,
        pass: u32,
        prompt: &str,
        model: &ModelInfo,
        allow_fallback: bool,
    ) -> Result<Attempted, Failed> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let error = match self.call(prompt, model).await {
                Ok(generation) => {
                    return Ok(Attempted {
                        generation,
                        model: model.clone(),
                        attempts: attempt,
                    });
                }
                Err(error) => error,
            };

            if error.is_fatal() {
                return Err(Failed {
                    error,
                    attempts: attempt,
                });
            }

            if self.options.retry.should_retry(attempt, &error) {
                let delay = self.options.retry.delay_for(attempt, &error);
                tracing::warn!(
                    pass,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retrying generation"
                );
                self.observer.on_retry(pass, attempt, &error, delay);
                tokio::time::sleep(delay).await;
                continue;
            }

            if allow_fallback
                && let Some(fallback) = &self.options.fallback_model
                && fallback.id != model.id
            {
                tracing::warn!(pass, fallback = %fallback.id, "Retries exhausted; trying fallback model");
                self.observer.on_fallback(pass, &fallback.id);
                attempt += 1;
                return match self.call(prompt, fallback).await {
                    Ok(generation) => Ok(Attempted {
                        generation,
                        model: fallback.clone(),
                        attempts: attempt,
                    }),
                    Err(fallback_error) if fallback_error.is_fatal() => {
                        tracing::warn!(
                            fallback = %fallback.id,
                            error = %fallback_error,
                            "Fallback model unavailable"
                        );
                        Err(Failed {
                            error,
                            attempts: attempt,
                        })
                    }
                    Err(fallback_error) => Err(Failed {
                        error: fallback_error,
                        attempts: attempt,
                    }),
                };
            }

            return Err(Failed {
                error,
                attempts: attempt,
            });
        }
    }

    /// Merge partial reviews with the writer model, falling back to
    /// concatenation.
    async fn consolidate(&self, state: &mut RunState) -> (String, bool) {
        let writer = self.options.writer().clone();
        self.observer
            .on_consolidation_start(&writer.id, state.outputs.len());
        let prompt = self.renderer.render_consolidation(&ConsolidationPrompt {
            project_name: &self.options.project_name,
            review_type: self.options.review_type,
            partials: &state.outputs,
            failures: &state.failures,
        });

        match self.generate_with_retry(0, &prompt, &writer, false).await {
            Ok(attempted) => {
                let usage = state.accountant.record_consolidation(
                    attempted.generation.input_tokens,
                    attempted.generation.output_tokens,
                    &writer.pricing,
                );
                tracing::info!(
                    writer = %writer.id,
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    "Consolidated partial reviews"
                );
                state.note_model(&writer.id);
                self.observer.on_consolidation_complete(true);
                (attempted.generation.text.trim().to_string(), true)
            }
            Err(failed) => {
                tracing::warn!(
                    writer = %writer.id,
                    error = %failed.error,
                    "Consolidation failed; returning concatenated partial reviews"
                );
                self.observer.on_consolidation_complete(false);
                let note = format!(
                    "> **Note:** automatic consolidation did not occur ({}). The partial reviews from each pass are shown below.\n\n",
                    failed.error
                );
                (format!("{}{}", note, concatenate(&state.outputs, None)), false)
            }
        }
    }

    fn save_checkpoint(&self, state: &RunState, fingerprint: &str, chunks: &[FileChunk]) {
        let Some(store) = &self.checkpoints else {
            return;
        };
        let checkpoint = RunCheckpoint {
            version: CHECKPOINT_VERSION,
            run_id: state.run_id,
            fingerprint: fingerprint.to_string(),
            review_type: self.options.review_type,
            model: self.options.model.id.clone(),
            chunks: chunks.to_vec(),
            next_chunk: state.next_chunk,
            context: state.context.clone(),
            outputs: state.outputs.clone(),
            failures: state.failures.clone(),
            pass_costs: state.accountant.passes().to_vec(),
            models_used: state.models_used.clone(),
            saved_at: Utc::now(),
        };
        if let Err(e) = store.save(&checkpoint) {
            tracing::warn!(error = %e, "Failed to save checkpoint; the run cannot be resumed");
        }
    }

    fn finish(
        &self,
        state: RunState,
        content: String,
        status: ReviewStatus,
        total_passes: u32,
        consolidated: bool,
        potentially_truncated: bool,
    ) -> ReviewResult {
        let issues = state
            .outputs
            .iter()
            .flat_map(|o| o.review.issues.iter().cloned())
            .collect();
        let result = ReviewResult {
            project_name: self.options.project_name.clone(),
            review_type: self.options.review_type,
            content,
            issues,
            cost: state.accountant.snapshot(),
            models_used: state.models_used,
            total_passes,
            status,
            pass_failures: state.failures,
            consolidated,
            potentially_truncated,
            timestamp: Utc::now(),
            pass_outputs: state.outputs,
        };
        tracing::debug!(history = ?state.machine.history(), "Orchestrator finished");
        self.observer.on_finish(&result);
        result
    }
}

/// Fold one pass's output into the context.
fn merge_into_context(context: &mut ReviewContext, pass: u32, review: &PartialReview) {
    for issue in &review.issues {
        let description = if issue.description.trim().is_empty() {
            issue.title.clone()
        } else {
            format!("{}: {}", issue.title, issue.description.trim())
        };
        context.add_finding("issue", description, issue.file.clone(), issue.priority);
    }

    for summary in &review.file_summaries {
        if summary.path.is_empty() {
            continue;
        }
        context.add_file_summary(
            summary.path.clone(),
            summary.file_type.clone(),
            summary.description.clone(),
            summary.key_elements.clone(),
        );
    }

    let mut known: HashSet<(CodeElementKind, String, String)> = context
        .code_elements()
        .iter()
        .map(|e| (e.kind, e.name.clone(), e.file.clone()))
        .collect();
    for reported in &review.code_elements {
        let Some(kind) = CodeElementKind::parse_lenient(&reported.kind) else {
            tracing::debug!(kind = %reported.kind, name = %reported.name, "Skipping unknown code element kind");
            continue;
        };
        if reported.name.is_empty()
            || !known.insert((kind, reported.name.clone(), reported.file.clone()))
        {
            continue;
        }
        let mut element = CodeElement::new(kind, reported.name.clone(), reported.file.clone());
        if let Some(signature) = &reported.signature {
            element = element.with_signature(signature.clone());
        }
        if let Some(importance) = reported.importance {
            element = element.with_importance(importance);
        }
        context.add_code_element(element);
    }

    for note in &review.notes {
        context.add_general_note(note.clone());
    }
    if !review.summary.trim().is_empty() {
        context.add_general_note(format!(
            "Pass {}: {}",
            pass,
            truncate_at_char_boundary(review.summary.trim(), MAX_SUMMARY_NOTE)
        ));
    }
}

/// Partial reviews in pass order, optionally prefixed with an incomplete marker.
fn concatenate(outputs: &[PassOutput], status: Option<&ReviewStatus>) -> String {
    let mut content = String::new();
    if let Some(ReviewStatus::Incomplete { reason }) = status {
        content.push_str(&format!("> **Incomplete review:** {}.\n\n", reason));
    }
    for output in outputs {
        content.push_str(&format!(
            "## Pass {} ({})\n\n{}\n\n",
            output.pass_number,
            output.files.join(", "),
            output.review.to_markdown()
        ));
    }
    content.trim_end().to_string()
}
