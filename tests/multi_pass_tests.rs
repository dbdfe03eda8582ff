//! Multi-pass orchestration scenarios against the scripted provider.

use ai_code_review::errors::{GenerationError, ReviewError};
use ai_code_review::files::FileUnit;
use ai_code_review::models::{ModelInfo, ModelRegistry, ProviderKind, StaticModelRegistry};
use ai_code_review::orchestrator::{
    CheckpointStore, OrchestratorOptions, PassObserver, PassOrchestrator, RetryPolicy,
};
use ai_code_review::planner::{CapacityPlanner, ChunkPlan};
use ai_code_review::prompts::TemplateRenderer;
use ai_code_review::providers::{Generation, ProviderRouter, ScriptedProvider};
use ai_code_review::review::{ReviewStatus, ReviewType};
use ai_code_review::tokens::{EstimateOptions, PromptOverhead, TokenEstimator};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const CONTEXT_WINDOW: usize = 2_000;

fn model(id: &str) -> ModelInfo {
    let mut model = StaticModelRegistry::builtin().resolve(id).unwrap();
    model.context_window = CONTEXT_WINDOW;
    model
}

/// Three files of 300 tokens each; with a 2000-token window only one fits per pass.
fn three_files() -> Vec<FileUnit> {
    ["src/alpha.rs", "src/beta.rs", "src/gamma.rs"]
        .into_iter()
        .map(|path| FileUnit::new(path, path, "x".repeat(1_200)))
        .collect()
}

fn plan_for(files: &[FileUnit]) -> ChunkPlan {
    let analysis = TokenEstimator::for_provider(ProviderKind::Gemini).estimate_set(
        files,
        &EstimateOptions {
            context_window: CONTEXT_WINDOW,
            prompt_overhead: PromptOverhead::for_review_type(ReviewType::QuickFixes),
            context_maintenance_factor: 0.15,
        },
    );
    CapacityPlanner::new(CONTEXT_WINDOW, 0.15)
        .unwrap()
        .plan(&analysis)
}

fn options() -> OrchestratorOptions {
    let mut options = OrchestratorOptions::new(
        "demo",
        ReviewType::QuickFixes,
        model("gemini:gemini-2.5-flash"),
    );
    options.retry = RetryPolicy::immediate(3);
    options
}

fn orchestrator(provider: &Arc<ScriptedProvider>, options: OrchestratorOptions) -> PassOrchestrator {
    let router = ProviderRouter::new().with_provider(provider.clone());
    PassOrchestrator::new(
        Arc::new(router),
        Arc::new(TemplateRenderer::builtin()),
        options,
    )
}

fn pass_json(summary: &str, issue: &str, file: &str) -> String {
    format!(
        r#"{{"summary": "{}", "issues": [{{"title": "{}", "priority": "high", "file": "{}"}}]}}"#,
        summary, issue, file
    )
}

fn rate_limited() -> GenerationError {
    GenerationError::RateLimited {
        message: "429 Too Many Requests".into(),
        retry_after: None,
    }
}

fn pass_numbers(result: &ai_code_review::review::ReviewResult) -> Vec<u32> {
    result
        .cost
        .per_pass_costs
        .as_ref()
        .map(|costs| costs.iter().map(|c| c.pass_number).collect())
        .unwrap_or_default()
}

/// Records observer events as short strings.
#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
    cancel_after: Option<(u32, CancellationToken)>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl PassObserver for RecordingObserver {
    fn on_pass_start(&self, pass: u32, total: u32, _files: &[String]) {
        self.record(format!("start {}/{}", pass, total));
    }

    fn on_retry(&self, pass: u32, attempt: u32, _error: &GenerationError, _delay: Duration) {
        self.record(format!("retry {} attempt {}", pass, attempt));
    }

    fn on_fallback(&self, pass: u32, model: &str) {
        self.record(format!("fallback {} {}", pass, model));
    }

    fn on_pass_complete(&self, pass: u32, _cost: &ai_code_review::cost::PassCost) {
        self.record(format!("complete {}", pass));
        if let Some((after, token)) = &self.cancel_after
            && *after == pass
        {
            token.cancel();
        }
    }

    fn on_pass_failed(&self, pass: u32, _error: &GenerationError) {
        self.record(format!("failed {}", pass));
    }
}

#[test]
fn test_plan_splits_into_three_chunks() {
    let plan = plan_for(&three_files());
    assert!(plan.chunking_recommended);
    assert_eq!(plan.pass_count(), 3);
    assert!(plan.chunks.iter().all(|c| c.files.len() == 1 && !c.oversized));
}

#[tokio::test]
async fn test_three_passes_numbered_and_consolidated() {
    let files = three_files();
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    provider.push_ok(pass_json("alpha ok", "Unchecked index", "src/alpha.rs"));
    provider.push_ok(pass_json("beta ok", "Leaked handle", "src/beta.rs"));
    provider.push_ok(pass_json("gamma ok", "Dead branch", "src/gamma.rs"));
    provider.push_ok("# Consolidated\n\nThree issues found.");

    let observer = Arc::new(RecordingObserver::default());
    let result = orchestrator(&provider, options())
        .with_observer(observer.clone())
        .run(&files, &plan_for(&files))
        .await
        .unwrap();

    assert_eq!(result.total_passes, 3);
    assert_eq!(pass_numbers(&result), vec![1, 2, 3]);
    assert_eq!(result.cost.pass_count, Some(3));
    assert!(result.cost.consolidation.is_some());
    assert!(result.consolidated);
    assert_eq!(result.status, ReviewStatus::Complete);
    assert_eq!(result.content, "# Consolidated\n\nThree issues found.");
    assert_eq!(result.issues.len(), 3);
    assert_eq!(result.models_used, vec!["gemini:gemini-2.5-flash".to_string()]);
    assert_eq!(provider.call_count(), 4);
    assert_eq!(
        observer.events(),
        vec![
            "start 1/3",
            "complete 1",
            "start 2/3",
            "complete 2",
            "start 3/3",
            "complete 3"
        ]
    );

    let prompts = provider.prompts();
    assert!(prompts[2].contains("Leaked handle"));
    assert!(prompts[3].contains("## Pass 2"));
}

#[tokio::test]
async fn test_rate_limit_on_second_pass_retries_without_duplicate_cost() {
    let files = three_files();
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    provider.push_ok(pass_json("one", "A", "src/alpha.rs"));
    provider.push_err(rate_limited());
    provider.push_ok(pass_json("two", "B", "src/beta.rs"));
    provider.push_ok(pass_json("three", "C", "src/gamma.rs"));
    provider.push_ok("Consolidated");

    let observer = Arc::new(RecordingObserver::default());
    let result = orchestrator(&provider, options())
        .with_observer(observer.clone())
        .run(&files, &plan_for(&files))
        .await
        .unwrap();

    assert_eq!(pass_numbers(&result), vec![1, 2, 3]);
    assert!(result.pass_failures.is_empty());
    assert_eq!(result.status, ReviewStatus::Complete);
    assert_eq!(provider.call_count(), 5);
    assert!(observer.events().contains(&"retry 2 attempt 1".to_string()));
    assert!(!observer.events().iter().any(|e| e.starts_with("failed")));
}

#[tokio::test]
async fn test_exhausted_retries_use_fallback_model() {
    let files = three_files();
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    provider.push_ok(pass_json("one", "A", "src/alpha.rs"));
    for _ in 0..3 {
        provider.push_err(rate_limited());
    }
    provider.push_ok(pass_json("two from fallback", "B", "src/beta.rs"));
    provider.push_ok(pass_json("three", "C", "src/gamma.rs"));
    provider.push_ok("Consolidated");

    let mut options = options();
    options.fallback_model = Some(model("gemini:gemini-2.5-flash-lite"));
    let observer = Arc::new(RecordingObserver::default());
    let result = orchestrator(&provider, options)
        .with_observer(observer.clone())
        .run(&files, &plan_for(&files))
        .await
        .unwrap();

    assert_eq!(pass_numbers(&result), vec![1, 2, 3]);
    assert_eq!(result.pass_outputs[1].model, "gemini:gemini-2.5-flash-lite");
    assert!(
        result
            .models_used
            .contains(&"gemini:gemini-2.5-flash-lite".to_string())
    );
    assert_eq!(provider.calls()[4], "gemini-2.5-flash-lite");
    assert!(
        observer
            .events()
            .contains(&"fallback 2 gemini:gemini-2.5-flash-lite".to_string())
    );
}

#[tokio::test]
async fn test_pass_failing_after_retries_is_recorded_and_run_continues() {
    let files = three_files();
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    provider.push_ok(pass_json("one", "A", "src/alpha.rs"));
    for _ in 0..3 {
        provider.push_err(GenerationError::Timeout(Duration::from_secs(300)));
    }
    provider.push_ok(pass_json("three", "C", "src/gamma.rs"));
    provider.push_ok("Consolidated");

    let result = orchestrator(&provider, options())
        .run(&files, &plan_for(&files))
        .await
        .unwrap();

    assert_eq!(pass_numbers(&result), vec![1, 3]);
    assert_eq!(result.pass_failures.len(), 1);
    assert_eq!(result.pass_failures[0].pass_number, 2);
    assert_eq!(result.pass_failures[0].attempts, 3);
    assert_eq!(result.pass_failures[0].files, vec!["src/beta.rs".to_string()]);
    assert!(matches!(result.status, ReviewStatus::Incomplete { .. }));
    assert!(result.consolidated);
    assert!(result.failure_notes().contains("Pass 2"));
    // The consolidation prompt names the missing pass.
    assert!(provider.prompts()[5].contains("Passes 2 failed"));
}

#[tokio::test]
async fn test_force_single_pass_makes_one_call_and_flags_truncation() {
    let files = three_files();
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    provider.push_ok(pass_json("everything", "A", "src/alpha.rs"));

    let mut options = options();
    options.force_single_pass = true;
    let result = orchestrator(&provider, options)
        .run(&files, &plan_for(&files))
        .await
        .unwrap();

    assert_eq!(provider.call_count(), 1);
    assert_eq!(result.total_passes, 1);
    assert!(result.potentially_truncated);
    assert!(!result.consolidated);
    assert!(result.content.contains("everything"));
    let prompt = &provider.prompts()[0];
    for file in &files {
        assert!(prompt.contains(&file.relative_path));
    }
}

#[tokio::test]
async fn test_consolidation_failure_falls_back_to_concatenation() {
    let files = three_files();
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    provider.push_ok(pass_json("one", "A", "src/alpha.rs"));
    provider.push_ok(pass_json("two", "B", "src/beta.rs"));
    provider.push_ok(pass_json("three", "C", "src/gamma.rs"));
    provider.push_err(GenerationError::ProviderUnavailable("HTTP 500".into()));

    let result = orchestrator(&provider, options())
        .run(&files, &plan_for(&files))
        .await
        .unwrap();

    assert!(!result.consolidated);
    assert!(result.cost.consolidation.is_none());
    assert!(
        result
            .content
            .contains("automatic consolidation did not occur")
    );
    assert!(result.content.contains("## Pass 1"));
    assert!(result.content.contains("## Pass 3"));
    assert_eq!(result.status, ReviewStatus::Complete);
}

#[tokio::test]
async fn test_cancellation_between_passes_returns_partial_review() {
    let files = three_files();
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    provider.push_ok(pass_json("one", "A", "src/alpha.rs"));
    provider.push_ok(pass_json("two", "B", "src/beta.rs"));

    let token = CancellationToken::new();
    let observer = Arc::new(RecordingObserver {
        cancel_after: Some((1, token.clone())),
        ..RecordingObserver::default()
    });
    let result = orchestrator(&provider, options())
        .with_observer(observer)
        .with_cancellation(token)
        .run(&files, &plan_for(&files))
        .await
        .unwrap();

    assert_eq!(provider.call_count(), 1);
    assert_eq!(pass_numbers(&result), vec![1]);
    assert!(!result.consolidated);
    match &result.status {
        ReviewStatus::Incomplete { reason } => assert!(reason.contains("cancelled")),
        other => panic!("expected incomplete, got {other}"),
    }
    assert!(result.content.starts_with("> **Incomplete review:**"));
}

#[tokio::test]
async fn test_fatal_error_after_first_pass_keeps_completed_work() {
    let files = three_files();
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    provider.push_ok(pass_json("one", "A", "src/alpha.rs"));
    provider.push_err(GenerationError::AuthFailure("key revoked".into()));

    let result = orchestrator(&provider, options())
        .run(&files, &plan_for(&files))
        .await
        .unwrap();

    assert_eq!(provider.call_count(), 2);
    assert_eq!(pass_numbers(&result), vec![1]);
    assert_eq!(result.pass_failures.len(), 1);
    assert_eq!(result.pass_failures[0].attempts, 1);
    assert!(!result.consolidated);
    assert!(result.status.to_string().contains("key revoked"));
}

#[tokio::test]
async fn test_fatal_error_on_first_pass_is_error() {
    let files = three_files();
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    provider.push_err(GenerationError::AuthFailure("bad key".into()));

    let err = orchestrator(&provider, options())
        .run(&files, &plan_for(&files))
        .await
        .unwrap_err();

    match err {
        ReviewError::Fatal { pass, source } => {
            assert_eq!(pass, 1);
            assert!(matches!(source, GenerationError::AuthFailure(_)));
        }
        other => panic!("expected fatal error, got {other}"),
    }
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_resume_continues_from_checkpoint() {
    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::for_project(dir.path());
    let files = three_files();
    let plan = plan_for(&files);

    let first = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    first.push_ok(pass_json("one", "Unchecked index", "src/alpha.rs"));
    first.push_err(GenerationError::AuthFailure("expired".into()));
    let interrupted = orchestrator(&first, options())
        .with_checkpoint_store(store.clone())
        .run(&files, &plan)
        .await
        .unwrap();
    assert!(!interrupted.status.is_complete());

    let checkpoint = store.load().unwrap().expect("checkpoint saved after pass 1");
    assert_eq!(checkpoint.next_chunk, 1);
    assert_eq!(checkpoint.outputs.len(), 1);

    let second = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    second.push_ok(pass_json("two", "B", "src/beta.rs"));
    second.push_ok(pass_json("three", "C", "src/gamma.rs"));
    second.push_ok("Consolidated after resume");
    let result = orchestrator(&second, options())
        .with_checkpoint_store(store.clone())
        .resume(&files, &plan, checkpoint)
        .await
        .unwrap();

    assert_eq!(second.call_count(), 3);
    assert_eq!(pass_numbers(&result), vec![1, 2, 3]);
    assert_eq!(result.content, "Consolidated after resume");
    assert_eq!(result.status, ReviewStatus::Complete);
    // Context from the first run reaches the resumed pass.
    assert!(second.prompts()[0].contains("Unchecked index"));
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn test_resume_rejects_changed_files() {
    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::for_project(dir.path());
    let files = three_files();
    let plan = plan_for(&files);

    let first = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    first.push_ok(pass_json("one", "A", "src/alpha.rs"));
    first.push_err(GenerationError::AuthFailure("expired".into()));
    orchestrator(&first, options())
        .with_checkpoint_store(store.clone())
        .run(&files, &plan)
        .await
        .unwrap();
    let checkpoint = store.load().unwrap().unwrap();

    let mut changed = three_files();
    changed[0].content.push_str("\n// edited");
    let second = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    let err = orchestrator(&second, options())
        .with_checkpoint_store(store)
        .resume(&changed, &plan_for(&changed), checkpoint)
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::Checkpoint(_)));
    assert_eq!(second.call_count(), 0);
}

#[tokio::test]
async fn test_hung_call_times_out_and_pass_is_recorded_failed() {
    let files = three_files();
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    let never_needed = || {
        Ok(Generation {
            text: pass_json("too late", "B", "src/beta.rs"),
            input_tokens: 1_000,
            output_tokens: 10,
        })
    };
    provider.push_ok(pass_json("one", "A", "src/alpha.rs"));
    provider.push_delayed(Duration::from_secs(3_600), never_needed());
    provider.push_delayed(Duration::from_secs(3_600), never_needed());
    provider.push_ok(pass_json("three", "C", "src/gamma.rs"));
    provider.push_ok("Consolidated");

    let mut options = options();
    options.retry = RetryPolicy::immediate(2);
    options.pass_timeout = Duration::from_millis(20);
    let orch = orchestrator(&provider, options);
    let plan = plan_for(&files);
    let run = orch.run(&files, &plan);
    let result = tokio::time::timeout(Duration::from_secs(30), run)
        .await
        .expect("hung provider call must not block the run")
        .unwrap();

    assert_eq!(provider.call_count(), 5);
    assert_eq!(pass_numbers(&result), vec![1, 3]);
    assert_eq!(result.pass_failures.len(), 1);
    let failure = &result.pass_failures[0];
    assert_eq!(failure.pass_number, 2);
    assert_eq!(failure.attempts, 2);
    assert_eq!(
        failure.error,
        GenerationError::Timeout(Duration::from_millis(20)).to_string()
    );
    assert!(failure.error.ends_with("20ms"));
}

#[tokio::test]
async fn test_every_pass_failing_reports_all_passes_failed() {
    let files = three_files();
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    for _ in 0..3 {
        provider.push_err(GenerationError::Timeout(Duration::from_secs(300)));
    }

    let mut options = options();
    options.retry = RetryPolicy::immediate(1);
    let err = orchestrator(&provider, options)
        .run(&files, &plan_for(&files))
        .await
        .unwrap_err();

    match err {
        ReviewError::AllPassesFailed {
            passes,
            pass,
            source,
        } => {
            assert_eq!(passes, 3);
            assert_eq!(pass, 3);
            assert!(matches!(source, GenerationError::Timeout(_)));
        }
        other => panic!("expected all passes failed, got {other}"),
    }
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test]
async fn test_resume_reruns_pass_that_exhausted_retries() {
    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::for_project(dir.path());
    let files = three_files();
    let plan = plan_for(&files);

    let first = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    first.push_ok(pass_json("one", "Unchecked index", "src/alpha.rs"));
    for _ in 0..3 {
        first.push_err(GenerationError::Timeout(Duration::from_secs(300)));
    }
    first.push_ok(pass_json("three", "C", "src/gamma.rs"));
    first.push_ok("Consolidated without pass 2");
    let partial = orchestrator(&first, options())
        .with_checkpoint_store(store.clone())
        .run(&files, &plan)
        .await
        .unwrap();
    assert!(!partial.status.is_complete());
    assert_eq!(pass_numbers(&partial), vec![1, 3]);

    // The checkpoint still points at the chunk that failed.
    let checkpoint = store.load().unwrap().expect("checkpoint kept for the failed pass");
    assert_eq!(checkpoint.next_chunk, 1);
    assert_eq!(checkpoint.outputs.len(), 1);
    assert!(checkpoint.failures.is_empty());

    let second = Arc::new(ScriptedProvider::new(ProviderKind::Gemini));
    second.push_ok(pass_json("two retried", "B", "src/beta.rs"));
    second.push_ok(pass_json("three again", "C", "src/gamma.rs"));
    second.push_ok("Consolidated after resume");
    let result = orchestrator(&second, options())
        .with_checkpoint_store(store.clone())
        .resume(&files, &plan, checkpoint)
        .await
        .unwrap();

    assert_eq!(second.call_count(), 3);
    assert!(second.prompts()[0].contains("src/beta.rs"));
    assert_eq!(pass_numbers(&result), vec![1, 2, 3]);
    assert!(result.pass_failures.is_empty());
    assert_eq!(result.status, ReviewStatus::Complete);
    assert_eq!(result.content, "Consolidated after resume");
    assert!(store.load().unwrap().is_none());
}
