//! Multi-pass review orchestration.

pub mod checkpoint;
pub mod observer;
pub mod retry;
pub mod runner;
pub mod state;

pub use checkpoint::{CHECKPOINT_FILE, CheckpointStore, RunCheckpoint};
pub use observer::{NoopObserver, PassObserver};
pub use retry::RetryPolicy;
pub use runner::{DEFAULT_PASS_TIMEOUT, OrchestratorOptions, PassOrchestrator};
pub use state::{OrchestratorState, StateMachine};
