//! Orchestrator lifecycle state machine.

use crate::errors::ReviewError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a review run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    /// Estimating and planning passes.
    #[default]
    Planning,
    /// A generation call for the current pass is in flight.
    PassExecuting,
    /// Folding the pass output into the review context.
    PassMerging,
    /// More chunks remain.
    Continuing,
    /// Writer model is merging partial reviews.
    Consolidating,
    Done,
    /// A fatal provider error ended the run.
    Error,
}

impl OrchestratorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Whether a transition from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: OrchestratorState) -> bool {
        use OrchestratorState::*;
        match (self, next) {
            (Planning, PassExecuting | Done) => true,
            // A resumed run whose passes all finished goes straight to merging.
            (Planning, Consolidating) => true,
            (PassExecuting, PassMerging) => true,
            (PassMerging, Continuing | Consolidating | Done) => true,
            (Continuing, PassExecuting | Done) => true,
            (Consolidating, Done) => true,
            (PassExecuting | PassMerging | Continuing | Consolidating, Error) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Planning => "planning",
            Self::PassExecuting => "pass_executing",
            Self::PassMerging => "pass_merging",
            Self::Continuing => "continuing",
            Self::Consolidating => "consolidating",
            Self::Done => "done",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Current state plus the path taken to reach it.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    state: OrchestratorState,
    history: Vec<OrchestratorState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: OrchestratorState::Planning,
            history: vec![OrchestratorState::Planning],
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn history(&self) -> &[OrchestratorState] {
        &self.history
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, next: OrchestratorState) -> Result<(), ReviewError> {
        if !self.state.can_transition_to(next) {
            return Err(ReviewError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::trace!(from = %self.state, to = %next, "Orchestrator transition");
        self.state = next;
        self.history.push(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrchestratorState::*;

    #[test]
    fn test_multi_pass_path() {
        let mut machine = StateMachine::new();
        for next in [
            PassExecuting,
            PassMerging,
            Continuing,
            PassExecuting,
            PassMerging,
            Consolidating,
            Done,
        ] {
            machine.transition(next).unwrap();
        }
        assert_eq!(machine.state(), Done);
        assert!(machine.state().is_terminal());
        assert_eq!(machine.history().len(), 8);
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut machine = StateMachine::new();
        let err = machine.transition(PassMerging).unwrap_err();
        assert!(err.to_string().contains("planning to pass_merging"));
        assert_eq!(machine.state(), Planning);

        machine.transition(PassExecuting).unwrap();
        assert!(machine.transition(Continuing).is_err());
        machine.transition(Error).unwrap();
        assert!(machine.transition(Done).is_err());
    }

    #[test]
    fn test_error_reachable_from_execution_states_only() {
        assert!(!Planning.can_transition_to(Error));
        assert!(PassExecuting.can_transition_to(Error));
        assert!(PassMerging.can_transition_to(Error));
        assert!(Continuing.can_transition_to(Error));
        assert!(Consolidating.can_transition_to(Error));
        assert!(!Done.can_transition_to(Error));
    }
}
