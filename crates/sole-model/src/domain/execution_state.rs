use serde::{Deserialize, Serialize};

/// Lifecycle of a job supervisor.
///
/// `NotStarted -> Running -> StopRequested -> Stopped`; there is no way out of `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionState {
    /// Supervisor constructed, loop not launched yet.
    #[default]
    NotStarted,
    /// Outer loop is running.
    Running,
    /// Cancellation was signalled; the loop has not observed it yet.
    StopRequested,
    /// Outer loop exited.
    Stopped,
}

impl ExecutionState {
    /// Returns `true` if the state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionState::Stopped)
    }

    /// Returns `true` while the outer loop may still be executing.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ExecutionState::Running | ExecutionState::StopRequested
        )
    }

    /// Checks whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (*self, next),
            (NotStarted, Running) | (Running, StopRequested) | (StopRequested, Stopped)
        )
    }
}
