// Process lifecycle states and guarded transitions

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ProcessError, ProcessResult};

/// Lifecycle states for the supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Stopped,
    Starting,
    Running,
    Restarting,
    Failed,
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProcessState::Stopped => "stopped",
            ProcessState::Starting => "starting",
            ProcessState::Running => "running",
            ProcessState::Restarting => "restarting",
            ProcessState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// State machine for one supervised process.
///
/// Transitions are guarded: an illegal move returns an InvalidState error
/// instead of silently corrupting the lifecycle.
#[derive(Debug, Clone)]
pub struct ProcessStateMachine {
    name: String,
    state: ProcessState,
}

impl ProcessStateMachine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ProcessState::Stopped,
        }
    }

    pub fn current_state(&self) -> ProcessState {
        self.state
    }

    pub fn transition_to_starting(&mut self) -> ProcessResult<()> {
        self.transition(
            ProcessState::Starting,
            &[ProcessState::Stopped, ProcessState::Restarting],
        )
    }

    pub fn transition_to_running(&mut self) -> ProcessResult<()> {
        self.transition(ProcessState::Running, &[ProcessState::Starting])
    }

    pub fn transition_to_restarting(&mut self) -> ProcessResult<()> {
        self.transition(ProcessState::Restarting, &[ProcessState::Running])
    }

    pub fn transition_to_stopped(&mut self) -> ProcessResult<()> {
        self.transition(
            ProcessState::Stopped,
            &[
                ProcessState::Starting,
                ProcessState::Running,
                ProcessState::Restarting,
            ],
        )
    }

    pub fn transition_to_failed(&mut self) -> ProcessResult<()> {
        self.transition(
            ProcessState::Failed,
            &[
                ProcessState::Starting,
                ProcessState::Running,
                ProcessState::Restarting,
            ],
        )
    }

    fn transition(&mut self, to: ProcessState, allowed_from: &[ProcessState]) -> ProcessResult<()> {
        if !allowed_from.contains(&self.state) {
            return Err(ProcessError::invalid_state(
                &self.name,
                allowed_from
                    .iter()
                    .map(ProcessState::to_string)
                    .collect::<Vec<_>>()
                    .join(" or "),
                self.state.to_string(),
            ));
        }

        debug!("Process {} state: {} -> {}", self.name, self.state, to);
        self.state = to;
        Ok(())
    }
}
