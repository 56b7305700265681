use crate::CoreError;
use std::fmt;

/// Phases of a single invocation. Every transition moves forward; a failed run
/// is never resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Validating,
    StoppingPrevious,
    Starting,
    PollingReadiness,
    Ready,
    NotReady,
    RunningWorkflow,
    Done,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::StoppingPrevious => "stopping-previous",
            Self::Starting => "starting",
            Self::PollingReadiness => "polling-readiness",
            Self::Ready => "ready",
            Self::NotReady => "not-ready",
            Self::RunningWorkflow => "running-workflow",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

pub fn validate_transition(from: RunState, to: RunState) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (RunState::Idle, RunState::Validating | RunState::StoppingPrevious)
            | (
                RunState::Validating,
                RunState::StoppingPrevious | RunState::RunningWorkflow
            )
            | (RunState::StoppingPrevious, RunState::Starting | RunState::Done)
            | (RunState::Starting, RunState::PollingReadiness)
            | (
                RunState::PollingReadiness,
                RunState::Ready | RunState::NotReady
            )
            | (RunState::Ready, RunState::RunningWorkflow)
            | (RunState::RunningWorkflow, RunState::Done)
            | (RunState::NotReady, RunState::Aborted)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
