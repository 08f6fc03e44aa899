//! Finite state machine for pipeline steps

use serde::{Deserialize, Serialize};

use crate::errors::DeployerError;

/// Step status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Not started yet, or re-armed by a retry
    Pending,

    /// Executor in flight
    Running,

    /// Executor returned successfully
    Completed,

    /// Executor returned an error
    Failed,
}

/// Status as presented to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Pending behind a failed step
    Canceled,
}

/// Step event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    /// Executor started
    Start,

    /// Executor succeeded
    Complete,

    /// Executor failed
    Fail,

    /// Re-arm a failed step
    Retry,
}

impl StepStatus {
    /// Process an event and return the next status
    pub fn next(self, event: StepEvent) -> Result<StepStatus, DeployerError> {
        let next = match (self, event) {
            (StepStatus::Pending, StepEvent::Start) => StepStatus::Running,
            (StepStatus::Running, StepEvent::Complete) => StepStatus::Completed,
            (StepStatus::Running, StepEvent::Fail) => StepStatus::Failed,
            (StepStatus::Failed, StepEvent::Retry) => StepStatus::Pending,

            (status, event) => {
                return Err(DeployerError::InvalidTransition(format!(
                    "{:?} -> {:?}",
                    status, event
                )));
            }
        };

        Ok(next)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }
}
