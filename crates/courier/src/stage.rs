//! Host processing stages.

use serde::{Deserialize, Serialize};

/// Where an Execute Host is in handling one message.
///
/// ```text
/// Received ──► Executing ──┬──► Completed
///                          ├──► Faulted
///                          └──► Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ExecuteStage {
    /// The slip arrived and passed validation.
    #[default]
    Received,

    /// The activity is running.
    Executing,

    /// The activity succeeded and the slip moved on.
    Completed,

    /// The activity failed and the slip turned around.
    Faulted,

    /// The activity succeeded and ended the slip.
    Terminated,
}

impl ExecuteStage {
    /// Returns true if the stage may move to `next`.
    pub fn can_transition_to(&self, next: ExecuteStage) -> bool {
        matches!(
            (self, next),
            (ExecuteStage::Received, ExecuteStage::Executing)
                | (
                    ExecuteStage::Executing,
                    ExecuteStage::Completed | ExecuteStage::Faulted | ExecuteStage::Terminated
                )
        )
    }

    /// Returns true if this is a terminal stage.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecuteStage::Completed | ExecuteStage::Faulted | ExecuteStage::Terminated
        )
    }

    /// Returns the stage name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecuteStage::Received => "Received",
            ExecuteStage::Executing => "Executing",
            ExecuteStage::Completed => "Completed",
            ExecuteStage::Faulted => "Faulted",
            ExecuteStage::Terminated => "Terminated",
        }
    }
}

impl std::fmt::Display for ExecuteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a Compensate Host is in handling one message.
///
/// ```text
/// Received ──► Compensating ──┬──► Compensated
///                             └──► CompensationFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CompensateStage {
    #[default]
    Received,
    Compensating,
    Compensated,
    /// The undo failed; the walk continued anyway.
    CompensationFailed,
}

impl CompensateStage {
    /// Returns true if the stage may move to `next`.
    pub fn can_transition_to(&self, next: CompensateStage) -> bool {
        matches!(
            (self, next),
            (CompensateStage::Received, CompensateStage::Compensating)
                | (
                    CompensateStage::Compensating,
                    CompensateStage::Compensated | CompensateStage::CompensationFailed
                )
        )
    }

    /// Returns true once the undo has an outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CompensateStage::Compensated | CompensateStage::CompensationFailed
        )
    }

    /// Returns the stage name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompensateStage::Received => "Received",
            CompensateStage::Compensating => "Compensating",
            CompensateStage::Compensated => "Compensated",
            CompensateStage::CompensationFailed => "CompensationFailed",
        }
    }
}

impl std::fmt::Display for CompensateStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
