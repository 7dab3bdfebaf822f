/// Job state definitions for tracking a crawl's lifecycle
///
/// A job moves `Pending → Running → {Stopping → Stopped | Completed}`. A job
/// stopped before its workers start goes straight from `Pending` to `Stopped`.
use serde::Serialize;
use std::fmt;

/// Represents the current state of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    // ===== Active States =====
    /// Job has been created but its workers are not running yet
    Pending,

    /// Workers are pulling tasks from the frontier
    Running,

    /// A stop was requested; in-flight fetches are finishing
    Stopping,

    // ===== Terminal States =====
    /// Job was cancelled by an external stop request
    Stopped,

    /// Frontier drained with no fetch outstanding
    Completed,
}

impl JobState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Completed)
    }

    /// Returns true while the job still occupies its spider slot
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the state machine allows moving to `next`
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Stopped)
                | (Self::Running, Self::Stopping)
                | (Self::Running, Self::Completed)
                | (Self::Stopping, Self::Stopped)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
