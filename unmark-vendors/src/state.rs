//! Lifecycle of one vendor removal request.
//!
//! Synchronous vendors go straight from submission to a terminal state; task
//! based vendors walk `Submitted -> Polling -> Succeeded | Failed`, advancing
//! once per poll observation.

use bytes::Bytes;
use url::Url;

/// Where the cleaned image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutput {
    /// The vendor returned the bytes directly.
    Inline(Bytes),
    /// The vendor stored the result and gave us a link to it.
    Remote(Url),
}

/// What one poll of the vendor reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollObservation {
    Pending,
    Done(RemovalOutput),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Vendor(String),
    GaveUp { polls: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalState {
    Submitted { task_id: String },
    Polling { task_id: String, polls: u32 },
    Succeeded { output: RemovalOutput },
    Failed { task_id: String, reason: FailureReason },
}

impl RemovalState {
    pub fn submitted(task_id: impl Into<String>) -> Self {
        Self::Submitted {
            task_id: task_id.into(),
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::Submitted { task_id }
            | Self::Polling { task_id, .. }
            | Self::Failed { task_id, .. } => Some(task_id),
            Self::Succeeded { .. } => None,
        }
    }

    pub fn polls(&self) -> u32 {
        match self {
            Self::Submitted { .. } | Self::Succeeded { .. } => 0,
            Self::Polling { polls, .. } => *polls,
            Self::Failed { reason, .. } => match reason {
                FailureReason::GaveUp { polls } => *polls,
                FailureReason::Vendor(_) => 0,
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }

    /// Fold one poll observation into the state.
    ///
    /// At most `max_polls` observations are accepted; a pending answer on the
    /// last one moves to `Failed` with [`FailureReason::GaveUp`]. Terminal
    /// states ignore further observations.
    pub fn advance(self, observation: PollObservation, max_polls: u32) -> Self {
        let (task_id, done) = match self {
            Self::Submitted { task_id } => (task_id, 0),
            Self::Polling { task_id, polls } => (task_id, polls),
            terminal => return terminal,
        };
        let polls = done + 1;
        match observation {
            PollObservation::Done(output) => Self::Succeeded { output },
            PollObservation::Failed(message) => Self::Failed {
                task_id,
                reason: FailureReason::Vendor(message),
            },
            PollObservation::Pending if polls >= max_polls => Self::Failed {
                task_id,
                reason: FailureReason::GaveUp { polls },
            },
            PollObservation::Pending => Self::Polling { task_id, polls },
        }
    }
}
