use super::{CombinedResult, PipelineError};

/// Messages from change-triggered analyses to whoever consumes them
#[derive(Debug, Clone)]
pub enum ReactiveMessage {
    /// The analysis for the latest edit finished
    Completed {
        identity: String,
        sequence: u64,
        result: Box<CombinedResult>,
    },
    /// The analysis for the latest edit failed; editing is unaffected
    Failed {
        identity: String,
        sequence: u64,
        error: PipelineError,
    },
    /// A newer edit arrived while this analysis was running; its output was dropped
    Superseded { identity: String, sequence: u64 },
    /// Pending work was cancelled with no newer edit to replace it
    Cancelled { identity: String, sequence: u64 },
    /// A background task panicked
    Crashed(String),
}

impl ReactiveMessage {
    pub fn identity(&self) -> Option<&str> {
        match self {
            ReactiveMessage::Completed { identity, .. }
            | ReactiveMessage::Failed { identity, .. }
            | ReactiveMessage::Superseded { identity, .. }
            | ReactiveMessage::Cancelled { identity, .. } => Some(identity),
            ReactiveMessage::Crashed(_) => None,
        }
    }

    pub fn sequence(&self) -> Option<u64> {
        match self {
            ReactiveMessage::Completed { sequence, .. }
            | ReactiveMessage::Failed { sequence, .. }
            | ReactiveMessage::Superseded { sequence, .. }
            | ReactiveMessage::Cancelled { sequence, .. } => Some(*sequence),
            ReactiveMessage::Crashed(_) => None,
        }
    }
}
