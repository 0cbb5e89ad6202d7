use super::evals::NormalizedEval;
use super::snapshot::SessionSnapshot;

/// Events broadcast from the session actor to all subscribers.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum SessionEvent {
    /// Full state snapshot after any mutation.
    StateChanged(SessionSnapshot),
    /// Throttled evaluation update (frequent, lightweight).
    Evaluation(EvalUpdate),
    /// Error notification.
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalUpdate {
    pub value: NormalizedEval,
    pub position_key: String,
}
