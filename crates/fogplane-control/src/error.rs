//! Control error taxonomy.

use fogplane_state::StateError;
use thiserror::Error;

/// Errors surfaced to CLI and API callers.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Referenced entity is absent or not visible to the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed or contradictory input. Raised before any write.
    #[error("validation error: {0}")]
    Validation(String),

    /// A topology invariant could not be upheld mid-operation.
    #[error("inconsistent route: {0}")]
    InconsistentRoute(String),

    /// The unit of work was rolled back by the store.
    #[error("unit of work rolled back: {0}")]
    TransactionAborted(#[source] StateError),

    #[error("no free connector port in {start}-{end}")]
    ConnectorPortsExhausted { start: u16, end: u16 },

    #[error("state store error: {0}")]
    State(#[source] StateError),
}

impl ControlError {
    /// Stable name of the error kind, reported alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            ControlError::NotFound(_) => "NotFoundError",
            ControlError::Validation(_) => "ValidationError",
            ControlError::InconsistentRoute(_) => "InconsistentRoute",
            ControlError::TransactionAborted(_) => "TransactionAborted",
            ControlError::ConnectorPortsExhausted { .. } => "ConnectorPortsExhausted",
            ControlError::State(_) => "StateError",
        }
    }
}

impl From<StateError> for ControlError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::Aborted(_) => ControlError::TransactionAborted(err),
            other => ControlError::State(other),
        }
    }
}

pub type ControlResult<T> = Result<T, ControlError>;
