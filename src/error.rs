//! Error types surfaced by the runtime.

use std::time::Duration;

use thiserror::Error;

/// Result type for actor operations.
pub type ActorResult<T> = Result<T, ActorError>;

/// Errors returned from user-defined actor logic.
///
/// Returning one of these from a handler (or from `init`) ends the actor's
/// `start` with a failure that its supervisor feeds into the restart decision.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActorError {
    /// A custom error message from the actor.
    #[error("actor logic error: {0}")]
    User(String),
    /// The actor was cancelled.
    #[error("actor cancelled")]
    Cancelled,
    /// The actor panicked during execution.
    #[error("actor panicked: {0}")]
    Panic(String),
}

impl ActorError {
    /// Creates a new user-defined error.
    pub fn user(message: impl Into<String>) -> Self {
        Self::User(message.into())
    }
}

impl From<AskError> for ActorError {
    fn from(value: AskError) -> Self {
        ActorError::User(value.to_string())
    }
}

impl From<SendError> for ActorError {
    fn from(value: SendError) -> Self {
        ActorError::User(value.to_string())
    }
}

impl From<serde_json::Error> for ActorError {
    fn from(value: serde_json::Error) -> Self {
        ActorError::User(format!("malformed payload: {value}"))
    }
}

impl From<tokio::task::JoinError> for ActorError {
    fn from(value: tokio::task::JoinError) -> Self {
        if !value.is_panic() {
            return ActorError::Cancelled;
        }
        let payload = value.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        ActorError::Panic(message)
    }
}

/// Failures encountered while delivering an envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The mailbox stayed full for the whole send timeout.
    #[error("mailbox `{address}` full for {timeout:?}")]
    Timeout {
        /// Destination address.
        address: String,
        /// How long the sender waited.
        timeout: Duration,
    },
    /// The mailbox for this address was torn down.
    #[error("mailbox `{0}` closed")]
    Closed(String),
    /// The transport does not accept sends (e.g. a fan-in reader).
    #[error("transport `{0}` is read-only")]
    Unsupported(String),
}

/// Errors reported when awaiting a reply from an actor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AskError {
    /// Failed to deliver the request.
    #[error(transparent)]
    Send(#[from] SendError),
    /// No reply arrived in time. A late reply is discarded by the next call.
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    /// The reply did not have the expected shape.
    #[error("unexpected reply: {0}")]
    Malformed(String),
}

/// Failures encountered when spawning an actor outside a supervisor.
#[derive(Debug, Error, Clone)]
pub enum SpawnError {
    /// No Tokio runtime was found in the current context.
    #[error("tokio runtime handle not in scope")]
    MissingRuntime,
}
