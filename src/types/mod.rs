//! Shared type definitions used across the runtime.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ActorError;

/// Positional message arguments.
pub type Args = Vec<Value>;

/// Action tag used for replies to a `call`.
pub const REPLY_ACTION: &str = "$reply";

/// Unique identifier assigned to each actor within the system.
///
/// Also used as a mailbox address: actors receive on their own id, admin
/// traffic goes to [`ActorId::management`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(Arc<str>);

impl ActorId {
    /// Returns a fresh random identifier.
    pub fn generate() -> Self {
        Self::from(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address of the administration mailbox for this id.
    pub fn management(&self) -> String {
        format!("{}_management", self.0)
    }

    /// Address that replies to this id's calls are delivered to.
    ///
    /// Separate from the id's own inbox, so an actor that calls another actor
    /// never consumes its own pending messages while it waits.
    pub fn reply_address(&self) -> String {
        format!("{}_reply", self.0)
    }
}

impl<T> From<T> for ActorId
where
    T: Into<String>,
{
    fn from(value: T) -> Self {
        let owned: String = value.into();
        Self(Arc::from(owned.into_boxed_str()))
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns the last path segment of a type name, e.g. `RootSupervisor`.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A message in transit. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Handler tag the receiver dispatches on.
    pub action: String,
    /// Positional arguments.
    pub payload: Args,
    /// Address the reply should go to, if any.
    pub caller: Option<ActorId>,
    /// Correlates a reply with the `call` that requested it.
    pub correlation: Option<u64>,
    /// Name of the transport the envelope travelled on. Stamped on send.
    pub transport: Option<String>,
}

impl Envelope {
    /// Creates a fire-and-forget envelope.
    pub fn new(action: impl Into<String>, payload: Args) -> Self {
        Self {
            action: action.into(),
            payload,
            caller: None,
            correlation: None,
            transport: None,
        }
    }

    /// Marks the envelope as a request expecting a reply at `caller`.
    pub fn with_caller(mut self, caller: ActorId, correlation: u64) -> Self {
        self.caller = Some(caller);
        self.correlation = Some(correlation);
        self
    }

    /// Builds the reply to this envelope.
    pub(crate) fn reply(&self, value: Value) -> Self {
        Self {
            action: REPLY_ACTION.to_string(),
            payload: vec![value],
            caller: None,
            correlation: self.correlation,
            transport: None,
        }
    }

    /// Returns true for envelopes carrying a reply.
    pub fn is_reply(&self) -> bool {
        self.action == REPLY_ACTION
    }
}

/// Reason describing why an actor or supervised child stopped.
#[derive(Debug, Clone)]
pub enum StopReason {
    /// `start` returned on its own.
    Normal,
    /// `start` returned an error or panicked.
    Failure(ActorError),
    /// The child observed its cancellation signal.
    Cancelled,
}

impl StopReason {
    /// Returns true for [`StopReason::Failure`].
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::Failure(_))
    }
}

impl Display for StopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Normal => write!(f, "normal"),
            StopReason::Failure(err) => write!(f, "failure: {err}"),
            StopReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Lifecycle status for a running actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorStatus {
    /// Constructed but not started.
    Created,
    /// Running `init`.
    Initializing,
    /// Processing messages.
    Running,
    /// Cancellation observed, loops are draining.
    Stopping,
    /// `start` returned normally.
    Stopped,
    /// A handler or `init` failed.
    Failed,
}

/// Group-level restart strategy of a supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartStrategy {
    /// Each child restarts independently.
    OneForOne,
    /// Any child's exit tears down and restarts the whole group.
    OneForAll,
    /// A strategy code nobody understands. Supervision is a no-op.
    Unrecognized(u64),
}

impl RestartStrategy {
    /// Numeric code carried in start arguments.
    pub fn code(self) -> u64 {
        match self {
            RestartStrategy::OneForOne => 0,
            RestartStrategy::OneForAll => 1,
            RestartStrategy::Unrecognized(code) => code,
        }
    }

    /// Decodes a strategy from its numeric code.
    pub fn from_code(code: u64) -> Self {
        match code {
            0 => RestartStrategy::OneForOne,
            1 => RestartStrategy::OneForAll,
            other => RestartStrategy::Unrecognized(other),
        }
    }

    /// Decodes the strategy from the first start argument, defaulting to
    /// [`RestartStrategy::OneForOne`] when absent.
    pub fn from_args(args: &[Value]) -> Self {
        match args.first() {
            None | Some(Value::Null) => RestartStrategy::OneForOne,
            Some(value) => value
                .as_u64()
                .map(Self::from_code)
                .unwrap_or(RestartStrategy::Unrecognized(u64::MAX)),
        }
    }
}

impl From<RestartStrategy> for Value {
    fn from(strategy: RestartStrategy) -> Self {
        Value::from(strategy.code())
    }
}

impl Display for RestartStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RestartStrategy::OneForOne => write!(f, "one_for_one"),
            RestartStrategy::OneForAll => write!(f, "one_for_all"),
            RestartStrategy::Unrecognized(code) => write!(f, "unrecognized({code})"),
        }
    }
}

/// Per-child restart policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildRestart {
    /// Always restart.
    Permanent,
    /// Restart only after a failure.
    Transient,
    /// Never restart.
    Temporary,
}

impl ChildRestart {
    /// Decides whether a child that stopped for `reason` is kept for restart.
    pub fn should_restart(self, reason: &StopReason) -> bool {
        match self {
            ChildRestart::Permanent => true,
            ChildRestart::Transient => reason.is_failure(),
            ChildRestart::Temporary => false,
        }
    }
}

/// Restart and shutdown contract attached to each supervised child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildSpec {
    /// Restart policy.
    pub restart: ChildRestart,
    /// Arguments passed to the child's `start`.
    #[serde(default)]
    pub start_args: Args,
    /// Advisory shutdown budget. `None` means unbounded.
    #[serde(default)]
    pub shutdown: Option<Duration>,
}

impl Default for ChildSpec {
    fn default() -> Self {
        Self::permanent().with_shutdown(Duration::from_millis(10_000))
    }
}

impl ChildSpec {
    /// A permanent child with no shutdown budget.
    pub fn permanent() -> Self {
        Self::with_restart(ChildRestart::Permanent)
    }

    /// A transient child with no shutdown budget.
    pub fn transient() -> Self {
        Self::with_restart(ChildRestart::Transient)
    }

    /// A temporary child with no shutdown budget.
    pub fn temporary() -> Self {
        Self::with_restart(ChildRestart::Temporary)
    }

    fn with_restart(restart: ChildRestart) -> Self {
        Self {
            restart,
            start_args: Vec::new(),
            shutdown: None,
        }
    }

    /// Sets the shutdown budget.
    pub fn with_shutdown(mut self, shutdown: Duration) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Sets the start arguments.
    pub fn with_start_args(mut self, args: Args) -> Self {
        self.start_args = args;
        self
    }

    /// Default spec for supervisors: permanent, unbounded shutdown, ONE_FOR_ONE.
    pub fn supervisor() -> Self {
        Self::permanent().with_start_args(vec![RestartStrategy::OneForOne.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn restart_policy_matrix() {
        let failure = StopReason::Failure(ActorError::user("boom"));
        assert!(ChildRestart::Permanent.should_restart(&StopReason::Normal));
        assert!(ChildRestart::Permanent.should_restart(&failure));
        assert!(!ChildRestart::Transient.should_restart(&StopReason::Normal));
        assert!(ChildRestart::Transient.should_restart(&failure));
        assert!(!ChildRestart::Temporary.should_restart(&failure));
    }

    #[test]
    fn strategy_decodes_from_args() {
        assert_eq!(RestartStrategy::from_args(&[]), RestartStrategy::OneForOne);
        assert_eq!(
            RestartStrategy::from_args(&[json!(1)]),
            RestartStrategy::OneForAll
        );
        assert_eq!(
            RestartStrategy::from_args(&[json!(2)]),
            RestartStrategy::Unrecognized(2)
        );
        assert!(matches!(
            RestartStrategy::from_args(&[json!("bogus")]),
            RestartStrategy::Unrecognized(_)
        ));
    }

    #[test]
    fn default_specs() {
        let actor = ChildSpec::default();
        assert_eq!(actor.restart, ChildRestart::Permanent);
        assert_eq!(actor.shutdown, Some(Duration::from_secs(10)));

        let supervisor = ChildSpec::supervisor();
        assert_eq!(supervisor.shutdown, None);
        assert_eq!(supervisor.start_args, vec![json!(0)]);
    }

    #[test]
    fn management_address() {
        let id = ActorId::from("counter");
        assert_eq!(id.management(), "counter_management");
        assert_eq!(id.reply_address(), "counter_reply");
    }

    #[test]
    fn short_type_name_strips_path() {
        struct Local;
        assert_eq!(short_type_name::<Local>(), "Local");
        assert_eq!(short_type_name::<Vec<u8>>(), "Vec");
    }

    #[test]
    fn child_spec_serde_shape() {
        let spec = ChildSpec::transient().with_start_args(vec![json!(5)]);
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["restart"], json!("transient"));
        let back: ChildSpec = serde_json::from_value(value).unwrap();
        assert_eq!(back, spec);
    }
}
