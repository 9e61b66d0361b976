//! Explicit action-tag to handler registration.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::actor::context::ActorContext;
use crate::error::{ActorError, ActorResult};
use crate::types::Args;

/// What the runtime does with a handler's result besides adopting the new state.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Nothing is sent back, even if the sender was waiting.
    NoReply,
    /// The value is sent to the caller, if the envelope had one.
    Reply(Value),
}

/// Result of one dispatch: the effect plus the state that replaces the old one.
#[derive(Debug)]
pub struct Handled<S> {
    /// Reply decision.
    pub effect: Effect,
    /// Next state.
    pub state: S,
}

impl<S> Handled<S> {
    /// Replies with `value` and continues with `state`.
    pub fn reply(value: impl Into<Value>, state: S) -> Self {
        Self {
            effect: Effect::Reply(value.into()),
            state,
        }
    }

    /// Continues with `state` without replying.
    pub fn no_reply(state: S) -> Self {
        Self {
            effect: Effect::NoReply,
            state,
        }
    }
}

/// Boxed future returned by stored handlers.
pub type HandlerFuture<S> = BoxFuture<'static, ActorResult<Handled<S>>>;

type Handler<S> = Arc<dyn Fn(S, Args, ActorContext) -> HandlerFuture<S> + Send + Sync>;

/// Mapping from action tag to handler, built once per actor instance.
///
/// ```
/// use tokio_otp::{arg, ActorContext, ActorResult, Args, HandlerRegistry, Handled};
///
/// async fn push(mut stack: Vec<i64>, args: Args, _ctx: ActorContext) -> ActorResult<Handled<Vec<i64>>> {
///     stack.push(arg(&args, 0)?);
///     Ok(Handled::no_reply(stack))
/// }
///
/// let handlers = HandlerRegistry::<Vec<i64>>::new()
///     .on("push", push)
///     .on("pop", |mut stack: Vec<i64>, _args, _ctx| async move {
///         let top = stack.pop();
///         Ok(Handled::reply(top, stack))
///     });
/// assert!(handlers.contains("pop"));
/// ```
pub struct HandlerRegistry<S> {
    handlers: HashMap<String, Handler<S>>,
}

impl<S: Send + 'static> HandlerRegistry<S> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `action`, replacing any previous one.
    pub fn on<F, Fut>(mut self, action: impl Into<String>, handler: F) -> Self
    where
        F: Fn(S, Args, ActorContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActorResult<Handled<S>>> + Send + 'static,
    {
        self.insert(action, handler);
        self
    }

    /// Non-builder form of [`HandlerRegistry::on`].
    pub fn insert<F, Fut>(&mut self, action: impl Into<String>, handler: F)
    where
        F: Fn(S, Args, ActorContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActorResult<Handled<S>>> + Send + 'static,
    {
        let handler: Handler<S> = Arc::new(move |state, args, ctx| handler(state, args, ctx).boxed());
        self.handlers.insert(action.into(), handler);
    }

    /// Returns true if a handler is registered for `action`.
    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true when no action is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub(crate) fn dispatch(
        &self,
        action: &str,
        state: S,
        args: Args,
        ctx: ActorContext,
    ) -> Result<HandlerFuture<S>, S> {
        match self.handlers.get(action) {
            Some(handler) => Ok(handler(state, args, ctx)),
            None => Err(state),
        }
    }
}

impl<S: Send + 'static> Default for HandlerRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for HandlerRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<&String> = self.handlers.keys().collect();
        actions.sort();
        f.debug_struct("HandlerRegistry")
            .field("actions", &actions)
            .finish()
    }
}

/// Decodes positional argument `index`.
///
/// A missing argument decodes from `null`, so `Option<T>` parameters may be
/// omitted by the sender.
pub fn arg<T: DeserializeOwned>(args: &Args, index: usize) -> ActorResult<T> {
    let value = args.get(index).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|err| ActorError::user(format!("argument {index}: {err}")))
}
