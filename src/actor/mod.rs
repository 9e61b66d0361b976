//! Core actor traits and the server that runs them.

/// Actor execution context.
pub mod context;
/// Actor handle for external communication.
pub mod handle;
/// Action tag to handler registration.
pub mod handler;
/// Runtime configuration, the shared message runtime and the actor server.
pub mod runtime;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::{ActorResult, SpawnError};
use crate::signal::{Signal, SignalReader};
use crate::supervisor::Child;
use crate::transport::SharedTransport;
use crate::types::{ActorId, ActorStatus, Args, ChildSpec};
use context::ActorContext;
use handle::ActorHandle;
use handler::HandlerRegistry;
use runtime::{ActorConfig, Server};

/// Primary trait implemented by all actors.
///
/// An actor builds its state with `init` and then evolves it one message at a
/// time through the handlers it registers. Each handler receives the current
/// state by value and returns the next one, so no state survives a restart.
#[async_trait]
pub trait Actor: Send + Sync + 'static {
    /// Private state threaded through the handlers.
    type State: Send + 'static;

    /// Builds a fresh state. Runs once per start, including restarts.
    async fn init(&self, args: &Args, ctx: &ActorContext) -> ActorResult<Self::State>;

    /// Registers one handler per accepted action tag.
    fn handlers(&self) -> HandlerRegistry<Self::State>;

    /// Restart and shutdown contract used when this actor is supervised.
    fn child_spec(&self) -> ChildSpec {
        ChildSpec::default()
    }
}

/// Helper trait for flexible ActorConfig parameter.
///
/// This allows passing `()`, `None`, `ActorConfig::default()`, or `&config` to `spawn_actor`.
pub trait IntoActorConfig {
    /// Converts the value into an `ActorConfig`.
    fn into_config(self) -> ActorConfig;
}

impl IntoActorConfig for ActorConfig {
    fn into_config(self) -> ActorConfig {
        self
    }
}

impl IntoActorConfig for &ActorConfig {
    fn into_config(self) -> ActorConfig {
        self.clone()
    }
}

impl IntoActorConfig for Option<ActorConfig> {
    fn into_config(self) -> ActorConfig {
        self.unwrap_or_default()
    }
}

impl IntoActorConfig for () {
    fn into_config(self) -> ActorConfig {
        ActorConfig::default()
    }
}

/// An actor running outside any supervisor.
///
/// Dropping this value does not stop the actor; use [`SpawnedActor::shutdown`]
/// or send `stop` through the handle.
pub struct SpawnedActor<A: Actor> {
    server: Arc<Server<A>>,
    handle: ActorHandle,
    cancel: Signal<bool>,
    task: JoinHandle<ActorResult<()>>,
}

impl<A: Actor> SpawnedActor<A> {
    /// Handle for cast and call.
    pub fn handle(&self) -> &ActorHandle {
        &self.handle
    }

    /// The running server.
    pub fn server(&self) -> &Arc<Server<A>> {
        &self.server
    }

    /// Lifecycle status broadcast.
    pub fn status(&self) -> SignalReader<ActorStatus> {
        self.server.status()
    }

    /// Returns true until the actor's task has finished.
    pub fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cancels the actor and waits for its loops to drain.
    pub async fn shutdown(self) -> ActorResult<()> {
        self.cancel.cancel();
        self.join().await
    }

    /// Waits for the actor to stop on its own.
    pub async fn join(self) -> ActorResult<()> {
        self.task.await?
    }
}

/// Convenience trait for running actors directly from their implementations.
pub trait ActorExt: Actor + Sized {
    /// Binds the actor to `transport` under `id` and starts it on the current
    /// Tokio runtime with the start arguments of its child spec.
    ///
    /// The config parameter is optional - pass `None`, `()`, `ActorConfig::default()`, or `&config`.
    ///
    /// # Errors
    /// Returns [`SpawnError::MissingRuntime`] outside a Tokio runtime.
    fn spawn_actor(
        self,
        id: impl Into<ActorId>,
        transport: SharedTransport,
        config: impl IntoActorConfig,
    ) -> Result<SpawnedActor<Self>, SpawnError> {
        let runtime = Handle::try_current().map_err(|_| SpawnError::MissingRuntime)?;
        let args = self.child_spec().start_args;
        let server = Arc::new(
            Server::new(self, transport)
                .with_id(id)
                .with_config(config.into_config()),
        );
        let handle = server.handle();
        let cancel = Signal::new(true);
        let task = {
            let server = server.clone();
            let scope = cancel.reader();
            runtime.spawn(async move { server.start(args, scope).await })
        };
        Ok(SpawnedActor {
            server,
            handle,
            cancel,
            task,
        })
    }
}

impl<T> ActorExt for T where T: Actor {}
