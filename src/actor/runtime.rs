use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::actor::context::ActorContext;
use crate::actor::handle::ActorHandle;
use crate::actor::handler::{Effect, Handled, HandlerRegistry};
use crate::actor::Actor;
use crate::error::ActorResult;
use crate::log::{debug, info, trace, warn};
use crate::signal::{Signal, SignalReader};
use crate::supervisor::Child;
use crate::transport::{
    CombinedReader, SharedTransport, Transport, DEFAULT_CALL_TIMEOUT, DEFAULT_RECEIVE_TIMEOUT,
    DEFAULT_SEND_TIMEOUT,
};
use crate::types::{ActorId, ActorStatus, Args, ChildSpec, Envelope};

/// Configuration for the actor's mailbox.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    /// The maximum number of messages the mailbox can hold.
    pub capacity: usize,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

impl MailboxConfig {
    /// Sets the mailbox capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Configuration shared by actors, supervisors and the handles they create.
#[derive(Debug, Clone)]
pub struct ActorConfig {
    /// Mailbox configuration, used when building an internal transport.
    pub mailbox: MailboxConfig,
    /// Wait of one iteration of the message and administration loops.
    pub receive_timeout: Duration,
    /// How long a send waits for mailbox space.
    pub send_timeout: Duration,
    /// How long a `call` waits for its reply.
    pub call_timeout: Duration,
    /// Discard buffered messages when the actor is restarted.
    pub reset_on_restart: bool,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox: MailboxConfig::default(),
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            reset_on_restart: true,
        }
    }
}

impl ActorConfig {
    /// Sets the mailbox capacity.
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox.capacity = capacity;
        self
    }

    /// Sets the complete mailbox configuration.
    pub fn with_mailbox(mut self, mailbox: MailboxConfig) -> Self {
        self.mailbox = mailbox;
        self
    }

    /// Sets the receive loop wait.
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Sets the send timeout.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Sets the call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Controls whether a restart discards buffered messages.
    pub fn with_reset_on_restart(mut self, reset: bool) -> Self {
        self.reset_on_restart = reset;
        self
    }
}

/// Extension point for administrative actions beyond `stop`.
///
/// Returning `Some(value)` replies to the sender when it was a `call`.
#[async_trait]
pub trait AdminHandler: Send + Sync {
    /// Handles one envelope received on the management address.
    async fn administer(&self, envelope: &Envelope) -> ActorResult<Option<Value>>;
}

#[async_trait]
impl AdminHandler for () {
    async fn administer(&self, envelope: &Envelope) -> ActorResult<Option<Value>> {
        debug!(action = %envelope.action, "unknown administrative action ignored");
        Ok(None)
    }
}

/// Message plumbing shared by actors and supervisors: an id, one internal
/// transport, any number of external transports and the loops reading them.
pub struct ActorRuntime {
    id: ActorId,
    internal: SharedTransport,
    externals: Vec<SharedTransport>,
    reader: CombinedReader,
    config: ActorConfig,
}

impl ActorRuntime {
    /// Binds `id` to `internal`.
    pub fn new(id: impl Into<ActorId>, internal: SharedTransport, config: ActorConfig) -> Self {
        let reader = CombinedReader::new(vec![internal.clone()]);
        Self {
            id: id.into(),
            internal,
            externals: Vec::new(),
            reader,
            config,
        }
    }

    /// Also listens on `transport`.
    pub fn with_external(mut self, transport: SharedTransport) -> Self {
        self.externals.push(transport);
        self.reader = CombinedReader::new(self.members());
        self
    }

    pub(crate) fn with_id(mut self, id: impl Into<ActorId>) -> Self {
        self.id = id.into();
        self
    }

    pub(crate) fn with_config(mut self, config: ActorConfig) -> Self {
        self.config = config;
        self
    }

    fn members(&self) -> Vec<SharedTransport> {
        std::iter::once(self.internal.clone())
            .chain(self.externals.iter().cloned())
            .collect()
    }

    /// Identifier and inbox address.
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// The transport handles and contexts send on.
    pub fn internal(&self) -> &SharedTransport {
        &self.internal
    }

    /// Active configuration.
    pub fn config(&self) -> &ActorConfig {
        &self.config
    }

    /// Fan-in over the internal and external transports.
    pub fn reader(&self) -> &CombinedReader {
        &self.reader
    }

    /// Finds a bound transport by name.
    pub fn transport(&self, name: &str) -> Option<&SharedTransport> {
        std::iter::once(&self.internal)
            .chain(self.externals.iter())
            .find(|transport| transport.name() == name)
    }

    /// A handle to this runtime's inbox on the internal transport.
    pub fn handle(&self) -> ActorHandle {
        ActorHandle::new(self.id.clone(), self.internal.clone()).with_config(&self.config)
    }

    pub(crate) fn context(&self, status: SignalReader<ActorStatus>) -> ActorContext {
        ActorContext::new(
            self.id.clone(),
            self.internal.clone(),
            self.config.clone(),
            status,
        )
    }

    /// Drops this runtime's own queues, and whatever is still buffered in
    /// them, on every bound transport.
    pub(crate) fn reset_mailbox(&self) {
        let management = self.id.management();
        for transport in std::iter::once(&self.internal).chain(self.externals.iter()) {
            transport.reset_address(self.id.as_str());
            transport.reset_address(&management);
        }
    }

    /// Sends `value` back to the caller of `request` on the transport the
    /// request arrived on. Requests without a caller get nothing.
    pub(crate) async fn reply(&self, request: &Envelope, value: Value) {
        let Some(caller) = &request.caller else {
            return;
        };
        let transport = request
            .transport
            .as_deref()
            .and_then(|name| self.transport(name))
            .unwrap_or(&self.internal);
        let address = caller.reply_address();
        if let Err(err) = transport
            .send(&address, request.reply(value), self.config.send_timeout)
            .await
        {
            warn!(actor_id = %self.id, caller = %caller, error = %err, "reply dropped");
        }
    }

    /// Runs the administration loop until `scope` is cancelled.
    ///
    /// `stop` cancels `local`. Anything else goes to `handler`; an error
    /// from it ends the loop and is returned.
    pub(crate) async fn administer<H>(
        &self,
        local: &Signal<bool>,
        scope: &SignalReader<bool>,
        handler: &H,
    ) -> ActorResult<()>
    where
        H: AdminHandler + ?Sized,
    {
        let address = self.id.management();
        while scope.is_live() {
            let Some(envelope) = self
                .reader
                .receive_one(&address, scope, self.config.receive_timeout)
                .await
            else {
                continue;
            };
            if envelope.action == "stop" {
                info!(actor_id = %self.id, "stop requested");
                local.cancel();
                continue;
            }
            if let Some(value) = handler.administer(&envelope).await? {
                self.reply(&envelope, value).await;
            }
        }
        Ok(())
    }
}

/// An [`Actor`] composed with the runtime that drives it.
///
/// Implements [`Child`], so it can be supervised; every `start` builds a fresh
/// state with `init`.
pub struct Server<A: Actor> {
    actor: A,
    runtime: ActorRuntime,
    status: Signal<ActorStatus>,
    starts: AtomicUsize,
}

impl<A: Actor> Server<A> {
    /// Binds `actor` to `transport` under a generated id.
    pub fn new(actor: A, transport: SharedTransport) -> Self {
        Self {
            actor,
            runtime: ActorRuntime::new(ActorId::generate(), transport, ActorConfig::default()),
            status: Signal::new(ActorStatus::Created),
            starts: AtomicUsize::new(0),
        }
    }

    /// Uses a fixed id instead of a generated one.
    pub fn with_id(mut self, id: impl Into<ActorId>) -> Self {
        self.runtime = self.runtime.with_id(id);
        self
    }

    /// Also listens on `transport`.
    pub fn with_external(mut self, transport: SharedTransport) -> Self {
        self.runtime = self.runtime.with_external(transport);
        self
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: ActorConfig) -> Self {
        self.runtime = self.runtime.with_config(config);
        self
    }

    /// The wrapped actor.
    pub fn actor(&self) -> &A {
        &self.actor
    }

    /// The runtime bindings.
    pub fn runtime(&self) -> &ActorRuntime {
        &self.runtime
    }

    /// A handle addressing this actor on its internal transport.
    pub fn handle(&self) -> ActorHandle {
        self.runtime.handle()
    }

    /// Lifecycle status broadcast.
    pub fn status(&self) -> SignalReader<ActorStatus> {
        self.status.reader()
    }

    /// How many times `start` has been entered.
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    // Queues are kept across runs only when a restart should see them.
    fn release_mailbox(&self) {
        if self.runtime.config().reset_on_restart {
            self.runtime.reset_mailbox();
        }
    }

    async fn run_messages(
        &self,
        handlers: &HandlerRegistry<A::State>,
        mut state: A::State,
        ctx: &ActorContext,
        scope: &SignalReader<bool>,
    ) -> ActorResult<()> {
        let id = self.runtime.id();
        let receive_timeout = self.runtime.config().receive_timeout;
        while scope.is_live() {
            let Some(mut envelope) = self
                .runtime
                .reader()
                .receive_one(id.as_str(), scope, receive_timeout)
                .await
            else {
                continue;
            };
            trace!(actor_id = %id, action = %envelope.action, "dispatching");
            let args = std::mem::take(&mut envelope.payload);
            let request = ctx.for_request(envelope.caller.clone());
            let pending = match handlers.dispatch(&envelope.action, state, args, request) {
                Ok(pending) => pending,
                Err(unchanged) => {
                    debug!(actor_id = %id, action = %envelope.action, "no handler, message ignored");
                    state = unchanged;
                    continue;
                }
            };
            let Handled { effect, state: next } = pending.await.map_err(|err| {
                warn!(actor_id = %id, action = %envelope.action, error = %err, "handler failed");
                err
            })?;
            state = next;
            if let Effect::Reply(value) = effect {
                self.runtime.reply(&envelope, value).await;
            }
        }
        self.status.write(ActorStatus::Stopping);
        Ok(())
    }
}

#[async_trait]
impl<A: Actor> Child for Server<A> {
    fn id(&self) -> ActorId {
        self.runtime.id().clone()
    }

    fn child_spec(&self) -> ChildSpec {
        self.actor.child_spec()
    }

    async fn start(&self, args: Args, cancel: SignalReader<bool>) -> ActorResult<()> {
        let local = Signal::new(true);
        let scope = SignalReader::all(vec![cancel, local.reader()]);
        let previous = self.starts.fetch_add(1, Ordering::SeqCst);
        if previous > 0 && self.runtime.config().reset_on_restart {
            self.runtime.reset_mailbox();
        }

        self.status.write(ActorStatus::Initializing);
        let ctx = self.runtime.context(self.status.reader());
        let state = match self.actor.init(&args, &ctx).await {
            Ok(state) => state,
            Err(err) => {
                warn!(actor_id = %self.runtime.id(), error = %err, "init failed");
                self.release_mailbox();
                self.status.write(ActorStatus::Failed);
                return Err(err);
            }
        };
        self.status.write(ActorStatus::Running);
        info!(actor_id = %self.runtime.id(), start = previous + 1, "actor running");

        let handlers = self.actor.handlers();
        let messages = async {
            let outcome = self.run_messages(&handlers, state, &ctx, &scope).await;
            local.cancel();
            outcome
        };
        let (outcome, admin) = tokio::join!(messages, self.runtime.administer(&local, &scope, &()));
        let outcome = outcome.and(admin);
        self.release_mailbox();

        self.status.write(if outcome.is_ok() {
            ActorStatus::Stopped
        } else {
            ActorStatus::Failed
        });
        info!(actor_id = %self.runtime.id(), ok = outcome.is_ok(), "actor stopped");
        outcome
    }
}
