#![warn(missing_docs)]
//! Tokio OTP is a Tokio-native actor runtime with supervision trees in the
//! style of OTP: stateful servers reachable only through bounded mailboxes,
//! supervisors that restart them by strategy, and an application that owns
//! the root cancellation signal.
//!
//! # Overview
//! - Actors register one handler per action tag and thread their state by
//!   value through every handler ([`HandlerRegistry`]).
//! - Clients `cast` (fire-and-forget) or `call` (request/reply with a timeout)
//!   through an [`ActorHandle`]. Sends apply backpressure when a mailbox is full.
//! - Supervisors restart children ONE_FOR_ONE or ONE_FOR_ALL, honoring each
//!   child's PERMANENT / TRANSIENT / TEMPORARY policy.
//! - Cancellation is cooperative and flows down the tree through [`Signal`]s.
//! - See `demos/simple_counter.rs` for a runnable end-to-end example.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use tokio_otp::{
//!     arg, Actor, ActorContext, ActorExt, ActorId, ActorResult, Args, Handled,
//!     HandlerRegistry, InMemoryTransport, SharedTransport,
//! };
//!
//! struct Counter;
//!
//! async fn add(value: i64, args: Args, _ctx: ActorContext) -> ActorResult<Handled<i64>> {
//!     let delta: i64 = arg(&args, 0)?;
//!     Ok(Handled::no_reply(value + delta))
//! }
//!
//! #[async_trait]
//! impl Actor for Counter {
//!     type State = i64;
//!
//!     async fn init(&self, _args: &Args, _ctx: &ActorContext) -> ActorResult<i64> {
//!         Ok(0)
//!     }
//!
//!     fn handlers(&self) -> HandlerRegistry<i64> {
//!         HandlerRegistry::new()
//!             .on("add", add)
//!             .on("get", |value: i64, _args, _ctx| async move { Ok(Handled::reply(value, value)) })
//!     }
//! }
//!
//! #[tokio::main(flavor = "multi_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport: SharedTransport = Arc::new(InMemoryTransport::new("internal", 64));
//!     let counter = Counter.spawn_actor("counter", transport, ())?;
//!     counter.handle().cast("add", vec![1.into()]).await?;
//!     let value = counter.handle().call(&ActorId::from("main"), "get", vec![]).await?;
//!     assert_eq!(value, 1);
//!     counter.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod application;
pub mod error;
mod log;
pub mod registry;
pub mod signal;
pub mod supervisor;
pub mod transport;
pub mod types;

pub use actor::{
    context::ActorContext,
    handle::ActorHandle,
    handler::{arg, Effect, Handled, HandlerRegistry},
    runtime::{ActorConfig, ActorRuntime, AdminHandler, MailboxConfig, Server},
    Actor, ActorExt, IntoActorConfig, SpawnedActor,
};
pub use application::{Application, ApplicationSpec};
pub use error::{ActorError, ActorResult, AskError, SendError, SpawnError};
pub use registry::Registry;
pub use signal::{Signal, SignalReader};
pub use supervisor::{
    supervise, Child, ChildFactory, DynamicSupervisor, SharedChild, SupervisionRecords,
    Supervised, Supervisor, SupervisorHandle, SupervisorServer,
};
pub use transport::{CombinedReader, InMemoryTransport, SharedTransport, Transport};
pub use types::{
    ActorId, ActorStatus, Args, ChildRestart, ChildSpec, Envelope, RestartStrategy, StopReason,
};
