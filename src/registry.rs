//! A name registry built as an ordinary actor.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::actor::context::ActorContext;
use crate::actor::handle::ActorHandle;
use crate::actor::handler::{arg, Handled, HandlerRegistry};
use crate::actor::runtime::Server;
use crate::actor::Actor;
use crate::error::{ActorResult, AskError, SendError};
use crate::transport::SharedTransport;
use crate::types::{ActorId, Args};

type Entries = HashMap<String, Vec<String>>;

/// Maps keys to the list of values registered under them.
///
/// - `register [key, value]` appends `value` (cast, no reply).
/// - `lookup [selector]` replies with the values for `selector`, or `[]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Registry;

impl Registry {
    /// Fixed id the registry is addressed by.
    pub const ID: &'static str = "Registry";

    /// A server for the registry under [`Registry::ID`].
    pub fn server(transport: SharedTransport) -> Server<Registry> {
        Server::new(Registry, transport).with_id(Self::ID)
    }

    /// A handle to the registry on `transport`.
    pub fn handle(transport: SharedTransport) -> ActorHandle {
        ActorHandle::new(Self::ID, transport)
    }

    /// Appends `value` under `key`.
    pub async fn register(
        registry: &ActorHandle,
        key: &str,
        value: &str,
    ) -> Result<(), SendError> {
        registry
            .cast("register", vec![Value::from(key), Value::from(value)])
            .await
    }

    /// Returns every value registered under `selector`.
    pub async fn lookup(
        registry: &ActorHandle,
        caller: &ActorId,
        selector: &str,
    ) -> Result<Vec<String>, AskError> {
        let reply = registry
            .call(caller, "lookup", vec![Value::from(selector)])
            .await?;
        serde_json::from_value(reply).map_err(|err| AskError::Malformed(err.to_string()))
    }
}

async fn register(mut entries: Entries, args: Args, _ctx: ActorContext) -> ActorResult<Handled<Entries>> {
    let key: String = arg(&args, 0)?;
    let value: String = arg(&args, 1)?;
    entries.entry(key).or_default().push(value);
    Ok(Handled::no_reply(entries))
}

async fn lookup(entries: Entries, args: Args, _ctx: ActorContext) -> ActorResult<Handled<Entries>> {
    let selector: String = arg(&args, 0)?;
    let values = entries.get(&selector).cloned().unwrap_or_default();
    Ok(Handled::reply(values, entries))
}

#[async_trait]
impl Actor for Registry {
    type State = Entries;

    async fn init(&self, _args: &Args, _ctx: &ActorContext) -> ActorResult<Entries> {
        Ok(HashMap::new())
    }

    fn handlers(&self) -> HandlerRegistry<Entries> {
        HandlerRegistry::new()
            .on("register", register)
            .on("lookup", lookup)
    }
}
