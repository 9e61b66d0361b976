//! An actor reachable on two transports: the internal one and a shared bus.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_otp::{
    arg, Actor, ActorContext, ActorHandle, ActorId, ActorResult, Args, Child, Handled,
    HandlerRegistry, InMemoryTransport, Server, SharedTransport, Signal,
};

struct Responder;

async fn deliver(
    mut received: Vec<String>,
    args: Args,
    _ctx: ActorContext,
) -> ActorResult<Handled<Vec<String>>> {
    received.push(arg(&args, 0)?);
    Ok(Handled::no_reply(received))
}

async fn count(received: Vec<String>, _args: Args, _ctx: ActorContext) -> ActorResult<Handled<Vec<String>>> {
    Ok(Handled::reply(received.len(), received))
}

#[async_trait]
impl Actor for Responder {
    type State = Vec<String>;

    async fn init(&self, _args: &Args, _ctx: &ActorContext) -> ActorResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn handlers(&self) -> HandlerRegistry<Vec<String>> {
        HandlerRegistry::new()
            .on("deliver", deliver)
            .on("count", count)
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let internal: SharedTransport = Arc::new(InMemoryTransport::new("internal", 64));
    let bus: SharedTransport = Arc::new(InMemoryTransport::new("bus", 64));
    let responder = Arc::new(
        Server::new(Responder, internal)
            .with_id("responder")
            .with_external(bus.clone()),
    );

    let cancel = Signal::new(true);
    let task = {
        let responder = responder.clone();
        let cancel = cancel.reader();
        tokio::spawn(async move { responder.start(Vec::new(), cancel).await })
    };

    responder.handle().cast("deliver", vec!["from inside".into()]).await?;
    let remote = ActorHandle::new("responder", bus);
    remote.cast("deliver", vec!["over the bus".into()]).await?;

    let count = remote
        .call(&ActorId::from("remote-client"), "count", Vec::new())
        .await?;
    println!("responder received {count} messages");

    cancel.cancel();
    task.await??;
    Ok(())
}
