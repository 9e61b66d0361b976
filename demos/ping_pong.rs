//! Two actors calling each other through a shared in-memory transport.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_otp::{
    Actor, ActorContext, ActorExt, ActorId, ActorResult, Args, Handled, HandlerRegistry,
    InMemoryTransport, SharedTransport,
};

struct Pong;

async fn ping(pings: u64, _args: Args, _ctx: ActorContext) -> ActorResult<Handled<u64>> {
    Ok(Handled::reply("pong", pings + 1))
}

async fn pings(pings: u64, _args: Args, _ctx: ActorContext) -> ActorResult<Handled<u64>> {
    Ok(Handled::reply(pings, pings))
}

#[async_trait]
impl Actor for Pong {
    type State = u64;

    async fn init(&self, _args: &Args, _ctx: &ActorContext) -> ActorResult<u64> {
        Ok(0)
    }

    fn handlers(&self) -> HandlerRegistry<u64> {
        HandlerRegistry::new().on("ping", ping).on("count", pings)
    }
}

struct Ping;

async fn send_ping(pongs: u64, _args: Args, ctx: ActorContext) -> ActorResult<Handled<u64>> {
    let reply = ctx.call("pong", "ping", Vec::new()).await?;
    let pongs = if reply == "pong" { pongs + 1 } else { pongs };
    Ok(Handled::no_reply(pongs))
}

async fn pongs(pongs: u64, _args: Args, _ctx: ActorContext) -> ActorResult<Handled<u64>> {
    Ok(Handled::reply(pongs, pongs))
}

#[async_trait]
impl Actor for Ping {
    type State = u64;

    async fn init(&self, _args: &Args, _ctx: &ActorContext) -> ActorResult<u64> {
        Ok(0)
    }

    fn handlers(&self) -> HandlerRegistry<u64> {
        HandlerRegistry::new()
            .on("send_ping", send_ping)
            .on("count", pongs)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let transport: SharedTransport = Arc::new(InMemoryTransport::new("internal", 64));
    let pong = Pong.spawn_actor("pong", transport.clone(), ())?;
    let ping = Ping.spawn_actor("ping", transport.clone(), ())?;

    for _ in 0..10 {
        ping.handle().cast("send_ping", Vec::new()).await?;
    }

    let me = ActorId::from("main");
    let received = ping.handle().call(&me, "count", Vec::new()).await?;
    println!("ping actor received {received} pongs");
    let answered = pong.handle().call(&me, "count", Vec::new()).await?;
    println!("pong actor answered {answered} pings");

    ping.shutdown().await?;
    pong.shutdown().await?;
    Ok(())
}
