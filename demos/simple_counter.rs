use async_trait::async_trait;
use serde_json::json;
use tokio_otp::{
    arg, Actor, ActorConfig, ActorContext, ActorExt, ActorId, ActorResult, Args, Handled,
    HandlerRegistry, InMemoryTransport, SharedTransport,
};

struct Counter;

async fn increment(value: i64, args: Args, _ctx: ActorContext) -> ActorResult<Handled<i64>> {
    let delta: i64 = arg(&args, 0)?;
    Ok(Handled::no_reply(value + delta))
}

async fn get(value: i64, _args: Args, _ctx: ActorContext) -> ActorResult<Handled<i64>> {
    Ok(Handled::reply(value, value))
}

#[async_trait]
impl Actor for Counter {
    type State = i64;

    async fn init(&self, args: &Args, _ctx: &ActorContext) -> ActorResult<i64> {
        Ok(arg::<Option<i64>>(args, 0)?.unwrap_or_default())
    }

    fn handlers(&self) -> HandlerRegistry<i64> {
        HandlerRegistry::new()
            .on("increment", increment)
            .on("get", get)
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ActorConfig::default();
    let transport: SharedTransport = std::sync::Arc::new(InMemoryTransport::internal(&config.mailbox));
    let counter = Counter.spawn_actor("counter", transport, &config)?;

    counter.handle().cast("increment", vec![json!(2)]).await?;
    counter.handle().cast("increment", vec![json!(2)]).await?;
    let value = counter
        .handle()
        .call(&ActorId::from("main"), "get", Vec::new())
        .await?;
    println!("counter value: {value}");

    counter.shutdown().await?;
    Ok(())
}
