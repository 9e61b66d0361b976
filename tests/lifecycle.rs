use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::timeout;
use tokio_otp::{
    arg, Actor, ActorContext, ActorError, ActorExt, ActorId, ActorResult, ActorStatus, Args,
    Child, Handled, HandlerRegistry, InMemoryTransport, Server, SharedTransport, Signal,
};

struct Counter {
    inits: Arc<AtomicUsize>,
}

impl Counter {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let inits = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inits: inits.clone(),
            },
            inits,
        )
    }
}

async fn add(value: i64, args: Args, _ctx: ActorContext) -> ActorResult<Handled<i64>> {
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
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(arg::<Option<i64>>(args, 0)?.unwrap_or(0))
    }

    fn handlers(&self) -> HandlerRegistry<i64> {
        HandlerRegistry::new().on("add", add).on("get", get)
    }
}

struct Broken;

#[async_trait]
impl Actor for Broken {
    type State = ();

    async fn init(&self, _args: &Args, _ctx: &ActorContext) -> ActorResult<()> {
        Err(ActorError::user("cannot initialize"))
    }

    fn handlers(&self) -> HandlerRegistry<()> {
        HandlerRegistry::new()
    }
}

fn transport() -> SharedTransport {
    Arc::new(InMemoryTransport::new("internal", 16))
}

fn client() -> ActorId {
    ActorId::from("client")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_follows_the_lifecycle() {
    let (counter, inits) = Counter::new();
    let server = Server::new(counter, transport()).with_id("counter");
    let status = server.status();
    assert_eq!(status.read(), ActorStatus::Created);

    let server = Arc::new(server);
    let cancel = Signal::new(true);
    let task = {
        let server = server.clone();
        let cancel = cancel.reader();
        tokio::spawn(async move { server.start(vec![json!(40)], cancel).await })
    };
    status
        .wait_for(|status| *status == ActorStatus::Running)
        .await;
    assert_eq!(inits.load(Ordering::SeqCst), 1);

    server.handle().cast("add", vec![json!(2)]).await.unwrap();
    let value = server.handle().call(&client(), "get", vec![]).await.unwrap();
    assert_eq!(value, 42);

    cancel.cancel();
    timeout(Duration::from_secs(1), task)
        .await
        .expect("cancellation ends start")
        .unwrap()
        .unwrap();
    assert_eq!(status.read(), ActorStatus::Stopped);
}

#[tokio::test]
async fn init_failure_marks_the_actor_failed() {
    let actor = Broken.spawn_actor("broken", transport(), ()).unwrap();
    let status = actor.status();
    let outcome = actor.join().await;
    assert_eq!(outcome, Err(ActorError::user("cannot initialize")));
    assert_eq!(status.read(), ActorStatus::Failed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn restart_builds_fresh_state_and_drops_stale_messages() {
    let (counter, inits) = Counter::new();
    let server = Arc::new(Server::new(counter, transport()).with_id("counter"));
    let status = server.status();

    let first = Signal::new(true);
    let run = {
        let server = server.clone();
        let cancel = first.reader();
        tokio::spawn(async move { server.start(Vec::new(), cancel).await })
    };
    status
        .wait_for(|status| *status == ActorStatus::Running)
        .await;
    server.handle().cast("add", vec![json!(5)]).await.unwrap();
    assert_eq!(server.handle().call(&client(), "get", vec![]).await.unwrap(), 5);
    first.cancel();
    run.await.unwrap().unwrap();

    // Buffered while nobody is running; the restart discards it.
    server.handle().cast("add", vec![json!(100)]).await.unwrap();

    let second = Signal::new(true);
    let run = {
        let server = server.clone();
        let cancel = second.reader();
        tokio::spawn(async move { server.start(Vec::new(), cancel).await })
    };
    status
        .wait_for(|status| *status == ActorStatus::Running)
        .await;
    assert_eq!(server.handle().call(&client(), "get", vec![]).await.unwrap(), 0);
    assert_eq!(inits.load(Ordering::SeqCst), 2);
    assert_eq!(server.start_count(), 2);

    second.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stale_messages_survive_when_reset_is_disabled() {
    let (counter, _) = Counter::new();
    let server = Arc::new(
        Server::new(counter, transport())
            .with_id("counter")
            .with_config(tokio_otp::ActorConfig::default().with_reset_on_restart(false)),
    );

    let first = Signal::new(true);
    first.cancel();
    server.start(Vec::new(), first.reader()).await.unwrap();

    server.handle().cast("add", vec![json!(3)]).await.unwrap();
    let second = Signal::new(true);
    let run = {
        let server = server.clone();
        let cancel = second.reader();
        tokio::spawn(async move { server.start(Vec::new(), cancel).await })
    };
    assert_eq!(server.handle().call(&client(), "get", vec![]).await.unwrap(), 3);
    second.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stopped_actors_release_their_addresses() {
    let memory = InMemoryTransport::shared("internal", 16);
    let transport: SharedTransport = memory.clone();
    assert_eq!(memory.address_count(), 0);

    for n in 0..20 {
        let (counter, _) = Counter::new();
        let actor = counter
            .spawn_actor(format!("counter-{n}"), transport.clone(), ())
            .unwrap();
        actor.handle().cast("add", vec![json!(n)]).await.unwrap();
        let value = actor.handle().call(&client(), "get", vec![]).await.unwrap();
        assert_eq!(value, n);
        actor.shutdown().await.unwrap();
    }
    assert_eq!(memory.address_count(), 0, "inbox, management and reply queues are gone");
}
