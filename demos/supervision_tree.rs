//! A small application: a registry, a supervised worker pair and a pool of
//! dynamically started echo actors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_otp::{
    Actor, ActorContext, ActorError, ActorId, ActorResult, Application, ApplicationSpec, Args,
    ChildSpec, DynamicSupervisor, Handled, HandlerRegistry, InMemoryTransport, Registry,
    RestartStrategy, Server, SharedChild, SharedTransport, Supervised, Supervisor,
    SupervisorServer,
};

struct Worker;

#[async_trait]
impl Actor for Worker {
    type State = u32;

    async fn init(&self, _args: &Args, ctx: &ActorContext) -> ActorResult<u32> {
        Registry::register(&ctx.handle(Registry::ID), "workers", ctx.actor_id().as_str()).await?;
        Ok(0)
    }

    fn handlers(&self) -> HandlerRegistry<u32> {
        HandlerRegistry::new()
            .on("work", |done: u32, _args, _ctx| async move {
                Ok(Handled::reply(done + 1, done + 1))
            })
            .on("crash", |_done: u32, _args, _ctx| async move {
                Err::<Handled<u32>, _>(ActorError::user("asked to crash"))
            })
    }

    fn child_spec(&self) -> ChildSpec {
        ChildSpec::permanent().with_shutdown(Duration::from_secs(1))
    }
}

struct Workers {
    transport: SharedTransport,
}

impl Supervisor for Workers {
    fn children(&self) -> Vec<Supervised> {
        ["worker-1", "worker-2"]
            .into_iter()
            .map(|id| {
                let server: SharedChild = Arc::new(Server::new(Worker, self.transport.clone()).with_id(id));
                Supervised::new(server)
            })
            .collect()
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let transport: SharedTransport = Arc::new(InMemoryTransport::new("internal", 64));
    let workers = Arc::new(SupervisorServer::new(
        Workers {
            transport: transport.clone(),
        },
        transport.clone(),
    ));
    let pool_transport = transport.clone();
    let pool = Arc::new(DynamicSupervisor::new("pool", transport.clone()).register(
        "worker",
        move || -> SharedChild { Arc::new(Server::new(Worker, pool_transport.clone())) },
    ));

    let spec = ApplicationSpec::new(RestartStrategy::OneForOne)
        .with_child(Arc::new(Registry::server(transport.clone())))
        .with_child(workers.clone())
        .with_child(pool.clone());
    let app = Arc::new(Application::new(spec));
    let running = app.clone().spawn();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let me = ActorId::from("main");
    let extra = pool.handle().start_child(&me, "worker", None).await?;
    println!("pool started {extra}");

    let worker = tokio_otp::ActorHandle::new("worker-1", transport.clone());
    worker.cast("crash", Vec::new()).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let done = worker.call(&me, "work", Vec::new()).await?;
    println!("worker-1 restarted with fresh state, work count {done}");

    let registry = Registry::handle(transport.clone());
    let registered = Registry::lookup(&registry, &me, "workers").await?;
    println!("registered workers: {registered:?}");
    println!("supervised by Workers: {:?}", workers.handle().lookup(&me).await?);

    let drained = app.stop().await;
    running.await?;
    println!("application stopped (drained: {drained})");
    Ok(())
}
