use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_otp::{
    Actor, ActorContext, ActorError, ActorId, ActorResult, ActorStatus, Args, Child, ChildSpec,
    Handled, HandlerRegistry, InMemoryTransport, RestartStrategy, Server, SharedTransport, Signal,
    Supervised, Supervisor, SupervisorHandle, SupervisorServer,
};

struct Worker {
    spec: ChildSpec,
}

async fn crash(_state: (), _args: Args, _ctx: ActorContext) -> ActorResult<Handled<()>> {
    Err(ActorError::user("crash requested"))
}

async fn ping(state: (), _args: Args, _ctx: ActorContext) -> ActorResult<Handled<()>> {
    Ok(Handled::reply("pong", state))
}

#[async_trait]
impl Actor for Worker {
    type State = ();

    async fn init(&self, _args: &Args, _ctx: &ActorContext) -> ActorResult<()> {
        Ok(())
    }

    fn handlers(&self) -> HandlerRegistry<()> {
        HandlerRegistry::new().on("crash", crash).on("ping", ping)
    }

    fn child_spec(&self) -> ChildSpec {
        self.spec.clone()
    }
}

fn worker(id: &str, spec: ChildSpec, transport: &SharedTransport) -> Arc<Server<Worker>> {
    Arc::new(Server::new(Worker { spec }, transport.clone()).with_id(id))
}

struct Group {
    name: &'static str,
    members: Vec<Arc<Server<Worker>>>,
}

impl Supervisor for Group {
    fn name(&self) -> ActorId {
        ActorId::from(self.name)
    }

    fn children(&self) -> Vec<Supervised> {
        self.members
            .iter()
            .map(|member| Supervised::new(member.clone()))
            .collect()
    }
}

struct Outer {
    inner: Arc<SupervisorServer<Inner>>,
}

struct Inner {
    member: Arc<Server<Worker>>,
}

impl Supervisor for Inner {
    fn children(&self) -> Vec<Supervised> {
        vec![Supervised::new(self.member.clone())]
    }
}

impl Supervisor for Outer {
    fn children(&self) -> Vec<Supervised> {
        vec![Supervised::new(self.inner.clone())]
    }
}

fn transport() -> SharedTransport {
    Arc::new(InMemoryTransport::new("internal", 64))
}

fn client() -> ActorId {
    ActorId::from("client")
}

async fn eventually(what: &str, check: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while !check() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        sleep(Duration::from_millis(10)).await;
    }
}

fn run<C: Child>(child: &Arc<C>, args: Args, cancel: &Signal<bool>) -> JoinHandle<ActorResult<()>> {
    let child = child.clone();
    let cancel = cancel.reader();
    tokio::spawn(async move { child.start(args, cancel).await })
}

fn running(server: &Server<Worker>) -> bool {
    server.status().read() == ActorStatus::Running
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_for_all_restarts_the_whole_group() {
    let transport = transport();
    let a = worker("a", ChildSpec::permanent(), &transport);
    let b = worker("b", ChildSpec::permanent(), &transport);
    let c = worker("c", ChildSpec::temporary(), &transport);
    let supervisor = Arc::new(SupervisorServer::new(
        Group {
            name: "group",
            members: vec![a.clone(), b.clone(), c.clone()],
        },
        transport.clone(),
    ));
    let cancel = Signal::new(true);
    let task = run(&supervisor, vec![RestartStrategy::OneForAll.into()], &cancel);

    eventually("group running", || running(&a) && running(&b) && running(&c)).await;
    a.handle().cast("crash", vec![]).await.unwrap();

    eventually("second generation", || {
        a.start_count() == 2 && b.start_count() == 2 && running(&a) && running(&b)
    })
    .await;
    // The temporary member was torn down with the group and left out.
    assert_eq!(c.start_count(), 1);
    assert_eq!(c.status().read(), ActorStatus::Stopped);

    let ids = supervisor.handle().lookup(&client()).await.unwrap();
    assert_eq!(ids, vec![ActorId::from("a"), ActorId::from("b")]);

    cancel.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_for_one_restarts_only_the_failed_child() {
    let transport = transport();
    let permanent = worker("permanent", ChildSpec::permanent(), &transport);
    let transient = worker("transient", ChildSpec::transient(), &transport);
    let temporary = worker("temporary", ChildSpec::temporary(), &transport);
    let bystander = worker("bystander", ChildSpec::permanent(), &transport);
    let supervisor = Arc::new(SupervisorServer::new(
        Group {
            name: "group",
            members: vec![
                permanent.clone(),
                transient.clone(),
                temporary.clone(),
                bystander.clone(),
            ],
        },
        transport.clone(),
    ));
    let cancel = Signal::new(true);
    let task = run(&supervisor, vec![RestartStrategy::OneForOne.into()], &cancel);

    eventually("children running", || {
        [&permanent, &transient, &temporary, &bystander]
            .iter()
            .all(|server| running(server))
    })
    .await;

    for server in [&permanent, &transient, &temporary] {
        server.handle().cast("crash", vec![]).await.unwrap();
    }
    eventually("restarts", || {
        permanent.start_count() == 2
            && transient.start_count() == 2
            && running(&permanent)
            && running(&transient)
    })
    .await;
    // A normal stop is not a reason to restart a transient child.
    transient.handle().stop().await.unwrap();
    eventually("transient retired", || supervisor.records().len() == 2).await;

    assert_eq!(temporary.start_count(), 1);
    assert_eq!(transient.start_count(), 2);
    assert_eq!(bystander.start_count(), 1, "siblings are unaffected");

    let ids = supervisor.handle().lookup(&client()).await.unwrap();
    assert_eq!(
        ids,
        vec![ActorId::from("permanent"), ActorId::from("bystander")]
    );

    cancel.cancel();
    task.await.unwrap().unwrap();
    assert_eq!(bystander.status().read(), ActorStatus::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_child_removes_exactly_one_child() {
    let transport = transport();
    let alpha = worker("alpha", ChildSpec::permanent(), &transport);
    let beta = worker("beta", ChildSpec::permanent(), &transport);
    let supervisor = Arc::new(SupervisorServer::new(
        Group {
            name: "pair",
            members: vec![alpha.clone(), beta.clone()],
        },
        transport.clone(),
    ));
    let cancel = Signal::new(true);
    let task = run(&supervisor, vec![json!(0)], &cancel);
    eventually("both registered", || supervisor.records().len() == 2).await;

    let handle = SupervisorHandle::new("pair", transport.clone());
    assert_eq!(handle.lookup(&client()).await.unwrap().len(), 2);

    handle.stop_child(&ActorId::from("unknown")).await.unwrap();
    assert_eq!(handle.lookup(&client()).await.unwrap().len(), 2);

    handle.stop_child(&ActorId::from("alpha")).await.unwrap();
    let ids = handle.lookup(&client()).await.unwrap();
    assert_eq!(ids, vec![ActorId::from("beta")]);

    eventually("alpha stopped", || {
        alpha.status().read() == ActorStatus::Stopped
    })
    .await;
    assert_eq!(alpha.start_count(), 1, "stopped children are not restarted");
    let pong = beta.handle().call(&client(), "ping", vec![]).await.unwrap();
    assert_eq!(pong, "pong");

    cancel.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn nested_supervisors_register_under_their_name() {
    let transport = transport();
    let member = worker("leaf", ChildSpec::permanent(), &transport);
    let inner = Arc::new(SupervisorServer::new(
        Inner {
            member: member.clone(),
        },
        transport.clone(),
    ));
    let outer = Arc::new(SupervisorServer::new(
        Outer {
            inner: inner.clone(),
        },
        transport.clone(),
    ));
    let cancel = Signal::new(true);
    let task = run(&outer, vec![RestartStrategy::OneForOne.into()], &cancel);
    eventually("leaf running", || running(&member)).await;

    let ids = outer.handle().lookup(&client()).await.unwrap();
    assert_eq!(ids, vec![ActorId::from("Inner")]);
    let ids = inner.handle().lookup(&client()).await.unwrap();
    assert_eq!(ids, vec![ActorId::from("leaf")]);

    // Stopping the outer supervisor cascades down to the leaf.
    outer.handle().stop().await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("stop cascades")
        .unwrap()
        .unwrap();
    assert_eq!(member.status().read(), ActorStatus::Stopped);
    assert!(cancel.is_live(), "only the supervisor's own signal flipped");
}

#[tokio::test]
async fn unrecognized_strategy_supervises_nothing() {
    let transport = transport();
    let idle = worker("idle", ChildSpec::permanent(), &transport);
    let supervisor = Arc::new(SupervisorServer::new(
        Group {
            name: "odd",
            members: vec![idle.clone()],
        },
        transport.clone(),
    ));
    let cancel = Signal::new(true);
    let task = run(&supervisor, vec![json!(9)], &cancel);

    let ids = supervisor.handle().lookup(&client()).await.unwrap();
    assert!(ids.is_empty());
    assert_eq!(idle.start_count(), 0);

    cancel.cancel();
    task.await.unwrap().unwrap();
}
