//! The restart engine shared by supervisors and the application.

use futures::future::{self, FutureExt};

use crate::log::{debug, info, warn};
use crate::signal::{Signal, SignalReader};
use crate::supervisor::child::{SharedChild, Supervised};
use crate::supervisor::records::SupervisionRecords;
use crate::types::{Args, RestartStrategy, StopReason};

/// Runs `children` under `strategy` until they stop qualifying for restart
/// or `cancel` reads `false`.
///
/// - ONE_FOR_ONE: every child restarts independently; returns an empty set
///   once every child loop has ended.
/// - ONE_FOR_ALL: runs one generation. The first child to exit tears down the
///   rest, and the children that qualify for a restart are returned so the
///   caller can start the next generation. Returns an empty set if `cancel`
///   was flipped.
/// - Unrecognized strategies supervise nothing and return an empty set.
///
/// An empty `children` list returns immediately.
pub async fn supervise(
    children: Vec<Supervised>,
    strategy: RestartStrategy,
    cancel: &SignalReader<bool>,
    records: &SupervisionRecords,
) -> Vec<Supervised> {
    if children.is_empty() {
        return Vec::new();
    }
    match strategy {
        RestartStrategy::OneForOne => {
            let loops = children
                .into_iter()
                .map(|entry| keep_running(entry, cancel.clone(), records.clone()));
            future::join_all(loops).await;
            Vec::new()
        }
        RestartStrategy::OneForAll => one_for_all(children, cancel, records).await,
        RestartStrategy::Unrecognized(code) => {
            warn!(strategy = code, "unrecognized restart strategy, nothing supervised");
            Vec::new()
        }
    }
}

/// Runs one child to completion on its own task and classifies the exit.
///
/// A panic is contained by the task and reported as a failure.
pub(crate) async fn run_child(child: SharedChild, args: Args, scope: SignalReader<bool>) -> StopReason {
    let task = {
        let child = child.clone();
        let scope = scope.clone();
        tokio::spawn(async move { child.start(args, scope).await })
    };
    let reason = match task.await {
        Ok(Ok(())) if !scope.is_live() => StopReason::Cancelled,
        Ok(Ok(())) => StopReason::Normal,
        Ok(Err(err)) => StopReason::Failure(err),
        Err(err) => StopReason::Failure(err.into()),
    };
    debug!(child = %child.id(), exit = %reason, "child exited");
    reason
}

/// ONE_FOR_ONE loop of a single child: restart while the spec allows it and
/// neither the parent nor `stop_child` cancelled it.
pub(crate) async fn keep_running(
    entry: Supervised,
    cancel: SignalReader<bool>,
    records: SupervisionRecords,
) {
    let id = entry.id();
    let (slot, private) = records.register(id.clone());
    let scope = SignalReader::all(vec![cancel, private]);
    loop {
        let reason = run_child(
            entry.child.clone(),
            entry.spec.start_args.clone(),
            scope.clone(),
        )
        .await;
        if !scope.is_live() {
            break;
        }
        if !entry.spec.restart.should_restart(&reason) {
            info!(child = %id, exit = %reason, "child not restarted");
            break;
        }
        info!(child = %id, exit = %reason, "restarting child");
    }
    records.retire(slot);
}

async fn one_for_all(
    children: Vec<Supervised>,
    cancel: &SignalReader<bool>,
    records: &SupervisionRecords,
) -> Vec<Supervised> {
    records.reset();
    let group = Signal::new(true);
    let mut privates = Vec::with_capacity(children.len());
    let mut runs = Vec::with_capacity(children.len());
    for (position, entry) in children.iter().enumerate() {
        let (_, private) = records.register(entry.id());
        let scope = SignalReader::all(vec![cancel.clone(), group.reader(), private.clone()]);
        privates.push(private);
        let run = run_child(entry.child.clone(), entry.spec.start_args.clone(), scope);
        runs.push(async move { (position, run.await) }.boxed());
    }

    let ((first, trigger), _, rest) = future::select_all(runs).await;
    debug!(child = %children[first].id(), exit = %trigger, "group torn down");
    group.cancel();
    let mut reasons: Vec<Option<StopReason>> = vec![None; children.len()];
    for (position, reason) in future::join_all(rest).await {
        reasons[position] = Some(reason);
    }
    reasons[first] = Some(trigger.clone());
    records.reset();

    if !cancel.is_live() {
        return Vec::new();
    }
    children
        .into_iter()
        .zip(privates)
        .zip(reasons)
        .filter_map(|((entry, private), reason)| {
            if !private.is_live() {
                return None;
            }
            // Siblings cancelled by the teardown share the trigger's exit.
            let reason = match reason {
                Some(StopReason::Cancelled) | None => trigger.clone(),
                Some(reason) => reason,
            };
            entry.spec.restart.should_restart(&reason).then_some(entry)
        })
        .collect()
}
