//! Single-value cells with change notification.
//!
//! A [`Signal`] is owned by whichever scope needs cooperative cancellation or
//! state broadcast. Dependent tasks get a read-only [`SignalReader`] and can
//! read the latest value, await the next write, or wait until the value
//! satisfies a predicate. Readers may also be derived from other readers with
//! a pure merge function; the actor and supervisor runtimes use this to AND a
//! child's own cancellation with its parent's.
//!
//! Cancellation signals are `Signal<bool>`: `true` means "keep running".

use std::fmt;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use tokio::sync::watch;

/// Owning handle of a signal. Only the owner can write.
pub struct Signal<T> {
    tx: Arc<watch::Sender<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a signal holding `initial`.
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Returns the latest value without blocking.
    pub fn read(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Replaces the value and wakes every awaiter.
    pub fn write(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Returns a read-only handle that can be shared with dependent tasks.
    pub fn reader(&self) -> SignalReader<T> {
        SignalReader {
            source: Source::Cell(self.tx.clone()),
        }
    }
}

impl Signal<bool> {
    /// Flips a cancellation signal to "stop".
    pub fn cancel(&self) {
        self.write(false);
    }

    /// Returns true while the signal has not been cancelled.
    pub fn is_live(&self) -> bool {
        *self.tx.borrow()
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("value", &*self.tx.borrow())
            .finish()
    }
}

type Merge<T> = dyn Fn(&[T]) -> T + Send + Sync;

enum Source<T> {
    Cell(Arc<watch::Sender<T>>),
    Derived {
        sources: Arc<[SignalReader<T>]>,
        merge: Arc<Merge<T>>,
    },
}

impl<T> Clone for Source<T> {
    fn clone(&self) -> Self {
        match self {
            Source::Cell(tx) => Source::Cell(tx.clone()),
            Source::Derived { sources, merge } => Source::Derived {
                sources: sources.clone(),
                merge: merge.clone(),
            },
        }
    }
}

/// Cloneable, read-only view of a [`Signal`] or of a merge over several.
pub struct SignalReader<T> {
    source: Source<T>,
}

impl<T> Clone for SignalReader<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<T> SignalReader<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Builds a derived reader whose value is `merge` applied to the current
    /// values of `sources`, in order. It changes whenever any source changes.
    pub fn derive<F>(sources: Vec<SignalReader<T>>, merge: F) -> Self
    where
        F: Fn(&[T]) -> T + Send + Sync + 'static,
    {
        Self {
            source: Source::Derived {
                sources: sources.into(),
                merge: Arc::new(merge),
            },
        }
    }

    /// A reader that always holds `value` and never changes.
    pub fn constant(value: T) -> Self {
        Self::derive(Vec::new(), move |_| value.clone())
    }

    /// Returns the latest value. Derived readers recompute on every read.
    pub fn read(&self) -> T {
        match &self.source {
            Source::Cell(tx) => tx.borrow().clone(),
            Source::Derived { sources, merge } => {
                let values: Vec<T> = sources.iter().map(SignalReader::read).collect();
                merge(&values)
            }
        }
    }

    /// Suspends until the next write to this signal (or any of its sources)
    /// and resolves with the value observed afterwards.
    pub async fn await_change(&self) -> T {
        let mut receivers = Vec::new();
        self.subscribe(&mut receivers);
        changed_any(&mut receivers).await;
        self.read()
    }

    /// Resolves with the first value that satisfies `predicate`, which may be
    /// the current one.
    pub async fn wait_for<P>(&self, mut predicate: P) -> T
    where
        P: FnMut(&T) -> bool,
    {
        loop {
            let mut receivers = Vec::new();
            self.subscribe(&mut receivers);
            let value = self.read();
            if predicate(&value) {
                return value;
            }
            changed_any(&mut receivers).await;
        }
    }

    // Receivers are marked as seen when subscribed, so a write that lands
    // after subscription always wakes `changed_any`.
    fn subscribe(&self, out: &mut Vec<watch::Receiver<T>>) {
        match &self.source {
            Source::Cell(tx) => out.push(tx.subscribe()),
            Source::Derived { sources, .. } => {
                for source in sources.iter() {
                    source.subscribe(out);
                }
            }
        }
    }
}

impl SignalReader<bool> {
    /// Logical AND over cancellation readers: live only while every source is.
    pub fn all(sources: Vec<SignalReader<bool>>) -> Self {
        Self::derive(sources, |values| values.iter().all(|live| *live))
    }

    /// Returns true while the signal has not been cancelled.
    pub fn is_live(&self) -> bool {
        self.read()
    }

    /// Resolves once the signal reads `false`.
    pub async fn cancelled(&self) {
        self.wait_for(|live| !*live).await;
    }
}

impl<T: Clone + Send + Sync + fmt::Debug + 'static> fmt::Debug for SignalReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            Source::Cell(_) => "cell",
            Source::Derived { .. } => "derived",
        };
        f.debug_struct("SignalReader")
            .field("kind", &kind)
            .field("value", &self.read())
            .finish()
    }
}

fn changed_any<T>(receivers: &mut [watch::Receiver<T>]) -> BoxFuture<'_, ()>
where
    T: Send + Sync,
{
    if receivers.is_empty() {
        return future::pending().boxed();
    }
    let waits = receivers.iter_mut().map(|rx| {
        async move {
            // The sender lives as long as any reader, so this never errors.
            let _ = rx.changed().await;
        }
        .boxed()
    });
    future::select_all(waits).map(|_| ()).boxed()
}
