//! The concurrent event dispatcher.
//!
//! The dispatcher delivers every emitted event to every listener registered
//! for that name, isolating each listener's failure, while bounding total
//! in-flight concurrency with a fixed worker pool over a bounded queue.
//!
//! ```rust,ignore
//! use ferrite_core::{Dispatcher, DispatcherConfig, ListenerOptions};
//!
//! let dispatcher = Dispatcher::new(DispatcherConfig::default());
//!
//! dispatcher.on("message_create", |event| async move {
//!     println!("got {:?}", event.args());
//!     Ok(())
//! }, ListenerOptions::new());
//!
//! let accepted = dispatcher.emit("message_create", vec![]);
//! ```
//!
//! # Ordering
//!
//! Within one emit, listeners run in priority order (registration order
//! breaks ties). Across emits of the same name, only FIFO admission to the
//! worker pool is guaranteed; concurrent workers may interleave.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::ListenerError;
use crate::event::Event;

use super::listener::{
    EventHandler, Handler, HandlerError, ListenerEntry, ListenerId, ListenerOptions, MiddlewareId,
};
use super::metrics::{DispatchMetrics, MetricsSnapshot};
use super::middleware::{Middleware, MiddlewareContext, MiddlewarePhase};
use super::registry::Registry;

/// Configuration for a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Capacity of the bounded event queue. Emits beyond this are rejected.
    pub queue_capacity: usize,
    /// Number of concurrent worker tasks pulling from the queue.
    pub workers: usize,
    /// Timeout applied to listeners that do not set their own.
    pub default_listener_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            workers: 4,
            default_listener_timeout: Duration::from_secs(30),
        }
    }
}

/// Shared state between the dispatcher handle and its workers.
struct Inner {
    registry: Registry,
    metrics: DispatchMetrics,
    default_timeout: Duration,
    cancel: CancellationToken,
}

/// The central event dispatcher.
///
/// Owns its listener registry and metrics; no process-wide state. Cheap to
/// share behind an `Arc`. All registration methods take `&self`.
pub struct Dispatcher {
    inner: Arc<Inner>,
    queue_tx: mpsc::Sender<Event>,
    workers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Creates a dispatcher and spawns its worker pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: DispatcherConfig) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel::<Event>(config.queue_capacity.max(1));
        let inner = Arc::new(Inner {
            registry: Registry::new(),
            metrics: DispatchMetrics::new(),
            default_timeout: config.default_listener_timeout,
            cancel: CancellationToken::new(),
        });

        let queue_rx = Arc::new(tokio::sync::Mutex::new(queue_rx));
        let worker_count = config.workers.max(1);
        let workers = (0..worker_count)
            .map(|index| {
                let inner = Arc::clone(&inner);
                let queue_rx = Arc::clone(&queue_rx);
                tokio::spawn(worker_loop(index, inner, queue_rx))
            })
            .collect();

        debug!(
            workers = worker_count,
            capacity = config.queue_capacity,
            "Dispatcher started"
        );

        Self {
            inner,
            queue_tx,
            workers: parking_lot::Mutex::new(workers),
        }
    }

    /// Emits an event: non-blocking enqueue.
    ///
    /// Returns `false` when the bounded queue is full (deliberate
    /// backpressure, not an error) or the dispatcher is shut down. The caller
    /// never learns about individual listener outcomes here; those are
    /// observed through error-middleware or [`Dispatcher::metrics`].
    pub fn emit(&self, name: impl Into<String>, args: Vec<Value>) -> bool {
        let event = Event::new(name, args);
        match self.queue_tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                debug!(event = %event.name(), "Dispatch queue full, rejecting emit");
                false
            }
            Err(TrySendError::Closed(event)) => {
                debug!(event = %event.name(), "Dispatcher closed, rejecting emit");
                false
            }
        }
    }

    /// Registers a listener closure for `name`.
    pub fn on<F, Fut>(&self, name: &str, handler: F, options: ListenerOptions) -> ListenerId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |event| Box::pin(handler(event)));
        self.inner.registry.register(name, handler, options)
    }

    /// Registers an [`EventHandler`] interface object for `name`.
    pub fn on_handler(
        &self,
        name: &str,
        handler: Arc<dyn EventHandler>,
        options: ListenerOptions,
    ) -> ListenerId {
        let handler: Handler = Arc::new(move |event| {
            let handler = Arc::clone(&handler);
            Box::pin(async move { handler.handle(event).await })
        });
        self.inner.registry.register(name, handler, options)
    }

    /// Removes a listener. Idempotent: returns `false` if already absent.
    pub fn off(&self, name: &str, id: ListenerId) -> bool {
        self.inner.registry.unregister(name, id)
    }

    /// Registers a middleware for `name` in the given phase.
    pub fn use_middleware<F, Fut>(
        &self,
        name: &str,
        middleware: F,
        phase: MiddlewarePhase,
    ) -> MiddlewareId
    where
        F: Fn(MiddlewareContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let middleware: Middleware = Arc::new(move |ctx| Box::pin(middleware(ctx)));
        self.inner.registry.add_middleware(name, middleware, phase)
    }

    /// Removes a middleware. Returns `false` if already absent.
    pub fn remove_middleware(&self, name: &str, id: MiddlewareId) -> bool {
        self.inner.registry.remove_middleware(name, id)
    }

    /// Adds an event-level filter for `name`.
    ///
    /// Filters run before pre-middleware and listeners, in registration
    /// order, short-circuiting on the first `false`.
    pub fn add_filter<F>(&self, name: &str, predicate: F)
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.inner.registry.add_filter(name, Arc::new(predicate));
    }

    /// Returns the metrics snapshot for one event name.
    pub fn metrics(&self, name: &str) -> MetricsSnapshot {
        self.inner.metrics.snapshot(name)
    }

    /// Returns the number of listeners currently registered for `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.inner.registry.listener_count(name)
    }

    /// Stops the worker pool after in-flight events finish.
    ///
    /// Queued-but-unprocessed events are discarded; emits made after this
    /// call return `false`.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        debug!("Dispatcher stopped");
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("queue_capacity", &self.queue_tx.max_capacity())
            .finish()
    }
}

/// One worker: pull events off the shared queue until cancelled.
async fn worker_loop(
    index: usize,
    inner: Arc<Inner>,
    queue_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Event>>>,
) {
    loop {
        let event = tokio::select! {
            _ = inner.cancel.cancelled() => break,
            event = async { queue_rx.lock().await.recv().await } => {
                match event {
                    Some(event) => event,
                    None => break,
                }
            }
        };
        process_event(&inner, event).await;
    }
    trace!(worker = index, "Dispatch worker stopped");
}

/// Runs one event through filters, middleware, and listeners.
async fn process_event(inner: &Inner, event: Event) {
    let started = Instant::now();
    let name = event.name().to_string();

    let Some(snapshot) = inner.registry.snapshot(&name) else {
        // No registrations: still counts as one processed event.
        inner.metrics.record(&name, 0, started.elapsed());
        return;
    };

    // Filters run first, short-circuiting on the first false.
    for filter in &snapshot.filters {
        if !filter(&event) {
            trace!(event = %name, "Event dropped by filter");
            inner.metrics.record(&name, 0, started.elapsed());
            return;
        }
    }

    // Pre-middleware failures are logged but never block listeners.
    for entry in &snapshot.pre {
        if let Err(error) = (entry.middleware)(MiddlewareContext::for_event(event.clone())).await {
            warn!(event = %name, error = %error, "Pre-middleware failed");
        }
    }

    let mut errors = 0u64;
    for listener in &snapshot.listeners {
        if let Some(filter) = &listener.filter {
            if !filter(&event) {
                continue;
            }
        }

        // One-shot listeners are claimed by removal before invocation, so a
        // concurrently processed event of the same name cannot fire them
        // again.
        if listener.once && !inner.registry.unregister(&name, listener.id) {
            continue;
        }

        if let Some(failure) = invoke_listener(listener, event.clone(), inner.default_timeout).await
        {
            errors += 1;
            warn!(
                event = %name,
                listener = ?listener.id,
                error = %failure,
                "Listener failed"
            );
            for entry in &snapshot.error {
                let ctx =
                    MiddlewareContext::for_failure(event.clone(), listener.id, failure.clone());
                if let Err(error) = (entry.middleware)(ctx).await {
                    warn!(event = %name, error = %error, "Error-middleware failed");
                }
            }
        }
    }

    // Post-middleware runs regardless of individual listener failures.
    for entry in &snapshot.post {
        if let Err(error) = (entry.middleware)(MiddlewareContext::for_event(event.clone())).await {
            warn!(event = %name, error = %error, "Post-middleware failed");
        }
    }

    inner.metrics.record(&name, errors, started.elapsed());
}

/// Runs one listener in its own task under its timeout.
///
/// Spawning isolates panics; a timeout aborts only this listener's task,
/// never the event as a whole.
async fn invoke_listener(
    listener: &ListenerEntry,
    event: Event,
    default_timeout: Duration,
) -> Option<ListenerError> {
    let limit = listener.timeout.unwrap_or(default_timeout);
    let mut task = tokio::spawn((listener.handler)(event));

    match tokio::time::timeout(limit, &mut task).await {
        Ok(Ok(Ok(()))) => None,
        Ok(Ok(Err(error))) => Some(ListenerError::Failed(error.to_string())),
        Ok(Err(join_error)) => {
            if join_error.is_panic() {
                Some(ListenerError::Panicked)
            } else {
                Some(ListenerError::Failed("listener task cancelled".to_string()))
            }
        }
        Err(_) => {
            task.abort();
            Some(ListenerError::TimedOut(limit))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Polls `check` until it returns true, yielding between attempts.
    async fn wait_until(check: impl Fn() -> bool) {
        for _ in 0..500 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("condition not reached");
    }

    fn small_config() -> DispatcherConfig {
        DispatcherConfig {
            queue_capacity: 16,
            workers: 2,
            default_listener_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn emit_without_listeners_counts_as_processed() {
        let dispatcher = Dispatcher::new(small_config());

        assert!(dispatcher.emit("ready", vec![]));

        let d = &dispatcher;
        wait_until(|| d.metrics("ready").processed == 1).await;
        assert_eq!(dispatcher.metrics("ready").errors, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn listeners_run_in_priority_order() {
        let dispatcher = Dispatcher::new(DispatcherConfig {
            workers: 1,
            ..small_config()
        });
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let order_b = Arc::clone(&order);
        dispatcher.on(
            "msg",
            move |_event| {
                let order = Arc::clone(&order_b);
                async move {
                    order.lock().push("b");
                    Ok(())
                }
            },
            ListenerOptions::new().priority(5),
        );
        let order_a = Arc::clone(&order);
        dispatcher.on(
            "msg",
            move |_event| {
                let order = Arc::clone(&order_a);
                async move {
                    order.lock().push("a");
                    Ok(())
                }
            },
            ListenerOptions::new().priority(1),
        );

        assert!(dispatcher.emit("msg", vec![]));
        let d = &dispatcher;
        wait_until(|| d.metrics("msg").processed == 1).await;

        assert_eq!(*order.lock(), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn off_is_idempotent() {
        let dispatcher = Dispatcher::new(small_config());
        let id = dispatcher.on("msg", |_event| async { Ok(()) }, ListenerOptions::new());

        assert!(dispatcher.off("msg", id));
        assert!(!dispatcher.off("msg", id));
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_listener_fires_exactly_once() {
        let dispatcher = Dispatcher::new(small_config());
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = Arc::clone(&count);
        dispatcher.on(
            "msg",
            move |_event| {
                let count = Arc::clone(&count_clone);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            ListenerOptions::new().once(),
        );

        assert!(dispatcher.emit("msg", vec![]));
        assert!(dispatcher.emit("msg", vec![]));

        let d = &dispatcher;
        wait_until(|| d.metrics("msg").processed == 2).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.listener_count("msg"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_listener_does_not_stop_others() {
        let dispatcher = Dispatcher::new(small_config());
        let survived = Arc::new(AtomicUsize::new(0));
        let reported = Arc::new(AtomicUsize::new(0));

        dispatcher.on(
            "msg",
            |_event| async { Err("boom".into()) },
            ListenerOptions::new().priority(0),
        );
        let survived_clone = Arc::clone(&survived);
        dispatcher.on(
            "msg",
            move |_event| {
                let survived = Arc::clone(&survived_clone);
                async move {
                    survived.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            ListenerOptions::new().priority(1),
        );
        let reported_clone = Arc::clone(&reported);
        dispatcher.use_middleware(
            "msg",
            move |ctx| {
                let reported = Arc::clone(&reported_clone);
                async move {
                    assert!(ctx.error.is_some());
                    reported.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            MiddlewarePhase::Error,
        );

        assert!(dispatcher.emit("msg", vec![]));
        let d = &dispatcher;
        wait_until(|| d.metrics("msg").processed == 1).await;

        // A later emit of a different name still processes.
        assert!(dispatcher.emit("other", vec![]));
        wait_until(|| d.metrics("other").processed == 1).await;

        assert_eq!(survived.load(Ordering::SeqCst), 1);
        assert_eq!(reported.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.metrics("msg").errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_listener_is_isolated() {
        let dispatcher = Dispatcher::new(small_config());
        let survived = Arc::new(AtomicUsize::new(0));

        dispatcher.on(
            "msg",
            |_event| async { panic!("listener exploded") },
            ListenerOptions::new().priority(0),
        );
        let survived_clone = Arc::clone(&survived);
        dispatcher.on(
            "msg",
            move |_event| {
                let survived = Arc::clone(&survived_clone);
                async move {
                    survived.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            ListenerOptions::new().priority(1),
        );

        assert!(dispatcher.emit("msg", vec![]));
        let d = &dispatcher;
        wait_until(|| d.metrics("msg").processed == 1).await;

        assert_eq!(survived.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.metrics("msg").errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn listener_timeout_is_reported() {
        let dispatcher = Dispatcher::new(small_config());
        let timed_out = Arc::new(AtomicUsize::new(0));

        dispatcher.on(
            "msg",
            |_event| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            },
            ListenerOptions::new().timeout(Duration::from_millis(50)),
        );
        let timed_out_clone = Arc::clone(&timed_out);
        dispatcher.use_middleware(
            "msg",
            move |ctx| {
                let timed_out = Arc::clone(&timed_out_clone);
                async move {
                    if matches!(ctx.error, Some(ListenerError::TimedOut(_))) {
                        timed_out.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(())
                }
            },
            MiddlewarePhase::Error,
        );

        assert!(dispatcher.emit("msg", vec![]));
        let d = &dispatcher;
        wait_until(|| d.metrics("msg").processed == 1).await;

        assert_eq!(timed_out.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn middleware_phases_run_around_listeners() {
        let dispatcher = Dispatcher::new(DispatcherConfig {
            workers: 1,
            ..small_config()
        });
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let order_pre = Arc::clone(&order);
        dispatcher.use_middleware(
            "msg",
            move |_ctx| {
                let order = Arc::clone(&order_pre);
                async move {
                    order.lock().push("pre");
                    Ok(())
                }
            },
            MiddlewarePhase::Pre,
        );
        // A failing pre-middleware must not block listeners.
        dispatcher.use_middleware(
            "msg",
            |_ctx| async { Err("pre failed".into()) },
            MiddlewarePhase::Pre,
        );
        let order_post = Arc::clone(&order);
        let post_id = dispatcher.use_middleware(
            "msg",
            move |_ctx| {
                let order = Arc::clone(&order_post);
                async move {
                    order.lock().push("post");
                    Ok(())
                }
            },
            MiddlewarePhase::Post,
        );
        let order_listener = Arc::clone(&order);
        dispatcher.on(
            "msg",
            move |_event| {
                let order = Arc::clone(&order_listener);
                async move {
                    order.lock().push("listener");
                    Ok(())
                }
            },
            ListenerOptions::new(),
        );

        assert!(dispatcher.emit("msg", vec![]));
        let d = &dispatcher;
        wait_until(|| d.metrics("msg").processed == 1).await;

        assert_eq!(*order.lock(), vec!["pre", "listener", "post"]);
        assert_eq!(dispatcher.metrics("msg").errors, 0);

        assert!(dispatcher.remove_middleware("msg", post_id));
        assert!(!dispatcher.remove_middleware("msg", post_id));
    }

    #[tokio::test(start_paused = true)]
    async fn filter_drops_event_before_listeners() {
        let dispatcher = Dispatcher::new(small_config());
        let invoked = Arc::new(AtomicUsize::new(0));

        let invoked_clone = Arc::clone(&invoked);
        dispatcher.on(
            "msg",
            move |_event| {
                let invoked = Arc::clone(&invoked_clone);
                async move {
                    invoked.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            ListenerOptions::new(),
        );
        dispatcher.add_filter("msg", |_event| false);

        assert!(dispatcher.emit("msg", vec![]));
        let d = &dispatcher;
        wait_until(|| d.metrics("msg").processed == 1).await;

        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_rejects_emit() {
        let dispatcher = Dispatcher::new(DispatcherConfig {
            queue_capacity: 2,
            workers: 2,
            default_listener_timeout: Duration::from_secs(60),
        });

        let (started_tx, mut started_rx) = mpsc::channel::<()>(4);
        let release = Arc::new(tokio::sync::Notify::new());

        let release_clone = Arc::clone(&release);
        dispatcher.on(
            "slow",
            move |_event| {
                let started = started_tx.clone();
                let release = Arc::clone(&release_clone);
                async move {
                    let _ = started.send(()).await;
                    release.notified().await;
                    Ok(())
                }
            },
            ListenerOptions::new(),
        );

        // Occupy both workers.
        assert!(dispatcher.emit("slow", vec![]));
        assert!(dispatcher.emit("slow", vec![]));
        started_rx.recv().await.unwrap();
        started_rx.recv().await.unwrap();

        // Fill the queue.
        assert!(dispatcher.emit("slow", vec![]));
        assert!(dispatcher.emit("slow", vec![]));

        // Queue full: deliberate backpressure.
        assert!(!dispatcher.emit("slow", vec![]));

        release.notify_waiters();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_workers() {
        let dispatcher = Dispatcher::new(small_config());
        dispatcher.shutdown().await;
        assert!(!dispatcher.emit("msg", vec![]));
    }
}
