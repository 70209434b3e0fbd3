//! Core stream engine: the Listener/Producer contracts, their type-erased
//! wrappers, and the `Stream` lifecycle.
//!
//! A `Stream` multiplexes one producer to any number of listeners. The
//! producer is started when the first listener attaches and stopped (after a
//! short grace period) when the last one detaches, so resources behind a
//! stream only run while somebody is watching.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use crate::error::StreamError;
use crate::scheduler::{default_scheduler, DelayHandle, Scheduler};

/// How long a producer keeps running after its last listener detaches.
///
/// Lets a consumer swap listeners in quick succession without stopping and
/// restarting the underlying resource (timer, connection, ...).
pub(crate) const STOP_GRACE: Duration = Duration::from_millis(100);

/// The three-method event sink every downstream consumer implements.
///
/// `complete` and `error` are terminal: a well-behaved source never calls
/// any of the three methods after either of them.
///
/// Methods take `&self` because listeners are shared across a broadcast
/// snapshot; stateful listeners serialize their own state internally.
pub trait Listener<T>: Send + Sync {
    /// Deliver one event.
    fn next(&self, value: T);
    /// Signal normal end of stream.
    fn complete(&self);
    /// Signal abnormal end of stream.
    fn error(&self, err: StreamError);
}

/// Type-erased, cheaply cloneable [`Listener`].
///
/// Lets heterogeneous listener implementations be stored uniformly and
/// adapts closures into the contract.
pub struct AnyListener<T> {
    inner: Arc<dyn Listener<T>>,
}

impl<T> Clone for AnyListener<T> {
    fn clone(&self) -> Self {
        AnyListener {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> AnyListener<T> {
    pub fn new<L: Listener<T> + 'static>(listener: L) -> Self {
        AnyListener {
            inner: Arc::new(listener),
        }
    }

    pub(crate) fn from_arc(inner: Arc<dyn Listener<T>>) -> Self {
        AnyListener { inner }
    }

    /// Adapts a closure triple into a listener.
    pub fn from_fns<N, C, E>(next: N, complete: C, error: E) -> Self
    where
        N: Fn(T) + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
        E: Fn(StreamError) + Send + Sync + 'static,
    {
        AnyListener::new(FnListener {
            next,
            complete,
            error,
        })
    }

    /// A listener that only cares about values.
    pub fn from_next<N>(next: N) -> Self
    where
        N: Fn(T) + Send + Sync + 'static,
    {
        AnyListener::from_fns(next, || {}, |_| {})
    }

    /// A stateless listener that ignores everything.
    pub fn no_op() -> Self {
        AnyListener::from_fns(|_| {}, || {}, |_| {})
    }
}

impl<T> Listener<T> for AnyListener<T> {
    fn next(&self, value: T) {
        self.inner.next(value)
    }

    fn complete(&self) {
        self.inner.complete()
    }

    fn error(&self, err: StreamError) {
        self.inner.error(err)
    }
}

struct FnListener<N, C, E> {
    next: N,
    complete: C,
    error: E,
}

impl<T, N, C, E> Listener<T> for FnListener<N, C, E>
where
    N: Fn(T) + Send + Sync,
    C: Fn() + Send + Sync,
    E: Fn(StreamError) + Send + Sync,
{
    fn next(&self, value: T) {
        (self.next)(value)
    }

    fn complete(&self) {
        (self.complete)()
    }

    fn error(&self, err: StreamError) {
        (self.error)(err)
    }
}

/// The two-method event source every upstream origin implements.
///
/// A stream calls `start` exactly once per activation cycle (first listener
/// attached) and `stop` once per deactivation (grace period elapsed after
/// the last listener detached, or terminal event). `stop` must be safe to
/// call even if `start` produced zero events.
pub trait Producer<T>: Send + Sync {
    /// Begin producing events into `listener` until stopped.
    ///
    /// The receiver is `Arc<Self>` so producers that are simultaneously
    /// listeners of another stream (every operator) can hand themselves out.
    fn start(self: Arc<Self>, listener: AnyListener<T>);
    /// Cease producing and release anything acquired in `start`.
    fn stop(&self);
}

/// Type-erased [`Producer`] built from a start/stop closure pair.
pub struct AnyProducer<T> {
    start: Box<dyn Fn(AnyListener<T>) + Send + Sync>,
    stop: Box<dyn Fn() + Send + Sync>,
}

impl<T> AnyProducer<T> {
    pub fn new<S, P>(start: S, stop: P) -> Self
    where
        S: Fn(AnyListener<T>) + Send + Sync + 'static,
        P: Fn() + Send + Sync + 'static,
    {
        AnyProducer {
            start: Box::new(start),
            stop: Box::new(stop),
        }
    }

    /// A producer with a no-op `stop`.
    pub fn from_start<S>(start: S) -> Self
    where
        S: Fn(AnyListener<T>) + Send + Sync + 'static,
    {
        AnyProducer::new(start, || {})
    }
}

impl<T> Producer<T> for AnyProducer<T> {
    fn start(self: Arc<Self>, listener: AnyListener<T>) {
        (self.start)(listener)
    }

    fn stop(&self) {
        (self.stop)()
    }
}

/// Opaque handle identifying one attached listener.
///
/// Valid until the listener is detached or the stream ends. Attaching to an
/// ended stream returns [`RemoveToken::INVALID`], for which every operation
/// is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemoveToken(Uuid);

impl RemoveToken {
    pub const INVALID: RemoveToken = RemoveToken(Uuid::nil());

    fn fresh() -> Self {
        RemoveToken(Uuid::new_v4())
    }

    pub fn is_valid(&self) -> bool {
        !self.0.is_nil()
    }
}

struct CoreState<T> {
    listeners: HashMap<RemoveToken, AnyListener<T>>,
    ended: bool,
    pending_stop: Option<DelayHandle>,
    /// True while the grace callback is inside `producer.stop()`. Attaches
    /// arriving in that window defer their start to the callback, which
    /// restarts the producer once the stop has returned.
    stopping: bool,
}

pub(crate) struct StreamCore<T> {
    producer: Arc<dyn Producer<T>>,
    scheduler: Arc<dyn Scheduler>,
    /// `Some` for memory streams; records the last emitted value.
    memory: Option<Mutex<Option<T>>>,
    state: Mutex<CoreState<T>>,
}

/// A broadcastable, lazily-activated sequence of values with terminal
/// complete/error notifications.
///
/// `Stream` is a cheap-clone handle; all clones refer to the same logical
/// stream. Values must be `Clone` because every event is fanned out to each
/// attached listener.
pub struct Stream<T> {
    pub(crate) core: Arc<StreamCore<T>>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Stream {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Stream<T> {
    /// Creates a stream driven by the given producer, using the default
    /// scheduler for teardown grace timing.
    pub fn from_producer<P: Producer<T> + 'static>(producer: P) -> Self {
        Stream::with_core(Arc::new(producer), false, default_scheduler())
    }

    /// Same as [`Stream::from_producer`] with an explicit scheduler.
    pub fn from_producer_with_scheduler<P: Producer<T> + 'static>(
        producer: P,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Stream::with_core(Arc::new(producer), false, scheduler)
    }

    pub(crate) fn from_producer_arc(producer: Arc<dyn Producer<T>>) -> Self {
        Stream::with_core(producer, false, default_scheduler())
    }

    pub(crate) fn with_core(
        producer: Arc<dyn Producer<T>>,
        memory: bool,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Stream {
            core: Arc::new(StreamCore {
                producer,
                scheduler,
                memory: if memory { Some(Mutex::new(None)) } else { None },
                state: Mutex::new(CoreState {
                    listeners: HashMap::new(),
                    ended: false,
                    pending_stop: None,
                    stopping: false,
                }),
            }),
        }
    }

    /// Adds a listener to the stream.
    ///
    /// Starts the producer if this is the first listener and no teardown
    /// grace timer is outstanding (in which case the timer is canceled and
    /// the still-running producer is left alone).
    pub fn attach<L: Listener<T> + 'static>(&self, listener: L) -> RemoveToken {
        self.add(AnyListener::new(listener))
    }

    /// Removes a previously attached listener.
    ///
    /// When the last listener goes away the producer is stopped after
    /// [`STOP_GRACE`], not immediately, so a listener swap within that
    /// window keeps the producer running uninterrupted.
    pub fn detach(&self, token: RemoveToken) {
        StreamCore::remove(&self.core, token);
    }

    pub(crate) fn add(&self, listener: AnyListener<T>) -> RemoveToken {
        StreamCore::add(&self.core, listener)
    }
}

impl<T: Clone + Send + Sync + 'static> StreamCore<T> {
    fn add(this: &Arc<Self>, listener: AnyListener<T>) -> RemoveToken {
        let (token, first, canceled, replay, stopping) = {
            let mut st = this.state.lock().unwrap();
            if st.ended {
                return RemoveToken::INVALID;
            }
            let token = RemoveToken::fresh();
            st.listeners.insert(token, listener.clone());
            let first = st.listeners.len() == 1;
            let canceled = if first { st.pending_stop.take() } else { None };
            // Memory is read under the state lock, so the replay is the
            // newest value as of insertion. A broadcast from another thread
            // can still slip in between unlock and replay delivery.
            let replay = this
                .memory
                .as_ref()
                .and_then(|cell| cell.lock().unwrap().clone());
            (token, first, canceled, replay, st.stopping)
        };
        if let Some(value) = replay {
            listener.next(value);
        }
        if first {
            match canceled {
                Some(handle) => {
                    // Producer never actually stopped; just call off the stop.
                    handle.cancel();
                    log::trace!("listener re-attached within grace window, producer kept running");
                }
                None if stopping => {
                    log::trace!("listener attached while producer stop in flight, start deferred");
                }
                None => Self::start_producer(this),
            }
        }
        token
    }

    fn remove(this: &Arc<Self>, token: RemoveToken) {
        if !token.is_valid() {
            return;
        }
        let mut st = this.state.lock().unwrap();
        if st.ended {
            return;
        }
        let removed = st.listeners.remove(&token).is_some();
        if removed && st.listeners.is_empty() && st.pending_stop.is_none() && !st.stopping {
            let weak = Arc::downgrade(this);
            let handle = this.scheduler.schedule_after(
                STOP_GRACE,
                Box::new(move || {
                    if let Some(core) = weak.upgrade() {
                        Self::deferred_stop(&core);
                    }
                }),
            );
            st.pending_stop = Some(handle);
            log::trace!("last listener detached, producer stop scheduled");
        }
    }

    fn start_producer(this: &Arc<Self>) {
        log::trace!("first listener attached, starting producer");
        // The producer is bound to the stream itself, not to any one
        // listener, so events reach whatever listener set is current at
        // delivery time. Weak back-reference: no ownership cycle.
        let sink = {
            let next = Arc::downgrade(this);
            let complete = Arc::downgrade(this);
            let error = Arc::downgrade(this);
            AnyListener::from_fns(
                move |value| {
                    if let Some(core) = next.upgrade() {
                        core.next(value);
                    }
                },
                move || {
                    if let Some(core) = complete.upgrade() {
                        core.complete();
                    }
                },
                move |err| {
                    if let Some(core) = error.upgrade() {
                        core.error(err);
                    }
                },
            )
        };
        Arc::clone(&this.producer).start(sink);
    }

    /// Fired by the grace timer. Re-checks under the lock: an attach racing
    /// with the timer wins and the producer keeps running.
    ///
    /// `producer.stop()` runs with no lock held, so an attach can land while
    /// it executes. The `stopping` flag makes that attach defer its start;
    /// once the stop has returned, the producer is started again here if
    /// listeners reappeared. The producer is never started twice for one
    /// activation cycle.
    fn deferred_stop(this: &Arc<Self>) {
        {
            let mut st = this.state.lock().unwrap();
            if st.ended || !st.listeners.is_empty() {
                return;
            }
            st.pending_stop = None;
            st.stopping = true;
        }
        log::trace!("grace period elapsed, stopping producer");
        this.producer.stop();
        let restart = {
            let mut st = this.state.lock().unwrap();
            st.stopping = false;
            !st.ended && !st.listeners.is_empty()
        };
        if restart {
            log::trace!("listener arrived during stop, restarting producer");
            Self::start_producer(this);
        }
    }

    /// Broadcasts one value to every currently attached listener.
    ///
    /// The listener set is snapshotted before delivery, so the order is
    /// stable for the duration of one broadcast even if listeners mutate
    /// the map while being notified.
    pub(crate) fn next(&self, value: T) {
        let snapshot: Vec<AnyListener<T>> = {
            let st = self.state.lock().unwrap();
            if st.ended {
                return;
            }
            if let Some(cell) = &self.memory {
                *cell.lock().unwrap() = Some(value.clone());
            }
            st.listeners.values().cloned().collect()
        };
        for listener in snapshot {
            listener.next(value.clone());
        }
    }

    pub(crate) fn complete(&self) {
        self.terminate(None);
    }

    pub(crate) fn error(&self, err: StreamError) {
        self.terminate(Some(err));
    }

    /// Terminal teardown: the map is cleared and `ended` set before the
    /// broadcast, so any attach/detach a listener performs while being
    /// notified sees an already-ended stream. The producer is stopped
    /// unconditionally, bypassing the grace path.
    fn terminate(&self, err: Option<StreamError>) {
        let snapshot: Vec<AnyListener<T>> = {
            let mut st = self.state.lock().unwrap();
            if st.ended {
                return;
            }
            st.ended = true;
            if let Some(handle) = st.pending_stop.take() {
                handle.cancel();
            }
            st.listeners.drain().map(|(_, l)| l).collect()
        };
        match &err {
            Some(e) => log::debug!("stream ended with error: {}", e),
            None => log::trace!("stream completed"),
        }
        for listener in snapshot {
            match &err {
                Some(e) => listener.error(e.clone()),
                None => listener.complete(),
            }
        }
        self.producer.stop();
    }
}

/// Shared sink/token state for operators without extra per-event state.
pub(crate) struct LinkState<Out> {
    pub(crate) sink: Option<AnyListener<Out>>,
    pub(crate) token: Option<RemoveToken>,
}

impl<Out> Default for LinkState<Out> {
    fn default() -> Self {
        LinkState {
            sink: None,
            token: None,
        }
    }
}

/// Clones the current downstream sink out of an operator's state.
///
/// The guard is released before the caller delivers anything, so a terminal
/// event that re-enters the operator's `stop` cannot deadlock on its lock.
pub(crate) fn sink_of<Out>(state: &Mutex<LinkState<Out>>) -> Option<AnyListener<Out>> {
    state.lock().unwrap().sink.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_token_is_not_valid() {
        assert!(!RemoveToken::INVALID.is_valid());
        assert!(RemoveToken::fresh().is_valid());
    }

    #[test]
    fn no_op_listener_ignores_everything() {
        let listener = AnyListener::<i32>::no_op();
        listener.next(1);
        listener.complete();
        listener.error(StreamError::Custom("ignored".into()));
    }
}
