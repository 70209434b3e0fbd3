//! `MimicStream`: a placeholder stream for building feedback graphs.
//!
//! Circular dependencies (stream `a` computed from `b`, `b` computed from
//! `a`) cannot be wired up directly. A mimic breaks the cycle: declare the
//! mimic first, build the graph against it, then call [`MimicStream::imitate`]
//! to redirect it at the real stream once that exists.

use std::ops::Deref;
use std::sync::{Arc, Mutex, Weak};

use crate::error::StreamError;

use super::core::{AnyListener, Listener, Producer, RemoveToken, Stream, StreamCore};

/// Creates an unresolved [`MimicStream`].
///
/// Until `imitate` is called it behaves like a stream that never emits.
pub fn mimic<T: Clone + Send + Sync + 'static>() -> MimicStream<T> {
    let producer = Arc::new(MimicProducer {
        state: Mutex::new(MimicState {
            sink: None,
            target: None,
            token: None,
        }),
    });
    let inner = Stream::from_producer_arc(producer.clone() as Arc<dyn Producer<T>>);
    MimicStream { producer, inner }
}

/// A stream that replicates a target stream chosen after construction.
///
/// Derefs to [`Stream`], so the whole operator catalog applies before the
/// target is even known. The target is held weakly; a mimic never keeps its
/// target alive, which is what makes feedback cycles collectable.
pub struct MimicStream<T> {
    producer: Arc<MimicProducer<T>>,
    inner: Stream<T>,
}

impl<T> Clone for MimicStream<T> {
    fn clone(&self) -> Self {
        MimicStream {
            producer: Arc::clone(&self.producer),
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> MimicStream<T> {
    /// Points the mimic at `target`: from now on the mimic replicates the
    /// target's events. If the mimic is currently active it attaches to the
    /// target immediately; otherwise attachment happens on the next
    /// activation.
    ///
    /// Calling `imitate` again replaces the previous target.
    pub fn imitate(&self, target: &Stream<T>) {
        let (previous, attach_now) = {
            let mut st = self.producer.state.lock().unwrap();
            let previous = st
                .token
                .take()
                .and_then(|token| st.target.take().map(|core| (core, token)));
            st.target = Some(Arc::downgrade(&target.core));
            (previous, st.sink.is_some())
        };
        if let Some((core, token)) = previous {
            if let Some(core) = core.upgrade() {
                Stream { core }.detach(token);
            }
        }
        if attach_now {
            let me: Arc<dyn Listener<T>> = self.producer.clone();
            let token = target.add(AnyListener::from_arc(me));
            let mut st = self.producer.state.lock().unwrap();
            if st.sink.is_some() && token.is_valid() {
                st.token = Some(token);
            } else {
                drop(st);
                target.detach(token);
            }
        }
    }

    pub fn as_stream(&self) -> Stream<T> {
        self.inner.clone()
    }
}

impl<T> Deref for MimicStream<T> {
    type Target = Stream<T>;

    fn deref(&self) -> &Stream<T> {
        &self.inner
    }
}

struct MimicState<T> {
    sink: Option<AnyListener<T>>,
    /// Weak so a feedback cycle through the mimic does not leak.
    target: Option<Weak<StreamCore<T>>>,
    token: Option<RemoveToken>,
}

struct MimicProducer<T> {
    state: Mutex<MimicState<T>>,
}

impl<T: Clone + Send + Sync + 'static> Producer<T> for MimicProducer<T> {
    fn start(self: Arc<Self>, listener: AnyListener<T>) {
        let target = {
            let mut st = self.state.lock().unwrap();
            st.sink = Some(listener);
            st.target.as_ref().and_then(Weak::upgrade)
        };
        let Some(core) = target else { return };
        let target = Stream { core };
        let me: Arc<dyn Listener<T>> = self.clone();
        let token = target.add(AnyListener::from_arc(me));
        let mut st = self.state.lock().unwrap();
        if st.sink.is_some() && token.is_valid() {
            st.token = Some(token);
        } else {
            drop(st);
            target.detach(token);
        }
    }

    fn stop(&self) {
        let detach = {
            let mut st = self.state.lock().unwrap();
            st.sink = None;
            st.token
                .take()
                .and_then(|token| st.target.clone().map(|core| (core, token)))
        };
        if let Some((core, token)) = detach {
            if let Some(core) = core.upgrade() {
                Stream { core }.detach(token);
            }
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Listener<T> for MimicProducer<T> {
    fn next(&self, value: T) {
        let sink = self.state.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink.next(value);
        }
    }

    fn complete(&self) {
        let sink = self.state.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink.complete();
        }
    }

    fn error(&self, err: StreamError) {
        let sink = self.state.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink.error(err);
        }
    }
}
