//! Fan-in operators: merge and flatten.

use std::sync::{Arc, Mutex, Weak};

use crate::error::StreamError;

use super::core::{AnyListener, Listener, Producer, RemoveToken, Stream};

/// Blends multiple streams together: the output emits every value from
/// every input as it arrives, and completes once all inputs have completed.
/// An error on any input ends the output immediately.
///
/// Relative order across distinct inputs is whatever the producers deliver;
/// order within one input is preserved.
pub fn merge<T: Clone + Send + Sync + 'static>(streams: Vec<Stream<T>>) -> Stream<T> {
    Stream::from_producer_arc(Arc::new(MergeOp {
        upstreams: streams,
        state: Mutex::new(MergeState {
            sink: None,
            tokens: Vec::new(),
            active: 0,
        }),
    }))
}

impl<T: Clone + Send + Sync + 'static> Stream<T> {
    /// Merges this stream with another. See [`merge`].
    pub fn merge_with(&self, other: &Stream<T>) -> Stream<T> {
        merge(vec![self.clone(), other.clone()])
    }
}

struct MergeState<T> {
    sink: Option<AnyListener<T>>,
    tokens: Vec<(Stream<T>, RemoveToken)>,
    active: usize,
}

struct MergeOp<T> {
    upstreams: Vec<Stream<T>>,
    state: Mutex<MergeState<T>>,
}

impl<T: Clone + Send + Sync + 'static> Producer<T> for MergeOp<T> {
    fn start(self: Arc<Self>, listener: AnyListener<T>) {
        {
            let mut st = self.state.lock().unwrap();
            st.sink = Some(listener);
            st.active = self.upstreams.len();
        }
        for upstream in &self.upstreams {
            // A synchronously erroring upstream tears the output down
            // mid-loop; skip the rest instead of attaching into the void.
            if self.state.lock().unwrap().sink.is_none() {
                break;
            }
            let me: Arc<dyn Listener<T>> = self.clone();
            let token = upstream.add(AnyListener::from_arc(me));
            if !token.is_valid() {
                // input had already ended and will never deliver a terminal
                // event; count it as completed so the output can still close
                Listener::complete(self.as_ref());
                continue;
            }
            let mut st = self.state.lock().unwrap();
            if st.sink.is_some() {
                st.tokens.push((upstream.clone(), token));
            } else {
                drop(st);
                upstream.detach(token);
            }
        }
    }

    fn stop(&self) {
        let tokens = {
            let mut st = self.state.lock().unwrap();
            st.sink = None;
            std::mem::take(&mut st.tokens)
        };
        for (upstream, token) in tokens {
            upstream.detach(token);
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Listener<T> for MergeOp<T> {
    fn next(&self, value: T) {
        let sink = self.state.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink.next(value);
        }
    }

    fn complete(&self) {
        let done = {
            let mut st = self.state.lock().unwrap();
            if st.sink.is_none() || st.active == 0 {
                return;
            }
            st.active -= 1;
            if st.active == 0 {
                st.sink.clone()
            } else {
                None
            }
        };
        if let Some(sink) = done {
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

impl<U: Clone + Send + Sync + 'static> Stream<Stream<U>> {
    /// Flattens a stream of streams, always following the latest inner
    /// stream: each outer value detaches the previous inner stream and
    /// attaches to the new one.
    ///
    /// An inner completion does not end the output. The output completes
    /// once the outer stream has completed and the inner stream attached at
    /// that point (if any) completes too. Errors from either level are
    /// forwarded.
    pub fn flatten(&self) -> Stream<U> {
        let op = Arc::new_cyclic(|me| FlattenOp {
            me: me.clone(),
            upstream: self.clone(),
            state: Mutex::new(FlattenState {
                sink: None,
                token: None,
                inner: None,
                generation: 0,
                outer_open: true,
            }),
        });
        Stream::from_producer_arc(op)
    }
}

struct FlattenState<U> {
    sink: Option<AnyListener<U>>,
    token: Option<RemoveToken>,
    inner: Option<(Stream<U>, RemoveToken)>,
    /// Bumped whenever a new inner stream is installed; events from a
    /// listener carrying an older generation are stale and ignored.
    generation: u64,
    outer_open: bool,
}

struct FlattenOp<U> {
    me: Weak<FlattenOp<U>>,
    upstream: Stream<Stream<U>>,
    state: Mutex<FlattenState<U>>,
}

impl<U: Clone + Send + Sync + 'static> FlattenOp<U> {
    fn detach_inner(&self) {
        let inner = self.state.lock().unwrap().inner.take();
        if let Some((stream, token)) = inner {
            stream.detach(token);
        }
    }

    fn forward(&self, generation: u64, value: U) {
        let sink = {
            let st = self.state.lock().unwrap();
            if st.generation != generation {
                return;
            }
            st.sink.clone()
        };
        if let Some(sink) = sink {
            sink.next(value);
        }
    }

    /// The inner stream of `generation` completed: clear it and, if the
    /// outer stream is already done, complete the output.
    fn inner_done(&self, generation: u64) {
        let done = {
            let mut st = self.state.lock().unwrap();
            if st.generation != generation {
                return;
            }
            st.inner = None;
            if st.outer_open {
                None
            } else {
                st.sink.clone()
            }
        };
        if let Some(sink) = done {
            sink.complete();
        }
    }

    fn inner_error(&self, generation: u64, err: StreamError) {
        let sink = {
            let mut st = self.state.lock().unwrap();
            if st.generation != generation {
                return;
            }
            st.inner = None;
            st.sink.clone()
        };
        if let Some(sink) = sink {
            sink.error(err);
        }
    }
}

impl<U: Clone + Send + Sync + 'static> Producer<U> for FlattenOp<U> {
    fn start(self: Arc<Self>, listener: AnyListener<U>) {
        {
            let mut st = self.state.lock().unwrap();
            st.sink = Some(listener);
            st.outer_open = true;
        }
        let me: Arc<dyn Listener<Stream<U>>> = self.clone();
        let token = self.upstream.add(AnyListener::from_arc(me));
        self.state.lock().unwrap().token = Some(token);
    }

    fn stop(&self) {
        self.detach_inner();
        let token = {
            let mut st = self.state.lock().unwrap();
            st.sink = None;
            st.token.take()
        };
        if let Some(token) = token {
            self.upstream.detach(token);
        }
    }
}

impl<U: Clone + Send + Sync + 'static> Listener<Stream<U>> for FlattenOp<U> {
    fn next(&self, inner: Stream<U>) {
        self.detach_inner();
        let generation = {
            let mut st = self.state.lock().unwrap();
            if st.sink.is_none() {
                return;
            }
            st.generation += 1;
            // token filled in below, unless the inner ends during attach
            st.inner = Some((inner.clone(), RemoveToken::INVALID));
            st.generation
        };
        let listener = AnyListener::new(InnerListener {
            parent: self.me.clone(),
            generation,
        });
        let token = inner.add(listener);
        if token.is_valid() {
            let stale = {
                let mut st = self.state.lock().unwrap();
                if st.generation == generation {
                    if let Some(slot) = st.inner.as_mut() {
                        slot.1 = token;
                    }
                    false
                } else {
                    true
                }
            };
            if stale {
                // a newer inner arrived while this one was being attached
                inner.detach(token);
            }
        } else {
            // inner had already ended; treat it as completing right away
            self.inner_done(generation);
        }
    }

    fn complete(&self) {
        let done = {
            let mut st = self.state.lock().unwrap();
            st.outer_open = false;
            if st.inner.is_none() {
                st.sink.clone()
            } else {
                None
            }
        };
        if let Some(sink) = done {
            sink.complete();
        }
    }

    fn error(&self, err: StreamError) {
        self.detach_inner();
        let sink = self.state.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink.error(err);
        }
    }
}

struct InnerListener<U> {
    parent: Weak<FlattenOp<U>>,
    generation: u64,
}

impl<U: Clone + Send + Sync + 'static> Listener<U> for InnerListener<U> {
    fn next(&self, value: U) {
        if let Some(op) = self.parent.upgrade() {
            op.forward(self.generation, value);
        }
    }

    fn complete(&self) {
        if let Some(op) = self.parent.upgrade() {
            op.inner_done(self.generation);
        }
    }

    fn error(&self, err: StreamError) {
        if let Some(op) = self.parent.upgrade() {
            op.inner_error(self.generation, err);
        }
    }
}
