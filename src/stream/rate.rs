//! Time-gated operators: debounce and buffer.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::error::StreamError;
use crate::scheduler::{default_scheduler, DelayHandle, Scheduler};

use super::core::{AnyListener, Listener, Producer, RemoveToken, Stream};

impl<T: Clone + Send + Sync + 'static> Stream<T> {
    /// Delays values until `interval` of silence has passed: each incoming
    /// value cancels and reschedules the pending emission, so a value is
    /// only emitted after a clean interval with no successor.
    ///
    /// Completion is forwarded immediately and drops the pending value.
    pub fn debounce(&self, interval: Duration) -> Stream<T> {
        self.debounce_with_scheduler(interval, default_scheduler())
    }

    /// Same as [`Stream::debounce`] with an explicit scheduler.
    pub fn debounce_with_scheduler(
        &self,
        interval: Duration,
        scheduler: Arc<dyn Scheduler>,
    ) -> Stream<T> {
        let op = Arc::new_cyclic(|me| DebounceOp {
            me: me.clone(),
            upstream: self.clone(),
            interval,
            scheduler,
            state: Mutex::new(DebounceState {
                sink: None,
                token: None,
                pending: None,
            }),
        });
        Stream::from_producer_arc(op)
    }

    /// Collects values into a list, flushing it as one emission every time
    /// `boundary` produces an event. Whatever has accumulated when the
    /// input completes is flushed as a final emission before completion.
    pub fn buffer<B: Clone + Send + Sync + 'static>(&self, boundary: &Stream<B>) -> Stream<Vec<T>> {
        let op = Arc::new_cyclic(|me| BufferOp {
            me: me.clone(),
            upstream: self.clone(),
            boundary: boundary.clone(),
            state: Mutex::new(BufferState {
                sink: None,
                token: None,
                boundary_token: None,
                buf: Vec::new(),
            }),
        });
        Stream::from_producer_arc(op)
    }
}

struct DebounceState<T> {
    sink: Option<AnyListener<T>>,
    token: Option<RemoveToken>,
    pending: Option<DelayHandle>,
}

struct DebounceOp<T> {
    me: Weak<DebounceOp<T>>,
    upstream: Stream<T>,
    interval: Duration,
    scheduler: Arc<dyn Scheduler>,
    state: Mutex<DebounceState<T>>,
}

impl<T: Clone + Send + Sync + 'static> DebounceOp<T> {
    /// Scheduled emission won the silence window.
    fn fire(&self, value: T) {
        let sink = {
            let mut st = self.state.lock().unwrap();
            st.pending = None;
            st.sink.clone()
        };
        if let Some(sink) = sink {
            sink.next(value);
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Producer<T> for DebounceOp<T> {
    fn start(self: Arc<Self>, listener: AnyListener<T>) {
        self.state.lock().unwrap().sink = Some(listener);
        let me: Arc<dyn Listener<T>> = self.clone();
        let token = self.upstream.add(AnyListener::from_arc(me));
        self.state.lock().unwrap().token = Some(token);
    }

    fn stop(&self) {
        let token = {
            let mut st = self.state.lock().unwrap();
            st.sink = None;
            if let Some(handle) = st.pending.take() {
                handle.cancel();
            }
            st.token.take()
        };
        if let Some(token) = token {
            self.upstream.detach(token);
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Listener<T> for DebounceOp<T> {
    fn next(&self, value: T) {
        let mut st = self.state.lock().unwrap();
        if st.sink.is_none() {
            return;
        }
        if let Some(handle) = st.pending.take() {
            handle.cancel();
        }
        let me = self.me.clone();
        let handle = self.scheduler.schedule_after(
            self.interval,
            Box::new(move || {
                if let Some(op) = me.upgrade() {
                    op.fire(value);
                }
            }),
        );
        st.pending = Some(handle);
    }

    fn complete(&self) {
        let sink = {
            let mut st = self.state.lock().unwrap();
            if let Some(handle) = st.pending.take() {
                handle.cancel();
            }
            st.sink.clone()
        };
        if let Some(sink) = sink {
            sink.complete();
        }
    }

    fn error(&self, err: StreamError) {
        let sink = {
            let mut st = self.state.lock().unwrap();
            if let Some(handle) = st.pending.take() {
                handle.cancel();
            }
            st.sink.clone()
        };
        if let Some(sink) = sink {
            sink.error(err);
        }
    }
}

struct BufferState<T> {
    sink: Option<AnyListener<Vec<T>>>,
    token: Option<RemoveToken>,
    boundary_token: Option<RemoveToken>,
    buf: Vec<T>,
}

struct BufferOp<T, B> {
    me: Weak<BufferOp<T, B>>,
    upstream: Stream<T>,
    boundary: Stream<B>,
    state: Mutex<BufferState<T>>,
}

impl<T, B> BufferOp<T, B>
where
    T: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    /// A boundary event flushes the accumulated list as one emission.
    fn flush(&self) {
        let emit = {
            let mut st = self.state.lock().unwrap();
            match st.sink.clone() {
                Some(sink) => Some((sink, std::mem::take(&mut st.buf))),
                None => None,
            }
        };
        if let Some((sink, batch)) = emit {
            sink.next(batch);
        }
    }
}

impl<T, B> Producer<Vec<T>> for BufferOp<T, B>
where
    T: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn start(self: Arc<Self>, listener: AnyListener<Vec<T>>) {
        {
            let mut st = self.state.lock().unwrap();
            st.sink = Some(listener);
            st.buf.clear();
        }
        let me: Arc<dyn Listener<T>> = self.clone();
        let token = self.upstream.add(AnyListener::from_arc(me));
        {
            let mut st = self.state.lock().unwrap();
            if st.sink.is_some() {
                st.token = Some(token);
            } else {
                drop(st);
                self.upstream.detach(token);
                return;
            }
        }
        let boundary_listener = AnyListener::new(BoundaryListener {
            parent: self.me.clone(),
        });
        let boundary_token = self.boundary.add(boundary_listener);
        let mut st = self.state.lock().unwrap();
        if st.sink.is_some() {
            st.boundary_token = Some(boundary_token);
        } else {
            drop(st);
            self.boundary.detach(boundary_token);
        }
    }

    fn stop(&self) {
        let (token, boundary_token) = {
            let mut st = self.state.lock().unwrap();
            st.sink = None;
            st.buf.clear();
            (st.token.take(), st.boundary_token.take())
        };
        if let Some(token) = token {
            self.upstream.detach(token);
        }
        if let Some(token) = boundary_token {
            self.boundary.detach(token);
        }
    }
}

impl<T, B> Listener<T> for BufferOp<T, B>
where
    T: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn next(&self, value: T) {
        let mut st = self.state.lock().unwrap();
        if st.sink.is_some() {
            st.buf.push(value);
        }
    }

    fn complete(&self) {
        // flush the partial batch before completing
        let emit = {
            let mut st = self.state.lock().unwrap();
            match st.sink.clone() {
                Some(sink) => Some((sink, std::mem::take(&mut st.buf))),
                None => None,
            }
        };
        if let Some((sink, batch)) = emit {
            sink.next(batch);
            sink.complete();
        }
    }

    fn error(&self, err: StreamError) {
        let sink = {
            let mut st = self.state.lock().unwrap();
            st.buf.clear();
            st.sink.clone()
        };
        if let Some(sink) = sink {
            sink.error(err);
        }
    }
}

/// Boundary events only matter as flush signals; the boundary stream
/// terminating does not affect the buffered output.
struct BoundaryListener<T, B> {
    parent: Weak<BufferOp<T, B>>,
}

impl<T, B> Listener<B> for BoundaryListener<T, B>
where
    T: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn next(&self, _value: B) {
        if let Some(op) = self.parent.upgrade() {
            op.flush();
        }
    }

    fn complete(&self) {}

    fn error(&self, _err: StreamError) {}
}
