//! Counting and termination operators: take, take_while, drop, drop_while,
//! drop_last, suffix, last, compose.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::StreamError;

use super::core::{AnyListener, Listener, Producer, RemoveToken, Stream};

impl<T: Clone + Send + Sync + 'static> Stream<T> {
    /// Emits the first `count` values, then completes and detaches from the
    /// upstream.
    pub fn take(&self, count: usize) -> Stream<T> {
        Stream::from_producer_arc(Arc::new(TakeOp {
            upstream: self.clone(),
            count,
            state: Mutex::new(TakeState {
                sink: None,
                token: None,
                taken: 0,
                done: false,
            }),
        }))
    }

    /// Emits the initial, consecutive values satisfying `predicate`, then
    /// completes. Once the predicate fails it is not called again.
    pub fn take_while<F>(&self, predicate: F) -> Stream<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Stream::from_producer_arc(Arc::new(TakeWhileOp {
            upstream: self.clone(),
            predicate,
            state: Mutex::new(GateState {
                sink: None,
                token: None,
                gate: true,
            }),
        }))
    }

    /// Suppresses the first `count` values, then forwards the rest.
    pub fn drop(&self, count: usize) -> Stream<T> {
        Stream::from_producer_arc(Arc::new(DropOp {
            upstream: self.clone(),
            count,
            state: Mutex::new(CountState {
                sink: None,
                token: None,
                seen: 0,
            }),
        }))
    }

    /// Skips values while `predicate` holds, then forwards everything.
    /// Once the predicate fails it is not called again.
    pub fn drop_while<F>(&self, predicate: F) -> Stream<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Stream::from_producer_arc(Arc::new(DropWhileOp {
            upstream: self.clone(),
            predicate,
            state: Mutex::new(GateState {
                sink: None,
                token: None,
                gate: true,
            }),
        }))
    }

    /// Forwards values through a buffer of `count`, so the output never
    /// produces the last `count` values. The buffered tail is discarded on
    /// completion, never emitted.
    pub fn drop_last(&self, count: usize) -> Stream<T> {
        Stream::from_producer_arc(Arc::new(DropLastOp {
            upstream: self.clone(),
            count,
            state: Mutex::new(BufState {
                sink: None,
                token: None,
                buf: VecDeque::new(),
            }),
        }))
    }

    /// Emits up to the final `count` values of the (finite) stream once it
    /// completes.
    pub fn suffix(&self, count: usize) -> Stream<T> {
        Stream::from_producer_arc(Arc::new(SuffixOp {
            upstream: self.clone(),
            count,
            state: Mutex::new(BufState {
                sink: None,
                token: None,
                buf: VecDeque::new(),
            }),
        }))
    }

    /// When the input completes, emits the last value it produced (if any),
    /// then completes.
    pub fn last(&self) -> Stream<T> {
        Stream::from_producer_arc(Arc::new(LastOp {
            upstream: self.clone(),
            state: Mutex::new(LastState {
                sink: None,
                token: None,
                last: None,
            }),
        }))
    }

    /// Passes the stream to a custom operator: `s.compose(f)` reads better
    /// in a chain than `f(s)`.
    pub fn compose<U, F>(&self, f: F) -> Stream<U>
    where
        F: FnOnce(Stream<T>) -> Stream<U>,
    {
        f(self.clone())
    }
}

struct TakeState<T> {
    sink: Option<AnyListener<T>>,
    token: Option<RemoveToken>,
    taken: usize,
    done: bool,
}

struct TakeOp<T> {
    upstream: Stream<T>,
    count: usize,
    state: Mutex<TakeState<T>>,
}

impl<T: Clone + Send + Sync + 'static> Producer<T> for TakeOp<T> {
    fn start(self: Arc<Self>, listener: AnyListener<T>) {
        {
            let mut st = self.state.lock().unwrap();
            st.sink = Some(listener);
            st.taken = 0;
            st.done = false;
        }
        let me: Arc<dyn Listener<T>> = self.clone();
        let token = self.upstream.add(AnyListener::from_arc(me));
        self.state.lock().unwrap().token = Some(token);
    }

    fn stop(&self) {
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

impl<T: Clone + Send + Sync + 'static> Listener<T> for TakeOp<T> {
    fn next(&self, value: T) {
        enum Step {
            Skip,
            Emit,
            EmitAndComplete,
            CompleteOnly,
        }
        let (sink, step) = {
            let mut st = self.state.lock().unwrap();
            let sink = match st.sink.clone() {
                Some(s) => s,
                None => return,
            };
            let step = if st.done {
                Step::Skip
            } else if self.count == 0 {
                st.done = true;
                Step::CompleteOnly
            } else {
                st.taken += 1;
                if st.taken >= self.count {
                    st.done = true;
                    Step::EmitAndComplete
                } else {
                    Step::Emit
                }
            };
            (sink, step)
        };
        match step {
            Step::Skip => {}
            Step::Emit => sink.next(value),
            Step::EmitAndComplete => {
                sink.next(value);
                sink.complete();
            }
            Step::CompleteOnly => sink.complete(),
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

/// Shared by take_while (gate = still forwarding) and drop_while
/// (gate = still dropping).
struct GateState<T> {
    sink: Option<AnyListener<T>>,
    token: Option<RemoveToken>,
    gate: bool,
}

struct TakeWhileOp<T, F> {
    upstream: Stream<T>,
    predicate: F,
    state: Mutex<GateState<T>>,
}

impl<T, F> Producer<T> for TakeWhileOp<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn start(self: Arc<Self>, listener: AnyListener<T>) {
        {
            let mut st = self.state.lock().unwrap();
            st.sink = Some(listener);
            st.gate = true;
        }
        let me: Arc<dyn Listener<T>> = self.clone();
        let token = self.upstream.add(AnyListener::from_arc(me));
        self.state.lock().unwrap().token = Some(token);
    }

    fn stop(&self) {
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

impl<T, F> Listener<T> for TakeWhileOp<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn next(&self, value: T) {
        let (sink, forward) = {
            let mut st = self.state.lock().unwrap();
            let sink = match st.sink.clone() {
                Some(s) => s,
                None => return,
            };
            if !st.gate {
                return;
            }
            let forward = (self.predicate)(&value);
            if !forward {
                st.gate = false;
            }
            (sink, forward)
        };
        if forward {
            sink.next(value);
        } else {
            sink.complete();
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

struct CountState<T> {
    sink: Option<AnyListener<T>>,
    token: Option<RemoveToken>,
    seen: usize,
}

struct DropOp<T> {
    upstream: Stream<T>,
    count: usize,
    state: Mutex<CountState<T>>,
}

impl<T: Clone + Send + Sync + 'static> Producer<T> for DropOp<T> {
    fn start(self: Arc<Self>, listener: AnyListener<T>) {
        {
            let mut st = self.state.lock().unwrap();
            st.sink = Some(listener);
            st.seen = 0;
        }
        let me: Arc<dyn Listener<T>> = self.clone();
        let token = self.upstream.add(AnyListener::from_arc(me));
        self.state.lock().unwrap().token = Some(token);
    }

    fn stop(&self) {
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

impl<T: Clone + Send + Sync + 'static> Listener<T> for DropOp<T> {
    fn next(&self, value: T) {
        let sink = {
            let mut st = self.state.lock().unwrap();
            if st.seen < self.count {
                st.seen += 1;
                return;
            }
            match st.sink.clone() {
                Some(s) => s,
                None => return,
            }
        };
        sink.next(value);
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

struct DropWhileOp<T, F> {
    upstream: Stream<T>,
    predicate: F,
    state: Mutex<GateState<T>>,
}

impl<T, F> Producer<T> for DropWhileOp<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn start(self: Arc<Self>, listener: AnyListener<T>) {
        {
            let mut st = self.state.lock().unwrap();
            st.sink = Some(listener);
            st.gate = true;
        }
        let me: Arc<dyn Listener<T>> = self.clone();
        let token = self.upstream.add(AnyListener::from_arc(me));
        self.state.lock().unwrap().token = Some(token);
    }

    fn stop(&self) {
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

impl<T, F> Listener<T> for DropWhileOp<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn next(&self, value: T) {
        let sink = {
            let mut st = self.state.lock().unwrap();
            let sink = match st.sink.clone() {
                Some(s) => s,
                None => return,
            };
            if st.gate {
                if (self.predicate)(&value) {
                    return;
                }
                st.gate = false;
            }
            sink
        };
        sink.next(value);
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

struct BufState<T> {
    sink: Option<AnyListener<T>>,
    token: Option<RemoveToken>,
    buf: VecDeque<T>,
}

struct DropLastOp<T> {
    upstream: Stream<T>,
    count: usize,
    state: Mutex<BufState<T>>,
}

impl<T: Clone + Send + Sync + 'static> Producer<T> for DropLastOp<T> {
    fn start(self: Arc<Self>, listener: AnyListener<T>) {
        {
            let mut st = self.state.lock().unwrap();
            st.sink = Some(listener);
            st.buf.clear();
        }
        let me: Arc<dyn Listener<T>> = self.clone();
        let token = self.upstream.add(AnyListener::from_arc(me));
        self.state.lock().unwrap().token = Some(token);
    }

    fn stop(&self) {
        let token = {
            let mut st = self.state.lock().unwrap();
            st.sink = None;
            st.buf.clear();
            st.token.take()
        };
        if let Some(token) = token {
            self.upstream.detach(token);
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Listener<T> for DropLastOp<T> {
    fn next(&self, value: T) {
        let emit = {
            let mut st = self.state.lock().unwrap();
            let sink = match st.sink.clone() {
                Some(s) => s,
                None => return,
            };
            st.buf.push_back(value);
            if st.buf.len() > self.count {
                st.buf.pop_front().map(|v| (sink, v))
            } else {
                None
            }
        };
        if let Some((sink, value)) = emit {
            sink.next(value);
        }
    }

    fn complete(&self) {
        // buffered tail is never emitted
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

struct SuffixOp<T> {
    upstream: Stream<T>,
    count: usize,
    state: Mutex<BufState<T>>,
}

impl<T: Clone + Send + Sync + 'static> Producer<T> for SuffixOp<T> {
    fn start(self: Arc<Self>, listener: AnyListener<T>) {
        {
            let mut st = self.state.lock().unwrap();
            st.sink = Some(listener);
            st.buf.clear();
        }
        let me: Arc<dyn Listener<T>> = self.clone();
        let token = self.upstream.add(AnyListener::from_arc(me));
        self.state.lock().unwrap().token = Some(token);
    }

    fn stop(&self) {
        let token = {
            let mut st = self.state.lock().unwrap();
            st.sink = None;
            st.buf.clear();
            st.token.take()
        };
        if let Some(token) = token {
            self.upstream.detach(token);
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Listener<T> for SuffixOp<T> {
    fn next(&self, value: T) {
        let mut st = self.state.lock().unwrap();
        if st.sink.is_none() {
            return;
        }
        st.buf.push_back(value);
        if st.buf.len() > self.count {
            st.buf.pop_front();
        }
    }

    fn complete(&self) {
        let (sink, tail) = {
            let mut st = self.state.lock().unwrap();
            let sink = match st.sink.clone() {
                Some(s) => s,
                None => return,
            };
            (sink, std::mem::take(&mut st.buf))
        };
        for value in tail {
            sink.next(value);
        }
        sink.complete();
    }

    fn error(&self, err: StreamError) {
        let sink = self.state.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink.error(err);
        }
    }
}

struct LastState<T> {
    sink: Option<AnyListener<T>>,
    token: Option<RemoveToken>,
    last: Option<T>,
}

struct LastOp<T> {
    upstream: Stream<T>,
    state: Mutex<LastState<T>>,
}

impl<T: Clone + Send + Sync + 'static> Producer<T> for LastOp<T> {
    fn start(self: Arc<Self>, listener: AnyListener<T>) {
        {
            let mut st = self.state.lock().unwrap();
            st.sink = Some(listener);
            st.last = None;
        }
        let me: Arc<dyn Listener<T>> = self.clone();
        let token = self.upstream.add(AnyListener::from_arc(me));
        self.state.lock().unwrap().token = Some(token);
    }

    fn stop(&self) {
        let token = {
            let mut st = self.state.lock().unwrap();
            st.sink = None;
            st.last = None;
            st.token.take()
        };
        if let Some(token) = token {
            self.upstream.detach(token);
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Listener<T> for LastOp<T> {
    fn next(&self, value: T) {
        let mut st = self.state.lock().unwrap();
        if st.sink.is_some() {
            st.last = Some(value);
        }
    }

    fn complete(&self) {
        let (sink, last) = {
            let mut st = self.state.lock().unwrap();
            let sink = match st.sink.clone() {
                Some(s) => s,
                None => return,
            };
            (sink, st.last.take())
        };
        if let Some(value) = last {
            sink.next(value);
        }
        sink.complete();
    }

    fn error(&self, err: StreamError) {
        let sink = self.state.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink.error(err);
        }
    }
}
