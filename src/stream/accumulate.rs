//! Stateful accumulation: fold, try_fold, start_with.
//!
//! All three return a [`MemoryStream`]: their first value is produced
//! synchronously at activation (the seed, or the prepended value), and the
//! memory cell replays the latest accumulator to late listeners.

use std::sync::{Arc, Mutex};

use crate::error::{StreamError, StreamResult};

use super::core::{AnyListener, Listener, Producer, RemoveToken, Stream};
use super::memory::MemoryStream;

impl<T: Clone + Send + Sync + 'static> Stream<T> {
    /// Combines events from the past throughout the execution of the input
    /// stream, like a running `reduce`.
    ///
    /// The output starts by emitting `initial`, then emits the accumulator
    /// after each input event: over a finite input of length `n` the output
    /// has `n + 1` values.
    pub fn fold<U, F>(&self, initial: U, combine: F) -> MemoryStream<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(U, T) -> U + Send + Sync + 'static,
    {
        MemoryStream::from_producer_arc(Arc::new(FoldOp {
            upstream: self.clone(),
            initial: initial.clone(),
            combine,
            state: Mutex::new(FoldState {
                sink: None,
                token: None,
                accumulator: initial,
            }),
        }))
    }

    /// Like `fold`, but the combine step can fail; a failure becomes the
    /// stream's terminal error.
    pub fn try_fold<U, F>(&self, initial: U, combine: F) -> MemoryStream<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(U, T) -> StreamResult<U> + Send + Sync + 'static,
    {
        MemoryStream::from_producer_arc(Arc::new(TryFoldOp {
            upstream: self.clone(),
            initial: initial.clone(),
            combine,
            state: Mutex::new(FoldState {
                sink: None,
                token: None,
                accumulator: initial,
            }),
        }))
    }

    /// Prepends `initial` to the sequence of events, emitting it
    /// synchronously on activation before attaching upstream.
    pub fn start_with(&self, initial: T) -> MemoryStream<T> {
        MemoryStream::from_producer_arc(Arc::new(StartWithOp {
            upstream: self.clone(),
            initial,
            state: Mutex::new(StartWithState {
                sink: None,
                token: None,
            }),
        }))
    }
}

struct FoldState<U> {
    sink: Option<AnyListener<U>>,
    token: Option<RemoveToken>,
    accumulator: U,
}

struct FoldOp<T, U, F> {
    upstream: Stream<T>,
    initial: U,
    combine: F,
    state: Mutex<FoldState<U>>,
}

impl<T, U, F> Producer<U> for FoldOp<T, U, F>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    F: Fn(U, T) -> U + Send + Sync + 'static,
{
    fn start(self: Arc<Self>, listener: AnyListener<U>) {
        {
            let mut st = self.state.lock().unwrap();
            st.accumulator = self.initial.clone();
            st.sink = Some(listener.clone());
        }
        // seed goes out before any upstream event
        listener.next(self.initial.clone());
        let me: Arc<dyn Listener<T>> = self.clone();
        let token = self.upstream.add(AnyListener::from_arc(me));
        self.state.lock().unwrap().token = Some(token);
    }

    fn stop(&self) {
        let token = {
            let mut st = self.state.lock().unwrap();
            st.sink = None;
            st.accumulator = self.initial.clone();
            st.token.take()
        };
        if let Some(token) = token {
            self.upstream.detach(token);
        }
    }
}

impl<T, U, F> Listener<T> for FoldOp<T, U, F>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    F: Fn(U, T) -> U + Send + Sync + 'static,
{
    fn next(&self, value: T) {
        let emit = {
            let mut st = self.state.lock().unwrap();
            match st.sink.clone() {
                Some(sink) => {
                    let acc = (self.combine)(st.accumulator.clone(), value);
                    st.accumulator = acc.clone();
                    Some((sink, acc))
                }
                None => None,
            }
        };
        if let Some((sink, acc)) = emit {
            sink.next(acc);
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

struct TryFoldOp<T, U, F> {
    upstream: Stream<T>,
    initial: U,
    combine: F,
    state: Mutex<FoldState<U>>,
}

impl<T, U, F> Producer<U> for TryFoldOp<T, U, F>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    F: Fn(U, T) -> StreamResult<U> + Send + Sync + 'static,
{
    fn start(self: Arc<Self>, listener: AnyListener<U>) {
        {
            let mut st = self.state.lock().unwrap();
            st.accumulator = self.initial.clone();
            st.sink = Some(listener.clone());
        }
        listener.next(self.initial.clone());
        let me: Arc<dyn Listener<T>> = self.clone();
        let token = self.upstream.add(AnyListener::from_arc(me));
        self.state.lock().unwrap().token = Some(token);
    }

    fn stop(&self) {
        let token = {
            let mut st = self.state.lock().unwrap();
            st.sink = None;
            st.accumulator = self.initial.clone();
            st.token.take()
        };
        if let Some(token) = token {
            self.upstream.detach(token);
        }
    }
}

impl<T, U, F> Listener<T> for TryFoldOp<T, U, F>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    F: Fn(U, T) -> StreamResult<U> + Send + Sync + 'static,
{
    fn next(&self, value: T) {
        let emit = {
            let mut st = self.state.lock().unwrap();
            match st.sink.clone() {
                Some(sink) => match (self.combine)(st.accumulator.clone(), value) {
                    Ok(acc) => {
                        st.accumulator = acc.clone();
                        Some((sink, Ok(acc)))
                    }
                    Err(err) => Some((sink, Err(err))),
                },
                None => None,
            }
        };
        match emit {
            Some((sink, Ok(acc))) => sink.next(acc),
            Some((sink, Err(err))) => sink.error(err),
            None => {}
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

struct StartWithState<T> {
    sink: Option<AnyListener<T>>,
    token: Option<RemoveToken>,
}

struct StartWithOp<T> {
    upstream: Stream<T>,
    initial: T,
    state: Mutex<StartWithState<T>>,
}

impl<T: Clone + Send + Sync + 'static> Producer<T> for StartWithOp<T> {
    fn start(self: Arc<Self>, listener: AnyListener<T>) {
        self.state.lock().unwrap().sink = Some(listener.clone());
        listener.next(self.initial.clone());
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

impl<T: Clone + Send + Sync + 'static> Listener<T> for StartWithOp<T> {
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
