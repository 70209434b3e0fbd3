//! Stateless transformations: map, map_to, filter, inspect, and their
//! fallible `try_` variants.
//!
//! Every operator here is a Producer for its downstream stream and a
//! Listener of its upstream: `start` captures the downstream sink and
//! attaches the operator upstream, `stop` detaches it. Failures from a
//! fallible callback are intercepted at the call site and surfaced as a
//! downstream `error`; they never unwind through the upstream broadcast.

use std::sync::{Arc, Mutex};

use crate::error::{StreamError, StreamResult};

use super::core::{sink_of, AnyListener, LinkState, Listener, Producer, Stream};

impl<T: Clone + Send + Sync + 'static> Stream<T> {
    /// Transforms each value with `transform`.
    pub fn map<U, F>(&self, transform: F) -> Stream<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        Stream::from_producer_arc(Arc::new(MapOp {
            upstream: self.clone(),
            transform,
            state: Mutex::new(LinkState::default()),
        }))
    }

    /// Like `map`, but the callback can fail; a failure becomes the
    /// stream's terminal error.
    pub fn try_map<U, F>(&self, transform: F) -> Stream<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> StreamResult<U> + Send + Sync + 'static,
    {
        Stream::from_producer_arc(Arc::new(TryMapOp {
            upstream: self.clone(),
            transform,
            state: Mutex::new(LinkState::default()),
        }))
    }

    /// Transforms every value to the same constant.
    pub fn map_to<U>(&self, value: U) -> Stream<U>
    where
        U: Clone + Send + Sync + 'static,
    {
        Stream::from_producer_arc(Arc::new(MapToOp {
            upstream: self.clone(),
            value,
            state: Mutex::new(LinkState::default()),
        }))
    }

    /// Keeps only the values for which `predicate` holds.
    pub fn filter<F>(&self, predicate: F) -> Stream<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Stream::from_producer_arc(Arc::new(FilterOp {
            upstream: self.clone(),
            predicate,
            state: Mutex::new(LinkState::default()),
        }))
    }

    /// Like `filter`, but predicate failures become stream errors.
    pub fn try_filter<F>(&self, predicate: F) -> Stream<T>
    where
        F: Fn(&T) -> StreamResult<bool> + Send + Sync + 'static,
    {
        Stream::from_producer_arc(Arc::new(TryFilterOp {
            upstream: self.clone(),
            predicate,
            state: Mutex::new(LinkState::default()),
        }))
    }

    /// Calls `spy` on each value without altering the stream. Handy for
    /// debugging a chain in place.
    pub fn inspect<F>(&self, spy: F) -> Stream<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Stream::from_producer_arc(Arc::new(InspectOp {
            upstream: self.clone(),
            spy,
            state: Mutex::new(LinkState::default()),
        }))
    }
}

struct MapOp<T, U, F> {
    upstream: Stream<T>,
    transform: F,
    state: Mutex<LinkState<U>>,
}

impl<T, U, F> Producer<U> for MapOp<T, U, F>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    fn start(self: Arc<Self>, listener: AnyListener<U>) {
        self.state.lock().unwrap().sink = Some(listener);
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

impl<T, U, F> Listener<T> for MapOp<T, U, F>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    fn next(&self, value: T) {
        if let Some(sink) = sink_of(&self.state) {
            sink.next((self.transform)(value));
        }
    }

    fn complete(&self) {
        if let Some(sink) = sink_of(&self.state) {
            sink.complete();
        }
    }

    fn error(&self, err: StreamError) {
        if let Some(sink) = sink_of(&self.state) {
            sink.error(err);
        }
    }
}

struct TryMapOp<T, U, F> {
    upstream: Stream<T>,
    transform: F,
    state: Mutex<LinkState<U>>,
}

impl<T, U, F> Producer<U> for TryMapOp<T, U, F>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    F: Fn(T) -> StreamResult<U> + Send + Sync + 'static,
{
    fn start(self: Arc<Self>, listener: AnyListener<U>) {
        self.state.lock().unwrap().sink = Some(listener);
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

impl<T, U, F> Listener<T> for TryMapOp<T, U, F>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    F: Fn(T) -> StreamResult<U> + Send + Sync + 'static,
{
    fn next(&self, value: T) {
        if let Some(sink) = sink_of(&self.state) {
            match (self.transform)(value) {
                Ok(mapped) => sink.next(mapped),
                Err(err) => sink.error(err),
            }
        }
    }

    fn complete(&self) {
        if let Some(sink) = sink_of(&self.state) {
            sink.complete();
        }
    }

    fn error(&self, err: StreamError) {
        if let Some(sink) = sink_of(&self.state) {
            sink.error(err);
        }
    }
}

struct MapToOp<T, U> {
    upstream: Stream<T>,
    value: U,
    state: Mutex<LinkState<U>>,
}

impl<T, U> Producer<U> for MapToOp<T, U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    fn start(self: Arc<Self>, listener: AnyListener<U>) {
        self.state.lock().unwrap().sink = Some(listener);
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

impl<T, U> Listener<T> for MapToOp<T, U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    fn next(&self, _value: T) {
        if let Some(sink) = sink_of(&self.state) {
            sink.next(self.value.clone());
        }
    }

    fn complete(&self) {
        if let Some(sink) = sink_of(&self.state) {
            sink.complete();
        }
    }

    fn error(&self, err: StreamError) {
        if let Some(sink) = sink_of(&self.state) {
            sink.error(err);
        }
    }
}

struct FilterOp<T, F> {
    upstream: Stream<T>,
    predicate: F,
    state: Mutex<LinkState<T>>,
}

impl<T, F> Producer<T> for FilterOp<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
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
            st.token.take()
        };
        if let Some(token) = token {
            self.upstream.detach(token);
        }
    }
}

impl<T, F> Listener<T> for FilterOp<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn next(&self, value: T) {
        if let Some(sink) = sink_of(&self.state) {
            if (self.predicate)(&value) {
                sink.next(value);
            }
        }
    }

    fn complete(&self) {
        if let Some(sink) = sink_of(&self.state) {
            sink.complete();
        }
    }

    fn error(&self, err: StreamError) {
        if let Some(sink) = sink_of(&self.state) {
            sink.error(err);
        }
    }
}

struct TryFilterOp<T, F> {
    upstream: Stream<T>,
    predicate: F,
    state: Mutex<LinkState<T>>,
}

impl<T, F> Producer<T> for TryFilterOp<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) -> StreamResult<bool> + Send + Sync + 'static,
{
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
            st.token.take()
        };
        if let Some(token) = token {
            self.upstream.detach(token);
        }
    }
}

impl<T, F> Listener<T> for TryFilterOp<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) -> StreamResult<bool> + Send + Sync + 'static,
{
    fn next(&self, value: T) {
        if let Some(sink) = sink_of(&self.state) {
            match (self.predicate)(&value) {
                Ok(true) => sink.next(value),
                Ok(false) => {}
                Err(err) => sink.error(err),
            }
        }
    }

    fn complete(&self) {
        if let Some(sink) = sink_of(&self.state) {
            sink.complete();
        }
    }

    fn error(&self, err: StreamError) {
        if let Some(sink) = sink_of(&self.state) {
            sink.error(err);
        }
    }
}

struct InspectOp<T, F> {
    upstream: Stream<T>,
    spy: F,
    state: Mutex<LinkState<T>>,
}

impl<T, F> Producer<T> for InspectOp<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
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
            st.token.take()
        };
        if let Some(token) = token {
            self.upstream.detach(token);
        }
    }
}

impl<T, F> Listener<T> for InspectOp<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    fn next(&self, value: T) {
        if let Some(sink) = sink_of(&self.state) {
            (self.spy)(&value);
            sink.next(value);
        }
    }

    fn complete(&self) {
        if let Some(sink) = sink_of(&self.state) {
            sink.complete();
        }
    }

    fn error(&self, err: StreamError) {
        if let Some(sink) = sink_of(&self.state) {
            sink.error(err);
        }
    }
}
