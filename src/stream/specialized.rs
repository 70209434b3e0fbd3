//! Termination-by-other-stream and error recovery: end_when, replace_error.

use std::sync::{Arc, Mutex, Weak};

use crate::error::{StreamError, StreamResult};

use super::core::{AnyListener, Listener, Producer, RemoveToken, Stream};

impl<T: Clone + Send + Sync + 'static> Stream<T> {
    /// Forwards this stream until `other` produces its first event or
    /// completes, whichever comes first; at that point the output completes
    /// and both upstreams are detached. Errors on `other` are ignored.
    pub fn end_when<B: Clone + Send + Sync + 'static>(&self, other: &Stream<B>) -> Stream<T> {
        let op = Arc::new_cyclic(|me| EndWhenOp {
            me: me.clone(),
            upstream: self.clone(),
            other: other.clone(),
            state: Mutex::new(EndWhenState {
                sink: None,
                token: None,
                other_token: None,
            }),
        });
        Stream::from_producer_arc(op)
    }

    /// Replaces an error with another stream.
    ///
    /// When (and if) the input errors, `replace` is called with the error
    /// to obtain a stream the output will replicate instead; the failed
    /// upstream is detached first. If the replacement errors too, `replace`
    /// runs again. If `replace` itself fails, that failure is forwarded.
    pub fn replace_error<F>(&self, replace: F) -> Stream<T>
    where
        F: Fn(StreamError) -> StreamResult<Stream<T>> + Send + Sync + 'static,
    {
        let op = Arc::new_cyclic(|me| ReplaceErrorOp {
            me: me.clone(),
            replace,
            state: Mutex::new(ReplaceErrorState {
                sink: None,
                token: None,
                current: self.clone(),
            }),
        });
        Stream::from_producer_arc(op)
    }
}

struct EndWhenState<T> {
    sink: Option<AnyListener<T>>,
    token: Option<RemoveToken>,
    other_token: Option<RemoveToken>,
}

struct EndWhenOp<T, B> {
    me: Weak<EndWhenOp<T, B>>,
    upstream: Stream<T>,
    other: Stream<B>,
    state: Mutex<EndWhenState<T>>,
}

impl<T, B> EndWhenOp<T, B>
where
    T: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    /// The other stream spoke (or completed): end the output.
    fn end_now(&self) {
        let sink = self.state.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink.complete();
        }
    }
}

impl<T, B> Producer<T> for EndWhenOp<T, B>
where
    T: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn start(self: Arc<Self>, listener: AnyListener<T>) {
        self.state.lock().unwrap().sink = Some(listener);
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
        let other_listener = AnyListener::new(OtherListener {
            parent: self.me.clone(),
        });
        let other_token = self.other.add(other_listener);
        let mut st = self.state.lock().unwrap();
        if st.sink.is_some() {
            st.other_token = Some(other_token);
        } else {
            // `other` fired synchronously during attach and ended us
            drop(st);
            self.other.detach(other_token);
        }
    }

    fn stop(&self) {
        let (token, other_token) = {
            let mut st = self.state.lock().unwrap();
            st.sink = None;
            (st.token.take(), st.other_token.take())
        };
        if let Some(token) = token {
            self.upstream.detach(token);
        }
        if let Some(token) = other_token {
            self.other.detach(token);
        }
    }
}

impl<T, B> Listener<T> for EndWhenOp<T, B>
where
    T: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
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

struct OtherListener<T, B> {
    parent: Weak<EndWhenOp<T, B>>,
}

impl<T, B> Listener<B> for OtherListener<T, B>
where
    T: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
{
    fn next(&self, _value: B) {
        if let Some(op) = self.parent.upgrade() {
            op.end_now();
        }
    }

    fn complete(&self) {
        if let Some(op) = self.parent.upgrade() {
            op.end_now();
        }
    }

    fn error(&self, _err: StreamError) {}
}

struct ReplaceErrorState<T> {
    sink: Option<AnyListener<T>>,
    token: Option<RemoveToken>,
    /// The upstream currently being replicated; swapped on each recovery.
    current: Stream<T>,
}

struct ReplaceErrorOp<T, F> {
    me: Weak<ReplaceErrorOp<T, F>>,
    replace: F,
    state: Mutex<ReplaceErrorState<T>>,
}

impl<T, F> Producer<T> for ReplaceErrorOp<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(StreamError) -> StreamResult<Stream<T>> + Send + Sync + 'static,
{
    fn start(self: Arc<Self>, listener: AnyListener<T>) {
        let upstream = {
            let mut st = self.state.lock().unwrap();
            st.sink = Some(listener);
            st.current.clone()
        };
        let me: Arc<dyn Listener<T>> = self.clone();
        let token = upstream.add(AnyListener::from_arc(me));
        self.state.lock().unwrap().token = Some(token);
    }

    fn stop(&self) {
        let (upstream, token) = {
            let mut st = self.state.lock().unwrap();
            st.sink = None;
            (st.current.clone(), st.token.take())
        };
        if let Some(token) = token {
            upstream.detach(token);
        }
    }
}

impl<T, F> Listener<T> for ReplaceErrorOp<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(StreamError) -> StreamResult<Stream<T>> + Send + Sync + 'static,
{
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
        let (sink, failed, token) = {
            let mut st = self.state.lock().unwrap();
            (st.sink.clone(), st.current.clone(), st.token.take())
        };
        let Some(sink) = sink else { return };
        if let Some(token) = token {
            failed.detach(token);
        }
        match (self.replace)(err) {
            Ok(replacement) => {
                let me = match self.me.upgrade() {
                    Some(me) => me as Arc<dyn Listener<T>>,
                    None => return,
                };
                self.state.lock().unwrap().current = replacement.clone();
                let token = replacement.add(AnyListener::from_arc(me));
                let mut st = self.state.lock().unwrap();
                if st.sink.is_some() {
                    st.token = Some(token);
                } else {
                    drop(st);
                    replacement.detach(token);
                }
            }
            Err(replace_err) => sink.error(replace_err),
        }
    }
}
