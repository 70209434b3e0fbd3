//! `MemoryStream`: a stream that replays its most recent value to newly
//! attached listeners.

use std::ops::Deref;
use std::sync::{Arc, Mutex};

use crate::scheduler::default_scheduler;

use super::core::{AnyListener, Producer, RemoveToken, Stream};

/// A [`Stream`] that remembers the last value it emitted.
///
/// Any listener attached after at least one value has been emitted receives
/// that value synchronously as part of attachment, before any subsequently
/// produced value. Derefs to [`Stream`], so every operator applies.
pub struct MemoryStream<T> {
    inner: Stream<T>,
}

impl<T> Clone for MemoryStream<T> {
    fn clone(&self) -> Self {
        MemoryStream {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> MemoryStream<T> {
    pub fn from_producer<P: Producer<T> + 'static>(producer: P) -> Self {
        Self::from_producer_arc(Arc::new(producer))
    }

    pub(crate) fn from_producer_arc(producer: Arc<dyn Producer<T>>) -> Self {
        MemoryStream {
            inner: Stream::with_core(producer, true, default_scheduler()),
        }
    }

    pub fn as_stream(&self) -> Stream<T> {
        self.inner.clone()
    }
}

impl<T> Deref for MemoryStream<T> {
    type Target = Stream<T>;

    fn deref(&self) -> &Stream<T> {
        &self.inner
    }
}

impl<T> From<MemoryStream<T>> for Stream<T> {
    fn from(stream: MemoryStream<T>) -> Self {
        stream.inner
    }
}

impl<T: Clone + Send + Sync + 'static> Stream<T> {
    /// Returns a stream that behaves like this one but also remembers the
    /// most recent event, so a newly added listener immediately receives it.
    pub fn remember(&self) -> MemoryStream<T> {
        MemoryStream::from_producer(RememberOp {
            upstream: self.clone(),
            token: Mutex::new(None),
        })
    }
}

/// Pass-through producer: the memory semantics live in the downstream
/// stream's core, so the memory stream's own sink is attached to the
/// upstream directly.
struct RememberOp<T> {
    upstream: Stream<T>,
    token: Mutex<Option<RemoveToken>>,
}

impl<T: Clone + Send + Sync + 'static> Producer<T> for RememberOp<T> {
    fn start(self: Arc<Self>, listener: AnyListener<T>) {
        let token = self.upstream.add(listener);
        *self.token.lock().unwrap() = Some(token);
    }

    fn stop(&self) {
        if let Some(token) = self.token.lock().unwrap().take() {
            self.upstream.detach(token);
        }
    }
}
