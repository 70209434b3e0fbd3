//! Stream constructors: pending, empty, fail, from_iter, periodic.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::StreamError;

use super::core::{AnyListener, AnyProducer, Listener, Producer, Stream};

/// A stream that never emits any event.
pub fn pending<T: Clone + Send + Sync + 'static>() -> Stream<T> {
    Stream::from_producer(AnyProducer::from_start(|_| {}))
}

/// A stream that immediately completes when started, and that's it.
pub fn empty<T: Clone + Send + Sync + 'static>() -> Stream<T> {
    Stream::from_producer(AnyProducer::from_start(|listener: AnyListener<T>| {
        listener.complete()
    }))
}

/// A stream that immediately errors with `err` when started.
pub fn fail<T: Clone + Send + Sync + 'static>(err: StreamError) -> Stream<T> {
    Stream::from_producer(AnyProducer::from_start(move |listener: AnyListener<T>| {
        listener.error(err.clone())
    }))
}

/// Converts a finite sequence to a stream: each activation synchronously
/// emits every item, then completes.
pub fn from_iter<T, I>(items: I) -> Stream<T>
where
    T: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = T>,
{
    Stream::from_producer(FromIterProducer {
        items: items.into_iter().collect(),
    })
}

/// A stream that emits incremental numbers every `period`, starting one
/// period after activation. Requires a tokio runtime.
pub fn periodic(period: Duration) -> Stream<u64> {
    Stream::from_producer(PeriodicProducer {
        period,
        task: Mutex::new(None),
    })
}

struct FromIterProducer<T> {
    items: Vec<T>,
}

impl<T: Clone + Send + Sync + 'static> Producer<T> for FromIterProducer<T> {
    fn start(self: Arc<Self>, listener: AnyListener<T>) {
        for item in self.items.clone() {
            listener.next(item);
        }
        listener.complete();
    }

    fn stop(&self) {}
}

struct PeriodicProducer {
    period: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Producer<u64> for PeriodicProducer {
    fn start(self: Arc<Self>, listener: AnyListener<u64>) {
        let period = self.period;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // the first tick of a tokio interval fires immediately
            ticker.tick().await;
            let mut count: u64 = 0;
            loop {
                ticker.tick().await;
                listener.next(count);
                count += 1;
            }
        });
        *self.task.lock().unwrap() = Some(handle);
    }

    fn stop(&self) {
        if let Some(handle) = self.task.lock().unwrap().take() {
            handle.abort();
        }
    }
}
