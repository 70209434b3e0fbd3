#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pulse_stream::{
    AnyListener, DelayHandle, Listener, MemoryStream, Producer, Scheduler, Stream, StreamError,
};

/// One recorded event, as seen by a [`Recorder`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event<T> {
    Next(T),
    Complete,
    Error(StreamError),
}

/// Listener that records every event it receives, for later assertions.
pub struct Recorder<T> {
    events: Arc<Mutex<Vec<Event<T>>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Recorder {
            events: Arc::clone(&self.events),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Recorder<T> {
    pub fn new() -> Self {
        Recorder {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn listener(&self) -> AnyListener<T> {
        let on_next = Arc::clone(&self.events);
        let on_complete = Arc::clone(&self.events);
        let on_error = Arc::clone(&self.events);
        AnyListener::from_fns(
            move |value| on_next.lock().unwrap().push(Event::Next(value)),
            move || on_complete.lock().unwrap().push(Event::Complete),
            move |err| on_error.lock().unwrap().push(Event::Error(err)),
        )
    }

    pub fn events(&self) -> Vec<Event<T>> {
        self.events.lock().unwrap().clone()
    }

    pub fn values(&self) -> Vec<T> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Next(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn completed(&self) -> bool
    where
        T: PartialEq,
    {
        self.events().contains(&Event::Complete)
    }

    pub fn errors(&self) -> Vec<StreamError> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Error(err) => Some(err),
                _ => None,
            })
            .collect()
    }
}

struct SourceState<T> {
    sink: Option<AnyListener<T>>,
    starts: usize,
    stops: usize,
}

/// Hand-driven event source: push values into the stream from test code and
/// observe producer start/stop transitions.
pub struct ManualSource<T> {
    state: Arc<Mutex<SourceState<T>>>,
}

impl<T> Clone for ManualSource<T> {
    fn clone(&self) -> Self {
        ManualSource {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ManualSource<T> {
    pub fn new() -> (ManualSource<T>, Stream<T>) {
        let state = Arc::new(Mutex::new(SourceState {
            sink: None,
            starts: 0,
            stops: 0,
        }));
        let source = ManualSource {
            state: Arc::clone(&state),
        };
        let stream = Stream::from_producer(ManualProducer { state });
        (source, stream)
    }

    /// Same as [`ManualSource::new`], but the stream remembers its latest
    /// value.
    pub fn new_memory() -> (ManualSource<T>, MemoryStream<T>) {
        let state = Arc::new(Mutex::new(SourceState {
            sink: None,
            starts: 0,
            stops: 0,
        }));
        let source = ManualSource {
            state: Arc::clone(&state),
        };
        let stream = MemoryStream::from_producer(ManualProducer { state });
        (source, stream)
    }

    pub fn push(&self, value: T) {
        let sink = self.state.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink.next(value);
        }
    }

    pub fn complete(&self) {
        let sink = self.state.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink.complete();
        }
    }

    pub fn error(&self, err: StreamError) {
        let sink = self.state.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink.error(err);
        }
    }

    /// Whether the producer is currently started.
    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().sink.is_some()
    }

    pub fn starts(&self) -> usize {
        self.state.lock().unwrap().starts
    }

    pub fn stops(&self) -> usize {
        self.state.lock().unwrap().stops
    }
}

struct ManualProducer<T> {
    state: Arc<Mutex<SourceState<T>>>,
}

impl<T: Clone + Send + Sync + 'static> Producer<T> for ManualProducer<T> {
    fn start(self: Arc<Self>, listener: AnyListener<T>) {
        let mut st = self.state.lock().unwrap();
        st.sink = Some(listener);
        st.starts += 1;
    }

    fn stop(&self) {
        let mut st = self.state.lock().unwrap();
        st.sink = None;
        st.stops += 1;
    }
}

type Scheduled = (DelayHandle, Duration, Box<dyn FnOnce() + Send>);

/// Scheduler whose timers only fire when the test says so.
pub struct ManualScheduler {
    queue: Mutex<Vec<Scheduled>>,
}

impl ManualScheduler {
    pub fn new() -> Arc<ManualScheduler> {
        Arc::new(ManualScheduler {
            queue: Mutex::new(Vec::new()),
        })
    }

    /// Number of scheduled, not-yet-canceled callbacks.
    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .unwrap()
            .iter()
            .filter(|(handle, _, _)| !handle.is_cancelled())
            .count()
    }

    /// Runs every scheduled callback that has not been canceled.
    pub fn fire_all(&self) {
        let drained: Vec<Scheduled> = std::mem::take(&mut *self.queue.lock().unwrap());
        for (handle, _, callback) in drained {
            if !handle.is_cancelled() {
                callback();
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_after(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) -> DelayHandle {
        let handle = DelayHandle::new();
        self.queue
            .lock()
            .unwrap()
            .push((handle.clone(), delay, callback));
        handle
    }
}
