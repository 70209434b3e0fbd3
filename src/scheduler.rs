//! Cancelable delayed execution.
//!
//! The engine needs exactly one timing capability: run a callback after a
//! delay, with the option to cancel it before it fires. The deferred
//! producer teardown (grace period) and the `debounce` operator are built on
//! it. The default implementation rides on tokio timers; streams accept any
//! [`Scheduler`] at construction, which is also how tests substitute time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use tokio::runtime::Handle;

/// Schedules callbacks to run once after a delay.
///
/// Implementations must not invoke the callback synchronously from inside
/// `schedule_after`; callers may hold locks while scheduling.
pub trait Scheduler: Send + Sync {
    fn schedule_after(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) -> DelayHandle;
}

/// Handle to a scheduled callback.
///
/// Canceling a handle whose callback already ran, or canceling twice, has no
/// observable effect.
#[derive(Clone)]
pub struct DelayHandle {
    cancelled: Arc<AtomicBool>,
}

impl DelayHandle {
    /// Creates a handle in the un-canceled state.
    ///
    /// A [`Scheduler`] implementation hands one clone to the caller and
    /// keeps another next to the scheduled callback, checking
    /// [`is_cancelled`](DelayHandle::is_cancelled) right before invoking it.
    pub fn new() -> DelayHandle {
        DelayHandle {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for DelayHandle {
    fn default() -> Self {
        DelayHandle::new()
    }
}

/// Default scheduler backed by tokio timers.
///
/// When called outside a tokio runtime it falls back to a plain thread
/// timer, so detaching listeners from synchronous code still works.
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_after(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) -> DelayHandle {
        let handle = DelayHandle::new();
        let guard = handle.clone();
        match Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if !guard.is_cancelled() {
                        callback();
                    }
                });
            }
            Err(_) => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    if !guard.is_cancelled() {
                        callback();
                    }
                });
            }
        }
        handle
    }
}

lazy_static! {
    static ref DEFAULT_SCHEDULER: Arc<TokioScheduler> = Arc::new(TokioScheduler);
}

/// The process-wide default scheduler used by streams constructed without an
/// explicit one.
pub fn default_scheduler() -> Arc<dyn Scheduler> {
    DEFAULT_SCHEDULER.clone()
}
