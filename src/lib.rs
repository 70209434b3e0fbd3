//! pulse-stream: a small push-based reactive stream engine.
//!
//! Streams are hot, broadcast, and lazy: a [`Stream`] multiplexes one
//! producer to many listeners, starts the producer when the first listener
//! attaches, and stops it (after a short grace window) when the last one
//! leaves. Operators are streams themselves, so chains activate and tear
//! down from the listening end backwards.
//!
//! ```
//! use pulse_stream::{from_iter, AnyListener};
//!
//! let doubled = from_iter([1, 2, 3]).map(|x| x * 2);
//! doubled.attach(AnyListener::from_next(|x| println!("{x}")));
//! ```

pub mod error;
pub mod scheduler;
pub mod stream;

pub use error::{StreamError, StreamResult};
pub use scheduler::{DelayHandle, Scheduler, TokioScheduler};
pub use stream::*;
