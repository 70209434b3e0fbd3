//! Push-based streams: lazily-activated event sources with a combinator
//! catalog.
//!
//! A [`Stream`] broadcasts events from one producer to any number of
//! listeners. The producer only runs while at least one listener is
//! attached, so operator chains built from these streams cost nothing until
//! somebody subscribes to the end of the chain.

pub mod accumulate;
pub mod constructors;
pub mod core;
pub mod imitate;
pub mod memory;
pub mod rate;
pub mod select;
pub mod specialized;
pub mod transform;
pub mod utility;

// Re-export core types
pub use self::core::{AnyListener, AnyProducer, Listener, Producer, RemoveToken, Stream};

// Re-export constructors
pub use constructors::{empty, fail, from_iter, pending, periodic};

// Re-export memory and feedback streams
pub use imitate::{mimic, MimicStream};
pub use memory::MemoryStream;

// Re-export fan-in combinators
pub use select::merge;
