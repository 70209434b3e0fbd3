//! Error types for pulse-stream.
//!
//! The engine itself never interprets errors: anything that reaches a
//! stream's `error` channel is carried opaquely to every attached listener
//! and terminates the stream.

use thiserror::Error;

/// Main error type carried on a stream's error channel.
///
/// Errors are cloned for every attached listener, so the payload is kept
/// as plain data rather than a boxed error trait object.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamError {
    /// I/O related errors
    #[error("IO error: {0}")]
    IO(String),
    /// Operation timed out
    #[error("operation timed out")]
    Timeout,
    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,
    /// Custom error with message
    #[error("stream error: {0}")]
    Custom(String),
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::IO(err.to_string())
    }
}

impl From<String> for StreamError {
    fn from(msg: String) -> Self {
        StreamError::Custom(msg)
    }
}

impl From<&str> for StreamError {
    fn from(msg: &str) -> Self {
        StreamError::Custom(msg.to_string())
    }
}

/// Result type for fallible stream callbacks.
pub type StreamResult<T> = Result<T, StreamError>;
