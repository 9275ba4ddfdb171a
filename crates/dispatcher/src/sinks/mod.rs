//! Sink implementations
//!
//! Contains FileSink and StreamSink.

mod file;
mod stream;

pub use self::file::{FileSink, FileSinkConfig};
pub use self::stream::{StreamSink, StreamSinkConfig};
