//! # Dispatcher
//!
//! 事件分发模块。
//!
//! 负责：
//! - 消费 `PatientEvent`
//! - Fan-out 到多个 sinks
//! - 隔离慢 sink，不阻塞生成节拍

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{OutputSink, PatientEvent};
pub use dispatcher::{
    create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig, DEFAULT_DRAIN_TIMEOUT,
};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, FileSinkConfig, StreamSink, StreamSinkConfig};
