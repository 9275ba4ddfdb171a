//! Dispatcher error types
//!
//! 只覆盖构建阶段；单个事件的投递失败由 sink worker 记录，不会上抛。

use contracts::ContractError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink could not be built from its configuration (bad params, bind failure)
    #[error("failed to create sink '{name}'")]
    SinkCreation {
        name: String,
        #[source]
        source: ContractError,
    },

    /// Two sinks share a name, so their metrics could not be told apart
    #[error("sink name '{name}' is configured more than once")]
    DuplicateSink { name: String },
}

impl DispatcherError {
    pub fn sink_creation(name: impl Into<String>, source: ContractError) -> Self {
        Self::SinkCreation {
            name: name.into(),
            source,
        }
    }

    /// Name of the sink the error refers to
    pub fn sink_name(&self) -> &str {
        match self {
            Self::SinkCreation { name, .. } | Self::DuplicateSink { name } => name,
        }
    }
}
