//! OutputSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for Sinks.

use crate::{ContractError, PatientEvent};

/// Event output trait
///
/// All sink implementations must implement this trait. `deliver` takes
/// `&self` so a sink may be shared; implementations own their own locking.
#[trait_variant::make(OutputSink: Send)]
pub trait LocalOutputSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one event
    ///
    /// # Errors
    /// Returns write error (should include context). Callers log and drop;
    /// the sink must stay usable for later events.
    async fn deliver(&self, event: &PatientEvent) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&self) -> Result<(), ContractError>;
}
