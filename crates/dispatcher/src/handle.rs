//! SinkHandle - manages a sink with isolated queue and worker task

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{OutputSink, PatientEvent};

use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send events to worker
    tx: mpsc::Sender<PatientEvent>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Take ownership of a sink and spawn its worker task
    pub fn spawn<S: OutputSink + Sync + 'static>(sink: S, queue_capacity: usize) -> Self {
        Self::spawn_shared(Arc::new(sink), queue_capacity)
    }

    /// Spawn a worker for a sink the caller keeps a reference to
    pub fn spawn_shared<S: OutputSink + Sync + 'static>(
        sink: Arc<S>,
        queue_capacity: usize,
    ) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue an event for the sink (non-blocking)
    ///
    /// Returns true if queued, false if the queue was full (event dropped)
    pub fn try_send(&self, event: PatientEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.metrics.record_dropped();
                warn!(
                    sink = %self.name,
                    patient_id = %event.patient_id(),
                    label = event.label(),
                    "Queue full, event dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Shutdown the sink worker gracefully, draining queued events first
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }

    /// Like [`shutdown`](Self::shutdown), but abort the worker if it has not
    /// drained within `limit`
    ///
    /// Returns false when the worker was aborted; queued events are lost and
    /// the sink is never closed.
    #[instrument(name = "sink_handle_shutdown_within", skip(self), fields(sink = %self.name))]
    pub async fn shutdown_within(self, limit: Duration) -> bool {
        drop(self.tx);
        let mut worker = self.worker_handle;
        match tokio::time::timeout(limit, &mut worker).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(sink = %self.name, error = ?e, "Worker task panicked");
                true
            }
            Err(_) => {
                worker.abort();
                warn!(
                    sink = %self.name,
                    limit_ms = limit.as_millis() as u64,
                    pending = self.metrics.queue_len(),
                    "Sink did not drain in time, worker aborted"
                );
                false
            }
        }
    }
}

/// Worker task that consumes events and delivers them to the sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: OutputSink + Sync>(
    sink: Arc<S>,
    mut rx: mpsc::Receiver<PatientEvent>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(event) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.deliver(&event).await {
            Ok(()) => metrics.record_delivered(),
            Err(e) => {
                // One lost event never stops the worker
                metrics.record_failed();
                error!(
                    sink = %name,
                    patient_id = %event.patient_id(),
                    label = event.label(),
                    error = %e,
                    "Delivery failed, event dropped"
                );
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}
