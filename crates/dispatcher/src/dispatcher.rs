//! Dispatcher - main loop for fan-out to sinks

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use contracts::{PatientEvent, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::sinks::{FileSink, StreamSink};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sink configurations
    pub sinks: Vec<SinkConfig>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: mpsc::Receiver<PatientEvent>,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(config: DispatcherConfig, input_rx: mpsc::Receiver<PatientEvent>) -> Self {
        Self { config, input_rx }
    }

    /// Build every sink and start its worker
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let handles = Self::initialize_handles(&self.config).await?;

        Ok(Dispatcher::with_handles(handles, self.input_rx))
    }

    #[instrument(
        name = "dispatcher_initialize_handles",
        skip(config),
        fields(sink_count = config.sinks.len())
    )]
    async fn initialize_handles(
        config: &DispatcherConfig,
    ) -> Result<Vec<SinkHandle>, DispatcherError> {
        let mut handles: Vec<SinkHandle> = Vec::with_capacity(config.sinks.len());
        for sink_config in &config.sinks {
            if handles.iter().any(|h| h.name() == sink_config.name) {
                return Err(DispatcherError::DuplicateSink {
                    name: sink_config.name.clone(),
                });
            }
            handles.push(create_sink_handle(sink_config).await?);
        }
        Ok(handles)
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params);
            info!(sink = %config.name, path = %sink.base_path().display(), "FileSink ready");
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::Stream => {
            let sink = StreamSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// Per-sink bound on draining the queue once input closes
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The main Dispatcher that fans out events to sinks
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<PatientEvent>,
    drain_timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles
    pub fn with_handles(handles: Vec<SinkHandle>, input_rx: mpsc::Receiver<PatientEvent>) -> Self {
        Self {
            handles,
            input_rx,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Override how long each sink may take to drain on shutdown
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Live counters for every sink, readable after the dispatcher is spawned
    pub fn sink_metrics(&self) -> Vec<(String, Arc<SinkMetrics>)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), Arc::clone(h.metrics())))
            .collect()
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Run the dispatcher main loop
    ///
    /// Consumes events from input and fans out to all sinks.
    /// Returns per-sink metrics once the input channel is closed and every
    /// sink has drained its queue.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> Vec<(String, MetricsSnapshot)> {
        info!(sinks = self.handles.len(), "Dispatcher started");

        let mut event_count: u64 = 0;

        while let Some(event) = self.input_rx.recv().await {
            event_count += 1;
            self.dispatch_event(event);

            if event_count.is_multiple_of(1000) {
                debug!(events = event_count, "Dispatcher progress");
            }
        }

        info!(
            events = event_count,
            "Dispatcher input closed, shutting down"
        );

        let report = Self::shutdown_handles(self.handles, self.drain_timeout).await;

        info!("Dispatcher shutdown complete");
        report
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<Vec<(String, MetricsSnapshot)>> {
        tokio::spawn(self.run())
    }

    fn dispatch_event(&self, event: PatientEvent) {
        let Some((last, rest)) = self.handles.split_last() else {
            return;
        };
        for handle in rest {
            handle.try_send(event.clone());
        }
        last.try_send(event);
    }

    /// Drain all sinks concurrently, each bounded by `drain_timeout`
    ///
    /// Every sink is reported, including ones whose worker had to be aborted.
    async fn shutdown_handles(
        handles: Vec<SinkHandle>,
        drain_timeout: Duration,
    ) -> Vec<(String, MetricsSnapshot)> {
        let pending: Vec<_> = handles
            .into_iter()
            .map(|handle| {
                let name = handle.name().to_string();
                let metrics = Arc::clone(handle.metrics());
                let task = tokio::spawn(handle.shutdown_within(drain_timeout));
                (name, metrics, task)
            })
            .collect();

        let mut report = Vec::with_capacity(pending.len());
        for (name, metrics, task) in pending {
            match task.await {
                Ok(true) => {}
                Ok(false) => warn!(sink = %name, "Sink aborted before draining"),
                Err(e) => error!(sink = %name, error = ?e, "Sink shutdown task failed"),
            }
            report.push((name, metrics.snapshot()));
        }
        report
    }
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs, input_rx))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<PatientEvent>,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
    };
    DispatcherBuilder::new(config, input_rx).build().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ContractError, OutputSink, PatientId};
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    fn event(id: u32, label: &str, value: &str) -> PatientEvent {
        PatientEvent::new(PatientId::new(id).unwrap(), i64::from(id) * 10, label, value)
    }

    #[tokio::test]
    async fn test_dispatcher_fanout_to_file_sinks() {
        let left = tempdir().unwrap();
        let right = tempdir().unwrap();
        let (input_tx, input_rx) = mpsc::channel(10);

        let configs = vec![
            SinkConfig {
                name: "left".to_string(),
                sink_type: SinkType::File,
                queue_capacity: 50,
                params: HashMap::from([(
                    "base_path".to_string(),
                    left.path().display().to_string(),
                )]),
            },
            SinkConfig {
                name: "right".to_string(),
                sink_type: SinkType::File,
                queue_capacity: 50,
                params: HashMap::from([(
                    "base_path".to_string(),
                    right.path().display().to_string(),
                )]),
            },
        ];

        let dispatcher = create_dispatcher(configs, input_rx).await.unwrap();
        assert_eq!(dispatcher.metrics().len(), 2);
        let handle = dispatcher.spawn();

        for i in 1..=5 {
            input_tx.send(event(i, "Alert", "triggered")).await.unwrap();
        }
        drop(input_tx);

        let report = handle.await.unwrap();
        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|(_, m)| m.delivered == 5 && m.failed == 0));

        for dir in [&left, &right] {
            let content = fs::read_to_string(dir.path().join("Alert.txt")).unwrap();
            assert_eq!(content.lines().count(), 5);
        }
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_affect_others() {
        let good = tempdir().unwrap();
        let blocker = good.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        let (input_tx, input_rx) = mpsc::channel(10);

        let handles = vec![
            SinkHandle::spawn(
                FileSink::new(
                    "broken",
                    crate::FileSinkConfig {
                        base_path: blocker.join("out"),
                    },
                ),
                10,
            ),
            SinkHandle::spawn(
                FileSink::new(
                    "good",
                    crate::FileSinkConfig {
                        base_path: good.path().join("out"),
                    },
                ),
                10,
            ),
        ];

        let handle = Dispatcher::with_handles(handles, input_rx).spawn();
        input_tx.send(event(1, "Saturation", "98.0%")).await.unwrap();
        input_tx.send(event(2, "Saturation", "97.0%")).await.unwrap();
        drop(input_tx);

        let report: HashMap<_, _> = handle.await.unwrap().into_iter().collect();
        assert_eq!(report["broken"].failed, 2);
        assert_eq!(report["good"].delivered, 2);

        let content = fs::read_to_string(good.path().join("out").join("Saturation.txt")).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_stream_sink_port_conflict_fails_build() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = occupied.local_addr().unwrap();
        let (_input_tx, input_rx) = mpsc::channel(1);

        let configs = vec![SinkConfig {
            name: "tcp".to_string(),
            sink_type: SinkType::Stream,
            queue_capacity: 10,
            params: HashMap::from([("addr".to_string(), addr.to_string())]),
        }];

        let err = create_dispatcher(configs, input_rx).await.err().unwrap();
        assert_eq!(err.sink_name(), "tcp");
        assert!(matches!(
            err,
            DispatcherError::SinkCreation {
                source: ContractError::SinkConnection { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_duplicate_sink_name_rejected() {
        let dir = tempdir().unwrap();
        let (_input_tx, input_rx) = mpsc::channel(1);
        let config = SinkConfig {
            name: "files".to_string(),
            sink_type: SinkType::File,
            queue_capacity: 10,
            params: HashMap::from([(
                "base_path".to_string(),
                dir.path().display().to_string(),
            )]),
        };

        let err = create_dispatcher(vec![config.clone(), config], input_rx)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DispatcherError::DuplicateSink { ref name } if name == "files"));
    }

    /// Sink whose delivery never completes
    struct HungSink;

    impl OutputSink for HungSink {
        fn name(&self) -> &str {
            "hung"
        }

        async fn deliver(&self, _event: &PatientEvent) -> Result<(), ContractError> {
            std::future::pending().await
        }

        async fn flush(&self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_hung_sink_does_not_hide_other_totals() {
        let dir = tempdir().unwrap();
        let (input_tx, input_rx) = mpsc::channel(10);

        let handles = vec![
            SinkHandle::spawn(HungSink, 10),
            SinkHandle::spawn(
                FileSink::new(
                    "files",
                    crate::FileSinkConfig {
                        base_path: dir.path().to_path_buf(),
                    },
                ),
                10,
            ),
        ];

        let dispatcher = Dispatcher::with_handles(handles, input_rx)
            .with_drain_timeout(Duration::from_millis(200));
        let live = dispatcher.sink_metrics();
        let task = dispatcher.spawn();

        input_tx.send(event(1, "Alert", "triggered")).await.unwrap();
        input_tx.send(event(2, "Alert", "triggered")).await.unwrap();
        drop(input_tx);

        let report = tokio::time::timeout(Duration::from_secs(3), task)
            .await
            .expect("dispatcher shutdown hung on a stalled sink")
            .unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(report[0].0, "hung");
        assert_eq!(report[0].1.delivered, 0);
        assert_eq!(report[1].0, "files");
        assert_eq!(report[1].1.delivered, 2);
        assert_eq!(live[1].1.delivered(), 2);

        let content = fs::read_to_string(dir.path().join("Alert.txt")).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
