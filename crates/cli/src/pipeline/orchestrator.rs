//! Simulation driver - ticks the generators and feeds the dispatcher.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{PatientEvent, SimulationBlueprint};
use dispatcher::{MetricsSnapshot, SinkMetrics};
use generators::GeneratorSet;
use observability::{record_sink_totals, record_tick};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{PipelineStats, StopReason};
use crate::error::CliError;

/// Per-sink bound on draining queues after the tick loop stops
const DRAIN_TIMEOUT: Duration = dispatcher::DEFAULT_DRAIN_TIMEOUT;

/// Extra time the dispatcher task gets beyond the per-sink bound
const DRAIN_GRACE: Duration = Duration::from_secs(1);

type SinkReport = Vec<(String, MetricsSnapshot)>;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The simulation blueprint
    pub blueprint: SimulationBlueprint,

    /// Maximum number of ticks (None = unlimited)
    pub max_ticks: Option<u64>,

    /// Run timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Channel buffer size
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main simulation driver
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `max_ticks`, the timeout, or `shutdown` resolves
    ///
    /// Sinks are always drained before returning, whichever condition stops the loop.
    pub async fn run_until<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let mut generators = GeneratorSet::from_blueprint(blueprint);
        info!(
            patients = generators.patient_count(),
            generators = ?generators.labels(),
            seeded = blueprint.simulation.seed.is_some(),
            "Generators ready"
        );

        let (event_tx, event_rx) = mpsc::channel::<PatientEvent>(self.config.buffer_size.max(1));

        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - generated events will be discarded");
        }

        let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), event_rx)
            .await
            .context("Failed to create dispatcher")?
            .with_drain_timeout(DRAIN_TIMEOUT);
        let live_metrics = dispatcher.sink_metrics();
        let dispatcher_handle = dispatcher.spawn();

        info!(sinks = blueprint.sinks.len(), "Dispatcher started");

        let mut stats = PipelineStats::default();
        let mut interval =
            tokio::time::interval(Duration::from_millis(blueprint.simulation.tick_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let deadline = self
            .config
            .timeout
            .map(|timeout| tokio::time::Instant::now() + timeout);
        let timeout_sleep = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timeout_sleep);
        tokio::pin!(shutdown);

        info!(
            interval_ms = blueprint.simulation.tick_interval_ms,
            max_ticks = ?self.config.max_ticks,
            "Simulation running"
        );

        stats.stop_reason = loop {
            tokio::select! {
                _ = &mut shutdown => break StopReason::Signal,
                _ = &mut timeout_sleep => {
                    warn!(timeout_secs = ?self.config.timeout.map(|t| t.as_secs()), "Simulation timed out");
                    break StopReason::Timeout;
                }
                _ = interval.tick() => {}
            }

            let tick_start = Instant::now();
            let report = generators.tick();
            let generated = report.generated();

            let mut channel_closed = false;
            for event in report.events {
                if event_tx.send(event).await.is_err() {
                    channel_closed = true;
                    break;
                }
            }

            let elapsed = tick_start.elapsed();
            record_tick(generated, report.silent, report.failures, elapsed);
            stats.tick_stats.update(generated, report.silent, report.failures, elapsed);

            debug!(
                tick = stats.tick_stats.ticks,
                generated,
                failures = report.failures,
                "Tick dispatched"
            );

            if channel_closed {
                warn!("Dispatcher channel closed");
                break StopReason::DispatcherClosed;
            }

            if let Some(max) = self.config.max_ticks {
                if stats.tick_stats.ticks >= max {
                    info!(ticks = stats.tick_stats.ticks, "Reached max ticks limit");
                    break StopReason::MaxTicks;
                }
            }
        };

        info!(reason = %stats.stop_reason, "Shutting down simulation...");
        drop(event_tx);

        let report =
            collect_sink_report(dispatcher_handle, live_metrics, DRAIN_TIMEOUT + DRAIN_GRACE)
                .await?;
        for (name, snapshot) in &report {
            record_sink_totals(name, snapshot.delivered, snapshot.failed, snapshot.dropped);
        }
        stats.sinks = report;

        stats.duration = start_time.elapsed();

        info!(
            ticks = stats.tick_stats.ticks,
            events = stats.tick_stats.events,
            duration_secs = stats.duration.as_secs_f64(),
            "Simulation shutdown complete"
        );

        Ok(stats)
    }
}

/// Wait for the dispatcher's final report, falling back to live counters
///
/// The dispatcher bounds each sink itself; `limit` only guards against the
/// dispatcher task itself never finishing, in which case it is aborted.
async fn collect_sink_report(
    mut task: JoinHandle<SinkReport>,
    live: Vec<(String, Arc<SinkMetrics>)>,
    limit: Duration,
) -> Result<SinkReport, CliError> {
    match tokio::time::timeout(limit, &mut task).await {
        Ok(Ok(report)) => Ok(report),
        Ok(Err(e)) => Err(CliError::simulation(format!("dispatcher task failed: {e}"))),
        Err(_) => {
            task.abort();
            warn!(
                timeout_ms = limit.as_millis() as u64,
                "Dispatcher did not finish draining, reporting live counters"
            );
            Ok(live
                .into_iter()
                .map(|(name, metrics)| (name, metrics.snapshot()))
                .collect())
        }
    }
}
