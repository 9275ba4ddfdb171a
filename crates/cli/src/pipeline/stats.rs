//! Run statistics.

use std::fmt;
use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::TickStatsAggregator;

/// Why the tick loop stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopReason {
    #[default]
    MaxTicks,
    Timeout,
    Signal,
    DispatcherClosed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MaxTicks => "max ticks reached",
            Self::Timeout => "timeout",
            Self::Signal => "shutdown signal",
            Self::DispatcherClosed => "dispatcher closed",
        };
        f.write_str(text)
    }
}

/// Statistics from a simulation run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    pub stop_reason: StopReason,

    /// Tick aggregator
    pub tick_stats: TickStatsAggregator,

    /// Final per-sink delivery counters, in configuration order
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

impl PipelineStats {
    /// Events generated per second of wall time
    pub fn events_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.tick_stats.events as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!();
        print!("{}", self.tick_stats.summary());
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Events/sec: {:.2}", self.events_per_sec());
        println!("Stopped by: {}", self.stop_reason);

        if !self.sinks.is_empty() {
            println!("\nSinks ({}):", self.sinks.len());
            for (name, snapshot) in &self.sinks {
                println!("  - {}: {}", name, snapshot);
            }
        }

        println!();
    }
}
