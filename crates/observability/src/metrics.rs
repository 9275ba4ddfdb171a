//! 模拟运行指标
//!
//! 节拍级别的 Prometheus 指标，以及内存中的统计聚合。

use std::fmt;
use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// 记录一次节拍的结果
pub fn record_tick(generated: u64, silent: u64, failures: u64, elapsed: Duration) {
    counter!("vitals_sim_ticks_total").increment(1);
    counter!("vitals_sim_tick_events_total").increment(generated);
    counter!("vitals_sim_tick_silent_total").increment(silent);
    if failures > 0 {
        counter!("vitals_sim_tick_failures_total").increment(failures);
    }
    gauge!("vitals_sim_last_tick_events").set(generated as f64);
    histogram!("vitals_sim_tick_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
}

/// 记录某个 sink 的累计投递结果
pub fn record_sink_totals(sink_name: &str, delivered: u64, failed: u64, dropped: u64) {
    let sink = sink_name.to_string();
    gauge!("vitals_sim_sink_delivered", "sink" => sink.clone()).set(delivered as f64);
    gauge!("vitals_sim_sink_failed", "sink" => sink.clone()).set(failed as f64);
    gauge!("vitals_sim_sink_dropped", "sink" => sink).set(dropped as f64);
}

/// 节拍统计聚合器
#[derive(Debug, Clone, Default)]
pub struct TickStatsAggregator {
    pub ticks: u64,
    pub events: u64,
    pub silent: u64,
    pub failures: u64,
    /// 每个节拍产生的事件数
    pub events_per_tick: RunningStats,
    /// 节拍耗时 (毫秒)
    pub tick_ms: RunningStats,
}

impl TickStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累加一次节拍
    pub fn update(&mut self, generated: u64, silent: u64, failures: u64, elapsed: Duration) {
        self.ticks += 1;
        self.events += generated;
        self.silent += silent;
        self.failures += failures;
        self.events_per_tick.push(generated as f64);
        self.tick_ms.push(elapsed.as_secs_f64() * 1000.0);
    }

    /// 生成摘要
    pub fn summary(&self) -> TickSummary {
        let calls = self.events + self.silent + self.failures;
        TickSummary {
            ticks: self.ticks,
            events: self.events,
            failures: self.failures,
            failure_rate: if calls > 0 {
                self.failures as f64 / calls as f64 * 100.0
            } else {
                0.0
            },
            events_per_tick: StatsSummary::from(&self.events_per_tick),
            tick_ms: StatsSummary::from(&self.tick_ms),
        }
    }
}

/// 运行摘要
#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    pub ticks: u64,
    pub events: u64,
    pub failures: u64,
    /// 失败调用百分比
    pub failure_rate: f64,
    pub events_per_tick: StatsSummary,
    pub tick_ms: StatsSummary,
}

impl fmt::Display for TickSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Simulation Summary ===")?;
        writeln!(f, "Ticks: {}", self.ticks)?;
        writeln!(f, "Events generated: {}", self.events)?;
        writeln!(
            f,
            "Generation failures: {} ({:.2}%)",
            self.failures, self.failure_rate
        )?;
        writeln!(f, "Events per tick: {}", self.events_per_tick)?;
        writeln!(f, "Tick duration (ms): {}", self.tick_ms)
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min().unwrap_or(0.0),
            max: stats.max().unwrap_or(0.0),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
            self.min, self.max, self.mean, self.std_dev, self.count
        )
    }
}

/// 在线统计 (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    bounds: Option<(f64, f64)>,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.bounds = Some(match self.bounds {
            None => (value, value),
            Some((lo, hi)) => (lo.min(value), hi.max(value)),
        });

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> Option<f64> {
        self.bounds.map(|(lo, _)| lo)
    }

    pub fn max(&self) -> Option<f64> {
        self.bounds.map(|(_, hi)| hi)
    }
}
