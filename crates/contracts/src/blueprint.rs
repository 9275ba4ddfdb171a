//! SimulationBlueprint - Config Loader 输出
//!
//! 描述完整的模拟配置：病人数量、节拍间隔、信号生成器、输出路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的模拟配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 模拟设置
    pub simulation: SimulationConfig,

    /// 信号生成器列表
    pub generators: Vec<GeneratorConfig>,

    /// 输出路由配置
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// 模拟设置：病人数量、节拍
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// 病人数量 (id 1..=patient_count)
    pub patient_count: u32,

    /// 节拍间隔 (毫秒)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// 随机种子 (None = 每次运行不同)
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

/// 信号生成器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneratorConfig {
    /// 二值告警：触发 / 解除
    Alert(AlertConfig),
    /// 有界随机游走 (血氧饱和度)
    Saturation(SaturationConfig),
}

impl GeneratorConfig {
    /// Label carried by events of this generator
    pub fn label(&self) -> &str {
        match self {
            Self::Alert(config) => &config.label,
            Self::Saturation(config) => &config.label,
        }
    }
}

/// 告警生成器参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_alert_label")]
    pub label: String,

    /// 每个节拍的期望告警到达率 λ
    #[serde(default = "default_rate_lambda")]
    pub rate_lambda: f64,

    /// 已触发告警在一个节拍内解除的概率
    #[serde(default = "default_resolve_probability")]
    pub resolve_probability: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            label: default_alert_label(),
            rate_lambda: default_rate_lambda(),
            resolve_probability: default_resolve_probability(),
        }
    }
}

impl AlertConfig {
    /// Probability of at least one Poisson arrival within a tick: `1 - e^-λ`
    pub fn trigger_probability(&self) -> f64 {
        -(-self.rate_lambda).exp_m1()
    }
}

fn default_alert_label() -> String {
    "Alert".to_string()
}

fn default_rate_lambda() -> f64 {
    0.1
}

fn default_resolve_probability() -> f64 {
    0.9
}

/// 饱和度随机游走参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaturationConfig {
    #[serde(default = "default_saturation_label")]
    pub label: String,

    /// 下限 (含)
    #[serde(default = "default_saturation_min")]
    pub min: u32,

    /// 上限 (含)
    #[serde(default = "default_saturation_max")]
    pub max: u32,

    /// 初始基线下限 (含)
    #[serde(default = "default_baseline_min")]
    pub baseline_min: u32,

    /// 初始基线上限 (含)
    #[serde(default = "default_saturation_max")]
    pub baseline_max: u32,
}

impl Default for SaturationConfig {
    fn default() -> Self {
        Self {
            label: default_saturation_label(),
            min: default_saturation_min(),
            max: default_saturation_max(),
            baseline_min: default_baseline_min(),
            baseline_max: default_saturation_max(),
        }
    }
}

fn default_saturation_label() -> String {
    "Saturation".to_string()
}

fn default_saturation_min() -> u32 {
    90
}

fn default_saturation_max() -> u32 {
    100
}

fn default_baseline_min() -> u32 {
    95
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    1024
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 每个标签一个追加日志文件
    File,
    /// TCP 行协议，单一读者
    Stream,
}
