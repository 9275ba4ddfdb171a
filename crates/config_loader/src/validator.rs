//! 配置校验模块
//!
//! 校验规则：
//! - patient_count > 0, tick_interval_ms > 0
//! - 至少一个生成器，label 唯一且非空
//! - alert: rate_lambda > 0 且有限，0 <= resolve_probability <= 1
//! - saturation: min <= baseline_min <= baseline_max <= max
//! - sink 名称非空且唯一，queue_capacity > 0
//! - stream sink 需要 port 或 addr

use std::collections::HashSet;

use contracts::{
    AlertConfig, ContractError, GeneratorConfig, SaturationConfig, SimulationBlueprint, SinkType,
};

/// 校验 SimulationBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &SimulationBlueprint) -> Result<(), ContractError> {
    validate_simulation(blueprint)?;
    validate_generator_labels(blueprint)?;
    for (idx, generator) in blueprint.generators.iter().enumerate() {
        match generator {
            GeneratorConfig::Alert(alert) => validate_alert(idx, alert)?,
            GeneratorConfig::Saturation(saturation) => validate_saturation(idx, saturation)?,
        }
    }
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_simulation(blueprint: &SimulationBlueprint) -> Result<(), ContractError> {
    let simulation = &blueprint.simulation;

    if simulation.patient_count == 0 {
        return Err(ContractError::config_validation(
            "simulation.patient_count",
            "patient_count must be > 0",
        ));
    }

    if simulation.tick_interval_ms == 0 {
        return Err(ContractError::config_validation(
            "simulation.tick_interval_ms",
            "tick_interval_ms must be > 0",
        ));
    }

    Ok(())
}

/// 校验生成器 label 唯一性
fn validate_generator_labels(blueprint: &SimulationBlueprint) -> Result<(), ContractError> {
    if blueprint.generators.is_empty() {
        return Err(ContractError::config_validation(
            "generators",
            "at least one generator is required",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, generator) in blueprint.generators.iter().enumerate() {
        let label = generator.label();
        if label.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("generators[{idx}].label"),
                "label cannot be empty",
            ));
        }
        if !seen.insert(label) {
            return Err(ContractError::config_validation(
                format!("generators[label={label}]"),
                "duplicate generator label",
            ));
        }
    }
    Ok(())
}

fn validate_alert(idx: usize, alert: &AlertConfig) -> Result<(), ContractError> {
    if !alert.rate_lambda.is_finite() || alert.rate_lambda <= 0.0 {
        return Err(ContractError::config_validation(
            format!("generators[{idx}].rate_lambda"),
            format!("rate_lambda must be > 0, got {}", alert.rate_lambda),
        ));
    }

    if !(0.0..=1.0).contains(&alert.resolve_probability) {
        return Err(ContractError::config_validation(
            format!("generators[{idx}].resolve_probability"),
            format!(
                "resolve_probability must be within [0, 1], got {}",
                alert.resolve_probability
            ),
        ));
    }

    Ok(())
}

fn validate_saturation(idx: usize, saturation: &SaturationConfig) -> Result<(), ContractError> {
    let SaturationConfig {
        min,
        max,
        baseline_min,
        baseline_max,
        ..
    } = *saturation;

    if !(min <= baseline_min && baseline_min <= baseline_max && baseline_max <= max) {
        return Err(ContractError::config_validation(
            format!("generators[{idx}]"),
            format!(
                "expected min <= baseline_min <= baseline_max <= max, got {min} <= {baseline_min} <= {baseline_max} <= {max}"
            ),
        ));
    }

    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &SimulationBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for sink in &blueprint.sinks {
        if sink.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                "sinks[].name",
                "sink name cannot be empty",
            ));
        }

        if !seen.insert(&sink.name) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }

        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }

        if sink.sink_type == SinkType::Stream
            && !sink.params.contains_key("port")
            && !sink.params.contains_key("addr")
        {
            return Err(ContractError::config_validation(
                format!("sinks[{}].params", sink.name),
                "stream sink requires 'port' or 'addr'",
            ));
        }
    }
    Ok(())
}
