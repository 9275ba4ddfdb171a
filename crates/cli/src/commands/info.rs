//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{GeneratorConfig, SimulationBlueprint};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    simulation: SimulationInfo,
    generators: Vec<GeneratorInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct SimulationInfo {
    patient_count: u32,
    tick_interval_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Serialize)]
struct GeneratorInfo {
    label: String,
    kind: &'static str,
    detail: String,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = super::load_blueprint(&args.config)?;
    let info = build_config_info(&blueprint);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &SimulationBlueprint) -> ConfigInfo {
    let generators = blueprint
        .generators
        .iter()
        .map(|generator| match generator {
            GeneratorConfig::Alert(alert) => GeneratorInfo {
                label: alert.label.clone(),
                kind: "alert",
                detail: format!(
                    "λ={}, trigger p={:.4}, resolve p={}",
                    alert.rate_lambda,
                    alert.trigger_probability(),
                    alert.resolve_probability
                ),
            },
            GeneratorConfig::Saturation(saturation) => GeneratorInfo {
                label: saturation.label.clone(),
                kind: "saturation",
                detail: format!(
                    "range [{}, {}], baseline [{}, {}]",
                    saturation.min, saturation.max, saturation.baseline_min, saturation.baseline_max
                ),
            },
        })
        .collect();

    let sinks = blueprint
        .sinks
        .iter()
        .map(|s| SinkInfo {
            name: s.name.clone(),
            sink_type: format!("{:?}", s.sink_type),
            queue_capacity: s.queue_capacity,
            params: s.params.clone(),
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        simulation: SimulationInfo {
            patient_count: blueprint.simulation.patient_count,
            tick_interval_ms: blueprint.simulation.tick_interval_ms,
            seed: blueprint.simulation.seed,
        },
        generators,
        sinks,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Vitals Sim Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🏥 Simulation");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Patients: {}", info.simulation.patient_count);
    println!("   ├─ Tick interval: {} ms", info.simulation.tick_interval_ms);
    match info.simulation.seed {
        Some(seed) => println!("   └─ Seed: {}", seed),
        None => println!("   └─ Seed: (entropy)"),
    }

    println!("\n📈 Generators ({})", info.generators.len());
    for (i, generator) in info.generators.iter().enumerate() {
        let prefix = tree_prefix(i, info.generators.len());
        println!(
            "   {} {} ({}): {}",
            prefix, generator.label, generator.kind, generator.detail
        );
    }

    if !info.sinks.is_empty() {
        println!("\n📤 Sinks ({})", info.sinks.len());
        for (i, sink) in info.sinks.iter().enumerate() {
            let prefix = tree_prefix(i, info.sinks.len());
            println!(
                "   {} {} ({}, queue {})",
                prefix, sink.name, sink.sink_type, sink.queue_capacity
            );
        }
    }

    println!();
}

fn tree_prefix(index: usize, len: usize) -> &'static str {
    if index + 1 == len {
        "└─"
    } else {
        "├─"
    }
}
