//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::SimulationBlueprint;
use std::time::Duration;
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_simulation(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut blueprint = load_blueprint(&args.config)?;
    apply_overrides(&mut blueprint, args)?;

    info!(
        patients = blueprint.simulation.patient_count,
        interval_ms = blueprint.simulation.tick_interval_ms,
        generators = blueprint.generators.len(),
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        max_ticks: (args.max_ticks != 0).then_some(args.max_ticks),
        timeout: (args.timeout != 0).then(|| Duration::from_secs(args.timeout)),
        buffer_size: args.buffer_size,
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
    };

    info!("Starting simulation...");

    let stats = Pipeline::new(pipeline_config)
        .run_until(shutdown_signal())
        .await
        .context("Simulation failed")?;

    info!(
        ticks = stats.tick_stats.ticks,
        events = stats.tick_stats.events,
        duration_secs = stats.duration.as_secs_f64(),
        events_per_sec = format!("{:.2}", stats.events_per_sec()),
        "Simulation completed"
    );
    stats.print_summary();

    Ok(())
}

/// Apply command-line overrides, then re-check the values they touch
fn apply_overrides(blueprint: &mut SimulationBlueprint, args: &RunArgs) -> Result<()> {
    if let Some(patients) = args.patients {
        info!(patients, "Overriding patient count from CLI");
        blueprint.simulation.patient_count = patients;
    }
    if let Some(interval_ms) = args.interval_ms {
        info!(interval_ms, "Overriding tick interval from CLI");
        blueprint.simulation.tick_interval_ms = interval_ms;
    }
    if let Some(seed) = args.seed {
        info!(seed, "Overriding random seed from CLI");
        blueprint.simulation.seed = Some(seed);
    }

    config_loader::validate(blueprint)
        .map_err(|e| CliError::invalid_override(e.to_string()))?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that fails to install is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Received shutdown signal, stopping simulation...");
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &SimulationBlueprint) {
    let simulation = &blueprint.simulation;
    println!("\n=== Configuration Summary ===\n");
    println!("Simulation:");
    println!("  Patients: {}", simulation.patient_count);
    println!("  Tick interval: {} ms", simulation.tick_interval_ms);
    match simulation.seed {
        Some(seed) => println!("  Seed: {}", seed),
        None => println!("  Seed: (entropy)"),
    }

    println!("\nGenerators ({}):", blueprint.generators.len());
    for generator in &blueprint.generators {
        println!("  - {}", generator.label());
    }

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
