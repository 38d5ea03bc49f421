//! Run command handler
//!
//! Runs a pipeline end to end. The result JSON goes to stdout (or `--output`),
//! a human-readable summary goes to stderr.

use anyhow::{Context, Result};
use colored::*;
use relay_core::{CmdResult, PipelineResult};
use relay_runner::{
    CancelToken, Orchestrator, PipelineFailure, ProcessRunner, check_engine_available,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::load_pipeline;
use crate::config::{self, Overrides};

pub async fn run_pipeline(file: &Path, overrides: Overrides, output: Option<&Path>) -> Result<()> {
    let pipeline = load_pipeline(file)?;
    pipeline
        .validate()
        .with_context(|| format!("Invalid pipeline definition: {}", file.display()))?;

    let config = config::load(overrides)?;
    let runner = Arc::new(ProcessRunner::new(config.invocation_timeout));

    let version = check_engine_available(runner.as_ref(), &config.engine)
        .await
        .with_context(|| format!("Container engine '{}' is not available", config.engine))?;
    info!("Using {}", version);

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling pipeline");
            on_interrupt.cancel();
        }
    });

    let orchestrator = Orchestrator::new(runner, &config);
    info!(
        "Running pipeline {} with volume {}",
        pipeline.name,
        orchestrator.volume_name()
    );

    let (result, error) = match orchestrator.run(&pipeline, &cancel).await {
        Ok(result) => (result, None),
        Err(PipelineFailure { result, error }) => (result, Some(error)),
    };

    write_result(&result, output)?;
    print_summary(&result);

    match error {
        Some(error) => Err(anyhow::Error::new(error)
            .context(format!("Pipeline {} finished with {}", result.name, result.status))),
        None => Ok(()),
    }
}

fn write_result(result: &PipelineResult, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(result).context("Failed to encode pipeline result")?;

    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write result to {}", path.display())),
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}

/// Print a run summary to stderr
fn print_summary(result: &PipelineResult) {
    eprintln!();
    let headline = format!("Pipeline {}: {}", result.name, result.status);
    if result.is_ok() {
        eprintln!("{}", format!("✓ {}", headline).green().bold());
    } else {
        eprintln!("{}", format!("✗ {}", headline).red().bold());
    }

    for stage in &result.stage_results {
        let elapsed = stage.end - stage.start;
        eprintln!(
            "  {} {:<24} build {}  run {}  {}",
            "▸".cyan(),
            stage.stage.bold(),
            step_label(&stage.build_result),
            step_label(&stage.run_result),
            format!("{:.1}s", elapsed.num_milliseconds() as f64 / 1000.0).dimmed()
        );
    }

    let total = result.end - result.start;
    eprintln!(
        "  Took:  {}",
        format!("{:.1}s", total.num_milliseconds() as f64 / 1000.0).dimmed()
    );
}

fn step_label(step: &CmdResult) -> ColoredString {
    if step.is_empty() {
        "-".dimmed()
    } else if step.exit_status == 0 {
        "ok".green()
    } else {
        step.exit_status.to_string().red()
    }
}
