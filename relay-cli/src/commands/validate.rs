//! Validate command handler

use anyhow::{Context, Result};
use colored::*;
use relay_core::Pipeline;
use std::path::Path;

use super::load_pipeline;

pub fn validate_pipeline(file: &Path) -> Result<()> {
    let pipeline = load_pipeline(file)?;
    pipeline
        .validate()
        .with_context(|| format!("Invalid pipeline definition: {}", file.display()))?;

    println!("{}", "✓ Pipeline definition is valid".green().bold());
    print_plan(&pipeline);

    Ok(())
}

/// Print stages in execution order with their resolved directories
fn print_plan(pipeline: &Pipeline) {
    println!("  Name:    {}", pipeline.name.bold());
    println!("  Base:    {}", pipeline.default_base_dir.dimmed());

    let total = pipeline.stages.len();
    if total == 0 {
        println!(
            "  {}",
            "No stages: a run only creates and removes the shared volume".yellow()
        );
    }
    for (index, stage) in pipeline.stages.iter().enumerate() {
        println!(
            "  [{}/{}] {} {}",
            index + 1,
            total,
            stage.name.cyan(),
            pipeline.stage_dir(stage).display().to_string().dimmed()
        );
    }

    match &pipeline.error_handler {
        Some(handler) => println!(
            "  Handler: {} {}",
            handler.name.cyan(),
            pipeline.stage_dir(handler).display().to_string().dimmed()
        ),
        None => println!("  Handler: {}", "none".yellow()),
    }
}
