//! `sensortrack` CLI: scenario runs, scenario files, scenario export.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sim::scenarios::{Scenario, ScenarioKind};
use sim::scheduler::{RunSummary, Simulation};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "sensortrack", about = "Sensor detection and track formation runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a built-in scenario and print its tracks and images.
    RunScenario {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Write the run summary to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run a scenario described by a JSON file.
    Run {
        /// Path to the scenario JSON file
        input: PathBuf,
        /// Override the seed stored in the file
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write a built-in scenario as JSON, as a starting point for edits.
    Export {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        output: PathBuf,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunScenario { scenario, seed, output } => {
            run(&Scenario::build(scenario, seed), output.as_deref())?;
        }
        Commands::Run { input, seed, output } => {
            let mut scenario = Scenario::load(&input)?;
            if let Some(seed) = seed {
                scenario.seed = seed;
            }
            run(&scenario, output.as_deref())?;
        }
        Commands::Export { scenario, output, seed } => {
            let scenario = Scenario::build(scenario, seed);
            std::fs::write(&output, serde_json::to_string_pretty(&scenario)?)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("Scenario '{}' written to {}", scenario.name, output.display());
        }
    }

    Ok(())
}

fn run(scenario: &Scenario, output_path: Option<&Path>) -> Result<()> {
    println!(
        "Running scenario '{}' (seed={}, duration={:.0}s, dt={}s)...",
        scenario.name, scenario.seed, scenario.duration, scenario.sim_dt
    );

    let start = std::time::Instant::now();
    let summary = Simulation::new(scenario)?.run()?;
    let elapsed = start.elapsed();
    info!(elapsed_s = elapsed.as_secs_f64(), "run complete");

    print_summary(&summary);

    if let Some(opath) = output_path {
        std::fs::write(opath, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("writing {}", opath.display()))?;
        println!("Summary saved to {}", opath.display());
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Done at t={:.1}s: {} initiated, {} updated, {} dropped, {} images",
        summary.end_time,
        summary.count("initiated"),
        summary.count("updated"),
        summary.count("dropped"),
        summary.images.len(),
    );

    for record in summary.track_events.iter().filter(|r| r.kind != "updated") {
        println!(
            "  t={:>7.2} {:<10} {:<9} {} {} on {}",
            record.time,
            record.sensor,
            record.kind,
            record.track.id,
            record.track.target_name,
            record.track.mode_name,
        );
    }

    for image in &summary.images {
        let objects: Vec<&str> = image.objects.iter().map(|o| o.name.as_str()).collect();
        println!(
            "  image {}/{}/{} [{:.1}s..{:.1}s] res {:.2}x{:.2} m: {}",
            image.sensor,
            image.stream,
            image.frame,
            image.start_time,
            image.end_time,
            image.azimuth_resolution,
            image.ground_range_resolution,
            if objects.is_empty() { "-".to_string() } else { objects.join(", ") },
        );
    }

    if !summary.final_tracks.is_empty() {
        println!("Tracks alive at end:");
        for track in &summary.final_tracks {
            println!(
                "  {} {} {} updates={} quality={:.2}",
                track.sensor_name, track.id, track.target_name, track.update_count, track.quality
            );
        }
    }
}
