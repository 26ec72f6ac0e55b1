//! GraSim CLI
//!
//! Run gravity survey scenarios, or a single run from a JSON config.

use clap::Parser;
use grasim_core::InterpolationMethod;
use grasim_sim::{export_session, run_config, ScenarioId, ScenarioResult, ScenarioRunner, SimConfig};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_SEED: u64 = 42;

/// GraSim gravity survey simulator
#[derive(Parser, Debug)]
#[command(name = "grasim")]
#[command(about = "Forward model buried density anomalies and simulate noisy gravity surveys", long_about = None)]
struct Args {
    /// Master seed for determinism (defaults to 42, or the config's own seed)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Scenario to run (flat_sphere, terrain_sphere, rugged_terrain, sparse_survey, cylinder_terrain, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Run a JSON config instead of a scenario
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the datum spacing (m)
    #[arg(short, long)]
    resolution: Option<f64>,

    /// Override the interpolation method (linear, cubic, nearest)
    #[arg(short, long)]
    method: Option<InterpolationMethod>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Print recovery tables
    #[arg(long)]
    report: bool,

    /// Export all fields of a single run to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Export all fields of a single run as CSV matrices into a directory
    #[arg(long)]
    csv: Option<PathBuf>,
}

/// Config-file run, or one scenario run with its session kept for export.
/// A failed export fails the run.
fn run_single(args: &Args, name: &str, mut config: SimConfig) -> ScenarioResult {
    if let Some(resolution) = args.resolution {
        config.resolution = resolution;
    }
    if let Some(method) = args.method {
        config.interpolation = method;
    }

    let (session, mut result) = match run_config(name, &config) {
        Ok(done) => done,
        Err(e) => {
            error!("✗ {} aborted: {}", name, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = export_session(&session, &result, args.export.as_deref(), args.csv.as_deref()) {
        error!("Failed to write export: {}", e);
        result.passed = false;
        result.failure_reason = Some(format!("export failed: {}", e));
    }
    result
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    if !args.json {
        info!("GraSim v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let exporting = args.export.is_some() || args.csv.is_some();
    let mut all_results: Vec<ScenarioResult> = Vec::new();

    if let Some(path) = &args.config {
        let mut config = SimConfig::load(path).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });
        if let Some(seed) = args.seed {
            config.seed = seed;
        }
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("config")
            .to_string();
        all_results.push(run_single(&args, &name, config));
    } else {
        let seed = args.seed.unwrap_or(DEFAULT_SEED);

        // Parse scenarios
        let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
            ScenarioId::all()
        } else {
            vec![args.scenario.parse().unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                eprintln!("Available scenarios: flat_sphere, terrain_sphere, rugged_terrain, sparse_survey, cylinder_terrain, all");
                std::process::exit(1);
            })]
        };

        if exporting && scenarios.len() > 1 {
            eprintln!("Error: --export/--csv only support a single scenario, not 'all'");
            std::process::exit(1);
        }

        if exporting {
            let scenario = scenarios[0];
            all_results.push(run_single(&args, scenario.name(), scenario.config(seed)));
        } else {
            let mut runner = ScenarioRunner::new(seed);
            if let Some(resolution) = args.resolution {
                runner = runner.with_resolution(resolution);
            }
            if let Some(method) = args.method {
                runner = runner.with_method(method);
            }
            for scenario in &scenarios {
                all_results.push(runner.run(*scenario));
            }
        }
    }

    let mut failed_count = 0;
    for result in &all_results {
        if !args.json {
            if result.passed {
                info!("✓ {} (seed={}) PASSED", result.name, result.seed);
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    result.name,
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
            if args.report {
                result.metrics.report(&result.name).print();
            }
        }
        if !result.passed {
            failed_count += 1;
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.name,
                    "seed": r.seed,
                    "passed": r.passed,
                    "stations": r.station_count,
                    "interp_target_rmse": r.metrics.interp_target.as_ref().map(|m| m.rmse()),
                    "interp_raw_rmse": r.metrics.interp_raw.as_ref().map(|m| m.rmse()),
                    "coverage": r.metrics.interp_target.as_ref().map(|m| m.coverage()),
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Error: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} runs passed!", total);
        } else {
            error!("❌ {}/{} runs failed!", failed_count, total);
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
