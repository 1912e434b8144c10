//! V2V Simulator CLI
//!
//! Run deterministic traffic scenarios against the V2V coordinator.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use v2v_core::CoordinatorConfig;
use v2v_env::{TokioContext, V2VContext};
use v2v_sim::{ScenarioId, ScenarioResult, ScenarioRunner, SimError, SimExport};

/// V2V Deterministic Simulation CLI
#[derive(Parser, Debug)]
#[command(name = "v2v-sim")]
#[command(about = "Run deterministic V2V cooperative awareness scenarios", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of vehicles for size-independent scenarios
    #[arg(short = 'n', long, default_value = "12")]
    vehicles: usize,

    /// Scenario to run (highway, intersection, head_on, platoon, dropout, dense_grid, rapid_fire, standard, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Maximum simulation duration in seconds
    #[arg(short, long, default_value = "10")]
    duration: f64,

    /// V2V broadcast rate in Hz (overrides the config file)
    #[arg(long)]
    rate: Option<f64>,

    /// Communication range in meters (overrides the config file)
    #[arg(long)]
    range: Option<f64>,

    /// Coordinator configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Export accepted ticks to a JSON file for visualization
    #[arg(long)]
    export: Option<PathBuf>,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Pace simulation ticks at wall-clock speed
    #[arg(long)]
    realtime: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn parse_scenarios(arg: &str) -> Result<Vec<ScenarioId>, String> {
    match arg {
        "all" => Ok(ScenarioId::all()),
        "standard" => Ok(ScenarioId::standard()),
        name => name.parse().map(|s| vec![s]),
    }
}

/// Config file (or defaults), then command-line overrides, then validation.
fn load_config(args: &Args) -> Result<CoordinatorConfig, SimError> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            CoordinatorConfig::from_json_str(&json)?
        }
        None => CoordinatorConfig::default(),
    };
    if let Some(rate) = args.rate {
        config.update_rate_hz = rate;
    }
    if let Some(range) = args.range {
        config.max_range_m = range;
    }
    config.validate()?;
    Ok(config)
}

/// Runs one scenario tick by tick, optionally exporting and pacing.
async fn run_stepped(
    runner: &ScenarioRunner,
    scenario: ScenarioId,
    seed: u64,
    export_path: Option<&Path>,
    pacer: Option<&TokioContext>,
) -> ScenarioResult {
    let mut execution = match runner.prepare(scenario) {
        Ok(execution) => execution,
        // Let the runner produce the failure result
        Err(_) => return runner.run(scenario),
    };

    let mut export = export_path.map(|_| SimExport::new(scenario.name(), seed));
    let interval = execution.tick_interval();
    while execution.step(export.as_mut()) {
        if let Some(ctx) = pacer {
            ctx.sleep(interval).await;
        }
    }
    let result = execution.finish();

    if let (Some(mut export), Some(path)) = (export, export_path) {
        export.finalize(result.passed, result.failure_reason.clone());
        match export.write_to_file(path) {
            Ok(()) => info!("Exported {} frames to {}", export.frames.len(), path.display()),
            Err(e) => error!("Failed to write export: {}", e),
        }
    }
    result
}

fn print_json_summary(results: &[ScenarioResult], failed: usize) {
    let summary = serde_json::json!({
        "total": results.len(),
        "passed": results.len() - failed,
        "failed": failed,
        "results": results.iter().map(|r| {
            serde_json::json!({
                "scenario": r.scenario.name(),
                "seed": r.seed,
                "passed": r.passed,
                "ticks": r.total_ticks,
                "time_secs": r.final_time_secs,
                "vehicles": r.final_vehicle_count,
                "failure_reason": r.failure_reason,
                "metrics": r.metrics,
            })
        }).collect::<Vec<_>>(),
    });
    match serde_json::to_string_pretty(&summary) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to serialize summary: {}", e),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    if !args.json {
        info!("V2V Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let scenarios = match parse_scenarios(&args.scenario) {
        Ok(scenarios) => scenarios,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: {}, standard, all",
                ScenarioId::all().iter().map(|s| s.name()).collect::<Vec<_>>().join(", "));
            return ExitCode::from(2);
        }
    };

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: invalid configuration: {}", e);
            return ExitCode::from(2);
        }
    };

    if args.export.is_some() && (scenarios.len() > 1 || args.seeds > 1) {
        eprintln!("Error: --export only supports a single scenario and seed");
        return ExitCode::from(2);
    }

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let pacer = args.realtime.then(TokioContext::new);
    if pacer.is_some() && !args.json {
        warn!("Realtime pacing enabled; runs take their full simulated duration");
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed, args.vehicles)
            .with_duration(args.duration)
            .with_config(config.clone());

        for scenario in &scenarios {
            let result = if args.export.is_some() || pacer.is_some() {
                run_stepped(&runner, *scenario, seed, args.export.as_deref(), pacer.as_ref()).await
            } else {
                runner.run(*scenario)
            };

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    let total = all_results.len();
    if args.json {
        print_json_summary(&all_results, failed_count);
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
