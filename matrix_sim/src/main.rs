//! Demo Matrix CLI
//!
//! Simulate a population, print a summary, optionally export the dataset.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use clap::Parser;
use matrix_core::MatrixConfig;
use matrix_sim::{RunError, ScenarioId, ScenarioResult, ScenarioRunner};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Demo Matrix simulation CLI
#[derive(Parser, Debug)]
#[command(name = "matrix-sim")]
#[command(about = "Generate synthetic analytics events with the Demo Matrix", long_about = None)]
struct Args {
    /// Master seed for determinism
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of random seeds to run, starting at --seed
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Scenario to run (weekly, hedgebox, all)
    #[arg(short = 'S', long, default_value = "hedgebox")]
    scenario: String,

    /// Number of clusters
    #[arg(short, long, default_value = "10")]
    clusters: usize,

    /// Smallest cluster population
    #[arg(long, default_value = "1")]
    population_min: usize,

    /// Largest cluster population
    #[arg(long, default_value = "8")]
    population_max: usize,

    /// Chebyshev radius within which persons are neighbors
    #[arg(long, default_value = "1")]
    neighbor_radius: u32,

    /// The "now" instant (YYYY-MM-DD or RFC 3339); defaults to 2023-06-01
    #[arg(long)]
    now: Option<String>,

    /// Days of history before now
    #[arg(long, default_value = "120")]
    days_past: i64,

    /// Days of future after now
    #[arg(long, default_value = "30")]
    days_future: i64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the generated dataset to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn parse_now(value: &str) -> Result<DateTime<Utc>, RunError> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(t.with_timezone(&Utc));
    }
    let midnight = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| RunError::InvalidDate(value.to_string()))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

fn parse_scenarios(value: &str) -> Result<Vec<ScenarioId>, RunError> {
    if value == "all" {
        return Ok(ScenarioId::all());
    }
    let scenario = value.parse().map_err(|_| RunError::UnknownScenario(value.to_string()))?;
    Ok(vec![scenario])
}

/// Start and end around `now`; out-of-range day counts are rejected.
fn window_around(
    now: DateTime<Utc>,
    days_past: i64,
    days_future: i64,
) -> Result<(DateTime<Utc>, DateTime<Utc>), RunError> {
    let start = Duration::try_days(days_past)
        .and_then(|past| now.checked_sub_signed(past))
        .ok_or_else(|| RunError::InvalidArguments(format!("--days-past {} is out of range", days_past)))?;
    let end = Duration::try_days(days_future)
        .and_then(|future| now.checked_add_signed(future))
        .ok_or_else(|| RunError::InvalidArguments(format!("--days-future {} is out of range", days_future)))?;
    Ok((start, end))
}

fn runner_for(args: &Args, seed: u64) -> Result<ScenarioRunner, RunError> {
    let now = match &args.now {
        Some(value) => parse_now(value)?,
        None => MatrixConfig::default().now,
    };
    let (start, end) = window_around(now, args.days_past, args.days_future)?;
    Ok(ScenarioRunner::new(seed)
        .with_clusters(args.clusters)
        .with_population(args.population_min, args.population_max)
        .with_neighbor_radius(args.neighbor_radius)
        .with_window(start, now, end))
}

fn log_result(result: &ScenarioResult) {
    info!(
        "✓ {} (seed={}) | clusters={} persons={} | past={} future={}",
        result.scenario.name(),
        result.seed,
        result.summary.clusters,
        result.summary.persons,
        result.summary.past_events,
        result.summary.future_events
    );
    info!(
        "  pageviews={} signups={} identified={} accounts={} | effects delivered={} dropped={}",
        result.metrics.pageviews,
        result.metrics.signups,
        result.metrics.identified_persons,
        result.metrics.accounts,
        result.summary.effects_delivered,
        result.summary.effects_dropped
    );
}

fn run(args: &Args) -> Result<(), RunError> {
    let scenarios = parse_scenarios(&args.scenario)?;

    if !args.json {
        info!("Demo Matrix v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 || args.seeds > 1 {
            return Err(RunError::InvalidArguments(
                "--export supports a single scenario and seed".to_string(),
            ));
        }
        let (result, export) = runner_for(args, args.seed)?.run_export(scenarios[0])?;
        export.write_to_file(export_path)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&export.summary)?);
        } else {
            log_result(&result);
            info!("Exported {} events to {}", export.event_count(), export_path);
        }
        return Ok(());
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    for seed_offset in 0..args.seeds {
        let seed = args.seed.wrapping_add(seed_offset as u64);
        let runner = runner_for(args, seed)?;
        for scenario in &scenarios {
            let result = runner.run(*scenario)?;
            if !args.json {
                log_result(&result);
            }
            all_results.push(result);
        }
    }

    if args.json {
        let summary = serde_json::json!({
            "total": all_results.len(),
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "summary": r.summary,
                    "pageviews": r.metrics.pageviews,
                    "signups": r.metrics.signups,
                    "identified_persons": r.metrics.identified_persons,
                    "active_persons": r.metrics.active_persons,
                    "accounts": r.metrics.accounts,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("✅ All {} scenario runs finished", all_results.len());
    }
    Ok(())
}

/// 2 for a rejected configuration, 1 for a failed run.
fn exit_code(err: &RunError) -> i32 {
    if err.is_configuration() {
        2
    } else {
        1
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if let Err(e) = run(&args) {
        error!("❌ {}", e);
        std::process::exit(exit_code(&e));
    }
}
