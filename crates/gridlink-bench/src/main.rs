//! gridlink-bench: CLI tool for chain builder experimentation and diagnostics.
//!
//! Builds chains over a grid with configurable parameters, printing the
//! chains, coverage statistics, and build diagnostics. Useful for:
//!
//! - Finding grid/capacity combinations that end stuck
//! - Comparing builds with and without the non-crossing constraint
//! - Measuring build time as grids grow
//! - Checking that step-wise and one-shot builds agree
//!
//! Set `RUST_LOG=gridlink_core=debug` (or `trace`) to follow the builder.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin gridlink-bench -- [OPTIONS]
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::process::ExitCode;

use clap::Parser;
use gridlink_core::{
    AuditReport, BuildDiagnostics, ChainBuilder, CoverageStats, GridConfig, audit, fingerprint,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Chain builder experimentation and diagnostics for gridlink.
///
/// Covers a grid with capacity-bounded chains and prints the result
/// together with coverage and per-build diagnostics.
#[derive(Parser)]
#[command(name = "gridlink-bench", version)]
struct Cli {
    /// Number of grid rows.
    #[arg(long, default_value_t = GridConfig::DEFAULT_ROWS, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    rows: u32,

    /// Number of grid columns.
    #[arg(long, default_value_t = GridConfig::DEFAULT_COLS, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    cols: u32,

    /// Maximum connections per chain.
    #[arg(long, default_value_t = GridConfig::DEFAULT_MAX_CONNECTION_COUNT, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    max_connections: u32,

    /// Allow chains to cross each other.
    #[arg(long)]
    allow_crossing: bool,

    /// Minimum Euclidean connection length.
    #[arg(long)]
    min_distance: Option<f64>,

    /// Maximum Euclidean connection length.
    #[arg(long)]
    max_distance: Option<f64>,

    /// Drive the build one step at a time instead of calling `build_all`.
    #[arg(long)]
    stepwise: bool,

    /// Print every chain's points.
    #[arg(long)]
    show_chains: bool,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output results as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Full grid config as a JSON string.
    ///
    /// When provided, all other grid parameter flags are ignored.
    /// The JSON must be a valid `GridConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Everything reported for one run.
#[derive(Serialize)]
struct RunReport {
    run: usize,
    complete: bool,
    consistent: bool,
    fingerprint: u64,
    coverage: CoverageStats,
    audit: AuditReport,
    diagnostics: BuildDiagnostics,
}

/// Build a [`GridConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<GridConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(GridConfig {
        rows: cli.rows,
        cols: cli.cols,
        max_connection_count: cli.max_connections,
        non_crossing: !cli.allow_crossing,
        min_distance: cli.min_distance,
        max_distance: cli.max_distance,
    })
}

/// Crossings only count against a build when the non-crossing rule is on.
fn is_consistent(audit: &AuditReport, non_crossing: bool) -> bool {
    if non_crossing {
        audit.is_consistent()
    } else {
        audit.degree_violations.is_empty()
            && audit.invalid_chains.is_empty()
            && audit.partition_mismatches.is_empty()
    }
}

/// Run one build, either in one call or by stepping.
fn run_build(builder: &mut ChainBuilder, stepwise: bool) {
    if stepwise {
        builder.start_animated_build();
        while builder.build_step() {}
    } else {
        builder.build_all();
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let mut builder = match gridlink_core::initialize(&config) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("Config: {config:#?}");
    eprintln!(
        "Constraints: {}",
        builder
            .grid()
            .constraints()
            .names()
            .filter(|name| builder.grid().constraints().is_enabled(name))
            .collect::<Vec<_>>()
            .join(", ")
    );
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut reports = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        run_build(&mut builder, cli.stepwise);
        let audit_report = audit(builder.grid(), builder.chains());
        let report = RunReport {
            run,
            complete: builder.residual().is_none(),
            consistent: is_consistent(&audit_report, config.non_crossing),
            fingerprint: fingerprint(builder.grid(), builder.chains()),
            coverage: builder.coverage_stats(),
            audit: audit_report,
            diagnostics: builder.diagnostics().clone(),
        };

        if cli.json {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing report: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            print_report(&builder, &report, cli.show_chains);
        }

        reports.push(report);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&reports);
    }

    if reports.iter().all(|r| r.consistent) {
        ExitCode::SUCCESS
    } else {
        eprintln!("Audit found invariant violations");
        ExitCode::FAILURE
    }
}

/// Print one run as a human-readable report.
fn print_report(builder: &ChainBuilder, report: &RunReport, show_chains: bool) {
    let coverage = &report.coverage;
    println!("{}", report.diagnostics.report());
    println!();
    println!(
        "Coverage: {}/{} points ({:.1}%) in {} chains, {:.2} connections per chain",
        coverage.connected_points,
        coverage.total_points,
        coverage.coverage_percentage,
        coverage.total_chains,
        coverage.average_chain_length,
    );
    if let Some(residual) = builder.residual() {
        let points: Vec<String> = residual.iter().map(ToString::to_string).collect();
        println!("Stuck, uncovered: {}", points.join(" "));
    }
    println!("Fingerprint: {:016x}", report.fingerprint);
    if !report.consistent {
        println!("Audit: {:?}", report.audit);
    }

    if show_chains {
        println!();
        for chain in builder.chains() {
            let points: Vec<String> = chain.points().map(|p| p.to_string()).collect();
            println!("{:>5} {}", chain.id().to_string(), points.join(" - "));
        }
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(reports: &[RunReport]) {
    println!();
    println!("Summary ({} runs)\n{}", reports.len(), "=".repeat(40));

    let durations: Vec<f64> = reports
        .iter()
        .map(|r| gridlink_core::diagnostics::duration_ms(r.diagnostics.duration))
        .collect();
    if durations.is_empty() {
        println!("Warning: no runs to summarize");
        return;
    }

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;
    println!("Build duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    let deterministic = reports
        .windows(2)
        .all(|pair| pair[0].fingerprint == pair[1].fingerprint);
    println!(
        "Deterministic: {}",
        if deterministic { "yes" } else { "NO" }
    );
}
