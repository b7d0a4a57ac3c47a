// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI tool to run the stage benchmarks and report results.
//!
//! Exit status: 0 when every cell was measured, 1 when any probe or fork
//! failed (or fixtures could not be built), 2 for invalid configuration.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use gqlbench_benchmark::driver::{Driver, ProcessLauncher, WorkerFailure};
use gqlbench_benchmark::{worker, JsonReporter, TextReporter};
use gqlbench_core::{
    BenchError, ConfigLoader, GraphqlEngine, MeasurementConfig, RawMeasurementConfig, Verbosity,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "run_benchmarks")]
#[command(version, about = "Measure GraphQL parse, validate and execute time per pipeline stage")]
struct Args {
    /// YAML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of forked measurement processes
    #[arg(short, long, allow_negative_numbers = true)]
    forks: Option<i64>,

    /// Benchmark mode: avgt or sample
    #[arg(short, long)]
    mode: Option<String>,

    /// Unit for reported scores: ns, us, ms or s
    #[arg(short = 'u', long)]
    time_unit: Option<String>,

    /// Progress output: silent, normal or extra
    #[arg(short, long)]
    verbosity: Option<String>,

    /// Warm-up iterations per probe per fork
    #[arg(short, long)]
    warmup_iterations: Option<u64>,

    /// Measured iterations per probe per fork
    #[arg(short, long)]
    iterations: Option<u64>,

    /// Length of each iteration in milliseconds
    #[arg(short = 'r', long)]
    iteration_time_ms: Option<u64>,

    /// Kill a fork that runs longer than this
    #[arg(long)]
    fork_timeout_secs: Option<u64>,

    /// Shuffle probe order per fork from this seed
    #[arg(long)]
    shuffle_seed: Option<u64>,

    /// Run only these probes (repeatable), e.g. --probe sfull --probe i0parse
    #[arg(short, long = "probe")]
    probes: Vec<String>,

    /// Directory to save the JSON report in
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run in quick mode (1 fork, 1 warm-up, 3 short iterations)
    #[arg(long)]
    quick: bool,

    #[arg(long, hide = true)]
    worker_fork: Option<u32>,

    #[arg(long, hide = true)]
    worker_config: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(fork) = args.worker_fork {
        return run_worker(fork, args.worker_config.as_deref());
    }

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ Invalid configuration:");
            eprintln!("  {}", e);
            return ExitCode::from(2);
        }
    };

    init_tracing(config.verbosity);

    match run_campaign(config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Config file (or defaults), then `--quick`, then explicit flags.
fn resolve_config(args: &Args) -> Result<MeasurementConfig, BenchError> {
    let mut raw = match &args.config {
        Some(path) => ConfigLoader::read_file(path)?,
        None => RawMeasurementConfig::default(),
    };

    if args.quick {
        raw.forks = 1;
        raw.warmup_iterations = 1;
        raw.measurement_iterations = 3;
        raw.iteration_time_ms = 100;
    }

    if let Some(forks) = args.forks {
        raw.forks = forks;
    }
    if let Some(mode) = &args.mode {
        raw.mode = mode.clone();
    }
    if let Some(unit) = &args.time_unit {
        raw.time_unit = unit.clone();
    }
    if let Some(verbosity) = &args.verbosity {
        raw.verbosity = verbosity.clone();
    }
    if let Some(warmup) = args.warmup_iterations {
        raw.warmup_iterations = warmup;
    }
    if let Some(iterations) = args.iterations {
        raw.measurement_iterations = iterations;
    }
    if let Some(ms) = args.iteration_time_ms {
        raw.iteration_time_ms = ms;
    }
    if args.fork_timeout_secs.is_some() {
        raw.fork_timeout_secs = args.fork_timeout_secs;
    }
    if args.shuffle_seed.is_some() {
        raw.shuffle_seed = args.shuffle_seed;
    }
    if !args.probes.is_empty() {
        raw.probes = args.probes.clone();
    }
    if args.output.is_some() {
        raw.output_dir = args.output.clone();
    }

    Ok(ConfigLoader::validate(raw)?)
}

/// Logs go to stderr; stdout carries the report (or, in a worker, the
/// outcome line). `RUST_LOG` overrides the verbosity setting.
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_campaign(config: MeasurementConfig) -> anyhow::Result<bool> {
    let quiet = config.verbosity == Verbosity::Silent;
    if !quiet {
        print_header(&config);
    }

    let engine = GraphqlEngine::new().context("Failed to start GraphQL engine")?;
    worker::preflight(engine).context("Fixture check failed")?;

    let launcher = ProcessLauncher::current_exe()?.with_timeout(config.fork_timeout);
    let started = Instant::now();
    let report = Driver::new(config.clone(), launcher).run();
    tracing::info!(
        elapsed_secs = started.elapsed().as_secs_f64(),
        "All forks finished"
    );

    println!();
    print!("{}", TextReporter::new().render(&report));

    if let Some(dir) = &config.output_dir {
        let reporter = JsonReporter::new(dir)
            .with_context(|| format!("Cannot create output directory {}", dir.display()))?;
        let path = reporter.save(&report)?;
        if !quiet {
            println!();
            println!("Benchmark report saved to: {}", path.display());
        }
    }

    Ok(!report.has_failures())
}

fn print_header(config: &MeasurementConfig) {
    println!("gqlbench GraphQL Pipeline Benchmark");
    println!("===================================");
    println!("Forks: {}", config.forks);
    println!("Mode: {} ({})", config.mode.label(), config.time_unit.abbreviation());
    println!(
        "Warm-up: {} iterations, {:?} each",
        config.warmup_iterations, config.iteration_time
    );
    println!(
        "Measurement: {} iterations, {:?} each",
        config.measurement_iterations, config.iteration_time
    );
    if let Some(timeout) = config.fork_timeout {
        println!("Fork timeout: {:?}", timeout);
    }
    let probes: Vec<String> = config.probes.iter().map(|p| p.name()).collect();
    println!("Probes: {}", probes.join(", "));
}

/// Entry point of a forked measurement process.
///
/// Prints exactly one JSON line on stdout: the fork outcome on success,
/// a [`WorkerFailure`] otherwise.
fn run_worker(fork: u32, encoded: Option<&str>) -> ExitCode {
    match measure_fork(fork, encoded) {
        Ok(line) => {
            println!("{}", line);
            ExitCode::SUCCESS
        }
        Err(e) => {
            let failure = WorkerFailure {
                error: format!("{:#}", e),
            };
            if let Ok(line) = serde_json::to_string(&failure) {
                println!("{}", line);
            }
            ExitCode::FAILURE
        }
    }
}

fn measure_fork(fork: u32, encoded: Option<&str>) -> anyhow::Result<String> {
    let encoded = encoded.context("--worker-config is required with --worker-fork")?;
    let config: MeasurementConfig =
        serde_json::from_str(encoded).context("Invalid worker configuration")?;
    init_tracing(config.verbosity);

    let engine = GraphqlEngine::new().context("Failed to start GraphQL engine")?;
    let outcome = worker::run_fork(engine, &config, fork)?;
    Ok(serde_json::to_string(&outcome)?)
}
