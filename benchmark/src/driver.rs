// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Fork orchestration.
//!
//! Every fork runs in a fresh process so allocator and cache state from one
//! fork never warms up the next. The driver re-runs
//! its own executable with hidden worker arguments; the worker prints one
//! JSON [`ForkOutcome`] line on stdout and logs to stderr.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use gqlbench_core::{MeasurementConfig, ProbeId, QueryEngine};
use thiserror::Error;

use crate::metrics::{BenchmarkReport, BenchmarkResult, ForkOutcome, ProbeStatus};
use crate::worker;

/// Hidden flag carrying the fork number to a worker process.
pub const WORKER_FORK_ARG: &str = "--worker-fork";
/// Hidden flag carrying the JSON-encoded configuration to a worker process.
pub const WORKER_CONFIG_ARG: &str = "--worker-config";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A fork that produced no usable outcome. Fails every probe of that fork.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Failed to spawn fork {fork}: {source}")]
    Spawn {
        fork: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for fork {fork}: {source}")]
    Wait {
        fork: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Fork {fork} timed out after {timeout:?}")]
    TimedOut { fork: u32, timeout: Duration },

    #[error("Fork {fork} exited abnormally: {status}")]
    Crashed { fork: u32, status: String },

    #[error("Fork {fork} returned unreadable output: {message}")]
    Protocol { fork: u32, message: String },

    #[error("Fork {fork} could not build fixtures: {message}")]
    Fixture { fork: u32, message: String },

    #[error("Cannot locate benchmark executable: {0}")]
    CurrentExe(#[source] std::io::Error),
}

/// Runs one fork to completion.
pub trait ForkLauncher {
    fn launch(&self, fork: u32, config: &MeasurementConfig) -> Result<ForkOutcome, DriverError>;
}

/// Launches each fork as a child process of the given program.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Launcher that re-executes the running binary.
    pub fn current_exe() -> Result<Self, DriverError> {
        std::env::current_exe()
            .map(Self::new)
            .map_err(DriverError::CurrentExe)
    }

    /// Kill forks that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ForkLauncher for ProcessLauncher {
    fn launch(&self, fork: u32, config: &MeasurementConfig) -> Result<ForkOutcome, DriverError> {
        let encoded = serde_json::to_string(config).map_err(|e| DriverError::Protocol {
            fork,
            message: e.to_string(),
        })?;

        let mut child = Command::new(&self.program)
            .arg(WORKER_FORK_ARG)
            .arg(fork.to_string())
            .arg(WORKER_CONFIG_ARG)
            .arg(encoded)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| DriverError::Spawn { fork, source })?;

        // Drain stdout on a thread so a chatty worker never blocks on a
        // full pipe while we wait for it.
        let mut stdout = child.stdout.take().ok_or_else(|| DriverError::Protocol {
            fork,
            message: "stdout not captured".to_string(),
        })?;
        let reader = thread::spawn(move || {
            let mut output = String::new();
            stdout.read_to_string(&mut output).map(|_| output)
        });

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(source) => {
                    let _ = child.kill();
                    return Err(DriverError::Wait { fork, source });
                }
            }
            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    // The child may have exited in between; either way it is gone.
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(DriverError::TimedOut { fork, timeout });
                }
            }
            thread::sleep(POLL_INTERVAL);
        };

        let output = reader
            .join()
            .map_err(|_| DriverError::Protocol {
                fork,
                message: "stdout reader panicked".to_string(),
            })?
            .map_err(|e| DriverError::Protocol {
                fork,
                message: e.to_string(),
            })?;

        if !status.success() {
            let detail = output.lines().last().unwrap_or_default().trim();
            return match serde_json::from_str::<WorkerFailure>(detail) {
                Ok(failure) => Err(DriverError::Fixture {
                    fork,
                    message: failure.error,
                }),
                Err(_) => Err(DriverError::Crashed {
                    fork,
                    status: status.to_string(),
                }),
            };
        }

        decode_outcome(fork, &output)
    }
}

/// Message a worker prints when it cannot build fixtures.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct WorkerFailure {
    pub error: String,
}

/// Parse the last non-empty stdout line of a worker.
fn decode_outcome(fork: u32, output: &str) -> Result<ForkOutcome, DriverError> {
    let line = output
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| DriverError::Protocol {
            fork,
            message: "no output".to_string(),
        })?;

    let outcome: ForkOutcome = serde_json::from_str(line).map_err(|e| DriverError::Protocol {
        fork,
        message: e.to_string(),
    })?;

    if outcome.fork != fork {
        return Err(DriverError::Protocol {
            fork,
            message: format!("worker reported fork {}", outcome.fork),
        });
    }
    Ok(outcome)
}

/// Runs forks inside the current process, one engine per fork.
pub struct InProcessLauncher<F> {
    factory: F,
}

impl<F, E> InProcessLauncher<F>
where
    F: Fn() -> E,
    E: QueryEngine,
{
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<F, E> ForkLauncher for InProcessLauncher<F>
where
    F: Fn() -> E,
    E: QueryEngine,
{
    fn launch(&self, fork: u32, config: &MeasurementConfig) -> Result<ForkOutcome, DriverError> {
        worker::run_fork((self.factory)(), config, fork).map_err(|e| DriverError::Fixture {
            fork,
            message: e.to_string(),
        })
    }
}

/// Runs every fork of a campaign and assembles the report.
pub struct Driver<L> {
    config: MeasurementConfig,
    launcher: L,
}

impl<L: ForkLauncher> Driver<L> {
    pub fn new(config: MeasurementConfig, launcher: L) -> Self {
        Self { config, launcher }
    }

    /// Run all forks sequentially. Fork failures become failed cells;
    /// this never aborts part-way.
    pub fn run(&self) -> BenchmarkReport {
        let forks = self.config.forks.value();
        let mut cells: BTreeMap<ProbeId, Vec<(u32, ProbeStatus)>> = BTreeMap::new();

        for fork in 1..=forks {
            tracing::info!(fork, forks, "Starting fork");
            let started = Instant::now();

            match self.launcher.launch(fork, &self.config) {
                Ok(outcome) => {
                    for run in outcome.probes {
                        cells.entry(run.probe).or_default().push((fork, run.status));
                    }
                    tracing::info!(
                        fork,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Fork finished"
                    );
                }
                Err(e) => {
                    tracing::error!(fork, error = %e, "Fork failed");
                    for &probe in &self.config.probes {
                        cells.entry(probe).or_default().push((
                            fork,
                            ProbeStatus::Failed {
                                reason: e.to_string(),
                            },
                        ));
                    }
                }
            }
        }

        let mut report = BenchmarkReport::new(self.config.clone());
        for &probe in &self.config.probes {
            let mut runs = cells.remove(&probe).unwrap_or_default();
            // A worker that silently skipped a probe still owes a cell.
            for fork in 1..=forks {
                if !runs.iter().any(|(f, _)| *f == fork) {
                    runs.push((
                        fork,
                        ProbeStatus::Failed {
                            reason: "no result reported".to_string(),
                        },
                    ));
                }
            }
            runs.sort_by_key(|(fork, _)| *fork);
            report.add_result(BenchmarkResult::aggregate(
                probe,
                self.config.mode,
                self.config.time_unit,
                runs,
            ));
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use gqlbench_core::testing::{Fault, StubEngine};
    use gqlbench_core::{ForkCount, Mode, ProbeOrder, Stage, TimeUnit, Workload};

    use crate::metrics::{ForkStatus, ProbeRun};

    fn quick_config(forks: i64) -> MeasurementConfig {
        MeasurementConfig {
            forks: ForkCount::new(forks).unwrap(),
            warmup_iterations: 1,
            measurement_iterations: 3,
            iteration_time: Duration::from_millis(2),
            time_unit: TimeUnit::Nanoseconds,
            ..MeasurementConfig::default()
        }
    }

    /// Fails the given fork outright and delegates the rest.
    struct FlakyLauncher<L> {
        inner: L,
        broken: u32,
        launched: Cell<u32>,
    }

    impl<L: ForkLauncher> ForkLauncher for FlakyLauncher<L> {
        fn launch(
            &self,
            fork: u32,
            config: &MeasurementConfig,
        ) -> Result<ForkOutcome, DriverError> {
            self.launched.set(self.launched.get() + 1);
            if fork == self.broken {
                return Err(DriverError::Crashed {
                    fork,
                    status: "signal: 9 (SIGKILL)".to_string(),
                });
            }
            self.inner.launch(fork, config)
        }
    }

    #[test]
    fn test_driver_report_covers_every_probe_and_fork() {
        let driver = Driver::new(quick_config(2), InProcessLauncher::new(StubEngine::new));
        let report = driver.run();

        assert_eq!(report.results.len(), 8);
        assert!(!report.has_failures());
        for (result, id) in report.results.iter().zip(ProbeId::all()) {
            assert_eq!(result.name, id);
            assert_eq!(result.forks.len(), 2);
            let aggregate = result.aggregate.as_ref().unwrap();
            assert_eq!(aggregate.count, 6);
            assert!(aggregate.score >= 0.0);
        }
        assert_eq!(report.overhead.len(), 2);
    }

    #[test]
    fn test_failed_fork_does_not_abort_campaign() {
        let launcher = FlakyLauncher {
            inner: InProcessLauncher::new(StubEngine::new),
            broken: 2,
            launched: Cell::new(0),
        };
        let driver = Driver::new(quick_config(3), launcher);
        let report = driver.run();

        assert_eq!(driver.launcher.launched.get(), 3);
        assert!(report.has_failures());
        let failures = report.failures();
        assert_eq!(failures.len(), 8);
        assert!(failures.iter().all(|(_, fork, _)| *fork == 2));
        assert!(failures[0].2.contains("SIGKILL"));

        for result in &report.results {
            assert_eq!(result.forks.len(), 3);
            assert!(matches!(result.forks[0].status, ForkStatus::Completed { .. }));
            assert!(matches!(result.forks[1].status, ForkStatus::Failed { .. }));
            assert!(result.aggregate.is_some());
        }
    }

    #[test]
    fn test_probe_panic_isolated_across_forks() {
        let driver = Driver::new(
            quick_config(2),
            InProcessLauncher::new(|| StubEngine::new().with_fault(Fault::PanicAt(Stage::Execute))),
        );
        let report = driver.run();

        for result in &report.results {
            let executes = matches!(result.name.stage, Stage::Full | Stage::Execute);
            assert_eq!(result.failures().count(), if executes { 2 } else { 0 }, "{}", result.name);
            assert_eq!(result.aggregate.is_some(), !executes);
        }
    }

    #[test]
    fn test_full_pipeline_close_to_sum_of_parts() {
        let config = MeasurementConfig {
            forks: ForkCount::new(1).unwrap(),
            mode: Mode::SampleTime,
            warmup_iterations: 1,
            measurement_iterations: 3,
            iteration_time: Duration::from_millis(30),
            time_unit: TimeUnit::Microseconds,
            order: ProbeOrder::Shuffled { seed: 3 },
            probes: ProbeId::all()
                .filter(|p| p.workload == Workload::Simple)
                .collect(),
            ..MeasurementConfig::default()
        };
        let launcher = InProcessLauncher::new(|| {
            StubEngine::new()
                .with_cost(Stage::Parse, Duration::from_micros(200))
                .with_cost(Stage::Validate, Duration::from_micros(100))
                .with_cost(Stage::Execute, Duration::from_micros(300))
        });
        let report = Driver::new(config, launcher).run();

        let median = |stage| {
            let result = report.result(ProbeId::new(Workload::Simple, stage)).unwrap();
            result.aggregate.as_ref().unwrap().latency.as_ref().unwrap().median_ns as f64
        };
        let full = median(Stage::Full);
        let parse = median(Stage::Parse);
        let validate = median(Stage::Validate);
        let execute = median(Stage::Execute);

        assert!(parse >= 200_000.0 && validate >= 100_000.0 && execute >= 300_000.0);
        let parts = parse + validate + execute;
        assert!(full >= 0.9 * parts, "full {} vs parts {}", full, parts);
        assert!(full <= 1.5 * parts, "full {} vs parts {}", full, parts);
    }

    #[test]
    fn test_decode_outcome_takes_last_line() {
        let outcome = ForkOutcome {
            fork: 3,
            probes: vec![ProbeRun {
                probe: "sfull".parse().unwrap(),
                status: ProbeStatus::Failed {
                    reason: "x".to_string(),
                },
            }],
        };
        let output = format!("noise\n{}\n\n", serde_json::to_string(&outcome).unwrap());
        assert_eq!(decode_outcome(3, &output).unwrap(), outcome);
        assert!(matches!(
            decode_outcome(4, &output),
            Err(DriverError::Protocol { fork: 4, .. })
        ));
        assert!(decode_outcome(3, "").is_err());
    }

    #[test]
    fn test_missing_program_fails_fork() {
        let launcher = ProcessLauncher::new("/nonexistent/gqlbench-worker");
        let err = launcher.launch(1, &quick_config(1)).unwrap_err();
        assert!(matches!(err, DriverError::Spawn { fork: 1, .. }));
    }

    #[test]
    fn test_wait_error_is_not_a_spawn_error() {
        let err = DriverError::Wait {
            fork: 2,
            source: std::io::Error::new(std::io::ErrorKind::Interrupted, "interrupted"),
        };
        assert_eq!(err.to_string(), "Failed to wait for fork 2: interrupted");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[cfg(unix)]
    mod worker_scripts {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        use tempfile::TempDir;

        /// Write an executable shell script standing in for the worker binary.
        fn script(dir: &TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("worker.sh");
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn launch(program: &Path, timeout: Option<Duration>) -> Result<ForkOutcome, DriverError> {
            ProcessLauncher::new(program)
                .with_timeout(timeout)
                .launch(1, &quick_config(1))
        }

        #[test]
        fn test_slow_fork_is_killed_at_timeout() {
            let dir = TempDir::new().unwrap();
            let program = script(&dir, "exec sleep 30");

            let started = Instant::now();
            let err = launch(&program, Some(Duration::from_millis(200))).unwrap_err();

            assert!(matches!(err, DriverError::TimedOut { fork: 1, .. }), "{}", err);
            assert!(err.to_string().contains("timed out"));
            assert!(started.elapsed() < Duration::from_secs(10));
        }

        #[test]
        fn test_abnormal_exit_is_a_crash() {
            let dir = TempDir::new().unwrap();
            let program = script(&dir, "echo 'half a line'\nexit 3");

            let err = launch(&program, None).unwrap_err();
            assert!(matches!(err, DriverError::Crashed { fork: 1, .. }), "{}", err);
        }

        #[test]
        fn test_worker_failure_line_is_a_fixture_error() {
            let dir = TempDir::new().unwrap();
            let program = script(&dir, "echo '{\"error\":\"schema rejected\"}'\nexit 1");

            match launch(&program, None).unwrap_err() {
                DriverError::Fixture { fork, message } => {
                    assert_eq!(fork, 1);
                    assert_eq!(message, "schema rejected");
                }
                other => panic!("unexpected error: {}", other),
            }
        }

        #[test]
        fn test_outcome_line_is_decoded() {
            let dir = TempDir::new().unwrap();
            let program = script(
                &dir,
                r#"echo 'starting'
echo '{"fork":1,"probes":[{"probe":"sfull","status":"failed","reason":"x"}]}'"#,
            );

            let outcome = launch(&program, Some(Duration::from_secs(30))).unwrap();
            assert_eq!(outcome.fork, 1);
            assert_eq!(outcome.probes.len(), 1);
        }

        #[test]
        fn test_timed_out_fork_fails_all_its_cells() {
            let dir = TempDir::new().unwrap();
            let program = script(&dir, "exec sleep 30");
            let launcher =
                ProcessLauncher::new(program).with_timeout(Some(Duration::from_millis(100)));

            let report = Driver::new(quick_config(2), launcher).run();
            let failures = report.failures();
            assert_eq!(failures.len(), 16);
            assert!(failures.iter().all(|(_, _, reason)| reason.contains("timed out")));
            assert!(report.results.iter().all(|r| r.aggregate.is_none()));
        }
    }
}
