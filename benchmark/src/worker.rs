// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Measurement inside one fork.
//!
//! A fork builds its own fixtures, then runs every selected probe through
//! the harness. A probe that errors or panics is recorded as failed and the
//! fork moves on to the next one.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use gqlbench_core::{BenchResult, Fixtures, MeasurementConfig, ProbeRegistry, QueryEngine};

use crate::harness::BenchmarkHarness;
use crate::metrics::{ForkOutcome, ProbeRun, ProbeStatus};

/// Build fixtures and check them without measuring anything.
///
/// Run once by the driver before any fork starts, so a broken engine is
/// reported as a fatal error instead of as eight failed cells per fork.
pub fn preflight<E: QueryEngine>(engine: E) -> BenchResult<()> {
    let fixtures = Fixtures::build(engine)?;
    fixtures.check_preconditions()
}

/// Run all configured probes for one fork.
///
/// Fixture errors are returned; probe errors never are.
pub fn run_fork<E: QueryEngine>(
    engine: E,
    config: &MeasurementConfig,
    fork: u32,
) -> BenchResult<ForkOutcome> {
    let fixtures = Fixtures::build(engine)?;
    let registry = ProbeRegistry::select(&fixtures, &config.probes);
    let harness = BenchmarkHarness::from_config(config);

    let mut probes = Vec::with_capacity(registry.len());
    for probe in registry.ordered(config.order, fork) {
        tracing::info!(fork, probe = %probe.id(), "Running probe");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| harness.run(|| probe.invoke())));
        let status = match outcome {
            Ok(Ok(measurement)) => ProbeStatus::Completed { measurement },
            Ok(Err(e)) => ProbeStatus::Failed {
                reason: e.to_string(),
            },
            Err(payload) => ProbeStatus::Failed {
                reason: format!("panicked: {}", panic_message(payload.as_ref())),
            },
        };

        match &status {
            ProbeStatus::Completed { measurement } => tracing::debug!(
                fork,
                probe = %probe.id(),
                ops = measurement.operations(),
                ns_per_op = measurement.mean_ns(),
                "Probe completed"
            ),
            ProbeStatus::Failed { reason } => {
                tracing::warn!(fork, probe = %probe.id(), %reason, "Probe failed")
            }
        }

        probes.push(ProbeRun {
            probe: probe.id(),
            status,
        });
    }

    Ok(ForkOutcome { fork, probes })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use gqlbench_core::testing::{Fault, StubEngine};
    use gqlbench_core::{BenchError, ProbeId, ProbeOrder, Stage, Workload};

    fn quick_config() -> MeasurementConfig {
        MeasurementConfig {
            warmup_iterations: 1,
            measurement_iterations: 2,
            iteration_time: Duration::from_millis(2),
            ..MeasurementConfig::default()
        }
    }

    #[test]
    fn test_run_fork_measures_every_probe() {
        let outcome = run_fork(StubEngine::new(), &quick_config(), 1).unwrap();

        assert_eq!(outcome.fork, 1);
        let ran: Vec<ProbeId> = outcome.probes.iter().map(|r| r.probe).collect();
        assert_eq!(ran, ProbeId::all().collect::<Vec<_>>());
        for run in &outcome.probes {
            match &run.status {
                ProbeStatus::Completed { measurement } => {
                    assert_eq!(measurement.iterations.len(), 2);
                    assert!(measurement.operations() >= 2);
                }
                ProbeStatus::Failed { reason } => panic!("{} failed: {}", run.probe, reason),
            }
        }
    }

    #[test]
    fn test_panicking_stage_fails_only_its_cells() {
        let engine = StubEngine::new().with_fault(Fault::PanicAt(Stage::Validate));
        let config = MeasurementConfig {
            order: ProbeOrder::Shuffled { seed: 11 },
            ..quick_config()
        };
        let outcome = run_fork(engine, &config, 2).unwrap();
        assert_eq!(outcome.probes.len(), 8);

        for run in &outcome.probes {
            let should_fail = matches!(run.probe.stage, Stage::Full | Stage::Validate);
            match &run.status {
                ProbeStatus::Failed { reason } => {
                    assert!(should_fail, "{} should not fail", run.probe);
                    assert!(reason.contains("fault injected"), "{}", reason);
                }
                ProbeStatus::Completed { .. } => {
                    assert!(!should_fail, "{} should fail", run.probe)
                }
            }
        }
    }

    #[test]
    fn test_probe_error_is_recorded() {
        // Fixtures use the first two parses; every parse after that fails.
        let engine = StubEngine::new().with_fault(Fault::ParseErrorAfter(2));
        let config = MeasurementConfig {
            probes: vec![
                ProbeId::new(Workload::Simple, Stage::Parse),
                ProbeId::new(Workload::Simple, Stage::Execute),
            ],
            ..quick_config()
        };

        let outcome = run_fork(engine, &config, 1).unwrap();
        assert!(matches!(
            &outcome.probes[0].status,
            ProbeStatus::Failed { reason } if reason.contains("injected failure")
        ));
        assert!(matches!(
            outcome.probes[1].status,
            ProbeStatus::Completed { .. }
        ));
    }

    #[test]
    fn test_fixture_failure_is_fatal() {
        let engine = StubEngine::new().with_fault(Fault::RejectSchema);
        let err = run_fork(engine, &quick_config(), 1).unwrap_err();
        assert!(matches!(err, BenchError::Fixture { .. }));
    }

    #[test]
    fn test_preflight() {
        preflight(StubEngine::new()).unwrap();
        let err = preflight(StubEngine::new().with_fault(Fault::WrongValue("moon"))).unwrap_err();
        assert!(matches!(err, BenchError::Precondition { .. }));
    }
}
