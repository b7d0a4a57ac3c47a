// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Standardized metrics types for benchmark results.
//!
//! Raw timings travel from worker to driver as [`ForkOutcome`]s; the driver
//! folds them into one [`BenchmarkResult`] per probe and a
//! [`BenchmarkReport`] for the whole campaign.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use gqlbench_core::{MeasurementConfig, Mode, ProbeId, ProbeOrder, Stage, TimeUnit, Workload};
use serde::{Deserialize, Serialize};
use sysinfo::System;
use uuid::Uuid;

/// Full-pipeline time may undercut the sum of the stage cuts by this share
/// before the estimate is flagged.
const OVERHEAD_TOLERANCE: f64 = 0.05;

/// Timing of one measured iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    /// Invocations completed during the iteration
    pub operations: u64,
    /// Time spent in those invocations, in nanoseconds
    pub elapsed_ns: u64,
}

impl IterationResult {
    /// Mean nanoseconds per invocation.
    pub fn ns_per_op(&self) -> f64 {
        if self.operations == 0 {
            return 0.0;
        }
        self.elapsed_ns as f64 / self.operations as f64
    }
}

/// Everything one probe produced in one fork.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub mode: Mode,
    /// Measured iterations only; warm-up is never recorded
    pub iterations: Vec<IterationResult>,
    /// Individually timed invocations (sample mode only), in nanoseconds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<u64>,
}

impl Measurement {
    pub fn operations(&self) -> u64 {
        self.iterations.iter().map(|i| i.operations).sum()
    }

    /// Per-iteration scores in nanoseconds per operation.
    pub fn iteration_scores(&self) -> Vec<f64> {
        self.iterations.iter().map(IterationResult::ns_per_op).collect()
    }

    /// Mean nanoseconds per operation for this fork.
    pub fn mean_ns(&self) -> f64 {
        match self.mode {
            Mode::AverageTime => {
                let elapsed: u64 = self.iterations.iter().map(|i| i.elapsed_ns).sum();
                let ops = self.operations();
                if ops == 0 {
                    0.0
                } else {
                    elapsed as f64 / ops as f64
                }
            }
            Mode::SampleTime => {
                if self.samples.is_empty() {
                    0.0
                } else {
                    self.samples.iter().sum::<u64>() as f64 / self.samples.len() as f64
                }
            }
        }
    }
}

/// Outcome of one probe in one fork.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeStatus {
    Completed { measurement: Measurement },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeRun {
    pub probe: ProbeId,
    #[serde(flatten)]
    pub status: ProbeStatus,
}

/// What a worker process reports back: its probes in the order they ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkOutcome {
    pub fork: u32,
    pub probes: Vec<ProbeRun>,
}

/// Latency distribution with statistical analysis.
///
/// Percentiles use the nearest-rank method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyMetrics {
    /// Number of samples
    pub count: usize,
    /// Minimum observed latency in nanoseconds
    pub min_ns: u64,
    /// Maximum observed latency in nanoseconds
    pub max_ns: u64,
    /// Arithmetic mean latency in nanoseconds
    pub mean_ns: f64,
    /// Median (p50) latency in nanoseconds
    pub median_ns: u64,
    /// 90th percentile latency in nanoseconds
    pub p90_ns: u64,
    /// 95th percentile latency in nanoseconds
    pub p95_ns: u64,
    /// 99th percentile latency in nanoseconds
    pub p99_ns: u64,
    /// 99.9th percentile latency in nanoseconds
    pub p999_ns: u64,
    /// 99.99th percentile latency in nanoseconds
    pub p9999_ns: u64,
    /// Standard deviation in nanoseconds
    pub std_dev_ns: f64,
}

impl LatencyMetrics {
    /// Calculate metrics from a vector of latency samples (in nanoseconds).
    pub fn from_samples(mut samples: Vec<u64>) -> Self {
        if samples.is_empty() {
            return Self {
                count: 0,
                min_ns: 0,
                max_ns: 0,
                mean_ns: 0.0,
                median_ns: 0,
                p90_ns: 0,
                p95_ns: 0,
                p99_ns: 0,
                p999_ns: 0,
                p9999_ns: 0,
                std_dev_ns: 0.0,
            };
        }

        samples.sort_unstable();
        let len = samples.len();
        let sum: u64 = samples.iter().sum();
        let mean_ns = sum as f64 / len as f64;

        let variance: f64 = samples
            .iter()
            .map(|&x| {
                let diff = x as f64 - mean_ns;
                diff * diff
            })
            .sum::<f64>()
            / len as f64;

        Self {
            count: len,
            min_ns: samples[0],
            max_ns: samples[len - 1],
            mean_ns,
            median_ns: percentile(&samples, 0.50),
            p90_ns: percentile(&samples, 0.90),
            p95_ns: percentile(&samples, 0.95),
            p99_ns: percentile(&samples, 0.99),
            p999_ns: percentile(&samples, 0.999),
            p9999_ns: percentile(&samples, 0.9999),
            std_dev_ns: variance.sqrt(),
        }
    }

    /// Percentile rows as (label, nanoseconds), smallest first.
    pub fn table(&self) -> [(&'static str, u64); 8] {
        [
            ("p0.00", self.min_ns),
            ("p0.50", self.median_ns),
            ("p0.90", self.p90_ns),
            ("p0.95", self.p95_ns),
            ("p0.99", self.p99_ns),
            ("p0.999", self.p999_ns),
            ("p0.9999", self.p9999_ns),
            ("p1.00", self.max_ns),
        ]
    }
}

/// Nearest-rank percentile of sorted, non-empty samples.
fn percentile(sorted: &[u64], p: f64) -> u64 {
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Two-sided 99.9% Student t critical values for 1..=30 degrees of freedom.
const T_999: [f64; 30] = [
    636.619, 31.599, 12.924, 8.610, 6.869, 5.959, 5.408, 5.041, 4.781, 4.587, 4.437, 4.318,
    4.221, 4.140, 4.073, 4.015, 3.965, 3.922, 3.883, 3.850, 3.819, 3.792, 3.768, 3.745, 3.725,
    3.707, 3.690, 3.674, 3.659, 3.646,
];

/// Critical value for `df` degrees of freedom. Between tabulated points the
/// smaller df is used, which widens the interval slightly.
fn t_critical(df: usize) -> f64 {
    match df {
        0 => f64::NAN,
        1..=30 => T_999[df - 1],
        31..=39 => 3.646,
        40..=59 => 3.551,
        60..=119 => 3.460,
        _ => 3.373,
    }
}

/// Mean and 99.9% confidence half-width. The error is `None` with fewer
/// than two values.
pub fn mean_with_error(values: &[f64]) -> (f64, Option<f64>) {
    if values.is_empty() {
        return (0.0, None);
    }
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, None);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let error = t_critical(n - 1) * (variance / n as f64).sqrt();
    (mean, Some(error))
}

/// Per-fork line of a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ForkStatus {
    Completed {
        /// Mean time per operation, in the report's unit
        score: f64,
        operations: u64,
        iterations: usize,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkResult {
    pub fork: u32,
    #[serde(flatten)]
    pub status: ForkStatus,
}

/// Summary across all completed forks of one probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Mean time per operation, in the report's unit
    pub score: f64,
    /// 99.9% confidence half-width, in the report's unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<f64>,
    /// Number of values the score is computed from (iterations or samples)
    pub count: usize,
    /// Pooled latency distribution (sample mode only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyMetrics>,
}

/// All forks' results for one probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Name of the probe
    pub name: ProbeId,
    pub mode: Mode,
    pub unit: TimeUnit,
    pub forks: Vec<ForkResult>,
    /// `None` when every fork failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregate>,
}

impl BenchmarkResult {
    /// Fold per-fork outcomes of one probe into a result.
    pub fn aggregate(
        name: ProbeId,
        mode: Mode,
        unit: TimeUnit,
        runs: Vec<(u32, ProbeStatus)>,
    ) -> Self {
        let mut forks = Vec::with_capacity(runs.len());
        let mut scores = Vec::new();
        let mut samples = Vec::new();

        for (fork, status) in runs {
            let status = match status {
                ProbeStatus::Completed { measurement } => {
                    scores.extend(measurement.iteration_scores());
                    samples.extend_from_slice(&measurement.samples);
                    ForkStatus::Completed {
                        score: unit.convert_nanos(measurement.mean_ns()),
                        operations: measurement.operations(),
                        iterations: measurement.iterations.len(),
                    }
                }
                ProbeStatus::Failed { reason } => ForkStatus::Failed { reason },
            };
            forks.push(ForkResult { fork, status });
        }

        let completed = forks
            .iter()
            .any(|f| matches!(f.status, ForkStatus::Completed { .. }));

        let aggregate = completed.then(|| match mode {
            Mode::AverageTime => {
                let (mean, error) = mean_with_error(&scores);
                Aggregate {
                    score: unit.convert_nanos(mean),
                    error: error.map(|e| unit.convert_nanos(e)),
                    count: scores.len(),
                    latency: None,
                }
            }
            Mode::SampleTime => {
                let values: Vec<f64> = samples.iter().map(|&s| s as f64).collect();
                let (mean, error) = mean_with_error(&values);
                Aggregate {
                    score: unit.convert_nanos(mean),
                    error: error.map(|e| unit.convert_nanos(e)),
                    count: samples.len(),
                    latency: Some(LatencyMetrics::from_samples(samples)),
                }
            }
        });

        Self {
            name,
            mode,
            unit,
            forks,
            aggregate,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = (u32, &str)> {
        self.forks.iter().filter_map(|f| match &f.status {
            ForkStatus::Failed { reason } => Some((f.fork, reason.as_str())),
            ForkStatus::Completed { .. } => None,
        })
    }
}

/// Orchestration overhead of one workload: full-pipeline score minus the sum
/// of the parse, validate and execute scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverheadEstimate {
    pub workload: Workload,
    pub full: f64,
    pub parts_sum: f64,
    /// `full - parts_sum`, in the report's unit
    pub epsilon: f64,
    /// Set when full undercuts the parts by more than the tolerance
    pub flagged: bool,
}

impl OverheadEstimate {
    /// Estimate per workload; workloads missing any of the four cuts are skipped.
    pub fn from_results(results: &[BenchmarkResult]) -> Vec<Self> {
        let scores: BTreeMap<ProbeId, f64> = results
            .iter()
            .filter_map(|r| r.aggregate.as_ref().map(|a| (r.name, a.score)))
            .collect();

        Workload::ALL
            .into_iter()
            .filter_map(|workload| {
                let score = |stage| scores.get(&ProbeId::new(workload, stage)).copied();
                let full = score(Stage::Full)?;
                let parts_sum =
                    score(Stage::Parse)? + score(Stage::Validate)? + score(Stage::Execute)?;
                let epsilon = full - parts_sum;
                Some(Self {
                    workload,
                    full,
                    parts_sum,
                    epsilon,
                    flagged: epsilon < -OVERHEAD_TOLERANCE * parts_sum,
                })
            })
            .collect()
    }
}

/// System information captured at benchmark time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system name
    pub os: String,
    /// OS version
    pub os_version: String,
    /// Kernel version (Linux)
    pub kernel_version: Option<String>,
    /// CPU model name
    pub cpu_model: String,
    /// Number of CPU cores
    pub cpu_cores: usize,
    /// Total system memory in bytes
    pub memory_bytes: u64,
    /// Hostname
    pub hostname: String,
}

impl SystemInfo {
    /// Collect current system information.
    pub fn collect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        Self {
            os: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version(),
            cpu_model: sys
                .cpus()
                .first()
                .map(|cpu| cpu.brand().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            cpu_cores: sys.cpus().len(),
            memory_bytes: sys.total_memory(),
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

/// Complete benchmark campaign report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// Suite identifier
    pub benchmark_suite: String,
    /// Framework version
    pub version: String,
    /// Unique id of this run
    pub run_id: Uuid,
    /// Timestamp when benchmarks were run
    pub timestamp: DateTime<Utc>,
    /// System information
    pub system_info: SystemInfo,
    /// Configuration the campaign ran under
    pub config: MeasurementConfig,
    /// Declared or shuffled probe order
    pub probe_order: ProbeOrder,
    /// Per-probe results, in declared order
    pub results: Vec<BenchmarkResult>,
    /// Full-pipeline overhead per workload
    pub overhead: Vec<OverheadEstimate>,
}

impl BenchmarkReport {
    /// Create a new, empty report for a campaign.
    pub fn new(config: MeasurementConfig) -> Self {
        Self {
            benchmark_suite: "gqlbench".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            system_info: SystemInfo::collect(),
            probe_order: config.order,
            config,
            results: Vec::new(),
            overhead: Vec::new(),
        }
    }

    /// Add a result to the report, refreshing the overhead estimates.
    pub fn add_result(&mut self, result: BenchmarkResult) {
        self.results.push(result);
        self.overhead = OverheadEstimate::from_results(&self.results);
    }

    pub fn result(&self, probe: ProbeId) -> Option<&BenchmarkResult> {
        self.results.iter().find(|r| r.name == probe)
    }

    /// Every failed (probe, fork) cell with its reason.
    pub fn failures(&self) -> Vec<(ProbeId, u32, &str)> {
        self.results
            .iter()
            .flat_map(|r| r.failures().map(move |(fork, reason)| (r.name, fork, reason)))
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avgt(ns_per_op: &[u64]) -> Measurement {
        Measurement {
            mode: Mode::AverageTime,
            iterations: ns_per_op
                .iter()
                .map(|&ns| IterationResult {
                    operations: 10,
                    elapsed_ns: ns * 10,
                })
                .collect(),
            samples: Vec::new(),
        }
    }

    fn probe(name: &str) -> ProbeId {
        name.parse().unwrap()
    }

    #[test]
    fn test_latency_metrics_from_samples() {
        let samples = vec![100, 200, 300, 400, 500, 600, 700, 800, 900, 1000];
        let metrics = LatencyMetrics::from_samples(samples);

        assert_eq!(metrics.count, 10);
        assert_eq!(metrics.min_ns, 100);
        assert_eq!(metrics.max_ns, 1000);
        assert_eq!(metrics.median_ns, 500);
        assert_eq!(metrics.p90_ns, 900);
        assert_eq!(metrics.p99_ns, 1000);
        assert!((metrics.mean_ns - 550.0).abs() < 0.01);
    }

    #[test]
    fn test_latency_metrics_empty() {
        let metrics = LatencyMetrics::from_samples(Vec::new());
        assert_eq!(metrics.count, 0);
        assert_eq!(metrics.max_ns, 0);
    }

    #[test]
    fn test_mean_with_error() {
        let (mean, error) = mean_with_error(&[10.0]);
        assert_eq!(mean, 10.0);
        assert!(error.is_none());

        let (mean, error) = mean_with_error(&[9.0, 10.0, 11.0]);
        assert!((mean - 10.0).abs() < 1e-9);
        // sd = 1, n = 3, t(2) = 31.599
        let expected = 31.599 / 3f64.sqrt();
        assert!((error.unwrap() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_aggregate_average_time_converts_units() {
        let result = BenchmarkResult::aggregate(
            probe("s0parse"),
            Mode::AverageTime,
            TimeUnit::Microseconds,
            vec![
                (1, ProbeStatus::Completed { measurement: avgt(&[2_000, 2_000]) }),
                (2, ProbeStatus::Completed { measurement: avgt(&[4_000, 4_000]) }),
            ],
        );

        let aggregate = result.aggregate.unwrap();
        assert!((aggregate.score - 3.0).abs() < 1e-9);
        assert_eq!(aggregate.count, 4);
        assert!(aggregate.error.unwrap() > 0.0);
        assert_eq!(
            result.forks[0].status,
            ForkStatus::Completed {
                score: 2.0,
                operations: 20,
                iterations: 2
            }
        );
    }

    #[test]
    fn test_aggregate_keeps_failed_forks() {
        let result = BenchmarkResult::aggregate(
            probe("ifull"),
            Mode::AverageTime,
            TimeUnit::Nanoseconds,
            vec![
                (1, ProbeStatus::Failed { reason: "boom".to_string() }),
                (2, ProbeStatus::Completed { measurement: avgt(&[100]) }),
            ],
        );
        assert_eq!(result.failures().collect::<Vec<_>>(), vec![(1, "boom")]);
        assert_eq!(result.aggregate.unwrap().score, 100.0);
    }

    #[test]
    fn test_aggregate_all_failed() {
        let result = BenchmarkResult::aggregate(
            probe("ifull"),
            Mode::SampleTime,
            TimeUnit::Nanoseconds,
            vec![(1, ProbeStatus::Failed { reason: "boom".to_string() })],
        );
        assert!(result.aggregate.is_none());
    }

    #[test]
    fn test_aggregate_sample_time_pools_forks() {
        let sample = |samples: Vec<u64>| Measurement {
            mode: Mode::SampleTime,
            iterations: vec![IterationResult {
                operations: samples.len() as u64,
                elapsed_ns: samples.iter().sum(),
            }],
            samples,
        };
        let result = BenchmarkResult::aggregate(
            probe("i2exec"),
            Mode::SampleTime,
            TimeUnit::Nanoseconds,
            vec![
                (1, ProbeStatus::Completed { measurement: sample(vec![100, 200]) }),
                (2, ProbeStatus::Completed { measurement: sample(vec![300, 400]) }),
            ],
        );
        let aggregate = result.aggregate.unwrap();
        assert_eq!(aggregate.count, 4);
        assert_eq!(aggregate.score, 250.0);
        let latency = aggregate.latency.unwrap();
        assert_eq!(latency.min_ns, 100);
        assert_eq!(latency.max_ns, 400);
    }

    #[test]
    fn test_overhead_estimate_flags_undercut() {
        let result = |name: &str, ns: u64| {
            BenchmarkResult::aggregate(
                probe(name),
                Mode::AverageTime,
                TimeUnit::Nanoseconds,
                vec![(1, ProbeStatus::Completed { measurement: avgt(&[ns]) })],
            )
        };
        let results = vec![
            result("sfull", 1_000),
            result("s0parse", 300),
            result("s1validate", 200),
            result("s2exec", 400),
            result("ifull", 1_000),
            result("i0parse", 600),
            result("i1validate", 300),
            result("i2exec", 400),
        ];

        let estimates = OverheadEstimate::from_results(&results);
        assert_eq!(estimates.len(), 2);

        let introspection = &estimates[0];
        assert_eq!(introspection.workload, Workload::Introspection);
        assert_eq!(introspection.epsilon, -300.0);
        assert!(introspection.flagged);

        let simple = &estimates[1];
        assert_eq!(simple.epsilon, 100.0);
        assert!(!simple.flagged);
    }

    #[test]
    fn test_overhead_skips_incomplete_workloads() {
        let results = vec![BenchmarkResult::aggregate(
            probe("sfull"),
            Mode::AverageTime,
            TimeUnit::Nanoseconds,
            vec![(1, ProbeStatus::Completed { measurement: avgt(&[10]) })],
        )];
        assert!(OverheadEstimate::from_results(&results).is_empty());
    }

    #[test]
    fn test_system_info_collect() {
        let info = SystemInfo::collect();
        assert!(!info.os.is_empty());
        assert!(info.cpu_cores > 0);
        assert!(info.memory_bytes > 0);
    }

    #[test]
    fn test_fork_outcome_serialization() {
        let outcome = ForkOutcome {
            fork: 2,
            probes: vec![
                ProbeRun {
                    probe: probe("sfull"),
                    status: ProbeStatus::Completed { measurement: avgt(&[10]) },
                },
                ProbeRun {
                    probe: probe("s0parse"),
                    status: ProbeStatus::Failed { reason: "boom".to_string() },
                },
            ],
        };

        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"sfull\""));
        assert!(json.contains("\"failed\""));
        let decoded: ForkOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, outcome);
    }
}
