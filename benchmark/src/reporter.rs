// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Report output for benchmark results.
//!
//! `TextReporter` renders the human-readable result table; `JsonReporter`
//! saves the full report to timestamped JSON files for later comparison.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use gqlbench_core::{Mode, ProbeOrder};
use thiserror::Error;

use crate::metrics::{BenchmarkReport, BenchmarkResult, ForkStatus};

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// JSON reporter for benchmark results.
pub struct JsonReporter {
    /// Output directory for benchmark data
    output_dir: PathBuf,
}

impl JsonReporter {
    /// Create a new JSON reporter with the specified output directory.
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self, ReporterError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Save a benchmark report to a JSON file.
    ///
    /// Returns the path to the created file.
    pub fn save(&self, report: &BenchmarkReport) -> Result<PathBuf, ReporterError> {
        let timestamp = report.timestamp.format("%Y-%m-%dT%H-%M-%SZ");
        let run = report.run_id.simple().to_string();
        let filename = format!("{}_{}_{}.json", report.benchmark_suite, timestamp, &run[..8]);
        let filepath = self.output_dir.join(&filename);

        let file = File::create(&filepath)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, report)?;

        Ok(filepath)
    }

    /// List all existing benchmark files in the output directory.
    pub fn list_reports(&self) -> Result<Vec<PathBuf>, ReporterError> {
        let mut reports = Vec::new();
        for entry in fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                reports.push(path);
            }
        }
        reports.sort();
        Ok(reports)
    }

    /// Load an existing benchmark report from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<BenchmarkReport, ReporterError> {
        let file = File::open(path)?;
        let report = serde_json::from_reader(file)?;
        Ok(report)
    }
}

/// Plain-text result table in the usual microbenchmark layout:
/// `Benchmark  Mode  Cnt  Score  Error  Units`, with one line per fork
/// under each probe.
pub struct TextReporter;

impl TextReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, report: &BenchmarkReport) -> String {
        let mut out = String::new();
        match report.probe_order {
            ProbeOrder::Declared => {
                let _ = writeln!(out, "Probe order: declared");
            }
            ProbeOrder::Shuffled { seed } => {
                let _ = writeln!(out, "Probe order: shuffled (seed {})", seed);
            }
        }
        let _ = writeln!(out);

        let name_width = report
            .results
            .iter()
            .map(|r| r.name.name().len() + 8)
            .max()
            .unwrap_or(9)
            .max(9);

        let _ = writeln!(
            out,
            "{:<w$}  {:>6}  {:>6}  {:>14}    {:>12}  {:<6}",
            "Benchmark",
            "Mode",
            "Cnt",
            "Score",
            "Error",
            "Units",
            w = name_width
        );

        for result in &report.results {
            self.render_result(&mut out, result, name_width);
        }

        if !report.overhead.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Full-pipeline overhead (full - parse - validate - execute):");
            for estimate in &report.overhead {
                let unit = report.config.time_unit.abbreviation();
                let _ = writeln!(
                    out,
                    "  {:<14} full {:>12.3} {}  parts {:>12.3} {}  epsilon {:>+12.3} {}{}",
                    estimate.workload,
                    estimate.full,
                    unit,
                    estimate.parts_sum,
                    unit,
                    estimate.epsilon,
                    unit,
                    if estimate.flagged {
                        "  (full undercuts the sum of its parts)"
                    } else {
                        ""
                    }
                );
            }
        }

        let failures = report.failures();
        if !failures.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Failed measurements:");
            for (probe, fork, reason) in failures {
                let _ = writeln!(out, "  {} (fork {}): {}", probe, fork, reason);
            }
        }

        out
    }

    fn render_result(&self, out: &mut String, result: &BenchmarkResult, width: usize) {
        let units = format!("{}/op", result.unit.abbreviation());

        match &result.aggregate {
            Some(aggregate) => {
                let error = aggregate
                    .error
                    .map(|e| format!("± {:>10.3}", e))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    "{:<w$}  {:>6}  {:>6}  {:>14.3}    {:>12}  {:<6}",
                    result.name.name(),
                    result.mode.label(),
                    aggregate.count,
                    aggregate.score,
                    error,
                    units,
                    w = width
                );

                if let (Mode::SampleTime, Some(latency)) = (result.mode, &aggregate.latency) {
                    for (label, ns) in latency.table() {
                        let _ = writeln!(
                            out,
                            "{:<w$}  {:>6}  {:>6}  {:>14.3}    {:>12}  {:<6}",
                            format!("{}:{}", result.name, label),
                            result.mode.label(),
                            "",
                            result.unit.convert_nanos(ns as f64),
                            "",
                            units,
                            w = width
                        );
                    }
                }
            }
            None => {
                let _ = writeln!(
                    out,
                    "{:<w$}  {:>6}  {:>6}  {:>14}    {:>12}  {:<6}",
                    result.name.name(),
                    result.mode.label(),
                    0,
                    "FAILED",
                    "",
                    units,
                    w = width
                );
            }
        }

        for fork in &result.forks {
            match &fork.status {
                ForkStatus::Completed {
                    score, operations, ..
                } => {
                    let _ = writeln!(
                        out,
                        "    fork {:>3}: {:>14.3} {}  ({} ops)",
                        fork.fork, score, units, operations
                    );
                }
                ForkStatus::Failed { reason } => {
                    let _ = writeln!(out, "    fork {:>3}: FAILED ({})", fork.fork, reason);
                }
            }
        }
    }
}

impl Default for TextReporter {
    fn default() -> Self {
        Self::new()
    }
}
