// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! gqlbench Benchmarking Framework
//!
//! Measures how long a GraphQL engine spends in each pipeline stage for two
//! fixed workloads, the introspection query and `{hello}`.
//!
//! # Probes
//!
//! - **full**: raw text through parse, validate and execute
//! - **0parse**: parse only
//! - **1validate**: validate a pre-parsed document
//! - **2exec**: execute a pre-parsed, pre-validated document
//!
//! # Process Layout
//!
//! The driver runs each fork in a child process ([`driver::ProcessLauncher`]);
//! the child measures with [`worker::run_fork`] and reports back as JSON.
//! Results are printed as a text table and optionally saved as JSON.

pub mod driver;
pub mod harness;
pub mod metrics;
pub mod reporter;
pub mod worker;

pub use driver::{Driver, DriverError, ForkLauncher, InProcessLauncher, ProcessLauncher};
pub use harness::BenchmarkHarness;
pub use metrics::{
    BenchmarkReport, BenchmarkResult, ForkOutcome, LatencyMetrics, Measurement, OverheadEstimate,
    SystemInfo,
};
pub use reporter::{JsonReporter, TextReporter};
