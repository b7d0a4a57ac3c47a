// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! gqlbench Core Library
//!
//! Stage-isolated benchmark inputs for a GraphQL engine: the engine seam,
//! the async-graphql adapter, immutable fixtures, the 2×4 probe table and
//! the validated measurement configuration.

pub mod config;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod graphql;
pub mod introspection;
pub mod probes;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

// Re-export commonly used types
pub use config::{ConfigLoader, MeasurementConfig, ProbeOrder, RawMeasurementConfig};
pub use engine::{ExecutionOutput, QueryEngine, RootSpec, Variables};
pub use error::{BenchError, BenchResult, ConfigError};
pub use fixtures::{Fixtures, WorkloadInput};
pub use graphql::{GraphqlEngine, GraphqlEngineError};
pub use probes::{Probe, ProbeOutput, ProbeRegistry};
pub use types::{ForkCount, Mode, ProbeId, Stage, TimeUnit, Verbosity, Workload};
