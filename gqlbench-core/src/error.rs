// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Error types for the benchmark core.
//!
//! Configuration problems and fixture problems are both fatal, but they are
//! kept apart: a configuration error is the operator's mistake and is reported
//! before anything is built, while a fixture error means the query engine
//! rejected inputs that never change.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ProbeId, Workload};

/// Boxed engine error, kept intact so the original diagnostic survives.
pub type EngineFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for the benchmark core.
#[derive(Debug, Error)]
pub enum BenchError {
    // =========================================================================
    // Configuration Errors - rejected before fixtures are built
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Fixture Errors - the engine rejected a fixed input
    // =========================================================================
    #[error("Failed to build {what}: {source}")]
    Fixture {
        what: FixtureStep,
        #[source]
        source: EngineFailure,
    },

    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Which fixture step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureStep {
    Schema,
    Document(Workload),
}

impl std::fmt::Display for FixtureStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixtureStep::Schema => f.write_str("schema"),
            FixtureStep::Document(workload) => write!(f, "{} document", workload),
        }
    }
}

/// Invalid measurement configuration. Reported at startup, never mid-run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid fork count: {value} - {reason}")]
    InvalidForkCount { value: i64, reason: String },

    #[error("Unknown benchmark mode '{value}' (expected avgt or sample)")]
    UnknownMode { value: String },

    #[error("Unknown time unit '{value}' (expected ns, us, ms or s)")]
    UnknownTimeUnit { value: String },

    #[error("Unknown verbosity '{value}' (expected silent, normal or extra)")]
    UnknownVerbosity { value: String },

    #[error("Unknown probe '{name}'")]
    UnknownProbe { name: String },

    #[error("Duplicate probe in selection: {probe}")]
    DuplicateProbe { probe: ProbeId },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;
