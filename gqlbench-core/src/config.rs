// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Measurement configuration with strict validation.
//!
//! A configuration is parsed in two phases: a permissive raw form (from YAML
//! or assembled from CLI flags) and a validated `MeasurementConfig`. Any
//! invalid field is rejected before fixtures are built.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult, ConfigError};
use crate::types::{ForkCount, Mode, ProbeId, TimeUnit, Verbosity};

const MAX_MEASUREMENT_ITERATIONS: u64 = 10_000;
const MAX_ITERATION_TIME_MS: u64 = 600_000;

/// Raw configuration as parsed from YAML or CLI flags (before validation).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMeasurementConfig {
    #[serde(default = "default_forks")]
    pub forks: i64,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_time_unit")]
    pub time_unit: String,
    #[serde(default = "default_verbosity")]
    pub verbosity: String,
    #[serde(default = "default_warmup_iterations")]
    pub warmup_iterations: u64,
    #[serde(default = "default_measurement_iterations")]
    pub measurement_iterations: u64,
    #[serde(default = "default_iteration_time_ms")]
    pub iteration_time_ms: u64,
    #[serde(default)]
    pub fork_timeout_secs: Option<u64>,
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
    #[serde(default)]
    pub probes: Vec<String>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_forks() -> i64 {
    ForkCount::DEFAULT.into()
}

fn default_mode() -> String {
    "avgt".to_string()
}

fn default_time_unit() -> String {
    "us".to_string()
}

fn default_verbosity() -> String {
    "normal".to_string()
}

fn default_warmup_iterations() -> u64 {
    5
}

fn default_measurement_iterations() -> u64 {
    5
}

fn default_iteration_time_ms() -> u64 {
    1000
}

impl Default for RawMeasurementConfig {
    fn default() -> Self {
        Self {
            forks: default_forks(),
            mode: default_mode(),
            time_unit: default_time_unit(),
            verbosity: default_verbosity(),
            warmup_iterations: default_warmup_iterations(),
            measurement_iterations: default_measurement_iterations(),
            iteration_time_ms: default_iteration_time_ms(),
            fork_timeout_secs: None,
            shuffle_seed: None,
            probes: Vec::new(),
            output_dir: None,
        }
    }
}

/// Order in which a fork runs its probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ProbeOrder {
    /// Introspection full, parse, validate, execute; then simple likewise.
    Declared,
    /// Declared order shuffled per fork from a reproducible seed.
    Shuffled { seed: u64 },
}

/// Validated measurement configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementConfig {
    pub forks: ForkCount,
    pub mode: Mode,
    pub time_unit: TimeUnit,
    pub verbosity: Verbosity,
    pub warmup_iterations: u64,
    pub measurement_iterations: u64,
    pub iteration_time: Duration,
    pub fork_timeout: Option<Duration>,
    pub order: ProbeOrder,
    /// Selected probes in declared order; never empty.
    pub probes: Vec<ProbeId>,
    pub output_dir: Option<PathBuf>,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            forks: ForkCount::DEFAULT,
            mode: Mode::AverageTime,
            time_unit: TimeUnit::Microseconds,
            verbosity: Verbosity::Normal,
            warmup_iterations: default_warmup_iterations(),
            measurement_iterations: default_measurement_iterations(),
            iteration_time: Duration::from_millis(default_iteration_time_ms()),
            fork_timeout: None,
            order: ProbeOrder::Declared,
            probes: ProbeId::all().collect(),
            output_dir: None,
        }
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> BenchResult<MeasurementConfig> {
        let raw = Self::read_file(path)?;
        Ok(Self::validate(raw)?)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> BenchResult<MeasurementConfig> {
        let raw = Self::parse_string(content)?;
        Ok(Self::validate(raw)?)
    }

    /// Read a YAML file into its raw form so callers can layer overrides on top.
    pub fn read_file(path: impl AsRef<Path>) -> BenchResult<RawMeasurementConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BenchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| BenchError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::parse_string(&content)
    }

    fn parse_string(content: &str) -> BenchResult<RawMeasurementConfig> {
        serde_yaml::from_str(content).map_err(|e| BenchError::ConfigParse {
            message: format!("YAML parse error: {}", e),
        })
    }

    /// Validate raw configuration and convert to validated types.
    pub fn validate(raw: RawMeasurementConfig) -> Result<MeasurementConfig, ConfigError> {
        let forks = ForkCount::new(raw.forks)?;
        let mode: Mode = raw.mode.parse()?;
        let time_unit: TimeUnit = raw.time_unit.parse()?;
        let verbosity: Verbosity = raw.verbosity.parse()?;

        if raw.measurement_iterations == 0
            || raw.measurement_iterations > MAX_MEASUREMENT_ITERATIONS
        {
            return Err(ConfigError::InvalidFieldValue {
                field: "measurement_iterations",
                value: raw.measurement_iterations.to_string(),
                reason: format!("Must be between 1 and {}", MAX_MEASUREMENT_ITERATIONS),
            });
        }

        if raw.warmup_iterations > MAX_MEASUREMENT_ITERATIONS {
            return Err(ConfigError::InvalidFieldValue {
                field: "warmup_iterations",
                value: raw.warmup_iterations.to_string(),
                reason: format!("Must not exceed {}", MAX_MEASUREMENT_ITERATIONS),
            });
        }

        if raw.iteration_time_ms == 0 || raw.iteration_time_ms > MAX_ITERATION_TIME_MS {
            return Err(ConfigError::InvalidFieldValue {
                field: "iteration_time_ms",
                value: raw.iteration_time_ms.to_string(),
                reason: format!("Must be between 1 and {}ms", MAX_ITERATION_TIME_MS),
            });
        }

        let fork_timeout = match raw.fork_timeout_secs {
            Some(0) => {
                return Err(ConfigError::InvalidFieldValue {
                    field: "fork_timeout_secs",
                    value: "0".to_string(),
                    reason: "Timeout must be greater than 0".to_string(),
                })
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        let order = match raw.shuffle_seed {
            Some(seed) => ProbeOrder::Shuffled { seed },
            None => ProbeOrder::Declared,
        };

        let probes = Self::select_probes(&raw.probes)?;

        Ok(MeasurementConfig {
            forks,
            mode,
            time_unit,
            verbosity,
            warmup_iterations: raw.warmup_iterations,
            measurement_iterations: raw.measurement_iterations,
            iteration_time: Duration::from_millis(raw.iteration_time_ms),
            fork_timeout,
            order,
            probes,
            output_dir: raw.output_dir,
        })
    }

    /// Resolve probe names; an empty filter selects every probe.
    fn select_probes(names: &[String]) -> Result<Vec<ProbeId>, ConfigError> {
        if names.is_empty() {
            return Ok(ProbeId::all().collect());
        }

        let mut selected = HashSet::new();
        for name in names {
            let id: ProbeId = name.parse()?;
            if !selected.insert(id) {
                return Err(ConfigError::DuplicateProbe { probe: id });
            }
        }

        Ok(ProbeId::all().filter(|id| selected.contains(id)).collect())
    }
}
