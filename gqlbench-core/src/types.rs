// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers and enums for the benchmark's vocabulary.
//!
//! Everything here validates at creation time, so a `MeasurementConfig`
//! holding these types is valid by construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upper bound on fork count. Anything above this is almost certainly a typo.
const MAX_FORKS: i64 = 1000;

/// Validated number of forked measurement processes.
/// Must be in range 1-1000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ForkCount(u32);

impl ForkCount {
    /// Three forks, the usual trade-off between run time and variance estimation.
    pub const DEFAULT: ForkCount = ForkCount(3);

    /// Create a new ForkCount with validation.
    pub fn new(forks: i64) -> Result<Self, ConfigError> {
        if forks < 1 {
            return Err(ConfigError::InvalidForkCount {
                value: forks,
                reason: "At least one fork is required".to_string(),
            });
        }
        if forks > MAX_FORKS {
            return Err(ConfigError::InvalidForkCount {
                value: forks,
                reason: format!("Fork count must not exceed {}", MAX_FORKS),
            });
        }
        Ok(Self(forks as u32))
    }

    /// Get the inner fork count.
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ForkCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for ForkCount {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ForkCount> for i64 {
    fn from(forks: ForkCount) -> Self {
        forks.0 as i64
    }
}

/// How measured iterations are turned into a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Mean wall-clock time per invocation, amortised over each iteration.
    #[serde(rename = "avgt")]
    AverageTime,
    /// Latency distribution from individually timed invocations.
    #[serde(rename = "sample")]
    SampleTime,
}

impl Mode {
    /// Short label used in report tables.
    pub fn label(&self) -> &'static str {
        match self {
            Mode::AverageTime => "avgt",
            Mode::SampleTime => "sample",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "avgt" | "average-time" | "average_time" | "averagetime" => Ok(Mode::AverageTime),
            "sample" | "sample-time" | "sample_time" | "sampletime" => Ok(Mode::SampleTime),
            _ => Err(ConfigError::UnknownMode {
                value: s.to_string(),
            }),
        }
    }
}

/// Unit every score in a report is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "ns")]
    Nanoseconds,
    #[serde(rename = "us")]
    Microseconds,
    #[serde(rename = "ms")]
    Milliseconds,
    #[serde(rename = "s")]
    Seconds,
}

impl TimeUnit {
    /// Convert a nanosecond quantity into this unit.
    pub fn convert_nanos(&self, ns: f64) -> f64 {
        ns / self.nanos_per_unit()
    }

    fn nanos_per_unit(&self) -> f64 {
        match self {
            TimeUnit::Nanoseconds => 1.0,
            TimeUnit::Microseconds => 1_000.0,
            TimeUnit::Milliseconds => 1_000_000.0,
            TimeUnit::Seconds => 1_000_000_000.0,
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

impl FromStr for TimeUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ns" | "nanos" | "nanoseconds" => Ok(TimeUnit::Nanoseconds),
            "us" | "μs" | "micros" | "microseconds" => Ok(TimeUnit::Microseconds),
            "ms" | "millis" | "milliseconds" => Ok(TimeUnit::Milliseconds),
            "s" | "secs" | "seconds" => Ok(TimeUnit::Seconds),
            _ => Err(ConfigError::UnknownTimeUnit {
                value: s.to_string(),
            }),
        }
    }
}

/// How much progress output a run emits. Never affects measured values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Silent,
    Normal,
    Extra,
}

impl Verbosity {
    /// Default tracing filter directive for this verbosity.
    pub fn filter_directive(&self) -> &'static str {
        match self {
            Verbosity::Silent => "warn",
            Verbosity::Normal => "info",
            Verbosity::Extra => "debug",
        }
    }
}

impl FromStr for Verbosity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "silent" | "quiet" => Ok(Verbosity::Silent),
            "normal" => Ok(Verbosity::Normal),
            "extra" | "verbose" => Ok(Verbosity::Extra),
            _ => Err(ConfigError::UnknownVerbosity {
                value: s.to_string(),
            }),
        }
    }
}

/// The two fixed benchmark inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workload {
    /// The canonical schema-introspection query.
    Introspection,
    /// The literal query `{hello}`.
    Simple,
}

impl Workload {
    pub const ALL: [Workload; 2] = [Workload::Introspection, Workload::Simple];

    fn prefix(&self) -> char {
        match self {
            Workload::Introspection => 'i',
            Workload::Simple => 's',
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Workload::Introspection => f.write_str("introspection"),
            Workload::Simple => f.write_str("simple"),
        }
    }
}

/// Which cut of the pipeline a probe times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Raw text through parse, validate and execute in one engine call.
    Full,
    Parse,
    Validate,
    Execute,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Full, Stage::Parse, Stage::Validate, Stage::Execute];

    fn suffix(&self) -> &'static str {
        match self {
            Stage::Full => "full",
            Stage::Parse => "0parse",
            Stage::Validate => "1validate",
            Stage::Execute => "2exec",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Full => f.write_str("full"),
            Stage::Parse => f.write_str("parse"),
            Stage::Validate => f.write_str("validate"),
            Stage::Execute => f.write_str("execute"),
        }
    }
}

/// Identifies one cell of the workload × stage matrix.
///
/// Names are stable (`ifull`, `i0parse`, `i1validate`, `i2exec`, and the
/// same with an `s` prefix) so results stay comparable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProbeId {
    pub workload: Workload,
    pub stage: Stage,
}

impl ProbeId {
    pub fn new(workload: Workload, stage: Stage) -> Self {
        Self { workload, stage }
    }

    /// All eight probes in declared order.
    pub fn all() -> impl Iterator<Item = ProbeId> {
        Workload::ALL
            .into_iter()
            .flat_map(|w| Stage::ALL.into_iter().map(move |s| ProbeId::new(w, s)))
    }

    pub fn name(&self) -> String {
        format!("{}{}", self.workload.prefix(), self.stage.suffix())
    }
}

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.workload.prefix(), self.stage.suffix())
    }
}

impl FromStr for ProbeId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProbeId::all()
            .find(|id| id.name() == s)
            .ok_or_else(|| ConfigError::UnknownProbe {
                name: s.to_string(),
            })
    }
}

impl TryFrom<String> for ProbeId {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProbeId> for String {
    fn from(id: ProbeId) -> Self {
        id.name()
    }
}
