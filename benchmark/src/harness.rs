// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark harness for running and timing operations.
//!
//! Each iteration keeps invoking the operation until its time box runs out.
//! Warm-up iterations run exactly like measured ones and are thrown away.

use std::hint::black_box;
use std::time::{Duration, Instant};

use gqlbench_core::{MeasurementConfig, Mode};

use crate::metrics::{IterationResult, Measurement};

/// Upper bound on samples kept per probe per fork in sample mode.
pub const SAMPLE_CAPACITY: usize = 16_384;

/// A benchmark harness for measuring operation latency.
#[derive(Debug, Clone)]
pub struct BenchmarkHarness {
    /// Number of warmup iterations before measurement
    warmup_iterations: u64,
    /// Number of measurement iterations
    measurement_iterations: u64,
    /// Wall-clock length of every iteration
    iteration_time: Duration,
    mode: Mode,
}

impl BenchmarkHarness {
    /// Create a new benchmark harness with default settings.
    pub fn new() -> Self {
        Self {
            warmup_iterations: 5,
            measurement_iterations: 5,
            iteration_time: Duration::from_secs(1),
            mode: Mode::AverageTime,
        }
    }

    /// Harness matching a validated configuration.
    pub fn from_config(config: &MeasurementConfig) -> Self {
        Self::new()
            .warmup(config.warmup_iterations)
            .iterations(config.measurement_iterations)
            .iteration_time(config.iteration_time)
            .mode(config.mode)
    }

    /// Set the number of warmup iterations.
    pub fn warmup(mut self, iterations: u64) -> Self {
        self.warmup_iterations = iterations;
        self
    }

    /// Set the number of measurement iterations.
    pub fn iterations(mut self, iterations: u64) -> Self {
        self.measurement_iterations = iterations;
        self
    }

    pub fn iteration_time(mut self, time: Duration) -> Self {
        self.iteration_time = time;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Run warm-up then measurement iterations of `operation`.
    ///
    /// Every returned value is passed through `black_box`. The first error
    /// aborts the run and is returned as is.
    pub fn run<T, E, F>(&self, mut operation: F) -> Result<Measurement, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        for i in 0..self.warmup_iterations {
            let result = self.iteration(&mut operation, None)?;
            tracing::debug!(
                iteration = i + 1,
                ops = result.operations,
                ns_per_op = result.ns_per_op(),
                "Warmup iteration"
            );
        }

        let mut sampler = match self.mode {
            Mode::SampleTime => Some(SampleBuffer::new(SAMPLE_CAPACITY)),
            Mode::AverageTime => None,
        };

        let mut iterations = Vec::with_capacity(self.measurement_iterations as usize);
        for i in 0..self.measurement_iterations {
            let result = self.iteration(&mut operation, sampler.as_mut())?;
            tracing::debug!(
                iteration = i + 1,
                ops = result.operations,
                ns_per_op = result.ns_per_op(),
                "Measurement iteration"
            );
            iterations.push(result);
        }

        Ok(Measurement {
            mode: self.mode,
            iterations,
            samples: sampler.map(SampleBuffer::into_samples).unwrap_or_default(),
        })
    }

    /// One time-boxed iteration. Always performs at least one invocation.
    fn iteration<T, E, F>(
        &self,
        operation: &mut F,
        sampler: Option<&mut SampleBuffer>,
    ) -> Result<IterationResult, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        let mut operations = 0u64;

        match sampler {
            // Time the whole batch; per-call clock reads would dominate
            // sub-microsecond operations.
            None => {
                let start = Instant::now();
                loop {
                    black_box(operation()?);
                    operations += 1;
                    if start.elapsed() >= self.iteration_time {
                        break;
                    }
                }
                Ok(IterationResult {
                    operations,
                    elapsed_ns: start.elapsed().as_nanos() as u64,
                })
            }
            Some(sampler) => {
                let deadline = Instant::now() + self.iteration_time;
                let mut elapsed_ns = 0u64;
                loop {
                    let start = Instant::now();
                    let result = operation();
                    let took = start.elapsed().as_nanos() as u64;
                    black_box(result?);
                    operations += 1;
                    elapsed_ns += took;
                    sampler.record(took);
                    if Instant::now() >= deadline {
                        break;
                    }
                }
                Ok(IterationResult {
                    operations,
                    elapsed_ns,
                })
            }
        }
    }
}

impl Default for BenchmarkHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded sample store.
///
/// Records every `stride`-th sample; when full it drops every other sample
/// and doubles the stride, so the kept samples stay spread over the whole
/// run.
#[derive(Debug)]
pub struct SampleBuffer {
    samples: Vec<u64>,
    capacity: usize,
    stride: u64,
    seen: u64,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity: capacity.max(2),
            stride: 1,
            seen: 0,
        }
    }

    pub fn record(&mut self, ns: u64) {
        self.seen += 1;
        if self.seen % self.stride != 0 {
            return;
        }
        self.samples.push(ns);
        if self.samples.len() >= self.capacity {
            let mut index = 0;
            self.samples.retain(|_| {
                index += 1;
                index % 2 == 0
            });
            self.stride *= 2;
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn into_samples(self) -> Vec<u64> {
        self.samples
    }
}
