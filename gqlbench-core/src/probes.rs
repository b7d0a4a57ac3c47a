// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Stage probes and their registration table.
//!
//! A probe is one cell of the workload × stage matrix: a single engine call
//! against borrowed fixtures. Probes never parse unless their stage is parse
//! or full, so the validate and execute cuts exclude parse cost.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::ProbeOrder;
use crate::engine::QueryEngine;
use crate::fixtures::{Fixtures, WorkloadInput};
use crate::types::{ProbeId, Stage};

/// Whatever the engine returned. Callers must consume it (e.g. with
/// `std::hint::black_box`) so the work cannot be optimised away.
pub enum ProbeOutput<E: QueryEngine> {
    Document(E::Document),
    Validation(E::Validation),
    Execution(E::Execution),
}

type StageFn<E> = fn(
    &Fixtures<E>,
    &WorkloadInput<<E as QueryEngine>::Document>,
) -> Result<ProbeOutput<E>, <E as QueryEngine>::Error>;

fn full_pipeline<E: QueryEngine>(
    fixtures: &Fixtures<E>,
    input: &WorkloadInput<E::Document>,
) -> Result<ProbeOutput<E>, E::Error> {
    let result = fixtures.engine().execute(fixtures.schema(), input.text());
    Ok(ProbeOutput::Execution(result))
}

fn parse_only<E: QueryEngine>(
    fixtures: &Fixtures<E>,
    input: &WorkloadInput<E::Document>,
) -> Result<ProbeOutput<E>, E::Error> {
    fixtures
        .engine()
        .parse(input.text())
        .map(ProbeOutput::Document)
}

fn validate_only<E: QueryEngine>(
    fixtures: &Fixtures<E>,
    input: &WorkloadInput<E::Document>,
) -> Result<ProbeOutput<E>, E::Error> {
    let result = fixtures
        .engine()
        .validate(fixtures.schema(), input.document());
    Ok(ProbeOutput::Validation(result))
}

fn execute_only<E: QueryEngine>(
    fixtures: &Fixtures<E>,
    input: &WorkloadInput<E::Document>,
) -> Result<ProbeOutput<E>, E::Error> {
    let result = fixtures.engine().execute_document(
        fixtures.schema(),
        input.document(),
        fixtures.variables(),
    );
    Ok(ProbeOutput::Execution(result))
}

fn stage_fn<E: QueryEngine>(stage: Stage) -> StageFn<E> {
    match stage {
        Stage::Full => full_pipeline::<E>,
        Stage::Parse => parse_only::<E>,
        Stage::Validate => validate_only::<E>,
        Stage::Execute => execute_only::<E>,
    }
}

/// A named, invocable timed operation bound to its fixtures.
pub struct Probe<'f, E: QueryEngine> {
    id: ProbeId,
    fixtures: &'f Fixtures<E>,
    run: StageFn<E>,
}

impl<'f, E: QueryEngine> Clone for Probe<'f, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'f, E: QueryEngine> Copy for Probe<'f, E> {}

impl<'f, E: QueryEngine> Probe<'f, E> {
    fn new(id: ProbeId, fixtures: &'f Fixtures<E>) -> Self {
        Self {
            id,
            fixtures,
            run: stage_fn::<E>(id.stage),
        }
    }

    pub fn id(&self) -> ProbeId {
        self.id
    }

    /// Perform one invocation of the engine operation this probe isolates.
    pub fn invoke(&self) -> Result<ProbeOutput<E>, E::Error> {
        (self.run)(self.fixtures, self.fixtures.workload(self.id.workload))
    }
}

impl<E: QueryEngine> std::fmt::Debug for Probe<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Probe").field("id", &self.id).finish()
    }
}

/// Explicit table of probes, in the order they should run.
pub struct ProbeRegistry<'f, E: QueryEngine> {
    probes: Vec<Probe<'f, E>>,
}

impl<'f, E: QueryEngine> ProbeRegistry<'f, E> {
    /// All eight probes in declared order.
    pub fn new(fixtures: &'f Fixtures<E>) -> Self {
        let ids: Vec<ProbeId> = ProbeId::all().collect();
        Self::select(fixtures, &ids)
    }

    /// Only the given probes, in the given order.
    pub fn select(fixtures: &'f Fixtures<E>, ids: &[ProbeId]) -> Self {
        Self {
            probes: ids.iter().map(|&id| Probe::new(id, fixtures)).collect(),
        }
    }

    pub fn get(&self, id: ProbeId) -> Option<&Probe<'f, E>> {
        self.probes.iter().find(|p| p.id == id)
    }

    pub fn find(&self, name: &str) -> Option<&Probe<'f, E>> {
        self.probes.iter().find(|p| p.id.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Probe<'f, E>> {
        self.probes.iter()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Probes in the order a given fork should run them.
    ///
    /// Shuffling is seeded per fork, so each fork sees a different but
    /// reproducible order.
    pub fn ordered(&self, order: ProbeOrder, fork: u32) -> Vec<Probe<'f, E>> {
        let mut probes = self.probes.clone();
        if let ProbeOrder::Shuffled { seed } = order {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(u64::from(fork)));
            probes.shuffle(&mut rng);
        }
        probes
    }
}
