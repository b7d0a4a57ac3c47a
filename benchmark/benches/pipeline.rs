// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Stage microbenchmarks under criterion.
//!
//! The same eight probes the forked runner measures, one criterion group per
//! workload. Criterion handles warm-up and statistics; fixtures are built
//! once and shared by every probe.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gqlbench_core::{Fixtures, GraphqlEngine, ProbeId, ProbeRegistry, Stage, Workload};

fn bench_pipeline_stages(c: &mut Criterion) {
    let engine = GraphqlEngine::new().expect("Failed to start GraphQL engine");
    let fixtures = Fixtures::build(engine).expect("Failed to build fixtures");
    fixtures
        .check_preconditions()
        .expect("Engine does not answer the fixture queries correctly");
    let registry = ProbeRegistry::new(&fixtures);

    for workload in Workload::ALL {
        let mut group = c.benchmark_group(workload.to_string());
        group.measurement_time(Duration::from_secs(5));
        group.throughput(Throughput::Bytes(workload.query_text().len() as u64));

        for stage in Stage::ALL {
            let probe = registry
                .get(ProbeId::new(workload, stage))
                .expect("every probe is registered");

            group.bench_function(BenchmarkId::from_parameter(probe.id()), |b| {
                b.iter(|| black_box(probe.invoke()))
            });
        }

        group.finish();
    }
}

criterion_group!(benches, bench_pipeline_stages);
criterion_main!(benches);
