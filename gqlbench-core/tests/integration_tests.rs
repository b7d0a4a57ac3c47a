// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Integration tests against the real async-graphql engine.
//!
//! These check the benchmark inputs themselves, not the engine: fixtures must
//! be reproducible, the probes must each make the engine call they claim to,
//! and `{hello}` must answer `"world"` before any timing is trusted.

use std::io::Write;

use gqlbench_core::{
    ConfigLoader, Fixtures, GraphqlEngine, ProbeId, ProbeOutput, ProbeRegistry, QueryEngine,
    Stage, Workload,
};

fn fixtures() -> Fixtures<GraphqlEngine> {
    let engine = GraphqlEngine::new().expect("Failed to start engine");
    Fixtures::build(engine).expect("Failed to build fixtures")
}

#[test]
fn test_fixture_documents_are_deterministic() {
    let first = fixtures();
    let second = fixtures();

    for workload in Workload::ALL {
        let a = format!("{:?}", first.workload(workload).document());
        let b = format!("{:?}", second.workload(workload).document());
        assert_eq!(a, b, "{} document differs between builds", workload);
    }
}

#[test]
fn test_hello_precondition_holds() {
    let fixtures = fixtures();
    fixtures
        .check_preconditions()
        .expect("Preconditions must hold for async-graphql");

    let engine = fixtures.engine();
    let simple = fixtures.workload(Workload::Simple);
    let validation = engine.validate(fixtures.schema(), simple.document());
    assert!(engine.validation_errors(&validation).is_empty());

    let output = engine.execution_output(&engine.execute_document(
        fixtures.schema(),
        simple.document(),
        fixtures.variables(),
    ));
    assert!(output.errors.is_empty(), "{:?}", output.errors);
    assert_eq!(output.data, serde_json::json!({ "hello": "world" }));
}

#[test]
fn test_every_probe_invokes_cleanly() {
    let fixtures = fixtures();
    let registry = ProbeRegistry::new(&fixtures);
    assert_eq!(registry.len(), 8);

    for probe in registry.iter() {
        let output = probe
            .invoke()
            .unwrap_or_else(|e| panic!("{} failed: {}", probe.id(), e));
        let engine = fixtures.engine();
        match (probe.id().stage, output) {
            (Stage::Parse, ProbeOutput::Document(_)) => {}
            (Stage::Validate, ProbeOutput::Validation(v)) => {
                assert!(engine.validation_errors(&v).is_empty(), "{}", probe.id());
            }
            (Stage::Full | Stage::Execute, ProbeOutput::Execution(e)) => {
                let out = engine.execution_output(&e);
                assert!(out.errors.is_empty(), "{}: {:?}", probe.id(), out.errors);
            }
            (stage, _) => panic!("{} returned the wrong output kind for {}", probe.id(), stage),
        }
    }
}

#[test]
fn test_full_and_execute_cuts_agree() {
    let fixtures = fixtures();
    let engine = fixtures.engine();
    let registry = ProbeRegistry::new(&fixtures);

    for workload in Workload::ALL {
        let data = |stage| {
            let probe = registry.get(ProbeId::new(workload, stage)).unwrap();
            match probe.invoke().unwrap() {
                ProbeOutput::Execution(e) => engine.execution_output(&e).data,
                _ => unreachable!(),
            }
        };
        assert_eq!(data(Stage::Full), data(Stage::Execute), "{}", workload);
    }
}

#[test]
fn test_config_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    writeln!(file, "forks: 1\nmode: sample\nprobes: [sfull]").unwrap();

    let config = ConfigLoader::load_file(file.path()).unwrap();
    assert_eq!(config.forks.value(), 1);
    assert_eq!(config.probes, vec!["sfull".parse::<ProbeId>().unwrap()]);
}
