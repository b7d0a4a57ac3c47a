// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared, immutable benchmark inputs.
//!
//! `Fixtures` is built once per measurement process and only ever borrowed by
//! probes. Building it is the one place the engine may reject input; any
//! rejection is fatal because the inputs never change.

use crate::engine::{QueryEngine, RootSpec, Variables};
use crate::error::{BenchError, BenchResult, FixtureStep};
use crate::introspection::INTROSPECTION_QUERY;
use crate::types::Workload;

/// Name of the query root type.
pub const ROOT_TYPE: &str = "Root";
/// The single field on the root type.
pub const HELLO_FIELD: &str = "hello";
/// Constant value `hello` resolves to.
pub const HELLO_VALUE: &str = "world";
/// Text of the simple workload.
pub const SIMPLE_QUERY: &str = "{hello}";

impl Workload {
    /// Raw query text for this workload.
    pub fn query_text(&self) -> &'static str {
        match self {
            Workload::Introspection => INTROSPECTION_QUERY,
            Workload::Simple => SIMPLE_QUERY,
        }
    }
}

/// Raw query text paired with its parse result.
///
/// The document is always the parse of `text` under the same engine.
#[derive(Debug)]
pub struct WorkloadInput<D> {
    workload: Workload,
    text: &'static str,
    document: D,
}

impl<D> WorkloadInput<D> {
    pub fn workload(&self) -> Workload {
        self.workload
    }

    pub fn text(&self) -> &'static str {
        self.text
    }

    pub fn document(&self) -> &D {
        &self.document
    }
}

/// Everything a probe needs: the engine, the schema, both workloads and the
/// (empty) variables map.
pub struct Fixtures<E: QueryEngine> {
    engine: E,
    schema: E::Schema,
    introspection: WorkloadInput<E::Document>,
    simple: WorkloadInput<E::Document>,
    variables: Variables,
}

impl<E: QueryEngine> Fixtures<E> {
    /// Build the schema and pre-parse both workloads.
    pub fn build(engine: E) -> BenchResult<Self> {
        let root = RootSpec::new(ROOT_TYPE).static_field(HELLO_FIELD, HELLO_VALUE);
        let schema = engine
            .build_schema(&root)
            .map_err(|e| BenchError::Fixture {
                what: FixtureStep::Schema,
                source: Box::new(e),
            })?;

        let introspection = Self::prepare(&engine, Workload::Introspection)?;
        let simple = Self::prepare(&engine, Workload::Simple)?;

        tracing::debug!(
            root = ROOT_TYPE,
            introspection_bytes = introspection.text.len(),
            simple_bytes = simple.text.len(),
            "Built benchmark fixtures"
        );

        Ok(Self {
            engine,
            schema,
            introspection,
            simple,
            variables: Variables::new(),
        })
    }

    fn prepare(engine: &E, workload: Workload) -> BenchResult<WorkloadInput<E::Document>> {
        let text = workload.query_text();
        let document = engine.parse(text).map_err(|e| BenchError::Fixture {
            what: FixtureStep::Document(workload),
            source: Box::new(e),
        })?;

        Ok(WorkloadInput {
            workload,
            text,
            document,
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn schema(&self) -> &E::Schema {
        &self.schema
    }

    pub fn workload(&self, workload: Workload) -> &WorkloadInput<E::Document> {
        match workload {
            Workload::Introspection => &self.introspection,
            Workload::Simple => &self.simple,
        }
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Check that the engine answers both workloads correctly.
    ///
    /// `{hello}` must validate cleanly and resolve to exactly
    /// `{"hello": "world"}`; the introspection query must validate cleanly and
    /// report `Root` as the query type. Timings are meaningless otherwise.
    pub fn check_preconditions(&self) -> BenchResult<()> {
        for workload in Workload::ALL {
            let input = self.workload(workload);
            let violations = self
                .engine
                .validation_errors(&self.engine.validate(&self.schema, &input.document));
            if !violations.is_empty() {
                return Err(BenchError::Precondition {
                    message: format!(
                        "{} query failed validation: {}",
                        workload,
                        violations.join("; ")
                    ),
                });
            }

            let output = self.engine.execution_output(&self.engine.execute_document(
                &self.schema,
                &input.document,
                &self.variables,
            ));
            if !output.errors.is_empty() {
                return Err(BenchError::Precondition {
                    message: format!(
                        "{} query returned errors: {}",
                        workload,
                        output.errors.join("; ")
                    ),
                });
            }

            let expected_ok = match workload {
                Workload::Simple => output.data == serde_json::json!({ HELLO_FIELD: HELLO_VALUE }),
                Workload::Introspection => {
                    output.data["__schema"]["queryType"]["name"] == ROOT_TYPE
                }
            };
            if !expected_ok {
                return Err(BenchError::Precondition {
                    message: format!(
                        "{} query returned unexpected data: {}",
                        workload, output.data
                    ),
                });
            }
        }

        tracing::debug!("Fixture preconditions hold");
        Ok(())
    }
}
