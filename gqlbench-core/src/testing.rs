// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! A deterministic stand-in engine for tests.
//!
//! `StubEngine` understands just enough GraphQL to answer `{hello}` and the
//! introspection query, counts every stage call, can burn a fixed amount of
//! CPU per stage, and can be told to misbehave. Executing a pre-parsed
//! document skips validation, so the three stage cuts add up to the full
//! pipeline exactly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::engine::{ExecutionOutput, QueryEngine, RootSpec, Variables};
use crate::types::Stage;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StubError {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Schema rejected: {0}")]
    Schema(String),
}

/// Ways the stub can be told to misbehave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `build_schema` fails.
    RejectSchema,
    /// Every parse after the first `n` fails.
    ParseErrorAfter(usize),
    /// The given stage panics. `Full` panics inside `execute`.
    PanicAt(Stage),
    /// `hello` resolves to this instead of the configured value.
    WrongValue(&'static str),
}

/// Per-stage call counters.
#[derive(Debug, Default)]
pub struct CallCounts {
    parse: AtomicUsize,
    validate: AtomicUsize,
    execute: AtomicUsize,
}

/// Plain copy of [`CallCounts`] at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSnapshot {
    pub parse: usize,
    pub validate: usize,
    pub execute: usize,
}

impl CallCounts {
    pub fn parse(&self) -> usize {
        self.parse.load(Ordering::Relaxed)
    }

    pub fn validate(&self) -> usize {
        self.validate.load(Ordering::Relaxed)
    }

    pub fn execute(&self) -> usize {
        self.execute.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            parse: self.parse(),
            validate: self.validate(),
            execute: self.execute(),
        }
    }
}

#[derive(Debug)]
pub struct StubSchema {
    root: RootSpec,
}

/// The root field a query selects, which is all the stub looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubDocument {
    root_field: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StubResponse {
    data: serde_json::Value,
    errors: Vec<String>,
}

/// Deterministic test engine.
#[derive(Debug, Default)]
pub struct StubEngine {
    parse_cost: Duration,
    validate_cost: Duration,
    execute_cost: Duration,
    fault: Option<Fault>,
    calls: CallCounts,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spin for the given time inside every call to `stage`.
    /// `Full` is not a stage of its own and is ignored.
    pub fn with_cost(mut self, stage: Stage, cost: Duration) -> Self {
        match stage {
            Stage::Parse => self.parse_cost = cost,
            Stage::Validate => self.validate_cost = cost,
            Stage::Execute => self.execute_cost = cost,
            Stage::Full => {}
        }
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    fn maybe_panic(&self, stage: Stage) {
        if self.fault == Some(Fault::PanicAt(stage)) {
            panic!("stub engine fault injected at {} stage", stage);
        }
    }

    fn parse_text(&self, query: &str) -> Result<StubDocument, StubError> {
        let count = self.calls.parse.fetch_add(1, Ordering::Relaxed);
        self.maybe_panic(Stage::Parse);
        burn(self.parse_cost);

        if let Some(Fault::ParseErrorAfter(limit)) = self.fault {
            if count >= limit {
                return Err(StubError::Syntax(format!("injected failure on parse #{}", count + 1)));
            }
        }

        let mut depth = 0i64;
        for c in query.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return Err(StubError::Syntax("unexpected '}'".to_string()));
            }
        }
        if depth != 0 {
            return Err(StubError::Syntax("unbalanced braces".to_string()));
        }

        let body = query
            .split_once('{')
            .map(|(_, rest)| rest)
            .ok_or_else(|| StubError::Syntax("expected selection set".to_string()))?;
        let root_field: String = body
            .trim_start()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if root_field.is_empty() {
            return Err(StubError::Syntax("empty selection set".to_string()));
        }

        Ok(StubDocument { root_field })
    }

    fn violations(&self, schema: &StubSchema, document: &StubDocument) -> Vec<String> {
        self.calls.validate.fetch_add(1, Ordering::Relaxed);
        self.maybe_panic(Stage::Validate);
        burn(self.validate_cost);

        let field = document.root_field.as_str();
        if field.starts_with("__") || schema.root.field(field).is_some() {
            Vec::new()
        } else {
            vec![format!(
                "Unknown field \"{}\" on type \"{}\"",
                field, schema.root.type_name
            )]
        }
    }

    /// Execute a document assumed valid. Unknown fields resolve to `null`.
    fn resolve(&self, schema: &StubSchema, document: &StubDocument) -> StubResponse {
        self.calls.execute.fetch_add(1, Ordering::Relaxed);
        self.maybe_panic(Stage::Execute);
        burn(self.execute_cost);

        let field = document.root_field.as_str();
        let data = if field == "__schema" {
            serde_json::json!({ "__schema": { "queryType": { "name": schema.root.type_name } } })
        } else {
            let value = match (self.fault, schema.root.field(field)) {
                (_, None) => serde_json::Value::Null,
                (Some(Fault::WrongValue(value)), Some(_)) => value.into(),
                (_, Some(f)) => f.value.clone().into(),
            };
            serde_json::json!({ field: value })
        };

        StubResponse {
            data,
            errors: Vec::new(),
        }
    }
}

impl QueryEngine for StubEngine {
    type Schema = StubSchema;
    type Document = StubDocument;
    type Validation = Vec<String>;
    type Execution = StubResponse;
    type Error = StubError;

    fn build_schema(&self, root: &RootSpec) -> Result<StubSchema, StubError> {
        if self.fault == Some(Fault::RejectSchema) {
            return Err(StubError::Schema(format!(
                "type \"{}\" rejected by fault injection",
                root.type_name
            )));
        }
        Ok(StubSchema { root: root.clone() })
    }

    fn parse(&self, query: &str) -> Result<StubDocument, StubError> {
        self.parse_text(query)
    }

    fn validate(&self, schema: &StubSchema, document: &StubDocument) -> Vec<String> {
        self.violations(schema, document)
    }

    fn execute_document(
        &self,
        schema: &StubSchema,
        document: &StubDocument,
        _variables: &Variables,
    ) -> StubResponse {
        self.resolve(schema, document)
    }

    fn execute(&self, schema: &StubSchema, query: &str) -> StubResponse {
        self.maybe_panic(Stage::Full);
        match self.parse_text(query) {
            Ok(document) => {
                let errors = self.violations(schema, &document);
                if errors.is_empty() {
                    self.resolve(schema, &document)
                } else {
                    StubResponse {
                        data: serde_json::Value::Null,
                        errors,
                    }
                }
            }
            Err(e) => StubResponse {
                data: serde_json::Value::Null,
                errors: vec![e.to_string()],
            },
        }
    }

    fn validation_errors(&self, validation: &Vec<String>) -> Vec<String> {
        validation.clone()
    }

    fn execution_output(&self, execution: &StubResponse) -> ExecutionOutput {
        ExecutionOutput {
            data: execution.data.clone(),
            errors: execution.errors.clone(),
        }
    }
}

/// Spin (not sleep) so the cost shows up as CPU time, like real engine work.
fn burn(cost: Duration) {
    if cost.is_zero() {
        return;
    }
    let start = Instant::now();
    while start.elapsed() < cost {
        std::hint::spin_loop();
    }
}
