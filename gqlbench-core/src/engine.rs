// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! The query-engine seam.
//!
//! Everything the benchmark measures happens behind [`QueryEngine`]. The
//! harness never looks inside documents or results beyond the two inspection
//! hooks used by the precondition check.

use serde::{Deserialize, Serialize};

/// Variables passed to document execution. The probes always pass an empty map.
pub type Variables = serde_json::Map<String, serde_json::Value>;

/// A root-type field that always resolves to the same string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticField {
    pub name: String,
    pub value: String,
}

/// Description of the query root handed to [`QueryEngine::build_schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootSpec {
    pub type_name: String,
    pub fields: Vec<StaticField>,
}

impl RootSpec {
    /// A root type with a single constant string field.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn static_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(StaticField {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn field(&self, name: &str) -> Option<&StaticField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// JSON view of an execution result, used only to check preconditions.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutput {
    pub data: serde_json::Value,
    pub errors: Vec<String>,
}

/// A GraphQL engine exposing its pipeline stages separately.
///
/// `execute` runs the whole pipeline from raw text. `execute_document` starts
/// from an already parsed document; engines are free to re-run validation
/// inside it.
pub trait QueryEngine {
    type Schema;
    type Document: std::fmt::Debug;
    type Validation;
    type Execution;
    type Error: std::error::Error + Send + Sync + 'static;

    fn build_schema(&self, root: &RootSpec) -> Result<Self::Schema, Self::Error>;

    fn parse(&self, query: &str) -> Result<Self::Document, Self::Error>;

    fn validate(&self, schema: &Self::Schema, document: &Self::Document) -> Self::Validation;

    fn execute_document(
        &self,
        schema: &Self::Schema,
        document: &Self::Document,
        variables: &Variables,
    ) -> Self::Execution;

    fn execute(&self, schema: &Self::Schema, query: &str) -> Self::Execution;

    /// Violation messages carried by a validation result; empty when valid.
    fn validation_errors(&self, validation: &Self::Validation) -> Vec<String>;

    fn execution_output(&self, execution: &Self::Execution) -> ExecutionOutput;
}
