// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! [`QueryEngine`] backed by async-graphql.
//!
//! async-graphql only exposes its pipeline as a whole (`Schema::execute`), so
//! the individual stages are reached through a schema extension:
//!
//! - a request carrying a [`Preparsed`] document skips the parser and hands
//!   the document straight to validation;
//! - a request carrying [`StopAfterValidation`] returns as soon as validation
//!   passes, without resolving a single field.
//!
//! The parser hook hands over an owned [`ExecutableDocument`], so both the
//! validate and the execute stage include one deep clone of the pre-parsed
//! document per call.
//!
//! Futures are driven on a private current-thread runtime, so every call is
//! synchronous from the caller's point of view.

use std::sync::Arc;

use async_graphql::dynamic::{Field, FieldFuture, Object, Schema, TypeRef};
use async_graphql::extensions::{
    Extension, ExtensionContext, ExtensionFactory, NextExecute, NextParseQuery,
};
use async_graphql::parser::types::ExecutableDocument;
use async_graphql::{Request, Response, ServerResult, Value};
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};

use crate::engine::{ExecutionOutput, QueryEngine, RootSpec, Variables};

/// Errors raised by the async-graphql adapter.
///
/// Messages are async-graphql's own, unaltered.
#[derive(Debug, Error)]
pub enum GraphqlEngineError {
    #[error("Failed to start executor runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("Schema rejected: {message}")]
    Schema { message: String },

    #[error("Parse error: {message}")]
    Parse { message: String },
}

/// Request data: use this document instead of parsing the request text.
struct Preparsed(Arc<ExecutableDocument>);

/// Request data: skip execution once validation has passed.
struct StopAfterValidation;

struct StageControl;

impl ExtensionFactory for StageControl {
    fn create(&self) -> Arc<dyn Extension> {
        Arc::new(StageControlExtension)
    }
}

struct StageControlExtension;

#[async_trait::async_trait]
impl Extension for StageControlExtension {
    async fn parse_query(
        &self,
        ctx: &ExtensionContext<'_>,
        query: &str,
        variables: &async_graphql::Variables,
        next: NextParseQuery<'_>,
    ) -> ServerResult<ExecutableDocument> {
        match ctx.data_opt::<Preparsed>() {
            // Paid by every validate and execute call.
            Some(Preparsed(document)) => Ok(ExecutableDocument::clone(document)),
            None => next.run(ctx, query, variables).await,
        }
    }

    async fn execute(
        &self,
        ctx: &ExtensionContext<'_>,
        operation_name: Option<&str>,
        next: NextExecute<'_>,
    ) -> Response {
        if ctx.data_opt::<StopAfterValidation>().is_some() {
            return Response::new(Value::Null);
        }
        next.run(ctx, operation_name).await
    }
}

/// async-graphql adapter. Schemas are built with the dynamic schema API so
/// the root type comes from a [`RootSpec`] rather than Rust types.
pub struct GraphqlEngine {
    runtime: Runtime,
}

impl GraphqlEngine {
    pub fn new() -> Result<Self, GraphqlEngineError> {
        let runtime = Builder::new_current_thread().build()?;
        Ok(Self { runtime })
    }

    fn run(&self, schema: &Schema, request: Request) -> Response {
        self.runtime.block_on(schema.execute(request))
    }
}

impl QueryEngine for GraphqlEngine {
    type Schema = Schema;
    type Document = Arc<ExecutableDocument>;
    type Validation = Response;
    type Execution = Response;
    type Error = GraphqlEngineError;

    fn build_schema(&self, root: &RootSpec) -> Result<Schema, GraphqlEngineError> {
        let mut object = Object::new(root.type_name.as_str());
        for field in &root.fields {
            let value = field.value.clone();
            object = object.field(Field::new(
                field.name.as_str(),
                TypeRef::named_nn(TypeRef::STRING),
                move |_| {
                    let value = value.clone();
                    FieldFuture::new(async move { Ok(Some(Value::from(value))) })
                },
            ));
        }

        Schema::build(root.type_name.as_str(), None, None)
            .register(object)
            .extension(StageControl)
            .finish()
            .map_err(|e| GraphqlEngineError::Schema {
                message: e.to_string(),
            })
    }

    fn parse(&self, query: &str) -> Result<Self::Document, GraphqlEngineError> {
        async_graphql::parser::parse_query(query)
            .map(Arc::new)
            .map_err(|e| GraphqlEngineError::Parse {
                message: e.to_string(),
            })
    }

    fn validate(&self, schema: &Schema, document: &Self::Document) -> Response {
        let request = Request::new("")
            .data(Preparsed(Arc::clone(document)))
            .data(StopAfterValidation);
        self.run(schema, request)
    }

    fn execute_document(
        &self,
        schema: &Schema,
        document: &Self::Document,
        variables: &Variables,
    ) -> Response {
        let request = Request::new("")
            .variables(async_graphql::Variables::from_json(
                serde_json::Value::Object(variables.clone()),
            ))
            .data(Preparsed(Arc::clone(document)));
        self.run(schema, request)
    }

    fn execute(&self, schema: &Schema, query: &str) -> Response {
        self.run(schema, Request::new(query))
    }

    fn validation_errors(&self, validation: &Response) -> Vec<String> {
        validation.errors.iter().map(|e| e.message.clone()).collect()
    }

    fn execution_output(&self, execution: &Response) -> ExecutionOutput {
        ExecutionOutput {
            data: execution
                .data
                .clone()
                .into_json()
                .unwrap_or(serde_json::Value::Null),
            errors: execution.errors.iter().map(|e| e.message.clone()).collect(),
        }
    }
}
