//! Per-request execution state

use indexmap::IndexMap;
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

use super::ExecutionOptions;
use crate::core::GraphQLError;
use crate::query::{Directive, QueryTree};
use crate::schema::Schema;

/// State shared by every field of one request
///
/// Created when execution starts and dropped with the response. Sibling
/// fields running concurrently append to the same error list.
pub(crate) struct ExecutionContext<'a> {
    pub schema: &'a Schema,
    pub tree: &'a QueryTree,
    pub variables: IndexMap<String, Value>,
    pub options: &'a ExecutionOptions,
    pub cancellation: CancellationToken,
    errors: Mutex<Vec<GraphQLError>>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        schema: &'a Schema,
        tree: &'a QueryTree,
        variables: IndexMap<String, Value>,
        options: &'a ExecutionOptions,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            schema,
            tree,
            variables,
            options,
            cancellation,
            errors: Mutex::new(Vec::new()),
        }
    }

    /// Append a field error
    pub fn record(&self, error: GraphQLError) {
        tracing::debug!(path = %error.path, message = %error.message, "field error");
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error);
    }

    /// Errors recorded so far, in the order they were appended
    pub fn into_errors(self) -> Vec<GraphQLError> {
        self.errors
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Evaluate `@skip` and `@include` against the request variables
    pub fn should_include(&self, directives: &[Directive]) -> bool {
        directives.iter().all(|directive| {
            let condition = directive
                .argument("if")
                .map(|value| value.to_json(&self.variables))
                .and_then(|value| value.as_bool());

            match (directive.name.as_str(), condition) {
                ("skip", Some(true)) => false,
                ("include", Some(false)) => false,
                _ => true,
            }
        })
    }
}
