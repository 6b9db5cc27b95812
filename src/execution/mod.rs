//! Query execution
//!
//! [`Executor`] runs a request end to end: parse, operation selection,
//! validation, variable coercion and the walk over the selection sets. Field
//! errors never abort the walk; they are recorded next to a partial result.
//! Deadlines and cancellation on the other hand abort the whole request.
//!
//! # Example
//!
//! ```rust,ignore
//! let executor = Executor::new(Arc::new(schema));
//! let response = executor
//!     .execute(Request::new("{ hero { name } }"), CancellationToken::new())
//!     .await?;
//! assert_eq!(serde_json::to_value(&response)?, json!({ "data": { "hero": { "name": "R2-D2" } } }));
//! ```

mod coerce;
mod context;
mod meta;
mod resolve;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::core::{EngineError, GraphQLError, RequestError, ResponsePath};
use crate::query::{self, OperationKind, QueryTree};
use crate::response::Response;
use crate::schema::Schema;
use crate::validation::{self, ValidationOptions};
use context::ExecutionContext;
use resolve::NullBubble;

pub use resolve::codes;

/// A GraphQL request envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
            operation_name: None,
        }
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }
}

/// Tunables of the executor
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Deadline for the whole execution, none when unset
    pub timeout: Option<Duration>,

    /// Maximum number of sibling fields or list items resolved at once
    pub max_concurrency: usize,

    /// Answer `__schema` and `__type`
    pub introspection: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            max_concurrency: 16,
            introspection: true,
        }
    }
}

/// Outcome of an execution that got past validation
///
/// `data` is `None` when a failure propagated up to the root.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub data: Option<Value>,
    pub errors: Vec<GraphQLError>,
}

/// Executes requests against a schema
#[derive(Debug, Clone)]
pub struct Executor {
    schema: Arc<Schema>,
    options: ExecutionOptions,
}

impl Executor {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            options: ExecutionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Run a request from text to response
    pub async fn execute(
        &self,
        request: Request,
        cancellation: CancellationToken,
    ) -> Result<Response, EngineError> {
        let tree = query::parse(&request.query)?;
        let result = self
            .execute_operation(
                &tree,
                request.operation_name.as_deref(),
                request.variables,
                Value::Object(Map::new()),
                cancellation,
            )
            .await?;
        Ok(Response::from(result))
    }

    /// Execute one operation of a parsed document
    pub async fn execute_operation(
        &self,
        tree: &QueryTree,
        operation_name: Option<&str>,
        variables: Option<Map<String, Value>>,
        root_value: Value,
        cancellation: CancellationToken,
    ) -> Result<ExecutionResult, EngineError> {
        let operation = tree.operation(operation_name)?;

        if operation.kind == OperationKind::Subscription {
            return Err(RequestError::UnsupportedOperation {
                kind: operation.kind.as_str().to_string(),
            }
            .into());
        }

        validation::validate_with(
            &self.schema,
            tree,
            ValidationOptions {
                introspection: self.options.introspection,
            },
        )
        .map_err(EngineError::Validation)?;

        let variables =
            coerce::coerce_variables(&self.schema, operation, &variables.unwrap_or_default())
                .map_err(|messages| RequestError::InvalidVariables { messages })?;

        let root_type = match operation.kind {
            OperationKind::Mutation => self.schema.mutation_type().ok_or_else(|| {
                EngineError::Internal("schema has no mutation root".to_string())
            })?,
            _ => self.schema.query_type(),
        };

        tracing::debug!(
            operation = operation.name.as_deref().unwrap_or("<anonymous>"),
            kind = operation.kind.as_str(),
            "executing operation"
        );

        let ctx = ExecutionContext::new(
            &self.schema,
            tree,
            variables,
            &self.options,
            cancellation.child_token(),
        );

        let run = resolve::execute_selection_set(
            &ctx,
            root_type,
            Arc::new(root_value),
            vec![&operation.selection_set],
            ResponsePath::root(),
            operation.kind == OperationKind::Mutation,
        );

        let outcome: Result<Result<Value, NullBubble>, EngineError> = match self.options.timeout {
            Some(limit) => tokio::select! {
                biased;
                _ = cancellation.cancelled() => Err(EngineError::Cancelled),
                result = tokio::time::timeout(limit, run) => result.map_err(|_| EngineError::Timeout {
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                }),
            },
            None => tokio::select! {
                biased;
                _ = cancellation.cancelled() => Err(EngineError::Cancelled),
                result = run => Ok(result),
            },
        };

        match outcome {
            Ok(data) => Ok(ExecutionResult {
                data: data.ok(),
                errors: ctx.into_errors(),
            }),
            Err(err) => {
                ctx.cancellation.cancel();
                tracing::warn!(error = %err, "execution aborted");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FieldError, PathSegment};
    use crate::schema::{ConstResolver, ResolverContext};
    use serde_json::json;

    const SDL: &str = r#"
        type Query {
            hero: Character
            heroes: [Character!]!
            greeting(name: String = "stranger"): String!
        }
        type Character { name: String! nickname: String }
    "#;

    fn executor(name: Result<&'static str, &'static str>) -> Executor {
        let schema = Schema::build(SDL)
            .resolver("Query", "hero", ConstResolver::new(json!({})))
            .resolver(
                "Query",
                "heroes",
                ConstResolver::new(json!([{}])),
            )
            .resolver_fn("Query", "greeting", |ctx: ResolverContext| async move {
                let name = ctx.args.require_str("name")?.to_string();
                Ok::<_, FieldError>(json!(format!("Hello, {}", name)))
            })
            .resolver_fn("Character", "name", move |_ctx: ResolverContext| async move {
                name.map(Value::from).map_err(FieldError::from)
            })
            .resolver("Character", "nickname", ConstResolver::new(Value::Null))
            .build()
            .expect("schema should build");
        Executor::new(Arc::new(schema))
    }

    async fn run(executor: &Executor, query: &str) -> Response {
        executor
            .execute(Request::new(query), CancellationToken::new())
            .await
            .expect("request should execute")
    }

    #[tokio::test]
    async fn test_execute_simple_query() {
        let response = run(&executor(Ok("Luke")), "{ hero { name } }").await;
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "data": { "hero": { "name": "Luke" } } })
        );
    }

    #[tokio::test]
    async fn test_non_null_error_nulls_nullable_parent() {
        let response = run(&executor(Err("boom")), "{ hero { name nickname } }").await;
        assert_eq!(response.data, Some(json!({ "hero": null })));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "boom");
        assert_eq!(
            response.errors[0].path.segments(),
            &[
                PathSegment::Field("hero".to_string()),
                PathSegment::Field("name".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_non_null_error_reaching_root_nulls_data() {
        let response = run(&executor(Err("boom")), "{ heroes { name } }").await;
        assert_eq!(response.data, Some(Value::Null));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].path.to_string(), "heroes[0].name");
    }

    #[tokio::test]
    async fn test_argument_default() {
        let response = run(&executor(Ok("Luke")), "{ greeting }").await;
        assert_eq!(response.data, Some(json!({ "greeting": "Hello, stranger" })));
    }

    #[tokio::test]
    async fn test_typename_and_aliases() {
        let response = run(
            &executor(Ok("Luke")),
            "{ first: hero { __typename n: name } hero { name } }",
        )
        .await;
        assert_eq!(
            response.data,
            Some(json!({
                "first": { "__typename": "Character", "n": "Luke" },
                "hero": { "name": "Luke" }
            }))
        );
    }

    #[tokio::test]
    async fn test_syntax_error_is_request_error() {
        let err = executor(Ok("Luke"))
            .execute(Request::new("{ hero { name }"), CancellationToken::new())
            .await
            .expect_err("syntax error");
        assert!(matches!(err, EngineError::Syntax(_)));
    }

    #[tokio::test]
    async fn test_validation_error_is_request_error() {
        let err = executor(Ok("Luke"))
            .execute(Request::new("{ villain }"), CancellationToken::new())
            .await
            .expect_err("validation error");
        assert!(matches!(err, EngineError::Validation(ref errors) if errors.len() == 1));
    }

    #[tokio::test]
    async fn test_subscription_rejected() {
        let err = executor(Ok("Luke"))
            .execute(
                Request::new("subscription { hero { name } }"),
                CancellationToken::new(),
            )
            .await
            .expect_err("subscriptions are unsupported");
        assert_eq!(err.error_code(), "UNSUPPORTED_OPERATION");
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let err = executor(Ok("Luke"))
            .execute(Request::new("{ hero { name } }"), token)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, EngineError::Cancelled));
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let request: Request = serde_json::from_value(json!({
            "query": "query Hero { hero { name } }",
            "operationName": "Hero",
            "variables": { "episode": "JEDI" }
        }))
        .unwrap();
        assert_eq!(request.operation_name.as_deref(), Some("Hero"));
        assert_eq!(request.variables.unwrap()["episode"], json!("JEDI"));
    }
}
