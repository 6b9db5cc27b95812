//! Typed error handling for the GraphQL engine
//!
//! Errors fall in two families:
//!
//! - Request-level errors ([`EngineError`]) abort a request before or during
//!   execution and are answered with a non-2xx status and an `errors` list
//!   without `data`.
//! - Field-level errors ([`FieldError`]) are returned by resolvers. The
//!   executor records them as [`GraphQLError`] entries next to a partial
//!   `data` tree and never aborts sibling fields because of them.
//!
//! Startup errors ([`SchemaBuildError`], [`ConfigError`]) are fatal: the
//! server refuses to bind when one occurs.
//!
//! # Example
//!
//! ```rust,ignore
//! use swapi::prelude::*;
//!
//! match executor.execute(request, CancellationToken::new()).await {
//!     Ok(response) => println!("{}", serde_json::to_string(&response)?),
//!     Err(EngineError::Syntax(e)) => eprintln!("bad query at {:?}: {}", e.location, e),
//!     Err(e) => eprintln!("request failed ({}): {}", e.error_code(), e),
//! }
//! ```

use crate::core::path::ResponsePath;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response as HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// =============================================================================
// Wire-level error entries
// =============================================================================

/// A 1-based line/column position in the query text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl From<graphql_parser::Pos> for Location {
    fn from(pos: graphql_parser::Pos) -> Self {
        Self::new(pos.line, pos.column)
    }
}

/// One entry of the `errors` array of a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    /// Human-readable message
    pub message: String,

    /// Positions in the query text the error refers to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,

    /// Path of the field the error is attributed to
    #[serde(default, skip_serializing_if = "ResponsePath::is_empty")]
    pub path: ResponsePath,

    /// Machine-readable details (`code` at minimum)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: ResponsePath::root(),
            extensions: None,
        }
    }

    pub fn with_path(mut self, path: ResponsePath) -> Self {
        self.path = path;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    pub fn with_locations(mut self, locations: impl IntoIterator<Item = Location>) -> Self {
        self.locations.extend(locations);
        self
    }

    /// Set `extensions.code`, keeping any other extension entries
    pub fn with_code(mut self, code: &str) -> Self {
        self.extensions
            .get_or_insert_with(Map::new)
            .insert("code".to_string(), Value::String(code.to_string()));
        self
    }

    /// The `extensions.code` entry, if any
    pub fn code(&self) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .and_then(Value::as_str)
    }
}

impl fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} (at {})", self.message, self.path)
        }
    }
}

// =============================================================================
// Field errors
// =============================================================================

/// Error returned by a resolver
///
/// The executor attaches the path and location of the failing field when it
/// records the error, so resolvers only provide the message and optional
/// extensions.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub message: String,
    pub extensions: Option<Map<String, Value>>,
}

/// Result type returned by resolvers
pub type FieldResult<T> = Result<T, FieldError>;

impl FieldError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extensions: None,
        }
    }

    /// Attach an extension entry that will be copied into the response
    pub fn with_extension(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extensions
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
        self
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FieldError {}

impl From<anyhow::Error> for FieldError {
    fn from(err: anyhow::Error) -> Self {
        FieldError::new(err.to_string())
    }
}

impl From<String> for FieldError {
    fn from(message: String) -> Self {
        FieldError::new(message)
    }
}

impl From<&str> for FieldError {
    fn from(message: &str) -> Self {
        FieldError::new(message)
    }
}

impl From<serde_json::Error> for FieldError {
    fn from(err: serde_json::Error) -> Self {
        FieldError::new(err.to_string())
    }
}

// =============================================================================
// Startup errors
// =============================================================================

/// Malformed query text
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Syntax error: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub location: Option<Location>,
}

/// Errors raised while building a [`Schema`](crate::schema::Schema)
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaBuildError {
    #[error("Failed to parse schema definition: {0}")]
    Parse(String),

    #[error("Type '{name}' is declared more than once with conflicting shapes")]
    ConflictingType { name: String },

    #[error("Invalid name '{name}': {message}")]
    InvalidName { name: String, message: String },

    #[error("Unknown type '{name}' referenced by {referenced_by}")]
    UnknownType { name: String, referenced_by: String },

    #[error("Type '{ty}' cannot be used as {position} in {referenced_by}")]
    InvalidTypePosition {
        ty: String,
        position: &'static str,
        referenced_by: String,
    },

    #[error("Invalid interface implementation: {0}")]
    InvalidImplementation(String),

    #[error("Root type '{name}' is missing or not an object type")]
    InvalidRootType { name: String },

    #[error("Fields without a bound resolver: {}", .0.join(", "))]
    MissingResolvers(Vec<String>),

    #[error("Resolver bound to unknown field '{type_name}.{field_name}'")]
    UnknownField {
        type_name: String,
        field_name: String,
    },
}

/// Errors raised while loading or validating [`ServerConfig`](crate::config::ServerConfig)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

// =============================================================================
// Request errors
// =============================================================================

/// Errors in the request envelope or operation selection
#[derive(Debug, Clone, PartialEq)]
pub enum RequestError {
    /// The body is not a valid GraphQL request
    InvalidBody { message: String },

    /// `operationName` does not match any operation of the document
    UnknownOperation { name: String },

    /// Several operations and no `operationName`
    AmbiguousOperation,

    /// The document contains fragments only
    NoOperation,

    /// Operation kind the engine does not execute (subscriptions)
    UnsupportedOperation { kind: String },

    /// Mutation sent over `GET`
    MutationOverGet,

    /// Variable values that could not be coerced
    InvalidVariables { messages: Vec<String> },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::InvalidBody { message } => {
                write!(f, "Invalid request body: {}", message)
            }
            RequestError::UnknownOperation { name } => {
                write!(f, "Unknown operation named '{}'", name)
            }
            RequestError::AmbiguousOperation => {
                write!(f, "Must provide operation name if query contains multiple operations")
            }
            RequestError::NoOperation => write!(f, "No operation found in query"),
            RequestError::UnsupportedOperation { kind } => {
                write!(f, "{} operations are not supported", kind)
            }
            RequestError::MutationOverGet => {
                write!(f, "Mutations are not allowed over GET requests")
            }
            RequestError::InvalidVariables { messages } => {
                write!(f, "Invalid variables: {}", messages.join("; "))
            }
        }
    }
}

impl std::error::Error for RequestError {}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::MutationOverGet => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::InvalidBody { .. } => "BAD_REQUEST",
            RequestError::UnknownOperation { .. } => "UNKNOWN_OPERATION",
            RequestError::AmbiguousOperation => "AMBIGUOUS_OPERATION",
            RequestError::NoOperation => "NO_OPERATION",
            RequestError::UnsupportedOperation { .. } => "UNSUPPORTED_OPERATION",
            RequestError::MutationOverGet => "METHOD_NOT_ALLOWED",
            RequestError::InvalidVariables { .. } => "BAD_USER_INPUT",
        }
    }
}

impl From<RequestError> for EngineError {
    fn from(err: RequestError) -> Self {
        EngineError::Request(err)
    }
}

// =============================================================================
// Engine error
// =============================================================================

/// Request-level error of the engine
///
/// Any of these aborts the whole request: no partial `data` is produced.
#[derive(Debug)]
pub enum EngineError {
    /// Query text could not be parsed
    Syntax(SyntaxError),

    /// Query does not fit the schema
    Validation(Vec<GraphQLError>),

    /// Envelope or operation selection errors
    Request(RequestError),

    /// Schema could not be built (startup only)
    SchemaBuild(SchemaBuildError),

    /// Execution exceeded the configured deadline
    Timeout { timeout_ms: u64 },

    /// Execution was cancelled, typically because the client went away
    Cancelled,

    /// Internal engine errors (should not happen in normal operation)
    Internal(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Syntax(e) => write!(f, "{}", e),
            EngineError::Validation(errors) => {
                let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
                write!(f, "Validation failed: {}", messages.join("; "))
            }
            EngineError::Request(e) => write!(f, "{}", e),
            EngineError::SchemaBuild(e) => write!(f, "{}", e),
            EngineError::Timeout { timeout_ms } => {
                write!(f, "Request timed out after {}ms", timeout_ms)
            }
            EngineError::Cancelled => write!(f, "Request was cancelled"),
            EngineError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Syntax(e) => Some(e),
            EngineError::Request(e) => Some(e),
            EngineError::SchemaBuild(e) => Some(e),
            _ => None,
        }
    }
}

impl EngineError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::Syntax(_) => StatusCode::BAD_REQUEST,
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::Request(e) => e.status_code(),
            EngineError::SchemaBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            EngineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::Syntax(_) => "GRAPHQL_PARSE_FAILED",
            EngineError::Validation(_) => "GRAPHQL_VALIDATION_FAILED",
            EngineError::Request(e) => e.error_code(),
            EngineError::SchemaBuild(_) => "SCHEMA_BUILD_FAILED",
            EngineError::Timeout { .. } => "TIMEOUT",
            EngineError::Cancelled => "CANCELLED",
            EngineError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Convert to the entries of an `errors` array
    pub fn to_graphql_errors(&self) -> Vec<GraphQLError> {
        match self {
            EngineError::Validation(errors) => errors
                .iter()
                .cloned()
                .map(|e| e.with_code(self.error_code()))
                .collect(),
            EngineError::Syntax(e) => {
                vec![
                    GraphQLError::new(self.to_string())
                        .with_locations(e.location)
                        .with_code(self.error_code()),
                ]
            }
            EngineError::Request(RequestError::InvalidVariables { messages }) => messages
                .iter()
                .map(|m| GraphQLError::new(m.clone()).with_code(self.error_code()))
                .collect(),
            _ => vec![GraphQLError::new(self.to_string()).with_code(self.error_code())],
        }
    }
}

impl From<SyntaxError> for EngineError {
    fn from(err: SyntaxError) -> Self {
        EngineError::Syntax(err)
    }
}

impl From<SchemaBuildError> for EngineError {
    fn from(err: SchemaBuildError) -> Self {
        EngineError::SchemaBuild(err)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Internal(err.to_string())
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> HttpResponse {
        let status = self.status_code();
        let body = Json(crate::response::Response::from_errors(
            self.to_graphql_errors(),
        ));
        (status, body).into_response()
    }
}

// =============================================================================
// Tests
// =============================================================================
