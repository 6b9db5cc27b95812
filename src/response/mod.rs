//! Response encoding
//!
//! The wire shape is `{"data": ..., "errors": [...]}`. `data` is absent
//! when the request failed before execution and present (possibly `null`)
//! once execution started; `errors` is omitted when empty.

use serde::Serialize;
use serde_json::Value;

use crate::core::{EngineError, GraphQLError};
use crate::execution::ExecutionResult;

/// A GraphQL response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
}

impl Response {
    /// Response of a request rejected before execution
    pub fn from_errors(errors: Vec<GraphQLError>) -> Self {
        Self { data: None, errors }
    }
}

impl From<ExecutionResult> for Response {
    fn from(result: ExecutionResult) -> Self {
        Self {
            data: Some(result.data.unwrap_or(Value::Null)),
            errors: result.errors,
        }
    }
}

/// Serialize a response to JSON bytes
pub fn encode(response: &Response) -> Result<Vec<u8>, EngineError> {
    Ok(serde_json::to_vec(response)?)
}
