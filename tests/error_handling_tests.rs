//! Tests for the typed error handling system
//!
//! These tests verify that:
//! - Errors return correct HTTP status codes
//! - Error responses are GraphQL-shaped
//! - Field errors convert from the usual error sources

use axum::body::to_bytes;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value, json};
use swapi::core::{RequestError, SyntaxError};
use swapi::prelude::*;

// =============================================================================
// HTTP Status Code Tests
// =============================================================================

mod status_code_tests {
    use super::*;

    #[test]
    fn test_syntax_error_returns_400() {
        let err = EngineError::Syntax(SyntaxError {
            message: "Unexpected end of input".to_string(),
            location: Some(Location::new(1, 16)),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "GRAPHQL_PARSE_FAILED");
    }

    #[test]
    fn test_validation_error_returns_400() {
        let err = EngineError::Validation(vec![GraphQLError::new("Cannot query field")]);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_mutation_over_get_returns_405() {
        let err = EngineError::from(RequestError::MutationOverGet);
        assert_eq!(err.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_timeout_returns_504() {
        let err = EngineError::Timeout { timeout_ms: 100 };
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.to_string(), "Request timed out after 100ms");
    }

    #[test]
    fn test_cancelled_returns_503() {
        assert_eq!(
            EngineError::Cancelled.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_internal_returns_500() {
        let err = EngineError::Internal("encoder failed".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

// =============================================================================
// Response Body Tests
// =============================================================================

mod response_tests {
    use super::*;

    async fn body_of(err: EngineError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_error_response_has_no_data() {
        let (status, body) = body_of(EngineError::from(RequestError::AmbiguousOperation)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.get("data").is_none());
        assert_eq!(body["errors"][0]["extensions"]["code"], "AMBIGUOUS_OPERATION");
    }

    #[tokio::test]
    async fn test_each_validation_error_is_listed() {
        let err = EngineError::Validation(vec![
            GraphQLError::new("first").with_location(Location::new(1, 3)),
            GraphQLError::new("second"),
        ]);

        let (_, body) = body_of(err).await;

        let errors = body["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0]["locations"], json!([{ "line": 1, "column": 3 }]));
        assert_eq!(errors[1]["extensions"]["code"], "GRAPHQL_VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn test_invalid_variables_list_each_message() {
        let err = EngineError::from(RequestError::InvalidVariables {
            messages: vec!["a".to_string(), "b".to_string()],
        });

        let (_, body) = body_of(err).await;

        assert_eq!(body["errors"].as_array().unwrap().len(), 2);
        assert_eq!(body["errors"][1]["message"], "b");
    }
}

// =============================================================================
// Field Error Conversion Tests
// =============================================================================

mod field_error_tests {
    use super::*;

    #[test]
    fn test_from_anyhow() {
        let err: FieldError = anyhow::anyhow!("database unavailable").into();
        assert_eq!(err.message, "database unavailable");
        assert!(err.extensions.is_none());
    }

    #[test]
    fn test_from_str_and_string() {
        assert_eq!(FieldError::from("boom").message, "boom");
        assert_eq!(FieldError::from(String::from("bang")).message, "bang");
    }

    #[test]
    fn test_extensions() {
        let err = FieldError::new("nope").with_extension("code", "FORBIDDEN");
        assert_eq!(
            err.extensions.unwrap().get("code"),
            Some(&json!("FORBIDDEN"))
        );
    }
}
