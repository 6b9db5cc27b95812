//! HTTP tests for the GraphQL exposure
//!
//! These tests verify that:
//! - Field errors come back inside a 200 with partial data
//! - Malformed request bodies are rejected before any resolver runs
//! - GET queries, health, schema and playground routes behave

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use swapi::prelude::*;

// =============================================================================
// Test Server
// =============================================================================

const SDL: &str = r#"
    type Query { hero(fail: Boolean = false): Hero }
    type Mutation { rename(name: String!): Hero }
    type Hero { name: String! }
"#;

/// Server over a tiny schema; the counter tracks calls of the `hero` resolver
///
/// `Hero.name` throws when the hero was fetched with `fail: true`.
fn create_test_server() -> (TestServer, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));

    let hero_calls = calls.clone();
    let schema = Schema::build(SDL)
        .resolver_fn("Query", "hero", move |ctx| {
            hero_calls.fetch_add(1, Ordering::SeqCst);
            async move {
                let fail = ctx.args.get_bool("fail").unwrap_or(false);
                Ok(json!({ "name": "Luke", "fail": fail }))
            }
        })
        .resolver_fn("Mutation", "rename", |ctx| async move {
            Ok(json!({ "name": ctx.args.require_str("name")? }))
        })
        .resolver_fn("Hero", "name", |ctx| async move {
            if ctx.parent_field("fail") == json!(true) {
                Err(FieldError::new("name unavailable"))
            } else {
                Ok(ctx.parent_field("name"))
            }
        })
        .build()
        .expect("schema should build");

    let app = ServerBuilder::new()
        .with_schema(schema)
        .build()
        .expect("router should build");
    let server = TestServer::try_new(app).expect("Failed to create test server");
    (server, calls)
}

async fn post_query(server: &TestServer, query: &str) -> (StatusCode, Value) {
    let response = server.post("/query").json(&json!({ "query": query })).await;
    (response.status_code(), response.json())
}

// =============================================================================
// POST /query
// =============================================================================

mod query_tests {
    use super::*;

    #[tokio::test]
    async fn test_hero_name() {
        let (server, _) = create_test_server();

        let (status, body) = post_query(&server, "{ hero { name } }").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "data": { "hero": { "name": "Luke" } } }));
    }

    #[tokio::test]
    async fn test_non_null_failure_nulls_parent() {
        let (server, _) = create_test_server();

        let (status, body) = post_query(&server, "{ hero(fail: true) { name } }").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!({ "hero": null }));
        let errors = body["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["message"], "name unavailable");
        assert_eq!(errors[0]["path"], json!(["hero", "name"]));
    }

    #[tokio::test]
    async fn test_variables_and_operation_name() {
        let (server, _) = create_test_server();

        let response = server
            .post("/query")
            .json(&json!({
                "query": "query A { hero { name } } mutation B($n: String!) { rename(name: $n) { name } }",
                "variables": { "n": "Han" },
                "operationName": "B",
            }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body, json!({ "data": { "rename": { "name": "Han" } } }));
    }

    #[tokio::test]
    async fn test_syntax_error_is_400() {
        let (server, _) = create_test_server();

        let (status, body) = post_query(&server, "{ hero { name }").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.get("data").is_none());
        assert_eq!(body["errors"][0]["extensions"]["code"], "GRAPHQL_PARSE_FAILED");
    }

    #[tokio::test]
    async fn test_validation_error_is_400() {
        let (server, calls) = create_test_server();

        let (status, body) = post_query(&server, "{ hero { height } }").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["extensions"]["code"], "GRAPHQL_VALIDATION_FAILED");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

// =============================================================================
// Transport errors
// =============================================================================

mod transport_tests {
    use super::*;

    #[tokio::test]
    async fn test_malformed_json_never_executes() {
        let (server, calls) = create_test_server();

        let response = server
            .post("/query")
            .text("{\"query\": \"{ hero { name } }\"")
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body.get("data").is_none());
        assert_eq!(body["errors"][0]["extensions"]["code"], "BAD_REQUEST");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_query_field_is_400() {
        let (server, calls) = create_test_server();

        let response = server.post("/query").json(&json!({ "variables": {} })).await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

// =============================================================================
// GET /query
// =============================================================================

mod get_tests {
    use super::*;

    #[tokio::test]
    async fn test_get_query() {
        let (server, _) = create_test_server();

        let response = server
            .get("/query")
            .add_query_param("query", "{ hero { name } }")
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["hero"]["name"], "Luke");
    }

    #[tokio::test]
    async fn test_get_empty_operation_name_is_ignored() {
        let (server, _) = create_test_server();

        let response = server
            .get("/query")
            .add_query_param("query", "query Hero { hero { name } }")
            .add_query_param("operationName", "")
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body, json!({ "data": { "hero": { "name": "Luke" } } }));
    }

    #[tokio::test]
    async fn test_get_mutation_is_405() {
        let (server, _) = create_test_server();

        let response = server
            .get("/query")
            .add_query_param("query", "mutation { rename(name: \"Han\") { name } }")
            .await;

        assert_eq!(response.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_get_bad_variables_is_400() {
        let (server, _) = create_test_server();

        let response = server
            .get("/query")
            .add_query_param("query", "{ hero { name } }")
            .add_query_param("variables", "[1, 2]")
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }
}

// =============================================================================
// Other routes
// =============================================================================

mod route_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let (server, _) = create_test_server();

        let response = server.get("/health").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_schema_sdl() {
        let (server, _) = create_test_server();

        let response = server.get("/schema").await;

        response.assert_status_ok();
        assert!(response.text().contains("type Hero"));
    }

    #[cfg(feature = "playground")]
    #[tokio::test]
    async fn test_playground() {
        let (server, _) = create_test_server();

        let response = server.get("/").await;

        response.assert_status_ok();
        let html = response.text();
        assert!(html.contains("<html"));
        assert!(html.contains("/query"));
    }

    #[tokio::test]
    async fn test_custom_paths() {
        let schema = Schema::build("type Query { ping: String }")
            .resolver("Query", "ping", ConstResolver::new(json!("pong")))
            .build()
            .unwrap();
        let config = ServerConfig {
            query_path: "/graphql".to_string(),
            playground_path: "/playground".to_string(),
            ..Default::default()
        };
        let app = ServerBuilder::new()
            .with_config(config)
            .with_schema(schema)
            .build()
            .unwrap();
        let server = TestServer::try_new(app).expect("Failed to create test server");

        let response = server
            .post("/graphql")
            .json(&json!({ "query": "{ ping }" }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body, json!({ "data": { "ping": "pong" } }));
    }
}

// =============================================================================
// Client disconnect
// =============================================================================

mod disconnect_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, header};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_dropped_request_cancels_resolvers() {
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let (cancelled_tx, cancelled_rx) = oneshot::channel::<()>();
        let senders = Arc::new(Mutex::new(Some((started_tx, cancelled_tx))));

        // The resolver never finishes; a watcher reports when its token fires
        let schema = Schema::build("type Query { wait: String }")
            .resolver_fn("Query", "wait", move |ctx| {
                let senders = senders.lock().unwrap().take();
                async move {
                    if let Some((started, cancelled)) = senders {
                        let token = ctx.cancellation.clone();
                        tokio::spawn(async move {
                            token.cancelled().await;
                            let _ = cancelled.send(());
                        });
                        let _ = started.send(());
                    }
                    futures::future::pending::<()>().await;
                    Ok(json!("unreachable"))
                }
            })
            .build()
            .expect("schema should build");

        let app = ServerBuilder::new()
            .with_schema(schema)
            .build()
            .expect("router should build");
        let request = HttpRequest::post("/query")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "query": "{ wait }" }).to_string()))
            .unwrap();

        let in_flight = tokio::spawn(app.oneshot(request));
        tokio::time::timeout(Duration::from_secs(5), started_rx)
            .await
            .expect("resolver should start")
            .unwrap();

        in_flight.abort();

        tokio::time::timeout(Duration::from_secs(5), cancelled_rx)
            .await
            .expect("resolver should observe the cancellation")
            .unwrap();
        assert!(in_flight.await.unwrap_err().is_cancelled());
    }
}
