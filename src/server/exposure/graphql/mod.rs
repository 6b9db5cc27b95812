//! GraphQL HTTP exposure
//!
//! Routes, all relative to the configured paths:
//! - `POST {query_path}`: JSON body `{query, variables?, operationName?}`
//! - `GET {query_path}?query=...`: queries only, mutations are refused
//! - `GET {playground_path}`: GraphQL Playground (feature `playground`)
//! - `GET {schema_path}`: the schema SDL
//! - `GET /health`
//!
//! Anything that reached execution is answered `200` with `{data, errors?}`;
//! requests rejected before execution get a 4xx with `{errors}` only.

use crate::core::{EngineError, RequestError};
use crate::execution::Request;
use crate::query::{self, OperationKind};
use crate::response::{self, Response};
use crate::server::host::ServerHost;
use anyhow::Result;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Extension, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response as HttpResponse},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[cfg(feature = "playground")]
use async_graphql::http::{GraphQLPlaygroundConfig, playground_source};
#[cfg(feature = "playground")]
use axum::response::Html;

/// Query string of `GET {query_path}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphQLGetParams {
    query: Option<String>,
    variables: Option<String>,
    operation_name: Option<String>,
}

/// GraphQL exposure implementation
pub struct GraphQLExposure;

impl GraphQLExposure {
    /// Build the router from a host
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let host = Arc::new(builder.build_host()?);
    /// let app = GraphQLExposure::build_router(host, Vec::new())?;
    /// ```
    pub fn build_router(host: Arc<ServerHost>, custom_routes: Vec<Router>) -> Result<Router> {
        let config = host.config.clone();

        let mut router = Router::new()
            .route(
                &config.query_path,
                post(graphql_handler).get(graphql_get_handler),
            )
            .route(&config.schema_path, get(graphql_schema))
            .route("/health", get(health_check));

        #[cfg(feature = "playground")]
        {
            router = router.route(&config.playground_path, get(graphql_playground));
        }

        for custom_router in custom_routes {
            router = router.merge(custom_router);
        }

        let mut router = router
            .layer(Extension(host))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

        if config.cors {
            router = router.layer(CorsLayer::permissive());
        }

        Ok(router)
    }
}

/// Handler for `POST {query_path}`
///
/// The body is decoded by hand so that malformed JSON is answered with a
/// GraphQL-shaped error instead of axum's plain-text rejection.
async fn graphql_handler(
    Extension(host): Extension<Arc<ServerHost>>,
    body: Bytes,
) -> HttpResponse {
    let request: Request = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "rejecting malformed request body");
            return EngineError::from(RequestError::InvalidBody {
                message: e.to_string(),
            })
            .into_response();
        }
    };

    // Cancels in-flight resolvers when the client disconnects and axum drops this future
    let cancellation = CancellationToken::new();
    let _guard = cancellation.clone().drop_guard();

    match host.executor.execute(request, cancellation).await {
        Ok(response) => json_response(&response),
        Err(e) => error_response(e),
    }
}

/// Handler for `GET {query_path}`
async fn graphql_get_handler(
    Extension(host): Extension<Arc<ServerHost>>,
    Query(params): Query<GraphQLGetParams>,
) -> HttpResponse {
    match execute_get(&host, params).await {
        Ok(response) => json_response(&response),
        Err(e) => error_response(e),
    }
}

async fn execute_get(host: &ServerHost, params: GraphQLGetParams) -> Result<Response, EngineError> {
    let text = params.query.ok_or_else(|| RequestError::InvalidBody {
        message: "missing 'query' parameter".to_string(),
    })?;

    let variables = match params.variables.as_deref().filter(|v| !v.is_empty()) {
        Some(raw) => Some(
            serde_json::from_str::<Map<String, Value>>(raw).map_err(|e| {
                RequestError::InvalidBody {
                    message: format!("'variables' is not a JSON object: {}", e),
                }
            })?,
        ),
        None => None,
    };

    let tree = query::parse(&text)?;
    let operation_name = params.operation_name.as_deref().filter(|n| !n.is_empty());
    if tree.operation(operation_name)?.kind == OperationKind::Mutation {
        return Err(RequestError::MutationOverGet.into());
    }

    let cancellation = CancellationToken::new();
    let _guard = cancellation.clone().drop_guard();

    let result = host
        .executor
        .execute_operation(
            &tree,
            operation_name,
            variables,
            Value::Object(Map::new()),
            cancellation,
        )
        .await?;
    Ok(Response::from(result))
}

fn json_response(response: &Response) -> HttpResponse {
    match response::encode(response) {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            bytes,
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(error: EngineError) -> HttpResponse {
    if error.status_code().is_server_error() {
        tracing::warn!(error = %error, code = error.error_code(), "request failed");
    } else {
        tracing::debug!(error = %error, code = error.error_code(), "request rejected");
    }
    error.into_response()
}

#[cfg(feature = "playground")]
/// Handler for the GraphQL playground UI
async fn graphql_playground(Extension(host): Extension<Arc<ServerHost>>) -> impl IntoResponse {
    Html(playground_source(
        GraphQLPlaygroundConfig::new(&host.config.query_path).title(&host.config.playground_title),
    ))
}

/// Handler for GraphQL schema SDL export
async fn graphql_schema(Extension(host): Extension<Arc<ServerHost>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        host.schema.sdl().to_string(),
    )
}

/// Health check endpoint handler
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
