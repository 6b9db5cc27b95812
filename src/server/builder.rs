//! ServerBuilder for fluent API to build HTTP servers

use super::exposure::GraphQLExposure;
use super::host::ServerHost;
use crate::config::ServerConfig;
use crate::schema::{Schema, SchemaBuilder};
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder for creating the GraphQL HTTP server
///
/// # Example
///
/// ```ignore
/// ServerBuilder::new()
///     .with_config(ServerConfig::load()?)
///     .with_schema_builder(starwars::schema_builder(StarWarsStore::new()))
///     .serve()
///     .await?;
/// ```
pub struct ServerBuilder {
    config: Option<ServerConfig>,
    schema: Option<Arc<Schema>>,
    schema_builder: Option<SchemaBuilder>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            config: None,
            schema: None,
            schema_builder: None,
            custom_routes: Vec::new(),
        }
    }

    /// Set the configuration (defaults apply otherwise)
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Serve an already built schema
    pub fn with_schema(mut self, schema: impl Into<Arc<Schema>>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Serve the schema produced by `builder`
    ///
    /// The schema is built in [`build_host`](Self::build_host), so a missing
    /// resolver or an invalid SDL fails before any socket is bound.
    pub fn with_schema_builder(mut self, builder: SchemaBuilder) -> Self {
        self.schema_builder = Some(builder);
        self
    }

    /// Add custom routes to the server
    ///
    /// # Example
    ///
    /// ```ignore
    /// use axum::{Router, routing::get};
    ///
    /// let extra = Router::new().route("/version", get(|| async { env!("CARGO_PKG_VERSION") }));
    ///
    /// ServerBuilder::new()
    ///     .with_schema(schema)
    ///     .with_custom_routes(extra)
    ///     .build()?;
    /// ```
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the host: schema, validated configuration and executor
    pub fn build_host(&mut self) -> Result<ServerHost> {
        let config = self.config.take().unwrap_or_default();

        let schema = match (self.schema.take(), self.schema_builder.take()) {
            (Some(schema), _) => schema,
            (None, Some(builder)) => Arc::new(builder.build().context("failed to build schema")?),
            (None, None) => {
                anyhow::bail!("A schema is required. Call .with_schema() or .with_schema_builder()")
            }
        };

        tracing::debug!(?schema, "schema ready");

        ServerHost::from_builder_components(config, schema)
    }

    /// Build the final router
    pub fn build(mut self) -> Result<Router> {
        let host = Arc::new(self.build_host()?);
        let custom_routes = std::mem::take(&mut self.custom_routes);
        GraphQLExposure::build_router(host, custom_routes)
    }

    /// Serve the application with graceful shutdown
    ///
    /// This will:
    /// - Build the schema and router (any error is returned before binding)
    /// - Bind to the configured address
    /// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
    pub async fn serve(mut self) -> Result<()> {
        let host = Arc::new(self.build_host()?);
        let config = host.config.clone();
        let custom_routes = std::mem::take(&mut self.custom_routes);
        let app = GraphQLExposure::build_router(host, custom_routes)?;

        let addr = config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        tracing::info!("Server listening on {}", addr);
        tracing::info!(
            "connect to http://localhost:{}{} for GraphQL playground",
            config.port,
            config.playground_path
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ConstResolver;
    use serde_json::json;

    const SDL: &str = "type Query { hello: String, goodbye: String }";

    #[test]
    fn test_build_requires_schema() {
        let result = ServerBuilder::new().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_build_with_schema_builder() {
        let builder = Schema::build(SDL)
            .resolver("Query", "hello", ConstResolver::new(json!("world")))
            .resolver("Query", "goodbye", ConstResolver::new(json!("moon")));
        assert!(ServerBuilder::new().with_schema_builder(builder).build().is_ok());
    }

    #[test]
    fn test_missing_resolver_fails_build() {
        let builder =
            Schema::build(SDL).resolver("Query", "hello", ConstResolver::new(json!("world")));
        let err = ServerBuilder::new()
            .with_schema_builder(builder)
            .build()
            .err()
            .expect("unbound field");
        assert!(format!("{:#}", err).contains("Query.goodbye"));
    }

    #[tokio::test]
    async fn test_serve_fails_before_binding() {
        // Port 0 would always bind, so returning at all means the schema error came first
        let builder = Schema::build(SDL);
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        };
        let result = ServerBuilder::new()
            .with_config(config)
            .with_schema_builder(builder)
            .serve()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_serve_reports_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let schema = Schema::build(SDL)
            .resolver("Query", "hello", ConstResolver::new(json!("world")))
            .resolver("Query", "goodbye", ConstResolver::new(json!("moon")))
            .build()
            .unwrap();
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..Default::default()
        };
        let err = ServerBuilder::new()
            .with_config(config)
            .with_schema(schema)
            .serve()
            .await
            .expect_err("port is taken");
        assert!(err.to_string().contains("failed to bind"));
    }
}
