//! Star Wars GraphQL server
//!
//! - `POST /query`: GraphQL endpoint
//! - `GET /`: GraphQL playground
//!
//! Listens on `PORT` (default 8080). A YAML file named by `SWAPI_CONFIG`
//! overrides the other settings.

use std::sync::Arc;
use swapi::config::ServerConfig;
use swapi::server::ServerBuilder;
use swapi::starwars::{self, StarWarsStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;

    ServerBuilder::new()
        .with_config(config)
        .with_schema_builder(starwars::schema_builder(Arc::new(StarWarsStore::new())))
        .serve()
        .await
}
