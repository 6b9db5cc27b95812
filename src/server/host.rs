//! Server host shared by every handler
//!
//! The host bundles the configuration, the schema registry and the executor
//! built from them. It is created once by the [`ServerBuilder`](super::ServerBuilder)
//! and shared behind an `Arc`; nothing in it changes after startup.

use crate::config::ServerConfig;
use crate::execution::Executor;
use crate::schema::Schema;
use anyhow::Result;
use std::sync::Arc;

/// Host context containing all server state
///
/// # Example
///
/// ```rust,ignore
/// let host = ServerHost::from_builder_components(config, Arc::new(schema))?;
/// let app = GraphQLExposure::build_router(Arc::new(host), Vec::new())?;
/// ```
pub struct ServerHost {
    /// Validated server configuration
    pub config: Arc<ServerConfig>,

    /// Schema registry
    pub schema: Arc<Schema>,

    /// Executor configured from `config`
    pub executor: Arc<Executor>,
}

impl ServerHost {
    /// Build the host from builder components
    ///
    /// Fails when the configuration does not validate.
    pub fn from_builder_components(config: ServerConfig, schema: Arc<Schema>) -> Result<Self> {
        config.validate()?;

        let executor = Executor::new(schema.clone()).with_options(config.execution_options());

        Ok(Self {
            config: Arc::new(config),
            schema,
            executor: Arc::new(executor),
        })
    }
}
