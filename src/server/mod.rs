//! Server module for building the GraphQL HTTP server
//!
//! This module provides a `ServerBuilder` that:
//! - Builds the schema before anything is bound
//! - Registers the query, playground, schema and health routes
//! - Serves with graceful shutdown

pub mod builder;
pub mod exposure;
pub mod host;

pub use builder::ServerBuilder;
pub use exposure::GraphQLExposure;
pub use host::ServerHost;
