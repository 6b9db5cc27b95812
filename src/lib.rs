//! # swapi
//!
//! A schema-driven GraphQL engine and the HTTP server around it.
//!
//! ## Features
//!
//! - **Schema Registry**: types from SDL, resolvers bound per `(type, field)`,
//!   checked once at startup
//! - **Query Parser**: query text to an owned tree, with positioned syntax errors
//! - **Validation**: unknown fields, arguments, fragments and variables are
//!   rejected before execution
//! - **Executor**: concurrent sibling fields, partial results with per-field
//!   errors, null propagation, deadlines and cancellation
//! - **HTTP Server**: `POST /query`, playground, schema export, graceful shutdown
//! - **Star Wars schema**: bundled in-memory data set served by default
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use swapi::prelude::*;
//!
//! let schema = Schema::build("type Query { hero: Hero } type Hero { name: String! }")
//!     .resolver_fn("Query", "hero", |_ctx| async { Ok(json!({ "name": "Luke" })) })
//!     .properties("Hero", &["name"])
//!     .build()?;
//!
//! let executor = Executor::new(Arc::new(schema));
//! let response = executor
//!     .execute(Request::new("{ hero { name } }"), CancellationToken::new())
//!     .await?;
//! // {"data":{"hero":{"name":"Luke"}}}
//! ```

pub mod config;
pub mod core;
pub mod execution;
pub mod query;
pub mod response;
pub mod schema;
pub mod server;
pub mod starwars;
pub mod validation;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        EngineError, FieldError, FieldResult, GraphQLError, Location, ResponsePath,
        SchemaBuildError, SyntaxError,
    };

    // === Schema ===
    pub use crate::schema::{
        Arguments, ConstResolver, FnResolver, PropertyResolver, Resolver, ResolverContext, Schema,
        SchemaBuilder,
    };

    // === Query & Execution ===
    pub use crate::execution::{ExecutionOptions, ExecutionResult, Executor, Request};
    pub use crate::query::{QueryTree, parse};
    pub use crate::response::Response;

    // === Config ===
    pub use crate::config::ServerConfig;

    // === Server ===
    pub use crate::server::{GraphQLExposure, ServerBuilder, ServerHost};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use serde_json::{Value, json};
    pub use std::sync::Arc;
    pub use tokio_util::sync::CancellationToken;
}
