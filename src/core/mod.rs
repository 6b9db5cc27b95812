//! Core module containing the types shared by every stage of the engine

pub mod error;
pub mod path;
pub mod types;

pub use error::{
    ConfigError, EngineError, FieldError, FieldResult, GraphQLError, Location,
    RequestError, SchemaBuildError, SyntaxError,
};
pub use path::{PathSegment, ResponsePath};
pub use types::TypeRef;
