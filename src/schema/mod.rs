//! Schema registry
//!
//! The [`Schema`] holds every declared type with its fields and argument
//! definitions, plus the resolver bound to each object field. It is built
//! once at startup by [`SchemaBuilder`] and never mutated afterwards, so it is
//! shared between requests behind an `Arc` without any locking.

mod builder;
mod introspection;
mod resolver;

pub use builder::SchemaBuilder;
pub use resolver::{
    Arguments, ConstResolver, FnResolver, PropertyResolver, Resolver, ResolverContext,
};

use crate::core::TypeRef;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Names of the scalars every schema provides
pub const BUILTIN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

/// Key of a resolver binding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub type_name: String,
    pub field_name: String,
}

impl FieldKey {
    pub fn new(type_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field_name: field_name.into(),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.field_name)
    }
}

/// Errors returned by registry lookups
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaLookupError {
    #[error("Unknown type '{0}'")]
    UnknownType(String),

    #[error("Type '{type_name}' has no field '{field_name}'")]
    UnknownField {
        type_name: String,
        field_name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
}

impl TypeKind {
    /// Name used by introspection (`__TypeKind`)
    pub fn introspection_name(&self) -> &'static str {
        match self {
            TypeKind::Scalar => "SCALAR",
            TypeKind::Object => "OBJECT",
            TypeKind::Interface => "INTERFACE",
            TypeKind::Union => "UNION",
            TypeKind::Enum => "ENUM",
            TypeKind::InputObject => "INPUT_OBJECT",
        }
    }
}

/// An argument or input object field
#[derive(Debug, Clone, PartialEq)]
pub struct InputValueDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub default_value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub arguments: IndexMap<String, InputValueDef>,
    pub deprecation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValueDef {
    pub name: String,
    pub description: Option<String>,
    pub deprecation: Option<String>,
}

/// A named type of the schema
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
    pub description: Option<String>,

    /// Output fields (objects and interfaces)
    pub fields: IndexMap<String, FieldDef>,

    /// Implemented interfaces (objects and interfaces)
    pub interfaces: Vec<String>,

    /// Concrete object types (unions and interfaces)
    pub possible_types: Vec<String>,

    /// Declared values (enums)
    pub enum_values: IndexMap<String, EnumValueDef>,

    /// Input fields (input objects)
    pub input_fields: IndexMap<String, InputValueDef>,
}

impl TypeDef {
    pub(crate) fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            fields: IndexMap::new(),
            interfaces: Vec::new(),
            possible_types: Vec::new(),
            enum_values: IndexMap::new(),
            input_fields: IndexMap::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    /// Types whose values are objects with sub-selections
    pub fn is_composite(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Object | TypeKind::Interface | TypeKind::Union
        )
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, TypeKind::Interface | TypeKind::Union)
    }

    /// Types allowed in argument and variable positions
    pub fn is_input(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Scalar | TypeKind::Enum | TypeKind::InputObject
        )
    }

    /// Types allowed in field return positions
    pub fn is_output(&self) -> bool {
        self.kind != TypeKind::InputObject
    }
}

/// The immutable schema registry
pub struct Schema {
    types: IndexMap<String, TypeDef>,
    query_type: String,
    mutation_type: Option<String>,
    resolvers: HashMap<FieldKey, Arc<dyn Resolver>>,
    sdl: String,
    introspection: introspection::IntrospectionData,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .field("query_type", &self.query_type)
            .field("mutation_type", &self.mutation_type)
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

impl Schema {
    /// Start building a schema from an SDL description
    pub fn build(sdl: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::from_sdl(sdl)
    }

    /// Look up the resolver bound to `type_name.field_name`
    pub fn resolve_field(
        &self,
        type_name: &str,
        field_name: &str,
    ) -> Result<&Arc<dyn Resolver>, SchemaLookupError> {
        let ty = self
            .types
            .get(type_name)
            .ok_or_else(|| SchemaLookupError::UnknownType(type_name.to_string()))?;

        self.resolvers
            .get(&FieldKey::new(type_name, field_name))
            .filter(|_| ty.fields.contains_key(field_name))
            .ok_or_else(|| SchemaLookupError::UnknownField {
                type_name: type_name.to_string(),
                field_name: field_name.to_string(),
            })
    }

    pub fn get_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values()
    }

    /// Field definition of `type_name.field_name`
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDef> {
        self.types.get(type_name)?.field(field_name)
    }

    pub fn query_type(&self) -> &TypeDef {
        // presence checked by the builder
        &self.types[self.query_type.as_str()]
    }

    pub fn mutation_type(&self) -> Option<&TypeDef> {
        self.mutation_type
            .as_deref()
            .and_then(|name| self.types.get(name))
    }

    /// Whether `object_type` is a member of `abstract_type` (or the same type)
    pub fn is_possible_type(&self, abstract_type: &str, object_type: &str) -> bool {
        if abstract_type == object_type {
            return true;
        }
        self.types
            .get(abstract_type)
            .is_some_and(|t| t.possible_types.iter().any(|p| p == object_type))
    }

    /// Whether two composite types can share at least one concrete object type
    pub fn types_overlap(&self, a: &str, b: &str) -> bool {
        let concrete = |name: &str| -> Vec<String> {
            match self.types.get(name) {
                Some(t) if t.is_abstract() => t.possible_types.clone(),
                Some(t) => vec![t.name.clone()],
                None => Vec::new(),
            }
        };
        let left = concrete(a);
        concrete(b).iter().any(|t| left.contains(t))
    }

    /// The SDL text the schema was built from
    pub fn sdl(&self) -> &str {
        &self.sdl
    }

    /// Introspection document for `__schema`
    pub fn introspection_schema(&self) -> &Value {
        &self.introspection.schema
    }

    /// Introspection document for `__type(name:)`
    pub fn introspection_type(&self, name: &str) -> Option<&Value> {
        self.introspection.types.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SchemaBuildError;
    use serde_json::json;

    const SDL: &str = r#"
        type Query { hero: Character, node(id: ID!): Human }
        interface Character { name: String! }
        type Human implements Character { name: String! mass: Float }
        type Droid implements Character { name: String! }
        union SearchResult = Human | Droid
    "#;

    fn schema() -> Result<Schema, SchemaBuildError> {
        Schema::build(SDL)
            .resolver(
                "Query",
                "hero",
                ConstResolver::new(json!({ "__typename": "Human", "name": "Luke" })),
            )
            .resolver("Query", "node", ConstResolver::new(Value::Null))
            .properties("Human", &["name", "mass"])
            .properties("Droid", &["name"])
            .build()
    }

    #[test]
    fn test_resolve_field_found() {
        let schema = schema().expect("schema should build");
        assert!(schema.resolve_field("Query", "hero").is_ok());
        assert!(schema.resolve_field("Human", "mass").is_ok());
    }

    #[test]
    fn test_resolve_field_not_found() {
        let schema = schema().expect("schema should build");
        assert_eq!(
            schema.resolve_field("Query", "villain").err(),
            Some(SchemaLookupError::UnknownField {
                type_name: "Query".to_string(),
                field_name: "villain".to_string(),
            })
        );
        assert_eq!(
            schema.resolve_field("Starship", "name").err(),
            Some(SchemaLookupError::UnknownType("Starship".to_string()))
        );
    }

    #[test]
    fn test_possible_types() {
        let schema = schema().expect("schema should build");
        assert!(schema.is_possible_type("Character", "Human"));
        assert!(schema.is_possible_type("SearchResult", "Droid"));
        assert!(schema.is_possible_type("Human", "Human"));
        assert!(!schema.is_possible_type("Human", "Droid"));
        assert!(schema.types_overlap("Character", "SearchResult"));
        assert!(!schema.types_overlap("Human", "Droid"));
    }

    #[test]
    fn test_builtin_scalars_present() {
        let schema = schema().expect("schema should build");
        for name in BUILTIN_SCALARS {
            let ty = schema.get_type(name).expect("builtin scalar");
            assert_eq!(ty.kind, TypeKind::Scalar);
        }
    }

    #[test]
    fn test_field_definition_lookup() {
        let schema = schema().expect("schema should build");
        let node = schema.field("Query", "node").expect("field exists");
        assert_eq!(node.arguments["id"].ty, TypeRef::named_non_null("ID"));
        assert_eq!(schema.query_type().name, "Query");
        assert!(schema.mutation_type().is_none());
    }

    #[test]
    fn test_schema_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Schema>();
    }
}
