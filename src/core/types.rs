//! Type references shared by the schema registry and the query parser

use std::fmt;

/// A reference to a GraphQL type, with its list and non-null wrappers
///
/// `[Episode!]!` is represented as
/// `NonNull(List(NonNull(Named("Episode"))))`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    /// Shorthand for a named type
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    /// Shorthand for a non-null named type
    pub fn named_non_null(name: impl Into<String>) -> Self {
        TypeRef::NonNull(Box::new(TypeRef::Named(name.into())))
    }

    /// Whether the outermost wrapper is non-null
    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeRef::NonNull(_))
    }

    /// Whether the type (ignoring non-null) is a list
    pub fn is_list(&self) -> bool {
        matches!(self.nullable(), TypeRef::List(_))
    }

    /// The type with the outermost non-null wrapper removed
    pub fn nullable(&self) -> &TypeRef {
        match self {
            TypeRef::NonNull(inner) => inner,
            other => other,
        }
    }

    /// The innermost named type
    pub fn base_name(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.base_name(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

impl<'a> From<&graphql_parser::query::Type<'a, String>> for TypeRef {
    fn from(ty: &graphql_parser::query::Type<'a, String>) -> Self {
        use graphql_parser::query::Type;

        match ty {
            Type::NamedType(name) => TypeRef::Named(name.clone()),
            Type::ListType(inner) => TypeRef::List(Box::new(TypeRef::from(inner.as_ref()))),
            Type::NonNullType(inner) => TypeRef::NonNull(Box::new(TypeRef::from(inner.as_ref()))),
        }
    }
}
