//! Schema construction from SDL plus resolver bindings

use graphql_parser::schema as sdl;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use super::introspection::IntrospectionData;
use super::resolver::{FnResolver, PropertyResolver, Resolver, ResolverContext};
use super::{
    BUILTIN_SCALARS, EnumValueDef, FieldDef, FieldKey, InputValueDef, Schema, TypeDef, TypeKind,
};
use crate::core::{FieldResult, SchemaBuildError, TypeRef};

type Document<'a> = sdl::Document<'a, String>;

/// Builder for [`Schema`]
///
/// Every field of every object type must be bound to a resolver before
/// [`build`](SchemaBuilder::build) succeeds; interface fields are resolved
/// through the concrete object type and need no binding.
///
/// # Example
///
/// ```rust,ignore
/// let schema = SchemaBuilder::from_sdl("type Query { hero: Hero } type Hero { name: String! }")
///     .resolver_fn("Query", "hero", |_ctx| async { Ok(json!({ "name": "Luke" })) })
///     .properties("Hero", &["name"])
///     .build()?;
/// ```
pub struct SchemaBuilder {
    sdl: String,
    resolvers: HashMap<FieldKey, Arc<dyn Resolver>>,
}

impl SchemaBuilder {
    /// Create a builder for the given SDL text
    pub fn from_sdl(sdl: impl Into<String>) -> Self {
        Self {
            sdl: sdl.into(),
            resolvers: HashMap::new(),
        }
    }

    /// Bind a resolver to `type_name.field_name`, replacing any earlier binding
    pub fn resolver(
        self,
        type_name: &str,
        field_name: &str,
        resolver: impl Resolver + 'static,
    ) -> Self {
        self.resolver_arc(type_name, field_name, Arc::new(resolver))
    }

    /// Bind a shared resolver to `type_name.field_name`
    pub fn resolver_arc(
        mut self,
        type_name: &str,
        field_name: &str,
        resolver: Arc<dyn Resolver>,
    ) -> Self {
        self.resolvers
            .insert(FieldKey::new(type_name, field_name), resolver);
        self
    }

    /// Bind an async closure to `type_name.field_name`
    pub fn resolver_fn<F, Fut>(self, type_name: &str, field_name: &str, f: F) -> Self
    where
        F: Fn(ResolverContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FieldResult<Value>> + Send + 'static,
    {
        self.resolver(type_name, field_name, FnResolver::new(f))
    }

    /// Bind each listed field of `type_name` to the same-named key of the parent value
    pub fn properties(mut self, type_name: &str, fields: &[&str]) -> Self {
        for field in fields {
            self = self.resolver(type_name, field, PropertyResolver::new(*field));
        }
        self
    }

    /// Validate the schema and its bindings
    ///
    /// Fails fast on any inconsistency so that a server never starts with a
    /// schema it cannot fully execute.
    pub fn build(self) -> Result<Schema, SchemaBuildError> {
        let (mut types, roots) = {
            let document: Document<'_> = sdl::parse_schema::<String>(&self.sdl)
                .map_err(|e| SchemaBuildError::Parse(e.to_string()))?;

            let mut types = builtin_types();
            let mut roots = RootNames::default();
            let mut extensions = Vec::new();

            for definition in &document.definitions {
                match definition {
                    sdl::Definition::SchemaDefinition(schema_def) => {
                        roots.query = schema_def.query.clone();
                        roots.mutation = schema_def.mutation.clone();
                        if schema_def.subscription.is_some() {
                            tracing::warn!(
                                "subscription root declared but subscriptions are not executed"
                            );
                        }
                    }
                    sdl::Definition::TypeDefinition(type_def) => {
                        insert_type(&mut types, lower_type(type_def)?)?;
                    }
                    sdl::Definition::TypeExtension(sdl::TypeExtension::Object(ext)) => {
                        extensions.push(ext);
                    }
                    sdl::Definition::TypeExtension(_) => {
                        return Err(SchemaBuildError::Parse(
                            "only object type extensions are supported".to_string(),
                        ));
                    }
                    sdl::Definition::DirectiveDefinition(_) => {}
                }
            }

            for ext in extensions {
                apply_extension(&mut types, ext)?;
            }

            (types, roots)
        };

        collect_implementations(&mut types);
        check_names(&types)?;
        check_references(&types)?;
        check_implementations(&types)?;

        let query_type = root_type(&types, roots.query.as_deref(), "Query", true)?
            .ok_or_else(|| SchemaBuildError::InvalidRootType {
                name: "Query".to_string(),
            })?;
        let mutation_type = root_type(&types, roots.mutation.as_deref(), "Mutation", false)?;

        check_bindings(&types, &self.resolvers)?;

        let introspection =
            IntrospectionData::build(&types, &query_type, mutation_type.as_deref());

        tracing::debug!(
            types = types.len(),
            resolvers = self.resolvers.len(),
            query = %query_type,
            "schema built"
        );

        Ok(Schema {
            types,
            query_type,
            mutation_type,
            resolvers: self.resolvers,
            sdl: self.sdl,
            introspection,
        })
    }
}

#[derive(Default)]
struct RootNames {
    query: Option<String>,
    mutation: Option<String>,
}

fn builtin_types() -> IndexMap<String, TypeDef> {
    let descriptions = [
        "The `Int` scalar type represents non-fractional signed whole numeric values between -2^31 and 2^31 - 1.",
        "The `Float` scalar type represents signed double-precision fractional values.",
        "The `String` scalar type represents textual data, represented as UTF-8 character sequences.",
        "The `Boolean` scalar type represents `true` or `false`.",
        "The `ID` scalar type represents a unique identifier, serialized as a string.",
    ];

    BUILTIN_SCALARS
        .iter()
        .zip(descriptions)
        .map(|(name, description)| {
            let mut ty = TypeDef::new(*name, TypeKind::Scalar);
            ty.description = Some(description.to_string());
            (name.to_string(), ty)
        })
        .collect()
}

/// Insert a type, merging identical re-declarations and rejecting conflicting ones
fn insert_type(
    types: &mut IndexMap<String, TypeDef>,
    ty: TypeDef,
) -> Result<(), SchemaBuildError> {
    match types.get(&ty.name) {
        Some(existing) if same_shape(existing, &ty) => Ok(()),
        Some(_) => Err(SchemaBuildError::ConflictingType { name: ty.name }),
        None => {
            types.insert(ty.name.clone(), ty);
            Ok(())
        }
    }
}

fn same_shape(a: &TypeDef, b: &TypeDef) -> bool {
    let fields_match = a.fields.len() == b.fields.len()
        && a.fields.iter().all(|(name, field)| {
            b.fields.get(name).is_some_and(|other| {
                other.ty == field.ty
                    && other.arguments.len() == field.arguments.len()
                    && field
                        .arguments
                        .iter()
                        .all(|(arg, def)| other.arguments.get(arg).is_some_and(|o| o.ty == def.ty))
            })
        });
    let inputs_match = a.input_fields.len() == b.input_fields.len()
        && a.input_fields
            .iter()
            .all(|(name, field)| b.input_fields.get(name).is_some_and(|o| o.ty == field.ty));

    a.kind == b.kind
        && fields_match
        && inputs_match
        && a.interfaces == b.interfaces
        && a.possible_types == b.possible_types
        && a.enum_values.keys().eq(b.enum_values.keys())
}

fn lower_type(def: &sdl::TypeDefinition<'_, String>) -> Result<TypeDef, SchemaBuildError> {
    let ty = match def {
        sdl::TypeDefinition::Scalar(scalar) => {
            let mut ty = TypeDef::new(&scalar.name, TypeKind::Scalar);
            ty.description = scalar.description.clone();
            ty
        }
        sdl::TypeDefinition::Object(object) => {
            let mut ty = TypeDef::new(&object.name, TypeKind::Object);
            ty.description = object.description.clone();
            ty.interfaces = object.implements_interfaces.clone();
            ty.fields = lower_fields(&object.name, &object.fields)?;
            ty
        }
        sdl::TypeDefinition::Interface(interface) => {
            let mut ty = TypeDef::new(&interface.name, TypeKind::Interface);
            ty.description = interface.description.clone();
            ty.fields = lower_fields(&interface.name, &interface.fields)?;
            ty
        }
        sdl::TypeDefinition::Union(union) => {
            let mut ty = TypeDef::new(&union.name, TypeKind::Union);
            ty.description = union.description.clone();
            ty.possible_types = union.types.clone();
            ty
        }
        sdl::TypeDefinition::Enum(enum_type) => {
            let mut ty = TypeDef::new(&enum_type.name, TypeKind::Enum);
            ty.description = enum_type.description.clone();
            for value in &enum_type.values {
                ty.enum_values.insert(
                    value.name.clone(),
                    EnumValueDef {
                        name: value.name.clone(),
                        description: value.description.clone(),
                        deprecation: deprecation(&value.directives),
                    },
                );
            }
            ty
        }
        sdl::TypeDefinition::InputObject(input) => {
            let mut ty = TypeDef::new(&input.name, TypeKind::InputObject);
            ty.description = input.description.clone();
            ty.input_fields = lower_input_values(&input.name, &input.fields)?;
            ty
        }
    };
    Ok(ty)
}

fn lower_fields(
    type_name: &str,
    fields: &[sdl::Field<'_, String>],
) -> Result<IndexMap<String, FieldDef>, SchemaBuildError> {
    let mut lowered = IndexMap::new();
    for field in fields {
        let def = FieldDef {
            name: field.name.clone(),
            description: field.description.clone(),
            ty: TypeRef::from(&field.field_type),
            arguments: lower_input_values(
                &format!("{}.{}", type_name, field.name),
                &field.arguments,
            )?,
            deprecation: deprecation(&field.directives),
        };
        if lowered.insert(field.name.clone(), def).is_some() {
            return Err(SchemaBuildError::ConflictingType {
                name: type_name.to_string(),
            });
        }
    }
    Ok(lowered)
}

fn lower_input_values(
    owner: &str,
    values: &[sdl::InputValue<'_, String>],
) -> Result<IndexMap<String, InputValueDef>, SchemaBuildError> {
    let mut lowered = IndexMap::new();
    for value in values {
        let def = InputValueDef {
            name: value.name.clone(),
            description: value.description.clone(),
            ty: TypeRef::from(&value.value_type),
            default_value: value.default_value.as_ref().map(const_value_to_json),
        };
        if lowered.insert(value.name.clone(), def).is_some() {
            return Err(SchemaBuildError::ConflictingType {
                name: owner.to_string(),
            });
        }
    }
    Ok(lowered)
}

/// Reason given by a `@deprecated` directive, if present
fn deprecation(directives: &[sdl::Directive<'_, String>]) -> Option<String> {
    directives
        .iter()
        .find(|d| d.name == "deprecated")
        .map(|d| {
            d.arguments
                .iter()
                .find(|(name, _)| name == "reason")
                .and_then(|(_, value)| match value {
                    sdl::Value::String(reason) => Some(reason.clone()),
                    _ => None,
                })
                .unwrap_or_else(|| "No longer supported".to_string())
        })
}

/// Convert a constant SDL value (default values) to JSON
fn const_value_to_json(value: &sdl::Value<'_, String>) -> Value {
    match value {
        sdl::Value::Null | sdl::Value::Variable(_) => Value::Null,
        sdl::Value::Int(i) => i.as_i64().map(Value::from).unwrap_or(Value::Null),
        sdl::Value::Float(f) => Value::from(*f),
        sdl::Value::String(s) => Value::String(s.clone()),
        sdl::Value::Boolean(b) => Value::Bool(*b),
        sdl::Value::Enum(e) => Value::String(e.clone()),
        sdl::Value::List(items) => Value::Array(items.iter().map(const_value_to_json).collect()),
        sdl::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), const_value_to_json(v)))
                .collect(),
        ),
    }
}

fn apply_extension(
    types: &mut IndexMap<String, TypeDef>,
    ext: &sdl::ObjectTypeExtension<'_, String>,
) -> Result<(), SchemaBuildError> {
    let fields = lower_fields(&ext.name, &ext.fields)?;
    let ty = types
        .get_mut(&ext.name)
        .filter(|t| t.kind == TypeKind::Object)
        .ok_or_else(|| SchemaBuildError::UnknownType {
            name: ext.name.clone(),
            referenced_by: "type extension".to_string(),
        })?;

    for (name, field) in fields {
        if ty.fields.insert(name, field).is_some() {
            return Err(SchemaBuildError::ConflictingType {
                name: ext.name.clone(),
            });
        }
    }
    for interface in &ext.implements_interfaces {
        if !ty.interfaces.contains(interface) {
            ty.interfaces.push(interface.clone());
        }
    }
    Ok(())
}

/// Record each object type as a possible type of the interfaces it implements
fn collect_implementations(types: &mut IndexMap<String, TypeDef>) {
    let implementations: Vec<(String, String)> = types
        .values()
        .filter(|t| t.kind == TypeKind::Object)
        .flat_map(|t| {
            t.interfaces
                .iter()
                .map(move |interface| (interface.clone(), t.name.clone()))
        })
        .collect();

    for (interface, object) in implementations {
        if let Some(ty) = types.get_mut(&interface)
            && ty.kind == TypeKind::Interface
            && !ty.possible_types.contains(&object)
        {
            ty.possible_types.push(object);
        }
    }
}

fn check_names(types: &IndexMap<String, TypeDef>) -> Result<(), SchemaBuildError> {
    let reserved = |name: &str| -> Result<(), SchemaBuildError> {
        if name.starts_with("__") {
            Err(SchemaBuildError::InvalidName {
                name: name.to_string(),
                message: "names starting with '__' are reserved for introspection".to_string(),
            })
        } else {
            Ok(())
        }
    };

    for ty in types.values() {
        reserved(&ty.name)?;
        for field in ty.fields.values() {
            reserved(&field.name)?;
            for arg in field.arguments.keys() {
                reserved(arg)?;
            }
        }
        for name in ty.input_fields.keys().chain(ty.enum_values.keys()) {
            reserved(name)?;
        }
        for name in ty.enum_values.keys() {
            if matches!(name.as_str(), "true" | "false" | "null") {
                return Err(SchemaBuildError::InvalidName {
                    name: name.clone(),
                    message: "enum values cannot be named true, false or null".to_string(),
                });
            }
        }
    }
    Ok(())
}

fn check_references(types: &IndexMap<String, TypeDef>) -> Result<(), SchemaBuildError> {
    let check = |ty: &TypeRef,
                 want_input: bool,
                 referenced_by: String|
     -> Result<(), SchemaBuildError> {
        let name = ty.base_name();
        let target = types.get(name).ok_or_else(|| SchemaBuildError::UnknownType {
            name: name.to_string(),
            referenced_by: referenced_by.clone(),
        })?;
        let allowed = if want_input {
            target.is_input()
        } else {
            target.is_output()
        };
        if allowed {
            Ok(())
        } else {
            Err(SchemaBuildError::InvalidTypePosition {
                ty: name.to_string(),
                position: if want_input { "an input type" } else { "an output type" },
                referenced_by,
            })
        }
    };

    for ty in types.values() {
        for field in ty.fields.values() {
            check(&field.ty, false, format!("{}.{}", ty.name, field.name))?;
            for arg in field.arguments.values() {
                check(&arg.ty, true, format!("{}.{}({})", ty.name, field.name, arg.name))?;
            }
        }
        for input in ty.input_fields.values() {
            check(&input.ty, true, format!("{}.{}", ty.name, input.name))?;
        }
        if ty.kind == TypeKind::Union {
            for member in &ty.possible_types {
                match types.get(member) {
                    Some(t) if t.kind == TypeKind::Object => {}
                    Some(_) => {
                        return Err(SchemaBuildError::InvalidTypePosition {
                            ty: member.clone(),
                            position: "a union member",
                            referenced_by: ty.name.clone(),
                        });
                    }
                    None => {
                        return Err(SchemaBuildError::UnknownType {
                            name: member.clone(),
                            referenced_by: ty.name.clone(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

fn check_implementations(types: &IndexMap<String, TypeDef>) -> Result<(), SchemaBuildError> {
    for ty in types.values() {
        for interface_name in &ty.interfaces {
            let interface = match types.get(interface_name) {
                Some(t) if t.kind == TypeKind::Interface => t,
                _ => {
                    return Err(SchemaBuildError::InvalidImplementation(format!(
                        "{} implements '{}', which is not an interface",
                        ty.name, interface_name
                    )));
                }
            };

            for (name, expected) in &interface.fields {
                let Some(field) = ty.fields.get(name) else {
                    return Err(SchemaBuildError::InvalidImplementation(format!(
                        "{} does not provide field '{}' required by {}",
                        ty.name, name, interface.name
                    )));
                };
                if field.ty.base_name() != expected.ty.base_name()
                    && !types
                        .get(expected.ty.base_name())
                        .is_some_and(|t| t.possible_types.contains(&field.ty.base_name().to_string()))
                {
                    return Err(SchemaBuildError::InvalidImplementation(format!(
                        "{}.{} has type {}, incompatible with {}.{}: {}",
                        ty.name, name, field.ty, interface.name, name, expected.ty
                    )));
                }
            }
        }
    }
    Ok(())
}

fn root_type(
    types: &IndexMap<String, TypeDef>,
    declared: Option<&str>,
    default: &str,
    required: bool,
) -> Result<Option<String>, SchemaBuildError> {
    let invalid = |name: &str| SchemaBuildError::InvalidRootType {
        name: name.to_string(),
    };

    match declared {
        Some(name) => match types.get(name) {
            Some(t) if t.kind == TypeKind::Object => Ok(Some(name.to_string())),
            _ => Err(invalid(name)),
        },
        None => match types.get(default) {
            Some(t) if t.kind == TypeKind::Object => Ok(Some(default.to_string())),
            Some(_) => Err(invalid(default)),
            None if required => Err(invalid(default)),
            None => Ok(None),
        },
    }
}

fn check_bindings(
    types: &IndexMap<String, TypeDef>,
    resolvers: &HashMap<FieldKey, Arc<dyn Resolver>>,
) -> Result<(), SchemaBuildError> {
    for key in resolvers.keys() {
        let bound = types
            .get(&key.type_name)
            .is_some_and(|t| t.kind == TypeKind::Object && t.fields.contains_key(&key.field_name));
        if !bound {
            return Err(SchemaBuildError::UnknownField {
                type_name: key.type_name.clone(),
                field_name: key.field_name.clone(),
            });
        }
    }

    let missing: Vec<String> = types
        .values()
        .filter(|t| t.kind == TypeKind::Object)
        .flat_map(|t| {
            t.fields
                .keys()
                .map(move |field| FieldKey::new(&t.name, field))
        })
        .filter(|key| !resolvers.contains_key(key))
        .map(|key| key.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SchemaBuildError::MissingResolvers(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ConstResolver;
    use serde_json::json;

    fn null() -> ConstResolver {
        ConstResolver::new(Value::Null)
    }

    #[test]
    fn test_build_minimal_schema() {
        let schema = SchemaBuilder::from_sdl("type Query { hello: String }")
            .resolver("Query", "hello", ConstResolver::new(json!("world")))
            .build()
            .expect("should build");
        assert_eq!(schema.query_type().name, "Query");
        assert_eq!(schema.sdl(), "type Query { hello: String }");
    }

    #[test]
    fn test_missing_resolver_fails_fast() {
        let err = SchemaBuilder::from_sdl("type Query { hero: Hero } type Hero { name: String! mass: Float }")
            .resolver("Query", "hero", null())
            .properties("Hero", &["name"])
            .build()
            .expect_err("Hero.mass has no resolver");
        assert_eq!(
            err,
            SchemaBuildError::MissingResolvers(vec!["Hero.mass".to_string()])
        );
    }

    #[test]
    fn test_resolver_on_unknown_field_rejected() {
        let err = SchemaBuilder::from_sdl("type Query { hello: String }")
            .resolver("Query", "hello", null())
            .resolver("Query", "goodbye", null())
            .build()
            .expect_err("goodbye is not declared");
        assert!(matches!(err, SchemaBuildError::UnknownField { .. }));
    }

    #[test]
    fn test_conflicting_declarations_rejected() {
        let err = SchemaBuilder::from_sdl(
            "type Query { a: String } type Hero { name: String } type Hero { name: Int }",
        )
        .resolver("Query", "a", null())
        .properties("Hero", &["name"])
        .build()
        .expect_err("conflicting Hero");
        assert_eq!(
            err,
            SchemaBuildError::ConflictingType {
                name: "Hero".to_string()
            }
        );
    }

    #[test]
    fn test_identical_declarations_merged() {
        let schema = SchemaBuilder::from_sdl(
            "type Query { a: Hero } type Hero { name: String } type Hero { name: String } scalar String",
        )
        .resolver("Query", "a", null())
        .properties("Hero", &["name"])
        .build();
        assert!(schema.is_ok(), "identical re-declarations should merge");
    }

    #[test]
    fn test_unknown_type_reference_rejected() {
        let err = SchemaBuilder::from_sdl("type Query { hero: Hero }")
            .resolver("Query", "hero", null())
            .build()
            .expect_err("Hero is undeclared");
        assert!(matches!(err, SchemaBuildError::UnknownType { ref name, .. } if name == "Hero"));
    }

    #[test]
    fn test_input_type_in_output_position_rejected() {
        let err = SchemaBuilder::from_sdl("type Query { review: ReviewInput } input ReviewInput { stars: Int! }")
            .resolver("Query", "review", null())
            .build()
            .expect_err("input object used as output");
        assert!(matches!(err, SchemaBuildError::InvalidTypePosition { .. }));
    }

    #[test]
    fn test_missing_query_root_rejected() {
        let err = SchemaBuilder::from_sdl("type Hero { name: String }")
            .properties("Hero", &["name"])
            .build()
            .expect_err("no Query type");
        assert!(matches!(err, SchemaBuildError::InvalidRootType { .. }));
    }

    #[test]
    fn test_custom_root_names() {
        let schema = SchemaBuilder::from_sdl(
            "schema { query: Root mutation: Writes } type Root { a: Int } type Writes { b: Int }",
        )
        .resolver("Root", "a", null())
        .resolver("Writes", "b", null())
        .build()
        .expect("should build");
        assert_eq!(schema.query_type().name, "Root");
        assert_eq!(schema.mutation_type().map(|t| t.name.as_str()), Some("Writes"));
    }

    #[test]
    fn test_interface_field_missing_on_object_rejected() {
        let err = SchemaBuilder::from_sdl(
            "type Query { c: Character } interface Character { name: String } type Droid implements Character { id: ID }",
        )
        .resolver("Query", "c", null())
        .properties("Droid", &["id"])
        .build()
        .expect_err("Droid lacks name");
        assert!(matches!(err, SchemaBuildError::InvalidImplementation(_)));
    }

    #[test]
    fn test_object_extension_adds_fields() {
        let schema = SchemaBuilder::from_sdl("type Query { a: Int } extend type Query { b: Int }")
            .resolver("Query", "a", null())
            .resolver("Query", "b", null())
            .build()
            .expect("should build");
        assert!(schema.field("Query", "b").is_some());
    }

    #[test]
    fn test_reserved_names_rejected() {
        let err = SchemaBuilder::from_sdl("type Query { __secret: Int }")
            .resolver("Query", "__secret", null())
            .build()
            .expect_err("reserved name");
        assert!(matches!(err, SchemaBuildError::InvalidName { .. }));
    }

    #[test]
    fn test_argument_defaults_and_deprecation_recorded() {
        let schema = SchemaBuilder::from_sdl(
            r#"
            enum LengthUnit { METER FOOT }
            type Query {
                height(unit: LengthUnit = METER): Float
                old: Int @deprecated(reason: "use height")
            }
            "#,
        )
        .resolver("Query", "height", null())
        .resolver("Query", "old", null())
        .build()
        .expect("should build");

        let height = schema.field("Query", "height").unwrap();
        assert_eq!(height.arguments["unit"].default_value, Some(json!("METER")));
        let old = schema.field("Query", "old").unwrap();
        assert_eq!(old.deprecation.as_deref(), Some("use height"));
    }

    #[test]
    fn test_unparsable_sdl_rejected() {
        let err = SchemaBuilder::from_sdl("type Query {")
            .build()
            .expect_err("broken SDL");
        assert!(matches!(err, SchemaBuildError::Parse(_)));
    }
}
