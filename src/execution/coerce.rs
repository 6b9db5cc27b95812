//! Input coercion and scalar serialization
//!
//! Variables arrive as JSON and arguments as query literals; both are turned
//! into JSON values matching the declared input type, with defaults applied
//! and single values promoted to one-element lists. Output scalars are
//! checked on the way back out.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::core::TypeRef;
use crate::query::{Field, InputValue, Operation};
use crate::schema::{FieldDef, InputValueDef, Schema, TypeDef, TypeKind};

/// Coerce the raw `variables` object of a request against an operation's definitions
pub(crate) fn coerce_variables(
    schema: &Schema,
    operation: &Operation,
    provided: &Map<String, Value>,
) -> Result<IndexMap<String, Value>, Vec<String>> {
    let mut coerced = IndexMap::new();
    let mut errors = Vec::new();

    for definition in &operation.variables {
        let name = &definition.name;

        match provided.get(name) {
            Some(Value::Null) if definition.ty.is_non_null() => errors.push(format!(
                "Variable \"${}\" of non-null type \"{}\" must not be null.",
                name, definition.ty
            )),
            Some(value) => match coerce_input(schema, &definition.ty, value) {
                Ok(value) => {
                    coerced.insert(name.clone(), value);
                }
                Err(message) => errors.push(format!(
                    "Variable \"${}\" got invalid value {}; {}",
                    name, value, message
                )),
            },
            None => {
                if let Some(default) = &definition.default_value {
                    match coerce_literal(schema, &definition.ty, default, &IndexMap::new()) {
                        Ok(value) => {
                            coerced.insert(name.clone(), value);
                        }
                        Err(message) => errors.push(format!(
                            "Variable \"${}\" has an invalid default value; {}",
                            name, message
                        )),
                    }
                } else if definition.ty.is_non_null() {
                    errors.push(format!(
                        "Variable \"${}\" of required type \"{}\" was not provided.",
                        name, definition.ty
                    ));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(coerced)
    } else {
        Err(errors)
    }
}

/// Coerce the arguments of a field against its definition
pub(crate) fn coerce_arguments(
    schema: &Schema,
    definition: &FieldDef,
    field: &Field,
    variables: &IndexMap<String, Value>,
) -> Result<IndexMap<String, Value>, String> {
    let mut coerced = IndexMap::new();

    for argument in definition.arguments.values() {
        let value = match field.argument(&argument.name) {
            Some(InputValue::Variable(name)) if !variables.contains_key(name) => None,
            Some(literal) => Some(
                coerce_literal(schema, &argument.ty, literal, variables).map_err(|message| {
                    format!(
                        "Argument \"{}\" of field \"{}\" has an invalid value: {}",
                        argument.name, definition.name, message
                    )
                })?,
            ),
            None => None,
        };

        match value {
            Some(value) => {
                coerced.insert(argument.name.clone(), value);
            }
            None => {
                if let Some(default) = missing_argument(argument)? {
                    coerced.insert(argument.name.clone(), default);
                }
            }
        }
    }

    Ok(coerced)
}

/// Default of an argument that was not provided
fn missing_argument(argument: &InputValueDef) -> Result<Option<Value>, String> {
    match &argument.default_value {
        Some(default) => Ok(Some(default.clone())),
        None if argument.ty.is_non_null() => Err(format!(
            "Argument \"{}\" of required type \"{}\" was not provided.",
            argument.name, argument.ty
        )),
        None => Ok(None),
    }
}

/// Coerce a query literal, substituting variables
pub(crate) fn coerce_literal(
    schema: &Schema,
    ty: &TypeRef,
    literal: &InputValue,
    variables: &IndexMap<String, Value>,
) -> Result<Value, String> {
    if let InputValue::Variable(name) = literal {
        let value = variables.get(name).cloned().unwrap_or(Value::Null);
        return coerce_input(schema, ty, &value);
    }

    match ty {
        TypeRef::NonNull(inner) => {
            if *literal == InputValue::Null {
                return Err(format!("Expected value of non-null type \"{}\", found null.", ty));
            }
            coerce_literal(schema, inner, literal, variables)
        }
        _ if *literal == InputValue::Null => Ok(Value::Null),
        TypeRef::List(inner) => match literal {
            InputValue::List(items) => items
                .iter()
                .map(|item| coerce_literal(schema, inner, item, variables))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            single => Ok(Value::Array(vec![coerce_literal(
                schema, inner, single, variables,
            )?])),
        },
        TypeRef::Named(name) => {
            let ty = named_input_type(schema, name)?;
            match (ty.kind, literal) {
                (TypeKind::Enum, InputValue::Enum(value)) => enum_value(ty, value),
                (TypeKind::Enum, other) => Err(format!(
                    "Enum \"{}\" cannot represent non-enum value: {}.",
                    ty.name,
                    other.to_json(variables)
                )),
                (TypeKind::InputObject, InputValue::Object(fields)) => {
                    let fields: Map<String, Value> = fields
                        .iter()
                        .map(|(key, value)| {
                            let field_ty = ty
                                .input_fields
                                .get(key)
                                .map(|f| &f.ty)
                                .ok_or_else(|| {
                                    format!(
                                        "Field \"{}\" is not defined by type \"{}\".",
                                        key, ty.name
                                    )
                                })?;
                            Ok((key.clone(), coerce_literal(schema, field_ty, value, variables)?))
                        })
                        .collect::<Result<_, String>>()?;
                    input_object(schema, ty, &fields, false)
                }
                (TypeKind::Scalar, InputValue::Enum(value)) => Err(format!(
                    "{} cannot represent an enum value: {}.",
                    ty.name, value
                )),
                _ => coerce_input(schema, &TypeRef::Named(name.clone()), &literal.to_json(variables)),
            }
        }
    }
}

/// Coerce a JSON value (variables, defaults) to an input type
pub(crate) fn coerce_input(schema: &Schema, ty: &TypeRef, value: &Value) -> Result<Value, String> {
    match ty {
        TypeRef::NonNull(inner) => {
            if value.is_null() {
                return Err(format!("Expected non-nullable type \"{}\" not to be null.", ty));
            }
            coerce_input(schema, inner, value)
        }
        _ if value.is_null() => Ok(Value::Null),
        TypeRef::List(inner) => match value {
            Value::Array(items) => items
                .iter()
                .map(|item| coerce_input(schema, inner, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            single => Ok(Value::Array(vec![coerce_input(schema, inner, single)?])),
        },
        TypeRef::Named(name) => {
            let ty = named_input_type(schema, name)?;
            match ty.kind {
                TypeKind::Scalar => parse_scalar(&ty.name, value),
                TypeKind::Enum => match value {
                    Value::String(s) => enum_value(ty, s),
                    other => Err(format!(
                        "Enum \"{}\" cannot represent non-string value: {}.",
                        ty.name, other
                    )),
                },
                TypeKind::InputObject => match value {
                    Value::Object(fields) => input_object(schema, ty, fields, true),
                    other => Err(format!(
                        "Expected type \"{}\" to be an object, found {}.",
                        ty.name, other
                    )),
                },
                _ => Err(format!("Type \"{}\" is not an input type.", ty.name)),
            }
        }
    }
}

fn named_input_type<'s>(schema: &'s Schema, name: &str) -> Result<&'s TypeDef, String> {
    schema
        .get_type(name)
        .filter(|ty| ty.is_input())
        .ok_or_else(|| format!("Unknown input type \"{}\".", name))
}

fn enum_value(ty: &TypeDef, value: &str) -> Result<Value, String> {
    if ty.enum_values.contains_key(value) {
        Ok(Value::String(value.to_string()))
    } else {
        Err(format!(
            "Value \"{}\" does not exist in \"{}\" enum.",
            value, ty.name
        ))
    }
}

/// Check the fields of an input object and apply defaults
///
/// With `coerce_fields` the field values are coerced here; literal objects
/// arrive with their fields already coerced.
fn input_object(
    schema: &Schema,
    ty: &TypeDef,
    fields: &Map<String, Value>,
    coerce_fields: bool,
) -> Result<Value, String> {
    if let Some(unknown) = fields.keys().find(|k| !ty.input_fields.contains_key(*k)) {
        return Err(format!(
            "Field \"{}\" is not defined by type \"{}\".",
            unknown, ty.name
        ));
    }

    let mut coerced = Map::new();
    for field in ty.input_fields.values() {
        match fields.get(&field.name) {
            Some(value) if coerce_fields => {
                let value = coerce_input(schema, &field.ty, value)
                    .map_err(|e| format!("In field \"{}\": {}", field.name, e))?;
                coerced.insert(field.name.clone(), value);
            }
            Some(Value::Null) if field.ty.is_non_null() => {
                return Err(format!(
                    "Field \"{}.{}\" of non-null type \"{}\" must not be null.",
                    ty.name, field.name, field.ty
                ));
            }
            Some(value) => {
                coerced.insert(field.name.clone(), value.clone());
            }
            None => {
                if let Some(default) = missing_argument(field).map_err(|_| {
                    format!(
                        "Field \"{}.{}\" of required type \"{}\" was not provided.",
                        ty.name, field.name, field.ty
                    )
                })? {
                    coerced.insert(field.name.clone(), default);
                }
            }
        }
    }

    Ok(Value::Object(coerced))
}

/// Input coercion of the built-in scalars; custom scalars pass through
fn parse_scalar(name: &str, value: &Value) -> Result<Value, String> {
    match name {
        "Int" => value
            .as_i64()
            .filter(|i| i32::try_from(*i).is_ok())
            .map(Value::from)
            .ok_or_else(|| format!("Int cannot represent non 32-bit signed integer value: {}", value)),
        "Float" => value
            .as_f64()
            .map(|_| value.clone())
            .ok_or_else(|| format!("Float cannot represent non numeric value: {}", value)),
        "String" => value
            .as_str()
            .map(|_| value.clone())
            .ok_or_else(|| format!("String cannot represent a non string value: {}", value)),
        "Boolean" => value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| format!("Boolean cannot represent a non boolean value: {}", value)),
        "ID" => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
            other => Err(format!("ID cannot represent value: {}", other)),
        },
        _ => Ok(value.clone()),
    }
}

/// Output serialization of the built-in scalars; custom scalars pass through
pub(crate) fn serialize_scalar(name: &str, value: Value) -> Result<Value, String> {
    match name {
        "Int" => {
            let int = match &value {
                Value::Number(n) => n.as_i64().or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| f as i64)
                }),
                Value::Bool(b) => Some(i64::from(*b)),
                _ => None,
            };
            int.filter(|i| i32::try_from(*i).is_ok())
                .map(Value::from)
                .ok_or_else(|| format!("Int cannot represent non-integer value: {}", value))
        }
        "Float" => match value {
            Value::Number(_) => Ok(value),
            Value::Bool(b) => Ok(Value::from(if b { 1.0 } else { 0.0 })),
            other => Err(format!("Float cannot represent non numeric value: {}", other)),
        },
        "String" => match value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(format!("String cannot represent value: {}", other)),
        },
        "Boolean" => match value {
            Value::Bool(_) => Ok(value),
            other => Err(format!("Boolean cannot represent a non boolean value: {}", other)),
        },
        "ID" => match value {
            Value::String(_) => Ok(value),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
            other => Err(format!("ID cannot represent value: {}", other)),
        },
        _ => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse;
    use crate::schema::ConstResolver;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::build(
            r#"
            enum Episode { NEWHOPE EMPIRE JEDI }
            input ReviewInput { stars: Int! commentary: String, favorite: Boolean = false }
            type Query {
                hero(episode: Episode = NEWHOPE): String
                review(episodes: [Episode!], review: ReviewInput!): String
                node(id: ID!): String
            }
            "#,
        )
        .resolver("Query", "hero", ConstResolver::new(Value::Null))
        .resolver("Query", "review", ConstResolver::new(Value::Null))
        .resolver("Query", "node", ConstResolver::new(Value::Null))
        .build()
        .expect("schema should build")
    }

    fn first_field(query: &str) -> Field {
        let tree = parse(query).expect("should parse");
        match &tree.operations[0].selection_set[0] {
            crate::query::Selection::Field(field) => field.clone(),
            _ => panic!("expected field"),
        }
    }

    fn arguments(query: &str, variables: IndexMap<String, Value>) -> Result<IndexMap<String, Value>, String> {
        let schema = schema();
        let field = first_field(query);
        let definition = schema.field("Query", &field.name).expect("field").clone();
        coerce_arguments(&schema, &definition, &field, &variables)
    }

    #[test]
    fn test_argument_default_applied() {
        let args = arguments("{ hero }", IndexMap::new()).unwrap();
        assert_eq!(args["episode"], json!("NEWHOPE"));
    }

    #[test]
    fn test_enum_literal_checked() {
        assert_eq!(
            arguments("{ hero(episode: JEDI) }", IndexMap::new()).unwrap()["episode"],
            json!("JEDI")
        );
        assert!(arguments("{ hero(episode: CLONES) }", IndexMap::new()).is_err());
        assert!(arguments("{ hero(episode: \"JEDI\") }", IndexMap::new()).is_err());
    }

    #[test]
    fn test_input_object_literal_with_defaults_and_list_promotion() {
        let args = arguments(
            "{ review(episodes: JEDI, review: { stars: 5 }) }",
            IndexMap::new(),
        )
        .unwrap();
        assert_eq!(args["episodes"], json!(["JEDI"]));
        assert_eq!(args["review"], json!({ "stars": 5, "favorite": false }));
    }

    #[test]
    fn test_input_object_missing_required_field() {
        let err = arguments("{ review(review: { commentary: \"meh\" }) }", IndexMap::new())
            .expect_err("stars is required");
        assert!(err.contains("stars"));
    }

    #[test]
    fn test_argument_from_variable() {
        let mut variables = IndexMap::new();
        variables.insert("id".to_string(), json!(2001));
        let args = arguments("query($id: ID!) { node(id: $id) }", variables).unwrap();
        assert_eq!(args["id"], json!("2001"));
    }

    #[test]
    fn test_variables_coerced_with_defaults() {
        let schema = schema();
        let tree = parse("query($ep: Episode = EMPIRE, $stars: Int!, $note: String) { hero }").unwrap();
        let provided = json!({ "stars": 4 });
        let vars = coerce_variables(&schema, &tree.operations[0], provided.as_object().unwrap())
            .expect("variables should coerce");
        assert_eq!(vars["ep"], json!("EMPIRE"));
        assert_eq!(vars["stars"], json!(4));
        assert!(!vars.contains_key("note"));
    }

    #[test]
    fn test_variables_errors_collected() {
        let schema = schema();
        let tree = parse("query($stars: Int!, $ep: Episode, $big: Int) { hero }").unwrap();
        let provided = json!({ "ep": "PHANTOM", "big": 3_000_000_000_i64 });
        let errors = coerce_variables(&schema, &tree.operations[0], provided.as_object().unwrap())
            .expect_err("invalid variables");
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("was not provided"));
    }

    #[test]
    fn test_serialize_scalars() {
        assert_eq!(serialize_scalar("Int", json!(3.0)).unwrap(), json!(3));
        assert!(serialize_scalar("Int", json!(1.5)).is_err());
        assert!(serialize_scalar("Int", json!(3_000_000_000_i64)).is_err());
        assert_eq!(serialize_scalar("ID", json!(1000)).unwrap(), json!("1000"));
        assert_eq!(serialize_scalar("String", json!(true)).unwrap(), json!("true"));
        assert!(serialize_scalar("Boolean", json!("yes")).is_err());
        assert_eq!(serialize_scalar("DateTime", json!({"a": 1})).unwrap(), json!({"a": 1}));
    }
}
