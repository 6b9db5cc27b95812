//! Introspection documents
//!
//! `__schema` and `__type` are answered from JSON documents built once with
//! the schema. Every object carries its `__typename` (`__Type`, `__Field`,
//! ...) so the executor can apply fragments such as `...FullType on __Type`.
//! Type references nested in fields only describe `kind`, `name` and
//! `ofType`; the full description of a type is reachable through `types`
//! or `__type(name:)`.

use indexmap::IndexMap;
use serde_json::{Value, json};

use super::{EnumValueDef, FieldDef, InputValueDef, TypeDef, TypeKind};
use crate::core::TypeRef;

#[derive(Debug, Clone, Default)]
pub(crate) struct IntrospectionData {
    pub(crate) schema: Value,
    pub(crate) types: IndexMap<String, Value>,
}

impl IntrospectionData {
    pub(crate) fn build(
        types: &IndexMap<String, TypeDef>,
        query_type: &str,
        mutation_type: Option<&str>,
    ) -> Self {
        let full_types: IndexMap<String, Value> = types
            .values()
            .map(|ty| (ty.name.clone(), full_type(ty, types)))
            .collect();

        let schema = json!({
            "__typename": "__Schema",
            "description": null,
            "queryType": named_ref(query_type, types),
            "mutationType": mutation_type.map(|name| named_ref(name, types)),
            "subscriptionType": null,
            "types": full_types.values().cloned().collect::<Vec<_>>(),
            "directives": directives(),
        });

        Self {
            schema,
            types: full_types,
        }
    }
}

fn full_type(ty: &TypeDef, types: &IndexMap<String, TypeDef>) -> Value {
    let has_fields = matches!(ty.kind, TypeKind::Object | TypeKind::Interface);

    let fields = has_fields.then(|| {
        ty.fields
            .values()
            .map(|f| field(f, types))
            .collect::<Vec<_>>()
    });
    let interfaces = has_fields.then(|| {
        ty.interfaces
            .iter()
            .map(|name| named_ref(name, types))
            .collect::<Vec<_>>()
    });
    let possible_types = ty.is_abstract().then(|| {
        ty.possible_types
            .iter()
            .map(|name| named_ref(name, types))
            .collect::<Vec<_>>()
    });
    let enum_values = (ty.kind == TypeKind::Enum)
        .then(|| ty.enum_values.values().map(enum_value).collect::<Vec<_>>());
    let input_fields = (ty.kind == TypeKind::InputObject).then(|| {
        ty.input_fields
            .values()
            .map(|v| input_value(v, types))
            .collect::<Vec<_>>()
    });

    json!({
        "__typename": "__Type",
        "kind": ty.kind.introspection_name(),
        "name": ty.name,
        "description": ty.description,
        "specifiedByURL": null,
        "fields": fields,
        "interfaces": interfaces,
        "possibleTypes": possible_types,
        "enumValues": enum_values,
        "inputFields": input_fields,
        "ofType": null,
    })
}

fn field(field: &FieldDef, types: &IndexMap<String, TypeDef>) -> Value {
    json!({
        "__typename": "__Field",
        "name": field.name,
        "description": field.description,
        "args": field
            .arguments
            .values()
            .map(|arg| input_value(arg, types))
            .collect::<Vec<_>>(),
        "type": type_ref(&field.ty, types),
        "isDeprecated": field.deprecation.is_some(),
        "deprecationReason": field.deprecation,
    })
}

fn input_value(value: &InputValueDef, types: &IndexMap<String, TypeDef>) -> Value {
    let is_enum = types
        .get(value.ty.base_name())
        .is_some_and(|t| t.kind == TypeKind::Enum);

    json!({
        "__typename": "__InputValue",
        "name": value.name,
        "description": value.description,
        "type": type_ref(&value.ty, types),
        "defaultValue": value.default_value.as_ref().map(|v| print_literal(v, is_enum)),
        "isDeprecated": false,
        "deprecationReason": null,
    })
}

fn enum_value(value: &EnumValueDef) -> Value {
    json!({
        "__typename": "__EnumValue",
        "name": value.name,
        "description": value.description,
        "isDeprecated": value.deprecation.is_some(),
        "deprecationReason": value.deprecation,
    })
}

fn type_ref(ty: &TypeRef, types: &IndexMap<String, TypeDef>) -> Value {
    match ty {
        TypeRef::Named(name) => named_ref(name, types),
        TypeRef::List(inner) => json!({
            "__typename": "__Type",
            "kind": "LIST",
            "name": null,
            "ofType": type_ref(inner, types),
        }),
        TypeRef::NonNull(inner) => json!({
            "__typename": "__Type",
            "kind": "NON_NULL",
            "name": null,
            "ofType": type_ref(inner, types),
        }),
    }
}

fn named_ref(name: &str, types: &IndexMap<String, TypeDef>) -> Value {
    let kind = types
        .get(name)
        .map(|t| t.kind.introspection_name())
        .unwrap_or("SCALAR");
    json!({
        "__typename": "__Type",
        "kind": kind,
        "name": name,
        "ofType": null,
    })
}

/// Render a default value as a GraphQL literal
fn print_literal(value: &Value, is_enum: bool) -> String {
    match value {
        Value::String(s) if is_enum => s.clone(),
        Value::Array(items) => format!(
            "[{}]",
            items
                .iter()
                .map(|v| print_literal(v, is_enum))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Object(fields) => format!(
            "{{{}}}",
            fields
                .iter()
                .map(|(k, v)| format!("{}: {}", k, print_literal(v, false)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        other => other.to_string(),
    }
}

fn directives() -> Value {
    let if_arg = json!({
        "__typename": "__InputValue",
        "name": "if",
        "description": null,
        "type": {
            "__typename": "__Type",
            "kind": "NON_NULL",
            "name": null,
            "ofType": { "__typename": "__Type", "kind": "SCALAR", "name": "Boolean", "ofType": null },
        },
        "defaultValue": null,
        "isDeprecated": false,
        "deprecationReason": null,
    });

    json!([
        {
            "__typename": "__Directive",
            "name": "skip",
            "description": "Directs the executor to skip this field or fragment when the `if` argument is true.",
            "locations": ["FIELD", "FRAGMENT_SPREAD", "INLINE_FRAGMENT"],
            "args": [if_arg.clone()],
            "isRepeatable": false,
        },
        {
            "__typename": "__Directive",
            "name": "include",
            "description": "Directs the executor to include this field or fragment only when the `if` argument is true.",
            "locations": ["FIELD", "FRAGMENT_SPREAD", "INLINE_FRAGMENT"],
            "args": [if_arg],
            "isRepeatable": false,
        },
        {
            "__typename": "__Directive",
            "name": "deprecated",
            "description": "Marks an element of a GraphQL schema as no longer supported.",
            "locations": ["FIELD_DEFINITION", "ENUM_VALUE"],
            "args": [{
                "__typename": "__InputValue",
                "name": "reason",
                "description": null,
                "type": { "__typename": "__Type", "kind": "SCALAR", "name": "String", "ofType": null },
                "defaultValue": "\"No longer supported\"",
                "isDeprecated": false,
                "deprecationReason": null,
            }],
            "isRepeatable": false,
        },
    ])
}
