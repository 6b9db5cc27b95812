//! `__schema` and `__type` fields
//!
//! Both are answered by selecting from the prebuilt introspection documents
//! of the schema. No resolver is involved, so nothing here can fail.

use serde_json::{Map, Value};

use super::context::ExecutionContext;
use super::resolve::{collect_fields, sub_selections};
use crate::query::{Field, SelectionSet};

/// Value of a `__schema` or `__type(name:)` field
pub(crate) fn resolve_meta_field(ctx: &ExecutionContext<'_>, fields: &[&Field]) -> Value {
    let field = fields[0];
    let schema = ctx.schema;

    let document = match field.name.as_str() {
        "__schema" => Some(schema.introspection_schema()),
        "__type" => field
            .argument("name")
            .map(|name| name.to_json(&ctx.variables))
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|name| schema.introspection_type(name)),
        _ => None,
    };

    match document {
        Some(document) => select(ctx, document, &sub_selections(fields)),
        None => Value::Null,
    }
}

/// Project `document` onto the selection sets
fn select(ctx: &ExecutionContext<'_>, document: &Value, selection_sets: &[&SelectionSet]) -> Value {
    match document {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| select(ctx, item, selection_sets))
                .collect(),
        ),
        Value::Object(object) => {
            let typename = object
                .get("__typename")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let applies = |condition: &str| condition == typename;

            let mut selected = Map::new();
            for (key, fields) in collect_fields(ctx, selection_sets, &applies) {
                let field = fields[0];
                let value = match field.name.as_str() {
                    "__typename" => Value::String(typename.to_string()),
                    name => {
                        let value = object.get(name).unwrap_or(&Value::Null);
                        let value = without_deprecated(ctx, field, value);
                        if field.selection_set.is_empty() {
                            value
                        } else {
                            select(ctx, &value, &sub_selections(&fields))
                        }
                    }
                };
                selected.insert(key, value);
            }
            Value::Object(selected)
        }
        other => other.clone(),
    }
}

/// `fields` and `enumValues` hide deprecated entries unless `includeDeprecated: true`
fn without_deprecated(ctx: &ExecutionContext<'_>, field: &Field, value: &Value) -> Value {
    let include_deprecated = field
        .argument("includeDeprecated")
        .map(|v| v.to_json(&ctx.variables))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let filtered = matches!(field.name.as_str(), "fields" | "enumValues") && !include_deprecated;

    match value {
        Value::Array(items) if filtered => Value::Array(
            items
                .iter()
                .filter(|item| item.get("isDeprecated") != Some(&Value::Bool(true)))
                .cloned()
                .collect(),
        ),
        other => other.clone(),
    }
}
