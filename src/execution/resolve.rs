//! Selection set execution and value completion
//!
//! Every failure records exactly one error and answers `Err(NullBubble)`.
//! A nullable position turns the bubble into `null`; a non-null position
//! lets it travel to the parent, so the nearest nullable ancestor ends up
//! `null`. When no ancestor is nullable the bubble reaches the root and the
//! response carries `data: null`.

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

use super::coerce;
use super::context::ExecutionContext;
use crate::core::{FieldError, GraphQLError, ResponsePath, TypeRef};
use crate::query::{Field, Selection, SelectionSet};
use crate::schema::{FieldDef, ResolverContext, TypeDef, TypeKind};

/// Marker for a failure already recorded in the error list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NullBubble;

pub(crate) type Completion = Result<Value, NullBubble>;

pub mod codes {
    pub const FIELD_RESOLUTION_ERROR: &str = "FIELD_RESOLUTION_ERROR";
    pub const NON_NULL_VIOLATION: &str = "NON_NULL_VIOLATION";
    pub const INVALID_VALUE: &str = "INVALID_VALUE";
}

/// Fields of one selection set grouped by response key, in request order
type GroupedFields<'a> = IndexMap<String, Vec<&'a Field>>;

// =============================================================================
// Field collection
// =============================================================================

/// Collect the fields selected on an object, merging by response key
///
/// `applies` decides whether a fragment type condition matches the object.
pub(crate) fn collect_fields<'a>(
    ctx: &ExecutionContext<'a>,
    selection_sets: &[&'a SelectionSet],
    applies: &dyn Fn(&str) -> bool,
) -> GroupedFields<'a> {
    let mut grouped = IndexMap::new();
    let mut visited = HashSet::new();
    for set in selection_sets {
        collect_into(ctx, set, applies, &mut grouped, &mut visited);
    }
    grouped
}

fn collect_into<'a>(
    ctx: &ExecutionContext<'a>,
    set: &'a SelectionSet,
    applies: &dyn Fn(&str) -> bool,
    grouped: &mut GroupedFields<'a>,
    visited: &mut HashSet<&'a str>,
) {
    for selection in set {
        if !ctx.should_include(selection.directives()) {
            continue;
        }

        match selection {
            Selection::Field(field) => grouped
                .entry(field.response_key().to_string())
                .or_default()
                .push(field),
            Selection::InlineFragment(fragment) => {
                if fragment
                    .type_condition
                    .as_deref()
                    .is_none_or(|condition| applies(condition))
                {
                    collect_into(ctx, &fragment.selection_set, applies, grouped, visited);
                }
            }
            Selection::FragmentSpread(spread) => {
                if !visited.insert(spread.fragment_name.as_str()) {
                    continue;
                }
                let tree = ctx.tree;
                if let Some(fragment) = tree.fragment(&spread.fragment_name)
                    && applies(&fragment.type_condition)
                {
                    collect_into(ctx, &fragment.selection_set, applies, grouped, visited);
                }
            }
        }
    }
}

/// Sub-selections of every field merged under one response key
pub(crate) fn sub_selections<'a>(fields: &[&'a Field]) -> Vec<&'a SelectionSet> {
    fields.iter().map(|f| &f.selection_set).collect()
}

// =============================================================================
// Objects
// =============================================================================

/// Execute the selection sets of an object value
///
/// Sibling fields run concurrently up to the configured limit, or one after
/// the other when `serial` is set (mutation roots). The returned object keeps
/// request order either way.
pub(crate) fn execute_selection_set<'a>(
    ctx: &'a ExecutionContext<'a>,
    object_type: &'a TypeDef,
    parent: Arc<Value>,
    selection_sets: Vec<&'a SelectionSet>,
    path: ResponsePath,
    serial: bool,
) -> BoxFuture<'a, Completion> {
    async move {
        let schema = ctx.schema;
        let applies = |condition: &str| schema.is_possible_type(condition, &object_type.name);
        let grouped = collect_fields(ctx, &selection_sets, &applies);

        let limit = if serial {
            1
        } else {
            ctx.options.max_concurrency.max(1)
        };

        let pending: Vec<BoxFuture<'a, (String, Completion)>> = grouped
            .into_iter()
            .map(|(key, fields)| {
                let parent = parent.clone();
                let path = path.child(&key);
                async move {
                    let value = execute_field(ctx, object_type, parent, fields, path).await;
                    (key, value)
                }
                .boxed()
            })
            .collect();

        let results: Vec<(String, Completion)> =
            stream::iter(pending).buffered(limit).collect().await;

        let mut object = Map::new();
        for (key, value) in results {
            object.insert(key, value?);
        }
        Ok(Value::Object(object))
    }
    .boxed()
}

async fn execute_field<'a>(
    ctx: &'a ExecutionContext<'a>,
    object_type: &'a TypeDef,
    parent: Arc<Value>,
    fields: Vec<&'a Field>,
    path: ResponsePath,
) -> Completion {
    let field = fields[0];

    match field.name.as_str() {
        "__typename" => return Ok(Value::String(object_type.name.clone())),
        "__schema" | "__type" if is_introspection_root(ctx, object_type) => {
            return Ok(super::meta::resolve_meta_field(ctx, &fields));
        }
        _ => {}
    }

    let Some(definition) = object_type.field(&field.name) else {
        ctx.record(
            GraphQLError::new(format!(
                "Cannot query field \"{}\" on type \"{}\".",
                field.name, object_type.name
            ))
            .with_path(path)
            .with_location(field.location)
            .with_code(codes::INVALID_VALUE),
        );
        return Ok(Value::Null);
    };

    match resolve_field_value(ctx, object_type, definition, field, parent, &path).await {
        Ok(value) => complete_value(ctx, &definition.ty, object_type, fields, path, value).await,
        Err(error) => {
            ctx.record(field_error(error, &path, field));
            nullable(&definition.ty)
        }
    }
}

fn is_introspection_root(ctx: &ExecutionContext<'_>, object_type: &TypeDef) -> bool {
    ctx.options.introspection && object_type.name == ctx.schema.query_type().name
}

/// Coerce arguments and call the bound resolver
async fn resolve_field_value(
    ctx: &ExecutionContext<'_>,
    object_type: &TypeDef,
    definition: &FieldDef,
    field: &Field,
    parent: Arc<Value>,
    path: &ResponsePath,
) -> Result<Value, FieldError> {
    let resolver = ctx
        .schema
        .resolve_field(&object_type.name, &field.name)
        .map_err(|e| FieldError::new(e.to_string()))?;

    let args = coerce::coerce_arguments(ctx.schema, definition, field, &ctx.variables).map_err(
        |message| {
            FieldError::new(message).with_extension("code", codes::INVALID_VALUE)
        },
    )?;

    let resolver_ctx = ResolverContext {
        parent,
        args: crate::schema::Arguments::new(args),
        type_name: object_type.name.clone(),
        field_name: field.name.clone(),
        path: path.clone(),
        cancellation: ctx.cancellation.child_token(),
    };

    resolver.resolve(resolver_ctx).await
}

fn field_error(error: FieldError, path: &ResponsePath, field: &Field) -> GraphQLError {
    let mut recorded = GraphQLError::new(error.message)
        .with_path(path.clone())
        .with_location(field.location);
    recorded.extensions = error.extensions;
    if recorded.code().is_none() {
        recorded = recorded.with_code(codes::FIELD_RESOLUTION_ERROR);
    }
    recorded
}

/// What a failure turns into at a position of type `ty`
fn nullable(ty: &TypeRef) -> Completion {
    if ty.is_non_null() {
        Err(NullBubble)
    } else {
        Ok(Value::Null)
    }
}

// =============================================================================
// Value completion
// =============================================================================

/// Complete a resolved value against its declared type
pub(crate) fn complete_value<'a>(
    ctx: &'a ExecutionContext<'a>,
    ty: &'a TypeRef,
    parent_type: &'a TypeDef,
    fields: Vec<&'a Field>,
    path: ResponsePath,
    value: Value,
) -> BoxFuture<'a, Completion> {
    async move {
        match ty {
            TypeRef::NonNull(inner) => {
                let completed =
                    complete_inner(ctx, inner, parent_type, fields.clone(), path.clone(), value)
                        .await?;
                if completed.is_null() {
                    ctx.record(
                        GraphQLError::new(format!(
                            "Cannot return null for non-nullable field {}.{}.",
                            parent_type.name, fields[0].name
                        ))
                        .with_path(path)
                        .with_location(fields[0].location)
                        .with_code(codes::NON_NULL_VIOLATION),
                    );
                    return Err(NullBubble);
                }
                Ok(completed)
            }
            _ => complete_inner(ctx, ty, parent_type, fields, path, value)
                .await
                .or(Ok(Value::Null)),
        }
    }
    .boxed()
}

/// Completion of a nullable type; failures bubble out as `Err`
async fn complete_inner<'a>(
    ctx: &'a ExecutionContext<'a>,
    ty: &'a TypeRef,
    parent_type: &'a TypeDef,
    fields: Vec<&'a Field>,
    path: ResponsePath,
    value: Value,
) -> Completion {
    if value.is_null() {
        return Ok(Value::Null);
    }

    let location = fields[0].location;
    let invalid = move |message: String, path: ResponsePath| -> Completion {
        ctx.record(
            GraphQLError::new(message)
                .with_path(path)
                .with_location(location)
                .with_code(codes::INVALID_VALUE),
        );
        Err(NullBubble)
    };

    match ty {
        TypeRef::NonNull(_) => complete_value(ctx, ty, parent_type, fields, path, value).await,
        TypeRef::List(item_type) => {
            let Value::Array(items) = value else {
                return invalid(
                    format!(
                        "Expected a list for field {}.{}, got {}.",
                        parent_type.name, fields[0].name, value
                    ),
                    path,
                );
            };

            let limit = ctx.options.max_concurrency.max(1);
            let pending: Vec<BoxFuture<'a, Completion>> = items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    complete_value(
                        ctx,
                        item_type,
                        parent_type,
                        fields.clone(),
                        path.index(index),
                        item,
                    )
                })
                .collect();

            let completed: Vec<Completion> =
                stream::iter(pending).buffered(limit).collect().await;

            completed
                .into_iter()
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        TypeRef::Named(name) => {
            let Some(named) = ctx.schema.get_type(name) else {
                return invalid(format!("Unknown type \"{}\".", name), path);
            };

            match named.kind {
                TypeKind::Scalar => match coerce::serialize_scalar(&named.name, value) {
                    Ok(value) => Ok(value),
                    Err(message) => invalid(message, path),
                },
                TypeKind::Enum => match value.as_str() {
                    Some(v) if named.enum_values.contains_key(v) => Ok(value),
                    _ => invalid(
                        format!("Enum \"{}\" cannot represent value: {}", named.name, value),
                        path,
                    ),
                },
                TypeKind::Object => {
                    if !value.is_object() {
                        return invalid(
                            format!("Expected an object of type \"{}\", got {}.", named.name, value),
                            path,
                        );
                    }
                    execute_selection_set(
                        ctx,
                        named,
                        Arc::new(value),
                        sub_selections(&fields),
                        path,
                        false,
                    )
                    .await
                }
                TypeKind::Interface | TypeKind::Union => {
                    let Some(object_type) = resolve_abstract_type(ctx, named, &value) else {
                        return invalid(
                            format!(
                                "Abstract type \"{}\" must resolve to an Object type at runtime for field \"{}.{}\"; the value needs a \"__typename\" naming a possible type.",
                                named.name, parent_type.name, fields[0].name
                            ),
                            path,
                        );
                    };
                    execute_selection_set(
                        ctx,
                        object_type,
                        Arc::new(value),
                        sub_selections(&fields),
                        path,
                        false,
                    )
                    .await
                }
                TypeKind::InputObject => invalid(
                    format!("Input type \"{}\" cannot be used as an output.", named.name),
                    path,
                ),
            }
        }
    }
}

/// Concrete object type of an abstract value, from its `__typename` key
fn resolve_abstract_type<'a>(
    ctx: &ExecutionContext<'a>,
    abstract_type: &TypeDef,
    value: &Value,
) -> Option<&'a TypeDef> {
    let schema = ctx.schema;
    let type_name = value.get("__typename")?.as_str()?;
    schema
        .get_type(type_name)
        .filter(|ty| ty.kind == TypeKind::Object)
        .filter(|ty| schema.is_possible_type(&abstract_type.name, &ty.name))
}
