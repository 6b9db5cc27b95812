//! Query text to [`QueryTree`] lowering
//!
//! Grammar and lexing are handled by `graphql-parser`; this module converts
//! its borrowed AST into the owned tree and reports syntax errors with their
//! position. It never looks at a schema.

use graphql_parser::query as ast;
use regex::Regex;
use std::sync::OnceLock;

use super::{
    Directive, Field, FragmentDefinition, FragmentSpread, InlineFragment, InputValue, Operation,
    OperationKind, QueryTree, Selection, SelectionSet, VariableDefinition,
};
use crate::core::{Location, SyntaxError, TypeRef};

type AstSelectionSet<'a> = ast::SelectionSet<'a, String>;

/// Parse query text into a [`QueryTree`]
///
/// Pure and deterministic: the same text always yields an equal tree.
pub fn parse(text: &str) -> Result<QueryTree, SyntaxError> {
    let document = ast::parse_query::<String>(text).map_err(|e| syntax_error(&e.to_string()))?;

    let mut operations = Vec::new();
    let mut fragments = Vec::new();

    for definition in &document.definitions {
        match definition {
            ast::Definition::Operation(op) => operations.push(lower_operation(op)?),
            ast::Definition::Fragment(fragment) => fragments.push(lower_fragment(fragment)?),
        }
    }

    Ok(QueryTree {
        operations,
        fragments,
    })
}

/// Build a [`SyntaxError`] from a `graphql-parser` message, extracting the position
fn syntax_error(message: &str) -> SyntaxError {
    static POSITION_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = POSITION_REGEX.get_or_init(|| {
        Regex::new(r"at (\d+):(\d+)").expect("position pattern is a valid regex")
    });

    let location = regex.captures(message).and_then(|caps| {
        let line = caps.get(1)?.as_str().parse().ok()?;
        let column = caps.get(2)?.as_str().parse().ok()?;
        Some(Location::new(line, column))
    });

    // Drop the "query parse error: Parse error at 1:2" prefix, keep the details
    let details: Vec<&str> = message
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let message = if details.is_empty() {
        message.trim().to_string()
    } else {
        details.join(", ")
    };

    SyntaxError { message, location }
}

fn lower_operation(op: &ast::OperationDefinition<'_, String>) -> Result<Operation, SyntaxError> {
    match op {
        ast::OperationDefinition::SelectionSet(set) => Ok(Operation {
            kind: OperationKind::Query,
            name: None,
            variables: Vec::new(),
            directives: Vec::new(),
            selection_set: lower_selection_set(set)?,
            location: set.span.0.into(),
        }),
        ast::OperationDefinition::Query(q) => Ok(Operation {
            kind: OperationKind::Query,
            name: q.name.clone(),
            variables: lower_variables(&q.variable_definitions)?,
            directives: lower_directives(&q.directives)?,
            selection_set: lower_selection_set(&q.selection_set)?,
            location: q.position.into(),
        }),
        ast::OperationDefinition::Mutation(m) => Ok(Operation {
            kind: OperationKind::Mutation,
            name: m.name.clone(),
            variables: lower_variables(&m.variable_definitions)?,
            directives: lower_directives(&m.directives)?,
            selection_set: lower_selection_set(&m.selection_set)?,
            location: m.position.into(),
        }),
        ast::OperationDefinition::Subscription(s) => Ok(Operation {
            kind: OperationKind::Subscription,
            name: s.name.clone(),
            variables: lower_variables(&s.variable_definitions)?,
            directives: lower_directives(&s.directives)?,
            selection_set: lower_selection_set(&s.selection_set)?,
            location: s.position.into(),
        }),
    }
}

fn lower_fragment(
    fragment: &ast::FragmentDefinition<'_, String>,
) -> Result<FragmentDefinition, SyntaxError> {
    let ast::TypeCondition::On(type_condition) = &fragment.type_condition;

    Ok(FragmentDefinition {
        name: fragment.name.clone(),
        type_condition: type_condition.clone(),
        directives: lower_directives(&fragment.directives)?,
        selection_set: lower_selection_set(&fragment.selection_set)?,
        location: fragment.position.into(),
    })
}

fn lower_variables(
    definitions: &[ast::VariableDefinition<'_, String>],
) -> Result<Vec<VariableDefinition>, SyntaxError> {
    definitions
        .iter()
        .map(|def| {
            Ok(VariableDefinition {
                name: def.name.clone(),
                ty: TypeRef::from(&def.var_type),
                default_value: def
                    .default_value
                    .as_ref()
                    .map(|v| lower_value(v, def.position.into()))
                    .transpose()?,
                location: def.position.into(),
            })
        })
        .collect()
}

fn lower_selection_set(set: &AstSelectionSet<'_>) -> Result<SelectionSet, SyntaxError> {
    set.items.iter().map(lower_selection).collect()
}

fn lower_selection(selection: &ast::Selection<'_, String>) -> Result<Selection, SyntaxError> {
    match selection {
        ast::Selection::Field(field) => {
            let location: Location = field.position.into();
            Ok(Selection::Field(Field {
                alias: field.alias.clone(),
                name: field.name.clone(),
                arguments: lower_arguments(&field.arguments, location)?,
                directives: lower_directives(&field.directives)?,
                selection_set: lower_selection_set(&field.selection_set)?,
                location,
            }))
        }
        ast::Selection::FragmentSpread(spread) => Ok(Selection::FragmentSpread(FragmentSpread {
            fragment_name: spread.fragment_name.clone(),
            directives: lower_directives(&spread.directives)?,
            location: spread.position.into(),
        })),
        ast::Selection::InlineFragment(fragment) => {
            Ok(Selection::InlineFragment(InlineFragment {
                type_condition: fragment
                    .type_condition
                    .as_ref()
                    .map(|ast::TypeCondition::On(name)| name.clone()),
                directives: lower_directives(&fragment.directives)?,
                selection_set: lower_selection_set(&fragment.selection_set)?,
                location: fragment.position.into(),
            }))
        }
    }
}

fn lower_directives(
    directives: &[ast::Directive<'_, String>],
) -> Result<Vec<Directive>, SyntaxError> {
    directives
        .iter()
        .map(|d| {
            let location: Location = d.position.into();
            Ok(Directive {
                name: d.name.clone(),
                arguments: lower_arguments(&d.arguments, location)?,
                location,
            })
        })
        .collect()
}

fn lower_arguments(
    arguments: &[(String, ast::Value<'_, String>)],
    location: Location,
) -> Result<Vec<(String, InputValue)>, SyntaxError> {
    arguments
        .iter()
        .map(|(name, value)| Ok((name.clone(), lower_value(value, location)?)))
        .collect()
}

fn lower_value(value: &ast::Value<'_, String>, location: Location) -> Result<InputValue, SyntaxError> {
    Ok(match value {
        ast::Value::Null => InputValue::Null,
        ast::Value::Int(number) => {
            let int = number.as_i64().ok_or_else(|| SyntaxError {
                message: "Integer literal is out of range".to_string(),
                location: Some(location),
            })?;
            InputValue::Int(int)
        }
        ast::Value::Float(f) => InputValue::Float(*f),
        ast::Value::String(s) => InputValue::String(s.clone()),
        ast::Value::Boolean(b) => InputValue::Boolean(*b),
        ast::Value::Enum(e) => InputValue::Enum(e.clone()),
        ast::Value::Variable(name) => InputValue::Variable(name.clone()),
        ast::Value::List(items) => InputValue::List(
            items
                .iter()
                .map(|v| lower_value(v, location))
                .collect::<Result<_, _>>()?,
        ),
        ast::Value::Object(fields) => InputValue::Object(
            fields
                .iter()
                .map(|(k, v)| Ok((k.clone(), lower_value(v, location)?)))
                .collect::<Result<_, SyntaxError>>()?,
        ),
    })
}
