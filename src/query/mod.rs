//! Query tree produced by the parser
//!
//! The tree owns all of its strings so it can outlive the request text and
//! be moved freely between tasks. It is created per request and dropped once
//! the response has been produced.

mod parser;

pub use parser::parse;

use crate::core::{Location, RequestError, TypeRef};
use indexmap::IndexMap;
use serde_json::Value;

/// A parsed GraphQL document
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTree {
    pub operations: Vec<Operation>,
    pub fragments: Vec<FragmentDefinition>,
}

impl QueryTree {
    /// Select the operation to execute
    ///
    /// With a name, the operation of that name. Without one, the document
    /// must contain exactly one operation.
    pub fn operation(&self, name: Option<&str>) -> Result<&Operation, RequestError> {
        match name {
            Some(name) => self
                .operations
                .iter()
                .find(|op| op.name.as_deref() == Some(name))
                .ok_or_else(|| RequestError::UnknownOperation {
                    name: name.to_string(),
                }),
            None => match self.operations.as_slice() {
                [] => Err(RequestError::NoOperation),
                [single] => Ok(single),
                _ => Err(RequestError::AmbiguousOperation),
            },
        }
    }

    /// Look up a fragment definition by name
    pub fn fragment(&self, name: &str) -> Option<&FragmentDefinition> {
        self.fragments.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub variables: Vec<VariableDefinition>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    pub ty: TypeRef,
    pub default_value: Option<InputValue>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: String,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub location: Location,
}

pub type SelectionSet = Vec<Selection>;

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(Field),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

impl Selection {
    pub fn directives(&self) -> &[Directive] {
        match self {
            Selection::Field(field) => &field.directives,
            Selection::FragmentSpread(spread) => &spread.directives,
            Selection::InlineFragment(fragment) => &fragment.directives,
        }
    }

    pub fn location(&self) -> Location {
        match self {
            Selection::Field(field) => field.location,
            Selection::FragmentSpread(spread) => spread.location,
            Selection::InlineFragment(fragment) => fragment.location,
        }
    }
}

/// One requested field
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<(String, InputValue)>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub location: Location,
}

impl Field {
    /// Key under which the field appears in the response
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn argument(&self, name: &str) -> Option<&InputValue> {
        self.arguments
            .iter()
            .find(|(arg, _)| arg == name)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSpread {
    pub fragment_name: String,
    pub directives: Vec<Directive>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragment {
    pub type_condition: Option<String>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub arguments: Vec<(String, InputValue)>,
    pub location: Location,
}

impl Directive {
    pub fn argument(&self, name: &str) -> Option<&InputValue> {
        self.arguments
            .iter()
            .find(|(arg, _)| arg == name)
            .map(|(_, value)| value)
    }
}

/// A literal or variable reference in argument position
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Null,
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Enum(String),
    List(Vec<InputValue>),
    Object(IndexMap<String, InputValue>),
    Variable(String),
}

impl InputValue {
    /// Convert a constant value to JSON, substituting variables from `variables`
    ///
    /// Missing variables become `null`. Enum literals become strings.
    pub fn to_json(&self, variables: &IndexMap<String, Value>) -> Value {
        match self {
            InputValue::Null => Value::Null,
            InputValue::Int(i) => Value::from(*i),
            InputValue::Float(f) => Value::from(*f),
            InputValue::String(s) => Value::String(s.clone()),
            InputValue::Boolean(b) => Value::Bool(*b),
            InputValue::Enum(e) => Value::String(e.clone()),
            InputValue::List(items) => {
                Value::Array(items.iter().map(|v| v.to_json(variables)).collect())
            }
            InputValue::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json(variables)))
                    .collect(),
            ),
            InputValue::Variable(name) => variables.get(name).cloned().unwrap_or(Value::Null),
        }
    }

    /// Names of all variables referenced by this value
    pub fn variables(&self) -> Vec<&str> {
        match self {
            InputValue::Variable(name) => vec![name.as_str()],
            InputValue::List(items) => items.iter().flat_map(InputValue::variables).collect(),
            InputValue::Object(fields) => {
                fields.values().flat_map(InputValue::variables).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_selection_single_anonymous() {
        let tree = parse("{ hero { name } }").expect("should parse");
        let op = tree.operation(None).expect("single operation");
        assert_eq!(op.kind, OperationKind::Query);
        assert!(op.name.is_none());
    }

    #[test]
    fn test_operation_selection_by_name() {
        let tree = parse("query A { a } query B { b }").expect("should parse");
        let op = tree.operation(Some("B")).expect("named operation");
        assert_eq!(op.name.as_deref(), Some("B"));
    }

    #[test]
    fn test_operation_selection_ambiguous() {
        let tree = parse("query A { a } query B { b }").expect("should parse");
        assert_eq!(
            tree.operation(None).unwrap_err(),
            RequestError::AmbiguousOperation
        );
    }

    #[test]
    fn test_operation_selection_unknown_name() {
        let tree = parse("query A { a }").expect("should parse");
        assert!(matches!(
            tree.operation(Some("Z")),
            Err(RequestError::UnknownOperation { .. })
        ));
    }

    #[test]
    fn test_operation_selection_fragment_only_document() {
        let tree = parse("fragment F on Human { name }").expect("should parse");
        assert_eq!(tree.operation(None).unwrap_err(), RequestError::NoOperation);
    }

    #[test]
    fn test_input_value_to_json_substitutes_variables() {
        let mut fields = IndexMap::new();
        fields.insert("stars".to_string(), InputValue::Variable("stars".to_string()));
        fields.insert("episode".to_string(), InputValue::Enum("JEDI".to_string()));
        let value = InputValue::Object(fields);

        let mut variables = IndexMap::new();
        variables.insert("stars".to_string(), json!(5));

        assert_eq!(
            value.to_json(&variables),
            json!({ "stars": 5, "episode": "JEDI" })
        );
        assert_eq!(value.variables(), vec!["stars"]);
    }

    #[test]
    fn test_response_key_prefers_alias() {
        let tree = parse("{ luke: human(id: \"1000\") { name } }").expect("should parse");
        let Selection::Field(field) = &tree.operations[0].selection_set[0] else {
            panic!("expected a field");
        };
        assert_eq!(field.response_key(), "luke");
        assert_eq!(field.name, "human");
        assert_eq!(
            field.argument("id"),
            Some(&InputValue::String("1000".to_string()))
        );
    }
}
