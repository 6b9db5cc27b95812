//! Query validation
//!
//! Checks a [`QueryTree`] against the shapes of a [`Schema`] before any
//! resolver runs. Only type and field declarations are consulted, never the
//! resolver bindings, so a document that validates here may still produce
//! field errors during execution.
//!
//! All rule violations of a document are collected and returned together;
//! the executor rejects the request as a whole when the list is not empty.

use indexmap::IndexMap;
use std::collections::HashSet;

use crate::core::{GraphQLError, Location};
use crate::query::{
    Directive, Field, FragmentDefinition, InputValue, Operation, OperationKind, QueryTree,
    Selection, SelectionSet,
};
use crate::schema::{Schema, TypeDef, TypeKind};

/// Fields sharing a response key, each with the type it was selected on
type KeyedFields<'a> = IndexMap<&'a str, Vec<(&'a TypeDef, &'a Field)>>;

/// Meta fields available on every composite type
const TYPENAME_FIELD: &str = "__typename";

/// Meta fields available on the query root only
const SCHEMA_FIELD: &str = "__schema";
const TYPE_FIELD: &str = "__type";

/// Tunables of the validator
#[derive(Debug, Clone, Copy)]
pub struct ValidationOptions {
    /// Accept `__schema` and `__type` on the query root
    pub introspection: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            introspection: true,
        }
    }
}

/// Validate a document with the default options
pub fn validate(schema: &Schema, tree: &QueryTree) -> Result<(), Vec<GraphQLError>> {
    validate_with(schema, tree, ValidationOptions::default())
}

/// Validate a document
pub fn validate_with(
    schema: &Schema,
    tree: &QueryTree,
    options: ValidationOptions,
) -> Result<(), Vec<GraphQLError>> {
    let mut validator = Validator {
        schema,
        tree,
        options,
        errors: Vec::new(),
    };

    validator.check_operations();
    validator.check_fragments();
    // Merging walks fragment spreads, so it needs a document free of cycles and unknown names
    if validator.errors.is_empty() {
        validator.check_field_merging();
    }

    if validator.errors.is_empty() {
        Ok(())
    } else {
        tracing::debug!(errors = validator.errors.len(), "query failed validation");
        Err(validator.errors)
    }
}

struct Validator<'a> {
    schema: &'a Schema,
    tree: &'a QueryTree,
    options: ValidationOptions,
    errors: Vec<GraphQLError>,
}

impl<'a> Validator<'a> {
    fn report(&mut self, message: String, location: Location) {
        self.errors
            .push(GraphQLError::new(message).with_location(location));
    }

    // =========================================================================
    // Operations
    // =========================================================================

    fn check_operations(&mut self) {
        let schema = self.schema;
        let tree = self.tree;
        let mut seen = HashSet::new();

        for op in &tree.operations {
            match &op.name {
                Some(name) => {
                    if !seen.insert(name.as_str()) {
                        self.report(
                            format!("There can be only one operation named \"{}\".", name),
                            op.location,
                        );
                    }
                }
                None if tree.operations.len() > 1 => {
                    self.report(
                        "This anonymous operation must be the only defined operation.".to_string(),
                        op.location,
                    );
                }
                None => {}
            }

            for directive in &op.directives {
                self.report(
                    format!(
                        "Directive \"@{}\" may not be used on {}.",
                        directive.name,
                        op.kind.as_str().to_uppercase()
                    ),
                    directive.location,
                );
            }

            self.check_variables(op);

            let root = match op.kind {
                OperationKind::Query => Some(schema.query_type()),
                OperationKind::Mutation => schema.mutation_type(),
                OperationKind::Subscription => None,
            };
            match root {
                Some(root) => self.check_selection_set(root, &op.selection_set),
                None => self.report(
                    format!("Schema is not configured for {}s.", op.kind.as_str()),
                    op.location,
                ),
            }
        }
    }

    fn check_variables(&mut self, op: &'a Operation) {
        let schema = self.schema;
        let mut defined = HashSet::new();

        for var in &op.variables {
            if !defined.insert(var.name.as_str()) {
                self.report(
                    format!("There can be only one variable named \"${}\".", var.name),
                    var.location,
                );
            }

            let is_input = schema
                .get_type(var.ty.base_name())
                .is_some_and(TypeDef::is_input);
            if !is_input {
                self.report(
                    format!(
                        "Variable \"${}\" cannot be non-input type \"{}\".",
                        var.name, var.ty
                    ),
                    var.location,
                );
            }
        }

        let mut usages = Vec::new();
        let mut visited = HashSet::new();
        self.collect_variable_usages(&op.selection_set, &mut usages, &mut visited);

        for (name, location) in usages {
            if defined.contains(name) {
                continue;
            }
            let message = match &op.name {
                Some(op_name) => format!(
                    "Variable \"${}\" is not defined by operation \"{}\".",
                    name, op_name
                ),
                None => format!("Variable \"${}\" is not defined.", name),
            };
            self.report(message, location);
        }
    }

    /// Variables referenced by a selection set, following fragment spreads
    fn collect_variable_usages(
        &self,
        set: &'a SelectionSet,
        usages: &mut Vec<(&'a str, Location)>,
        visited: &mut HashSet<&'a str>,
    ) {
        let tree = self.tree;
        let directive_usages = |directives: &'a [Directive], usages: &mut Vec<(&'a str, Location)>| {
            for directive in directives {
                for (_, value) in &directive.arguments {
                    usages.extend(value.variables().into_iter().map(|v| (v, directive.location)));
                }
            }
        };

        for selection in set {
            directive_usages(selection.directives(), usages);

            match selection {
                Selection::Field(field) => {
                    for (_, value) in &field.arguments {
                        usages.extend(value.variables().into_iter().map(|v| (v, field.location)));
                    }
                    self.collect_variable_usages(&field.selection_set, usages, visited);
                }
                Selection::InlineFragment(fragment) => {
                    self.collect_variable_usages(&fragment.selection_set, usages, visited);
                }
                Selection::FragmentSpread(spread) => {
                    if !visited.insert(spread.fragment_name.as_str()) {
                        continue;
                    }
                    if let Some(fragment) = tree.fragment(&spread.fragment_name) {
                        self.collect_variable_usages(&fragment.selection_set, usages, visited);
                    }
                }
            }
        }
    }

    // =========================================================================
    // Fragments
    // =========================================================================

    fn check_fragments(&mut self) {
        let tree = self.tree;
        let mut seen = HashSet::new();

        for fragment in &tree.fragments {
            if !seen.insert(fragment.name.as_str()) {
                self.report(
                    format!("There can be only one fragment named \"{}\".", fragment.name),
                    fragment.location,
                );
            }

            for directive in &fragment.directives {
                self.report(
                    format!(
                        "Directive \"@{}\" may not be used on FRAGMENT_DEFINITION.",
                        directive.name
                    ),
                    directive.location,
                );
            }

            if self.spreads_into(&fragment.name, &fragment.selection_set, &mut HashSet::new()) {
                self.report(
                    format!("Cannot spread fragment \"{}\" within itself.", fragment.name),
                    fragment.location,
                );
            }

            if let Some(ty) = self.composite_condition(&fragment.type_condition, fragment) {
                self.check_selection_set(ty, &fragment.selection_set);
            }
        }
    }

    /// Type of a fragment's type condition, reporting unknown or leaf types
    fn composite_condition(
        &mut self,
        type_name: &str,
        fragment: &FragmentDefinition,
    ) -> Option<&'a TypeDef> {
        let schema = self.schema;
        match schema.get_type(type_name) {
            Some(ty) if ty.is_composite() => Some(ty),
            Some(_) => {
                self.report(
                    format!(
                        "Fragment \"{}\" cannot condition on non composite type \"{}\".",
                        fragment.name, type_name
                    ),
                    fragment.location,
                );
                None
            }
            None => {
                self.report(format!("Unknown type \"{}\".", type_name), fragment.location);
                None
            }
        }
    }

    /// Whether `set` spreads `target`, directly or through other fragments
    fn spreads_into(
        &self,
        target: &str,
        set: &'a SelectionSet,
        visited: &mut HashSet<&'a str>,
    ) -> bool {
        let tree = self.tree;
        set.iter().any(|selection| match selection {
            Selection::Field(field) => self.spreads_into(target, &field.selection_set, visited),
            Selection::InlineFragment(fragment) => {
                self.spreads_into(target, &fragment.selection_set, visited)
            }
            Selection::FragmentSpread(spread) => {
                if spread.fragment_name == target {
                    return true;
                }
                if !visited.insert(spread.fragment_name.as_str()) {
                    return false;
                }
                tree.fragment(&spread.fragment_name)
                    .is_some_and(|f| self.spreads_into(target, &f.selection_set, visited))
            }
        })
    }

    // =========================================================================
    // Selections
    // =========================================================================

    fn check_selection_set(&mut self, parent: &'a TypeDef, set: &'a SelectionSet) {
        let schema = self.schema;
        let tree = self.tree;
        for selection in set {
            self.check_directives(selection.directives());

            match selection {
                Selection::Field(field) => self.check_field(parent, field),
                Selection::FragmentSpread(spread) => {
                    let Some(fragment) = tree.fragment(&spread.fragment_name) else {
                        self.report(
                            format!("Unknown fragment \"{}\".", spread.fragment_name),
                            spread.location,
                        );
                        continue;
                    };
                    let known = schema.get_type(&fragment.type_condition).is_some();
                    if known && !schema.types_overlap(&parent.name, &fragment.type_condition) {
                        self.report(
                            format!(
                                "Fragment \"{}\" cannot be spread here as objects of type \"{}\" can never be of type \"{}\".",
                                fragment.name, parent.name, fragment.type_condition
                            ),
                            spread.location,
                        );
                    }
                }
                Selection::InlineFragment(fragment) => {
                    let Some(condition) = &fragment.type_condition else {
                        self.check_selection_set(parent, &fragment.selection_set);
                        continue;
                    };
                    match schema.get_type(condition) {
                        Some(ty) if ty.is_composite() => {
                            if !schema.types_overlap(&parent.name, condition) {
                                self.report(
                                    format!(
                                        "Fragment cannot be spread here as objects of type \"{}\" can never be of type \"{}\".",
                                        parent.name, condition
                                    ),
                                    fragment.location,
                                );
                            }
                            self.check_selection_set(ty, &fragment.selection_set);
                        }
                        Some(_) => self.report(
                            format!(
                                "Fragment cannot condition on non composite type \"{}\".",
                                condition
                            ),
                            fragment.location,
                        ),
                        None => {
                            self.report(format!("Unknown type \"{}\".", condition), fragment.location)
                        }
                    }
                }
            }
        }
    }

    fn check_field(&mut self, parent: &'a TypeDef, field: &'a Field) {
        let schema = self.schema;
        if field.name == TYPENAME_FIELD {
            if !field.selection_set.is_empty() {
                self.report(
                    format!(
                        "Field \"{}\" must not have a selection since type \"String!\" has no subfields.",
                        field.name
                    ),
                    field.location,
                );
            }
            return;
        }

        let on_query_root = parent.name == schema.query_type().name;
        if on_query_root
            && self.options.introspection
            && (field.name == SCHEMA_FIELD || field.name == TYPE_FIELD)
        {
            self.check_meta_field(field);
            return;
        }

        let Some(definition) = parent.field(&field.name) else {
            self.report(
                format!(
                    "Cannot query field \"{}\" on type \"{}\".",
                    field.name, parent.name
                ),
                field.location,
            );
            return;
        };

        for (name, _) in &field.arguments {
            if !definition.arguments.contains_key(name) {
                self.report(
                    format!(
                        "Unknown argument \"{}\" on field \"{}.{}\".",
                        name, parent.name, field.name
                    ),
                    field.location,
                );
            }
        }

        for argument in definition.arguments.values() {
            let provided = field
                .argument(&argument.name)
                .is_some_and(|v| *v != InputValue::Null);
            if argument.ty.is_non_null() && argument.default_value.is_none() && !provided {
                self.report(
                    format!(
                        "Field \"{}\" argument \"{}\" of type \"{}\" is required, but it was not provided.",
                        field.name, argument.name, argument.ty
                    ),
                    field.location,
                );
            }
        }

        let Some(return_type) = schema.get_type(definition.ty.base_name()) else {
            return;
        };

        match (return_type.is_composite(), field.selection_set.is_empty()) {
            (true, true) => self.report(
                format!(
                    "Field \"{}\" of type \"{}\" must have a selection of subfields.",
                    field.name, definition.ty
                ),
                field.location,
            ),
            (false, false) => self.report(
                format!(
                    "Field \"{}\" must not have a selection since type \"{}\" has no subfields.",
                    field.name, definition.ty
                ),
                field.location,
            ),
            (true, false) => self.check_selection_set(return_type, &field.selection_set),
            (false, true) => {}
        }
    }

    /// `__schema` and `__type`; their sub-selections are not checked
    fn check_meta_field(&mut self, field: &Field) {
        if field.name == TYPE_FIELD && field.argument("name").is_none() {
            self.report(
                "Field \"__type\" argument \"name\" of type \"String!\" is required, but it was not provided."
                    .to_string(),
                field.location,
            );
        }
        if field.selection_set.is_empty() {
            self.report(
                format!(
                    "Field \"{}\" must have a selection of subfields.",
                    field.name
                ),
                field.location,
            );
        }
    }

    // =========================================================================
    // Field merging
    // =========================================================================

    fn check_field_merging(&mut self) {
        let schema = self.schema;
        let tree = self.tree;
        for op in &tree.operations {
            let root = match op.kind {
                OperationKind::Query => Some(schema.query_type()),
                OperationKind::Mutation => schema.mutation_type(),
                OperationKind::Subscription => None,
            };
            if let Some(root) = root {
                self.check_merge(root, vec![&op.selection_set]);
            }
        }
    }

    /// Fields answering under one response key must be the same field with
    /// the same arguments, unless they sit on two distinct object types
    fn check_merge(&mut self, parent: &'a TypeDef, sets: Vec<&'a SelectionSet>) {
        let schema = self.schema;
        let mut grouped = KeyedFields::new();
        let mut visited = HashSet::new();
        for set in sets {
            self.collect_keyed_fields(parent, set, &mut grouped, &mut visited);
        }

        for (key, fields) in grouped {
            if let Some((message, location)) = merge_conflict(key, &fields) {
                self.report(message, location);
                continue;
            }

            let sub_type = |(owner, field): (&'a TypeDef, &'a Field)| {
                owner
                    .field(&field.name)
                    .and_then(|definition| schema.get_type(definition.ty.base_name()))
                    .filter(|ty| ty.is_composite())
            };

            let (_, first) = fields[0];
            if fields.iter().all(|(_, f)| f.name == first.name) {
                if let Some(ty) = sub_type(fields[0]) {
                    self.check_merge(ty, fields.iter().map(|(_, f)| &f.selection_set).collect());
                }
            } else {
                for &entry in &fields {
                    if let Some(ty) = sub_type(entry) {
                        self.check_merge(ty, vec![&entry.1.selection_set]);
                    }
                }
            }
        }
    }

    fn collect_keyed_fields(
        &self,
        parent: &'a TypeDef,
        set: &'a SelectionSet,
        grouped: &mut KeyedFields<'a>,
        visited: &mut HashSet<&'a str>,
    ) {
        let schema = self.schema;
        let tree = self.tree;
        for selection in set {
            match selection {
                Selection::Field(field) => grouped
                    .entry(field.response_key())
                    .or_default()
                    .push((parent, field)),
                Selection::InlineFragment(fragment) => {
                    let owner = fragment
                        .type_condition
                        .as_deref()
                        .and_then(|condition| schema.get_type(condition))
                        .unwrap_or(parent);
                    self.collect_keyed_fields(owner, &fragment.selection_set, grouped, visited);
                }
                Selection::FragmentSpread(spread) => {
                    if !visited.insert(spread.fragment_name.as_str()) {
                        continue;
                    }
                    if let Some(fragment) = tree.fragment(&spread.fragment_name) {
                        let owner = schema.get_type(&fragment.type_condition).unwrap_or(parent);
                        self.collect_keyed_fields(owner, &fragment.selection_set, grouped, visited);
                    }
                }
            }
        }
    }

    fn check_directives(&mut self, directives: &[Directive]) {
        for directive in directives {
            if directive.name != "skip" && directive.name != "include" {
                self.report(
                    format!("Unknown directive \"@{}\".", directive.name),
                    directive.location,
                );
                continue;
            }
            if directive.argument("if").is_none() {
                self.report(
                    format!(
                        "Directive \"@{}\" argument \"if\" of type \"Boolean!\" is required, but it was not provided.",
                        directive.name
                    ),
                    directive.location,
                );
            }
        }
    }
}

/// First pair of fields under `key` that cannot answer as one
fn merge_conflict(key: &str, fields: &[(&TypeDef, &Field)]) -> Option<(String, Location)> {
    for (i, (owner_a, a)) in fields.iter().enumerate() {
        for (owner_b, b) in &fields[i + 1..] {
            let exclusive = owner_a.name != owner_b.name
                && owner_a.kind == TypeKind::Object
                && owner_b.kind == TypeKind::Object;
            if exclusive {
                continue;
            }

            if a.name != b.name {
                return Some((
                    format!(
                        "Fields \"{}\" conflict because \"{}\" and \"{}\" are different fields. Use different aliases on the fields to fetch both if this was intentional.",
                        key, a.name, b.name
                    ),
                    b.location,
                ));
            }
            if !same_arguments(a, b) {
                return Some((
                    format!(
                        "Fields \"{}\" conflict because they have differing arguments. Use different aliases on the fields to fetch both if this was intentional.",
                        key
                    ),
                    b.location,
                ));
            }
        }
    }
    None
}

fn same_arguments(a: &Field, b: &Field) -> bool {
    a.arguments.len() == b.arguments.len()
        && a.arguments
            .iter()
            .all(|(name, value)| b.argument(name) == Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse;
    use crate::schema::ConstResolver;
    use serde_json::Value;

    const SDL: &str = r#"
        enum Episode { NEWHOPE EMPIRE JEDI }
        interface Character { id: ID! name: String! friends: [Character] }
        type Human implements Character { id: ID! name: String! friends: [Character] mass: Float }
        type Droid implements Character { id: ID! name: String! friends: [Character] primaryFunction: String }
        type Query {
            hero(episode: Episode): Character
            droid(id: ID!): Droid
        }
    "#;

    fn schema() -> Schema {
        Schema::build(SDL)
            .resolver("Query", "hero", ConstResolver::new(Value::Null))
            .resolver("Query", "droid", ConstResolver::new(Value::Null))
            .properties("Human", &["id", "name", "friends", "mass"])
            .properties("Droid", &["id", "name", "friends", "primaryFunction"])
            .build()
            .expect("schema should build")
    }

    fn errors(query: &str) -> Vec<String> {
        let tree = parse(query).expect("query should parse");
        match validate(&schema(), &tree) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.into_iter().map(|e| e.message).collect(),
        }
    }

    #[test]
    fn test_valid_query_passes() {
        let query = r#"
            query Hero($episode: Episode, $withFriends: Boolean!) {
                hero(episode: $episode) {
                    __typename
                    name
                    ... on Droid { primaryFunction }
                    ...HumanFields
                    friends @include(if: $withFriends) { name }
                }
            }
            fragment HumanFields on Human { mass }
        "#;
        assert!(errors(query).is_empty(), "{:?}", errors(query));
    }

    #[test]
    fn test_unknown_field_reported_with_location() {
        let tree = parse("{ hero { name age } }").unwrap();
        let errors = validate(&schema(), &tree).expect_err("unknown field");
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "Cannot query field \"age\" on type \"Character\"."
        );
        assert_eq!(errors[0].locations, vec![Location::new(1, 15)]);
    }

    #[test]
    fn test_leaf_and_composite_selections() {
        let errors = errors("{ hero droid(id: \"2001\") { name { first } } }");
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("must have a selection of subfields"));
        assert!(errors[1].contains("must not have a selection"));
    }

    #[test]
    fn test_arguments_checked() {
        let errors = errors("{ droid { name } hero(planet: \"Tatooine\") { name } }");
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("argument \"id\" of type \"ID!\" is required"));
        assert!(errors[1].contains("Unknown argument \"planet\""));
    }

    #[test]
    fn test_undefined_variable() {
        let errors = errors("query Hero { hero(episode: $episode) { name } }");
        assert_eq!(
            errors,
            vec!["Variable \"$episode\" is not defined by operation \"Hero\".".to_string()]
        );
    }

    #[test]
    fn test_variable_used_in_fragment_is_checked() {
        let errors = errors("query { hero { ...F } } fragment F on Character { friends @skip(if: $skip) { name } }");
        assert_eq!(errors, vec!["Variable \"$skip\" is not defined.".to_string()]);
    }

    #[test]
    fn test_fragment_rules() {
        let errors = errors("{ hero { ...Missing ...F } } fragment F on Character { ...G } fragment G on Character { ...F }");
        assert!(errors.iter().any(|e| e == "Unknown fragment \"Missing\"."));
        assert!(errors.iter().any(|e| e == "Cannot spread fragment \"F\" within itself."));
        assert!(errors.iter().any(|e| e == "Cannot spread fragment \"G\" within itself."));
    }

    #[test]
    fn test_fragment_on_leaf_type() {
        let errors = errors("{ hero { ...E } } fragment E on Episode { name }");
        assert!(errors.iter().any(|e| e.contains("non composite type \"Episode\"")));
    }

    #[test]
    fn test_impossible_spread() {
        let errors = errors("{ droid(id: \"2001\") { ... on Human { mass } } }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("can never be of type \"Human\""));
    }

    #[test]
    fn test_operation_names() {
        let errors = errors("query A { hero { name } } query A { hero { id } } { hero { name } }");
        assert!(errors.iter().any(|e| e == "There can be only one operation named \"A\"."));
        assert!(errors.iter().any(|e| e.contains("anonymous operation must be the only")));
    }

    #[test]
    fn test_directives() {
        let errors = errors("{ hero @deprecated { name @skip } }");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], "Unknown directive \"@deprecated\".");
        assert!(errors[1].contains("argument \"if\""));
    }

    #[test]
    fn test_mutation_without_mutation_root() {
        let errors = errors("mutation { hero { name } }");
        assert_eq!(errors, vec!["Schema is not configured for mutations.".to_string()]);
    }

    #[test]
    fn test_introspection_fields_on_query_root() {
        assert!(errors("{ __schema { types { name } } __type(name: \"Droid\") { name } }").is_empty());
        assert!(!errors("{ hero { __schema { types { name } } } }").is_empty());

        let tree = parse("{ __schema { queryType { name } } }").unwrap();
        let disabled = validate_with(&schema(), &tree, ValidationOptions { introspection: false });
        assert!(disabled.is_err());
    }

    #[test]
    fn test_same_key_with_different_arguments_conflicts() {
        let errors = errors(r#"{ a: droid(id: "2000") { name } a: droid(id: "2001") { name } }"#);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Fields \"a\" conflict because they have differing arguments"));
    }

    #[test]
    fn test_same_key_with_different_fields_conflicts() {
        let errors = errors("{ hero { name: id name } }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("\"id\" and \"name\" are different fields"));
    }

    #[test]
    fn test_identical_fields_merge() {
        let query = r#"
            {
                hero { name ...Names friends { name } }
                hero { friends { id } }
                d: droid(id: "2001") { name }
                d: droid(id: "2001") { id }
            }
            fragment Names on Character { name }
        "#;
        assert!(errors(query).is_empty(), "{:?}", errors(query));
    }

    #[test]
    fn test_nested_conflict_across_merged_fields() {
        let errors = errors("{ hero { friends { x: name } } hero { friends { x: id } } }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Fields \"x\" conflict"));
    }

    #[test]
    fn test_distinct_object_types_may_share_a_key() {
        let query = "{ hero { ... on Human { info: mass } ... on Droid { info: primaryFunction } } }";
        assert!(errors(query).is_empty(), "{:?}", errors(query));
    }
}
