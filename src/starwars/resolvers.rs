//! Resolvers binding the Star Wars schema to [`StarWarsStore`]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::sync::Arc;

use super::data::{Episode, LengthUnit, Node, ReviewInput, StarWarsStore};
use crate::core::{FieldError, FieldResult};
use crate::schema::{Resolver, ResolverContext};

pub(crate) type StoreFn = fn(&StarWarsStore, &ResolverContext) -> FieldResult<Value>;

/// Resolver calling a plain function with the shared store
pub(crate) struct StoreResolver {
    store: Arc<StarWarsStore>,
    f: StoreFn,
}

impl StoreResolver {
    pub(crate) fn new(store: Arc<StarWarsStore>, f: StoreFn) -> Self {
        Self { store, f }
    }
}

#[async_trait]
impl Resolver for StoreResolver {
    async fn resolve(&self, ctx: ResolverContext) -> FieldResult<Value> {
        ctx.ensure_active()?;
        (self.f)(&self.store, &ctx)
    }
}

fn node(node: Option<Node>) -> Value {
    node.map(|n| n.to_value()).unwrap_or(Value::Null)
}

fn nodes(nodes: Vec<Node>) -> Value {
    Value::Array(nodes.iter().map(Node::to_value).collect())
}

fn to_json(value: impl serde::Serialize) -> FieldResult<Value> {
    Ok(serde_json::to_value(value)?)
}

/// String list stored under `key` in the parent object
fn parent_ids(ctx: &ResolverContext, key: &str) -> Vec<String> {
    serde_json::from_value(ctx.parent_field(key)).unwrap_or_default()
}

// =============================================================================
// Query
// =============================================================================

pub(crate) fn hero(store: &StarWarsStore, ctx: &ResolverContext) -> FieldResult<Value> {
    let episode: Option<Episode> = ctx.args.parse("episode")?;
    Ok(node(store.hero(episode)))
}

pub(crate) fn character(store: &StarWarsStore, ctx: &ResolverContext) -> FieldResult<Value> {
    Ok(node(store.character(ctx.args.require_str("id")?)))
}

pub(crate) fn human(store: &StarWarsStore, ctx: &ResolverContext) -> FieldResult<Value> {
    let id = ctx.args.require_str("id")?;
    Ok(node(store.human(id).cloned().map(Node::Human)))
}

pub(crate) fn droid(store: &StarWarsStore, ctx: &ResolverContext) -> FieldResult<Value> {
    let id = ctx.args.require_str("id")?;
    Ok(node(store.droid(id).cloned().map(Node::Droid)))
}

pub(crate) fn starship(store: &StarWarsStore, ctx: &ResolverContext) -> FieldResult<Value> {
    let id = ctx.args.require_str("id")?;
    Ok(node(store.starship(id).cloned().map(Node::Starship)))
}

pub(crate) fn search(store: &StarWarsStore, ctx: &ResolverContext) -> FieldResult<Value> {
    Ok(nodes(store.search(ctx.args.require_str("text")?)))
}

pub(crate) fn reviews(store: &StarWarsStore, ctx: &ResolverContext) -> FieldResult<Value> {
    let episode: Episode = ctx.args.parse("episode")?;
    let since: Option<DateTime<Utc>> = ctx.args.parse("since")?;
    to_json(store.reviews(episode, since)?)
}

// =============================================================================
// Mutation
// =============================================================================

pub(crate) fn create_review(store: &StarWarsStore, ctx: &ResolverContext) -> FieldResult<Value> {
    let episode: Episode = ctx.args.parse("episode")?;
    let input: ReviewInput = ctx.args.parse("review")?;
    if !(0..=5).contains(&input.stars) {
        return Err(FieldError::new(format!(
            "stars must be between 0 and 5, got {}",
            input.stars
        ))
        .with_extension("code", "BAD_USER_INPUT"));
    }
    to_json(store.add_review(episode, input)?)
}

// =============================================================================
// Characters and starships
// =============================================================================

pub(crate) fn friends(store: &StarWarsStore, ctx: &ResolverContext) -> FieldResult<Value> {
    Ok(nodes(store.characters(&parent_ids(ctx, "friendIds"))))
}

/// Relay-style page over the friends of a character
///
/// Cursors are `cursor<index>`; `after` starts the page right behind the
/// given cursor.
pub(crate) fn friends_connection(
    store: &StarWarsStore,
    ctx: &ResolverContext,
) -> FieldResult<Value> {
    let friends = store.characters(&parent_ids(ctx, "friendIds"));

    let from = match ctx.args.get_str("after") {
        Some(after) => decode_cursor(after)?.saturating_add(1),
        None => 0,
    }
    .min(friends.len());

    let to = match ctx.args.get_i64("first") {
        Some(first) if first < 0 => {
            return Err(FieldError::new("first must not be negative"));
        }
        Some(first) => from.saturating_add(first as usize).min(friends.len()),
        None => friends.len(),
    };

    let page = &friends[from..to];
    let edges: Vec<Value> = page
        .iter()
        .enumerate()
        .map(|(i, friend)| {
            json!({
                "cursor": encode_cursor(from + i),
                "node": friend.to_value(),
            })
        })
        .collect();

    Ok(json!({
        "totalCount": friends.len(),
        "edges": edges,
        "friends": nodes(page.to_vec()),
        "pageInfo": {
            "startCursor": encode_cursor(from),
            "endCursor": encode_cursor(to.saturating_sub(1).max(from)),
            "hasNextPage": to < friends.len(),
        },
    }))
}

fn encode_cursor(index: usize) -> String {
    format!("cursor{}", index)
}

fn decode_cursor(cursor: &str) -> FieldResult<usize> {
    cursor
        .strip_prefix("cursor")
        .and_then(|i| i.parse().ok())
        .ok_or_else(|| FieldError::new(format!("invalid cursor '{}'", cursor)))
}

pub(crate) fn human_height(_store: &StarWarsStore, ctx: &ResolverContext) -> FieldResult<Value> {
    length_in(ctx, "height")
}

pub(crate) fn starship_length(_store: &StarWarsStore, ctx: &ResolverContext) -> FieldResult<Value> {
    length_in(ctx, "length")
}

fn length_in(ctx: &ResolverContext, key: &str) -> FieldResult<Value> {
    let unit: Option<LengthUnit> = ctx.args.parse("unit")?;
    let meters = ctx
        .parent_field(key)
        .as_f64()
        .ok_or_else(|| FieldError::new(format!("{} is unknown", key)))?;
    Ok(json!(unit.unwrap_or_default().from_meters(meters)))
}

pub(crate) fn starships(store: &StarWarsStore, ctx: &ResolverContext) -> FieldResult<Value> {
    let ships = parent_ids(ctx, "starshipIds")
        .iter()
        .filter_map(|id| store.starship(id).cloned().map(Node::Starship))
        .collect();
    Ok(nodes(ships))
}
