//! Bundled Star Wars schema
//!
//! The server serves this schema unless the embedding application supplies
//! its own. Data lives in memory in a [`StarWarsStore`].

mod data;
mod resolvers;

pub use data::{
    Droid, Episode, Human, LengthUnit, Node, Review, ReviewInput, StarWarsStore, Starship,
};

use crate::core::SchemaBuildError;
use crate::schema::{Schema, SchemaBuilder};
use resolvers::{StoreFn, StoreResolver};
use std::sync::Arc;

/// SDL of the Star Wars schema
pub const SDL: &str = include_str!("schema.graphql");

/// Builder for the Star Wars schema with every field bound to `store`
pub fn schema_builder(store: Arc<StarWarsStore>) -> SchemaBuilder {
    let bindings: [(&str, &str, StoreFn); 15] = [
        ("Query", "hero", resolvers::hero),
        ("Query", "reviews", resolvers::reviews),
        ("Query", "search", resolvers::search),
        ("Query", "character", resolvers::character),
        ("Query", "droid", resolvers::droid),
        ("Query", "human", resolvers::human),
        ("Query", "starship", resolvers::starship),
        ("Mutation", "createReview", resolvers::create_review),
        ("Human", "height", resolvers::human_height),
        ("Human", "friends", resolvers::friends),
        ("Human", "friendsConnection", resolvers::friends_connection),
        ("Human", "starships", resolvers::starships),
        ("Droid", "friends", resolvers::friends),
        ("Droid", "friendsConnection", resolvers::friends_connection),
        ("Starship", "length", resolvers::starship_length),
    ];

    let mut builder = Schema::build(SDL);
    for (type_name, field_name, f) in bindings {
        builder = builder.resolver(type_name, field_name, StoreResolver::new(store.clone(), f));
    }

    builder
        .properties("Human", &["id", "name", "mass", "appearsIn"])
        .properties("Droid", &["id", "name", "appearsIn", "primaryFunction"])
        .properties("Starship", &["id", "name", "history"])
        .properties(
            "FriendsConnection",
            &["totalCount", "edges", "friends", "pageInfo"],
        )
        .properties("FriendsEdge", &["cursor", "node"])
        .properties("PageInfo", &["startCursor", "endCursor", "hasNextPage"])
        .properties("Review", &["stars", "commentary", "time"])
}

/// The Star Wars schema over a fresh store
pub fn schema() -> Result<Schema, SchemaBuildError> {
    schema_builder(Arc::new(StarWarsStore::new())).build()
}
