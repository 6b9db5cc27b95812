//! Resolver bindings
//!
//! A [`Resolver`] produces the value of one schema field from its parent
//! value and arguments. Resolvers are bound to `(type, field)` pairs when the
//! schema is built; at request time the executor looks them up by key and
//! calls them through the trait object.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::core::{FieldError, FieldResult, ResponsePath};

/// Everything a resolver gets to see about the field it resolves
#[derive(Debug, Clone)]
pub struct ResolverContext {
    /// Value produced by the parent field (the root value for root fields)
    pub parent: Arc<Value>,

    /// Coerced argument values, defaults applied
    pub args: Arguments,

    /// Name of the parent object type
    pub type_name: String,

    /// Name of the field being resolved
    pub field_name: String,

    /// Path of the field in the response
    pub path: ResponsePath,

    /// Cancelled when the request times out or the client goes away
    pub cancellation: CancellationToken,
}

impl ResolverContext {
    /// Value of `key` in the parent object, `Null` when missing
    pub fn parent_field(&self, key: &str) -> Value {
        self.parent.get(key).cloned().unwrap_or(Value::Null)
    }

    /// Fail with a standard error if the request has been cancelled
    pub fn ensure_active(&self) -> FieldResult<()> {
        if self.cancellation.is_cancelled() {
            Err(FieldError::new("request cancelled"))
        } else {
            Ok(())
        }
    }
}

/// Coerced argument values of a field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(IndexMap<String, Value>);

impl Arguments {
    pub fn new(values: IndexMap<String, Value>) -> Self {
        Self(values)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Required string argument
    pub fn require_str(&self, name: &str) -> FieldResult<&str> {
        self.get_str(name)
            .ok_or_else(|| FieldError::new(format!("Missing required argument '{}'", name)))
    }

    /// Deserialize an argument into a typed value
    pub fn parse<T: DeserializeOwned>(&self, name: &str) -> FieldResult<T> {
        let value = self.0.get(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| FieldError::new(format!("Invalid argument '{}': {}", name, e)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// Produces the value of one schema field
///
/// # Example
///
/// ```rust,ignore
/// struct HeroResolver(Arc<StarWarsStore>);
///
/// #[async_trait]
/// impl Resolver for HeroResolver {
///     async fn resolve(&self, ctx: ResolverContext) -> FieldResult<Value> {
///         let episode = ctx.args.get_str("episode");
///         Ok(self.0.hero(episode))
///     }
/// }
/// ```
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, ctx: ResolverContext) -> FieldResult<Value>;
}

/// Resolver backed by an async closure
pub struct FnResolver<F> {
    f: F,
}

impl<F> FnResolver<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Resolver for FnResolver<F>
where
    F: Fn(ResolverContext) -> Fut + Send + Sync,
    Fut: Future<Output = FieldResult<Value>> + Send + 'static,
{
    async fn resolve(&self, ctx: ResolverContext) -> FieldResult<Value> {
        (self.f)(ctx).await
    }
}

/// Resolver returning `parent[key]`, or `null` when the key is absent
#[derive(Debug, Clone)]
pub struct PropertyResolver {
    key: String,
}

impl PropertyResolver {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl Resolver for PropertyResolver {
    async fn resolve(&self, ctx: ResolverContext) -> FieldResult<Value> {
        Ok(ctx.parent_field(&self.key))
    }
}

/// Resolver returning a fixed value
#[derive(Debug, Clone)]
pub struct ConstResolver {
    value: Value,
}

impl ConstResolver {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

#[async_trait]
impl Resolver for ConstResolver {
    async fn resolve(&self, _ctx: ResolverContext) -> FieldResult<Value> {
        Ok(self.value.clone())
    }
}
