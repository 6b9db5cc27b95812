//! Response paths identifying a node of the result tree

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a response path: a response key or a list index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Path from the root of `data` to a field, e.g. `["hero", "friends", 0, "name"]`
///
/// Serializes as a plain JSON array, which is the shape clients expect in the
/// `path` entry of an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponsePath(Vec<PathSegment>);

impl ResponsePath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Path of a field below this node
    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Field(key.to_string()));
        Self(segments)
    }

    /// Path of a list item below this node
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ResponsePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Field(key) if i == 0 => write!(f, "{}", key)?,
                PathSegment::Field(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl<const N: usize> From<[PathSegment; N]> for ResponsePath {
    fn from(segments: [PathSegment; N]) -> Self {
        Self(segments.to_vec())
    }
}
