//! Object graph values
//!
//! [`Value`] is the in-memory payload handed to the codec: task arguments
//! built from scalars, containers and entities, nested to any depth.

use crate::entity::Entity;
use std::collections::BTreeMap;

/// Task payload value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value
    #[default]
    Null,

    /// Boolean
    Bool(bool),

    /// Signed integer
    Int(i64),

    /// Floating point
    Float(f64),

    /// UTF-8 string
    Str(String),

    /// Raw bytes
    Bytes(Vec<u8>),

    /// Ordered sequence
    List(Vec<Value>),

    /// String-keyed mapping
    Map(BTreeMap<String, Value>),

    /// Persisted entity
    Entity(Entity),
}

impl Value {
    /// Build a map value from key/value pairs
    #[must_use]
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Entity payload, if this is one
    #[inline]
    #[must_use]
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// Map lookup, if this is a map
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(m) => m.get(key),
            _ => None,
        }
    }

    /// Visit every entity in the graph, depth first
    pub fn for_each_entity<'a>(&'a self, f: &mut impl FnMut(&'a Entity)) {
        match self {
            Self::Entity(e) => f(e),
            Self::List(items) => items.iter().for_each(|v| v.for_each_entity(f)),
            Self::Map(m) => m.values().for_each(|v| v.for_each_entity(f)),
            _ => {}
        }
    }

    /// Count the entities in the graph
    #[must_use]
    pub fn entity_count(&self) -> usize {
        let mut count = 0;
        self.for_each_entity(&mut |_| count += 1);
        count
    }
}

impl From<Entity> for Value {
    fn from(e: Entity) -> Self {
        Self::Entity(e)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}
