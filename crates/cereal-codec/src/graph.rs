//! Generic object-graph codec
//!
//! Walks a [`Value`] into a wire [`Node`] tree and back. Entities are the
//! only values whose encoding is pluggable: the encoder consults the
//! [`HookSnapshot`] it was given, and the decoder replays reductions
//! through a [`ConstructorTable`].
//!
//! # Entity encoding
//! 1. `get_state` bound: [`Node::State`] from the hook (state transfer
//!    takes precedence over `reduce`)
//! 2. `reduce` bound: [`Node::Reduce`] from the hook
//! 3. neither: [`Node::State`] with every field

use crate::error::CodecError;
use cereal_model::{
    default_get_state, default_set_state, Entity, HookSnapshot, ModelName, PrimaryKey, StateMap,
    Value,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Wire format version written by this codec
pub const WIRE_VERSION: u8 = 1;

/// Top-level payload
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    v: u8,
    root: Node,
}

/// Encoded form of a [`Value`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Finite float
    Float(f64),
    /// String
    Str(String),
    /// Bytes
    Bytes(Vec<u8>),
    /// Sequence
    List(Vec<Node>),
    /// Mapping
    Map(BTreeMap<String, Node>),
    /// Entity encoded as a reconstruction recipe
    Reduce {
        /// Registered constructor name
        constructor: String,
        /// Constructor arguments
        args: serde_json::Value,
    },
    /// Entity encoded as a state snapshot
    State {
        /// Model of the entity
        model: ModelName,
        /// Primary key at encode time
        pk: Option<PrimaryKey>,
        /// Parent models
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        parents: Vec<ModelName>,
        /// Captured state
        state: StateMap,
    },
}

/// Reconstruction function for [`Node::Reduce`]
pub type Constructor = Arc<dyn Fn(&serde_json::Value) -> Result<Entity, CodecError> + Send + Sync>;

/// Constructors the decoder is allowed to call
///
/// Anything not registered here is refused at decode time, so a payload
/// can only trigger reconstruction paths the receiver opted into.
#[derive(Clone, Default)]
pub struct ConstructorTable {
    entries: HashMap<String, Constructor>,
}

impl ConstructorTable {
    /// Create empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor, replacing any previous one with that name
    pub fn register(&mut self, name: impl Into<String>, constructor: Constructor) {
        self.entries.insert(name.into(), constructor);
    }

    /// Find a constructor
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Constructor> {
        self.entries.get(name)
    }

    /// Check if a constructor is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for ConstructorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorTable")
            .field("entries", &self.names())
            .finish()
    }
}

/// Value -> Node walker
#[derive(Debug)]
pub struct GraphEncoder<'a> {
    hooks: &'a HookSnapshot,
    max_depth: usize,
}

impl<'a> GraphEncoder<'a> {
    /// Create encoder over a hook configuration
    #[inline]
    #[must_use]
    pub fn new(hooks: &'a HookSnapshot, max_depth: usize) -> Self {
        Self { hooks, max_depth }
    }

    /// Encode a value graph
    ///
    /// # Errors
    /// Returns error on excessive nesting or non-finite floats
    pub fn encode(&self, value: &Value) -> Result<Node, CodecError> {
        self.walk(value, 0)
    }

    fn walk(&self, value: &Value, depth: usize) -> Result<Node, CodecError> {
        if depth > self.max_depth {
            return Err(CodecError::DepthExceeded(self.max_depth));
        }

        Ok(match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(*b),
            Value::Int(n) => Node::Int(*n),
            Value::Float(x) if !x.is_finite() => return Err(CodecError::NonFiniteFloat(*x)),
            Value::Float(x) => Node::Float(*x),
            Value::Str(s) => Node::Str(s.clone()),
            Value::Bytes(b) => Node::Bytes(b.clone()),
            Value::List(items) => Node::List(
                items
                    .iter()
                    .map(|item| self.walk(item, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Map(entries) => Node::Map(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.walk(v, depth + 1)?)))
                    .collect::<Result<_, CodecError>>()?,
            ),
            Value::Entity(entity) => self.reduce_entity(entity),
        })
    }

    fn reduce_entity(&self, entity: &Entity) -> Node {
        if let Some(get_state) = &self.hooks.get_state {
            tracing::trace!(entity = %entity, "capturing entity state via get_state");
            return state_node(entity, get_state(entity));
        }

        if let Some(reduce) = &self.hooks.reduce {
            let reduction = reduce(entity);
            tracing::trace!(entity = %entity, constructor = %reduction.constructor, "reduced entity");
            return Node::Reduce {
                constructor: reduction.constructor,
                args: reduction.args,
            };
        }

        tracing::trace!(entity = %entity, "capturing full entity state");
        state_node(entity, default_get_state(entity))
    }
}

fn state_node(entity: &Entity, state: StateMap) -> Node {
    Node::State {
        model: entity.model().clone(),
        pk: entity.pk().cloned(),
        parents: entity.parents().to_vec(),
        state,
    }
}

/// Node -> Value rebuilder
#[derive(Debug)]
pub struct GraphDecoder<'a> {
    hooks: &'a HookSnapshot,
    constructors: &'a ConstructorTable,
    max_depth: usize,
}

impl<'a> GraphDecoder<'a> {
    /// Create decoder
    #[inline]
    #[must_use]
    pub fn new(hooks: &'a HookSnapshot, constructors: &'a ConstructorTable, max_depth: usize) -> Self {
        Self {
            hooks,
            constructors,
            max_depth,
        }
    }

    /// Rebuild a value graph
    ///
    /// # Errors
    /// Returns error on unknown constructors, excessive nesting, or any
    /// failure raised by a constructor (store errors pass through as-is)
    pub fn decode(&self, node: Node) -> Result<Value, CodecError> {
        self.walk(node, 0)
    }

    fn walk(&self, node: Node, depth: usize) -> Result<Value, CodecError> {
        if depth > self.max_depth {
            return Err(CodecError::DepthExceeded(self.max_depth));
        }

        Ok(match node {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(b),
            Node::Int(n) => Value::Int(n),
            Node::Float(x) => Value::Float(x),
            Node::Str(s) => Value::Str(s),
            Node::Bytes(b) => Value::Bytes(b),
            Node::List(items) => Value::List(
                items
                    .into_iter()
                    .map(|item| self.walk(item, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            Node::Map(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| Ok((k, self.walk(v, depth + 1)?)))
                    .collect::<Result<_, CodecError>>()?,
            ),
            Node::Reduce { constructor, args } => {
                let build = self
                    .constructors
                    .get(&constructor)
                    .ok_or_else(|| CodecError::UnknownConstructor(constructor.clone()))?;
                Value::Entity(build(&args)?)
            }
            Node::State {
                model,
                pk,
                parents,
                state,
            } => Value::Entity(self.rebuild_state(model, pk, parents, state)),
        })
    }

    fn rebuild_state(
        &self,
        model: ModelName,
        pk: Option<PrimaryKey>,
        parents: Vec<ModelName>,
        state: StateMap,
    ) -> Entity {
        let mut entity = parents
            .into_iter()
            .fold(Entity::new(model), Entity::inherits);
        entity.set_pk(pk);

        match &self.hooks.set_state {
            Some(set_state) => set_state(&mut entity, state),
            None => default_set_state(&mut entity, state),
        }
        entity
    }
}

/// Encode a value graph to payload bytes
///
/// # Errors
/// See [`GraphEncoder::encode`]; also fails if the wire form cannot be written
pub fn dumps(value: &Value, hooks: &HookSnapshot, max_depth: usize) -> Result<Vec<u8>, CodecError> {
    let root = GraphEncoder::new(hooks, max_depth).encode(value)?;
    serde_json::to_vec(&Envelope {
        v: WIRE_VERSION,
        root,
    })
    .map_err(CodecError::Encode)
}

/// Decode payload bytes to a value graph
///
/// # Errors
/// See [`GraphDecoder::decode`]; also fails on malformed bytes or a
/// foreign wire version
pub fn loads(
    bytes: &[u8],
    hooks: &HookSnapshot,
    constructors: &ConstructorTable,
    max_depth: usize,
) -> Result<Value, CodecError> {
    let envelope: Envelope = serde_json::from_slice(bytes).map_err(CodecError::Decode)?;
    if envelope.v != WIRE_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: envelope.v,
            expected: WIRE_VERSION,
        });
    }
    GraphDecoder::new(hooks, constructors, max_depth).decode(envelope.root)
}
