//! Testing utilities for the entity cereal workspace
//!
//! Shared test models, seeded stores and codec setups.

#![allow(missing_docs)]

use cereal_codec::{CodecError, RefCodec};
use cereal_model::{Entity, EntityStore, MemoryStore, ModelName, PrimaryKey, StoreError, Value};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

pub const BASIC_MODEL: &str = "testapp.ModelWithBasicField";
pub const PARENT_MODEL: &str = "testapp.ModelWithParentModel";

pub fn basic_model() -> ModelName {
    ModelName::new(BASIC_MODEL)
}

pub fn parent_model() -> ModelName {
    ModelName::new(PARENT_MODEL)
}

/// Unsaved basic-field entity
pub fn basic(name: &str) -> Entity {
    Entity::new(basic_model()).field("name", name)
}

/// Unsaved entity of a model inheriting from the basic-field model
pub fn inherited(name: &str) -> Entity {
    Entity::new(parent_model())
        .inherits(basic_model())
        .field("name", name)
}

pub fn create_basic(store: &MemoryStore, name: &str) -> Entity {
    store.create(basic(name)).unwrap()
}

pub fn create_inherited(store: &MemoryStore, name: &str) -> Entity {
    store.create(inherited(name)).unwrap()
}

pub fn setup_codec() -> (Arc<MemoryStore>, Arc<RefCodec>) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let codec = Arc::new(RefCodec::new(store.clone()));
    (store, codec)
}

pub fn roundtrip(codec: &RefCodec, value: &Value) -> Result<Value, CodecError> {
    let bytes = codec.encode(value)?;
    codec.decode(&bytes)
}

/// Install a test subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// What a [`ReentrantStore`] does from inside `lookup`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nested {
    /// Encode the found entity again
    Encode,
    /// Encode then decode the found entity again
    Roundtrip,
}

/// Store that calls back into a codec while servicing a lookup
///
/// Models a persistence layer whose loading path itself serializes
/// entities (signals, caches), producing nested codec calls from inside
/// an active decode.
#[derive(Debug)]
pub struct ReentrantStore {
    inner: MemoryStore,
    codec: Mutex<Weak<RefCodec>>,
    mode: Nested,
    nested_calls: Mutex<usize>,
    max_nesting: usize,
}

impl ReentrantStore {
    pub fn new(mode: Nested, max_nesting: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            codec: Mutex::new(Weak::new()),
            mode,
            nested_calls: Mutex::new(0),
            max_nesting,
        }
    }

    pub fn attach(&self, codec: &Arc<RefCodec>) {
        *self.codec.lock() = Arc::downgrade(codec);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn nested_calls(&self) -> usize {
        *self.nested_calls.lock()
    }
}

impl EntityStore for ReentrantStore {
    fn lookup(&self, model: &ModelName, pk: Option<&PrimaryKey>) -> Result<Entity, StoreError> {
        let found = self.inner.lookup(model, pk)?;

        let codec = self.codec.lock().upgrade();
        let proceed = {
            let mut calls = self.nested_calls.lock();
            if *calls < self.max_nesting {
                *calls += 1;
                true
            } else {
                false
            }
        };

        if let (Some(codec), true) = (codec, proceed) {
            let value = Value::from(found.clone());
            let result = match self.mode {
                Nested::Encode => codec.encode(&value).map(|_| ()),
                Nested::Roundtrip => roundtrip(&codec, &value).map(|_| ()),
            };
            result.map_err(|e| StoreError::Backend(format!("nested codec call failed: {e}")))?;
        }

        Ok(found)
    }
}
