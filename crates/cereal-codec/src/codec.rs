//! RefCodec - By-reference entity codec
//!
//! The entry points handed to a task queue. Every call runs inside a
//! [`PatchedModel`] scope on the codec's [`ModelBase`], so entities are
//! written as identity descriptors and re-fetched from the
//! [`EntityStore`] on the way back in.

use crate::config::CodecConfig;
use crate::error::CodecError;
use crate::graph::{self, Constructor, ConstructorTable};
use crate::patch::{PatchedModel, MODEL_UNPICKLE};
use crate::registry::SerializerRegistration;
use cereal_model::{Entity, EntityStore, IdentityDescriptor, ModelBase, Value};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Reference codec
///
/// Holds the store used for rehydration, the hook table it patches, and
/// the constructors it will replay.
///
/// # Example
/// ```
/// use cereal_codec::RefCodec;
/// use cereal_model::{Entity, MemoryStore, Value};
/// use std::sync::Arc;
///
/// let store = Arc::new(MemoryStore::new());
/// let saved = store.create(Entity::new("testapp.Thing").field("name", "foo")).unwrap();
/// let codec = RefCodec::new(store.clone());
///
/// let bytes = codec.encode(&Value::from(saved.clone())).unwrap();
///
/// let mut changed = saved.clone();
/// changed.set("name", "bar");
/// store.save(&changed).unwrap();
///
/// assert_eq!(codec.decode(&bytes).unwrap(), Value::from(changed));
/// ```
pub struct RefCodec {
    store: Arc<dyn EntityStore>,
    model_base: Arc<ModelBase>,
    constructors: ConstructorTable,
    config: CodecConfig,
}

impl RefCodec {
    /// Create codec over a store, with a private hook table
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        let mut constructors = ConstructorTable::new();
        constructors.register(MODEL_UNPICKLE, model_unpickle(Arc::clone(&store)));

        Self {
            store,
            model_base: Arc::new(ModelBase::with_defaults()),
            constructors,
            config: CodecConfig::default(),
        }
    }

    /// With configuration
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    /// With a shared hook table (e.g. [`ModelBase::global`])
    #[inline]
    #[must_use]
    pub fn with_model_base(mut self, model_base: Arc<ModelBase>) -> Self {
        self.model_base = model_base;
        self
    }

    /// Allow an extra constructor during decode
    #[must_use]
    pub fn with_constructor(mut self, name: impl Into<String>, constructor: Constructor) -> Self {
        self.constructors.register(name, constructor);
        self
    }

    /// Backing store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Hook table this codec patches
    #[inline]
    #[must_use]
    pub fn model_base(&self) -> &Arc<ModelBase> {
        &self.model_base
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Open an override scope on this codec's hook table
    pub fn patched(&self) -> PatchedModel<'_> {
        PatchedModel::enter(&self.model_base)
    }

    /// Encode a payload, writing entities by reference
    ///
    /// # Errors
    /// Returns error if the payload cannot be encoded; the hook table is
    /// restored either way.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let _scope = self.patched();
        let hooks = self.model_base.snapshot();

        let bytes = graph::dumps(value, &hooks, self.config.depth_limit())?;
        tracing::debug!(
            bytes = bytes.len(),
            entities = value.entity_count(),
            "encoded payload"
        );
        Ok(bytes)
    }

    /// Decode a payload, fetching every referenced entity from the store
    ///
    /// # Errors
    /// Returns [`CodecError::Lookup`] carrying the store's error (e.g.
    /// not-found) unchanged, or any decode failure; the hook table is
    /// restored either way.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let _scope = self.patched();
        let hooks = self.model_base.snapshot();

        let value = graph::loads(bytes, &hooks, &self.constructors, self.config.depth_limit())?;
        tracing::debug!(
            bytes = bytes.len(),
            entities = value.entity_count(),
            "decoded payload"
        );
        Ok(value)
    }

    /// Registration entry for a serializer registry
    #[must_use]
    pub fn registration(self: &Arc<Self>) -> SerializerRegistration {
        let encoder = Arc::clone(self);
        let decoder = Arc::clone(self);
        SerializerRegistration::new(
            self.config.serializer_name.clone(),
            Arc::new(move |value: &Value| encoder.encode(value)),
            Arc::new(move |bytes: &[u8]| decoder.decode(bytes)),
            self.config.content_type.clone(),
            self.config.content_encoding.clone(),
        )
    }
}

impl fmt::Debug for RefCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefCodec")
            .field("model_base", &self.model_base)
            .field("constructors", &self.constructors)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Reconstruction callback for identity descriptors
///
/// Looks the record up by `(model, pk)`; a missing record surfaces as the
/// store's own not-found error.
fn model_unpickle(store: Arc<dyn EntityStore>) -> Constructor {
    Arc::new(move |args: &serde_json::Value| -> Result<Entity, CodecError> {
        let identity = IdentityDescriptor::deserialize(args).map_err(|e| {
            CodecError::InvalidArguments {
                constructor: MODEL_UNPICKLE.to_string(),
                reason: e.to_string(),
            }
        })?;
        tracing::trace!(%identity, "rehydrating entity");
        Ok(store.lookup(&identity.model, identity.pk.as_ref())?)
    })
}
