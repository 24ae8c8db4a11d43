//! Cereal Codec
//!
//! By-reference serialization of persisted entities for task payloads.
//!
//! # Core Concepts
//!
//! - [`RefCodec`]: `encode`/`decode` entry points; entities travel as
//!   `(model, pk)` and are re-fetched from the store at decode time
//! - [`PatchedModel`]: scope guard that puts the entity base type into
//!   by-reference mode and restores it on every exit path
//! - [`graph`]: the generic object-graph codec the entry points delegate to
//! - [`SerializerRegistry`]: select codecs by name
//! - [`task`]: declare tasks that use the reference codec by default
//!
//! # Example
//!
//! ```rust
//! use cereal_codec::{task, RefCodec, SerializerRegistry};
//! use cereal_model::{Entity, MemoryStore, Value};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let codec = Arc::new(RefCodec::new(store.clone()));
//!
//! let mut registry = SerializerRegistry::new();
//! registry.register(codec.registration()).unwrap();
//!
//! let greet = task("app.greet", |args: Value| {
//!     args.as_entity().and_then(|e| e.get("name").cloned())
//! });
//!
//! let user = store.create(Entity::new("app.User").field("name", "ada")).unwrap();
//! let message = greet.enqueue(&registry, &Value::from(user)).unwrap();
//!
//! let name = greet.run(&registry, &message).unwrap();
//! assert_eq!(name, Some(serde_json::json!("ada")));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod codec;
mod config;
mod error;
pub mod graph;
mod patch;
mod registry;
mod task;

// Re-exports
pub use codec::RefCodec;
pub use config::{
    CodecConfig, CEREAL_SERIALIZER, CONTENT_ENCODING, CONTENT_TYPE, DEFAULT_MAX_DEPTH,
    MAX_DEPTH_LIMIT,
};
pub use error::CodecError;
pub use patch::{
    patched_model, reduce_by_identity, OverrideBinding, PatchedModel, ScopeState, MODEL_UNPICKLE,
};
pub use registry::{
    DecodeFn, Encoded, EncodeFn, RegistryError, SerializerRegistration, SerializerRegistry,
};
pub use task::{task, task_with, Task, TaskError, TaskMessage, TaskOptions};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
