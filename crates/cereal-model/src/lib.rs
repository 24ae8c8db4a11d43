//! Cereal Model
//!
//! The object model the reference codec operates on.
//!
//! # Overview
//!
//! - **Entity**: persisted record with a model name and primary key
//! - **IdentityDescriptor**: `(model, pk)` stand-in produced by [`extract`]
//! - **EntityStore**: lookup-by-identity capability ([`MemoryStore`] backend)
//! - **Value**: task payload graph that may embed entities
//! - **ModelBase**: the three hook slots shared by every entity
//!
//! # Example
//!
//! ```rust
//! use cereal_model::{extract, Entity, EntityStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let saved = store.create(Entity::new("testapp.Thing").field("name", "foo")).unwrap();
//!
//! let id = extract(&saved);
//! let fetched = store.lookup(&id.model, id.pk.as_ref()).unwrap();
//! assert_eq!(fetched, saved);
//! ```

#![warn(missing_docs)]

pub mod entity;
pub mod hooks;
pub mod identity;
pub mod store;
pub mod value;

// Re-exports
pub use entity::{Entity, Fields, ModelName, PrimaryKey};
pub use hooks::{
    default_get_state, default_set_state, GetStateHook, Hook, HookSnapshot, ModelBase,
    ModelBaseLock, ReduceHook, Reduction, SetStateHook, Slot, SlotValue, StateMap,
};
pub use identity::{extract, IdentityDescriptor};
pub use store::{EntityStore, MemoryStore, StoreError};
pub use value::Value;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for model operations
    pub use crate::{
        extract, Entity, EntityStore, IdentityDescriptor, MemoryStore, ModelBase, ModelName,
        PrimaryKey, Slot, SlotValue, StoreError, Value,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
