//! Persistence capability
//!
//! [`EntityStore`] is the single capability the codec needs from the data
//! layer: fetch an existing record by identity. [`MemoryStore`] is an
//! in-process backend suitable for tests and embedded use.

use crate::entity::{Entity, ModelName, PrimaryKey};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Errors raised by a store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No record matches the identity
    #[error("{model} matching query does not exist (pk={})", display_pk(.pk.as_ref()))]
    NotFound {
        /// Model that was queried
        model: ModelName,
        /// Key that was queried
        pk: Option<PrimaryKey>,
    },

    /// Backend failure unrelated to record existence
    #[error("store backend error: {0}")]
    Backend(String),
}

fn display_pk(pk: Option<&PrimaryKey>) -> String {
    pk.map_or_else(|| "None".to_string(), ToString::to_string)
}

impl StoreError {
    /// Create not-found error
    #[inline]
    #[must_use]
    pub fn not_found(model: &ModelName, pk: Option<&PrimaryKey>) -> Self {
        Self::NotFound {
            model: model.clone(),
            pk: pk.cloned(),
        }
    }

    /// Check if this is a not-found condition
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Lookup-by-identity over persisted records
///
/// Implementations must return the state current at call time.
pub trait EntityStore: Send + Sync {
    /// Fetch the record identified by `(model, pk)`
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no record matches, including when
    /// `pk` is `None`.
    fn lookup(&self, model: &ModelName, pk: Option<&PrimaryKey>) -> Result<Entity, StoreError>;

    /// Check whether a record exists
    fn exists(&self, model: &ModelName, pk: Option<&PrimaryKey>) -> bool {
        self.lookup(model, pk).is_ok()
    }
}

/// In-memory entity store
///
/// Records are keyed by `(model, pk)`. Integer keys are auto-assigned per
/// model on [`MemoryStore::create`] when the entity has none.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<(ModelName, PrimaryKey), Entity>,
    sequences: DashMap<ModelName, i64>,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record, assigning a key if needed
    ///
    /// Returns the stored entity (with its key).
    ///
    /// # Errors
    /// Returns [`StoreError::Backend`] if a record with the same key exists.
    pub fn create(&self, mut entity: Entity) -> Result<Entity, StoreError> {
        let pk = match entity.pk().cloned() {
            Some(pk) => {
                self.observe_key(entity.model(), &pk);
                pk
            }
            None => {
                let mut seq = self.sequences.entry(entity.model().clone()).or_insert(0);
                *seq += 1;
                PrimaryKey::Int(*seq)
            }
        };

        entity.set_pk(Some(pk.clone()));
        match self.records.entry((entity.model().clone(), pk)) {
            Entry::Occupied(occupied) => {
                return Err(StoreError::Backend(format!(
                    "duplicate key {} for {}",
                    occupied.key().1,
                    entity.model()
                )));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entity.clone());
            }
        }

        tracing::trace!(entity = %entity, "created record");
        Ok(entity)
    }

    /// Insert or replace a record
    ///
    /// # Errors
    /// Returns [`StoreError::Backend`] if the entity has no key; use
    /// [`MemoryStore::create`] for new records.
    pub fn save(&self, entity: &Entity) -> Result<(), StoreError> {
        let pk = entity
            .pk()
            .cloned()
            .ok_or_else(|| StoreError::Backend(format!("cannot save unsaved {}", entity.model())))?;
        self.observe_key(entity.model(), &pk);
        self.records.insert((entity.model().clone(), pk), entity.clone());
        Ok(())
    }

    /// Keep auto-assigned keys above any explicit integer key
    fn observe_key(&self, model: &ModelName, pk: &PrimaryKey) {
        if let PrimaryKey::Int(n) = pk {
            let mut seq = self.sequences.entry(model.clone()).or_insert(0);
            *seq = (*seq).max(*n);
        }
    }

    /// Delete a record
    ///
    /// Returns true if a record was removed.
    pub fn delete(&self, model: &ModelName, pk: &PrimaryKey) -> bool {
        self.records.remove(&(model.clone(), pk.clone())).is_some()
    }

    /// Number of stored records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl EntityStore for MemoryStore {
    fn lookup(&self, model: &ModelName, pk: Option<&PrimaryKey>) -> Result<Entity, StoreError> {
        let pk = pk.ok_or_else(|| StoreError::not_found(model, None))?;
        self.records
            .get(&(model.clone(), pk.clone()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::not_found(model, Some(pk)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn thing() -> ModelName {
        ModelName::new("testapp.Thing")
    }

    #[test]
    fn create_assigns_sequential_keys() {
        let store = MemoryStore::new();
        let a = store.create(Entity::new(thing())).unwrap();
        let b = store.create(Entity::new(thing())).unwrap();

        assert_eq!(a.pk(), Some(&PrimaryKey::Int(1)));
        assert_eq!(b.pk(), Some(&PrimaryKey::Int(2)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn create_respects_explicit_key() {
        let store = MemoryStore::new();
        store.create(Entity::with_pk(thing(), 10)).unwrap();
        let next = store.create(Entity::new(thing())).unwrap();

        assert_eq!(next.pk(), Some(&PrimaryKey::Int(11)));
    }

    #[test]
    fn create_rejects_duplicate_key() {
        let store = MemoryStore::new();
        store.create(Entity::with_pk(thing(), 1)).unwrap();
        let result = store.create(Entity::with_pk(thing(), 1));

        assert!(matches!(result, Err(StoreError::Backend(_))));
    }

    #[test]
    fn lookup_returns_current_state() {
        let store = MemoryStore::new();
        let mut e = store.create(Entity::new(thing()).field("name", "old")).unwrap();

        e.set("name", "new");
        store.save(&e).unwrap();

        let found = store.lookup(&thing(), e.pk()).unwrap();
        assert_eq!(found.get("name"), Some(&serde_json::json!("new")));
    }

    #[test]
    fn lookup_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.lookup(&thing(), Some(&PrimaryKey::Int(1))).unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err, StoreError::not_found(&thing(), Some(&PrimaryKey::Int(1))));
    }

    #[test]
    fn lookup_without_key_is_not_found() {
        let store = MemoryStore::new();
        store.create(Entity::new(thing())).unwrap();

        assert!(store.lookup(&thing(), None).unwrap_err().is_not_found());
    }

    #[test]
    fn delete_then_lookup_fails() {
        let store = MemoryStore::new();
        let e = store.create(Entity::new(thing())).unwrap();
        let pk = e.pk().cloned().unwrap();

        assert!(store.exists(&thing(), Some(&pk)));
        assert!(store.delete(&thing(), &pk));
        assert!(!store.exists(&thing(), Some(&pk)));
    }

    #[test]
    fn save_advances_key_sequence() {
        let store = MemoryStore::new();
        store.create(Entity::new(thing())).unwrap();
        store.save(&Entity::with_pk(thing(), 5)).unwrap();

        let next = store.create(Entity::new(thing())).unwrap();
        assert_eq!(next.pk(), Some(&PrimaryKey::Int(6)));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn concurrent_create_same_key_has_one_winner() {
        let store = MemoryStore::new();
        let barrier = std::sync::Barrier::new(8);

        let created = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let store = &store;
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        store.create(Entity::with_pk(thing(), 1).field("writer", i))
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        });

        let winners: Vec<_> = created.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(store.len(), 1);

        let stored = store.lookup(&thing(), Some(&PrimaryKey::Int(1))).unwrap();
        assert_eq!(&stored, winners[0]);
    }

    #[test]
    fn save_requires_key() {
        let store = MemoryStore::new();
        assert!(store.save(&Entity::new(thing())).is_err());
    }

    #[test]
    fn not_found_message() {
        let err = StoreError::not_found(&thing(), Some(&PrimaryKey::Int(3)));
        assert_eq!(err.to_string(), "testapp.Thing matching query does not exist (pk=3)");
    }

    proptest! {
        #[test]
        fn created_records_are_found(names in prop::collection::vec("[a-z]{1,6}", 1..16)) {
            let store = MemoryStore::new();
            let created: Vec<Entity> = names
                .iter()
                .map(|n| store.create(Entity::new(thing()).field("name", n.as_str())).unwrap())
                .collect();

            prop_assert_eq!(store.len(), names.len());
            for (i, e) in created.iter().enumerate() {
                let expected = i64::try_from(i).unwrap() + 1;
                prop_assert_eq!(e.pk(), Some(&PrimaryKey::Int(expected)));
                prop_assert_eq!(&store.lookup(e.model(), e.pk()).unwrap(), e);
            }
        }
    }
}
