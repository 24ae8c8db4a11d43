//! Identity descriptors
//!
//! An [`IdentityDescriptor`] is the by-reference stand-in for an [`Entity`]:
//! just enough to fetch the record again later.

use crate::entity::{Entity, ModelName, PrimaryKey};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// `(model, primary key)` pair identifying a persisted record
///
/// Decoding a descriptor yields whatever the store holds at decode time,
/// not the state the entity had when the descriptor was made.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityDescriptor {
    /// Model to look up
    pub model: ModelName,

    /// Primary key, absent for entities that were never saved
    pub pk: Option<PrimaryKey>,
}

impl IdentityDescriptor {
    /// Create new descriptor
    #[inline]
    #[must_use]
    pub fn new(model: ModelName, pk: Option<PrimaryKey>) -> Self {
        Self { model, pk }
    }
}

impl Display for IdentityDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.pk {
            Some(pk) => write!(f, "{}(pk={pk})", self.model),
            None => write!(f, "{}(pk=None)", self.model),
        }
    }
}

/// Extract the identity of an entity
///
/// Never fails: an unsaved entity yields a descriptor without a key, and
/// the failure surfaces at lookup time instead.
#[inline]
#[must_use]
pub fn extract(entity: &Entity) -> IdentityDescriptor {
    IdentityDescriptor::new(entity.model().clone(), entity.pk().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_persisted() {
        let e = Entity::with_pk("testapp.Thing", 5).field("name", "foo");
        let id = extract(&e);

        assert_eq!(id.model, ModelName::new("testapp.Thing"));
        assert_eq!(id.pk, Some(PrimaryKey::Int(5)));
    }

    #[test]
    fn extract_unsaved_has_no_key() {
        let id = extract(&Entity::new("testapp.Thing"));
        assert!(id.pk.is_none());
    }

    #[test]
    fn extract_ignores_fields() {
        let a = Entity::with_pk("testapp.Thing", 1).field("name", "a");
        let b = Entity::with_pk("testapp.Thing", 1).field("name", "b");
        assert_eq!(extract(&a), extract(&b));
    }

    #[test]
    fn descriptor_wire_shape() {
        let id = extract(&Entity::with_pk("testapp.Thing", 9));
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, serde_json::json!({"model": "testapp.Thing", "pk": 9}));
    }
}
