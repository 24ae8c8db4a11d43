//! Entity - Persisted, identity-bearing records
//!
//! Provides [`Entity`] together with its identity parts [`ModelName`] and
//! [`PrimaryKey`]. Entities are created and destroyed by the persistence
//! layer; this crate only reads them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Field map of an entity (column name -> value)
pub type Fields = BTreeMap<String, serde_json::Value>;

/// Model (table) name in `app_label.ModelName` form
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelName(String);

impl ModelName {
    /// Create new model name
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Full name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// App label (everything before the last `.`), if any
    #[must_use]
    pub fn app_label(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(app, _)| app)
    }

    /// Bare model name (everything after the last `.`)
    #[must_use]
    pub fn model(&self) -> &str {
        self.0.rsplit_once('.').map_or(self.0.as_str(), |(_, model)| model)
    }
}

impl Display for ModelName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Primary-key value
///
/// Unique per model once assigned. An entity that was never saved carries
/// no key at all (`Option<PrimaryKey>::None`), never a sentinel value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    /// Auto-increment integer key
    Int(i64),

    /// Natural or UUID-style string key
    Str(String),
}

impl Display for PrimaryKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for PrimaryKey {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for PrimaryKey {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<&str> for PrimaryKey {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// Persisted record instance
///
/// # Structure
/// - `model`: concrete model of the record
/// - `pk`: primary key, absent before first save
/// - `parents`: models this one inherits from (multi-table inheritance)
/// - `fields`: all other columns, opaque to the codec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    model: ModelName,
    pk: Option<PrimaryKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    parents: Vec<ModelName>,
    #[serde(default)]
    fields: Fields,
}

impl Entity {
    /// Create an unsaved entity (no primary key)
    #[inline]
    #[must_use]
    pub fn new(model: impl Into<ModelName>) -> Self {
        Self {
            model: model.into(),
            pk: None,
            parents: Vec::new(),
            fields: Fields::new(),
        }
    }

    /// Create an entity with an explicit primary key
    ///
    /// The key is not checked against any store; an entity built this way
    /// may reference a record that does not exist.
    #[inline]
    #[must_use]
    pub fn with_pk(model: impl Into<ModelName>, pk: impl Into<PrimaryKey>) -> Self {
        Self {
            pk: Some(pk.into()),
            ..Self::new(model)
        }
    }

    /// Set a field (builder style)
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Declare a parent model (builder style)
    #[must_use]
    pub fn inherits(mut self, parent: impl Into<ModelName>) -> Self {
        self.parents.push(parent.into());
        self
    }

    /// Model of this entity
    #[inline]
    #[must_use]
    pub fn model(&self) -> &ModelName {
        &self.model
    }

    /// Primary key, if assigned
    #[inline]
    #[must_use]
    pub fn pk(&self) -> Option<&PrimaryKey> {
        self.pk.as_ref()
    }

    /// Assign the primary key
    #[inline]
    pub fn set_pk(&mut self, pk: Option<PrimaryKey>) {
        self.pk = pk;
    }

    /// Parent models
    #[inline]
    #[must_use]
    pub fn parents(&self) -> &[ModelName] {
        &self.parents
    }

    /// All fields
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Mutable field access
    #[inline]
    pub fn fields_mut(&mut self) -> &mut Fields {
        &mut self.fields
    }

    /// Single field value
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    /// Set a field in place
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Whether the entity has been assigned a primary key
    #[inline]
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.pk.is_some()
    }

    /// Whether this entity is an instance of `model` (itself or a parent)
    #[must_use]
    pub fn is_instance_of(&self, model: &ModelName) -> bool {
        &self.model == model || self.parents.contains(model)
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.pk {
            Some(pk) => write!(f, "{} object ({pk})", self.model),
            None => write!(f, "{} object (None)", self.model),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_name_parts() {
        let name = ModelName::new("testapp.ModelWithBasicField");
        assert_eq!(name.app_label(), Some("testapp"));
        assert_eq!(name.model(), "ModelWithBasicField");

        let bare = ModelName::new("Thing");
        assert_eq!(bare.app_label(), None);
        assert_eq!(bare.model(), "Thing");
    }

    #[test]
    fn entity_new_is_unsaved() {
        let e = Entity::new("testapp.Thing");
        assert!(!e.is_persisted());
        assert!(e.pk().is_none());
    }

    #[test]
    fn entity_with_pk_is_persisted() {
        let e = Entity::with_pk("testapp.Thing", 7);
        assert!(e.is_persisted());
        assert_eq!(e.pk(), Some(&PrimaryKey::Int(7)));
    }

    #[test]
    fn entity_fields() {
        let mut e = Entity::new("testapp.Thing").field("name", "foo");
        assert_eq!(e.get("name"), Some(&serde_json::json!("foo")));

        e.set("name", "bar");
        assert_eq!(e.get("name"), Some(&serde_json::json!("bar")));
    }

    #[test]
    fn entity_inheritance() {
        let parent = ModelName::new("testapp.ModelWithBasicField");
        let e = Entity::new("testapp.ModelWithParentModel").inherits(parent.clone());

        assert!(e.is_instance_of(&parent));
        assert!(e.is_instance_of(e.model()));
        assert!(!e.is_instance_of(&ModelName::new("testapp.Other")));
    }

    #[test]
    fn primary_key_untagged_serde() {
        let int: PrimaryKey = serde_json::from_str("42").unwrap();
        let s: PrimaryKey = serde_json::from_str("\"abc\"").unwrap();

        assert_eq!(int, PrimaryKey::Int(42));
        assert_eq!(s, PrimaryKey::Str("abc".into()));
    }

    #[test]
    fn entity_display() {
        assert_eq!(
            Entity::with_pk("testapp.Thing", 3).to_string(),
            "testapp.Thing object (3)"
        );
        assert_eq!(Entity::new("testapp.Thing").to_string(), "testapp.Thing object (None)");
    }
}
