//! Serializer registry
//!
//! Provides [`SerializerRegistration`], the `(encode, decode, content type,
//! content encoding)` entry a codec exposes, and [`SerializerRegistry`] for
//! selecting codecs by name.

use crate::error::CodecError;
use cereal_model::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Encode function handle
pub type EncodeFn = Arc<dyn Fn(&Value) -> Result<Vec<u8>, CodecError> + Send + Sync>;

/// Decode function handle
pub type DecodeFn = Arc<dyn Fn(&[u8]) -> Result<Value, CodecError> + Send + Sync>;

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Name already taken
    #[error("serializer already registered: {0}")]
    Duplicate(String),

    /// Name not registered
    #[error("serializer not registered: {0}")]
    NotRegistered(String),

    /// Payload labelled with a different content type
    #[error("content type mismatch for {name}: expected {expected}, got {found}")]
    ContentTypeMismatch {
        /// Serializer name
        name: String,
        /// Content type the serializer writes
        expected: String,
        /// Content type on the payload
        found: String,
    },

    /// Codec failure
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl RegistryError {
    /// Check if this wraps a not-found lookup failure
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Codec(e) if e.is_not_found())
    }
}

/// Codec entry points under a registry name
#[derive(Clone)]
pub struct SerializerRegistration {
    name: String,
    encode: EncodeFn,
    decode: DecodeFn,
    content_type: String,
    content_encoding: String,
}

impl SerializerRegistration {
    /// Create new registration
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        encode: EncodeFn,
        decode: DecodeFn,
        content_type: impl Into<String>,
        content_encoding: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            encode,
            decode,
            content_type: content_type.into(),
            content_encoding: content_encoding.into(),
        }
    }

    /// Registry name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Content type label
    #[inline]
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Content encoding label
    #[inline]
    #[must_use]
    pub fn content_encoding(&self) -> &str {
        &self.content_encoding
    }

    /// Run the encoder
    ///
    /// # Errors
    /// Propagates the codec's error
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        (self.encode)(value)
    }

    /// Run the decoder
    ///
    /// # Errors
    /// Propagates the codec's error
    pub fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        (self.decode)(bytes)
    }

    /// The four registration parts
    #[must_use]
    pub fn parts(&self) -> (EncodeFn, DecodeFn, &str, &str) {
        (
            Arc::clone(&self.encode),
            Arc::clone(&self.decode),
            &self.content_type,
            &self.content_encoding,
        )
    }
}

impl fmt::Debug for SerializerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerRegistration")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("content_encoding", &self.content_encoding)
            .finish_non_exhaustive()
    }
}

/// Encoded payload with its labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    /// Content type label
    pub content_type: String,
    /// Content encoding label
    pub content_encoding: String,
    /// Payload bytes
    pub body: Vec<u8>,
}

/// Registry of serializers by name
#[derive(Debug, Default, Clone)]
pub struct SerializerRegistry {
    serializers: HashMap<String, SerializerRegistration>,
}

impl SerializerRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            serializers: HashMap::new(),
        }
    }

    /// Register a serializer
    ///
    /// # Errors
    /// Returns error if the name is already registered
    pub fn register(&mut self, registration: SerializerRegistration) -> Result<(), RegistryError> {
        if self.serializers.contains_key(registration.name()) {
            return Err(RegistryError::Duplicate(registration.name().to_string()));
        }
        tracing::info!(
            name = registration.name(),
            content_type = registration.content_type(),
            "registered serializer"
        );
        self.serializers
            .insert(registration.name().to_string(), registration);
        Ok(())
    }

    /// Look up a serializer
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SerializerRegistration> {
        self.serializers.get(name)
    }

    /// Check if serializer exists
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.serializers.contains_key(name)
    }

    /// Remove serializer
    #[inline]
    pub fn remove(&mut self, name: &str) -> bool {
        self.serializers.remove(name).is_some()
    }

    /// List all registered names
    #[inline]
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.serializers.keys().map(String::as_str).collect()
    }

    /// Get number of registered serializers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.serializers.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.serializers.is_empty()
    }

    /// Encode with the named serializer
    ///
    /// # Errors
    /// Returns error if the name is unknown or encoding fails
    pub fn dumps(&self, name: &str, value: &Value) -> Result<Encoded, RegistryError> {
        let serializer = self
            .get(name)
            .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))?;

        Ok(Encoded {
            content_type: serializer.content_type().to_string(),
            content_encoding: serializer.content_encoding().to_string(),
            body: serializer.encode(value)?,
        })
    }

    /// Decode with the named serializer, checking the content type label
    ///
    /// # Errors
    /// Returns error if the name is unknown, the label does not match, or
    /// decoding fails
    pub fn loads(&self, name: &str, content_type: &str, body: &[u8]) -> Result<Value, RegistryError> {
        let serializer = self
            .get(name)
            .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))?;

        if serializer.content_type() != content_type {
            return Err(RegistryError::ContentTypeMismatch {
                name: name.to_string(),
                expected: serializer.content_type().to_string(),
                found: content_type.to_string(),
            });
        }

        Ok(serializer.decode(body)?)
    }
}
