//! Error types for the reference codec
//!
//! Store failures raised while rehydrating entities are carried through
//! untouched; callers match on [`StoreError::NotFound`] exactly as they
//! would on a direct lookup.

use cereal_model::StoreError;

/// Codec error type
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Entity lookup failed during reconstruction
    #[error(transparent)]
    Lookup(#[from] StoreError),

    /// Payload could not be written
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// Payload could not be parsed
    #[error("failed to decode payload: {0}")]
    Decode(#[source] serde_json::Error),

    /// Payload written by an incompatible codec version
    #[error("unsupported payload version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the payload
        found: u8,
        /// Version this codec writes
        expected: u8,
    },

    /// Reduction names a constructor that is not registered
    #[error("constructor not registered for decoding: {0}")]
    UnknownConstructor(String),

    /// Constructor rejected its arguments
    #[error("invalid arguments for constructor {constructor}: {reason}")]
    InvalidArguments {
        /// Constructor name
        constructor: String,
        /// Why the arguments were rejected
        reason: String,
    },

    /// Object graph nested deeper than allowed
    #[error("object graph exceeds maximum depth {0}")]
    DepthExceeded(usize),

    /// NaN or infinite float in payload
    #[error("non-finite float cannot be encoded: {0}")]
    NonFiniteFloat(f64),
}

impl CodecError {
    /// Check if this is a not-found lookup failure
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Lookup(e) if e.is_not_found())
    }

    /// Underlying store error, if any
    #[inline]
    #[must_use]
    pub fn as_store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Lookup(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cereal_model::{ModelName, PrimaryKey};

    #[test]
    fn lookup_error_is_transparent() {
        let store_err = StoreError::not_found(&ModelName::new("testapp.Thing"), Some(&PrimaryKey::Int(1)));
        let err = CodecError::from(store_err.clone());

        assert_eq!(err.to_string(), store_err.to_string());
        assert!(err.is_not_found());
        assert_eq!(err.as_store_error(), Some(&store_err));
    }

    #[test]
    fn backend_error_is_not_not_found() {
        let err = CodecError::from(StoreError::Backend("down".into()));
        assert!(!err.is_not_found());
    }

    #[test]
    fn other_errors_have_no_store_error() {
        let err = CodecError::UnknownConstructor("os.system".into());
        assert!(err.as_store_error().is_none());
        assert!(err.to_string().contains("os.system"));
    }
}
