//! Codec configuration

use serde::{Deserialize, Serialize};

/// Name the codec registers under
pub const CEREAL_SERIALIZER: &str = "entity_cereal";

/// Content type label of encoded payloads
pub const CONTENT_TYPE: &str = "application/x-entity-ref+json";

/// Content encoding label of encoded payloads
pub const CONTENT_ENCODING: &str = "utf-8";

/// Default nesting limit for payload graphs
///
/// Each graph level costs two levels of JSON nesting on the wire, which
/// keeps payloads under `serde_json`'s own recursion limit of 128.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Largest nesting limit whose payloads still decode
///
/// `serde_json` refuses input nested 128 levels deep. The envelope takes one
/// level, every container two, and a by-reference entity at the innermost
/// level three more: `1 + 2 * depth + 3` must stay below 128.
pub const MAX_DEPTH_LIMIT: usize = 61;

/// Reference codec configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Registry name
    pub serializer_name: String,
    /// Content type label
    pub content_type: String,
    /// Content encoding label
    pub content_encoding: String,
    /// Maximum nesting of containers in a payload
    pub max_depth: usize,
}

impl CodecConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from JSON, filling unset keys with defaults
    ///
    /// # Errors
    /// Returns error if the JSON is malformed
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(json)?;
        let max_depth = config.max_depth;
        Ok(config.with_max_depth(max_depth))
    }

    /// With registry name
    #[inline]
    #[must_use]
    pub fn with_serializer_name(mut self, name: impl Into<String>) -> Self {
        self.serializer_name = name.into();
        self
    }

    /// With content type label
    #[inline]
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// With nesting limit, capped at [`MAX_DEPTH_LIMIT`]
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.min(MAX_DEPTH_LIMIT);
        self
    }

    /// Nesting limit actually enforced
    ///
    /// Same as `max_depth` unless the field was set directly above
    /// [`MAX_DEPTH_LIMIT`].
    #[inline]
    #[must_use]
    pub fn depth_limit(&self) -> usize {
        self.max_depth.min(MAX_DEPTH_LIMIT)
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            serializer_name: CEREAL_SERIALIZER.to_string(),
            content_type: CONTENT_TYPE.to_string(),
            content_encoding: CONTENT_ENCODING.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
