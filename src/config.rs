//! Mapper configuration

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Nesting limit applied when no configuration is given.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Settings shared by every call made through an
/// [`ObjectMapper`](crate::mapper::ObjectMapper).
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct MapperConfig {
    /// Deepest array/object nesting accepted in either direction.
    pub max_depth: usize,
    /// Default for [`create_streaming_processor`](crate::mapper::ObjectMapper::create_streaming_processor)
    /// callers that do not choose explicitly.
    pub stream_array: bool,
    /// View token handed to codecs through their context.
    pub view: Option<String>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        MapperConfig {
            max_depth: DEFAULT_MAX_DEPTH,
            stream_array: false,
            view: None,
        }
    }
}

impl MapperConfig {
    /// Reads a configuration from JSON, missing fields take their defaults.
    ///
    /// # Errors
    /// Returns [`Error::MalformedInput`](crate::error::Error::MalformedInput)
    /// if the document is not a valid configuration.
    pub fn from_json(json: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = MapperConfig::from_json(br#"{"view":"public"}"#).unwrap();
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!config.stream_array);
        assert_eq!(config.view.as_deref(), Some("public"));
    }

    #[test]
    fn camel_case_keys() {
        let config = MapperConfig::from_json(br#"{"maxDepth":4,"streamArray":true}"#).unwrap();
        assert_eq!(config.max_depth, 4);
        assert!(config.stream_array);
    }

    #[test]
    fn rejects_garbage() {
        assert!(MapperConfig::from_json(b"[1,2]").is_err());
    }
}
