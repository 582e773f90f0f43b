// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine configuration.
//!
//! The configuration is the persistable part of an engine: everything
//! needed to reconstruct it EXCEPT its codec caches, which are rebuilt
//! lazily on first use after reconstruction. With the `config` feature the
//! struct round-trips through serde.

use crate::typeid::{TypeIdStrategy, WrapShape};

/// Default tag property name.
pub const DEFAULT_TYPE_ID_PROPERTY: &str = "@type";

/// Default value-recursion and type-resolution depth limit.
pub const DEFAULT_RECURSION_LIMIT: usize = 500;

/// Tunable engine behavior. Rebuilding an engine from a changed
/// configuration discards its caches wholesale, never selectively.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Wrapping shape used when writing polymorphic values.
    pub write_shape: WrapShape,
    /// Shape expected when reading; independent of `write_shape`.
    pub read_shape: WrapShape,
    /// Tag property name for `AsProperty` wrapping.
    pub type_id_property: String,
    pub type_id_strategy: TypeIdStrategy,
    /// Raw/logical name of a fallback type for unresolvable tags.
    pub default_impl: Option<String>,
    /// Depth cap converting runaway recursion into a checked error.
    pub recursion_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            write_shape: WrapShape::AsProperty,
            read_shape: WrapShape::AsProperty,
            type_id_property: DEFAULT_TYPE_ID_PROPERTY.to_string(),
            type_id_strategy: TypeIdStrategy::TypeName,
            default_impl: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

impl EngineConfig {
    pub fn with_write_shape(mut self, shape: WrapShape) -> Self {
        self.write_shape = shape;
        self
    }

    pub fn with_read_shape(mut self, shape: WrapShape) -> Self {
        self.read_shape = shape;
        self
    }

    pub fn with_type_id_property(mut self, property: impl Into<String>) -> Self {
        self.type_id_property = property.into();
        self
    }

    pub fn with_type_id_strategy(mut self, strategy: TypeIdStrategy) -> Self {
        self.type_id_strategy = strategy;
        self
    }

    pub fn with_default_impl(mut self, type_name: impl Into<String>) -> Self {
        self.default_impl = Some(type_name.into());
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }
}

#[cfg(feature = "config")]
impl EngineConfig {
    /// Persist to a JSON file.
    pub fn save_to(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
        let text =
            serde_json::to_string_pretty(self).map_err(|e| crate::CodecError::InvalidData {
                reason: format!("config serialization failed: {}", e),
            })?;
        std::fs::write(path, text).map_err(|e| crate::CodecError::InvalidData {
            reason: format!("config write failed: {}", e),
        })
    }

    /// Reconstruct from a JSON file. The resulting engine's caches start
    /// empty and fill lazily on first use.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| crate::CodecError::InvalidData {
            reason: format!("config read failed: {}", e),
        })?;
        serde_json::from_str(&text).map_err(|e| crate::CodecError::InvalidData {
            reason: format!("config deserialization failed: {}", e),
        })
    }
}
