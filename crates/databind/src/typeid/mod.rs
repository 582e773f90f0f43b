// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Polymorphic type-identifier protocol.
//!
//! The writer half is a small state machine per polymorphic value write:
//! compute an id from the runtime type, open the configured wrapping shape,
//! let the body write, close the shape. The reader half resolves a tag back
//! to a concrete descriptor; shape is configured independently of the
//! writer and mismatches are tolerated (see the codec read path, which
//! tries object-property, array-wrapper, then bare-value interpretations).

use crate::descriptor::{DescriptorClass, TypeDescriptor, TypeRegistry};
use crate::error::{CodecError, Result};
use crate::event::{EventWrite, Scalar};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// How a type id is embedded alongside the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub enum WrapShape {
    /// No tag is written.
    None,
    /// Extra property at the start of the value's own object shape; falls
    /// back to `WrapperArray` for scalar and array values.
    #[default]
    AsProperty,
    /// Two-element array: `[id, value]`.
    WrapperArray,
    /// Single-entry object: `{id: value}`.
    WrapperObject,
}

/// How the id itself is computed from the runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeIdStrategy {
    /// Raw runtime type name.
    #[default]
    TypeName,
    /// Logical name looked up in the registry; declines when unassigned.
    LogicalName,
}

/// Externally supplied minimal-id plugin.
pub trait TypeIdProvider: Send + Sync {
    /// Id for a value's runtime type; `None` declines.
    fn id_for(&self, value: &Value, registry: &dyn TypeRegistry) -> Option<String>;

    /// Concrete descriptor for an id; `None` declines.
    fn resolve_id(&self, id: &str, registry: &dyn TypeRegistry) -> Option<Arc<TypeDescriptor>>;
}

/// Full type-id configuration attached to a polymorphic codec.
#[derive(Clone)]
pub struct TypeIdSpec {
    /// Wrapping shape used when writing.
    pub shape: WrapShape,
    /// Shape expected when reading; independent of the writing shape, and
    /// mismatches are tolerated by the read path.
    pub read_shape: WrapShape,
    /// Tag property name for `AsProperty` wrapping.
    pub property: String,
    pub strategy: TypeIdStrategy,
    /// Externally supplied id computation, consulted before the strategy.
    pub custom: Option<Arc<dyn TypeIdProvider>>,
    /// Fallback type used when a read tag is unresolvable.
    pub default_impl: Option<Arc<TypeDescriptor>>,
}

impl TypeIdSpec {
    pub fn new(shape: WrapShape, property: impl Into<String>, strategy: TypeIdStrategy) -> Self {
        Self {
            shape,
            read_shape: shape,
            property: property.into(),
            strategy,
            custom: None,
            default_impl: None,
        }
    }

    /// Expect a different shape when reading than the one written.
    pub fn with_read_shape(mut self, shape: WrapShape) -> Self {
        self.read_shape = shape;
        self
    }

    pub fn with_custom(mut self, provider: Arc<dyn TypeIdProvider>) -> Self {
        self.custom = Some(provider);
        self
    }

    pub fn with_default_impl(mut self, descriptor: Arc<TypeDescriptor>) -> Self {
        self.default_impl = Some(descriptor);
        self
    }
}

impl fmt::Debug for TypeIdSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeIdSpec")
            .field("shape", &self.shape)
            .field("read_shape", &self.read_shape)
            .field("property", &self.property)
            .field("strategy", &self.strategy)
            .field("custom", &self.custom.is_some())
            .field(
                "default_impl",
                &self.default_impl.as_ref().map(|d| d.raw_name().to_string()),
            )
            .finish()
    }
}

/// Structural shape of the value being tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    Object,
    Array,
    Scalar,
}

/// Shape of a value for wrapping decisions.
pub fn shape_of(value: &Value) -> ValueShape {
    match value {
        Value::Object(_) => ValueShape::Object,
        Value::Array(_) => ValueShape::Array,
        _ => ValueShape::Scalar,
    }
}

/// Compute the id for a value's runtime type, `None` when the resolver
/// declines (null-id path).
pub fn compute_id(spec: &TypeIdSpec, value: &Value, registry: &dyn TypeRegistry) -> Option<String> {
    if let Some(custom) = &spec.custom {
        return custom.id_for(value, registry);
    }
    let runtime_name: String = match value {
        Value::Object(obj) => obj.type_name().to_string(),
        Value::Array(_) => crate::descriptor::RAW_ARRAY.to_string(),
        other => other.shape_name().to_string(),
    };
    match spec.strategy {
        TypeIdStrategy::TypeName => Some(runtime_name),
        TypeIdStrategy::LogicalName => {
            let desc = registry
                .descriptor(&runtime_name)
                .unwrap_or_else(|| TypeDescriptor::named(runtime_name.clone()));
            registry.logical_name(&desc)
        }
    }
}

/// Strict tag resolution for tolerant-shape probing: never falls back to
/// the default implementation, so an ordinary string scalar is not
/// mistaken for a tag.
pub fn try_resolve_tag(
    spec: &TypeIdSpec,
    id: &str,
    registry: &dyn TypeRegistry,
) -> Option<Arc<TypeDescriptor>> {
    if let Some(custom) = &spec.custom {
        return custom.resolve_id(id, registry);
    }
    match spec.strategy {
        TypeIdStrategy::TypeName => registry.descriptor(id).or_else(|| match id {
            // Container tags carry no parameters; they resolve dynamically.
            crate::descriptor::RAW_ARRAY => {
                Some(TypeDescriptor::array_of(TypeDescriptor::any_type()))
            }
            crate::descriptor::RAW_MAP => Some(TypeDescriptor::map_of(
                TypeDescriptor::string_type(),
                TypeDescriptor::any_type(),
            )),
            _ => {
                let desc = TypeDescriptor::named(id.to_string());
                match desc.class() {
                    DescriptorClass::Named => None,
                    _ => Some(desc),
                }
            }
        }),
        TypeIdStrategy::LogicalName => registry.resolve_logical(id),
    }
}

/// Resolve a read tag to a concrete descriptor.
pub fn resolve_tag(
    spec: &TypeIdSpec,
    id: &str,
    registry: &dyn TypeRegistry,
) -> Result<Arc<TypeDescriptor>> {
    if let Some(desc) = try_resolve_tag(spec, id, registry) {
        return Ok(desc);
    }
    match &spec.default_impl {
        Some(fallback) => {
            log::debug!("type id '{}' unresolved, using default implementation", id);
            Ok(fallback.clone())
        }
        None => Err(CodecError::InvalidTypeId {
            id: id.to_string(),
            reason: "no registered type and no default implementation".into(),
        }),
    }
}

/// Whether the body is written with its own brackets or inline into
/// brackets the type-id writer already opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    Framed,
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Close {
    EndObject,
    EndArray,
    Nothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Pending,
    Prefixed(Close),
    Done,
}

/// Per-value writer state machine: prefix, body, suffix.
#[derive(Debug)]
pub struct TypeIdWriter {
    id: Option<String>,
    property: String,
    shape: WrapShape,
    state: WriterState,
}

impl TypeIdWriter {
    /// New writer for one polymorphic value; `id` of `None` is the
    /// declined-resolver path.
    pub fn new(spec: &TypeIdSpec, id: Option<String>) -> Self {
        Self {
            id,
            property: spec.property.clone(),
            shape: spec.shape,
            state: WriterState::Pending,
        }
    }

    /// Open the wrapping shape. Returns how the body must be written.
    ///
    /// # Panics
    /// Panics when called twice: prefix/suffix pairing is a programming
    /// contract, not a data condition.
    pub fn write_prefix(
        &mut self,
        value_shape: ValueShape,
        out: &mut dyn EventWrite,
    ) -> Result<BodyMode> {
        assert!(
            self.state == WriterState::Pending,
            "type-id prefix written twice"
        );
        let (close, mode) = match &self.id {
            // Declined id: keep the consumer's parser balanced by opening
            // the value's own brackets, with no id token.
            None => match value_shape {
                ValueShape::Object => {
                    out.start_object()?;
                    (Close::EndObject, BodyMode::Inline)
                }
                ValueShape::Array => {
                    out.start_array()?;
                    (Close::EndArray, BodyMode::Inline)
                }
                ValueShape::Scalar => (Close::Nothing, BodyMode::Framed),
            },
            Some(id) => {
                let effective = match (self.shape, value_shape) {
                    // Shape mismatch forces the array-wrapper fallback,
                    // never an error.
                    (WrapShape::AsProperty, ValueShape::Object) => WrapShape::AsProperty,
                    (WrapShape::AsProperty, _) => {
                        log::debug!(
                            "as-property type id on a non-object value, falling back to array wrapper"
                        );
                        WrapShape::WrapperArray
                    }
                    (shape, _) => shape,
                };
                match effective {
                    WrapShape::None => (Close::Nothing, BodyMode::Framed),
                    WrapShape::AsProperty => {
                        out.start_object()?;
                        out.field_name(&self.property)?;
                        out.scalar(Scalar::String(id.clone()))?;
                        (Close::EndObject, BodyMode::Inline)
                    }
                    WrapShape::WrapperArray => {
                        out.start_array()?;
                        out.scalar(Scalar::String(id.clone()))?;
                        (Close::EndArray, BodyMode::Framed)
                    }
                    WrapShape::WrapperObject => {
                        out.start_object()?;
                        out.field_name(id)?;
                        (Close::EndObject, BodyMode::Framed)
                    }
                }
            }
        };
        self.state = WriterState::Prefixed(close);
        Ok(mode)
    }

    /// Close the wrapping shape.
    ///
    /// # Panics
    /// Panics when no matching prefix was written: a suffix call with no
    /// prefix is a programming-contract violation, fatal by design.
    pub fn write_suffix(&mut self, out: &mut dyn EventWrite) -> Result<()> {
        let close = match self.state {
            WriterState::Prefixed(close) => close,
            _ => panic!("type-id suffix written without matching prefix"),
        };
        match close {
            Close::EndObject => out.end_object()?,
            Close::EndArray => out.end_array()?,
            Close::Nothing => {}
        }
        self.state = WriterState::Done;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::SharedTypeRegistry;
    use crate::event::{Token, TokenBuffer};

    fn spec(shape: WrapShape) -> TypeIdSpec {
        TypeIdSpec::new(shape, "@type", TypeIdStrategy::TypeName)
    }

    #[test]
    fn test_as_property_on_object() {
        let mut writer = TypeIdWriter::new(&spec(WrapShape::AsProperty), Some("Circle".into()));
        let mut buf = TokenBuffer::new();
        let mode = writer.write_prefix(ValueShape::Object, &mut buf).unwrap();
        assert_eq!(mode, BodyMode::Inline);
        writer.write_suffix(&mut buf).unwrap();

        assert_eq!(
            buf.tokens(),
            &[
                Token::StartObject,
                Token::FieldName("@type".into()),
                Token::Scalar(Scalar::String("Circle".into())),
                Token::EndObject,
            ]
        );
        assert!(buf.is_balanced());
    }

    #[test]
    fn test_as_property_scalar_falls_back_to_array_wrapper() {
        let mut as_prop = TypeIdWriter::new(&spec(WrapShape::AsProperty), Some("i64".into()));
        let mut buf_a = TokenBuffer::new();
        assert_eq!(
            as_prop.write_prefix(ValueShape::Scalar, &mut buf_a).unwrap(),
            BodyMode::Framed
        );
        as_prop.write_suffix(&mut buf_a).unwrap();

        let mut wrapper = TypeIdWriter::new(&spec(WrapShape::WrapperArray), Some("i64".into()));
        let mut buf_b = TokenBuffer::new();
        wrapper.write_prefix(ValueShape::Scalar, &mut buf_b).unwrap();
        wrapper.write_suffix(&mut buf_b).unwrap();

        // Auto-fallback produces the exact wrapper-array shape.
        assert_eq!(buf_a.tokens(), buf_b.tokens());
    }

    #[test]
    fn test_wrapper_object_shape() {
        let mut writer = TypeIdWriter::new(&spec(WrapShape::WrapperObject), Some("Circle".into()));
        let mut buf = TokenBuffer::new();
        let mode = writer.write_prefix(ValueShape::Object, &mut buf).unwrap();
        assert_eq!(mode, BodyMode::Framed);
        // Body would be written here.
        writer.write_suffix(&mut buf).unwrap();
        assert_eq!(
            buf.tokens(),
            &[
                Token::StartObject,
                Token::FieldName("Circle".into()),
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn test_null_id_keeps_brackets_balanced() {
        for (shape, open, close) in [
            (ValueShape::Object, Token::StartObject, Token::EndObject),
            (ValueShape::Array, Token::StartArray, Token::EndArray),
        ] {
            let mut writer = TypeIdWriter::new(&spec(WrapShape::AsProperty), None);
            let mut buf = TokenBuffer::new();
            let mode = writer.write_prefix(shape, &mut buf).unwrap();
            assert_eq!(mode, BodyMode::Inline);
            writer.write_suffix(&mut buf).unwrap();

            // Balanced, and no id token anywhere.
            assert_eq!(buf.tokens(), &[open.clone(), close.clone()]);
            assert!(buf.is_balanced());
        }
    }

    #[test]
    #[should_panic(expected = "suffix written without matching prefix")]
    fn test_suffix_without_prefix_panics() {
        let mut writer = TypeIdWriter::new(&spec(WrapShape::AsProperty), Some("X".into()));
        let mut buf = TokenBuffer::new();
        let _ = writer.write_suffix(&mut buf);
    }

    #[test]
    fn test_resolve_tag_fallback_and_error() {
        let registry = SharedTypeRegistry::new();
        let base = spec(WrapShape::AsProperty);
        assert!(matches!(
            resolve_tag(&base, "Ghost", &registry),
            Err(CodecError::InvalidTypeId { .. })
        ));

        let with_fallback =
            spec(WrapShape::AsProperty).with_default_impl(TypeDescriptor::named("Fallback"));
        let resolved = resolve_tag(&with_fallback, "Ghost", &registry).unwrap();
        assert_eq!(resolved.raw_name(), "Fallback");

        // Builtin raw names resolve without registration.
        let builtin = resolve_tag(&base, "i64", &registry).unwrap();
        assert_eq!(builtin.raw_name(), "i64");
    }

    #[test]
    fn test_compute_id_logical_declines_when_unassigned() {
        let registry = SharedTypeRegistry::new();
        let spec = TypeIdSpec::new(WrapShape::AsProperty, "@type", TypeIdStrategy::LogicalName);
        let value = Value::object("Circle");
        assert_eq!(compute_id(&spec, &value, &registry), None);

        let circle = TypeDescriptor::named("Circle");
        registry.register_logical_name(&circle, "circle");
        assert_eq!(
            compute_id(&spec, &value, &registry).as_deref(),
            Some("circle")
        );
    }
}
