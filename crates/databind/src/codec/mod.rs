// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codec variants and the recursive write/read dispatch.
//!
//! A [`Codec`] is one unit capable of writing or reading one (family of)
//! runtime type(s). Behavior is composed as data-carrying variants —
//! scalar leaf, structural, array, map, delegating, reference, dynamic —
//! dispatched through the single `resolve -> Codec` indirection rather
//! than an inheritance chain. Codecs are constructed once per cache key,
//! then immutable and shared across threads; `with_*` mutators return a
//! new sibling sharing the same parts.

mod scalar;

use crate::accessor::{AccessorWrite, MemberCapability, PropertyAccessor};
use crate::descriptor::{ScalarKind, TypeDescriptor, RAW_MAP};
use crate::error::{CodecError, Result};
use crate::event::{EventRead, EventWrite, Scalar, Token, TokenKind};
use crate::identity::{BindTarget, DeIdentityCtx, IdentitySpec, SerIdentityCtx};
use crate::resolve::{CodecResolver, ResolveCtx};
use crate::typeid::{self, BodyMode, TypeIdSpec, TypeIdWriter, WrapShape};
use crate::value::{ObjectRef, Value};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Conversion function of a delegating codec.
pub type ConvertFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Ordered members of a structural codec. The member table is filled after
/// the codec is published to the per-call chain, so self-referential type
/// graphs can point a member codec back at this instance.
pub struct StructParts {
    members: OnceLock<Vec<PropertyAccessor>>,
    identity: Option<IdentitySpec>,
    any_member: Option<String>,
}

pub struct ArrayParts {
    element: Arc<Codec>,
}

pub struct MapParts {
    value: Arc<Codec>,
}

pub struct DelegatingParts {
    inner: Arc<Codec>,
    out_conv: ConvertFn,
    in_conv: ConvertFn,
}

pub struct ReferenceParts {
    identity: IdentitySpec,
}

/// Behavior variant of a codec.
#[derive(Clone)]
pub enum CodecKind {
    /// Leaf scalar.
    Scalar(ScalarKind),
    /// Composite with ordered property accessors.
    Struct(Arc<StructParts>),
    /// Indexed sequence of one element type.
    Array(Arc<ArrayParts>),
    /// Ordered-key mapping with scalar keys.
    Map(Arc<MapParts>),
    /// Wraps another codec with value conversions on both sides.
    Delegating(Arc<DelegatingParts>),
    /// Writes/reads only the target's identity id, never a body.
    Reference(Arc<ReferenceParts>),
    /// Dynamically shaped: dispatch on the runtime value/token shape.
    Any,
}

impl CodecKind {
    fn tag(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Struct(_) => "struct",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Delegating(_) => "delegating",
            Self::Reference(_) => "reference",
            Self::Any => "any",
        }
    }
}

/// One unit capable of writing/reading one type to/from the event stream.
#[derive(Clone)]
pub struct Codec {
    descriptor: Arc<TypeDescriptor>,
    kind: CodecKind,
    type_id: Option<TypeIdSpec>,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("type", &self.descriptor.raw_name())
            .field("kind", &self.kind.tag())
            .field("type_id", &self.type_id.is_some())
            .finish()
    }
}

impl Codec {
    pub fn scalar(descriptor: Arc<TypeDescriptor>, kind: ScalarKind) -> Arc<Self> {
        Arc::new(Self {
            descriptor,
            kind: CodecKind::Scalar(kind),
            type_id: None,
        })
    }

    pub fn array(descriptor: Arc<TypeDescriptor>, element: Arc<Codec>) -> Arc<Self> {
        Arc::new(Self {
            descriptor,
            kind: CodecKind::Array(Arc::new(ArrayParts { element })),
            type_id: None,
        })
    }

    pub fn map(descriptor: Arc<TypeDescriptor>, value: Arc<Codec>) -> Arc<Self> {
        Arc::new(Self {
            descriptor,
            kind: CodecKind::Map(Arc::new(MapParts { value })),
            type_id: None,
        })
    }

    pub fn any(descriptor: Arc<TypeDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            descriptor,
            kind: CodecKind::Any,
            type_id: None,
        })
    }

    /// Structural codec whose member table is filled later via
    /// [`Self::init_struct_members`] (resolution-cycle break).
    pub fn struct_placeholder(
        descriptor: Arc<TypeDescriptor>,
        identity: Option<IdentitySpec>,
        any_member: Option<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            descriptor,
            kind: CodecKind::Struct(Arc::new(StructParts {
                members: OnceLock::new(),
                identity,
                any_member,
            })),
            type_id: None,
        })
    }

    /// Codec serializing the target as its identity id only.
    pub fn reference(target: Arc<TypeDescriptor>, identity: IdentitySpec) -> Arc<Self> {
        Arc::new(Self {
            descriptor: target,
            kind: CodecKind::Reference(Arc::new(ReferenceParts { identity })),
            type_id: None,
        })
    }

    /// Codec converting values on the way in/out of `inner`.
    pub fn delegating(inner: Arc<Codec>, out_conv: ConvertFn, in_conv: ConvertFn) -> Arc<Self> {
        Arc::new(Self {
            descriptor: inner.descriptor.clone(),
            kind: CodecKind::Delegating(Arc::new(DelegatingParts {
                inner,
                out_conv,
                in_conv,
            })),
            type_id: None,
        })
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    pub fn kind(&self) -> &CodecKind {
        &self.kind
    }

    pub fn type_id(&self) -> Option<&TypeIdSpec> {
        self.type_id.as_ref()
    }

    /// Sibling instance with a type-id writer attached. Shares all parts
    /// with the receiver; the receiver is unchanged.
    pub fn with_type_id(self: &Arc<Self>, spec: TypeIdSpec) -> Arc<Self> {
        Arc::new(Self {
            descriptor: self.descriptor.clone(),
            kind: self.kind.clone(),
            type_id: Some(spec),
        })
    }

    /// Sibling instance without a type-id writer.
    fn untagged(&self) -> Arc<Self> {
        Arc::new(Self {
            descriptor: self.descriptor.clone(),
            kind: self.kind.clone(),
            type_id: None,
        })
    }

    /// Fill the member table of a structural placeholder.
    pub fn init_struct_members(&self, members: Vec<PropertyAccessor>) -> Result<()> {
        match &self.kind {
            CodecKind::Struct(parts) => {
                parts.members.set(members).map_err(|_| CodecError::BadTypeDefinition {
                    type_name: self.descriptor.raw_name().to_string(),
                    reason: "struct codec initialized twice".into(),
                })
            }
            _ => Err(CodecError::BadTypeDefinition {
                type_name: self.descriptor.raw_name().to_string(),
                reason: "not a structural codec".into(),
            }),
        }
    }

    /// Default value supplied to null substitution, when this codec has one.
    pub fn null_value(&self) -> Option<Value> {
        match &self.kind {
            CodecKind::Scalar(kind) => Some(scalar::default_value(*kind)),
            CodecKind::Delegating(parts) => parts.inner.null_value(),
            _ => None,
        }
    }

    fn members_of<'p>(&self, parts: &'p StructParts) -> Result<&'p [PropertyAccessor]> {
        parts
            .members
            .get()
            .map(Vec::as_slice)
            .ok_or_else(|| CodecError::BadTypeDefinition {
                type_name: self.descriptor.raw_name().to_string(),
                reason: "codec used before construction completed".into(),
            })
    }
}

// ---------------------------------------------------------------------------
// Call contexts
// ---------------------------------------------------------------------------

/// Call-scoped write state: resolver handle, resolution chain, identity
/// records and the value-recursion depth guard.
pub struct WriteCtx<'a> {
    resolver: &'a CodecResolver,
    pub resolve: ResolveCtx,
    pub identity: SerIdentityCtx,
    depth: usize,
    limit: usize,
}

impl<'a> WriteCtx<'a> {
    pub fn new(resolver: &'a CodecResolver, limit: usize) -> Self {
        Self {
            resolver,
            resolve: ResolveCtx::new(limit),
            identity: SerIdentityCtx::new(),
            depth: 0,
            limit,
        }
    }

    pub fn resolver(&self) -> &'a CodecResolver {
        self.resolver
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.limit {
            self.depth -= 1;
            return Err(CodecError::RecursionTooDeep { limit: self.limit });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }
}

#[derive(Debug, Clone)]
struct Anchor {
    owner: ObjectRef,
    member: String,
    index: Option<usize>,
}

/// Call-scoped read state: resolver handle, resolution chain, identity
/// records, deferral anchors and the depth guard.
pub struct ReadCtx<'a> {
    resolver: &'a CodecResolver,
    pub resolve: ResolveCtx,
    pub identity: DeIdentityCtx,
    anchors: Vec<Anchor>,
    depth: usize,
    limit: usize,
}

impl<'a> ReadCtx<'a> {
    pub fn new(resolver: &'a CodecResolver, limit: usize) -> Self {
        Self {
            resolver,
            resolve: ResolveCtx::new(limit),
            identity: DeIdentityCtx::new(),
            anchors: Vec::new(),
            depth: 0,
            limit,
        }
    }

    pub fn resolver(&self) -> &'a CodecResolver {
        self.resolver
    }

    /// End-of-call identity check (unresolved references fail here).
    pub fn finish_identity(&mut self) -> Result<()> {
        self.identity.finish()
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.limit {
            self.depth -= 1;
            return Err(CodecError::RecursionTooDeep { limit: self.limit });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn push_anchor(&mut self, owner: ObjectRef, member: String) {
        self.anchors.push(Anchor {
            owner,
            member,
            index: None,
        });
    }

    fn pop_anchor(&mut self) {
        self.anchors.pop();
    }

    fn set_anchor_index(&mut self, index: Option<usize>) {
        if let Some(top) = self.anchors.last_mut() {
            top.index = index;
        }
    }

    /// Where a deferred reference read at the current position would bind.
    fn bind_target(&self) -> Option<BindTarget> {
        self.anchors.last().map(|anchor| match anchor.index {
            Some(index) => BindTarget::Element {
                owner: anchor.owner.clone(),
                member: anchor.member.clone(),
                index,
            },
            None => BindTarget::Property {
                owner: anchor.owner.clone(),
                member: anchor.member.clone(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Write path
// ---------------------------------------------------------------------------

impl Codec {
    /// Write one value to the event stream.
    pub fn write(&self, value: &Value, out: &mut dyn EventWrite, ctx: &mut WriteCtx) -> Result<()> {
        ctx.enter()?;
        let result = self.write_checked(value, out, ctx);
        ctx.leave();
        result
    }

    fn write_checked(
        &self,
        value: &Value,
        out: &mut dyn EventWrite,
        ctx: &mut WriteCtx,
    ) -> Result<()> {
        // Null is never tagged or identity-tracked.
        if value.is_null() {
            return out.scalar(Scalar::Null);
        }
        // A previously written identity becomes a reference token instead
        // of a body, before any type-id wrapping.
        if let Value::Object(obj) = value {
            if let Some(existing) = ctx.identity.known_id(obj) {
                return out.scalar(scalar::scalar_from_value(&existing)?);
            }
        }
        match &self.type_id {
            Some(spec) => {
                let registry = ctx.resolver.registry().clone();
                let id = typeid::compute_id(spec, value, registry.as_ref());
                let mut writer = TypeIdWriter::new(spec, id);
                let mode = writer.write_prefix(typeid::shape_of(value), out)?;
                let concrete = self.concrete_for(value, ctx)?;
                concrete.write_body(value, out, ctx, mode == BodyMode::Inline)?;
                writer.write_suffix(out)
            }
            None => self.write_body(value, out, ctx, false),
        }
    }

    /// Codec for the value's runtime type, without a type-id writer (the
    /// tag was already emitted by the caller).
    fn concrete_for(&self, value: &Value, ctx: &mut WriteCtx) -> Result<Arc<Codec>> {
        let resolver = ctx.resolver;
        match value {
            Value::Object(obj) => {
                let name = obj.type_name();
                if *name == *self.descriptor.raw_name() && !matches!(self.kind, CodecKind::Any) {
                    return Ok(self.untagged());
                }
                let desc = resolver
                    .registry()
                    .descriptor(&name)
                    .unwrap_or_else(|| TypeDescriptor::named(name.to_string()));
                resolver.resolve(&desc, &mut ctx.resolve)
            }
            Value::Array(_) => resolver.resolve(
                &TypeDescriptor::array_of(TypeDescriptor::any_type()),
                &mut ctx.resolve,
            ),
            other => resolver.resolve(
                &TypeDescriptor::named(other.shape_name().to_string()),
                &mut ctx.resolve,
            ),
        }
    }

    /// Write the body. `pre_opened` means the enclosing type-id writer
    /// already opened (and will close) this value's brackets.
    fn write_body(
        &self,
        value: &Value,
        out: &mut dyn EventWrite,
        ctx: &mut WriteCtx,
        pre_opened: bool,
    ) -> Result<()> {
        match &self.kind {
            CodecKind::Scalar(kind) => out.scalar(scalar::encode(*kind, value)?),
            CodecKind::Struct(parts) => self.write_struct(parts, value, out, ctx, pre_opened),
            CodecKind::Array(parts) => self.write_array(parts, value, out, ctx, pre_opened),
            CodecKind::Map(parts) => self.write_map(parts, value, out, ctx, pre_opened),
            CodecKind::Delegating(parts) => {
                let converted = (parts.out_conv)(value.clone())?;
                parts.inner.write_body(&converted, out, ctx, pre_opened)
            }
            CodecKind::Reference(parts) => self.write_reference(parts, value, out, ctx),
            CodecKind::Any => self.write_any(value, out, ctx, pre_opened),
        }
    }

    fn write_struct(
        &self,
        parts: &StructParts,
        value: &Value,
        out: &mut dyn EventWrite,
        ctx: &mut WriteCtx,
        pre_opened: bool,
    ) -> Result<()> {
        let obj = value.as_object().ok_or_else(|| CodecError::InvalidData {
            reason: format!(
                "struct codec for '{}' given a {} value",
                self.descriptor.raw_name(),
                value.shape_name()
            ),
        })?;

        // First sight of an identity-tracked object: assign its id here so
        // nested back-references to it write reference tokens.
        let mut injected = None;
        if let Some(spec) = &parts.identity {
            if ctx.identity.known_id(obj).is_none() {
                let id = ctx.identity.record(obj, spec)?;
                if spec.visible && !id.is_null() && !matches!(spec.strategy, crate::identity::IdStrategy::Property(_)) {
                    injected = Some((spec.property.clone(), id));
                }
            }
        }

        if !pre_opened {
            out.start_object()?;
        }
        if let Some((property, id)) = &injected {
            out.field_name(property)?;
            out.scalar(scalar::scalar_from_value(id)?)?;
        }
        let members = self.members_of(parts)?;
        for accessor in members {
            match accessor.capability() {
                // The back half is reconstructed during reading.
                MemberCapability::BackReference => continue,
                // Materialized by the identity resolver above.
                MemberCapability::VirtualIdentity => continue,
                _ => {}
            }
            let member_value = accessor.read(obj)?;
            let codec = accessor.codec().ok_or_else(|| CodecError::BadTypeDefinition {
                type_name: self.descriptor.raw_name().to_string(),
                reason: format!("member '{}' has no resolved codec", accessor.name()),
            })?;
            out.field_name(accessor.name())?;
            codec.write(&member_value, out, ctx).map_err(|e| {
                CodecError::in_member(
                    accessor.name(),
                    Some(format!("{:?}", member_value)),
                    None,
                    e,
                )
            })?;
        }
        if !pre_opened {
            out.end_object()?;
        }
        Ok(())
    }

    fn write_array(
        &self,
        parts: &ArrayParts,
        value: &Value,
        out: &mut dyn EventWrite,
        ctx: &mut WriteCtx,
        pre_opened: bool,
    ) -> Result<()> {
        let items = value.as_array().ok_or_else(|| CodecError::InvalidData {
            reason: format!("array codec given a {} value", value.shape_name()),
        })?;
        if !pre_opened {
            out.start_array()?;
        }
        for item in items {
            parts.element.write(item, out, ctx)?;
        }
        if !pre_opened {
            out.end_array()?;
        }
        Ok(())
    }

    fn write_map(
        &self,
        parts: &MapParts,
        value: &Value,
        out: &mut dyn EventWrite,
        ctx: &mut WriteCtx,
        pre_opened: bool,
    ) -> Result<()> {
        let obj = value.as_object().ok_or_else(|| CodecError::InvalidData {
            reason: format!("map codec given a {} value", value.shape_name()),
        })?;
        if !pre_opened {
            out.start_object()?;
        }
        for (key, entry) in obj.entries() {
            out.field_name(&key)?;
            parts.value.write(&entry, out, ctx)?;
        }
        if !pre_opened {
            out.end_object()?;
        }
        Ok(())
    }

    fn write_reference(
        &self,
        parts: &ReferenceParts,
        value: &Value,
        out: &mut dyn EventWrite,
        ctx: &mut WriteCtx,
    ) -> Result<()> {
        let obj = value.as_object().ok_or_else(|| CodecError::InvalidData {
            reason: format!("reference codec given a {} value", value.shape_name()),
        })?;
        let id = match ctx.identity.known_id(obj) {
            Some(id) => id,
            None => ctx.identity.record(obj, &parts.identity)?,
        };
        if id.is_null() {
            return Err(CodecError::InvalidData {
                reason: format!(
                    "reference to '{}' requires a non-null id",
                    self.descriptor.raw_name()
                ),
            });
        }
        out.scalar(scalar::scalar_from_value(&id)?)
    }

    fn write_any(
        &self,
        value: &Value,
        out: &mut dyn EventWrite,
        ctx: &mut WriteCtx,
        pre_opened: bool,
    ) -> Result<()> {
        match value {
            Value::Object(obj) => {
                // A registered runtime type writes through its own codec;
                // anything else walks the slots generically.
                let resolver = ctx.resolver;
                let name = obj.type_name();
                if let Some(desc) = resolver.registry().descriptor(&name) {
                    let concrete = resolver.resolve(&desc, &mut ctx.resolve)?;
                    return concrete.write_body(value, out, ctx, pre_opened);
                }
                if !pre_opened {
                    out.start_object()?;
                }
                let element = self.dynamic_element(ctx)?;
                for (key, entry) in obj.entries() {
                    out.field_name(&key)?;
                    element.write(&entry, out, ctx)?;
                }
                if !pre_opened {
                    out.end_object()?;
                }
                Ok(())
            }
            Value::Array(items) => {
                if !pre_opened {
                    out.start_array()?;
                }
                let element = self.dynamic_element(ctx)?;
                for item in items {
                    element.write(item, out, ctx)?;
                }
                if !pre_opened {
                    out.end_array()?;
                }
                Ok(())
            }
            other => out.scalar(scalar::scalar_from_value(other)?),
        }
    }

    fn dynamic_element(&self, ctx: &mut WriteCtx) -> Result<Arc<Codec>> {
        let resolver = ctx.resolver;
        resolver.resolve(&TypeDescriptor::any_type(), &mut ctx.resolve)
    }
}

// ---------------------------------------------------------------------------
// Read path
// ---------------------------------------------------------------------------

impl Codec {
    /// Read one value from the event stream.
    pub fn read(&self, input: &mut dyn EventRead, ctx: &mut ReadCtx) -> Result<Value> {
        ctx.enter()?;
        let result = self.read_checked(input, ctx);
        ctx.leave();
        result
    }

    fn read_checked(&self, input: &mut dyn EventRead, ctx: &mut ReadCtx) -> Result<Value> {
        if matches!(input.peek(), Some(Token::Scalar(Scalar::Null))) {
            input.advance();
            return Ok(Value::Null);
        }
        match &self.type_id {
            Some(spec) => self.read_polymorphic(spec, input, ctx),
            None => self.read_body(input, ctx, false),
        }
    }

    /// Tolerant polymorphic read: object-property, array-wrapper, then
    /// bare-value interpretations, independent of the producer's shape.
    fn read_polymorphic(
        &self,
        spec: &TypeIdSpec,
        input: &mut dyn EventRead,
        ctx: &mut ReadCtx,
    ) -> Result<Value> {
        let registry = ctx.resolver.registry().clone();
        match input.current() {
            TokenKind::StartObject => {
                input.advance();
                let first_field = match input.peek() {
                    Some(Token::FieldName(name)) => Some(name.clone()),
                    _ => None,
                };
                if let Some(name) = first_field {
                    if name == spec.property {
                        input.advance();
                        let pos = input.position();
                        let id = match input.expect_scalar()? {
                            Scalar::String(s) => s,
                            other => {
                                return Err(CodecError::UnexpectedToken {
                                    expected: "type id string".into(),
                                    found: other.kind_name().into(),
                                    position: pos,
                                })
                            }
                        };
                        let desc = typeid::resolve_tag(spec, &id, registry.as_ref())?;
                        let concrete = ctx.resolver.resolve(&desc, &mut ctx.resolve)?;
                        return concrete.read_body(input, ctx, true);
                    }
                    // Wrapper-object shape: a single field whose name is
                    // the id (strict resolution, no default fallback).
                    if let Some(desc) = typeid::try_resolve_tag(spec, &name, registry.as_ref()) {
                        if spec.read_shape == WrapShape::WrapperObject
                            || spec.shape == WrapShape::WrapperObject
                        {
                            input.advance();
                            let concrete = ctx.resolver.resolve(&desc, &mut ctx.resolve)?;
                            let value = concrete.read(input, ctx)?;
                            input.expect(TokenKind::EndObject)?;
                            return Ok(value);
                        }
                    }
                }
                // Untagged object: the writer's id resolver declined, or
                // the producer wrote no tag at all.
                let fallback = self.fallback_codec(spec, ctx)?;
                fallback.read_body(input, ctx, true)
            }
            TokenKind::StartArray => {
                input.advance();
                let first = match input.peek() {
                    Some(Token::Scalar(Scalar::String(id))) => Some(id.clone()),
                    _ => None,
                };
                if let Some(id) = first {
                    if let Some(desc) = typeid::try_resolve_tag(spec, &id, registry.as_ref()) {
                        input.advance();
                        let concrete = ctx.resolver.resolve(&desc, &mut ctx.resolve)?;
                        let value = concrete.read(input, ctx)?;
                        input.expect(TokenKind::EndArray)?;
                        return Ok(value);
                    }
                }
                // Plain array body (null-id path).
                let fallback = self.fallback_codec(spec, ctx)?;
                fallback.read_body(input, ctx, true)
            }
            _ => {
                let fallback = self.fallback_codec(spec, ctx)?;
                fallback.read_body(input, ctx, false)
            }
        }
    }

    fn fallback_codec(&self, spec: &TypeIdSpec, ctx: &mut ReadCtx) -> Result<Arc<Codec>> {
        match &spec.default_impl {
            Some(desc) => ctx.resolver.resolve(desc, &mut ctx.resolve),
            None => Ok(self.untagged()),
        }
    }

    fn read_body(
        &self,
        input: &mut dyn EventRead,
        ctx: &mut ReadCtx,
        pre_opened: bool,
    ) -> Result<Value> {
        match &self.kind {
            CodecKind::Scalar(kind) => {
                let pos = input.position();
                let s = input.expect_scalar()?;
                scalar::decode(*kind, s, pos)
            }
            CodecKind::Struct(parts) => self.read_struct(parts, input, ctx, pre_opened),
            CodecKind::Array(parts) => self.read_array(parts, input, ctx, pre_opened),
            CodecKind::Map(parts) => self.read_map(parts, input, ctx, pre_opened),
            CodecKind::Delegating(parts) => {
                let value = if pre_opened {
                    parts.inner.read_body(input, ctx, true)?
                } else {
                    parts.inner.read(input, ctx)?
                };
                (parts.in_conv)(value)
            }
            CodecKind::Reference(_) => self.read_reference(input, ctx),
            CodecKind::Any => self.read_any(input, ctx, pre_opened),
        }
    }

    fn read_struct(
        &self,
        parts: &StructParts,
        input: &mut dyn EventRead,
        ctx: &mut ReadCtx,
        pre_opened: bool,
    ) -> Result<Value> {
        // A scalar in place of the body is a reference token.
        if parts.identity.is_some() && !pre_opened && input.current() == TokenKind::Scalar {
            let s = input.expect_scalar()?;
            let id = scalar::value_from_scalar(s);
            return match ctx.identity.lookup(&id) {
                Some(existing) => Ok(existing),
                None => {
                    let target = ctx.bind_target().ok_or_else(|| CodecError::InvalidData {
                        reason: "top-level reference token cannot be deferred".into(),
                    })?;
                    // Placeholder; the deferred binding overwrites it.
                    ctx.identity.defer(&id, target)?;
                    Ok(Value::Null)
                }
            };
        }

        if !pre_opened {
            input.expect(TokenKind::StartObject)?;
        }
        let members = self.members_of(parts)?;
        // Constructed eagerly so the id can bind before later members read.
        let mut owner = ObjectRef::new(self.descriptor.raw_name().to_string());
        // Setterless members mutate a container the constructed object
        // already owns; seed the declared container kinds.
        for accessor in members {
            if matches!(accessor.capability(), MemberCapability::SetterlessContainer) {
                match accessor.declared().class() {
                    crate::descriptor::DescriptorClass::Array => {
                        owner.set(accessor.name().to_string(), Value::Array(Vec::new()));
                    }
                    crate::descriptor::DescriptorClass::Map => {
                        owner.set(
                            accessor.name().to_string(),
                            Value::Object(ObjectRef::new(RAW_MAP)),
                        );
                    }
                    _ => {}
                }
            }
        }
        loop {
            match input.current() {
                TokenKind::EndObject => {
                    input.advance();
                    break;
                }
                TokenKind::FieldName => {
                    let name = input.expect_field_name()?;
                    let pos = input.position();
                    let is_id_property = parts
                        .identity
                        .as_ref()
                        .is_some_and(|spec| spec.property == name);

                    if let Some(accessor) = members.iter().find(|a| a.name() == name) {
                        let codec =
                            accessor
                                .codec()
                                .cloned()
                                .ok_or_else(|| CodecError::BadTypeDefinition {
                                    type_name: self.descriptor.raw_name().to_string(),
                                    reason: format!("member '{}' has no resolved codec", name),
                                })?;
                        ctx.push_anchor(owner.clone(), name.clone());
                        let read = codec.read(input, ctx);
                        ctx.pop_anchor();
                        let mut value = read
                            .map_err(|e| CodecError::in_member(&name, None, Some(pos), e))?;

                        if value.is_null() {
                            match accessor
                                .substitute_null()
                                .map_err(|e| CodecError::in_member(&name, None, Some(pos), e))?
                            {
                                // Skip policy (and deferred-reference
                                // placeholders): leave the member untouched.
                                None => continue,
                                Some(substitute) => value = substitute,
                            }
                        }

                        let bound_id = if is_id_property {
                            Some(value.clone())
                        } else {
                            None
                        };
                        match accessor
                            .write(&owner, value)
                            .map_err(|e| CodecError::in_member(&name, None, Some(pos), e))?
                        {
                            AccessorWrite::Stored => {}
                            AccessorWrite::Replaced(next) => owner = next,
                        }
                        if let Some(id) = bound_id {
                            ctx.identity.bind(&id, Value::Object(owner.clone()))?;
                        }
                    } else if is_id_property {
                        // Synthetic id property: binds but is not stored.
                        let s = input
                            .expect_scalar()
                            .map_err(|e| CodecError::in_member(&name, None, Some(pos), e))?;
                        let id = scalar::value_from_scalar(s);
                        ctx.identity.bind(&id, Value::Object(owner.clone()))?;
                    } else if let Some(any_name) = &parts.any_member {
                        let element = {
                            let resolver = ctx.resolver;
                            resolver.resolve(&TypeDescriptor::any_type(), &mut ctx.resolve)?
                        };
                        ctx.push_anchor(owner.clone(), any_name.clone());
                        let read = element.read(input, ctx);
                        ctx.pop_anchor();
                        let value =
                            read.map_err(|e| CodecError::in_member(&name, None, Some(pos), e))?;
                        if !owner.has(any_name) {
                            owner.set(any_name.clone(), Value::Object(ObjectRef::new(RAW_MAP)));
                        }
                        if let Some(Value::Object(bag)) = owner.get(any_name) {
                            bag.set(name, value);
                        }
                    } else {
                        log::trace!(
                            "skipping unknown field '{}' on '{}'",
                            name,
                            self.descriptor.raw_name()
                        );
                        input.skip_value()?;
                    }
                }
                other => {
                    return Err(CodecError::UnexpectedToken {
                        expected: "field-name or end-object".into(),
                        found: other.name().into(),
                        position: input.position(),
                    })
                }
            }
        }
        Ok(Value::Object(owner))
    }

    fn read_array(
        &self,
        parts: &ArrayParts,
        input: &mut dyn EventRead,
        ctx: &mut ReadCtx,
        pre_opened: bool,
    ) -> Result<Value> {
        if !pre_opened {
            input.expect(TokenKind::StartArray)?;
        }
        let mut items = Vec::new();
        let mut index = 0usize;
        loop {
            match input.current() {
                TokenKind::EndArray => {
                    input.advance();
                    break;
                }
                TokenKind::End => {
                    return Err(CodecError::UnexpectedToken {
                        expected: "value or end-array".into(),
                        found: TokenKind::End.name().into(),
                        position: input.position(),
                    })
                }
                _ => {
                    ctx.set_anchor_index(Some(index));
                    let read = parts.element.read(input, ctx);
                    ctx.set_anchor_index(None);
                    items.push(read?);
                    index += 1;
                }
            }
        }
        Ok(Value::Array(items))
    }

    fn read_map(
        &self,
        parts: &MapParts,
        input: &mut dyn EventRead,
        ctx: &mut ReadCtx,
        pre_opened: bool,
    ) -> Result<Value> {
        if !pre_opened {
            input.expect(TokenKind::StartObject)?;
        }
        let map = ObjectRef::new(RAW_MAP);
        loop {
            match input.current() {
                TokenKind::EndObject => {
                    input.advance();
                    break;
                }
                TokenKind::FieldName => {
                    let key = input.expect_field_name()?;
                    ctx.push_anchor(map.clone(), key.clone());
                    let read = parts.value.read(input, ctx);
                    ctx.pop_anchor();
                    map.set(key, read?);
                }
                other => {
                    return Err(CodecError::UnexpectedToken {
                        expected: "field-name or end-object".into(),
                        found: other.name().into(),
                        position: input.position(),
                    })
                }
            }
        }
        Ok(Value::Object(map))
    }

    fn read_reference(&self, input: &mut dyn EventRead, ctx: &mut ReadCtx) -> Result<Value> {
        let s = input.expect_scalar()?;
        let id = scalar::value_from_scalar(s);
        match ctx.identity.lookup(&id) {
            Some(existing) => Ok(existing),
            None => {
                let target = ctx.bind_target().ok_or_else(|| CodecError::InvalidData {
                    reason: "top-level reference token cannot be deferred".into(),
                })?;
                ctx.identity.defer(&id, target)?;
                Ok(Value::Null)
            }
        }
    }

    fn read_any(
        &self,
        input: &mut dyn EventRead,
        ctx: &mut ReadCtx,
        pre_opened: bool,
    ) -> Result<Value> {
        if pre_opened {
            return self.read_any_object_inline(input, ctx);
        }
        match input.current() {
            TokenKind::Scalar => Ok(scalar::value_from_scalar(input.expect_scalar()?)),
            TokenKind::StartObject => {
                input.advance();
                self.read_any_object_inline(input, ctx)
            }
            TokenKind::StartArray => {
                input.advance();
                let element = {
                    let resolver = ctx.resolver;
                    resolver.resolve(&TypeDescriptor::any_type(), &mut ctx.resolve)?
                };
                let mut items = Vec::new();
                let mut index = 0usize;
                loop {
                    match input.current() {
                        TokenKind::EndArray => {
                            input.advance();
                            break;
                        }
                        TokenKind::End => {
                            return Err(CodecError::UnexpectedToken {
                                expected: "value or end-array".into(),
                                found: TokenKind::End.name().into(),
                                position: input.position(),
                            })
                        }
                        _ => {
                            ctx.set_anchor_index(Some(index));
                            let read = element.read(input, ctx);
                            ctx.set_anchor_index(None);
                            items.push(read?);
                            index += 1;
                        }
                    }
                }
                Ok(Value::Array(items))
            }
            other => Err(CodecError::UnexpectedToken {
                expected: "value".into(),
                found: other.name().into(),
                position: input.position(),
            }),
        }
    }

    fn read_any_object_inline(&self, input: &mut dyn EventRead, ctx: &mut ReadCtx) -> Result<Value> {
        let obj = ObjectRef::new(self.descriptor.raw_name().to_string());
        let element = {
            let resolver = ctx.resolver;
            resolver.resolve(&TypeDescriptor::any_type(), &mut ctx.resolve)?
        };
        loop {
            match input.current() {
                TokenKind::EndObject => {
                    input.advance();
                    break;
                }
                TokenKind::FieldName => {
                    let name = input.expect_field_name()?;
                    ctx.push_anchor(obj.clone(), name.clone());
                    let read = element.read(input, ctx);
                    ctx.pop_anchor();
                    obj.set(name, read?);
                }
                other => {
                    return Err(CodecError::UnexpectedToken {
                        expected: "field-name or end-object".into(),
                        found: other.name().into(),
                        position: input.position(),
                    })
                }
            }
        }
        Ok(Value::Object(obj))
    }
}
