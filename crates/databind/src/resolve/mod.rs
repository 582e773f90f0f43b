// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codec resolver and cache.
//!
//! `resolve` is the single indirection every dynamic dispatch goes through:
//! look up the primary cache (an immutable snapshot behind `ArcSwap`, so
//! readers never block), fall back to the per-call chain of in-progress
//! codecs, construct on miss, then publish first-writer-wins. Losing racers
//! are discarded, never retried or merged; construction is pure so a
//! discarded duplicate is safe. Contextualized (per-property) codecs live
//! in a separate sharded map keyed by the requesting property's identity.

mod chain;

pub use chain::ResolveChain;

use crate::accessor::{NullPolicy, PropertyAccessor};
use crate::codec::Codec;
use crate::descriptor::{
    DescriptorClass, MemberDescription, TypeDescriptor, TypeRegistry,
};
use crate::error::{CodecError, Result};
use crate::typeid::TypeIdSpec;
use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Call-scoped resolution state: the chain of in-progress codecs, the
/// recursion depth guard and the per-call failure memo. Never shared
/// across concurrent calls; reclaimed when the call unwinds.
#[derive(Debug)]
pub struct ResolveCtx {
    chain: ResolveChain,
    depth: usize,
    limit: usize,
    failed: Vec<(Arc<TypeDescriptor>, String)>,
}

impl ResolveCtx {
    pub fn new(limit: usize) -> Self {
        Self {
            chain: ResolveChain::new(),
            depth: 0,
            limit,
            failed: Vec::new(),
        }
    }
}

/// Lazily builds and memoizes one codec per type descriptor.
pub struct CodecResolver {
    registry: Arc<dyn TypeRegistry>,
    primary: ArcSwap<HashMap<Arc<TypeDescriptor>, Arc<Codec>>>,
    contextual: DashMap<(Arc<TypeDescriptor>, String), Arc<Codec>>,
    type_id_template: TypeIdSpec,
}

impl CodecResolver {
    /// New resolver with empty caches. A rebuilt configuration gets a new
    /// resolver: the caches are discarded wholesale, never selectively.
    pub fn new(registry: Arc<dyn TypeRegistry>, type_id_template: TypeIdSpec) -> Self {
        Self {
            registry,
            primary: ArcSwap::from_pointee(HashMap::new()),
            contextual: DashMap::new(),
            type_id_template,
        }
    }

    pub fn registry(&self) -> &Arc<dyn TypeRegistry> {
        &self.registry
    }

    /// Number of type-level codecs currently published.
    pub fn cached_codecs(&self) -> usize {
        self.primary.load().len()
    }

    /// Resolve the codec for a type descriptor.
    pub fn resolve(
        &self,
        descriptor: &Arc<TypeDescriptor>,
        ctx: &mut ResolveCtx,
    ) -> Result<Arc<Codec>> {
        if let Some(found) = self.primary.load().get(descriptor) {
            return Ok(found.clone());
        }
        if let Some(in_progress) = ctx.chain.get(descriptor) {
            return Ok(in_progress);
        }
        // A failed construction is remembered only for this call; the next
        // external call retries fresh.
        if let Some((_, reason)) = ctx
            .failed
            .iter()
            .find(|(failed, _)| **failed == **descriptor)
        {
            return Err(CodecError::BadTypeDefinition {
                type_name: descriptor.raw_name().to_string(),
                reason: reason.clone(),
            });
        }

        ctx.depth += 1;
        if ctx.depth > ctx.limit {
            ctx.depth -= 1;
            return Err(CodecError::RecursionTooDeep { limit: ctx.limit });
        }
        let constructed = self.construct(descriptor, ctx);
        ctx.depth -= 1;

        let built = match constructed {
            Ok(codec) => codec,
            Err(e) => {
                ctx.failed.push((descriptor.clone(), e.to_string()));
                return Err(e);
            }
        };

        // First successfully published wins; or_insert keeps an entry a
        // concurrent racer got in first.
        self.primary.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.entry(descriptor.clone()).or_insert_with(|| built.clone());
            next
        });
        let winner = self
            .primary
            .load()
            .get(descriptor)
            .cloned()
            .unwrap_or_else(|| built.clone());
        if !Arc::ptr_eq(&winner, &built) {
            log::debug!(
                "discarding duplicate codec for '{}' (lost publication race)",
                descriptor.raw_name()
            );
        }
        Ok(winner)
    }

    /// Resolve and contextualize the codec for one member declaration.
    ///
    /// Contextualization is idempotent: the result is cached by the
    /// requesting property's identity, so re-running with the same inputs
    /// returns the same codec instance, not a new equivalent one.
    pub fn resolve_property(
        &self,
        owner: &TypeDescriptor,
        member: &MemberDescription,
        ctx: &mut ResolveCtx,
    ) -> Result<Arc<Codec>> {
        let base = self.resolve(&member.declared, ctx)?;

        let property_id = format!("{}.{}", owner.raw_name(), member.name);
        if let Some(found) = self
            .contextual
            .get(&(member.declared.clone(), property_id.clone()))
        {
            return Ok(found.clone());
        }

        let contextualized = self.contextualize(&base, member)?;
        if Arc::ptr_eq(&contextualized, &base) {
            return Ok(base);
        }
        let entry = self
            .contextual
            .entry((member.declared.clone(), property_id))
            .or_insert(contextualized);
        Ok(entry.clone())
    }

    /// Contextualize a root-level codec: runtime subtype dispatch applies
    /// to the root slot exactly as it would to a member slot.
    pub fn resolve_root(
        &self,
        descriptor: &Arc<TypeDescriptor>,
        ctx: &mut ResolveCtx,
    ) -> Result<Arc<Codec>> {
        let base = self.resolve(descriptor, ctx)?;
        if descriptor.is_static() || self.registry.subtypes(descriptor).is_empty() {
            return Ok(base);
        }
        let key = (descriptor.clone(), "<root>".to_string());
        if let Some(found) = self.contextual.get(&key) {
            return Ok(found.clone());
        }
        let tagged = base.with_type_id(self.type_id_template.clone());
        let entry = self.contextual.entry(key).or_insert(tagged);
        Ok(entry.clone())
    }

    fn contextualize(&self, base: &Arc<Codec>, member: &MemberDescription) -> Result<Arc<Codec>> {
        if member.hints.always_as_id {
            let layout = self.registry.introspect(&member.declared).ok_or_else(|| {
                CodecError::BadTypeDefinition {
                    type_name: member.declared.raw_name().to_string(),
                    reason: "reference member targets an unregistered type".into(),
                }
            })?;
            let spec = layout.identity.ok_or_else(|| CodecError::BadTypeDefinition {
                type_name: member.declared.raw_name().to_string(),
                reason: "reference member targets a type without identity".into(),
            })?;
            return Ok(Codec::reference(member.declared.clone(), spec));
        }

        let polymorphic = !member.declared.is_static()
            && (member.hints.polymorphic
                || member.hints.type_id_shape.is_some()
                || !self.registry.subtypes(&member.declared).is_empty());
        if !polymorphic {
            return Ok(base.clone());
        }

        let mut spec = self.type_id_template.clone();
        if let Some(shape) = member.hints.type_id_shape {
            spec.shape = shape;
        }
        Ok(base.with_type_id(spec))
    }

    /// Construct a codec for a descriptor. Pure: no side effects beyond
    /// the per-call chain, so a racing duplicate can be discarded safely.
    fn construct(
        &self,
        descriptor: &Arc<TypeDescriptor>,
        ctx: &mut ResolveCtx,
    ) -> Result<Arc<Codec>> {
        match descriptor.class() {
            DescriptorClass::Scalar(kind) => Ok(Codec::scalar(descriptor.clone(), kind)),
            DescriptorClass::Any => Ok(Codec::any(descriptor.clone())),
            DescriptorClass::Array => {
                let element = descriptor.element_type().ok_or_else(|| {
                    CodecError::BadTypeDefinition {
                        type_name: descriptor.raw_name().to_string(),
                        reason: "array descriptor without an element parameter".into(),
                    }
                })?;
                let element_codec = self.resolve(element, ctx)?;
                Ok(Codec::array(descriptor.clone(), element_codec))
            }
            DescriptorClass::Map => {
                let (key, value) = descriptor.entry_types().ok_or_else(|| {
                    CodecError::BadTypeDefinition {
                        type_name: descriptor.raw_name().to_string(),
                        reason: "map descriptor without key/value parameters".into(),
                    }
                })?;
                if !matches!(key.class(), DescriptorClass::Scalar(_)) {
                    return Err(CodecError::BadTypeDefinition {
                        type_name: descriptor.raw_name().to_string(),
                        reason: format!("map key '{}' is not a scalar type", key.raw_name()),
                    });
                }
                let value_codec = self.resolve(value, ctx)?;
                Ok(Codec::map(descriptor.clone(), value_codec))
            }
            DescriptorClass::Named => self.construct_named(descriptor, ctx),
        }
    }

    fn construct_named(
        &self,
        descriptor: &Arc<TypeDescriptor>,
        ctx: &mut ResolveCtx,
    ) -> Result<Arc<Codec>> {
        let Some(layout) = self.registry.introspect(descriptor) else {
            // An unregistered base with registered subtypes is a purely
            // dynamic slot: dispatch happens on the runtime type.
            if !self.registry.subtypes(descriptor).is_empty() {
                return Ok(Codec::any(descriptor.clone()));
            }
            return Err(CodecError::BadTypeDefinition {
                type_name: descriptor.raw_name().to_string(),
                reason: "type is not registered and has no subtypes".into(),
            });
        };

        // Publish the placeholder to the chain before member codecs
        // resolve, so self-referential type graphs terminate.
        let codec = Codec::struct_placeholder(
            descriptor.clone(),
            layout.identity.clone(),
            layout.any_member.clone(),
        );
        let saved = ctx.chain.clone();
        ctx.chain = ctx.chain.with(descriptor.clone(), codec.clone());
        let members = self.build_accessors(descriptor, &layout.members, ctx);
        ctx.chain = saved;
        codec.init_struct_members(members?)?;
        log::debug!(
            "constructed struct codec for '{}' ({} members)",
            descriptor.raw_name(),
            layout.members.len()
        );
        Ok(codec)
    }

    fn build_accessors(
        &self,
        owner: &Arc<TypeDescriptor>,
        members: &[MemberDescription],
        ctx: &mut ResolveCtx,
    ) -> Result<Vec<PropertyAccessor>> {
        let mut accessors = Vec::with_capacity(members.len());
        for member in members {
            let codec = self.resolve_property(owner, member, ctx)?;
            let policy = member.hints.null_policy.unwrap_or(NullPolicy::Skip);
            let accessor = PropertyAccessor::new(
                member.name.as_str(),
                member.declared.clone(),
                member.capability.clone(),
                policy,
            )
            .with_codec(codec)?;
            accessors.push(accessor);
        }
        Ok(accessors)
    }
}
