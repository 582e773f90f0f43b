// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type registry: the introspection collaborator behind codec resolution.
//!
//! Given a [`TypeDescriptor`], the registry returns the ordered member
//! descriptions of a composite type (name, declared type, access capability,
//! declaration-site hints), the subtype table used for polymorphic dispatch,
//! and the logical-name table used by type-id strategies.

use crate::accessor::{MemberCapability, NullPolicy};
use crate::descriptor::TypeDescriptor;
use crate::identity::IdentitySpec;
use crate::typeid::WrapShape;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Declaration-site hints attached to one member.
#[derive(Debug, Clone, Default)]
pub struct MemberHints {
    /// Force a type tag on this member even without registered subtypes.
    pub polymorphic: bool,
    /// Override the engine's wrapping shape for this member's type tag.
    pub type_id_shape: Option<WrapShape>,
    /// Override the accessor's null-handling policy.
    pub null_policy: Option<NullPolicy>,
    /// Serialize this member as its target's identity id only, never a body.
    pub always_as_id: bool,
}

impl MemberHints {
    /// True when no hint is set; contextualization is a no-op then.
    pub fn is_empty(&self) -> bool {
        !self.polymorphic
            && self.type_id_shape.is_none()
            && self.null_policy.is_none()
            && !self.always_as_id
    }
}

/// Raw description of one named, ordered member of a composite type.
#[derive(Debug, Clone)]
pub struct MemberDescription {
    pub name: String,
    pub declared: Arc<TypeDescriptor>,
    pub capability: MemberCapability,
    pub hints: MemberHints,
}

impl MemberDescription {
    /// Storage-slot member.
    pub fn slot(name: impl Into<String>, declared: Arc<TypeDescriptor>) -> Self {
        Self {
            name: name.into(),
            declared,
            capability: MemberCapability::Slot,
            hints: MemberHints::default(),
        }
    }

    /// Member with an explicit capability.
    pub fn with_capability(
        name: impl Into<String>,
        declared: Arc<TypeDescriptor>,
        capability: MemberCapability,
    ) -> Self {
        Self {
            name: name.into(),
            declared,
            capability,
            hints: MemberHints::default(),
        }
    }

    /// Attach declaration-site hints.
    pub fn with_hints(mut self, hints: MemberHints) -> Self {
        self.hints = hints;
        self
    }
}

/// Ordered member layout of one composite type.
#[derive(Debug, Clone)]
pub struct StructDescription {
    pub descriptor: Arc<TypeDescriptor>,
    pub members: Vec<MemberDescription>,
    /// Identity tracking for instances of this type.
    pub identity: Option<IdentitySpec>,
    /// Catch-all object-valued member collecting unknown fields on read.
    pub any_member: Option<String>,
}

impl StructDescription {
    /// Start building a description for `descriptor`.
    pub fn builder(descriptor: Arc<TypeDescriptor>) -> StructBuilder {
        StructBuilder {
            descriptor,
            members: Vec::new(),
            identity: None,
            any_member: None,
        }
    }

    /// Member description by name.
    pub fn member(&self, name: &str) -> Option<&MemberDescription> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Fluent builder for [`StructDescription`].
#[derive(Debug)]
pub struct StructBuilder {
    descriptor: Arc<TypeDescriptor>,
    members: Vec<MemberDescription>,
    identity: Option<IdentitySpec>,
    any_member: Option<String>,
}

impl StructBuilder {
    /// Add a storage-slot member.
    pub fn slot(mut self, name: impl Into<String>, declared: Arc<TypeDescriptor>) -> Self {
        self.members.push(MemberDescription::slot(name, declared));
        self
    }

    /// Add a member with an explicit capability.
    pub fn member(mut self, member: MemberDescription) -> Self {
        self.members.push(member);
        self
    }

    /// Enable identity tracking for this type.
    pub fn identity(mut self, spec: IdentitySpec) -> Self {
        self.identity = Some(spec);
        self
    }

    /// Collect unknown fields into the named object-valued member.
    pub fn any_member(mut self, name: impl Into<String>) -> Self {
        self.any_member = Some(name.into());
        self
    }

    pub fn build(self) -> StructDescription {
        StructDescription {
            descriptor: self.descriptor,
            members: self.members,
            identity: self.identity,
            any_member: self.any_member,
        }
    }
}

/// Registry resolving descriptors to member layouts, subtypes and logical names.
pub trait TypeRegistry: Send + Sync {
    /// Ordered member layout for a composite type, `None` if unregistered.
    fn introspect(&self, descriptor: &TypeDescriptor) -> Option<StructDescription>;

    /// Descriptor registered under a raw type name.
    fn descriptor(&self, raw_name: &str) -> Option<Arc<TypeDescriptor>>;

    /// Registered concrete subtypes of `descriptor`.
    fn subtypes(&self, descriptor: &TypeDescriptor) -> Vec<Arc<TypeDescriptor>>;

    /// Logical name assigned to `descriptor`, if any.
    fn logical_name(&self, descriptor: &TypeDescriptor) -> Option<String>;

    /// Descriptor for a logical name.
    fn resolve_logical(&self, id: &str) -> Option<Arc<TypeDescriptor>>;
}

#[derive(Debug, Default)]
struct RegistryInner {
    structs: HashMap<String, StructDescription>,
    descriptors: HashMap<String, Arc<TypeDescriptor>>,
    subtypes: HashMap<String, Vec<Arc<TypeDescriptor>>>,
    logical: HashMap<String, Arc<TypeDescriptor>>,
    logical_by_type: HashMap<String, String>,
}

/// `RwLock`-shared [`TypeRegistry`]: many concurrent resolutions, occasional
/// registration.
#[derive(Debug, Default)]
pub struct SharedTypeRegistry {
    inner: RwLock<RegistryInner>,
}

impl SharedTypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a composite type's member layout.
    pub fn register_struct(&self, description: StructDescription) {
        let mut inner = self.inner.write();
        let name = description.descriptor.raw_name().to_string();
        inner
            .descriptors
            .insert(name.clone(), description.descriptor.clone());
        inner.structs.insert(name, description);
    }

    /// Register `sub` as a concrete subtype of `base`.
    pub fn register_subtype(&self, base: &Arc<TypeDescriptor>, sub: Arc<TypeDescriptor>) {
        let mut inner = self.inner.write();
        inner
            .descriptors
            .entry(sub.raw_name().to_string())
            .or_insert_with(|| sub.clone());
        inner
            .subtypes
            .entry(base.raw_name().to_string())
            .or_default()
            .push(sub);
    }

    /// Assign a logical name usable as an external type id.
    pub fn register_logical_name(&self, descriptor: &Arc<TypeDescriptor>, name: impl Into<String>) {
        let name = name.into();
        let mut inner = self.inner.write();
        inner.logical.insert(name.clone(), descriptor.clone());
        inner
            .logical_by_type
            .insert(descriptor.raw_name().to_string(), name);
    }

    /// Number of registered composite types.
    pub fn len(&self) -> usize {
        self.inner.read().structs.len()
    }

    /// Returns `true` if no composite types are registered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().structs.is_empty()
    }
}

impl TypeRegistry for SharedTypeRegistry {
    fn introspect(&self, descriptor: &TypeDescriptor) -> Option<StructDescription> {
        self.inner.read().structs.get(descriptor.raw_name()).cloned()
    }

    fn descriptor(&self, raw_name: &str) -> Option<Arc<TypeDescriptor>> {
        self.inner.read().descriptors.get(raw_name).cloned()
    }

    fn subtypes(&self, descriptor: &TypeDescriptor) -> Vec<Arc<TypeDescriptor>> {
        self.inner
            .read()
            .subtypes
            .get(descriptor.raw_name())
            .cloned()
            .unwrap_or_default()
    }

    fn logical_name(&self, descriptor: &TypeDescriptor) -> Option<String> {
        self.inner
            .read()
            .logical_by_type
            .get(descriptor.raw_name())
            .cloned()
    }

    fn resolve_logical(&self, id: &str) -> Option<Arc<TypeDescriptor>> {
        self.inner.read().logical.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_introspect() {
        let registry = SharedTypeRegistry::new();
        let point = TypeDescriptor::named("Point");
        registry.register_struct(
            StructDescription::builder(point.clone())
                .slot("x", TypeDescriptor::i64_type())
                .slot("y", TypeDescriptor::i64_type())
                .build(),
        );

        let desc = registry.introspect(&point).expect("registered");
        assert_eq!(desc.members.len(), 2);
        assert_eq!(desc.members[0].name, "x");
        assert!(registry.introspect(&TypeDescriptor::named("Missing")).is_none());
    }

    #[test]
    fn test_subtype_and_logical_tables() {
        let registry = SharedTypeRegistry::new();
        let shape = TypeDescriptor::named("Shape");
        let circle = TypeDescriptor::with_supertypes("Circle", vec![Arc::from("Shape")]);

        registry.register_subtype(&shape, circle.clone());
        registry.register_logical_name(&circle, "circle");

        let subs = registry.subtypes(&shape);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].raw_name(), "Circle");

        assert_eq!(registry.logical_name(&circle).as_deref(), Some("circle"));
        let resolved = registry.resolve_logical("circle").expect("logical name");
        assert_eq!(resolved.raw_name(), "Circle");
        assert!(registry.resolve_logical("square").is_none());
    }
}
