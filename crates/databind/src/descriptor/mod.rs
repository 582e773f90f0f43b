// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type descriptors for runtime type information.
//!
//! A [`TypeDescriptor`] names a type, its ordered type parameters and its
//! supertype chain. Descriptors are immutable and `Arc`-shared; refinements
//! such as [`TypeDescriptor::with_static_typing`] produce a new descriptor.
//! Cache identity is (raw name, ordered parameters, static-typing flag) —
//! the supertype chain is derived information and excluded from identity.

mod registry;

pub use registry::{
    MemberDescription, MemberHints, SharedTypeRegistry, StructBuilder, StructDescription,
    TypeRegistry,
};

use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Raw names reserved for builtin scalar and container types.
pub const RAW_BOOL: &str = "bool";
pub const RAW_I64: &str = "i64";
pub const RAW_U64: &str = "u64";
pub const RAW_F64: &str = "f64";
pub const RAW_STRING: &str = "string";
pub const RAW_BYTES: &str = "bytes";
pub const RAW_ARRAY: &str = "array";
pub const RAW_MAP: &str = "map";
pub const RAW_ANY: &str = "any";

/// Scalar leaf kinds handled by the builtin codec library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    I64,
    U64,
    F64,
    String,
    Bytes,
}

impl ScalarKind {
    /// Scalar kind for a reserved raw name, if any.
    pub fn from_raw_name(name: &str) -> Option<Self> {
        match name {
            RAW_BOOL => Some(Self::Bool),
            RAW_I64 => Some(Self::I64),
            RAW_U64 => Some(Self::U64),
            RAW_F64 => Some(Self::F64),
            RAW_STRING => Some(Self::String),
            RAW_BYTES => Some(Self::Bytes),
            _ => None,
        }
    }
}

/// Structural classification of a descriptor, derived from its raw name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorClass {
    Scalar(ScalarKind),
    Array,
    Map,
    Any,
    /// Application type; members come from the [`TypeRegistry`].
    Named,
}

/// A complete type descriptor.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    name: Arc<str>,
    params: Vec<Arc<TypeDescriptor>>,
    supertypes: Vec<Arc<str>>,
    static_typing: bool,
}

impl TypeDescriptor {
    /// Create a descriptor for a named application type.
    pub fn named(name: impl Into<Arc<str>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            params: Vec::new(),
            supertypes: Vec::new(),
            static_typing: false,
        })
    }

    /// Create a descriptor with type parameters.
    pub fn generic(name: impl Into<Arc<str>>, params: Vec<Arc<TypeDescriptor>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            params,
            supertypes: Vec::new(),
            static_typing: false,
        })
    }

    /// Create a descriptor carrying a supertype chain (nearest first).
    pub fn with_supertypes(
        name: impl Into<Arc<str>>,
        supertypes: Vec<Arc<str>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            params: Vec::new(),
            supertypes,
            static_typing: false,
        })
    }

    pub fn bool_type() -> Arc<Self> {
        Self::named(RAW_BOOL)
    }

    pub fn i64_type() -> Arc<Self> {
        Self::named(RAW_I64)
    }

    pub fn u64_type() -> Arc<Self> {
        Self::named(RAW_U64)
    }

    pub fn f64_type() -> Arc<Self> {
        Self::named(RAW_F64)
    }

    pub fn string_type() -> Arc<Self> {
        Self::named(RAW_STRING)
    }

    pub fn bytes_type() -> Arc<Self> {
        Self::named(RAW_BYTES)
    }

    /// Descriptor for a dynamically shaped value (no declared structure).
    pub fn any_type() -> Arc<Self> {
        Self::named(RAW_ANY)
    }

    /// Descriptor for an ordered sequence of `element`.
    pub fn array_of(element: Arc<TypeDescriptor>) -> Arc<Self> {
        Self::generic(RAW_ARRAY, vec![element])
    }

    /// Descriptor for an ordered-key mapping.
    pub fn map_of(key: Arc<TypeDescriptor>, value: Arc<TypeDescriptor>) -> Arc<Self> {
        Self::generic(RAW_MAP, vec![key, value])
    }

    /// Refinement: same type with static typing forced. Produces a new
    /// descriptor; the original is never mutated.
    pub fn with_static_typing(self: &Arc<Self>, static_typing: bool) -> Arc<Self> {
        if self.static_typing == static_typing {
            return self.clone();
        }
        Arc::new(Self {
            name: self.name.clone(),
            params: self.params.clone(),
            supertypes: self.supertypes.clone(),
            static_typing,
        })
    }

    /// Raw type name.
    pub fn raw_name(&self) -> &str {
        &self.name
    }

    /// Ordered type parameters.
    pub fn params(&self) -> &[Arc<TypeDescriptor>] {
        &self.params
    }

    /// Supertype chain, nearest first.
    pub fn supertypes(&self) -> &[Arc<str>] {
        &self.supertypes
    }

    /// Whether static typing is forced (runtime subtype dispatch disabled).
    pub fn is_static(&self) -> bool {
        self.static_typing
    }

    /// Structural classification derived from the raw name.
    pub fn class(&self) -> DescriptorClass {
        if let Some(kind) = ScalarKind::from_raw_name(&self.name) {
            return DescriptorClass::Scalar(kind);
        }
        match &*self.name {
            RAW_ARRAY => DescriptorClass::Array,
            RAW_MAP => DescriptorClass::Map,
            RAW_ANY => DescriptorClass::Any,
            _ => DescriptorClass::Named,
        }
    }

    /// Element descriptor for arrays.
    pub fn element_type(&self) -> Option<&Arc<TypeDescriptor>> {
        match self.class() {
            DescriptorClass::Array => self.params.first(),
            _ => None,
        }
    }

    /// Key/value descriptors for maps.
    pub fn entry_types(&self) -> Option<(&Arc<TypeDescriptor>, &Arc<TypeDescriptor>)> {
        match self.class() {
            DescriptorClass::Map if self.params.len() == 2 => {
                Some((&self.params[0], &self.params[1]))
            }
            _ => None,
        }
    }

    /// True when `self` names `other` or lists it in the supertype chain.
    pub fn is_subtype_of(&self, other: &TypeDescriptor) -> bool {
        self.name == other.name || self.supertypes.iter().any(|s| **s == *other.name)
    }
}

// Cache identity: (raw name, ordered params, static flag). Supertypes are
// derived and excluded so a registry update cannot split the cache.
impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.static_typing == other.static_typing
            && self.params == other.params
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.static_typing.hash(state);
        for p in &self.params {
            p.hash(state);
        }
    }
}
