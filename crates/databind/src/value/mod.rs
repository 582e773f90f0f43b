// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic value model.
//!
//! [`Value`] is the in-memory form the codec engine reads and writes.
//! Composite values are [`ObjectRef`]s: reference-counted cells whose
//! pointer identity is what the object-identity resolver tracks, so shared
//! and cyclic graphs are representable. Values are call-scoped and
//! single-threaded; codecs shared across threads never hold them.

use crate::error::{CodecError, Result};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// A dynamic value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Object(ObjectRef),
}

impl Value {
    /// Create an empty object of the given runtime type.
    pub fn object(type_name: impl Into<Arc<str>>) -> Value {
        Value::Object(ObjectRef::new(type_name))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Short shape name for diagnostics.
    pub fn shape_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::F64(_) => "f64",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::U64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Array(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Self::Object(v)
    }
}

#[derive(Debug, Clone)]
struct ObjectSlots {
    type_name: Arc<str>,
    slots: Vec<(String, Value)>,
}

/// Identity-bearing composite value. Cloning shares the referent; two clones
/// compare pointer-equal via [`ObjectRef::ptr_eq`].
#[derive(Clone)]
pub struct ObjectRef {
    inner: Rc<RefCell<ObjectSlots>>,
}

impl ObjectRef {
    /// Create an empty object of the given runtime type.
    pub fn new(type_name: impl Into<Arc<str>>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObjectSlots {
                type_name: type_name.into(),
                slots: Vec::new(),
            })),
        }
    }

    /// Runtime type name of this object.
    pub fn type_name(&self) -> Arc<str> {
        self.inner.borrow().type_name.clone()
    }

    /// Stable identity for the lifetime of this object.
    pub fn ptr_id(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    /// Same referent (object identity, not structural equality).
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Slot value by name, cloned out.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner
            .borrow()
            .slots
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    /// Set a slot, replacing an existing value or appending in order.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        let mut inner = self.inner.borrow_mut();
        if let Some(slot) = inner.slots.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            inner.slots.push((name, value));
        }
    }

    /// Remove a slot, returning its value.
    pub fn remove(&self, name: &str) -> Option<Value> {
        let mut inner = self.inner.borrow_mut();
        let idx = inner.slots.iter().position(|(n, _)| n == name)?;
        Some(inner.slots.remove(idx).1)
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.borrow().slots.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().slots.is_empty()
    }

    /// Slot names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.inner
            .borrow()
            .slots
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Ordered (name, value) pairs, cloned out.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.inner.borrow().slots.clone()
    }

    /// Mutate a slot value in place. Returns `None` when the slot is absent.
    pub fn update<R>(&self, name: &str, f: impl FnOnce(&mut Value) -> R) -> Option<R> {
        let mut inner = self.inner.borrow_mut();
        inner
            .slots
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| f(v))
    }

    /// Replace one element of an array-valued slot. Used when a deferred
    /// reference binding lands inside a previously read sequence.
    pub fn set_element(&self, name: &str, index: usize, value: Value) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let slot = inner
            .slots
            .iter_mut()
            .find(|(n, _)| n == name)
            .ok_or_else(|| CodecError::DefinitionMismatch {
                member: name.to_string(),
                reason: "slot absent for element binding".into(),
            })?;
        match &mut slot.1 {
            Value::Array(items) if index < items.len() => {
                items[index] = value;
                Ok(())
            }
            Value::Array(items) => Err(CodecError::DefinitionMismatch {
                member: name.to_string(),
                reason: format!("element index {} out of bounds ({})", index, items.len()),
            }),
            other => Err(CodecError::DefinitionMismatch {
                member: name.to_string(),
                reason: format!("element binding needs an array, found {}", other.shape_name()),
            }),
        }
    }
}

// Shallow on purpose: a deep derive would recurse forever on cyclic graphs.
impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        write!(
            f,
            "ObjectRef({} @{:#x}, {} slots)",
            inner.type_name,
            Rc::as_ptr(&self.inner) as usize,
            inner.slots.len()
        )
    }
}

/// Structural equality that terminates on cyclic graphs: a pointer pair
/// already on the comparison stack is assumed equal, which is the standard
/// coinductive reading of graph equality.
pub fn graph_eq(a: &Value, b: &Value) -> bool {
    let mut visited = HashSet::new();
    eq_inner(a, b, &mut visited)
}

fn eq_inner(a: &Value, b: &Value, visited: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::I64(x), Value::I64(y)) => x == y,
        (Value::U64(x), Value::U64(y)) => x == y,
        (Value::F64(x), Value::F64(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bytes(x), Value::Bytes(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(xa, ya)| eq_inner(xa, ya, visited))
        }
        (Value::Object(x), Value::Object(y)) => {
            if ObjectRef::ptr_eq(x, y) {
                return true;
            }
            let pair = (x.ptr_id(), y.ptr_id());
            if !visited.insert(pair) {
                return true;
            }
            if x.type_name() != y.type_name() || x.len() != y.len() {
                return false;
            }
            let entries = x.entries();
            for (name, xv) in &entries {
                match y.get(name) {
                    Some(yv) => {
                        if !eq_inner(xv, &yv, visited) {
                            return false;
                        }
                    }
                    None => return false,
                }
            }
            true
        }
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        graph_eq(self, other)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        graph_eq(
            &Value::Object(self.clone()),
            &Value::Object(other.clone()),
        )
    }
}
