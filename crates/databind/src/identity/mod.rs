// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Object-identity resolution for shared and cyclic graphs.
//!
//! Identity is pointer identity of an [`ObjectRef`], not structural
//! equality, scoped to one top-level serialize/deserialize call. On write,
//! a previously seen object becomes a reference token (its assigned id)
//! instead of a full body. On read, an id binds to its instance eagerly
//! when possible; forward references encountered first are queued as
//! deferred bindings and flushed when the definition appears.

use crate::error::{CodecError, Result};
use crate::value::{ObjectRef, Value};
use std::collections::{HashMap, HashSet};

/// Id-generation strategy for identity-tracked types.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub enum IdStrategy {
    /// Per-call sequence counter starting at 1.
    Sequence,
    /// Id read off the named property of the object itself. A null value
    /// is a legitimate intermediate state (e.g. a store-assigned key not
    /// yet present) and propagates without error.
    Property(String),
    /// Deterministic hash over the object's scalar slots.
    ContentHash,
}

/// Identity configuration for one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySpec {
    /// External name the id is written under.
    pub property: String,
    pub strategy: IdStrategy,
    /// Whether the id appears as a property in the written body.
    pub visible: bool,
}

impl IdentitySpec {
    pub fn sequence(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            strategy: IdStrategy::Sequence,
            visible: true,
        }
    }

    pub fn property_based(property: impl Into<String>) -> Self {
        let property = property.into();
        Self {
            strategy: IdStrategy::Property(property.clone()),
            property,
            visible: true,
        }
    }

    pub fn content_hash(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            strategy: IdStrategy::ContentHash,
            visible: true,
        }
    }

    /// Keep the id out of the written body (reference tokens only).
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// Hashable form of an id value. Null ids have no key: they cannot be
/// referenced and are never recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdKey {
    I64(i64),
    U64(u64),
    Str(String),
}

impl IdKey {
    /// Key for an id value; `None` for null and non-scalar ids.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::I64(v) => Some(Self::I64(*v)),
            Value::U64(v) => Some(Self::U64(*v)),
            Value::String(v) => Some(Self::Str(v.clone())),
            _ => None,
        }
    }

    fn render(&self) -> String {
        match self {
            Self::I64(v) => v.to_string(),
            Self::U64(v) => v.to_string(),
            Self::Str(v) => v.clone(),
        }
    }
}

/// Where a deferred reference binding lands once its referent exists.
#[derive(Debug, Clone)]
pub enum BindTarget {
    /// A named slot on an owner object.
    Property { owner: ObjectRef, member: String },
    /// One element of an array-valued slot.
    Element {
        owner: ObjectRef,
        member: String,
        index: usize,
    },
}

fn apply(target: &BindTarget, value: Value) -> Result<()> {
    match target {
        BindTarget::Property { owner, member } => {
            owner.set(member.clone(), value);
            Ok(())
        }
        BindTarget::Element {
            owner,
            member,
            index,
        } => owner.set_element(member, *index, value),
    }
}

/// Serialize-side identity record for one call.
#[derive(Debug, Default)]
pub struct SerIdentityCtx {
    seen: HashMap<usize, Value>,
    used: HashSet<IdKey>,
    next_seq: u64,
}

impl SerIdentityCtx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id previously assigned to this exact object in this call.
    pub fn known_id(&self, obj: &ObjectRef) -> Option<Value> {
        self.seen.get(&obj.ptr_id()).cloned()
    }

    /// Assign an id per the strategy. A null id (property strategy with an
    /// absent value) is returned as-is and not recorded: the object cannot
    /// be referenced, but writing it is not an error at this layer.
    pub fn record(&mut self, obj: &ObjectRef, spec: &IdentitySpec) -> Result<Value> {
        let id = match &spec.strategy {
            IdStrategy::Sequence => {
                self.next_seq += 1;
                Value::U64(self.next_seq)
            }
            IdStrategy::Property(name) => obj.get(name).unwrap_or(Value::Null),
            IdStrategy::ContentHash => Value::String(content_hash(obj)),
        };
        if let Some(key) = IdKey::from_value(&id) {
            if !self.used.insert(key.clone()) {
                return Err(CodecError::DuplicateIdentity { id: key.render() });
            }
            self.seen.insert(obj.ptr_id(), id.clone());
            log::trace!("assigned id {} to {:?}", key.render(), obj);
        }
        Ok(id)
    }
}

/// Deserialize-side identity record for one call.
#[derive(Debug, Default)]
pub struct DeIdentityCtx {
    bound: HashMap<IdKey, Value>,
    pending: HashMap<IdKey, Vec<BindTarget>>,
    retry: Vec<(IdKey, BindTarget)>,
}

impl DeIdentityCtx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an id to its constructed instance, flushing queued bindings.
    /// Null ids are accepted and ignored.
    pub fn bind(&mut self, id: &Value, instance: Value) -> Result<()> {
        let Some(key) = IdKey::from_value(id) else {
            return Ok(());
        };
        if self.bound.contains_key(&key) {
            return Err(CodecError::DuplicateIdentity { id: key.render() });
        }
        if let Some(targets) = self.pending.remove(&key) {
            log::trace!("flushing {} deferred bindings for id {}", targets.len(), key.render());
            for target in targets {
                if apply(&target, instance.clone()).is_err() {
                    // Container not in place yet; retried at end of call.
                    self.retry.push((key.clone(), target));
                }
            }
        }
        self.bound.insert(key, instance);
        Ok(())
    }

    /// Instance already bound to an id.
    pub fn lookup(&self, id: &Value) -> Option<Value> {
        IdKey::from_value(id).and_then(|key| self.bound.get(&key).cloned())
    }

    /// Queue a binding for an id whose referent does not exist yet.
    pub fn defer(&mut self, id: &Value, target: BindTarget) -> Result<()> {
        let key = IdKey::from_value(id).ok_or_else(|| CodecError::InvalidData {
            reason: "reference token with a null id".into(),
        })?;
        log::trace!("deferring binding for id {}", key.render());
        self.pending.entry(key).or_default().push(target);
        Ok(())
    }

    /// End-of-call check: retries late bindings, then fails on anything
    /// still deferred.
    pub fn finish(&mut self) -> Result<()> {
        for (key, target) in std::mem::take(&mut self.retry) {
            let value = self.bound.get(&key).cloned().ok_or_else(|| {
                CodecError::UnresolvedReference {
                    ids: vec![key.render()],
                }
            })?;
            apply(&target, value)?;
        }
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut ids: Vec<String> = self.pending.keys().map(IdKey::render).collect();
        ids.sort();
        Err(CodecError::UnresolvedReference { ids })
    }
}

/// Deterministic hash over the object's type name and scalar slots, in
/// slot order. Non-scalar slots are skipped so cyclic graphs hash safely.
pub fn content_hash(obj: &ObjectRef) -> String {
    let mut canon = String::new();
    canon.push_str(&obj.type_name());
    for (name, value) in obj.entries() {
        let rendered = match &value {
            Value::Null => "null".to_string(),
            Value::Bool(v) => v.to_string(),
            Value::I64(v) => v.to_string(),
            Value::U64(v) => v.to_string(),
            Value::F64(v) => format!("{:?}", v),
            Value::String(v) => v.clone(),
            Value::Bytes(v) => v.iter().map(|b| format!("{:02x}", b)).collect(),
            Value::Array(_) | Value::Object(_) => continue,
        };
        canon.push('\u{1f}');
        canon.push_str(&name);
        canon.push('\u{1f}');
        canon.push_str(&rendered);
    }
    digest(&canon)
}

#[cfg(feature = "hash-ids")]
fn digest(canon: &str) -> String {
    use md5::{Digest, Md5};
    let mut hasher = Md5::new();
    hasher.update(canon.as_bytes());
    let out = hasher.finalize();
    out.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(not(feature = "hash-ids"))]
fn digest(canon: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    canon.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_ids_and_reference_detection() {
        let mut ctx = SerIdentityCtx::new();
        let spec = IdentitySpec::sequence("@id");
        let a = ObjectRef::new("Node");
        let b = ObjectRef::new("Node");

        assert!(ctx.known_id(&a).is_none());
        assert_eq!(ctx.record(&a, &spec).unwrap(), Value::U64(1));
        assert_eq!(ctx.record(&b, &spec).unwrap(), Value::U64(2));
        assert_eq!(ctx.known_id(&a), Some(Value::U64(1)));
    }

    #[test]
    fn test_property_strategy_null_id_is_accepted() {
        let mut ctx = SerIdentityCtx::new();
        let spec = IdentitySpec::property_based("key");
        let obj = ObjectRef::new("Row");

        let id = ctx.record(&obj, &spec).unwrap();
        assert!(id.is_null());
        // Not recorded: the object cannot be referenced by a null id.
        assert!(ctx.known_id(&obj).is_none());
    }

    #[test]
    fn test_duplicate_id_detected_on_write() {
        let mut ctx = SerIdentityCtx::new();
        let spec = IdentitySpec::property_based("key");
        let a = ObjectRef::new("Row");
        a.set("key", Value::I64(7));
        let b = ObjectRef::new("Row");
        b.set("key", Value::I64(7));

        ctx.record(&a, &spec).unwrap();
        assert!(matches!(
            ctx.record(&b, &spec),
            Err(CodecError::DuplicateIdentity { .. })
        ));
    }

    #[test]
    fn test_deferred_binding_flushes_on_definition() {
        let mut ctx = DeIdentityCtx::new();
        let owner = ObjectRef::new("Holder");
        ctx.defer(
            &Value::U64(1),
            BindTarget::Property {
                owner: owner.clone(),
                member: "friend".into(),
            },
        )
        .unwrap();

        let friend = Value::object("Node");
        ctx.bind(&Value::U64(1), friend.clone()).unwrap();
        assert_eq!(owner.get("friend"), Some(friend));
        ctx.finish().unwrap();
    }

    #[test]
    fn test_unresolved_reference_at_end_of_call() {
        let mut ctx = DeIdentityCtx::new();
        let owner = ObjectRef::new("Holder");
        ctx.defer(
            &Value::U64(9),
            BindTarget::Property {
                owner,
                member: "friend".into(),
            },
        )
        .unwrap();
        match ctx.finish() {
            Err(CodecError::UnresolvedReference { ids }) => assert_eq!(ids, vec!["9"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let mut ctx = DeIdentityCtx::new();
        ctx.bind(&Value::U64(1), Value::object("A")).unwrap();
        assert!(matches!(
            ctx.bind(&Value::U64(1), Value::object("B")),
            Err(CodecError::DuplicateIdentity { .. })
        ));
        // Null ids never collide.
        ctx.bind(&Value::Null, Value::object("C")).unwrap();
        ctx.bind(&Value::Null, Value::object("D")).unwrap();
    }

    #[test]
    fn test_element_binding_retries_at_finish() {
        let mut ctx = DeIdentityCtx::new();
        let owner = ObjectRef::new("Parent");
        // Array slot not present yet: binding must be retried later.
        ctx.defer(
            &Value::U64(1),
            BindTarget::Element {
                owner: owner.clone(),
                member: "kids".into(),
                index: 0,
            },
        )
        .unwrap();
        ctx.bind(&Value::U64(1), Value::object("Child")).unwrap();

        owner.set("kids", Value::Array(vec![Value::Null]));
        ctx.finish().unwrap();
        let kids = owner.get("kids").unwrap();
        assert!(matches!(kids.as_array().unwrap()[0], Value::Object(_)));
    }

    #[test]
    fn test_content_hash_is_deterministic() {
        let a = ObjectRef::new("Point");
        a.set("x", Value::I64(1));
        a.set("y", Value::I64(2));
        let b = ObjectRef::new("Point");
        b.set("x", Value::I64(1));
        b.set("y", Value::I64(2));

        assert_eq!(content_hash(&a), content_hash(&b));

        b.set("y", Value::I64(3));
        assert_ne!(content_hash(&a), content_hash(&b));
    }
}
