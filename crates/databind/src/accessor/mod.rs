// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Capability-based property accessors.
//!
//! A [`PropertyAccessor`] is the uniform read/write handle for one named,
//! ordered member of a composite value, regardless of how the member is
//! physically stored or exposed. Accessors are owned by exactly one
//! structural codec and shared read-only across concurrent calls once
//! resolved; `rename` and `with_codec` produce new instances, never mutate.

mod backref;

pub use backref::write_forward_reference;

use crate::codec::Codec;
use crate::descriptor::TypeDescriptor;
use crate::error::{CodecError, Result};
use crate::value::{ObjectRef, Value};
use std::fmt;
use std::sync::Arc;

/// Outcome of an accessor write.
#[derive(Debug)]
pub enum AccessorWrite {
    /// The owner was mutated in place.
    Stored,
    /// The write produced a replacement owner (immutable builder pattern);
    /// callers must use this instance downstream.
    Replaced(ObjectRef),
}

/// Null-value provider for the `Substitute` policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullProvider {
    /// Ask the member's codec for its default value.
    Default,
    /// Reject null input with a definition-mismatch error.
    Fail,
}

/// Null-handling policy, fixed at accessor construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPolicy {
    /// Leave the member untouched on null input.
    Skip,
    /// Substitute the provider's value for null input.
    Substitute(NullProvider),
}

/// Behavioral read function: computes the member value from the owner.
pub type ReadFn = Arc<dyn Fn(&ObjectRef) -> Result<Value> + Send + Sync>;
/// Behavioral write function: may return a replacement owner.
pub type WriteFn = Arc<dyn Fn(&ObjectRef, Value) -> Result<AccessorWrite> + Send + Sync>;

/// How a member is physically accessed.
#[derive(Clone)]
pub enum MemberCapability {
    /// Plain storage slot.
    Slot,
    /// Method-like access through caller-supplied functions.
    Behavioral { read: ReadFn, write: WriteFn },
    /// No direct setter: read the current container and mutate it in place.
    SetterlessContainer,
    /// Member materialized from the object-identity resolver, not storage.
    VirtualIdentity,
    /// Forward half of a bidirectional reference; writing it also writes
    /// the paired back member on every reachable element.
    ForwardReference { back_member: String },
    /// Back half of a bidirectional reference; reconstructed during
    /// reading, never written to the stream.
    BackReference,
}

impl fmt::Debug for MemberCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slot => write!(f, "Slot"),
            Self::Behavioral { .. } => write!(f, "Behavioral"),
            Self::SetterlessContainer => write!(f, "SetterlessContainer"),
            Self::VirtualIdentity => write!(f, "VirtualIdentity"),
            Self::ForwardReference { back_member } => {
                write!(f, "ForwardReference(back={})", back_member)
            }
            Self::BackReference => write!(f, "BackReference"),
        }
    }
}

/// Uniform read/write handle for one named member.
#[derive(Debug, Clone)]
pub struct PropertyAccessor {
    name: String,
    declared: Arc<TypeDescriptor>,
    codec: Option<Arc<Codec>>,
    null_policy: NullPolicy,
    capability: MemberCapability,
}

impl PropertyAccessor {
    /// Create an accessor; the codec is attached later via [`Self::with_codec`].
    pub fn new(
        name: impl Into<String>,
        declared: Arc<TypeDescriptor>,
        capability: MemberCapability,
        null_policy: NullPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            declared,
            codec: None,
            null_policy,
            capability,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared(&self) -> &Arc<TypeDescriptor> {
        &self.declared
    }

    pub fn capability(&self) -> &MemberCapability {
        &self.capability
    }

    pub fn null_policy(&self) -> NullPolicy {
        self.null_policy
    }

    /// Resolved codec, if already attached.
    pub fn codec(&self) -> Option<&Arc<Codec>> {
        self.codec.as_ref()
    }

    /// New accessor under a different external name.
    pub fn rename(&self, name: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.name = name.into();
        copy
    }

    /// New accessor with the codec attached. Re-validates the null policy:
    /// the codec may be the null-value provider, so a swap can invalidate
    /// a `Substitute(Default)` policy.
    pub fn with_codec(&self, codec: Arc<Codec>) -> Result<Self> {
        if self.null_policy == NullPolicy::Substitute(NullProvider::Default)
            && codec.null_value().is_none()
        {
            return Err(CodecError::DefinitionMismatch {
                member: self.name.clone(),
                reason: format!(
                    "codec for '{}' supplies no default value for null substitution",
                    codec.descriptor().raw_name()
                ),
            });
        }
        let mut copy = self.clone();
        copy.codec = Some(codec);
        Ok(copy)
    }

    /// Value to store for null input, or `None` to leave the member untouched.
    pub fn substitute_null(&self) -> Result<Option<Value>> {
        match self.null_policy {
            NullPolicy::Skip => Ok(None),
            NullPolicy::Substitute(NullProvider::Fail) => Err(CodecError::DefinitionMismatch {
                member: self.name.clone(),
                reason: "null not allowed for this member".into(),
            }),
            NullPolicy::Substitute(NullProvider::Default) => {
                let codec = self.codec.as_ref().ok_or_else(|| {
                    CodecError::DefinitionMismatch {
                        member: self.name.clone(),
                        reason: "null substitution requested before codec resolution".into(),
                    }
                })?;
                match codec.null_value() {
                    Some(v) => Ok(Some(v)),
                    None => Err(CodecError::DefinitionMismatch {
                        member: self.name.clone(),
                        reason: "codec supplies no default value".into(),
                    }),
                }
            }
        }
    }

    /// Read the member value off `owner`.
    pub fn read(&self, owner: &ObjectRef) -> Result<Value> {
        let result = match &self.capability {
            MemberCapability::Slot
            | MemberCapability::SetterlessContainer
            | MemberCapability::ForwardReference { .. }
            | MemberCapability::BackReference
            | MemberCapability::VirtualIdentity => {
                Ok(owner.get(&self.name).unwrap_or(Value::Null))
            }
            MemberCapability::Behavioral { read, .. } => read(owner),
        };
        result.map_err(|e| CodecError::in_member(&self.name, None, None, e))
    }

    /// Write `value` into the member on `owner`. A behavioral accessor may
    /// return a replacement owner which callers must thread downstream.
    pub fn write(&self, owner: &ObjectRef, value: Value) -> Result<AccessorWrite> {
        match &self.capability {
            MemberCapability::Slot => {
                owner.set(self.name.clone(), value);
                Ok(AccessorWrite::Stored)
            }
            MemberCapability::Behavioral { write, .. } => {
                let shown = Some(format!("{:?}", value));
                write(owner, value)
                    .map_err(|e| CodecError::in_member(&self.name, shown, None, e))
            }
            MemberCapability::SetterlessContainer => {
                let shown = Some(format!("{:?}", value));
                self.merge_into_container(owner, value)
                    .map_err(|e| CodecError::in_member(&self.name, shown, None, e))?;
                Ok(AccessorWrite::Stored)
            }
            MemberCapability::VirtualIdentity => {
                // Identity is materialized by the identity resolver; nothing
                // is stored on the object itself.
                Ok(AccessorWrite::Stored)
            }
            MemberCapability::ForwardReference { back_member } => {
                let shown = Some(format!("{:?}", value));
                write_forward_reference(owner, &self.name, back_member, value)
                    .map_err(|e| CodecError::in_member(&self.name, shown, None, e))?;
                Ok(AccessorWrite::Stored)
            }
            MemberCapability::BackReference => {
                owner.set(self.name.clone(), value);
                Ok(AccessorWrite::Stored)
            }
        }
    }

    /// Append/merge into the existing container; fails if the container is
    /// absent (definition error, not a data error).
    fn merge_into_container(&self, owner: &ObjectRef, value: Value) -> Result<()> {
        let updated = owner.update(&self.name, |current| match (current, value) {
            (Value::Array(items), Value::Array(incoming)) => {
                items.extend(incoming);
                Ok(())
            }
            (Value::Object(existing), Value::Object(incoming)) => {
                for (name, v) in incoming.entries() {
                    existing.set(name, v);
                }
                Ok(())
            }
            (current, incoming) => Err(CodecError::DefinitionMismatch {
                member: self.name.clone(),
                reason: format!(
                    "setterless member expects a matching container, found {} <- {}",
                    current.shape_name(),
                    incoming.shape_name()
                ),
            }),
        });
        match updated {
            Some(r) => r,
            None => Err(CodecError::DefinitionMismatch {
                member: self.name.clone(),
                reason: "setterless member has no backing container".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(name: &str) -> PropertyAccessor {
        PropertyAccessor::new(
            name,
            TypeDescriptor::i64_type(),
            MemberCapability::Slot,
            NullPolicy::Skip,
        )
    }

    #[test]
    fn test_slot_read_write() {
        let owner = ObjectRef::new("Point");
        let acc = slot("x");
        assert!(matches!(
            acc.write(&owner, Value::I64(9)).unwrap(),
            AccessorWrite::Stored
        ));
        assert_eq!(acc.read(&owner).unwrap(), Value::I64(9));

        // Absent slot reads as null.
        assert_eq!(slot("y").read(&owner).unwrap(), Value::Null);
    }

    #[test]
    fn test_rename_is_a_copy() {
        let a = slot("x");
        let b = a.rename("x_renamed");
        assert_eq!(a.name(), "x");
        assert_eq!(b.name(), "x_renamed");
    }

    #[test]
    fn test_behavioral_write_replaces_owner() {
        let acc = PropertyAccessor::new(
            "frozen",
            TypeDescriptor::i64_type(),
            MemberCapability::Behavioral {
                read: Arc::new(|owner| Ok(owner.get("frozen").unwrap_or(Value::Null))),
                write: Arc::new(|owner, value| {
                    // Immutable builder: never touch the original.
                    let next = ObjectRef::new(owner.type_name());
                    for (name, v) in owner.entries() {
                        next.set(name, v);
                    }
                    next.set("frozen", value);
                    Ok(AccessorWrite::Replaced(next))
                }),
            },
            NullPolicy::Skip,
        );

        let owner = ObjectRef::new("Config");
        owner.set("other", Value::Bool(true));
        match acc.write(&owner, Value::I64(1)).unwrap() {
            AccessorWrite::Replaced(next) => {
                assert!(!ObjectRef::ptr_eq(&owner, &next));
                assert_eq!(next.get("frozen"), Some(Value::I64(1)));
                assert_eq!(next.get("other"), Some(Value::Bool(true)));
                assert!(owner.get("frozen").is_none());
            }
            AccessorWrite::Stored => panic!("expected a replacement owner"),
        }
    }

    #[test]
    fn test_setterless_appends_into_existing_container() {
        let owner = ObjectRef::new("Bag");
        owner.set("items", Value::Array(vec![Value::I64(1)]));

        let acc = PropertyAccessor::new(
            "items",
            TypeDescriptor::array_of(TypeDescriptor::i64_type()),
            MemberCapability::SetterlessContainer,
            NullPolicy::Skip,
        );
        acc.write(&owner, Value::Array(vec![Value::I64(2), Value::I64(3)]))
            .unwrap();
        assert_eq!(
            owner.get("items"),
            Some(Value::Array(vec![
                Value::I64(1),
                Value::I64(2),
                Value::I64(3)
            ]))
        );
    }

    #[test]
    fn test_setterless_absent_container_is_definition_error() {
        let owner = ObjectRef::new("Bag");
        let acc = PropertyAccessor::new(
            "items",
            TypeDescriptor::array_of(TypeDescriptor::i64_type()),
            MemberCapability::SetterlessContainer,
            NullPolicy::Skip,
        );
        let err = acc.write(&owner, Value::Array(vec![])).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            CodecError::DefinitionMismatch { .. }
        ));
    }

    #[test]
    fn test_null_policy_substitution() {
        let acc = slot("x");
        assert_eq!(acc.substitute_null().unwrap(), None);

        let failing = PropertyAccessor::new(
            "x",
            TypeDescriptor::i64_type(),
            MemberCapability::Slot,
            NullPolicy::Substitute(NullProvider::Fail),
        );
        assert!(failing.substitute_null().is_err());
    }
}
