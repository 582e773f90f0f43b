// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Managed forward/backward reference unrolling.
//!
//! Writing the forward half of a bidirectional relationship establishes the
//! paired back pointer on every element reachable through the forward value
//! BEFORE the forward structure is stored, so back pointers exist by the
//! time the owning object is considered final. Supported element shapes:
//! indexed sequence (array), ordered-key mapping, and a single object.

use crate::descriptor::RAW_MAP;
use crate::error::{CodecError, Result};
use crate::value::{ObjectRef, Value};

/// Write `value` into `forward` on `owner`, first setting `back_member` on
/// each reachable element to point back at `owner`.
pub fn write_forward_reference(
    owner: &ObjectRef,
    forward: &str,
    back_member: &str,
    value: Value,
) -> Result<()> {
    match &value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                let child = expect_child(forward, item)?;
                child.set(back_member.to_string(), Value::Object(owner.clone()));
            }
            log::trace!(
                "back-reference '{}' set on {} sequence elements of '{}'",
                back_member,
                items.len(),
                forward
            );
        }
        Value::Object(child) if &*child.type_name() == RAW_MAP => {
            for (_, entry) in child.entries() {
                let target = expect_child(forward, &entry)?;
                target.set(back_member.to_string(), Value::Object(owner.clone()));
            }
        }
        Value::Object(child) => {
            child.set(back_member.to_string(), Value::Object(owner.clone()));
        }
        other => {
            return Err(CodecError::UnsupportedReferenceShape {
                reference: forward.to_string(),
                found: other.shape_name().to_string(),
            })
        }
    }
    owner.set(forward.to_string(), value);
    Ok(())
}

fn expect_child<'a>(forward: &str, value: &'a Value) -> Result<&'a ObjectRef> {
    value
        .as_object()
        .ok_or_else(|| CodecError::UnsupportedReferenceShape {
            reference: forward.to_string(),
            found: format!("element of shape {}", value.shape_name()),
        })
}
