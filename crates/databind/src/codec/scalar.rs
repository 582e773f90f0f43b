// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scalar leaf conversions between values and event tokens.

use crate::descriptor::ScalarKind;
use crate::error::{CodecError, Result};
use crate::event::Scalar;
use crate::value::Value;

/// Default value for a scalar kind, used by null substitution.
pub fn default_value(kind: ScalarKind) -> Value {
    match kind {
        ScalarKind::Bool => Value::Bool(false),
        ScalarKind::I64 => Value::I64(0),
        ScalarKind::U64 => Value::U64(0),
        ScalarKind::F64 => Value::F64(0.0),
        ScalarKind::String => Value::String(String::new()),
        ScalarKind::Bytes => Value::Bytes(Vec::new()),
    }
}

/// Token payload for a scalar-shaped value.
pub fn scalar_from_value(value: &Value) -> Result<Scalar> {
    match value {
        Value::Null => Ok(Scalar::Null),
        Value::Bool(v) => Ok(Scalar::Bool(*v)),
        Value::I64(v) => Ok(Scalar::I64(*v)),
        Value::U64(v) => Ok(Scalar::U64(*v)),
        Value::F64(v) => Ok(Scalar::F64(*v)),
        Value::String(v) => Ok(Scalar::String(v.clone())),
        Value::Bytes(v) => Ok(Scalar::Bytes(v.clone())),
        other => Err(CodecError::InvalidData {
            reason: format!("{} value has no scalar form", other.shape_name()),
        }),
    }
}

/// Value for a token payload, shape-preserving.
pub fn value_from_scalar(scalar: Scalar) -> Value {
    match scalar {
        Scalar::Null => Value::Null,
        Scalar::Bool(v) => Value::Bool(v),
        Scalar::I64(v) => Value::I64(v),
        Scalar::U64(v) => Value::U64(v),
        Scalar::F64(v) => Value::F64(v),
        Scalar::String(v) => Value::String(v),
        Scalar::Bytes(v) => Value::Bytes(v),
    }
}

/// Encode a value under a scalar kind, with lossless numeric widening.
pub fn encode(kind: ScalarKind, value: &Value) -> Result<Scalar> {
    let mismatch = || CodecError::InvalidData {
        reason: format!("cannot encode {} value as {:?}", value.shape_name(), kind),
    };
    match (kind, value) {
        (ScalarKind::Bool, Value::Bool(v)) => Ok(Scalar::Bool(*v)),
        (ScalarKind::I64, Value::I64(v)) => Ok(Scalar::I64(*v)),
        (ScalarKind::I64, Value::U64(v)) => i64::try_from(*v)
            .map(Scalar::I64)
            .map_err(|_| mismatch()),
        (ScalarKind::U64, Value::U64(v)) => Ok(Scalar::U64(*v)),
        (ScalarKind::U64, Value::I64(v)) => u64::try_from(*v)
            .map(Scalar::U64)
            .map_err(|_| mismatch()),
        (ScalarKind::F64, Value::F64(v)) => Ok(Scalar::F64(*v)),
        (ScalarKind::F64, Value::I64(v)) => Ok(Scalar::F64(*v as f64)),
        (ScalarKind::F64, Value::U64(v)) => Ok(Scalar::F64(*v as f64)),
        (ScalarKind::String, Value::String(v)) => Ok(Scalar::String(v.clone())),
        (ScalarKind::Bytes, Value::Bytes(v)) => Ok(Scalar::Bytes(v.clone())),
        _ => Err(mismatch()),
    }
}

/// Decode a token payload under a scalar kind, with lossless coercions.
/// Bytes additionally accept hex strings (the JSON rendering of bytes).
pub fn decode(kind: ScalarKind, scalar: Scalar, position: usize) -> Result<Value> {
    let mismatch = |found: &Scalar| CodecError::UnexpectedToken {
        expected: format!("{:?} scalar", kind),
        found: found.kind_name().to_string(),
        position,
    };
    match (kind, scalar) {
        (ScalarKind::Bool, Scalar::Bool(v)) => Ok(Value::Bool(v)),
        (ScalarKind::I64, Scalar::I64(v)) => Ok(Value::I64(v)),
        (ScalarKind::I64, Scalar::U64(v)) => match i64::try_from(v) {
            Ok(v) => Ok(Value::I64(v)),
            Err(_) => Err(mismatch(&Scalar::U64(v))),
        },
        (ScalarKind::U64, Scalar::U64(v)) => Ok(Value::U64(v)),
        (ScalarKind::U64, Scalar::I64(v)) => match u64::try_from(v) {
            Ok(v) => Ok(Value::U64(v)),
            Err(_) => Err(mismatch(&Scalar::I64(v))),
        },
        (ScalarKind::F64, Scalar::F64(v)) => Ok(Value::F64(v)),
        (ScalarKind::F64, Scalar::I64(v)) => Ok(Value::F64(v as f64)),
        (ScalarKind::F64, Scalar::U64(v)) => Ok(Value::F64(v as f64)),
        (ScalarKind::String, Scalar::String(v)) => Ok(Value::String(v)),
        (ScalarKind::Bytes, Scalar::Bytes(v)) => Ok(Value::Bytes(v)),
        (ScalarKind::Bytes, Scalar::String(v)) => decode_hex(&v).ok_or(CodecError::UnexpectedToken {
            expected: "hex-encoded bytes".to_string(),
            found: "string".to_string(),
            position,
        }),
        (_, other) => Err(mismatch(&other)),
    }
}

fn decode_hex(text: &str) -> Option<Value> {
    if text.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(text.len() / 2);
    for chunk in text.as_bytes().chunks(2) {
        let pair = std::str::from_utf8(chunk).ok()?;
        bytes.push(u8::from_str_radix(pair, 16).ok()?);
    }
    Some(Value::Bytes(bytes))
}
