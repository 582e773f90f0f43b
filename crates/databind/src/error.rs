// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for the codec engine.
//!
//! One crate-wide enum: failures from property accessors and codecs are
//! wrapped into [`CodecError::MemberFailed`] carrying the member name, the
//! offending value and the source position, so a caller can localize a
//! failure without knowing the engine internals.

use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised by the codec engine.
#[derive(Debug)]
pub enum CodecError {
    /// A type cannot be introspected or instantiated.
    BadTypeDefinition { type_name: String, reason: String },
    /// A polymorphic type tag could not be resolved and no fallback type
    /// was configured.
    InvalidTypeId { id: String, reason: String },
    /// A forward/backward reference was declared over a container shape the
    /// engine does not recognize.
    UnsupportedReferenceShape { reference: String, found: String },
    /// The same object id was bound twice within one call.
    DuplicateIdentity { id: String },
    /// Deferred reference bindings remained unsatisfied at the end of a call.
    UnresolvedReference { ids: Vec<String> },
    /// Value or type recursion exceeded the configured depth limit.
    RecursionTooDeep { limit: usize },
    /// A member definition does not match its runtime state (e.g. a
    /// setterless accessor whose backing container is absent).
    DefinitionMismatch { member: String, reason: String },
    /// The event stream produced a token the codec did not expect.
    UnexpectedToken {
        expected: String,
        found: String,
        position: usize,
    },
    /// Malformed input data outside the other categories.
    InvalidData { reason: String },
    /// A member read/write failed; wraps the underlying error with
    /// positional context.
    MemberFailed {
        member: String,
        /// Debug rendering of the offending value, when writing.
        value: Option<String>,
        /// Source position, when reading.
        position: Option<usize>,
        source: Box<CodecError>,
    },
}

impl CodecError {
    /// Wrap an error with member context.
    pub fn in_member(
        member: impl Into<String>,
        value: Option<String>,
        position: Option<usize>,
        source: CodecError,
    ) -> Self {
        Self::MemberFailed {
            member: member.into(),
            value,
            position,
            source: Box::new(source),
        }
    }

    /// Member path from outermost to innermost wrapping, for diagnostics.
    pub fn member_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut cur = self;
        while let Self::MemberFailed { member, source, .. } = cur {
            path.push(member.as_str());
            cur = source;
        }
        path
    }

    /// Innermost (root-cause) error.
    pub fn root_cause(&self) -> &CodecError {
        let mut cur = self;
        while let Self::MemberFailed { source, .. } = cur {
            cur = source;
        }
        cur
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadTypeDefinition { type_name, reason } => {
                write!(f, "bad type definition for '{}': {}", type_name, reason)
            }
            Self::InvalidTypeId { id, reason } => {
                write!(f, "invalid type id '{}': {}", id, reason)
            }
            Self::UnsupportedReferenceShape { reference, found } => {
                write!(
                    f,
                    "unsupported shape for reference '{}': {}",
                    reference, found
                )
            }
            Self::DuplicateIdentity { id } => write!(f, "duplicate object id '{}'", id),
            Self::UnresolvedReference { ids } => {
                write!(f, "unresolved references: {}", ids.join(", "))
            }
            Self::RecursionTooDeep { limit } => {
                write!(f, "recursion exceeded depth limit {}", limit)
            }
            Self::DefinitionMismatch { member, reason } => {
                write!(f, "definition mismatch on '{}': {}", member, reason)
            }
            Self::UnexpectedToken {
                expected,
                found,
                position,
            } => write!(
                f,
                "unexpected token at {}: expected {}, found {}",
                position, expected, found
            ),
            Self::InvalidData { reason } => write!(f, "invalid data: {}", reason),
            Self::MemberFailed {
                member,
                value,
                position,
                source,
            } => {
                write!(f, "member '{}' failed", member)?;
                if let Some(pos) = position {
                    write!(f, " at token {}", pos)?;
                }
                if let Some(v) = value {
                    write!(f, " (value {})", v)?;
                }
                write!(f, ": {}", source)
            }
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MemberFailed { source, .. } => Some(&**source),
            _ => None,
        }
    }
}
