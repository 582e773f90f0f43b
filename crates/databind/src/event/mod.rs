// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event-stream contract the codec engine drives.
//!
//! Producers implement [`EventWrite`], consumers implement [`EventRead`]
//! (a pull cursor: inspect the current token kind, advance, extract typed
//! scalars — one token at a time, no lookahead required). The in-memory
//! [`TokenBuffer`] implements both; [`json`] renders/parses a token stream
//! as JSON text for tests and debugging.

mod buffer;
pub mod json;

pub use buffer::{TokenBuffer, TokenReader};

use crate::error::{CodecError, Result};

/// Scalar payload of a [`Token::Scalar`].
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl Scalar {
    /// Short kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::F64(_) => "f64",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }
}

/// One structural token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    FieldName(String),
    Scalar(Scalar),
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Self::StartObject => TokenKind::StartObject,
            Self::EndObject => TokenKind::EndObject,
            Self::StartArray => TokenKind::StartArray,
            Self::EndArray => TokenKind::EndArray,
            Self::FieldName(_) => TokenKind::FieldName,
            Self::Scalar(_) => TokenKind::Scalar,
        }
    }
}

/// Token kind as seen by the pull cursor. `End` means the stream is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    FieldName,
    Scalar,
    End,
}

impl TokenKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::StartObject => "start-object",
            Self::EndObject => "end-object",
            Self::StartArray => "start-array",
            Self::EndArray => "end-array",
            Self::FieldName => "field-name",
            Self::Scalar => "scalar",
            Self::End => "end-of-stream",
        }
    }
}

/// Ordered writer of structural tokens. Implementations track their own
/// nesting context and report a position for error messages.
pub trait EventWrite {
    fn start_object(&mut self) -> Result<()>;
    fn end_object(&mut self) -> Result<()>;
    fn start_array(&mut self) -> Result<()>;
    fn end_array(&mut self) -> Result<()>;
    fn field_name(&mut self, name: &str) -> Result<()>;
    fn scalar(&mut self, value: Scalar) -> Result<()>;

    /// Append pre-built tokens verbatim.
    fn raw(&mut self, tokens: &[Token]) -> Result<()>;

    /// Current token index, for diagnostics.
    fn position(&self) -> usize;
}

/// Pull cursor over structural tokens.
pub trait EventRead {
    /// Kind of the current (next unconsumed) token.
    fn current(&self) -> TokenKind;

    /// Borrow the current token without consuming it.
    fn peek(&self) -> Option<&Token>;

    /// Consume and return the current token.
    fn advance(&mut self) -> Option<Token>;

    /// Index of the current token, for diagnostics.
    fn position(&self) -> usize;

    /// Consume the current token, requiring the given kind.
    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        let pos = self.position();
        let found = self.current();
        if found != kind {
            return Err(CodecError::UnexpectedToken {
                expected: kind.name().to_string(),
                found: found.name().to_string(),
                position: pos,
            });
        }
        self.advance().ok_or(CodecError::UnexpectedToken {
            expected: kind.name().to_string(),
            found: TokenKind::End.name().to_string(),
            position: pos,
        })
    }

    /// Consume a scalar token and return its payload.
    fn expect_scalar(&mut self) -> Result<Scalar> {
        match self.expect(TokenKind::Scalar)? {
            Token::Scalar(s) => Ok(s),
            _ => unreachable!("expect() returned a non-scalar for TokenKind::Scalar"),
        }
    }

    /// Consume a field-name token and return the name.
    fn expect_field_name(&mut self) -> Result<String> {
        match self.expect(TokenKind::FieldName)? {
            Token::FieldName(name) => Ok(name),
            _ => unreachable!("expect() returned a non-name for TokenKind::FieldName"),
        }
    }

    /// Skip one complete value: a scalar, or a balanced object/array subtree.
    fn skip_value(&mut self) -> Result<()> {
        let pos = self.position();
        let first = self.advance().ok_or(CodecError::UnexpectedToken {
            expected: "value".to_string(),
            found: TokenKind::End.name().to_string(),
            position: pos,
        })?;
        let mut depth = match first {
            Token::Scalar(_) => return Ok(()),
            Token::StartObject | Token::StartArray => 1usize,
            other => {
                return Err(CodecError::UnexpectedToken {
                    expected: "value".to_string(),
                    found: other.kind().name().to_string(),
                    position: pos,
                })
            }
        };
        while depth > 0 {
            let pos = self.position();
            let tok = self.advance().ok_or(CodecError::UnexpectedToken {
                expected: "balanced subtree".to_string(),
                found: TokenKind::End.name().to_string(),
                position: pos,
            })?;
            match tok {
                Token::StartObject | Token::StartArray => depth += 1,
                Token::EndObject | Token::EndArray => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_value_over_nested_subtree() {
        let mut buf = TokenBuffer::new();
        buf.start_object().unwrap();
        buf.field_name("a").unwrap();
        buf.start_array().unwrap();
        buf.scalar(Scalar::I64(1)).unwrap();
        buf.end_array().unwrap();
        buf.end_object().unwrap();
        buf.scalar(Scalar::Bool(true)).unwrap();

        let mut reader = buf.into_reader();
        reader.skip_value().expect("skip object");
        assert_eq!(reader.expect_scalar().unwrap(), Scalar::Bool(true));
        assert_eq!(reader.current(), TokenKind::End);
    }

    #[test]
    fn test_expect_reports_position() {
        let mut buf = TokenBuffer::new();
        buf.start_array().unwrap();
        buf.end_array().unwrap();

        let mut reader = buf.into_reader();
        reader.expect(TokenKind::StartArray).unwrap();
        let err = reader.expect_scalar().unwrap_err();
        match err {
            CodecError::UnexpectedToken { position, .. } => assert_eq!(position, 1),
            other => panic!("unexpected error: {other}"),
        }
    }
}
