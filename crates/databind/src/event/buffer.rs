// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory token buffer implementing both halves of the event contract.

use super::{EventRead, EventWrite, Scalar, Token, TokenKind};
use crate::error::{CodecError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nest {
    Object,
    Array,
}

/// Growable token sink that validates structural balance as it is written.
#[derive(Debug, Default)]
pub struct TokenBuffer {
    tokens: Vec<Token>,
    nesting: Vec<Nest>,
}

impl TokenBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap pre-built tokens (balance is the caller's responsibility).
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            nesting: Vec::new(),
        }
    }

    /// Written tokens.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// True when every opened object/array has been closed.
    pub fn is_balanced(&self) -> bool {
        self.nesting.is_empty()
    }

    /// Consume the buffer into a pull cursor over its tokens.
    pub fn into_reader(self) -> TokenReader {
        TokenReader {
            tokens: self.tokens,
            pos: 0,
        }
    }

    fn close(&mut self, expected: Nest, token: Token) -> Result<()> {
        match self.nesting.last() {
            Some(n) if *n == expected => {
                self.nesting.pop();
                self.tokens.push(token);
                Ok(())
            }
            _ => Err(CodecError::InvalidData {
                reason: format!(
                    "unbalanced {} close at token {}",
                    if expected == Nest::Object { "object" } else { "array" },
                    self.tokens.len()
                ),
            }),
        }
    }
}

impl EventWrite for TokenBuffer {
    fn start_object(&mut self) -> Result<()> {
        self.nesting.push(Nest::Object);
        self.tokens.push(Token::StartObject);
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        self.close(Nest::Object, Token::EndObject)
    }

    fn start_array(&mut self) -> Result<()> {
        self.nesting.push(Nest::Array);
        self.tokens.push(Token::StartArray);
        Ok(())
    }

    fn end_array(&mut self) -> Result<()> {
        self.close(Nest::Array, Token::EndArray)
    }

    fn field_name(&mut self, name: &str) -> Result<()> {
        if self.nesting.last() != Some(&Nest::Object) {
            return Err(CodecError::InvalidData {
                reason: format!("field name '{}' outside an object", name),
            });
        }
        self.tokens.push(Token::FieldName(name.to_string()));
        Ok(())
    }

    fn scalar(&mut self, value: Scalar) -> Result<()> {
        self.tokens.push(Token::Scalar(value));
        Ok(())
    }

    fn raw(&mut self, tokens: &[Token]) -> Result<()> {
        for tok in tokens {
            match tok {
                Token::StartObject => self.start_object()?,
                Token::EndObject => self.end_object()?,
                Token::StartArray => self.start_array()?,
                Token::EndArray => self.end_array()?,
                Token::FieldName(name) => self.field_name(name)?,
                Token::Scalar(s) => self.scalar(s.clone())?,
            }
        }
        Ok(())
    }

    fn position(&self) -> usize {
        self.tokens.len()
    }
}

/// Pull cursor over a finished token buffer.
#[derive(Debug)]
pub struct TokenReader {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenReader {
    /// Cursor over pre-built tokens.
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Remaining unconsumed tokens.
    pub fn remaining(&self) -> usize {
        self.tokens.len().saturating_sub(self.pos)
    }
}

impl EventRead for TokenReader {
    fn current(&self) -> TokenKind {
        self.tokens.get(self.pos).map_or(TokenKind::End, Token::kind)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        Some(tok)
    }

    fn position(&self) -> usize {
        self.pos
    }
}
