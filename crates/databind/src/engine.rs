// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine facade: the entry point wiring registry, resolver and per-call
//! contexts together.
//!
//! One engine owns one codec cache epoch. Independent write/read calls run
//! concurrently across threads sharing that cache; everything else is
//! call-scoped and reclaimed when a call returns or unwinds.

use crate::codec::{ReadCtx, WriteCtx};
use crate::config::EngineConfig;
use crate::descriptor::{SharedTypeRegistry, TypeDescriptor, TypeRegistry};
use crate::error::Result;
use crate::event::{json, EventRead, EventWrite, Token, TokenBuffer, TokenReader};
use crate::resolve::CodecResolver;
use crate::typeid::TypeIdSpec;
use crate::value::Value;
use std::sync::Arc;

/// Runtime-typed object-graph codec engine.
pub struct Engine {
    registry: Arc<dyn TypeRegistry>,
    resolver: CodecResolver,
    config: EngineConfig,
}

impl Engine {
    /// Start building an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder {
            registry: None,
            config: EngineConfig::default(),
        }
    }

    /// Reconstruct an engine from a persisted configuration. The codec
    /// caches start empty and are rebuilt lazily on first use.
    pub fn from_config(config: EngineConfig, registry: Arc<dyn TypeRegistry>) -> Self {
        let template = type_id_template(&config, registry.as_ref());
        Self {
            resolver: CodecResolver::new(registry.clone(), template),
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<dyn TypeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &CodecResolver {
        &self.resolver
    }

    /// Write a value of the declared type to an event sink.
    pub fn write_value(
        &self,
        descriptor: &Arc<TypeDescriptor>,
        value: &Value,
        out: &mut dyn EventWrite,
    ) -> Result<()> {
        let mut ctx = WriteCtx::new(&self.resolver, self.config.recursion_limit);
        let codec = self.resolver.resolve_root(descriptor, &mut ctx.resolve)?;
        codec.write(value, out, &mut ctx)
    }

    /// Read a value of the declared type from an event source. Fails if
    /// deferred references remain unresolved at the end of the call.
    pub fn read_value(
        &self,
        descriptor: &Arc<TypeDescriptor>,
        input: &mut dyn EventRead,
    ) -> Result<Value> {
        let mut ctx = ReadCtx::new(&self.resolver, self.config.recursion_limit);
        let codec = self.resolver.resolve_root(descriptor, &mut ctx.resolve)?;
        let value = codec.read(input, &mut ctx)?;
        ctx.finish_identity()?;
        Ok(value)
    }

    /// Write to an in-memory token buffer.
    pub fn write_tokens(
        &self,
        descriptor: &Arc<TypeDescriptor>,
        value: &Value,
    ) -> Result<TokenBuffer> {
        let mut buffer = TokenBuffer::new();
        self.write_value(descriptor, value, &mut buffer)?;
        Ok(buffer)
    }

    /// Read from pre-built tokens.
    pub fn read_tokens(
        &self,
        descriptor: &Arc<TypeDescriptor>,
        tokens: Vec<Token>,
    ) -> Result<Value> {
        let mut reader = TokenReader::from_tokens(tokens);
        self.read_value(descriptor, &mut reader)
    }

    /// Write to compact JSON text (debug/test surface).
    pub fn write_json(&self, descriptor: &Arc<TypeDescriptor>, value: &Value) -> Result<String> {
        let buffer = self.write_tokens(descriptor, value)?;
        json::render(buffer.tokens())
    }

    /// Read from JSON text (debug/test surface).
    pub fn read_json(&self, descriptor: &Arc<TypeDescriptor>, text: &str) -> Result<Value> {
        self.read_tokens(descriptor, json::parse(text)?)
    }
}

/// Fluent engine builder.
pub struct EngineBuilder {
    registry: Option<Arc<dyn TypeRegistry>>,
    config: EngineConfig,
}

impl EngineBuilder {
    /// Use the given type registry.
    pub fn registry(mut self, registry: Arc<dyn TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use the given configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Engine {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(SharedTypeRegistry::new()));
        Engine::from_config(self.config, registry)
    }
}

/// Type-id spec template applied to polymorphic slots. The default
/// implementation name is bound to a descriptor here; the registry match
/// happens lazily at resolution, so a persisted configuration never forces
/// eager cache building.
fn type_id_template(config: &EngineConfig, registry: &dyn TypeRegistry) -> TypeIdSpec {
    let mut spec = TypeIdSpec::new(
        config.write_shape,
        config.type_id_property.clone(),
        config.type_id_strategy,
    )
    .with_read_shape(config.read_shape);
    if let Some(name) = &config.default_impl {
        let descriptor = registry
            .resolve_logical(name)
            .or_else(|| registry.descriptor(name))
            .unwrap_or_else(|| TypeDescriptor::named(name.clone()));
        spec = spec.with_default_impl(descriptor);
    }
    spec
}
