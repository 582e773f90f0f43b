// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # databind - Runtime-typed object-graph codec
//!
//! Converts between an in-memory dynamic object graph and a stream of
//! structured-data events (start/end object, start/end array, field names,
//! scalars) without hand-written per-type conversion code. Types are
//! described at runtime by [`TypeDescriptor`] values; the engine lazily
//! builds and caches a [`Codec`] per type and drives it recursively over
//! the value graph through uniform [`PropertyAccessor`] handles.
//!
//! ## Quick Start
//!
//! ```rust
//! use databind::{Engine, SharedTypeRegistry, StructDescription, TypeDescriptor, Value};
//! use std::sync::Arc;
//!
//! fn main() -> databind::Result<()> {
//!     let registry = Arc::new(SharedTypeRegistry::new());
//!     registry.register_struct(
//!         StructDescription::builder(TypeDescriptor::named("Point"))
//!             .slot("x", TypeDescriptor::i64_type())
//!             .slot("y", TypeDescriptor::i64_type())
//!             .build(),
//!     );
//!
//!     let engine = Engine::builder().registry(registry).build();
//!     let desc = TypeDescriptor::named("Point");
//!
//!     let point = Value::object("Point");
//!     point.as_object().unwrap().set("x", Value::I64(3));
//!     point.as_object().unwrap().set("y", Value::I64(4));
//!
//!     let json = engine.write_json(&desc, &point)?;
//!     assert_eq!(json, r#"{"x":3,"y":4}"#);
//!     assert_eq!(engine.read_json(&desc, &json)?, point);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                            Engine                                  |
//! |        write_value / read_value, per-call context wiring           |
//! +--------------------------------------------------------------------+
//! |                       Codec Resolver & Cache                       |
//! |  snapshot cache (first-publish-wins) | per-call chain | contextual |
//! +--------------------------------------------------------------------+
//! |                             Codecs                                 |
//! |  scalar | struct | array | map | delegating | reference | dynamic  |
//! |  property accessors | type-id protocol | object identity           |
//! +--------------------------------------------------------------------+
//! |                          Event Stream                              |
//! |        EventWrite / EventRead | TokenBuffer | JSON surface         |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Engine`] | Entry point: owns the registry, resolver and cache epoch |
//! | [`TypeDescriptor`] | Structural identity of a type, the cache key |
//! | [`SharedTypeRegistry`] | Member layouts, subtype and logical-name tables |
//! | [`Value`] / [`ObjectRef`] | Dynamic value graph with object identity |
//! | [`Codec`] | One unit writing/reading one type to/from the stream |
//! | [`PropertyAccessor`] | Uniform read/write handle for one member |
//!
//! ## Concurrency
//!
//! Independent calls run concurrently across threads sharing only the
//! codec caches (lock-free snapshot reads, first-publish-wins insertion).
//! Values, resolution chains, type-id metadata and identity records are
//! call-scoped and single-threaded.

/// Capability-based property accessors.
pub mod accessor;
/// Codec variants and recursive write/read dispatch.
pub mod codec;
/// Engine configuration and persistence.
pub mod config;
/// Type descriptors and the type registry.
pub mod descriptor;
/// Event-stream contract, token buffer and JSON surface.
pub mod event;
/// Object-identity resolution for shared and cyclic graphs.
pub mod identity;
/// Codec resolver and cache.
pub mod resolve;
/// Polymorphic type-identifier protocol.
pub mod typeid;
/// Dynamic value model.
pub mod value;

mod engine;
mod error;

pub use accessor::{
    AccessorWrite, MemberCapability, NullPolicy, NullProvider, PropertyAccessor,
};
pub use codec::{Codec, CodecKind, ReadCtx, WriteCtx};
pub use config::EngineConfig;
pub use descriptor::{
    MemberDescription, MemberHints, ScalarKind, SharedTypeRegistry, StructDescription,
    TypeDescriptor, TypeRegistry,
};
pub use engine::{Engine, EngineBuilder};
pub use error::{CodecError, Result};
pub use event::{EventRead, EventWrite, Scalar, Token, TokenBuffer, TokenKind, TokenReader};
pub use identity::{IdStrategy, IdentitySpec};
pub use resolve::{CodecResolver, ResolveCtx};
pub use typeid::{TypeIdProvider, TypeIdSpec, TypeIdStrategy, WrapShape};
pub use value::{ObjectRef, Value};
