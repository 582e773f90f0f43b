// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Engine configuration persistence: the persisted form reconstructs an
// engine whose caches start empty and rebuild lazily on first use.

#![cfg(feature = "config")]

use databind::{
    Engine, EngineConfig, SharedTypeRegistry, StructDescription, TypeDescriptor, TypeIdStrategy,
    Value, WrapShape,
};
use std::sync::Arc;

fn registry() -> Arc<SharedTypeRegistry> {
    let registry = Arc::new(SharedTypeRegistry::new());
    registry.register_struct(
        StructDescription::builder(TypeDescriptor::named("Point"))
            .slot("x", TypeDescriptor::i64_type())
            .slot("y", TypeDescriptor::i64_type())
            .build(),
    );
    registry
}

#[test]
fn config_survives_a_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.json");

    let config = EngineConfig::default()
        .with_write_shape(WrapShape::WrapperArray)
        .with_read_shape(WrapShape::AsProperty)
        .with_type_id_property("kind")
        .with_type_id_strategy(TypeIdStrategy::LogicalName)
        .with_default_impl("Point")
        .with_recursion_limit(64);

    config.save_to(&path).unwrap();
    let loaded = EngineConfig::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn reconstructed_engine_rebuilds_caches_lazily() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.json");
    EngineConfig::default().save_to(&path).unwrap();

    let loaded = EngineConfig::load_from(&path).unwrap();
    let engine = Engine::from_config(loaded, registry());
    assert_eq!(engine.resolver().cached_codecs(), 0);

    let desc = TypeDescriptor::named("Point");
    let point = Value::object("Point");
    point.as_object().unwrap().set("x", Value::I64(1));
    point.as_object().unwrap().set("y", Value::I64(2));

    let json = engine.write_json(&desc, &point).unwrap();
    assert_eq!(engine.read_json(&desc, &json).unwrap(), point);
    assert!(engine.resolver().cached_codecs() > 0);
}

#[test]
fn load_failure_is_a_codec_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.json");
    assert!(EngineConfig::load_from(&path).is_err());

    std::fs::write(&path, "not json").unwrap();
    assert!(EngineConfig::load_from(&path).is_err());
}
