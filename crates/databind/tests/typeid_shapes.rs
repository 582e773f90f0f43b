// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Type-id protocol: wrapping shapes, shape fallback, null-id structural
// balance and tolerant reading of mismatched producer/consumer shapes.

use databind::{
    CodecError, Engine, EngineConfig, MemberDescription, MemberHints, SharedTypeRegistry,
    StructDescription, Token, TypeDescriptor, TypeIdStrategy, Value, WrapShape,
};
use std::sync::Arc;

fn shape_registry() -> Arc<SharedTypeRegistry> {
    let registry = Arc::new(SharedTypeRegistry::new());
    let shape = TypeDescriptor::named("Shape");
    let circle = TypeDescriptor::with_supertypes("Circle", vec![Arc::from("Shape")]);
    let square = TypeDescriptor::with_supertypes("Square", vec![Arc::from("Shape")]);

    registry.register_struct(
        StructDescription::builder(circle.clone())
            .slot("radius", TypeDescriptor::f64_type())
            .build(),
    );
    registry.register_struct(
        StructDescription::builder(square.clone())
            .slot("side", TypeDescriptor::f64_type())
            .build(),
    );
    registry.register_subtype(&shape, circle);
    registry.register_subtype(&shape, square);

    registry.register_struct(
        StructDescription::builder(TypeDescriptor::named("Drawing"))
            .slot("main", shape)
            .build(),
    );
    registry
}

fn circle(radius: f64) -> Value {
    let o = databind::ObjectRef::new("Circle");
    o.set("radius", Value::F64(radius));
    Value::Object(o)
}

fn drawing(main: Value) -> Value {
    let o = databind::ObjectRef::new("Drawing");
    o.set("main", main);
    Value::Object(o)
}

#[test]
fn as_property_subtype_round_trip() {
    let engine = Engine::builder().registry(shape_registry()).build();
    let desc = TypeDescriptor::named("Drawing");

    let value = drawing(circle(2.5));
    let json = engine.write_json(&desc, &value).unwrap();
    assert_eq!(json, r#"{"main":{"@type":"Circle","radius":2.5}}"#);

    let back = engine.read_json(&desc, &json).unwrap();
    let main = back.as_object().unwrap().get("main").unwrap();
    // Exact runtime subtype, not the declared supertype.
    assert_eq!(&*main.as_object().unwrap().type_name(), "Circle");
    assert_eq!(back, value);
}

#[test]
fn wrapper_array_subtype_round_trip() {
    let engine = Engine::builder()
        .registry(shape_registry())
        .config(EngineConfig::default().with_write_shape(WrapShape::WrapperArray))
        .build();
    let desc = TypeDescriptor::named("Drawing");

    let value = drawing(circle(1.0));
    let json = engine.write_json(&desc, &value).unwrap();
    assert_eq!(json, r#"{"main":["Circle",{"radius":1.0}]}"#);
    assert_eq!(engine.read_json(&desc, &json).unwrap(), value);
}

#[test]
fn wrapper_object_subtype_round_trip() {
    let engine = Engine::builder()
        .registry(shape_registry())
        .config(EngineConfig::default().with_write_shape(WrapShape::WrapperObject))
        .build();
    let desc = TypeDescriptor::named("Drawing");

    let value = drawing(circle(1.0));
    let json = engine.write_json(&desc, &value).unwrap();
    assert_eq!(json, r#"{"main":{"Circle":{"radius":1.0}}}"#);
    assert_eq!(engine.read_json(&desc, &json).unwrap(), value);
}

#[test]
fn scalar_value_falls_back_to_wrapper_array() {
    // A polymorphic slot holding a scalar cannot carry an id property;
    // as-property must produce the exact wrapper-array wire shape.
    let registry = Arc::new(SharedTypeRegistry::new());
    registry.register_struct(
        StructDescription::builder(TypeDescriptor::named("Holder"))
            .member(
                MemberDescription::slot("payload", TypeDescriptor::any_type()).with_hints(
                    MemberHints {
                        polymorphic: true,
                        ..MemberHints::default()
                    },
                ),
            )
            .build(),
    );
    let desc = TypeDescriptor::named("Holder");

    let holder = |v: Value| {
        let o = databind::ObjectRef::new("Holder");
        o.set("payload", v);
        Value::Object(o)
    };

    let as_property = Engine::builder().registry(registry.clone()).build();
    let as_wrapper = Engine::builder()
        .registry(registry)
        .config(EngineConfig::default().with_write_shape(WrapShape::WrapperArray))
        .build();

    let a = as_property
        .write_json(&desc, &holder(Value::I64(5)))
        .unwrap();
    let b = as_wrapper.write_json(&desc, &holder(Value::I64(5))).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, r#"{"payload":["i64",5]}"#);

    let back = as_property.read_json(&desc, &a).unwrap();
    assert_eq!(
        back.as_object().unwrap().get("payload"),
        Some(Value::I64(5))
    );
}

#[test]
fn null_id_keeps_stream_balanced_without_id_token() {
    // Logical-name strategy with no names registered: the id resolver
    // declines, the brackets still open and close.
    let engine = Engine::builder()
        .registry(shape_registry())
        .config(EngineConfig::default().with_type_id_strategy(TypeIdStrategy::LogicalName))
        .build();
    let desc = TypeDescriptor::named("Drawing");

    let tokens = engine.write_tokens(&desc, &drawing(circle(3.0))).unwrap();
    assert!(tokens.is_balanced());
    let has_id_token = tokens
        .tokens()
        .iter()
        .any(|t| matches!(t, Token::FieldName(name) if name == "@type"));
    assert!(!has_id_token);

    let json = databind::event::json::render(tokens.tokens()).unwrap();
    assert_eq!(json, r#"{"main":{"radius":3.0}}"#);
}

#[test]
fn logical_names_round_trip() {
    let registry = shape_registry();
    registry.register_logical_name(&TypeDescriptor::named("Circle"), "circle");
    registry.register_logical_name(&TypeDescriptor::named("Square"), "square");
    let engine = Engine::builder()
        .registry(registry)
        .config(EngineConfig::default().with_type_id_strategy(TypeIdStrategy::LogicalName))
        .build();
    let desc = TypeDescriptor::named("Drawing");

    let value = drawing(circle(2.0));
    let json = engine.write_json(&desc, &value).unwrap();
    assert_eq!(json, r#"{"main":{"@type":"circle","radius":2.0}}"#);
    assert_eq!(engine.read_json(&desc, &json).unwrap(), value);
}

#[test]
fn mismatched_producer_consumer_shapes_are_tolerated() {
    let registry = shape_registry();
    let producer = Engine::builder()
        .registry(registry.clone())
        .config(EngineConfig::default().with_write_shape(WrapShape::WrapperArray))
        .build();
    let consumer = Engine::builder()
        .registry(registry)
        .config(
            EngineConfig::default()
                .with_write_shape(WrapShape::AsProperty)
                .with_read_shape(WrapShape::AsProperty),
        )
        .build();
    let desc = TypeDescriptor::named("Drawing");

    let value = drawing(circle(4.0));
    let json = producer.write_json(&desc, &value).unwrap();
    // Consumer expects as-property but gets a wrapper array; the read
    // still resolves the exact subtype.
    assert_eq!(consumer.read_json(&desc, &json).unwrap(), value);
}

#[test]
fn unresolvable_tag_errors_without_fallback() {
    let engine = Engine::builder().registry(shape_registry()).build();
    let desc = TypeDescriptor::named("Drawing");

    let err = engine
        .read_json(&desc, r#"{"main":{"@type":"Pentagon","sides":5}}"#)
        .unwrap_err();
    assert!(matches!(
        err.root_cause(),
        CodecError::InvalidTypeId { .. }
    ));
}

#[test]
fn unresolvable_tag_uses_configured_default_impl() {
    let engine = Engine::builder()
        .registry(shape_registry())
        .config(EngineConfig::default().with_default_impl("Circle"))
        .build();
    let desc = TypeDescriptor::named("Drawing");

    let back = engine
        .read_json(&desc, r#"{"main":{"@type":"Pentagon","radius":9.0}}"#)
        .unwrap();
    let main = back.as_object().unwrap().get("main").unwrap();
    assert_eq!(&*main.as_object().unwrap().type_name(), "Circle");
    assert_eq!(
        main.as_object().unwrap().get("radius"),
        Some(Value::F64(9.0))
    );
}

#[test]
fn nested_arrays_emit_a_single_type_id_level() {
    let registry = Arc::new(SharedTypeRegistry::new());
    registry.register_struct(
        StructDescription::builder(TypeDescriptor::named("Grid"))
            .member(
                MemberDescription::slot(
                    "cells",
                    TypeDescriptor::array_of(TypeDescriptor::array_of(TypeDescriptor::i64_type())),
                )
                .with_hints(MemberHints {
                    polymorphic: true,
                    ..MemberHints::default()
                }),
            )
            .build(),
    );
    let engine = Engine::builder().registry(registry).build();
    let desc = TypeDescriptor::named("Grid");

    let grid = databind::ObjectRef::new("Grid");
    grid.set(
        "cells",
        Value::Array(vec![
            Value::Array(vec![Value::I64(1), Value::I64(2)]),
            Value::Array(vec![Value::I64(3)]),
        ]),
    );
    let value = Value::Object(grid);

    let json = engine.write_json(&desc, &value).unwrap();
    // One tag at the outer nesting level only.
    assert_eq!(json.matches("\"array\"").count(), 1);
    assert_eq!(json, r#"{"cells":["array",[[1,2],[3]]]}"#);

    let back = engine.read_json(&desc, &json).unwrap();
    assert_eq!(back, value);
}
