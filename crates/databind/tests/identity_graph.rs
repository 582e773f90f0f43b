// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Object identity and managed references: shared/cyclic graphs flatten to
// reference tokens and reconstruct without infinite recursion; forward
// references defer until their definition appears.

use databind::{
    CodecError, Engine, IdentitySpec, MemberCapability, MemberDescription, ObjectRef,
    SharedTypeRegistry, StructDescription, TypeDescriptor, Value,
};
use std::sync::Arc;

fn node_registry() -> Arc<SharedTypeRegistry> {
    let registry = Arc::new(SharedTypeRegistry::new());
    let node = TypeDescriptor::named("Node");
    registry.register_struct(
        StructDescription::builder(node.clone())
            .identity(IdentitySpec::sequence("@id"))
            .slot("label", TypeDescriptor::string_type())
            .slot("next", node)
            .build(),
    );
    registry
}

fn node(label: &str) -> ObjectRef {
    let o = ObjectRef::new("Node");
    o.set("label", Value::String(label.to_string()));
    o
}

#[test]
fn cyclic_graph_round_trips_with_identity() {
    let engine = Engine::builder().registry(node_registry()).build();
    let desc = TypeDescriptor::named("Node");

    let a = node("a");
    let b = node("b");
    a.set("next", Value::Object(b.clone()));
    b.set("next", Value::Object(a.clone()));
    let value = Value::Object(a);

    let json = engine.write_json(&desc, &value).unwrap();
    assert_eq!(
        json,
        r#"{"@id":1,"label":"a","next":{"@id":2,"label":"b","next":1}}"#
    );

    let back = engine.read_json(&desc, &json).unwrap();
    assert_eq!(back, value);

    // The cycle is a real pointer cycle, not a structural copy.
    let a2 = back.as_object().unwrap();
    let b2 = a2.get("next").unwrap();
    let around = b2.as_object().unwrap().get("next").unwrap();
    assert!(ObjectRef::ptr_eq(around.as_object().unwrap(), a2));
}

#[test]
fn shared_subtree_writes_one_body_and_a_reference() {
    let engine = Engine::builder().registry(node_registry()).build();
    let desc = TypeDescriptor::array_of(TypeDescriptor::named("Node"));

    let shared = node("shared");
    let value = Value::Array(vec![
        Value::Object(shared.clone()),
        Value::Object(shared),
    ]);

    let json = engine.write_json(&desc, &value).unwrap();
    assert_eq!(json, r#"[{"@id":1,"label":"shared","next":null},1]"#);

    let back = engine.read_json(&desc, &json).unwrap();
    let items = back.as_array().unwrap();
    assert!(ObjectRef::ptr_eq(
        items[0].as_object().unwrap(),
        items[1].as_object().unwrap()
    ));
}

#[test]
fn forward_reference_defers_until_definition() {
    let registry = node_registry();
    registry.register_struct(
        StructDescription::builder(TypeDescriptor::named("Team"))
            .slot(
                "members",
                TypeDescriptor::array_of(TypeDescriptor::named("Node")),
            )
            .build(),
    );
    let engine = Engine::builder().registry(registry).build();
    let desc = TypeDescriptor::named("Team");

    // Reference token 9 appears before its definition.
    let back = engine
        .read_json(&desc, r#"{"members":[9,{"@id":9,"label":"late"}]}"#)
        .unwrap();
    let members = back.as_object().unwrap().get("members").unwrap();
    let items = members.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(ObjectRef::ptr_eq(
        items[0].as_object().unwrap(),
        items[1].as_object().unwrap()
    ));
    assert_eq!(
        items[0].as_object().unwrap().get("label"),
        Some(Value::String("late".into()))
    );
}

#[test]
fn unresolved_reference_fails_the_call() {
    let registry = node_registry();
    registry.register_struct(
        StructDescription::builder(TypeDescriptor::named("Team"))
            .slot(
                "members",
                TypeDescriptor::array_of(TypeDescriptor::named("Node")),
            )
            .build(),
    );
    let engine = Engine::builder().registry(registry).build();
    let desc = TypeDescriptor::named("Team");

    let err = engine
        .read_json(&desc, r#"{"members":[7]}"#)
        .unwrap_err();
    match err.root_cause() {
        CodecError::UnresolvedReference { ids } => assert_eq!(ids, &vec!["7".to_string()]),
        other => panic!("unexpected: {other}"),
    }
}

#[test]
fn duplicate_id_on_read_is_fatal() {
    let engine = Engine::builder().registry(node_registry()).build();
    let desc = TypeDescriptor::array_of(TypeDescriptor::named("Node"));

    let err = engine
        .read_json(
            &desc,
            r#"[{"@id":1,"label":"a"},{"@id":1,"label":"b"}]"#,
        )
        .unwrap_err();
    assert!(matches!(
        err.root_cause(),
        CodecError::DuplicateIdentity { .. }
    ));
}

#[test]
fn duplicate_property_id_on_write_is_fatal() {
    let registry = Arc::new(SharedTypeRegistry::new());
    registry.register_struct(
        StructDescription::builder(TypeDescriptor::named("Row"))
            .identity(IdentitySpec::property_based("key"))
            .slot("key", TypeDescriptor::i64_type())
            .build(),
    );
    let engine = Engine::builder().registry(registry).build();
    let desc = TypeDescriptor::array_of(TypeDescriptor::named("Row"));

    let row = |key: i64| {
        let o = ObjectRef::new("Row");
        o.set("key", Value::I64(key));
        Value::Object(o)
    };
    let err = engine
        .write_json(&desc, &Value::Array(vec![row(7), row(7)]))
        .unwrap_err();
    assert!(matches!(
        err.root_cause(),
        CodecError::DuplicateIdentity { .. }
    ));
}

#[test]
fn null_property_id_is_accepted_and_propagated() {
    let registry = Arc::new(SharedTypeRegistry::new());
    registry.register_struct(
        StructDescription::builder(TypeDescriptor::named("Row"))
            .identity(IdentitySpec::property_based("key"))
            .slot("key", TypeDescriptor::i64_type())
            .slot("name", TypeDescriptor::string_type())
            .build(),
    );
    let engine = Engine::builder().registry(registry).build();
    let desc = TypeDescriptor::named("Row");

    // Store-assigned key not present yet: still writable.
    let row = ObjectRef::new("Row");
    row.set("key", Value::Null);
    row.set("name", Value::String("draft".into()));

    let json = engine.write_json(&desc, &Value::Object(row)).unwrap();
    assert_eq!(json, r#"{"key":null,"name":"draft"}"#);
}

#[test]
fn back_reference_round_trips_parent_child() {
    let registry = Arc::new(SharedTypeRegistry::new());
    registry.register_struct(
        StructDescription::builder(TypeDescriptor::named("B"))
            .slot("name", TypeDescriptor::string_type())
            .member(MemberDescription::with_capability(
                "parent",
                TypeDescriptor::named("A"),
                MemberCapability::BackReference,
            ))
            .build(),
    );
    registry.register_struct(
        StructDescription::builder(TypeDescriptor::named("A"))
            .member(MemberDescription::with_capability(
                "child",
                TypeDescriptor::named("B"),
                MemberCapability::ForwardReference {
                    back_member: "parent".into(),
                },
            ))
            .build(),
    );
    let engine = Engine::builder().registry(registry).build();
    let desc = TypeDescriptor::named("A");

    let a = ObjectRef::new("A");
    let b = ObjectRef::new("B");
    b.set("name", Value::String("B".into()));
    b.set("parent", Value::Object(a.clone()));
    a.set("child", Value::Object(b));

    // The back half never reaches the stream.
    let json = engine.write_json(&desc, &Value::Object(a)).unwrap();
    assert_eq!(json, r#"{"child":{"name":"B"}}"#);

    // Reading materializes the back pointer without infinite recursion.
    let back = engine.read_json(&desc, &json).unwrap();
    let a2 = back.as_object().unwrap();
    let b2 = a2.get("child").unwrap();
    let parent = b2.as_object().unwrap().get("parent").unwrap();
    assert!(ObjectRef::ptr_eq(parent.as_object().unwrap(), a2));
}

#[test]
fn back_references_populate_every_list_child() {
    let registry = Arc::new(SharedTypeRegistry::new());
    registry.register_struct(
        StructDescription::builder(TypeDescriptor::named("Child"))
            .slot("name", TypeDescriptor::string_type())
            .member(MemberDescription::with_capability(
                "parent",
                TypeDescriptor::named("Parent"),
                MemberCapability::BackReference,
            ))
            .build(),
    );
    registry.register_struct(
        StructDescription::builder(TypeDescriptor::named("Parent"))
            .slot("name", TypeDescriptor::string_type())
            .member(MemberDescription::with_capability(
                "children",
                TypeDescriptor::array_of(TypeDescriptor::named("Child")),
                MemberCapability::ForwardReference {
                    back_member: "parent".into(),
                },
            ))
            .build(),
    );
    let engine = Engine::builder().registry(registry).build();
    let desc = TypeDescriptor::named("Parent");

    let back = engine
        .read_json(
            &desc,
            r#"{"name":"p","children":[{"name":"c1"},{"name":"c2"},{"name":"c3"}]}"#,
        )
        .unwrap();
    let parent = back.as_object().unwrap();
    let children = parent.get("children").unwrap();
    let items = children.as_array().unwrap();
    assert_eq!(items.len(), 3);
    for child in items {
        let up = child.as_object().unwrap().get("parent").unwrap();
        assert!(ObjectRef::ptr_eq(up.as_object().unwrap(), parent));
    }
}

#[test]
fn cycle_without_identity_is_a_checked_depth_error() {
    let registry = Arc::new(SharedTypeRegistry::new());
    let node = TypeDescriptor::named("Loop");
    registry.register_struct(
        StructDescription::builder(node.clone())
            .slot("next", node)
            .build(),
    );
    let engine = Engine::builder().registry(registry).build();
    let desc = TypeDescriptor::named("Loop");

    let a = ObjectRef::new("Loop");
    let b = ObjectRef::new("Loop");
    a.set("next", Value::Object(b.clone()));
    b.set("next", Value::Object(a.clone()));

    let err = engine.write_json(&desc, &Value::Object(a)).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        CodecError::RecursionTooDeep { .. }
    ));
}
