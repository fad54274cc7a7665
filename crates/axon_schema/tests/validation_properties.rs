//! Property tests: validation is total over arbitrary JSON.
//!
//! Whatever the payload looks like, `validate` must classify it as either
//! a conforming instance or a typed violation - it must never panic.

use axon_schema::{validate, FieldSlot, RecordSchema, SchemaViolation};
use proptest::prelude::*;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

fn target_schema() -> Arc<RecordSchema> {
    let line_item = RecordSchema::new(
        "LineItem",
        vec![FieldSlot::text("sku"), FieldSlot::number("quantity")],
    )
    .unwrap();
    Arc::new(
        RecordSchema::new(
            "Order",
            vec![
                FieldSlot::text("customer"),
                FieldSlot::number("total"),
                FieldSlot::boolean("paid"),
                FieldSlot::record_list("lines", line_item),
            ],
        )
        .unwrap(),
    )
}

/// Arbitrary JSON values, three levels deep.
fn arb_json() -> impl Strategy<Value = JsonValue> {
    let leaf = prop_oneof![
        Just(JsonValue::Null),
        any::<bool>().prop_map(JsonValue::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        any::<f64>().prop_filter("finite", |f| f.is_finite()).prop_map(|f| json!(f)),
        "[a-zA-Z0-9 ]{0,12}".prop_map(JsonValue::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(JsonValue::Array),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..4)
                .prop_map(|m| JsonValue::Object(m.into_iter().collect())),
        ]
    })
}

/// JSON objects that use only declared slot names (values still arbitrary).
fn arb_shaped_json() -> impl Strategy<Value = JsonValue> {
    let slot_value = prop_oneof![
        Just(JsonValue::Null),
        any::<bool>().prop_map(JsonValue::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-zA-Z ]{0,16}".prop_map(JsonValue::String),
    ];
    prop::collection::btree_map(
        prop_oneof![
            Just("customer".to_string()),
            Just("total".to_string()),
            Just("paid".to_string()),
        ],
        slot_value,
        0..3,
    )
    .prop_map(|m| JsonValue::Object(m.into_iter().collect()))
}

proptest! {
    #[test]
    fn validation_never_panics(payload in arb_json()) {
        let schema = target_schema();
        // Outcome must be one of the two typed shapes; reaching this
        // assertion at all means no panic escaped.
        match validate(&schema, &payload) {
            Ok(()) => {}
            Err(violation) => {
                prop_assert!(!violation.to_string().is_empty());
            }
        }
    }

    #[test]
    fn non_objects_are_rejected_as_shape_violations(payload in arb_json()) {
        let schema = target_schema();
        if !payload.is_object() {
            let err = validate(&schema, &payload).unwrap_err();
            let is_not_an_object = matches!(err, SchemaViolation::NotAnObject { .. });
            prop_assert!(is_not_an_object);
        }
    }

    #[test]
    fn shaped_objects_only_fail_on_kind_mismatch(payload in arb_shaped_json()) {
        let schema = target_schema();
        match validate(&schema, &payload) {
            Ok(()) => {}
            Err(err) => prop_assert!(
                matches!(err, SchemaViolation::KindMismatch { .. }),
                "unexpected violation class: {err}"
            ),
        }
    }
}
