//! Properties of the JSON comparison.

use microtest::compare::{json_pretty, semantic_json_equals, structural_equals};
use proptest::prelude::*;
use serde_json::{Map, Value};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        // Quarters are exact in binary, so text round trips are lossless.
        (-1_000_000i32..1_000_000).prop_map(|n| Value::from(f64::from(n) / 4.0)),
        "[a-z]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Serializes an object with its members in reverse order.
fn reversed_object_text(map: &Map<String, Value>) -> String {
    let members: Vec<String> = map
        .iter()
        .rev()
        .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), v))
        .collect();
    format!("{{{}}}", members.join(","))
}

proptest! {
    #[test]
    fn comparison_is_reflexive(value in arb_json()) {
        let bytes = serde_json::to_vec(&value).unwrap();
        prop_assert!(semantic_json_equals(&bytes, &bytes).is_equal());
        prop_assert!(structural_equals(&value, &value));
    }

    #[test]
    fn member_order_is_irrelevant(map in prop::collection::btree_map("[a-z]{1,6}", any::<i32>(), 0..10)) {
        let map: Map<String, Value> = map.into_iter().map(|(k, v)| (k, Value::from(v))).collect();
        let forward = serde_json::to_vec(&Value::Object(map.clone())).unwrap();
        let backward = reversed_object_text(&map);
        prop_assert!(semantic_json_equals(&forward, backward.as_bytes()).is_equal());
    }

    #[test]
    fn pretty_form_compares_equal(value in arb_json()) {
        let bytes = serde_json::to_vec(&value).unwrap();
        prop_assert!(semantic_json_equals(&bytes, &json_pretty(&bytes)).is_equal());
    }

    #[test]
    fn array_order_matters(a in any::<i32>(), b in any::<i32>()) {
        prop_assume!(a != b);
        let forward = format!("[{a},{b}]");
        let backward = format!("[{b},{a}]");
        prop_assert!(!semantic_json_equals(forward.as_bytes(), backward.as_bytes()).is_equal());
    }
}
