//! Property tests for content identity.
//!
//! - Insertion order of object keys never changes the identity
//! - Changing any scalar value changes the identity

use proptest::prelude::*;
use serde_json::{Map, Value};
use tr_identity::content_id;

fn build_object(pairs: &[(String, i64)]) -> Value {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert(k.clone(), Value::from(*v));
    }
    Value::Object(map)
}

proptest! {
    #[test]
    fn prop_key_order_insensitive(
        entries in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 1..12)
    ) {
        let forward: Vec<(String, i64)> = entries.clone().into_iter().collect();
        let mut backward = forward.clone();
        backward.reverse();

        let a = content_id(&build_object(&forward)).unwrap();
        let b = content_id(&build_object(&backward)).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_value_change_changes_identity(
        entries in proptest::collection::btree_map("[a-z]{1,8}", -1000i64..1000, 1..12),
        bump in 1i64..1000,
    ) {
        let original: Vec<(String, i64)> = entries.into_iter().collect();
        let mut changed = original.clone();
        changed[0].1 += bump;

        let a = content_id(&build_object(&original)).unwrap();
        let b = content_id(&build_object(&changed)).unwrap();
        prop_assert_ne!(a, b);
    }
}
