use cereal_codec::RefCodec;
use cereal_model::{Entity, EntityStore, MemoryStore, Value};
use cereal_test_utils::basic_model;
use proptest::prelude::*;
use std::sync::Arc;

const POOL: i64 = 4;

fn pooled(pk: i64) -> Entity {
    Entity::with_pk(basic_model(), pk).field("name", format!("pooled-{pk}"))
}

fn seeded_codec() -> (Arc<MemoryStore>, RefCodec) {
    let store = Arc::new(MemoryStore::new());
    for pk in 1..=POOL {
        store.create(pooled(pk)).unwrap();
    }
    let codec = RefCodec::new(store.clone());
    (store, codec)
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<f64>()
            .prop_filter("finite", |x| x.is_finite())
            .prop_map(Value::Float),
        "[a-z ]{0,8}".prop_map(Value::Str),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(Value::Bytes),
        (1..=POOL).prop_map(|pk| Value::Entity(pooled(pk))),
    ]
}

fn value_tree() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::List),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..6).prop_map(Value::Map),
        ]
    })
}

proptest! {
    #[test]
    fn prop_nested_values_roundtrip(value in value_tree()) {
        let (_store, codec) = seeded_codec();
        let before = codec.model_base().snapshot();

        let bytes = codec.encode(&value).unwrap();
        let decoded = codec.decode(&bytes).unwrap();

        prop_assert_eq!(&decoded, &value);
        prop_assert_eq!(decoded.entity_count(), value.entity_count());
        prop_assert!(before.same_as(&codec.model_base().snapshot()));
    }

    #[test]
    fn prop_decode_reads_store_at_decode_time(value in value_tree()) {
        let (store, codec) = seeded_codec();
        let bytes = codec.encode(&value).unwrap();

        for pk in 1..=POOL {
            let mut updated = store.lookup(&basic_model(), Some(&pk.into())).unwrap();
            updated.set("name", format!("renamed-{pk}"));
            store.save(&updated).unwrap();
        }

        let decoded = codec.decode(&bytes).unwrap();
        let mut names = Vec::new();
        decoded.for_each_entity(&mut |e| names.push(e.get("name").cloned()));

        prop_assert_eq!(names.len(), value.entity_count());
        for name in names {
            let name = name.unwrap();
            prop_assert!(name.as_str().unwrap().starts_with("renamed-"));
        }
    }
}
