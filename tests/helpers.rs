#![allow(dead_code)]

use std::sync::Arc;

use wayfarer_engine::engine::{
    HaltedStore, InjectStep, Key, ReducingBarrierStep, Traversal, Traverser, Value,
};

pub fn string_values(names: &[&str]) -> Vec<Value> {
    names.iter().map(|name| Value::from(*name)).collect()
}

/// A child traversal that derives the traverser's own value as the key.
pub fn identity_traversal() -> Traversal {
    Traversal::empty().mapped(Arc::new(|value| Ok(value.clone())))
}

pub fn expected_counts(pairs: &[(&str, i64)]) -> Value {
    Value::from_mapping(
        pairs
            .iter()
            .map(|(key, count)| (Value::from(*key), Value::from(*count))),
    )
}

/// A group-count barrier over injected values, keyed by the identity child
/// traversal.
pub fn group_count_over(values: Vec<Value>) -> ReducingBarrierStep {
    ReducingBarrierStep::group_count(
        Box::new(InjectStep::new(values)),
        Some(identity_traversal()),
    )
}

/// Builds a store with one explicit partition per slice; every entry lands
/// at its own random vertex.
pub fn store_from(partitions: &[&[(&str, u64)]]) -> eyre::Result<HaltedStore> {
    let mut store = HaltedStore::new(partitions.len())?;
    for (partition, entries) in partitions.iter().enumerate() {
        for (key, bulk) in *entries {
            let traverser = Traverser::with_bulk(Value::from(*key), *bulk)?;
            store.halt_in(partition, Key::random(), traverser)?;
        }
    }
    Ok(store)
}
