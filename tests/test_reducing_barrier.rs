mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;

use wayfarer_engine::engine::{
    Error, InjectStep, Memory, Reducer, ReducingBarrierStep, Step, Traversal, Traverser,
    TraverserRequirements, Value, REDUCING,
};

fn counting_traversal(counter: &Arc<AtomicUsize>) -> Traversal {
    let counter = counter.clone();
    Traversal::empty().mapped(Arc::new(move |value| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(value.clone())
    }))
}

#[test]
fn test_group_count_folds_the_whole_stream() -> eyre::Result<()> {
    let mut step = helpers::group_count_over(helpers::string_values(&["A", "A", "B", "A", "C"]));
    let result = step.next()?.unwrap();
    assert_eq!(result.bulk(), 1);
    assert_eq!(
        result.into_value(),
        helpers::expected_counts(&[("A", 3), ("B", 1), ("C", 1)])
    );
    // the barrier emits exactly once
    assert_matches!(step.next()?, None);
    Ok(())
}

#[test]
fn test_bulk_is_honored_by_the_fold() -> eyre::Result<()> {
    let source = InjectStep::with_traversers([Traverser::with_bulk(Value::from("X"), 7)?]);
    let mut step =
        ReducingBarrierStep::group_count(Box::new(source), Some(helpers::identity_traversal()));
    let result = step.next()?.unwrap();
    assert_eq!(result.into_value(), helpers::expected_counts(&[("X", 7)]));
    Ok(())
}

#[test]
fn test_one_bulk_five_equals_five_bulk_one() -> eyre::Result<()> {
    let coalesced = InjectStep::with_traversers([Traverser::with_bulk(Value::from("X"), 5)?]);
    let expanded = InjectStep::new(helpers::string_values(&["X"; 5]));
    let mut left = ReducingBarrierStep::group_count(Box::new(coalesced), None);
    let mut right = ReducingBarrierStep::group_count(Box::new(expanded), None);
    assert_eq!(
        left.next()?.unwrap().into_value(),
        right.next()?.unwrap().into_value()
    );
    Ok(())
}

#[test]
fn test_empty_input_emits_the_frozen_empty_seed() -> eyre::Result<()> {
    let mut step = helpers::group_count_over(Vec::new());
    let result = step.next()?.unwrap();
    assert_eq!(result.into_value(), Value::from_mapping([]));
    assert_matches!(step.next()?, None);

    let mut count = ReducingBarrierStep::new(Box::new(InjectStep::default()), Reducer::Count);
    assert_eq!(count.next()?.unwrap().into_value(), Value::from(0));

    let mut sum = ReducingBarrierStep::new(Box::new(InjectStep::default()), Reducer::Sum);
    assert_eq!(sum.next()?.unwrap().into_value(), Value::from(0));
    Ok(())
}

#[test]
fn test_count_scales_by_bulk() -> eyre::Result<()> {
    let source = InjectStep::with_traversers([
        Traverser::new(Value::from("a")),
        Traverser::with_bulk(Value::from("b"), 4)?,
        Traverser::with_bulk(Value::from("a"), 2)?,
    ]);
    let mut step = ReducingBarrierStep::new(Box::new(source), Reducer::Count);
    assert_eq!(step.next()?.unwrap().into_value(), Value::from(7));
    Ok(())
}

#[test]
fn test_sum_over_ints_and_floats() -> eyre::Result<()> {
    let ints = InjectStep::with_traversers([
        Traverser::with_bulk(Value::from(3), 2)?,
        Traverser::new(Value::from(10)),
    ]);
    let mut step = ReducingBarrierStep::new(Box::new(ints), Reducer::Sum);
    assert_eq!(step.next()?.unwrap().into_value(), Value::from(16));

    let floats = InjectStep::new([Value::from(1.5), Value::from(2.25)]);
    let mut step = ReducingBarrierStep::new(Box::new(floats), Reducer::Sum);
    assert_eq!(step.next()?.unwrap().into_value(), Value::from(3.75));
    Ok(())
}

#[test]
fn test_sum_rejects_mixed_summands() {
    let mixed = InjectStep::new([Value::from(1), Value::from(0.5)]);
    let mut step = ReducingBarrierStep::new(Box::new(mixed), Reducer::Sum);
    assert_matches!(step.next(), Err(Error::TypeMismatch { expected: "int", .. }));
}

#[test]
fn test_derived_keys_from_a_child_traversal() -> eyre::Result<()> {
    let lengths = Traversal::empty().mapped(Arc::new(|value| match value {
        Value::String(s) => Ok(Value::Int(i64::try_from(s.len())?)),
        other => Ok(other.clone()),
    }));
    let source = InjectStep::new(helpers::string_values(&["ox", "cat", "elk", "ant"]));
    let mut step = ReducingBarrierStep::group_count(Box::new(source), Some(lengths));
    assert_eq!(
        step.next()?.unwrap().into_value(),
        Value::from_mapping([
            (Value::from(2), Value::from(1)),
            (Value::from(3), Value::from(3)),
        ])
    );
    Ok(())
}

#[test]
fn test_child_applied_once_per_traverser_when_folding() -> eyre::Result<()> {
    let counter = Arc::new(AtomicUsize::new(0));
    let source = InjectStep::new(helpers::string_values(&["A", "B", "A"]));
    let mut step =
        ReducingBarrierStep::group_count(Box::new(source), Some(counting_traversal(&counter)));
    step.next()?;
    assert_eq!(counter.load(Ordering::SeqCst), 3);
    Ok(())
}

#[test]
fn test_bypass_applies_the_child_but_skips_folding() -> eyre::Result<()> {
    let counter = Arc::new(AtomicUsize::new(0));
    let source = InjectStep::with_traversers([
        Traverser::with_bulk(Value::from("A"), 2)?,
        Traverser::new(Value::from("B")),
    ]);
    let mut step =
        ReducingBarrierStep::group_count(Box::new(source), Some(counting_traversal(&counter)));
    step.set_bypass(true);
    // each traverser passes through with its per-traverser derived value
    let first = step.next()?.unwrap();
    assert_eq!(first.value(), &Value::from("A"));
    assert_eq!(first.bulk(), 2);
    let second = step.next()?.unwrap();
    assert_eq!(second.value(), &Value::from("B"));
    assert_matches!(step.next()?, None);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_failed_fold_publishes_nothing() {
    let child = Traversal::empty().mapped(Arc::new(|value| {
        if value == &Value::from("B") {
            return Err("storage read failed".into());
        }
        Ok(value.clone())
    }));
    let source = InjectStep::new(helpers::string_values(&["A", "B", "C"]));
    let mut step = ReducingBarrierStep::group_count(Box::new(source), Some(child));
    let mut memory = Memory::new();
    assert_matches!(step.run_to_memory(&mut memory), Err(Error::Other(_)));
    assert!(memory.is_empty());
}

#[test]
fn test_run_to_memory_publishes_under_the_reducing_key() -> eyre::Result<()> {
    let mut memory = Memory::new();
    helpers::group_count_over(helpers::string_values(&["A", "B", "A"]))
        .run_to_memory(&mut memory)?;
    assert_eq!(
        memory.extract(REDUCING)?,
        &helpers::expected_counts(&[("A", 2), ("B", 1)])
    );
    // the key class is written once per execution
    assert_matches!(
        helpers::group_count_over(Vec::new()).run_to_memory(&mut memory),
        Err(Error::DuplicateMemoryKey(_))
    );
    Ok(())
}

#[test]
fn test_barrier_requirements_include_bulk_and_children() {
    let step = helpers::group_count_over(Vec::new());
    let requirements = step.requirements();
    assert!(requirements.contains(TraverserRequirements::BULK));
    assert!(requirements.contains(TraverserRequirements::OBJECT));
}

#[test]
fn test_reset_allows_reuse() -> eyre::Result<()> {
    let mut step = helpers::group_count_over(helpers::string_values(&["A"]));
    assert_eq!(
        step.next()?.unwrap().into_value(),
        helpers::expected_counts(&[("A", 1)])
    );
    step.reset();
    step.add_start(Traverser::new(Value::from("B")));
    assert_eq!(
        step.next()?.unwrap().into_value(),
        helpers::expected_counts(&[("B", 1)])
    );
    Ok(())
}
