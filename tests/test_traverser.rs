use assert_matches::assert_matches;

use wayfarer_engine::engine::{Error, Key, SideEffects, Traverser, TraverserSet, Value};

#[test]
fn test_bulk_is_at_least_one() -> eyre::Result<()> {
    assert_matches!(
        Traverser::with_bulk(Value::from("a"), 0),
        Err(Error::ZeroBulk)
    );
    let traverser = Traverser::new(Value::from("a"));
    assert_eq!(traverser.bulk(), 1);
    Ok(())
}

#[test]
fn test_split_preserves_bulk_and_side_effects() -> eyre::Result<()> {
    let side_effects = SideEffects::new().with("label", Value::from("seen"));
    let traverser =
        Traverser::with_bulk(Value::from("a"), 4)?.with_side_effects(side_effects.clone());
    let derived = traverser.split(Value::from(7));
    assert_eq!(derived.value(), &Value::from(7));
    assert_eq!(derived.bulk(), 4);
    assert_eq!(derived.side_effects(), &side_effects);
    assert_eq!(derived.side_effects().get("label"), Some(&Value::from("seen")));
    Ok(())
}

#[test]
fn test_set_coalesces_identical_traversers() -> eyre::Result<()> {
    let mut set = TraverserSet::new();
    set.add(Traverser::new(Value::from("a")));
    set.add(Traverser::new(Value::from("a")));
    set.add(Traverser::with_bulk(Value::from("b"), 2)?);
    // same value, different side-effect state: never merged
    set.add(
        Traverser::new(Value::from("a"))
            .with_side_effects(SideEffects::new().with("flag", Value::from(true))),
    );
    assert_eq!(set.len(), 3);
    assert_eq!(set.total_bulk(), 5);
    let coalesced = set
        .iter()
        .find(|t| t.value() == &Value::from("a") && t.side_effects().is_empty())
        .unwrap();
    assert_eq!(coalesced.bulk(), 2);
    Ok(())
}

#[test]
fn test_total_bulk_is_preserved_under_partitioning() -> eyre::Result<()> {
    let traversers = vec![
        Traverser::with_bulk(Value::from("a"), 3)?,
        Traverser::new(Value::from("a")),
        Traverser::new(Value::from("b")),
        Traverser::with_bulk(Value::from("c"), 2)?,
    ];
    let mut whole = TraverserSet::new();
    let mut left = TraverserSet::new();
    let mut right = TraverserSet::new();
    for (i, traverser) in traversers.into_iter().enumerate() {
        whole.add(traverser.clone());
        if i % 2 == 0 {
            left.add(traverser);
        } else {
            right.add(traverser);
        }
    }
    assert_eq!(whole.total_bulk(), left.total_bulk() + right.total_bulk());
    assert_eq!(whole.total_bulk(), 7);
    Ok(())
}

#[test]
fn test_halted_state_serde_round_trip() -> eyre::Result<()> {
    let mut set = TraverserSet::new();
    set.add(Traverser::with_bulk(Value::from("a"), 3)?);
    set.add(Traverser::new(Value::from(Key::random())));
    set.add(
        Traverser::new(Value::Tuple(vec![Value::from(1), Value::None].into()))
            .with_side_effects(SideEffects::new().with("flag", Value::from(false))),
    );
    let encoded = serde_json::to_string(&set)?;
    let decoded: TraverserSet = serde_json::from_str(&encoded)?;
    assert_eq!(decoded, set);
    Ok(())
}
