// Copyright © 2025 Wayfarer

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arcstr::ArcStr;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use super::Value;

bitflags! {
    /// Capabilities a step needs preserved on the traversers flowing through
    /// it. A step's set is the union of its own needs and those of every
    /// nested child traversal. Violating an undeclared requirement is a
    /// caller error, not checked at runtime.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct TraverserRequirements: u8 {
        const OBJECT = 1;
        const BULK = 2;
        const SIDE_EFFECTS = 4;
    }
}

/// Opaque per-traverser side-effect bag. Participates in coalescing
/// equality: traversers with different bags are never merged.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SideEffects(Arc<BTreeMap<ArcStr, Value>>);

impl SideEffects {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(&self, key: impl Into<ArcStr>, value: Value) -> Self {
        let mut bag = BTreeMap::clone(&self.0);
        bag.insert(key.into(), value);
        Self(Arc::new(bag))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A token flowing through the pipeline: a current value plus the number of
/// logically-identical traversers it stands in for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traverser {
    value: Value,
    bulk: u64,
    side_effects: SideEffects,
}

impl Traverser {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            bulk: 1,
            side_effects: SideEffects::new(),
        }
    }

    pub fn with_bulk(value: Value, bulk: u64) -> Result<Self> {
        if bulk == 0 {
            return Err(Error::ZeroBulk);
        }
        Ok(Self {
            value,
            bulk,
            side_effects: SideEffects::new(),
        })
    }

    #[must_use]
    pub fn with_side_effects(mut self, side_effects: SideEffects) -> Self {
        self.side_effects = side_effects;
        self
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn bulk(&self) -> u64 {
        self.bulk
    }

    pub fn side_effects(&self) -> &SideEffects {
        &self.side_effects
    }

    /// Derives a traverser with a new current value, preserving bulk and
    /// side effects.
    #[must_use]
    pub fn split(&self, value: Value) -> Self {
        Self {
            value,
            bulk: self.bulk,
            side_effects: self.side_effects.clone(),
        }
    }
}

/// A multiset of traversers that coalesces entries with equal value and
/// side-effect state by summing their bulk. Total bulk is preserved under
/// any partitioning of the input.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Traverser>", into = "Vec<Traverser>")]
pub struct TraverserSet {
    bulks: HashMap<(Value, SideEffects), u64>,
}

impl TraverserSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, traverser: Traverser) {
        let Traverser {
            value,
            bulk,
            side_effects,
        } = traverser;
        *self.bulks.entry((value, side_effects)).or_insert(0) += bulk;
    }

    pub fn iter(&self) -> impl Iterator<Item = Traverser> + '_ {
        self.bulks
            .iter()
            .map(|((value, side_effects), bulk)| Traverser {
                value: value.clone(),
                bulk: *bulk,
                side_effects: side_effects.clone(),
            })
    }

    pub fn len(&self) -> usize {
        self.bulks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bulks.is_empty()
    }

    pub fn total_bulk(&self) -> u64 {
        self.bulks.values().sum()
    }
}

impl From<Vec<Traverser>> for TraverserSet {
    fn from(traversers: Vec<Traverser>) -> Self {
        let mut set = Self::new();
        for traverser in traversers {
            set.add(traverser);
        }
        set
    }
}

impl From<TraverserSet> for Vec<Traverser> {
    fn from(set: TraverserSet) -> Self {
        set.iter().collect()
    }
}
