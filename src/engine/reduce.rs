// Copyright © 2025 Wayfarer

use std::collections::HashMap;

use ordered_float::OrderedFloat;

use super::error::{Error, Result};
use super::mapreduce::{CountMapReduce, GroupCountMapReduce, MapReduce, SumMapReduce};
use super::memory::{Memory, REDUCING};
use super::step::{apply_nullable, Step, Traversal};
use super::{Traverser, TraverserRequirements, Value};

/// The closed set of merge algebras. Each kind supplies the seed, the merge
/// operation and the finalization for the streaming path, and derives the
/// matching map/reduce job for the distributed path from the same algebra.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Count,
    Sum,
    GroupCount,
}

/// Running sum over ints or floats. Summands of one execution must share a
/// type; the first value decides it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum SumState {
    #[default]
    Empty,
    Int(i64),
    Float(f64),
}

impl SumState {
    /// Adds `value` scaled by `bulk`.
    pub fn add(&mut self, value: &Value, bulk: u64) -> Result<()> {
        let bulk_int = i64::try_from(bulk).unwrap();
        #[allow(clippy::cast_precision_loss)]
        let bulk_float = bulk as f64;
        *self = match (*self, value) {
            (Self::Empty, Value::Int(i)) => Self::Int(i * bulk_int),
            (Self::Int(sum), Value::Int(i)) => Self::Int(sum + i * bulk_int),
            (Self::Empty, Value::Float(OrderedFloat(f))) => Self::Float(f * bulk_float),
            (Self::Float(sum), Value::Float(OrderedFloat(f))) => Self::Float(sum + f * bulk_float),
            (Self::Empty, other) => {
                return Err(Error::TypeMismatch {
                    expected: "number",
                    value: other.clone(),
                })
            }
            (Self::Int(_), other) => {
                return Err(Error::TypeMismatch {
                    expected: "int",
                    value: other.clone(),
                })
            }
            (Self::Float(_), other) => {
                return Err(Error::TypeMismatch {
                    expected: "float",
                    value: other.clone(),
                })
            }
        };
        Ok(())
    }

    pub fn finish(self) -> Value {
        match self {
            Self::Empty => Value::Int(0),
            Self::Int(sum) => Value::Int(sum),
            Self::Float(sum) => Value::Float(OrderedFloat(sum)),
        }
    }
}

/// Mutable per-execution accumulator state. Created fresh by
/// [`Reducer::seed`], never shared between executions.
#[derive(Debug, Clone)]
pub enum Accumulator {
    Count(u64),
    Sum(SumState),
    Groups(HashMap<Value, u64>),
}

impl Reducer {
    pub fn seed(self) -> Accumulator {
        match self {
            Self::Count => Accumulator::Count(0),
            Self::Sum => Accumulator::Sum(SumState::default()),
            Self::GroupCount => Accumulator::Groups(HashMap::new()),
        }
    }

    /// The merge operation. Associative and commutative over the input
    /// multiset: applying it in any order and any grouping yields the same
    /// accumulator, which is what lets the local fold, the distributed
    /// combine and the distributed reduce share one algebra.
    pub fn fold(self, state: &mut Accumulator, value: &Value, bulk: u64) -> Result<()> {
        match (self, state) {
            (Self::Count, Accumulator::Count(count)) => {
                *count += bulk;
                Ok(())
            }
            (Self::Sum, Accumulator::Sum(sum)) => sum.add(value, bulk),
            (Self::GroupCount, Accumulator::Groups(groups)) => {
                *groups.entry(value.clone()).or_insert(0) += bulk;
                Ok(())
            }
            _ => panic!("accumulator does not match reducer"),
        }
    }

    /// Freezes the accumulator into the published value.
    pub fn finish(self, state: Accumulator) -> Value {
        match state {
            Accumulator::Count(count) => Value::Int(i64::try_from(count).unwrap()),
            Accumulator::Sum(sum) => sum.finish(),
            Accumulator::Groups(groups) => Value::from_mapping(
                groups
                    .into_iter()
                    .map(|(key, count)| (key, Value::Int(i64::try_from(count).unwrap()))),
            ),
        }
    }

    /// The distributed counterpart of this algebra. The returned job is a
    /// stateless value; one instance may run concurrently across hosts.
    pub fn map_reduce(self) -> Box<dyn MapReduce> {
        match self {
            Self::Count => Box::new(CountMapReduce),
            Self::Sum => Box::new(SumMapReduce),
            Self::GroupCount => Box::new(GroupCountMapReduce),
        }
    }
}

/// Blocks until the upstream is exhausted, folding every traverser into one
/// accumulator, then emits the frozen result exactly once.
///
/// An attached key traversal is applied to each incoming traverser first;
/// the derived value is what gets folded, scaled by the traverser's bulk.
/// In bypass mode the key traversal is still applied per traverser but no
/// folding happens: each derived traverser is re-emitted directly.
#[derive(Clone)]
pub struct ReducingBarrierStep {
    upstream: Box<dyn Step>,
    reducer: Reducer,
    key_traversal: Option<Traversal>,
    bypass: bool,
    done: bool,
}

impl ReducingBarrierStep {
    pub fn new(upstream: Box<dyn Step>, reducer: Reducer) -> Self {
        Self {
            upstream,
            reducer,
            key_traversal: None,
            bypass: false,
            done: false,
        }
    }

    pub fn group_count(upstream: Box<dyn Step>, key_traversal: Option<Traversal>) -> Self {
        Self {
            upstream,
            reducer: Reducer::GroupCount,
            key_traversal,
            bypass: false,
            done: false,
        }
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
    }

    pub fn reducer(&self) -> Reducer {
        self.reducer
    }

    /// Runs the fold to exhaustion and publishes the single result under
    /// the reducing memory key.
    pub fn run_to_memory(&mut self, memory: &mut Memory) -> Result<()> {
        if let Some(result) = self.next()? {
            memory.publish(REDUCING, result.into_value())?;
        }
        Ok(())
    }

    fn fold_all(&mut self) -> Result<Traverser> {
        let mut state = self.reducer.seed();
        while let Some(traverser) = self.upstream.next()? {
            let derived = apply_nullable(self.key_traversal.as_mut(), &traverser)?;
            self.reducer.fold(&mut state, &derived, traverser.bulk())?;
        }
        Ok(Traverser::new(self.reducer.finish(state)))
    }
}

impl Step for ReducingBarrierStep {
    fn next(&mut self) -> Result<Option<Traverser>> {
        if self.bypass {
            let Some(traverser) = self.upstream.next()? else {
                return Ok(None);
            };
            let derived = apply_nullable(self.key_traversal.as_mut(), &traverser)?;
            return Ok(Some(traverser.split(derived)));
        }
        if self.done {
            return Ok(None);
        }
        // On error the partial accumulator is dropped here, nothing is
        // published.
        let result = self.fold_all();
        self.done = true;
        result.map(Some)
    }

    fn add_start(&mut self, traverser: Traverser) {
        self.upstream.add_start(traverser);
    }

    fn reset(&mut self) {
        self.done = false;
        self.upstream.reset();
        if let Some(child) = &mut self.key_traversal {
            child.reset();
        }
    }

    fn requirements(&self) -> TraverserRequirements {
        let mut requirements = TraverserRequirements::OBJECT | TraverserRequirements::BULK;
        if let Some(child) = &self.key_traversal {
            requirements |= child.requirements();
        }
        requirements
    }

    fn clone_box(&self) -> Box<dyn Step> {
        Box::new(self.clone())
    }
}
