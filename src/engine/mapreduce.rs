// Copyright © 2025 Wayfarer

use super::compute::VertexState;
use super::error::{Error, Result};
use super::memory::REDUCING;
use super::reduce::SumState;
use super::Value;

/// Distributed execution phases of an aggregation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Map,
    Combine,
    Reduce,
}

/// The only channel from a job callback back to the host. Duplicate
/// emissions for one key are always legal, the reduce stage re-sums.
pub trait Emitter {
    fn emit(&mut self, key: Value, value: Value);
}

impl Emitter for Vec<(Value, Value)> {
    fn emit(&mut self, key: Value, value: Value) {
        self.push((key, value));
    }
}

/// The distributed counterpart of a reducing barrier step, executed by a
/// bulk-synchronous host as MAP → COMBINE (zero or more local passes) →
/// REDUCE → FINALIZE.
///
/// Implementations are stateless beyond pure configuration, so a single job
/// value can run concurrently across partitions and hosts. Errors raise
/// through the callback boundary and abort the job; nothing partial is ever
/// published.
pub trait MapReduce: Send + Sync {
    /// Whether the job participates in the given stage. A fully
    /// associative/commutative job participates in all three and reuses one
    /// implementation for combine and reduce.
    fn do_stage(&self, stage: Stage) -> bool;

    /// Reads the halted-traverser state at one vertex and emits key/value
    /// pairs. Keys need not be unique per emission.
    fn map(&self, vertex: &VertexState, emitter: &mut dyn Emitter) -> Result<()>;

    /// Local pre-aggregation before the network shuffle. Safe to skip or to
    /// run any number of times; correctness never depends on it.
    fn combine(
        &self,
        key: &Value,
        values: &mut dyn Iterator<Item = Value>,
        emitter: &mut dyn Emitter,
    ) -> Result<()> {
        self.reduce(key, values, emitter)
    }

    /// Global aggregation of all values for a key across partitions.
    fn reduce(
        &self,
        key: &Value,
        values: &mut dyn Iterator<Item = Value>,
        emitter: &mut dyn Emitter,
    ) -> Result<()>;

    /// Materializes the published result; keys are unique in the output
    /// even when duplicated across upstream emissions.
    fn finalize(&self, key_values: &mut dyn Iterator<Item = (Value, Value)>) -> Result<Value>;

    fn memory_key(&self) -> &'static str {
        REDUCING
    }
}

impl<T: MapReduce + ?Sized> MapReduce for Box<T> {
    fn do_stage(&self, stage: Stage) -> bool {
        (**self).do_stage(stage)
    }

    fn map(&self, vertex: &VertexState, emitter: &mut dyn Emitter) -> Result<()> {
        (**self).map(vertex, emitter)
    }

    fn combine(
        &self,
        key: &Value,
        values: &mut dyn Iterator<Item = Value>,
        emitter: &mut dyn Emitter,
    ) -> Result<()> {
        (**self).combine(key, values, emitter)
    }

    fn reduce(
        &self,
        key: &Value,
        values: &mut dyn Iterator<Item = Value>,
        emitter: &mut dyn Emitter,
    ) -> Result<()> {
        (**self).reduce(key, values, emitter)
    }

    fn finalize(&self, key_values: &mut dyn Iterator<Item = (Value, Value)>) -> Result<Value> {
        (**self).finalize(key_values)
    }

    fn memory_key(&self) -> &'static str {
        (**self).memory_key()
    }
}

fn expect_int(value: &Value) -> Result<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        other => Err(Error::TypeMismatch {
            expected: "int",
            value: other.clone(),
        }),
    }
}

fn bulk_value(bulk: u64) -> Value {
    Value::Int(i64::try_from(bulk).unwrap())
}

/// Distributed form of the group-count algebra: one `(value, bulk)` pair
/// per halted traverser, summed per key.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupCountMapReduce;

impl MapReduce for GroupCountMapReduce {
    fn do_stage(&self, _stage: Stage) -> bool {
        true
    }

    fn map(&self, vertex: &VertexState, emitter: &mut dyn Emitter) -> Result<()> {
        for traverser in vertex.halted().iter() {
            emitter.emit(traverser.value().clone(), bulk_value(traverser.bulk()));
        }
        Ok(())
    }

    fn reduce(
        &self,
        key: &Value,
        values: &mut dyn Iterator<Item = Value>,
        emitter: &mut dyn Emitter,
    ) -> Result<()> {
        let mut counter = 0;
        for value in values {
            counter += expect_int(&value)?;
        }
        emitter.emit(key.clone(), Value::Int(counter));
        Ok(())
    }

    fn finalize(&self, key_values: &mut dyn Iterator<Item = (Value, Value)>) -> Result<Value> {
        Ok(Value::from_mapping(key_values))
    }
}

/// Distributed form of the count algebra: every halted traverser
/// contributes its bulk under a single constant key.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountMapReduce;

impl MapReduce for CountMapReduce {
    fn do_stage(&self, _stage: Stage) -> bool {
        true
    }

    fn map(&self, vertex: &VertexState, emitter: &mut dyn Emitter) -> Result<()> {
        for traverser in vertex.halted().iter() {
            emitter.emit(Value::None, bulk_value(traverser.bulk()));
        }
        Ok(())
    }

    fn reduce(
        &self,
        key: &Value,
        values: &mut dyn Iterator<Item = Value>,
        emitter: &mut dyn Emitter,
    ) -> Result<()> {
        let mut counter = 0;
        for value in values {
            counter += expect_int(&value)?;
        }
        emitter.emit(key.clone(), Value::Int(counter));
        Ok(())
    }

    fn finalize(&self, key_values: &mut dyn Iterator<Item = (Value, Value)>) -> Result<Value> {
        let mut total = 0;
        for (_key, value) in key_values {
            total += expect_int(&value)?;
        }
        Ok(Value::Int(total))
    }
}

/// Distributed form of the sum algebra, reusing [`SumState`] at every
/// granularity: bulk-scaled at map, plain resummation at combine, reduce
/// and finalize.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumMapReduce;

impl MapReduce for SumMapReduce {
    fn do_stage(&self, _stage: Stage) -> bool {
        true
    }

    fn map(&self, vertex: &VertexState, emitter: &mut dyn Emitter) -> Result<()> {
        for traverser in vertex.halted().iter() {
            let mut sum = SumState::default();
            sum.add(traverser.value(), traverser.bulk())?;
            emitter.emit(Value::None, sum.finish());
        }
        Ok(())
    }

    fn reduce(
        &self,
        key: &Value,
        values: &mut dyn Iterator<Item = Value>,
        emitter: &mut dyn Emitter,
    ) -> Result<()> {
        let mut sum = SumState::default();
        for value in values {
            sum.add(&value, 1)?;
        }
        emitter.emit(key.clone(), sum.finish());
        Ok(())
    }

    fn finalize(&self, key_values: &mut dyn Iterator<Item = (Value, Value)>) -> Result<Value> {
        let mut sum = SumState::default();
        for (_key, value) in key_values {
            sum.add(&value, 1)?;
        }
        Ok(sum.finish())
    }
}
