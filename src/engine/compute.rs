// Copyright © 2025 Wayfarer

use std::collections::HashMap;
use std::thread;

use crossbeam_channel::unbounded;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use super::mapreduce::{MapReduce, Stage};
use super::memory::Memory;
use super::{Key, Traverser, TraverserSet, Value};

const MAX_WORKERS: usize = if cfg!(feature = "unlimited-workers") {
    usize::MAX
} else {
    8
};

/// Worker-pool configuration for a map/reduce run.
#[derive(Clone, Debug)]
pub struct Config {
    workers: usize,
    combine: bool,
}

impl Config {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(Error::NeedsWorkers);
        }
        Ok(Self {
            workers: workers.min(MAX_WORKERS),
            combine: true,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Toggles the local combine pass. Job correctness never depends on it,
    /// disabling only increases shuffle traffic.
    #[must_use]
    pub fn with_combine(mut self, combine: bool) -> Self {
        self.combine = combine;
        self
    }
}

/// The halted-traverser state stored at one vertex by the upstream
/// distributed computation; read-only during the MAP stage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VertexState {
    vertex: Key,
    halted: TraverserSet,
}

impl VertexState {
    pub fn new(vertex: Key) -> Self {
        Self {
            vertex,
            halted: TraverserSet::new(),
        }
    }

    pub fn vertex(&self) -> Key {
        self.vertex
    }

    pub fn halted(&self) -> &TraverserSet {
        &self.halted
    }

    pub fn halt(&mut self, traverser: Traverser) {
        self.halted.add(traverser);
    }
}

/// Partitioned in-memory store of per-vertex halted-traverser state, one
/// shard of vertices per partition.
#[derive(Debug, Default)]
pub struct HaltedStore {
    partitions: Vec<HashMap<Key, VertexState>>,
}

impl HaltedStore {
    pub fn new(partitions: usize) -> Result<Self> {
        if partitions == 0 {
            return Err(Error::NeedsPartitions);
        }
        Ok(Self {
            partitions: (0..partitions).map(|_| HashMap::new()).collect(),
        })
    }

    pub fn partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Stores a halted traverser at the vertex's key-sharded partition.
    pub fn halt(&mut self, vertex: Key, traverser: Traverser) {
        let partition = vertex.shard(self.partitions.len());
        self.partitions[partition]
            .entry(vertex)
            .or_insert_with(|| VertexState::new(vertex))
            .halt(traverser);
    }

    /// Stores a halted traverser at an explicitly chosen partition.
    pub fn halt_in(&mut self, partition: usize, vertex: Key, traverser: Traverser) -> Result<()> {
        self.partitions
            .get_mut(partition)
            .ok_or(Error::InvalidPartition(partition))?
            .entry(vertex)
            .or_insert_with(|| VertexState::new(vertex))
            .halt(traverser);
        Ok(())
    }

    pub fn vertices(&self, partition: usize) -> Result<impl Iterator<Item = &VertexState>> {
        self.partitions
            .get(partition)
            .map(HashMap::values)
            .ok_or(Error::InvalidPartition(partition))
    }

    pub fn total_bulk(&self) -> u64 {
        self.partitions
            .iter()
            .flat_map(HashMap::values)
            .map(|vertex| vertex.halted().total_bulk())
            .sum()
    }
}

fn combine_locally(
    job: &dyn MapReduce,
    pairs: Vec<(Value, Value)>,
) -> Result<Vec<(Value, Value)>> {
    let mut groups: HashMap<Value, Vec<Value>> = HashMap::new();
    for (key, value) in pairs {
        groups.entry(key).or_default().push(value);
    }
    let mut combined = Vec::new();
    for (key, values) in groups {
        job.combine(&key, &mut values.into_iter(), &mut combined)?;
    }
    Ok(combined)
}

/// Runs one map/reduce job over a partitioned store and publishes the
/// result into `memory` under the job's memory key.
///
/// MAP runs one partition at a time across at most `config.workers()`
/// worker threads; COMBINE runs locally on each partition's output before
/// the shuffle; REDUCE groups by key in unspecified order. A worker panic
/// surfaces as [`Error::WorkerPanic`]; any callback error aborts the job
/// before anything is published.
pub fn run_map_reduce(
    job: &dyn MapReduce,
    store: &HaltedStore,
    config: &Config,
    memory: &mut Memory,
) -> Result<Value> {
    info!(
        "starting map/reduce job over {} partitions",
        store.partitions()
    );
    let workers = config.workers().min(store.partitions()).max(1);
    let (sender, receiver) = unbounded();
    thread::scope(|scope| -> Result<()> {
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let sender = sender.clone();
            handles.push(scope.spawn(move || -> Result<()> {
                for partition in (worker..store.partitions()).step_by(workers) {
                    let mut pairs = Vec::new();
                    for vertex in store.vertices(partition)? {
                        job.map(vertex, &mut pairs)?;
                    }
                    if config.combine && job.do_stage(Stage::Combine) {
                        pairs = combine_locally(job, pairs)?;
                    }
                    debug!("partition {partition} emitted {} pairs", pairs.len());
                    sender.send(pairs).unwrap();
                }
                Ok(())
            }));
        }
        drop(sender);
        let mut outcome = Ok(());
        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    if outcome.is_ok() {
                        outcome = Err(error);
                    }
                }
                Err(payload) => {
                    if outcome.is_ok() {
                        outcome = Err(Error::from_panic_payload(payload));
                    }
                }
            }
        }
        outcome
    })?;

    // The shuffle: group partial pairs by key. Iteration order of the
    // groups is unspecified, the merge algebra must not depend on it.
    let mut groups: HashMap<Value, Vec<Value>> = HashMap::new();
    for pairs in receiver.iter() {
        for (key, value) in pairs {
            groups.entry(key).or_default().push(value);
        }
    }

    let mut reduced = Vec::new();
    if job.do_stage(Stage::Reduce) {
        for (key, values) in groups {
            job.reduce(&key, &mut values.into_iter(), &mut reduced)?;
        }
    } else {
        for (key, values) in groups {
            for value in values {
                reduced.push((key.clone(), value));
            }
        }
    }
    debug!("reduce produced {} keys", reduced.len());

    let result = job.finalize(&mut reduced.into_iter())?;
    memory.publish(job.memory_key(), result.clone())?;
    Ok(result)
}
