// Copyright © 2025 Wayfarer

use std::collections::VecDeque;
use std::sync::Arc;

use super::error::{DynResult, Error, Result};
use super::{Traverser, TraverserRequirements, Value};

/// One stage of a traversal pipeline. Each step pulls traversers from the
/// upstream step it owns; ownership is strictly tree-shaped, so cloning a
/// step deep-copies the whole chain and shares no mutable state with the
/// original.
pub trait Step: Send {
    /// Pulls the next traverser, `None` on upstream exhaustion.
    fn next(&mut self) -> Result<Option<Traverser>>;

    /// Feeds a traverser into the source buffer at the root of the chain.
    fn add_start(&mut self, traverser: Traverser);

    /// Clears buffered traversers and any accumulated state.
    fn reset(&mut self);

    fn requirements(&self) -> TraverserRequirements;

    fn clone_box(&self) -> Box<dyn Step>;
}

impl Clone for Box<dyn Step> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Pipeline source: emits injected values as traversers with bulk 1.
#[derive(Clone, Default)]
pub struct InjectStep {
    starts: VecDeque<Traverser>,
}

impl InjectStep {
    pub fn new(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            starts: values.into_iter().map(Traverser::new).collect(),
        }
    }

    pub fn with_traversers(traversers: impl IntoIterator<Item = Traverser>) -> Self {
        Self {
            starts: traversers.into_iter().collect(),
        }
    }
}

impl Step for InjectStep {
    fn next(&mut self) -> Result<Option<Traverser>> {
        Ok(self.starts.pop_front())
    }

    fn add_start(&mut self, traverser: Traverser) {
        self.starts.push_back(traverser);
    }

    fn reset(&mut self) {
        self.starts.clear();
    }

    fn requirements(&self) -> TraverserRequirements {
        TraverserRequirements::OBJECT
    }

    fn clone_box(&self) -> Box<dyn Step> {
        Box::new(self.clone())
    }
}

/// A pure value transform shared between step clones.
pub type Mapper = Arc<dyn Fn(&Value) -> DynResult<Value> + Send + Sync>;

/// Applies a mapper to every traverser's value, preserving bulk and side
/// effects.
#[derive(Clone)]
pub struct MapStep {
    upstream: Box<dyn Step>,
    mapper: Mapper,
}

impl MapStep {
    pub fn new(upstream: Box<dyn Step>, mapper: Mapper) -> Self {
        Self { upstream, mapper }
    }
}

impl Step for MapStep {
    fn next(&mut self) -> Result<Option<Traverser>> {
        let Some(traverser) = self.upstream.next()? else {
            return Ok(None);
        };
        let mapped = (self.mapper)(traverser.value()).map_err(Error::from)?;
        Ok(Some(traverser.split(mapped)))
    }

    fn add_start(&mut self, traverser: Traverser) {
        self.upstream.add_start(traverser);
    }

    fn reset(&mut self) {
        self.upstream.reset();
    }

    fn requirements(&self) -> TraverserRequirements {
        self.upstream.requirements() | TraverserRequirements::OBJECT
    }

    fn clone_box(&self) -> Box<dyn Step> {
        Box::new(self.clone())
    }
}

/// A step chain usable as a pipeline of its own or as a local child
/// traversal evaluated once per parent traverser.
#[derive(Clone)]
pub struct Traversal {
    end: Box<dyn Step>,
}

impl Traversal {
    pub fn new(end: Box<dyn Step>) -> Self {
        Self { end }
    }

    pub fn inject(values: impl IntoIterator<Item = Value>) -> Self {
        Self::new(Box::new(InjectStep::new(values)))
    }

    pub fn empty() -> Self {
        Self::new(Box::new(InjectStep::default()))
    }

    /// Extends the chain with a [`MapStep`].
    #[must_use]
    pub fn mapped(self, mapper: Mapper) -> Self {
        Self::new(Box::new(MapStep::new(self.end, mapper)))
    }

    pub fn add_start(&mut self, traverser: Traverser) {
        self.end.add_start(traverser);
    }

    pub fn next(&mut self) -> Result<Option<Traverser>> {
        self.end.next()
    }

    pub fn reset(&mut self) {
        self.end.reset();
    }

    pub fn requirements(&self) -> TraverserRequirements {
        self.end.requirements()
    }

    /// Evaluates the traversal for one parent traverser and returns the
    /// derived value. The traverser is fed in unmodified even when its
    /// current value is `None`; a traversal yielding no result is an error.
    pub fn apply(&mut self, traverser: &Traverser) -> Result<Value> {
        self.end.reset();
        self.end.add_start(traverser.clone());
        match self.end.next()? {
            Some(derived) => Ok(derived.into_value()),
            None => Err(Error::EmptyChildTraversal(traverser.value().clone())),
        }
    }
}

/// Applies an optional child traversal to a traverser. Without a child the
/// traverser's own value is the derived value.
pub fn apply_nullable(child: Option<&mut Traversal>, traverser: &Traverser) -> Result<Value> {
    match child {
        Some(traversal) => traversal.apply(traverser),
        None => Ok(traverser.value().clone()),
    }
}
