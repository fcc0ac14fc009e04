// Copyright © 2025 Wayfarer

use std::collections::HashMap;

use arcstr::ArcStr;

use super::error::{Error, Result};
use super::Value;

/// Memory key class under which reducing barriers and their distributed
/// counterparts publish, so downstream consumers cannot tell which
/// execution model produced the result.
pub const REDUCING: &str = "reducing";

/// Execution-scoped keyed store for published aggregates. Each key is
/// written exactly once per execution.
#[derive(Debug, Default)]
pub struct Memory {
    values: HashMap<ArcStr, Value>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, key: &str, value: Value) -> Result<()> {
        if self.values.contains_key(key) {
            return Err(Error::DuplicateMemoryKey(key.into()));
        }
        self.values.insert(key.into(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn extract(&self, key: &str) -> Result<&Value> {
        self.get(key)
            .ok_or_else(|| Error::MemoryKeyMissing(key.into()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
