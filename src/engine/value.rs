// Copyright © 2025 Wayfarer

use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use arcstr::ArcStr;
use itertools::Itertools as _;
use ordered_float::OrderedFloat;
use rand::Rng as _;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3 as Hasher;

const BASE32_ALPHABET: base32::Alphabet = base32::Alphabet::Crockford;

pub type KeyImpl = u128;

pub const SHARD_MASK: KeyImpl = (1 << 16) - 1;

/// Content-hashed identifier of a graph element.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key(pub KeyImpl);

impl Key {
    pub(crate) fn from_hasher(hasher: &Hasher) -> Self {
        Self(hasher.digest128())
    }

    pub fn for_value(value: &Value) -> Self {
        let mut hasher = Hasher::default();
        value.hash_into(&mut hasher);
        Self::from_hasher(&hasher)
    }

    pub fn random() -> Self {
        Self(rand::rng().random())
    }

    /// The partition this key belongs to, decided by its low bits.
    #[allow(clippy::cast_possible_truncation)]
    pub fn shard(self, shards: usize) -> usize {
        ((self.0 & SHARD_MASK) as usize) % shards.max(1)
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let encoded = base32::encode(BASE32_ALPHABET, &self.0.to_le_bytes());
        write!(f, "^{encoded}")
    }
}

impl Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// The closed set of values a traverser can carry.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Pointer(Key),
    String(ArcStr),
    Tuple(Arc<[Self]>),
}

impl Value {
    /// Freezes a key/value mapping into its canonical form: a tuple of
    /// `(key, value)` pairs sorted by key, so that equal mappings compare
    /// equal regardless of the order they were produced in. Duplicate keys
    /// collapse, last emission wins.
    pub fn from_mapping(pairs: impl IntoIterator<Item = (Self, Self)>) -> Self {
        let deduped: HashMap<Self, Self> = pairs.into_iter().collect();
        Self::Tuple(
            deduped
                .into_iter()
                .sorted()
                .map(|(key, value)| Self::Tuple(vec![key, value].into()))
                .collect(),
        )
    }

    pub(crate) fn hash_into(&self, hasher: &mut Hasher) {
        match self {
            Self::None => hasher.update(&[0]),
            Self::Bool(b) => hasher.update(&[1, u8::from(*b)]),
            Self::Int(i) => {
                hasher.update(&[2]);
                hasher.update(&i.to_le_bytes());
            }
            Self::Float(OrderedFloat(f)) => {
                hasher.update(&[3]);
                hasher.update(&f.to_le_bytes());
            }
            Self::Pointer(key) => {
                hasher.update(&[4]);
                hasher.update(&key.0.to_le_bytes());
            }
            Self::String(s) => {
                hasher.update(&[5]);
                hasher.update(&(s.len() as u64).to_le_bytes());
                hasher.update(s.as_bytes());
            }
            Self::Tuple(values) => {
                hasher.update(&[6]);
                hasher.update(&(values.len() as u64).to_le_bytes());
                for value in values.iter() {
                    value.hash_into(hasher);
                }
            }
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(OrderedFloat(float)) => write!(f, "{float}"),
            Self::Pointer(key) => write!(f, "{key}"),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Tuple(values) => write!(f, "({})", values.iter().format(", ")),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(OrderedFloat(f))
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        Self::Pointer(key)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<ArcStr> for Value {
    fn from(s: ArcStr) -> Self {
        Self::String(s)
    }
}
