// Copyright © 2025 Wayfarer

use std::any::Any;
use std::error;
use std::result;

use arcstr::ArcStr;

use super::Value;

#[allow(clippy::module_name_repetitions)]
pub type DynError = Box<dyn error::Error + Send + Sync>;
pub type DynResult<T> = result::Result<T, DynError>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("traverser bulk must be at least 1")]
    ZeroBulk,

    #[error("child traversal produced no result for {0:?}")]
    EmptyChildTraversal(Value),

    #[error("type mismatch: expected {expected}, got {value:?}")]
    TypeMismatch {
        expected: &'static str,
        value: Value,
    },

    #[error("duplicate memory key: {0}")]
    DuplicateMemoryKey(ArcStr),

    #[error("memory key missing: {0}")]
    MemoryKeyMissing(ArcStr),

    #[error("can't run with no workers")]
    NeedsWorkers,

    #[error("can't run with no partitions")]
    NeedsPartitions,

    #[error("invalid partition {0}")]
    InvalidPartition(usize),

    #[error("worker panic: {0}")]
    WorkerPanic(String),

    #[error(transparent)]
    Other(DynError),
}

impl Error {
    pub fn from_panic_payload(panic_payload: Box<dyn Any + Send + 'static>) -> Self {
        let message = match panic_payload.downcast::<&'static str>() {
            Ok(message) => message.to_string(),
            Err(panic_payload) => match panic_payload.downcast::<String>() {
                Ok(message) => *message,
                Err(panic_payload) => format!("{panic_payload:?}"),
            },
        };
        Self::WorkerPanic(message)
    }
}

impl From<DynError> for Error {
    fn from(value: DynError) -> Self {
        match value.downcast::<Self>() {
            Ok(this) => *this,
            Err(other) => Self::Other(other),
        }
    }
}

pub type Result<T, E = Error> = result::Result<T, E>;
