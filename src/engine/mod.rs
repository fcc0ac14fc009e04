pub mod error;
pub use self::error::{DynError, DynResult, Error, Result};

pub mod value;
pub use self::value::{Key, KeyImpl, Value};

pub mod traverser;
pub use self::traverser::{SideEffects, Traverser, TraverserRequirements, TraverserSet};

pub mod step;
pub use self::step::{apply_nullable, InjectStep, MapStep, Mapper, Step, Traversal};

pub mod reduce;
pub use self::reduce::{Accumulator, Reducer, ReducingBarrierStep, SumState};

pub mod mapreduce;
pub use self::mapreduce::{
    CountMapReduce, Emitter, GroupCountMapReduce, MapReduce, Stage, SumMapReduce,
};

pub mod compute;
pub use self::compute::{run_map_reduce, Config, HaltedStore, VertexState};

pub mod memory;
pub use self::memory::{Memory, REDUCING};
