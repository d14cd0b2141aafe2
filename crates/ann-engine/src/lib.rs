//! Index engine boundary and the pure-Rust graph engine behind it.
//!
//! The handle layer only talks to [`IndexEngine`], [`NativeIndex`] and
//! [`ObjectSpace`]; [`GraphEngine`] is the implementation used by default.

pub mod distance;
pub mod graph;
pub mod property;
pub mod store;
pub mod traits;

pub use ann_core::{EngineError, EngineErrorKind};
pub use graph::{GraphEngine, GraphIndex};
pub use property::IndexProperty;
pub use traits::{IndexEngine, NativeIndex, ObjectSpace, SearchSlot};
