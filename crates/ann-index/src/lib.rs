//! Concurrency-safe handle around an on-disk approximate nearest neighbor index.
//!
//! [`IndexHandle`] owns the engine index, guards it with a reader/writer lock
//! and keeps an [`ErrorLog`] of every failure next to the direct results.
//! [`global`] offers a lazily created process-wide handle for single-index
//! programs.

pub mod errors;
pub mod global;
pub mod handle;

pub use ann_core::config::{DEFAULT_EPSILON, DEFAULT_POOL_SIZE};
pub use ann_core::{
    AnnError, DistanceType, EngineError, EngineErrorKind, ObjectId, ObjectType, Property, Result,
    SearchResult, StrictSearchResult,
};
pub use ann_engine::{GraphEngine, IndexEngine, IndexProperty, NativeIndex, ObjectSpace, SearchSlot};
pub use errors::{CommitError, ErrorLog};
pub use handle::{IndexHandle, Lifecycle};
