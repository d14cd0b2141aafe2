use std::path::Path;

use ann_core::{EngineError, Neighbor, ObjectId};

use crate::property::IndexProperty;

/// Outcome of one search slot. A slot can fail while the search succeeds.
pub type SearchSlot = Result<Neighbor, EngineError>;

/// Entry point of an index engine: opens persisted indexes or creates new ones.
pub trait IndexEngine: Send + Sync {
    /// Open the index persisted at `path`.
    ///
    /// Must fail with [`ann_core::EngineErrorKind::PropertyFileMissing`] (or a
    /// message containing the missing-property-file signature) when nothing
    /// has been saved at `path` yet.
    fn open(&self, path: &Path) -> Result<Box<dyn NativeIndex>, EngineError>;

    /// Create an empty index for `path`. Nothing is written until `save`.
    fn create(
        &self,
        path: &Path,
        property: &IndexProperty,
    ) -> Result<Box<dyn NativeIndex>, EngineError>;
}

/// An open index. Mutating calls take `&mut self`; callers serialize them.
pub trait NativeIndex: Send + Sync {
    fn property(&self) -> Result<IndexProperty, EngineError>;

    /// Handle to the raw stored objects.
    fn object_space(&self) -> Result<Box<dyn ObjectSpace>, EngineError>;

    /// Store an object without indexing it.
    fn insert(&mut self, vector: &[f64]) -> Result<ObjectId, EngineError>;

    /// Up to `k` neighbors. `radius < 0` disables the distance cutoff.
    fn search(
        &self,
        query: &[f64],
        k: usize,
        epsilon: f32,
        radius: f32,
    ) -> Result<Vec<SearchSlot>, EngineError>;

    fn remove(&mut self, id: ObjectId) -> Result<(), EngineError>;

    /// Index every stored but unindexed object.
    fn build_index(&mut self, parallelism: usize) -> Result<(), EngineError>;

    fn save(&self, path: &Path) -> Result<(), EngineError>;

    /// Release the index.
    fn close(self: Box<Self>) {}
}

/// Read access to stored objects as raw little-endian component bytes.
pub trait ObjectSpace: Send + Sync {
    fn object_as_float(&self, id: ObjectId) -> Result<Vec<u8>, EngineError>;
    fn object_as_integer(&self, id: ObjectId) -> Result<Vec<u8>, EngineError>;
}
