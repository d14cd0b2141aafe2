//! Process-wide default handle and free functions that forward to it.
//!
//! Meant for programs that work with a single index. The handle's own
//! operations stay individually locked, but configuring it from several
//! threads at once can interleave: set it up from one place before sharing.

use std::sync::OnceLock;

use ann_core::{
    AnnError, DistanceType, ObjectId, ObjectType, Result, SearchResult, StrictSearchResult,
};

use crate::errors::CommitError;
use crate::handle::IndexHandle;

static DEFAULT_HANDLE: OnceLock<IndexHandle> = OnceLock::new();

/// The default handle, created on first use at [`default_index_path`].
pub fn get() -> &'static IndexHandle {
    DEFAULT_HANDLE.get_or_init(|| {
        let path = default_index_path();
        tracing::debug!(path = %path, "creating default index handle");
        IndexHandle::new(path)
    })
}

/// `<temp dir>/ann-<RFC 3339 timestamp>`.
pub fn default_index_path() -> String {
    let name = format!("ann-{}", chrono::Local::now().to_rfc3339());
    std::env::temp_dir().join(name).to_string_lossy().into_owned()
}

pub fn dimension() -> usize {
    get().dimension()
}

pub fn index_path() -> String {
    get().index_path()
}

pub fn set_index_path(path: impl Into<String>) -> &'static IndexHandle {
    get().set_index_path(path)
}

pub fn set_dimension(dimension: usize) -> &'static IndexHandle {
    get().set_dimension(dimension)
}

pub fn set_creation_edge_size(size: usize) -> &'static IndexHandle {
    get().set_creation_edge_size(size)
}

pub fn set_search_edge_size(size: usize) -> &'static IndexHandle {
    get().set_search_edge_size(size)
}

pub fn set_object_type(object_type: ObjectType) -> &'static IndexHandle {
    get().set_object_type(object_type)
}

pub fn set_distance_type(distance_type: DistanceType) -> &'static IndexHandle {
    get().set_distance_type(distance_type)
}

pub fn set_bulk_insert_chunk_size(size: usize) -> &'static IndexHandle {
    get().set_bulk_insert_chunk_size(size)
}

pub fn open() -> &'static IndexHandle {
    get().open()
}

pub fn strict_search(
    vector: &[f64],
    k: usize,
    epsilon: f32,
    radius: f32,
) -> Result<Vec<StrictSearchResult>> {
    get().strict_search(vector, k, epsilon, radius)
}

pub fn search(vector: &[f64], k: usize, epsilon: f32) -> Result<Vec<SearchResult>> {
    get().search(vector, k, epsilon)
}

pub fn strict_insert(vector: &[f64]) -> Result<ObjectId> {
    get().strict_insert(vector)
}

pub fn insert(vector: &[f64]) -> Result<usize> {
    get().insert(vector)
}

pub fn insert_commit(vector: &[f64], parallelism: usize) -> std::result::Result<usize, CommitError> {
    get().insert_commit(vector, parallelism)
}

pub fn bulk_insert<V: AsRef<[f64]>>(vectors: &[V]) -> (Vec<usize>, Vec<AnnError>) {
    get().bulk_insert(vectors)
}

pub fn bulk_insert_commit<V: AsRef<[f64]>>(
    vectors: &[V],
    parallelism: usize,
) -> (Vec<usize>, Vec<AnnError>) {
    get().bulk_insert_commit(vectors, parallelism)
}

pub fn create_and_save_index(parallelism: usize) -> Result<()> {
    get().create_and_save_index(parallelism)
}

pub fn create_index(parallelism: usize) -> Result<()> {
    get().create_index(parallelism)
}

pub fn save_index() -> Result<()> {
    get().save_index()
}

pub fn strict_remove(id: ObjectId) -> Result<()> {
    get().strict_remove(id)
}

pub fn remove(id: usize) -> Result<()> {
    get().remove(id)
}

pub fn get_strict_vector(id: ObjectId) -> Result<Vec<f32>> {
    get().get_strict_vector(id)
}

pub fn get_vector(id: usize) -> Result<Vec<f64>> {
    get().get_vector(id)
}

/// Close the default handle if it was ever created.
pub fn close() {
    if let Some(handle) = DEFAULT_HANDLE.get() {
        handle.close();
    }
}

pub fn errors() -> Vec<AnnError> {
    get().errors()
}
