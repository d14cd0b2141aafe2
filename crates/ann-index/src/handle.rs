//! The index handle: lifecycle, configuration and the locked operations.

use std::path::PathBuf;
use std::sync::Arc;

use ann_core::{
    AnnError, DistanceType, EngineError, EngineErrorKind, ObjectId, ObjectType, Property, Result,
    SearchResult, StrictSearchResult,
};
use ann_engine::{GraphEngine, IndexEngine, IndexProperty, NativeIndex, ObjectSpace};
use byteorder::{ByteOrder, LittleEndian};
use parking_lot::RwLock;

use crate::errors::{CommitError, ErrorLog};

/// Where a handle is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Unopened,
    Opened,
    Closed,
}

/// The engine references of an open handle. Never shared between handles.
struct Native {
    index: Box<dyn NativeIndex>,
    object_space: Box<dyn ObjectSpace>,
}

struct HandleState {
    property: Property,
    native: Option<Native>,
    lifecycle: Lifecycle,
}

/// A handle on one on-disk ANN index.
///
/// Configure it with the `set_*` methods, [`open`](Self::open) it, then
/// insert, build, save and search. Mutating operations take the write lock;
/// searches, vector reads and saves share the read lock. Every failure is
/// returned to the caller and also appended to the handle's [`ErrorLog`].
///
/// ```no_run
/// use ann_index::{IndexHandle, ObjectType};
///
/// let index = IndexHandle::new("/var/lib/ann/items");
/// index.set_object_type(ObjectType::Float).set_dimension(6).open();
/// let id = index.insert(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0])?;
/// index.create_and_save_index(2)?;
/// let hits = index.search(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0], 1, 0.01)?;
/// assert_eq!(hits[0].id, id);
/// # Ok::<(), ann_index::AnnError>(())
/// ```
pub struct IndexHandle {
    engine: Arc<dyn IndexEngine>,
    state: RwLock<HandleState>,
    errors: ErrorLog,
}

impl IndexHandle {
    /// Handle with default parameters, backed by the graph engine.
    pub fn new(index_path: impl Into<String>) -> Self {
        Self::with_property(Property::new(index_path))
    }

    pub fn with_property(property: Property) -> Self {
        Self::with_property_and_engine(property, Arc::new(GraphEngine::new()))
    }

    pub fn with_engine(index_path: impl Into<String>, engine: Arc<dyn IndexEngine>) -> Self {
        Self::with_property_and_engine(Property::new(index_path), engine)
    }

    pub fn with_property_and_engine(property: Property, engine: Arc<dyn IndexEngine>) -> Self {
        Self {
            engine,
            state: RwLock::new(HandleState {
                property,
                native: None,
                lifecycle: Lifecycle::Unopened,
            }),
            errors: ErrorLog::new(),
        }
    }

    // -- Configuration --

    pub fn property(&self) -> Property {
        self.state.read().property.clone()
    }

    pub fn dimension(&self) -> usize {
        self.state.read().property.dimension
    }

    pub fn index_path(&self) -> String {
        self.state.read().property.index_path.clone()
    }

    pub fn set_index_path(&self, path: impl Into<String>) -> &Self {
        let path = path.into();
        if Property::is_valid_index_path(&path) {
            self.state.write().property.index_path = path;
        } else {
            tracing::debug!("ignoring empty index path");
        }
        self
    }

    pub fn set_dimension(&self, dimension: usize) -> &Self {
        if Property::is_valid_dimension(dimension) {
            self.state.write().property.dimension = dimension;
        } else {
            tracing::debug!(dimension, "ignoring invalid dimension");
        }
        self
    }

    pub fn set_creation_edge_size(&self, size: usize) -> &Self {
        if Property::is_valid_creation_edge_size(size) {
            self.state.write().property.creation_edge_size = size;
        } else {
            tracing::debug!(size, "ignoring invalid creation edge size");
        }
        self
    }

    pub fn set_search_edge_size(&self, size: usize) -> &Self {
        self.state.write().property.search_edge_size = size;
        self
    }

    pub fn set_object_type(&self, object_type: ObjectType) -> &Self {
        self.state.write().property.object_type = object_type;
        self
    }

    pub fn set_distance_type(&self, distance_type: DistanceType) -> &Self {
        self.state.write().property.distance_type = distance_type;
        self
    }

    pub fn set_bulk_insert_chunk_size(&self, size: usize) -> &Self {
        if Property::is_valid_bulk_insert_chunk_size(size) {
            self.state.write().property.bulk_insert_chunk_size = size;
        } else {
            tracing::debug!(size, "ignoring invalid bulk insert chunk size");
        }
        self
    }

    // -- Lifecycle --

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.read().lifecycle
    }

    pub fn is_open(&self) -> bool {
        self.state.read().native.is_some()
    }

    /// Open the index at the configured path, creating and saving a new one
    /// when nothing is persisted there yet. The dimension only has to be set
    /// for the create case; an existing index reports its own.
    ///
    /// Failures are only reported through [`errors`](Self::errors); use
    /// [`try_open`](Self::try_open) to get them directly.
    pub fn open(&self) -> &Self {
        let _ = self.try_open();
        self
    }

    pub fn try_open(&self) -> Result<()> {
        let mut state = self.state.write();
        if state.native.is_some() {
            tracing::debug!(path = %state.property.index_path, "index already open");
            return Ok(());
        }
        let result = self.open_locked(&mut state);
        self.track(result)
    }

    fn open_locked(&self, state: &mut HandleState) -> Result<()> {
        state.property.validate_for_open()?;
        let path = PathBuf::from(&state.property.index_path);
        let requested = IndexProperty::from(&state.property);

        let index = match self.engine.open(&path) {
            Ok(index) => index,
            Err(e) if e.is_missing_property_file() => {
                state.property.validate_for_create()?;
                tracing::info!(path = %path.display(), "no index found, creating a new one");
                let index = self.engine.create(&path, &requested)?;
                index.save(&path)?;
                index
            }
            Err(e) => return Err(e.into()),
        };

        let opened = index.property()?;
        let object_space = index.object_space()?;

        state.property.dimension = opened.dimension;
        state.property.object_type = opened.object_type;
        state.native = Some(Native { index, object_space });
        state.lifecycle = Lifecycle::Opened;
        tracing::info!(
            path = %path.display(),
            dimension = opened.dimension,
            object_type = %opened.object_type,
            "opened index"
        );
        Ok(())
    }

    /// Release the engine index. Unsaved insertions are not flushed.
    /// Calling it on a handle that is not open does nothing.
    pub fn close(&self) {
        let mut state = self.state.write();
        if let Some(native) = state.native.take() {
            let Native { index, object_space } = native;
            drop(object_space);
            index.close();
            state.lifecycle = Lifecycle::Closed;
            tracing::info!(path = %state.property.index_path, "closed index");
        }
    }

    // -- Errors --

    /// Every failure recorded so far, oldest first.
    pub fn errors(&self) -> Vec<AnnError> {
        self.errors.all_errors()
    }

    fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.errors.record(e.clone());
        }
        result
    }

    fn with_native<R>(&self, f: impl FnOnce(&Native, &Property) -> Result<R>) -> Result<R> {
        let state = self.state.read();
        let result = match state.native.as_ref() {
            Some(native) => f(native, &state.property),
            None => Err(AnnError::NotOpen),
        };
        drop(state);
        self.track(result)
    }

    fn with_native_mut<R>(
        &self,
        f: impl FnOnce(&mut Native, &Property) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.state.write();
        let HandleState { property, native, .. } = &mut *state;
        let result = match native.as_mut() {
            Some(native) => f(native, property),
            None => Err(AnnError::NotOpen),
        };
        drop(state);
        self.track(result)
    }

    // -- Insert family --

    /// Store a vector and return its engine id. The vector is not searchable
    /// until the index is rebuilt with [`create_index`](Self::create_index).
    pub fn strict_insert(&self, vector: &[f64]) -> Result<ObjectId> {
        self.with_native_mut(|native, _| Ok(native.index.insert(vector)?))
    }

    pub fn insert(&self, vector: &[f64]) -> Result<usize> {
        self.strict_insert(vector).map(|id| id as usize)
    }

    /// Insert, rebuild and save as one unit. Stops at the first failing step.
    pub fn insert_commit(
        &self,
        vector: &[f64],
        parallelism: usize,
    ) -> std::result::Result<usize, CommitError> {
        let id = self
            .insert(vector)
            .map_err(|source| CommitError { id: None, source })?;
        self.create_and_save_index(parallelism)
            .map_err(|source| CommitError { id: Some(id), source })?;
        Ok(id)
    }

    /// Insert every vector independently. Failed vectors are skipped and
    /// their errors collected; the returned sequences are not aligned.
    pub fn bulk_insert<V: AsRef<[f64]>>(&self, vectors: &[V]) -> (Vec<usize>, Vec<AnnError>) {
        let mut ids = Vec::with_capacity(vectors.len());
        let mut errs = Vec::new();
        for vector in vectors {
            match self.insert(vector.as_ref()) {
                Ok(id) => ids.push(id),
                Err(e) => errs.push(e),
            }
        }
        (ids, errs)
    }

    /// Like [`bulk_insert`](Self::bulk_insert), but rebuilds and saves the
    /// index after every `bulk_insert_chunk_size` successful inserts and once
    /// more for any remainder at the end.
    pub fn bulk_insert_commit<V: AsRef<[f64]>>(
        &self,
        vectors: &[V],
        parallelism: usize,
    ) -> (Vec<usize>, Vec<AnnError>) {
        let chunk_size = self.state.read().property.bulk_insert_chunk_size.max(1);
        let mut ids = Vec::with_capacity(vectors.len());
        let mut errs = Vec::new();
        let mut uncommitted = 0usize;

        for vector in vectors {
            match self.insert(vector.as_ref()) {
                Ok(id) => {
                    ids.push(id);
                    uncommitted += 1;
                    if uncommitted >= chunk_size {
                        if let Err(e) = self.create_and_save_index(parallelism) {
                            errs.push(e);
                        }
                        uncommitted = 0;
                    }
                }
                Err(e) => errs.push(e),
            }
        }

        if uncommitted > 0 {
            if let Err(e) = self.create_and_save_index(parallelism) {
                errs.push(e);
            }
        }
        tracing::debug!(inserted = ids.len(), failed = errs.len(), "bulk insert committed");
        (ids, errs)
    }

    /// Index every stored but unindexed vector. `parallelism` is a hint for
    /// the engine's construction workers.
    pub fn create_index(&self, parallelism: usize) -> Result<()> {
        self.with_native_mut(|native, _| Ok(native.index.build_index(parallelism)?))
    }

    /// Persist the index to the configured path.
    pub fn save_index(&self) -> Result<()> {
        self.with_native(|native, property| {
            let path = PathBuf::from(&property.index_path);
            Ok(native.index.save(&path)?)
        })
    }

    pub fn create_and_save_index(&self, parallelism: usize) -> Result<()> {
        self.create_index(parallelism)?;
        self.save_index()
    }

    // -- Queries --

    /// Up to `k` neighbors with engine-native widths. `radius < 0` disables
    /// the distance cutoff. A slot that failed carries its own error.
    pub fn strict_search(
        &self,
        vector: &[f64],
        k: usize,
        epsilon: f32,
        radius: f32,
    ) -> Result<Vec<StrictSearchResult>> {
        self.with_native(|native, _| {
            let slots = native.index.search(vector, k, epsilon, radius)?;
            Ok(slots
                .into_iter()
                .enumerate()
                .map(|(index, slot)| match slot {
                    Ok(n) if !n.is_empty_slot() => StrictSearchResult {
                        id: n.id,
                        distance: n.distance,
                        error: None,
                    },
                    Ok(_) => StrictSearchResult {
                        id: 0,
                        distance: 0.0,
                        error: Some(AnnError::PerResult {
                            index,
                            message: "engine returned an empty result slot".into(),
                        }),
                    },
                    Err(e) => StrictSearchResult {
                        id: 0,
                        distance: 0.0,
                        error: Some(AnnError::PerResult { index, message: e.message }),
                    },
                })
                .collect())
        })
    }

    /// Up to `k` neighbors; failed slots are dropped.
    pub fn search(&self, vector: &[f64], k: usize, epsilon: f32) -> Result<Vec<SearchResult>> {
        let results = self.strict_search(vector, k, epsilon, -1.0)?;
        Ok(results
            .iter()
            .filter(|r| r.is_ok())
            .map(SearchResult::from)
            .collect())
    }

    /// Stored components of an object, decoded by the index object type.
    pub fn get_strict_vector(&self, id: ObjectId) -> Result<Vec<f32>> {
        self.with_native(|native, property| {
            let dim = property.dimension;
            match property.object_type {
                ObjectType::Float => {
                    let raw = native.object_space.object_as_float(id)?;
                    if raw.len() < dim * 4 {
                        return Err(short_object(id, raw.len()).into());
                    }
                    let mut out = vec![0f32; dim];
                    LittleEndian::read_f32_into(&raw[..dim * 4], &mut out);
                    Ok(out)
                }
                ObjectType::Uint8 => {
                    let raw = native.object_space.object_as_integer(id)?;
                    if raw.len() < dim {
                        return Err(short_object(id, raw.len()).into());
                    }
                    Ok(raw[..dim].iter().map(|&b| f32::from(b)).collect())
                }
                other => Err(AnnError::UnsupportedObjectType(other.to_string())),
            }
        })
    }

    pub fn get_vector(&self, id: usize) -> Result<Vec<f64>> {
        let id = self.track(to_object_id(id))?;
        let v = self.get_strict_vector(id)?;
        Ok(v.into_iter().map(f64::from).collect())
    }

    // -- Deletion --

    pub fn strict_remove(&self, id: ObjectId) -> Result<()> {
        self.with_native_mut(|native, _| Ok(native.index.remove(id)?))
    }

    pub fn remove(&self, id: usize) -> Result<()> {
        let id = self.track(to_object_id(id))?;
        self.strict_remove(id)
    }
}

impl Drop for IndexHandle {
    fn drop(&mut self) {
        self.close();
    }
}

fn to_object_id(id: usize) -> Result<ObjectId> {
    ObjectId::try_from(id).map_err(|_| {
        AnnError::Engine(EngineError::new(
            EngineErrorKind::ObjectNotFound,
            format!("object id {} is out of range", id),
        ))
    })
}

fn short_object(id: ObjectId, len: usize) -> EngineError {
    EngineError::new(
        EngineErrorKind::Corrupted,
        format!("object {} has only {} bytes", id, len),
    )
}
