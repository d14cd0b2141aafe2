//! Reference engine: an object store plus a single-layer neighborhood graph,
//! persisted as an index directory.

mod neighbors;

pub use neighbors::NeighborGraph;

use std::path::Path;
use std::sync::Arc;

use ann_core::{EngineError, EngineErrorKind, Neighbor, ObjectId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::distance::Metric;
use crate::property::IndexProperty;
use crate::store::{FileStore, ObjectStore};
use crate::traits::{IndexEngine, NativeIndex, ObjectSpace, SearchSlot};

pub const PROPERTY_FILE: &str = "prf";
pub const OBJECT_FILE: &str = "obj";
pub const GRAPH_FILE: &str = "grp";

const INDEX_FORMAT_VERSION: u32 = 1;

/// Engine backed by [`GraphIndex`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphEngine;

impl GraphEngine {
    pub fn new() -> Self {
        Self
    }
}

impl IndexEngine for GraphEngine {
    fn open(&self, path: &Path) -> Result<Box<dyn NativeIndex>, EngineError> {
        let index = GraphIndex::load(path)?;
        Ok(Box::new(index))
    }

    fn create(
        &self,
        path: &Path,
        property: &IndexProperty,
    ) -> Result<Box<dyn NativeIndex>, EngineError> {
        property.validate()?;
        tracing::debug!(path = %path.display(), dimension = property.dimension, "creating graph index");
        Ok(Box::new(GraphIndex::new(*property)))
    }
}

#[derive(Serialize, Deserialize)]
struct PropertyFile {
    version: u32,
    #[serde(flatten)]
    property: IndexProperty,
}

/// An open graph index.
pub struct GraphIndex {
    property: IndexProperty,
    objects: Arc<RwLock<ObjectStore>>,
    graph: NeighborGraph,
}

impl GraphIndex {
    pub fn new(property: IndexProperty) -> Self {
        let objects = ObjectStore::new(
            property.object_type,
            property.dimension,
            property.distance_type.is_normalized(),
        );
        Self {
            property,
            objects: Arc::new(RwLock::new(objects)),
            graph: NeighborGraph::new(property.creation_edge_size),
        }
    }

    /// Load an index directory written by [`NativeIndex::save`].
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let store = FileStore::new(path);

        let prf = read_index_file(&store, PROPERTY_FILE, "PropertySet::load")?.ok_or_else(|| {
            EngineError::new(
                EngineErrorKind::PropertyFileMissing,
                format!(
                    "PropertySet::load: Cannot load the property file {}",
                    store.resolve_path(PROPERTY_FILE).display()
                ),
            )
        })?;
        let prf: PropertyFile = serde_json::from_slice(&prf).map_err(|e| {
            EngineError::new(
                EngineErrorKind::Corrupted,
                format!("PropertySet::load: invalid property file: {}", e),
            )
        })?;
        if prf.version != INDEX_FORMAT_VERSION {
            return Err(EngineError::new(
                EngineErrorKind::Corrupted,
                format!("PropertySet::load: unsupported index version {}", prf.version),
            ));
        }
        let property = prf.property;
        property.validate()?;

        let obj = read_index_file(&store, OBJECT_FILE, "ObjectSpace::load")?.ok_or_else(|| {
            EngineError::new(
                EngineErrorKind::Corrupted,
                format!(
                    "ObjectSpace::load: Cannot open the object file {}",
                    store.resolve_path(OBJECT_FILE).display()
                ),
            )
        })?;
        let objects = ObjectStore::from_bytes(&obj)?;
        if objects.dimension() != property.dimension || objects.object_type() != property.object_type {
            return Err(EngineError::new(
                EngineErrorKind::Corrupted,
                "ObjectSpace::load: object file does not match the property file",
            ));
        }

        let grp = read_index_file(&store, GRAPH_FILE, "GraphIndex::load")?.ok_or_else(|| {
            EngineError::new(
                EngineErrorKind::Corrupted,
                format!(
                    "GraphIndex::load: Cannot open the graph file {}",
                    store.resolve_path(GRAPH_FILE).display()
                ),
            )
        })?;
        let graph: NeighborGraph = serde_json::from_slice(&grp).map_err(|e| {
            EngineError::new(
                EngineErrorKind::Corrupted,
                format!("GraphIndex::load: invalid graph file: {}", e),
            )
        })?;

        tracing::debug!(
            path = %path.display(),
            objects = objects.len(),
            indexed = graph.len(),
            "loaded graph index"
        );

        Ok(Self {
            property,
            objects: Arc::new(RwLock::new(objects)),
            graph,
        })
    }

    fn metric(&self) -> Metric {
        Metric::new(self.property.distance_type, self.property.object_type)
    }

    /// Candidate list size, `max(search_edge_size, k) * (1 + epsilon)`.
    /// Never larger than the graph: at that size the search is exhaustive, and
    /// the float cast saturating for huge `k` or `epsilon` lands there too.
    fn search_size(&self, k: usize, epsilon: f32) -> usize {
        let slack = if epsilon.is_finite() { epsilon.max(0.0) } else { 0.0 };
        let base = self.property.search_edge_size.max(k);
        let size = (base as f64 * (1.0 + f64::from(slack))).ceil() as usize;
        size.min(self.graph.len())
    }
}

impl NativeIndex for GraphIndex {
    fn property(&self) -> Result<IndexProperty, EngineError> {
        Ok(self.property)
    }

    fn object_space(&self) -> Result<Box<dyn ObjectSpace>, EngineError> {
        Ok(Box::new(GraphObjectSpace {
            objects: Arc::clone(&self.objects),
        }))
    }

    fn insert(&mut self, vector: &[f64]) -> Result<ObjectId, EngineError> {
        self.objects.write().insert(vector)
    }

    fn search(
        &self,
        query: &[f64],
        k: usize,
        epsilon: f32,
        radius: f32,
    ) -> Result<Vec<SearchSlot>, EngineError> {
        let objects = self.objects.read();
        let query = objects.prepare(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let ef = self.search_size(k, epsilon);
        let found = self.graph.search(&objects, self.metric(), &query, ef);
        Ok(found
            .into_iter()
            .filter(|&(_, d)| radius < 0.0 || d <= radius)
            .take(k)
            .map(|(id, d)| Ok(Neighbor::new(id, d)))
            .collect())
    }

    fn remove(&mut self, id: ObjectId) -> Result<(), EngineError> {
        let metric = self.metric();
        let mut objects = self.objects.write();
        if !objects.contains(id) {
            return Err(EngineError::new(
                EngineErrorKind::ObjectNotFound,
                format!("GraphIndex::remove: object id {} not found", id),
            ));
        }
        self.graph.unlink(&objects, metric, id);
        objects.remove(id)?;
        Ok(())
    }

    fn build_index(&mut self, parallelism: usize) -> Result<(), EngineError> {
        let metric = self.metric();
        let ef = self
            .property
            .search_edge_size
            .max(self.property.creation_edge_size * 2);
        let objects = self.objects.read();
        let pending: Vec<ObjectId> = objects.ids().filter(|&id| !self.graph.contains(id)).collect();
        if pending.is_empty() {
            return Ok(());
        }
        self.graph.build(&objects, metric, &pending, parallelism, ef)?;
        tracing::debug!(
            linked = pending.len(),
            indexed = self.graph.len(),
            parallelism,
            "built graph index"
        );
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<(), EngineError> {
        let store = FileStore::new(path);
        let prf = serde_json::to_vec_pretty(&PropertyFile {
            version: INDEX_FORMAT_VERSION,
            property: self.property,
        })
        .map_err(|e| EngineError::other(format!("PropertySet::save: {}", e)))?;
        let obj = self.objects.read().to_bytes()?;
        let grp = serde_json::to_vec(&self.graph)
            .map_err(|e| EngineError::other(format!("GraphIndex::save: {}", e)))?;

        // The property file goes last: an index directory only opens once
        // its object and graph files are in place.
        store.put(OBJECT_FILE, &obj)?;
        store.put(GRAPH_FILE, &grp)?;
        store.put(PROPERTY_FILE, &prf)?;
        Ok(())
    }
}

/// Contents of one index file, `None` when it does not exist. Any other
/// read failure is an I/O error so the index is never mistaken for absent.
fn read_index_file(
    store: &FileStore,
    key: &str,
    context: &str,
) -> Result<Option<Vec<u8>>, EngineError> {
    store.get(key).map_err(|e| {
        EngineError::new(
            EngineErrorKind::Io,
            format!(
                "{}: cannot read {}: {}",
                context,
                store.resolve_path(key).display(),
                e
            ),
        )
    })
}

/// Shares the object store of the [`GraphIndex`] it came from.
pub struct GraphObjectSpace {
    objects: Arc<RwLock<ObjectStore>>,
}

impl ObjectSpace for GraphObjectSpace {
    fn object_as_float(&self, id: ObjectId) -> Result<Vec<u8>, EngineError> {
        self.objects.read().object_as_float(id)
    }

    fn object_as_integer(&self, id: ObjectId) -> Result<Vec<u8>, EngineError> {
        self.objects.read().object_as_integer(id)
    }
}
