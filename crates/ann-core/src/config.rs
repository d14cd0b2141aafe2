//! Index configuration: object/distance types and the `Property` record.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AnnError, Result};

pub const DEFAULT_DIMENSION: usize = 0;
pub const DEFAULT_CREATION_EDGE_SIZE: usize = 10;
pub const DEFAULT_SEARCH_EDGE_SIZE: usize = 40;
pub const DEFAULT_OBJECT_TYPE: ObjectType = ObjectType::Float;
pub const DEFAULT_DISTANCE_TYPE: DistanceType = DistanceType::L2;
pub const DEFAULT_EPSILON: f32 = 0.01;
pub const DEFAULT_BULK_INSERT_CHUNK_SIZE: usize = 100;
/// Default parallelism hint for index construction.
pub const DEFAULT_POOL_SIZE: usize = 1;

/// Storage representation of vector components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// Unknown object type. Rejected by open.
    None,
    /// 8bit unsigned integer components.
    Uint8,
    /// 32bit floating point components.
    Float,
}

impl Default for ObjectType {
    fn default() -> Self {
        DEFAULT_OBJECT_TYPE
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Uint8 => write!(f, "uint8"),
            Self::Float => write!(f, "float"),
        }
    }
}

/// Metric used to rank neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceType {
    /// Unknown distance type. Rejected by open.
    None,
    L1,
    L2,
    Angle,
    Hamming,
    Cosine,
    NormalizedAngle,
    NormalizedCosine,
}

impl Default for DistanceType {
    fn default() -> Self {
        DEFAULT_DISTANCE_TYPE
    }
}

impl fmt::Display for DistanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::L1 => "l1",
            Self::L2 => "l2",
            Self::Angle => "angle",
            Self::Hamming => "hamming",
            Self::Cosine => "cosine",
            Self::NormalizedAngle => "normalized_angle",
            Self::NormalizedCosine => "normalized_cosine",
        };
        f.write_str(name)
    }
}

impl DistanceType {
    /// Whether vectors are L2-normalized before they are stored.
    pub fn is_normalized(&self) -> bool {
        matches!(self, Self::NormalizedAngle | Self::NormalizedCosine)
    }
}

/// Parameters of one index.
///
/// Every field falls back to its default when missing from a serialized
/// configuration, so a JSON file only has to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Property {
    pub dimension: usize,
    pub creation_edge_size: usize,
    pub search_edge_size: usize,
    pub object_type: ObjectType,
    pub distance_type: DistanceType,
    pub index_path: String,
    pub bulk_insert_chunk_size: usize,
}

impl Default for Property {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
            creation_edge_size: DEFAULT_CREATION_EDGE_SIZE,
            search_edge_size: DEFAULT_SEARCH_EDGE_SIZE,
            object_type: DEFAULT_OBJECT_TYPE,
            distance_type: DEFAULT_DISTANCE_TYPE,
            index_path: String::new(),
            bulk_insert_chunk_size: DEFAULT_BULK_INSERT_CHUNK_SIZE,
        }
    }
}

impl Property {
    /// Defaults bound to an index path.
    pub fn new(index_path: impl Into<String>) -> Self {
        Self {
            index_path: index_path.into(),
            ..Self::default()
        }
    }

    pub fn is_valid_dimension(dimension: usize) -> bool {
        dimension > 0
    }

    pub fn is_valid_creation_edge_size(size: usize) -> bool {
        size > 0
    }

    pub fn is_valid_bulk_insert_chunk_size(size: usize) -> bool {
        size > 0
    }

    pub fn is_valid_index_path(path: &str) -> bool {
        !path.is_empty()
    }

    /// Checks what opening any index needs. The dimension is read back from
    /// an existing index, so it is only checked by
    /// [`validate_for_create`](Self::validate_for_create).
    pub fn validate_for_open(&self) -> Result<()> {
        if self.object_type == ObjectType::None {
            return Err(AnnError::Property("illegal object type".into()));
        }
        if self.distance_type == DistanceType::None {
            return Err(AnnError::Property("illegal distance type".into()));
        }
        if !Self::is_valid_index_path(&self.index_path) {
            return Err(AnnError::Property("empty index path".into()));
        }
        Ok(())
    }

    /// Checks what creating a new index needs on top of opening one.
    pub fn validate_for_create(&self) -> Result<()> {
        self.validate_for_open()?;
        if !Self::is_valid_dimension(self.dimension) {
            return Err(AnnError::Property(format!(
                "illegal dimension: {}",
                self.dimension
            )));
        }
        Ok(())
    }

    /// Load a property from a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            AnnError::Property(format!("cannot read {}: {}", path.display(), e))
        })?;
        let prop: Property = serde_json::from_slice(&bytes).map_err(|e| {
            AnnError::Property(format!("cannot parse {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), dimension = prop.dimension, "loaded index property");
        Ok(prop)
    }

    /// Write the property as pretty JSON.
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| AnnError::Property(e.to_string()))?;
        std::fs::write(path, bytes).map_err(|e| {
            AnnError::Property(format!("cannot write {}: {}", path.display(), e))
        })
    }
}
