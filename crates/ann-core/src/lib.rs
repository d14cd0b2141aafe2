pub mod config;
pub mod error;
pub mod types;

pub use config::{DistanceType, ObjectType, Property};
pub use error::{AnnError, EngineError, EngineErrorKind, Result, MISSING_PROPERTY_FILE_SIGNATURE};
pub use types::{Neighbor, ObjectId, SearchResult, StrictSearchResult};
