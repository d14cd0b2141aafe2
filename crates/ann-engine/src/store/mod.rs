//! On-disk pieces of an index directory: atomic file writes and the object file.

mod file_store;
mod objects;

pub use file_store::FileStore;
pub use objects::ObjectStore;
