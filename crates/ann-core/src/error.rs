use thiserror::Error;

/// Message fragment the engine uses when an index directory has no
/// property file. Older engine builds misspell `PropertySet` as `PropertSet`,
/// so only the tail is matched.
pub const MISSING_PROPERTY_FILE_SIGNATURE: &str = "Cannot load the property file";

/// Coarse classification of an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// No property file at the requested index path.
    PropertyFileMissing,
    /// Vector length does not match the index dimension.
    DimensionMismatch,
    /// No live object with the requested id.
    ObjectNotFound,
    InvalidArgument,
    Io,
    Corrupted,
    Other,
}

/// Failure reported by an index engine. The message is kept verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Other, message)
    }

    /// True when the failure means "nothing persisted here yet".
    /// Engines that only carry text are matched on the message signature.
    pub fn is_missing_property_file(&self) -> bool {
        self.kind == EngineErrorKind::PropertyFileMissing
            || self.message.contains(MISSING_PROPERTY_FILE_SIGNATURE)
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        Self::new(EngineErrorKind::Io, e.to_string())
    }
}

/// Errors surfaced by an index handle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnnError {
    #[error("Property error: {0}")]
    Property(String),
    #[error("Index is not open")]
    NotOpen,
    #[error("{0}")]
    Engine(#[from] EngineError),
    #[error("Unsupported object type: {0}")]
    UnsupportedObjectType(String),
    #[error("Search result {index} failed: {message}")]
    PerResult { index: usize, message: String },
}

impl AnnError {
    /// The engine error behind this failure, if any.
    pub fn engine(&self) -> Option<&EngineError> {
        match self {
            Self::Engine(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AnnError>;
