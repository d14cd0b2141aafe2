//! Per-handle error accumulation.

use ann_core::AnnError;
use parking_lot::Mutex;
use thiserror::Error;

/// Ordered, append-only log of the failures a handle has reported.
///
/// Every failure an operation returns is also recorded here so callers can
/// inspect a batch of work afterwards. Entries are never removed.
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: Mutex<Vec<AnnError>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, error: AnnError) {
        tracing::warn!(error = %error, "index operation failed");
        self.entries.lock().push(error);
    }

    /// Snapshot of every recorded error, oldest first.
    pub fn all_errors(&self) -> Vec<AnnError> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Failure part-way through an insert that also rebuilds and saves.
///
/// `id` is set when the insert itself went through; the earlier steps are
/// not rolled back.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{source}")]
pub struct CommitError {
    pub id: Option<usize>,
    pub source: AnnError,
}

impl From<CommitError> for AnnError {
    fn from(e: CommitError) -> Self {
        e.source
    }
}
