use crate::error::AnnError;

/// Identifier the engine assigns to a stored object. Valid ids start at 1.
pub type ObjectId = u32;

/// One raw neighbor as produced by an engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: ObjectId,
    pub distance: f32,
}

impl Neighbor {
    pub fn new(id: ObjectId, distance: f32) -> Self {
        Self { id, distance }
    }

    /// Engines mark a slot they could not fill with a zero id and distance.
    pub fn is_empty_slot(&self) -> bool {
        self.id == 0 && self.distance == 0.0
    }
}

/// Search result slot with the engine's native widths.
#[derive(Debug, Clone, PartialEq)]
pub struct StrictSearchResult {
    pub id: ObjectId,
    pub distance: f32,
    pub error: Option<AnnError>,
}

impl StrictSearchResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Search result with the failed slots dropped and widened distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    pub id: usize,
    pub distance: f64,
}

impl From<&StrictSearchResult> for SearchResult {
    fn from(r: &StrictSearchResult) -> Self {
        Self {
            id: r.id as usize,
            distance: f64::from(r.distance),
        }
    }
}
