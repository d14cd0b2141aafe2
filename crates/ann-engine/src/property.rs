use ann_core::{DistanceType, EngineError, EngineErrorKind, ObjectType, Property};
use serde::{Deserialize, Serialize};

/// The parameters an engine persists with an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexProperty {
    pub dimension: usize,
    pub creation_edge_size: usize,
    pub search_edge_size: usize,
    pub object_type: ObjectType,
    pub distance_type: DistanceType,
}

impl IndexProperty {
    pub fn validate(&self) -> Result<(), EngineError> {
        let fail = |msg: &str| Err(EngineError::new(EngineErrorKind::InvalidArgument, msg));
        if self.dimension == 0 {
            return fail("Property: dimension is not set");
        }
        if self.creation_edge_size == 0 {
            return fail("Property: edge size for creation is zero");
        }
        if self.object_type == ObjectType::None {
            return fail("Property: object type is not set");
        }
        if self.distance_type == DistanceType::None {
            return fail("Property: distance type is not set");
        }
        Ok(())
    }
}

impl From<&Property> for IndexProperty {
    fn from(p: &Property) -> Self {
        Self {
            dimension: p.dimension,
            creation_edge_size: p.creation_edge_size,
            search_edge_size: p.search_edge_size,
            object_type: p.object_type,
            distance_type: p.distance_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_handle_property() {
        let mut prop = Property::new("/tmp/idx");
        prop.dimension = 8;
        prop.object_type = ObjectType::Uint8;
        let ip = IndexProperty::from(&prop);
        assert_eq!(ip.dimension, 8);
        assert_eq!(ip.object_type, ObjectType::Uint8);
        assert_eq!(ip.creation_edge_size, prop.creation_edge_size);
        assert!(ip.validate().is_ok());
    }

    #[test]
    fn unset_fields_are_invalid() {
        let ip = IndexProperty::from(&Property::default());
        assert_eq!(ip.validate().unwrap_err().kind, EngineErrorKind::InvalidArgument);
    }
}
