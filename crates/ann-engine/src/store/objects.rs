use std::io::{Cursor, Read, Write};

use ann_core::{EngineError, EngineErrorKind, ObjectId, ObjectType};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::distance;

const OBJECT_FILE_MAGIC: &[u8; 4] = b"ANOB";
const OBJECT_FILE_VERSION: u16 = 1;

/// Id-addressed object store. Slot `i` holds object id `i + 1`; removed
/// objects leave an empty slot so ids are never reused.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    object_type: ObjectType,
    dimension: usize,
    normalize: bool,
    slots: Vec<Option<Vec<f32>>>,
}

impl ObjectStore {
    pub fn new(object_type: ObjectType, dimension: usize, normalize: bool) -> Self {
        Self {
            object_type,
            dimension,
            normalize,
            slots: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert a caller vector into the stored representation.
    pub fn prepare(&self, vector: &[f64]) -> Result<Vec<f32>, EngineError> {
        if vector.len() != self.dimension {
            return Err(EngineError::new(
                EngineErrorKind::DimensionMismatch,
                format!(
                    "ObjectSpace: dimension mismatch, expected {}, got {}",
                    self.dimension,
                    vector.len()
                ),
            ));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(EngineError::new(
                EngineErrorKind::InvalidArgument,
                "ObjectSpace: object has a non-finite component",
            ));
        }
        let mut out: Vec<f32> = match self.object_type {
            ObjectType::Uint8 => vector.iter().map(|&x| x.round().clamp(0.0, 255.0) as f32).collect(),
            _ => vector.iter().map(|&x| x as f32).collect(),
        };
        if self.normalize && self.object_type == ObjectType::Float {
            distance::normalize_vector(&mut out);
        }
        Ok(out)
    }

    pub fn insert(&mut self, vector: &[f64]) -> Result<ObjectId, EngineError> {
        let object = self.prepare(vector)?;
        let id = ObjectId::try_from(self.slots.len() + 1).map_err(|_| {
            EngineError::new(EngineErrorKind::InvalidArgument, "ObjectSpace: object id space exhausted")
        })?;
        self.slots.push(Some(object));
        Ok(id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&[f32]> {
        let idx = (id as usize).checked_sub(1)?;
        self.slots.get(idx).and_then(|s| s.as_deref())
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: ObjectId) -> Result<Vec<f32>, EngineError> {
        let removed = (id as usize)
            .checked_sub(1)
            .and_then(|idx| self.slots.get_mut(idx))
            .and_then(Option::take);
        removed.ok_or_else(|| not_found(id))
    }

    /// Ids of every live object in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| (i + 1) as ObjectId)
    }

    /// Components as little-endian `f32` bytes.
    pub fn object_as_float(&self, id: ObjectId) -> Result<Vec<u8>, EngineError> {
        let object = self.get(id).ok_or_else(|| not_found(id))?;
        let mut buf = Vec::with_capacity(object.len() * 4);
        for &v in object {
            buf.write_f32::<LittleEndian>(v)?;
        }
        Ok(buf)
    }

    /// Components as bytes. Only meaningful for byte objects.
    pub fn object_as_integer(&self, id: ObjectId) -> Result<Vec<u8>, EngineError> {
        if self.object_type != ObjectType::Uint8 {
            return Err(EngineError::new(
                EngineErrorKind::InvalidArgument,
                format!("ObjectSpace: object type is {}, not uint8", self.object_type),
            ));
        }
        let object = self.get(id).ok_or_else(|| not_found(id))?;
        Ok(object.iter().map(|&v| v as u8).collect())
    }

    /// Format: magic | version(u16) | type(u8) | normalize(u8) | dim(u32) |
    /// slots(u64) | [live(u8) | components] ... with components as f32 or u8.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EngineError> {
        let mut buf = Vec::new();
        buf.write_all(OBJECT_FILE_MAGIC)?;
        buf.write_u16::<LittleEndian>(OBJECT_FILE_VERSION)?;
        buf.write_u8(object_type_code(self.object_type))?;
        buf.write_u8(u8::from(self.normalize))?;
        buf.write_u32::<LittleEndian>(self.dimension as u32)?;
        buf.write_u64::<LittleEndian>(self.slots.len() as u64)?;
        for slot in &self.slots {
            match slot {
                Some(object) => {
                    buf.write_u8(1)?;
                    for &v in object {
                        match self.object_type {
                            ObjectType::Uint8 => buf.write_u8(v as u8)?,
                            _ => buf.write_f32::<LittleEndian>(v)?,
                        }
                    }
                }
                None => buf.write_u8(0)?,
            }
        }
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        let mut cur = Cursor::new(bytes);
        let mut magic = [0u8; 4];
        cur.read_exact(&mut magic).map_err(corrupted)?;
        if &magic != OBJECT_FILE_MAGIC {
            return Err(EngineError::new(
                EngineErrorKind::Corrupted,
                "ObjectSpace::load: not an object file",
            ));
        }
        let version = cur.read_u16::<LittleEndian>().map_err(corrupted)?;
        if version != OBJECT_FILE_VERSION {
            return Err(EngineError::new(
                EngineErrorKind::Corrupted,
                format!("ObjectSpace::load: unsupported object file version {}", version),
            ));
        }
        let object_type = object_type_from_code(cur.read_u8().map_err(corrupted)?)?;
        let normalize = cur.read_u8().map_err(corrupted)? != 0;
        let dimension = cur.read_u32::<LittleEndian>().map_err(corrupted)? as usize;
        let count = cur.read_u64::<LittleEndian>().map_err(corrupted)? as usize;

        let mut slots = Vec::with_capacity(count.min(bytes.len()));
        for _ in 0..count {
            if cur.read_u8().map_err(corrupted)? == 0 {
                slots.push(None);
                continue;
            }
            let mut object = vec![0f32; dimension];
            for v in object.iter_mut() {
                *v = match object_type {
                    ObjectType::Uint8 => f32::from(cur.read_u8().map_err(corrupted)?),
                    _ => cur.read_f32::<LittleEndian>().map_err(corrupted)?,
                };
            }
            slots.push(Some(object));
        }

        Ok(Self {
            object_type,
            dimension,
            normalize,
            slots,
        })
    }
}

fn not_found(id: ObjectId) -> EngineError {
    EngineError::new(
        EngineErrorKind::ObjectNotFound,
        format!("ObjectSpace: object id {} not found", id),
    )
}

fn corrupted(e: std::io::Error) -> EngineError {
    EngineError::new(
        EngineErrorKind::Corrupted,
        format!("ObjectSpace::load: truncated object file: {}", e),
    )
}

fn object_type_code(t: ObjectType) -> u8 {
    match t {
        ObjectType::None => 0,
        ObjectType::Uint8 => 1,
        ObjectType::Float => 2,
    }
}

fn object_type_from_code(code: u8) -> Result<ObjectType, EngineError> {
    match code {
        1 => Ok(ObjectType::Uint8),
        2 => Ok(ObjectType::Float),
        other => Err(EngineError::new(
            EngineErrorKind::Corrupted,
            format!("ObjectSpace::load: unknown object type code {}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one_and_are_not_reused() {
        let mut store = ObjectStore::new(ObjectType::Float, 2, false);
        assert_eq!(store.insert(&[1.0, 2.0]).unwrap(), 1);
        assert_eq!(store.insert(&[3.0, 4.0]).unwrap(), 2);
        store.remove(1).unwrap();
        assert_eq!(store.insert(&[5.0, 6.0]).unwrap(), 3);
        assert_eq!(store.ids().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn rejects_wrong_dimension() {
        let mut store = ObjectStore::new(ObjectType::Float, 3, false);
        let err = store.insert(&[1.0]).unwrap_err();
        assert_eq!(err.kind, EngineErrorKind::DimensionMismatch);
        assert!(store.is_empty());
    }

    #[test]
    fn uint8_components_are_rounded_and_clamped() {
        let mut store = ObjectStore::new(ObjectType::Uint8, 3, false);
        let id = store.insert(&[1.4, 300.0, -2.0]).unwrap();
        assert_eq!(store.object_as_integer(id).unwrap(), vec![1, 255, 0]);
    }

    #[test]
    fn missing_object_reports_not_found() {
        let store = ObjectStore::new(ObjectType::Float, 2, false);
        assert_eq!(store.object_as_float(7).unwrap_err().kind, EngineErrorKind::ObjectNotFound);
        assert!(store.get(0).is_none());
    }

    #[test]
    fn object_file_round_trip_keeps_holes() {
        let mut store = ObjectStore::new(ObjectType::Uint8, 2, false);
        store.insert(&[1.0, 2.0]).unwrap();
        store.insert(&[3.0, 4.0]).unwrap();
        store.remove(1).unwrap();
        let loaded = ObjectStore::from_bytes(&store.to_bytes().unwrap()).unwrap();
        assert_eq!(loaded.object_type(), ObjectType::Uint8);
        assert!(!loaded.contains(1));
        assert_eq!(loaded.get(2).unwrap(), &[3.0, 4.0]);
    }

    #[test]
    fn truncated_object_file_is_corrupted() {
        let mut store = ObjectStore::new(ObjectType::Float, 4, false);
        store.insert(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        let bytes = store.to_bytes().unwrap();
        let err = ObjectStore::from_bytes(&bytes[..bytes.len() - 2]).unwrap_err();
        assert_eq!(err.kind, EngineErrorKind::Corrupted);
    }
}
