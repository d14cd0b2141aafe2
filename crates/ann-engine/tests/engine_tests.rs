//! Integration tests for the graph engine through its boundary traits.

use ann_core::{DistanceType, EngineErrorKind, ObjectType, MISSING_PROPERTY_FILE_SIGNATURE};
use ann_engine::{GraphEngine, IndexEngine, IndexProperty, NativeIndex};
use tempfile::TempDir;

fn property(dimension: usize, object_type: ObjectType, distance_type: DistanceType) -> IndexProperty {
    IndexProperty {
        dimension,
        creation_edge_size: 10,
        search_edge_size: 40,
        object_type,
        distance_type,
    }
}

fn unit(dim: usize, i: usize) -> Vec<f64> {
    let mut v = vec![0.0; dim];
    v[i] = 1.0;
    v
}

fn nearest(index: &dyn NativeIndex, query: &[f64]) -> (u32, f32) {
    let slots = index.search(query, 1, 0.01, -1.0).unwrap();
    let n = slots[0].clone().unwrap();
    (n.id, n.distance)
}

// ============================================================
// Open / create / persistence
// ============================================================

#[test]
fn test_open_missing_index_reports_property_file() {
    let dir = TempDir::new().unwrap();
    let err = GraphEngine::new().open(dir.path()).err().unwrap();
    assert_eq!(err.kind, EngineErrorKind::PropertyFileMissing);
    assert!(err.message.starts_with("PropertySet::load: Cannot load the property file "));
    assert!(err.message.contains(MISSING_PROPERTY_FILE_SIGNATURE));
    assert!(err.is_missing_property_file());
}

#[test]
fn test_create_rejects_unset_types() {
    let dir = TempDir::new().unwrap();
    let engine = GraphEngine::new();
    let bad = property(6, ObjectType::None, DistanceType::L2);
    assert_eq!(engine.create(dir.path(), &bad).err().unwrap().kind, EngineErrorKind::InvalidArgument);
    let bad = property(0, ObjectType::Float, DistanceType::L2);
    assert!(engine.create(dir.path(), &bad).is_err());
}

#[test]
fn test_save_then_open_restores_everything() {
    let dir = TempDir::new().unwrap();
    let engine = GraphEngine::new();
    let prop = property(6, ObjectType::Uint8, DistanceType::L2);
    let mut index = engine.create(dir.path(), &prop).unwrap();
    for i in 0..6 {
        index.insert(&unit(6, i)).unwrap();
    }
    index.build_index(2).unwrap();
    index.save(dir.path()).unwrap();
    index.close();

    let reopened = engine.open(dir.path()).unwrap();
    assert_eq!(reopened.property().unwrap(), prop);
    for i in 0..6 {
        assert_eq!(nearest(reopened.as_ref(), &unit(6, i)), (i as u32 + 1, 0.0));
    }
    let bytes = reopened.object_space().unwrap().object_as_integer(3).unwrap();
    assert_eq!(bytes, vec![0, 0, 1, 0, 0, 0]);
}

#[test]
fn test_corrupted_object_file_is_not_missing() {
    let dir = TempDir::new().unwrap();
    let engine = GraphEngine::new();
    let index = engine.create(dir.path(), &property(4, ObjectType::Float, DistanceType::L2)).unwrap();
    index.save(dir.path()).unwrap();
    std::fs::write(dir.path().join("obj"), b"garbage").unwrap();
    let err = engine.open(dir.path()).err().unwrap();
    assert_eq!(err.kind, EngineErrorKind::Corrupted);
    assert!(!err.is_missing_property_file());
}

#[test]
fn test_unreadable_property_file_is_not_missing() {
    let dir = TempDir::new().unwrap();
    let engine = GraphEngine::new();
    let index = engine.create(dir.path(), &property(4, ObjectType::Float, DistanceType::L2)).unwrap();
    index.save(dir.path()).unwrap();
    std::fs::remove_file(dir.path().join("prf")).unwrap();
    std::fs::create_dir(dir.path().join("prf")).unwrap();

    let err = engine.open(dir.path()).err().unwrap();
    assert_eq!(err.kind, EngineErrorKind::Io);
    assert!(!err.is_missing_property_file());
}

#[test]
fn test_unreadable_object_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let engine = GraphEngine::new();
    let index = engine.create(dir.path(), &property(4, ObjectType::Float, DistanceType::L2)).unwrap();
    index.save(dir.path()).unwrap();
    std::fs::remove_file(dir.path().join("obj")).unwrap();
    std::fs::create_dir(dir.path().join("obj")).unwrap();

    assert_eq!(engine.open(dir.path()).err().unwrap().kind, EngineErrorKind::Io);
}

// ============================================================
// Insert / build / search
// ============================================================

#[test]
fn test_inserted_objects_are_not_searchable_until_built() {
    let dir = TempDir::new().unwrap();
    let mut index = GraphEngine::new()
        .create(dir.path(), &property(3, ObjectType::Float, DistanceType::L2))
        .unwrap();
    assert_eq!(index.insert(&[1.0, 0.0, 0.0]).unwrap(), 1);
    assert!(index.search(&[1.0, 0.0, 0.0], 5, 0.01, -1.0).unwrap().is_empty());
    index.build_index(1).unwrap();
    assert_eq!(index.search(&[1.0, 0.0, 0.0], 5, 0.01, -1.0).unwrap().len(), 1);
}

#[test]
fn test_insert_wrong_dimension() {
    let dir = TempDir::new().unwrap();
    let mut index = GraphEngine::new()
        .create(dir.path(), &property(3, ObjectType::Float, DistanceType::L2))
        .unwrap();
    let err = index.insert(&[1.0, 2.0]).unwrap_err();
    assert_eq!(err.kind, EngineErrorKind::DimensionMismatch);
    assert_eq!(index.insert(&[1.0, 2.0, 3.0]).unwrap(), 1);
}

#[test]
fn test_radius_cuts_off_far_neighbors() {
    let dir = TempDir::new().unwrap();
    let mut index = GraphEngine::new()
        .create(dir.path(), &property(2, ObjectType::Float, DistanceType::L1))
        .unwrap();
    for p in [[0.0, 0.0], [1.0, 0.0], [5.0, 0.0]] {
        index.insert(&p).unwrap();
    }
    index.build_index(1).unwrap();
    let all = index.search(&[0.0, 0.0], 3, 0.0, -1.0).unwrap();
    assert_eq!(all.len(), 3);
    let near = index.search(&[0.0, 0.0], 3, 0.0, 1.5).unwrap();
    let ids: Vec<u32> = near.into_iter().map(|s| s.unwrap().id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn test_larger_index_finds_exact_matches() {
    let dir = TempDir::new().unwrap();
    let mut prop = property(8, ObjectType::Float, DistanceType::L2);
    prop.search_edge_size = 20;
    let mut index = GraphEngine::new().create(dir.path(), &prop).unwrap();
    let vectors: Vec<Vec<f64>> = (0..300)
        .map(|i| {
            let mut v: Vec<f64> = (0..7).map(|j| ((i * 31 + j * 17) % 97) as f64).collect();
            v.push(i as f64);
            v
        })
        .collect();
    for v in &vectors {
        index.insert(v).unwrap();
    }
    index.build_index(4).unwrap();

    let mut hits = 0;
    for (i, v) in vectors.iter().enumerate().step_by(10) {
        let slots = index.search(v, 1, 0.5, -1.0).unwrap();
        if let Some(Ok(n)) = slots.first() {
            if n.id as usize == i + 1 {
                hits += 1;
            }
        }
    }
    assert!(hits >= 24, "recall too low: {hits}/30");
}

#[test]
fn test_normalized_cosine_ignores_magnitude() {
    let dir = TempDir::new().unwrap();
    let mut index = GraphEngine::new()
        .create(dir.path(), &property(2, ObjectType::Float, DistanceType::NormalizedCosine))
        .unwrap();
    index.insert(&[10.0, 0.0]).unwrap();
    index.insert(&[0.0, 3.0]).unwrap();
    index.build_index(1).unwrap();
    let (id, dist) = nearest(index.as_ref(), &[0.5, 0.0]);
    assert_eq!(id, 1);
    assert!(dist.abs() < 1e-6);

    let raw = index.object_space().unwrap().object_as_float(1).unwrap();
    assert_eq!(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]), 1.0);
}

// ============================================================
// Remove
// ============================================================

#[test]
fn test_remove_excludes_object_from_search() {
    let dir = TempDir::new().unwrap();
    let mut index = GraphEngine::new()
        .create(dir.path(), &property(6, ObjectType::Float, DistanceType::L2))
        .unwrap();
    for i in 0..6 {
        index.insert(&unit(6, i)).unwrap();
    }
    index.build_index(1).unwrap();
    index.remove(2).unwrap();
    let slots = index.search(&unit(6, 1), 6, 0.01, -1.0).unwrap();
    assert_eq!(slots.len(), 5);
    assert!(slots.iter().all(|s| s.as_ref().unwrap().id != 2));
    assert_eq!(index.remove(2).unwrap_err().kind, EngineErrorKind::ObjectNotFound);
    assert!(index.object_space().unwrap().object_as_float(2).is_err());
}

#[test]
fn test_remove_unindexed_object() {
    let dir = TempDir::new().unwrap();
    let mut index = GraphEngine::new()
        .create(dir.path(), &property(2, ObjectType::Float, DistanceType::L2))
        .unwrap();
    index.insert(&[1.0, 1.0]).unwrap();
    index.insert(&[2.0, 2.0]).unwrap();
    index.remove(1).unwrap();
    index.build_index(1).unwrap();
    let slots = index.search(&[1.0, 1.0], 2, 0.0, -1.0).unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].as_ref().unwrap().id, 2);
}
