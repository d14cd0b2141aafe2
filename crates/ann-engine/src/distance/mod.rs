//! Distance functions. Smaller is closer for every metric.

use ann_core::{DistanceType, ObjectType};

#[inline]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn l1(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

#[inline]
pub fn l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Cosine similarity in [-1, 1]. Zero vectors are orthogonal to everything.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = inner_product(a, b);
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[inline]
pub fn angle(a: &[f32], b: &[f32]) -> f32 {
    cosine_similarity(a, b).acos()
}

#[inline]
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Bit-wise hamming distance over byte components.
#[inline]
pub fn hamming_bits(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| ((*x as u8) ^ (*y as u8)).count_ones())
        .sum::<u32>() as f32
}

/// Number of differing components.
#[inline]
pub fn hamming_components(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).filter(|(x, y)| x != y).count() as f32
}

/// L2 normalization in place.
pub fn normalize_vector(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Distance and object type of one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metric {
    pub distance: DistanceType,
    pub object: ObjectType,
}

impl Metric {
    pub fn new(distance: DistanceType, object: ObjectType) -> Self {
        Self { distance, object }
    }

    #[inline]
    pub fn between(&self, a: &[f32], b: &[f32]) -> f32 {
        compute_distance(self.distance, self.object, a, b)
    }
}

/// Distance between two stored objects under an index's metric.
pub fn compute_distance(
    distance: DistanceType,
    object: ObjectType,
    a: &[f32],
    b: &[f32],
) -> f32 {
    match distance {
        DistanceType::L1 => l1(a, b),
        DistanceType::L2 | DistanceType::None => l2(a, b),
        DistanceType::Angle | DistanceType::NormalizedAngle => angle(a, b),
        DistanceType::Cosine | DistanceType::NormalizedCosine => cosine(a, b),
        DistanceType::Hamming => match object {
            ObjectType::Uint8 => hamming_bits(a, b),
            _ => hamming_components(a, b),
        },
    }
}
