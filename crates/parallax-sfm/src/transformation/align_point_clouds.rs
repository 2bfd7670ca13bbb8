use glam::{DMat3, DVec3};

use super::{AlignmentError, SimilarityTransformation};
use crate::linalg::{outer, svd3, Svd3};

/// Smallest number of point pairs that fixes a similarity.
pub const MIN_POINT_CORRESPONDENCES: usize = 3;

/// Similarity transform mapping `left` onto `right`, minimizing
/// `sum |right[i] - (s * R * left[i] + t)|^2` (Umeyama).
pub fn align_point_clouds_umeyama(
    left: &[DVec3],
    right: &[DVec3],
) -> Result<SimilarityTransformation, AlignmentError> {
    let weights = vec![1.0; left.len()];
    align_point_clouds_umeyama_with_weights(left, right, &weights)
}

/// Weighted variant of [`align_point_clouds_umeyama`], minimizing
/// `sum w[i] * |right[i] - (s * R * left[i] + t)|^2`.
///
/// # Errors
///
/// Fails when the inputs differ in length, hold fewer than three points,
/// carry negative, non-finite or all-zero weights, or when the weighted
/// `left` points collapse onto their centroid.
pub fn align_point_clouds_umeyama_with_weights(
    left: &[DVec3],
    right: &[DVec3],
    weights: &[f64],
) -> Result<SimilarityTransformation, AlignmentError> {
    if left.len() != right.len() {
        return Err(AlignmentError::MismatchedLengths {
            left: left.len(),
            right: right.len(),
        });
    }
    if weights.len() != left.len() {
        return Err(AlignmentError::MismatchedLengths {
            left: left.len(),
            right: weights.len(),
        });
    }
    if left.len() < MIN_POINT_CORRESPONDENCES {
        return Err(AlignmentError::NotEnoughCorrespondences {
            required: MIN_POINT_CORRESPONDENCES,
            actual: left.len(),
        });
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(AlignmentError::InvalidWeights);
    }
    let total_weight: f64 = weights.iter().sum();
    if total_weight <= 0.0 {
        return Err(AlignmentError::InvalidWeights);
    }

    // weighted centroids
    let (mut mu_l, mut mu_r) = (DVec3::ZERO, DVec3::ZERO);
    for ((l, r), w) in left.iter().zip(right).zip(weights) {
        mu_l += *l * *w;
        mu_r += *r * *w;
    }
    mu_l /= total_weight;
    mu_r /= total_weight;

    // cross-covariance sum w (r - mu_r)(l - mu_l)^T and variance of left
    let mut covariance = DMat3::ZERO;
    let mut variance = 0.0;
    for ((l, r), w) in left.iter().zip(right).zip(weights) {
        let lc = *l - mu_l;
        let rc = *r - mu_r;
        covariance += outer(rc, lc) * *w;
        variance += *w * lc.length_squared();
    }
    covariance *= 1.0 / total_weight;
    variance /= total_weight;

    if variance <= f64::EPSILON {
        return Err(AlignmentError::Degenerate);
    }

    let Svd3 { u, s, v } = svd3(&covariance);
    let mut signs = DVec3::ONE;
    if u.determinant() * v.determinant() < 0.0 {
        signs.z = -1.0;
    }

    let rotation = u * DMat3::from_diagonal(signs) * v.transpose();
    let scale = s.dot(signs) / variance;
    let translation = mu_r - scale * (rotation * mu_l);

    Ok(SimilarityTransformation {
        rotation,
        translation,
        scale,
    })
}
