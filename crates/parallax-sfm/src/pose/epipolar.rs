use glam::{DMat3, DVec3};

use crate::linalg::skew;
use crate::FeatureCorrespondence;

/// Below this squared sine the two rays are treated as parallel and the
/// triangulated depths as unknown.
const MIN_SIN_SQUARED_RAY_ANGLE: f64 = 1e-12;

/// Essential matrix `E = [t]x R` of the second camera, with `t = -R * c`.
///
/// Correspondences consistent with the pose satisfy `x2^T E x1 = 0`.
pub fn essential_from_rotation_and_position(rotation: &DMat3, position: &DVec3) -> DMat3 {
    let t = -(*rotation * *position);
    skew(t) * *rotation
}

/// Signed Sampson residual of a correspondence under an essential matrix.
///
/// The square of this value is the Sampson distance, a first-order
/// approximation of the squared reprojection error in normalized units.
/// Returns infinity when the epipolar lines are undefined but the constraint
/// is violated.
pub fn sampson_residual(essential: &DMat3, correspondence: &FeatureCorrespondence) -> f64 {
    let x1 = correspondence.bearing1();
    let x2 = correspondence.bearing2();
    let ex1 = *essential * x1;
    let etx2 = essential.transpose() * x2;
    let numerator = x2.dot(ex1);
    let denominator = ex1.x * ex1.x + ex1.y * ex1.y + etx2.x * etx2.x + etx2.y * etx2.y;
    if denominator <= f64::EPSILON * f64::EPSILON {
        return if numerator.abs() <= f64::EPSILON {
            0.0
        } else {
            f64::INFINITY
        };
    }
    numerator / denominator.sqrt()
}

/// Squared Sampson distance of a correspondence under an essential matrix.
pub fn squared_sampson_distance(essential: &DMat3, correspondence: &FeatureCorrespondence) -> f64 {
    let r = sampson_residual(essential, correspondence);
    r * r
}

/// Depths of the point observed by a correspondence along both rays.
///
/// Solves `d1 * x1 = c + d2 * R^T x2` in the least-squares sense, where `x1`
/// and `x2` are the homogeneous observations, so `d1` and `d2` are the z
/// coordinates of the point in each camera. Returns `None` when the rays are
/// nearly parallel.
pub fn triangulation_depths(
    rotation: &DMat3,
    position: &DVec3,
    correspondence: &FeatureCorrespondence,
) -> Option<(f64, f64)> {
    let d1 = correspondence.bearing1();
    let d2 = rotation.transpose() * correspondence.bearing2();

    let a = d1.dot(d1);
    let b = d1.dot(d2);
    let d = d2.dot(d2);
    let det = a * d - b * b;
    if det <= MIN_SIN_SQUARED_RAY_ANGLE * a * d {
        return None;
    }

    let p = d1.dot(*position);
    let q = d2.dot(*position);
    let depth1 = (d * p - b * q) / det;
    let depth2 = (b * p - a * q) / det;
    Some((depth1, depth2))
}

/// Whether the point of a correspondence lies in front of both cameras.
///
/// Correspondences with nearly parallel rays carry no depth information and
/// are accepted.
pub fn is_in_front_of_cameras(
    rotation: &DMat3,
    position: &DVec3,
    correspondence: &FeatureCorrespondence,
) -> bool {
    match triangulation_depths(rotation, position, correspondence) {
        Some((depth1, depth2)) => depth1 > 0.0 && depth2 > 0.0,
        None => true,
    }
}
