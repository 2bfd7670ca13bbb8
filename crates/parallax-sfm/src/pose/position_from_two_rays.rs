use glam::{DMat3, DVec3};

use crate::FeatureCorrespondence;

/// Sines below this bound mark a ray pair or a constraint pair as degenerate.
const MIN_SINE: f64 = 1e-6;

/// Errors raised by the two-ray position solver.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSolverError {
    /// The rays of a correspondence are nearly parallel and do not constrain
    /// the position.
    #[error("Correspondence {0} has nearly parallel rays")]
    ParallelRays(usize),

    /// Both correspondences constrain the position to the same plane.
    #[error("Coplanarity constraints are ill-conditioned")]
    IllConditioned,
}

/// Unit normal of the plane spanned by both rays of a correspondence.
///
/// The second camera center lies in this plane, i.e. `normal.dot(c) == 0`.
/// Returns `None` when the rays are nearly parallel.
pub fn coplanarity_normal(
    rotation: &DMat3,
    correspondence: &FeatureCorrespondence,
) -> Option<DVec3> {
    let d1 = correspondence.bearing1();
    let d2 = rotation.transpose() * correspondence.bearing2();
    let n = d1.cross(d2);
    let norm = n.length();
    if norm <= MIN_SINE * d1.length() * d2.length() {
        return None;
    }
    Some(n / norm)
}

/// Compute the unit position of the second camera from two correspondences
/// and the known rotation.
///
/// Each correspondence forces the camera center into the plane spanned by its
/// two rays, so the center lies on the intersection line of both planes. The
/// line fixes the direction up to sign; both signs are returned and must be
/// told apart by the caller, e.g. with
/// [`is_in_front_of_cameras`](crate::pose::is_in_front_of_cameras).
///
/// The magnitude of the translation cannot be observed from bearings alone,
/// so the returned positions have unit norm.
pub fn positions_from_two_rays(
    rotation: &DMat3,
    correspondences: &[FeatureCorrespondence; 2],
) -> Result<[DVec3; 2], PositionSolverError> {
    let n1 = coplanarity_normal(rotation, &correspondences[0])
        .ok_or(PositionSolverError::ParallelRays(0))?;
    let n2 = coplanarity_normal(rotation, &correspondences[1])
        .ok_or(PositionSolverError::ParallelRays(1))?;

    let direction = n1.cross(n2);
    let norm = direction.length();
    if norm <= MIN_SINE {
        return Err(PositionSolverError::IllConditioned);
    }

    let position = direction / norm;
    Ok([position, -position])
}
