use glam::{DMat3, DQuat, DVec3};

use super::AlignmentError;
use crate::linalg::project_to_rotation;

/// Rotation matrix of an angle-axis vector.
pub fn angle_axis_to_rotation(angle_axis: DVec3) -> DMat3 {
    DMat3::from_quat(DQuat::from_scaled_axis(angle_axis))
}

/// Angle-axis vector of a rotation matrix.
pub fn rotation_to_angle_axis(rotation: &DMat3) -> DVec3 {
    let q = DQuat::from_mat3(rotation);
    // keep the angle in [0, pi]
    let q = if q.w < 0.0 { -q } else { q };
    q.to_scaled_axis()
}

/// Align a set of camera orientations to reference orientations.
///
/// Orientations are angle-axis vectors of world-to-camera rotations. Two sets
/// describing the same cameras in different world frames differ by one
/// rotation `A` applied on the right, `R_ref[i] ~ R[i] * A`. The chordal
/// least-squares `A` is computed in closed form, every entry of `rotations` is
/// replaced by `R[i] * A`, and `A` is returned.
pub fn align_rotations(
    reference: &[DVec3],
    rotations: &mut [DVec3],
) -> Result<DMat3, AlignmentError> {
    if reference.len() != rotations.len() {
        return Err(AlignmentError::MismatchedLengths {
            left: reference.len(),
            right: rotations.len(),
        });
    }
    if rotations.is_empty() {
        return Err(AlignmentError::NotEnoughCorrespondences {
            required: 1,
            actual: 0,
        });
    }

    let correlation = reference
        .iter()
        .zip(rotations.iter())
        .fold(DMat3::ZERO, |acc, (g, r)| {
            acc + angle_axis_to_rotation(*r).transpose() * angle_axis_to_rotation(*g)
        });
    let alignment = project_to_rotation(&correlation);

    for r in rotations.iter_mut() {
        *r = rotation_to_angle_axis(&(angle_axis_to_rotation(*r) * alignment));
    }
    Ok(alignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_align_rotations() -> Result<(), AlignmentError> {
        let reference = vec![
            DVec3::new(0.1, 0.2, -0.3),
            DVec3::new(-0.5, 0.0, 0.4),
            DVec3::new(0.0, 1.2, 0.1),
            DVec3::new(0.7, -0.2, 0.2),
        ];
        let offset = angle_axis_to_rotation(DVec3::new(0.3, -0.6, 0.2));
        let mut rotations: Vec<DVec3> = reference
            .iter()
            .map(|g| rotation_to_angle_axis(&(angle_axis_to_rotation(*g) * offset.transpose())))
            .collect();

        let alignment = align_rotations(&reference, &mut rotations)?;
        for (a, b) in alignment.to_cols_array().iter().zip(offset.to_cols_array()) {
            assert_relative_eq!(*a, b, epsilon = 1e-9);
        }
        for (r, g) in rotations.iter().zip(&reference) {
            assert_relative_eq!(r.x, g.x, epsilon = 1e-9);
            assert_relative_eq!(r.y, g.y, epsilon = 1e-9);
            assert_relative_eq!(r.z, g.z, epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_align_rotations_rejects_mismatch() {
        let mut rotations = vec![DVec3::ZERO; 2];
        assert!(matches!(
            align_rotations(&[DVec3::ZERO], &mut rotations),
            Err(AlignmentError::MismatchedLengths { left: 1, right: 2 })
        ));
        assert!(matches!(
            align_rotations(&[], &mut []),
            Err(AlignmentError::NotEnoughCorrespondences { .. })
        ));
    }
}
