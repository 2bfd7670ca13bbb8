use glam::{DMat3, DVec3};
use parallax_ransac::{
    compute_confidence, Estimator, RansacError, RansacParameters, RansacSummary, RansacType,
};
use serde::{Deserialize, Serialize};

use crate::linalg::{is_rotation, outer, svd3};
use crate::pose::{
    coplanarity_normal, essential_from_rotation_and_position, is_in_front_of_cameras,
    positions_from_two_rays, squared_sampson_distance,
};
use crate::refine::{refine_position_with_known_rotation, LmRefineParams};
use crate::FeatureCorrespondence;

/// Tolerance used to accept the supplied matrix as a rotation.
const ROTATION_TOLERANCE: f64 = 1e-6;

/// Ratio below which the second singular value of the coplanarity scatter
/// means the inlier constraints do not fix a single direction.
const MIN_CONSTRAINT_RATIO: f64 = 1e-9;

/// Errors returned by [`estimate_relative_pose_with_known_orientation`].
#[derive(thiserror::Error, Debug)]
pub enum EstimateError {
    /// Fewer correspondences than a minimal sample.
    #[error("Need at least {required} correspondences, got {actual}")]
    InsufficientCorrespondences {
        /// Minimal sample size.
        required: usize,
        /// Number of correspondences supplied.
        actual: usize,
    },

    /// The supplied orientation is not a proper rotation.
    #[error("Known orientation is not a rotation matrix")]
    InvalidRotation,

    /// The consensus search failed.
    #[error(transparent)]
    Ransac(#[from] RansacError),
}

/// Consensus problem: the position of the second camera given its rotation.
///
/// Models are unit positions `c` of the second camera, datums are
/// correspondences and the residual is the squared Sampson distance, so
/// thresholds are squared normalized image errors.
#[derive(Clone, Copy, Debug)]
pub struct KnownOrientationEstimator {
    /// Rotation of the second camera, world to camera.
    pub rotation: DMat3,
}

impl KnownOrientationEstimator {
    /// Create an estimator for the given rotation.
    pub fn new(rotation: DMat3) -> Self {
        Self { rotation }
    }
}

impl Estimator for KnownOrientationEstimator {
    type Datum = FeatureCorrespondence;
    type Model = DVec3;

    fn sample_size(&self) -> usize {
        2
    }

    fn estimate_models(&self, data: &[FeatureCorrespondence], sample: &[usize]) -> Vec<DVec3> {
        let pair = [data[sample[0]], data[sample[1]]];
        match positions_from_two_rays(&self.rotation, &pair) {
            Ok(candidates) => candidates.to_vec(),
            Err(err) => {
                log::trace!("degenerate sample {sample:?}: {err}");
                Vec::new()
            }
        }
    }

    fn residual(&self, datum: &FeatureCorrespondence, model: &DVec3) -> f64 {
        // the mirrored position explains the same epipolar geometry, only
        // cheirality tells it apart
        if !is_in_front_of_cameras(&self.rotation, model, datum) {
            return f64::INFINITY;
        }
        let essential = essential_from_rotation_and_position(&self.rotation, model);
        squared_sampson_distance(&essential, datum)
    }

    /// Least-squares direction orthogonal to all inlier coplanarity normals.
    fn refine_model(
        &self,
        data: &[FeatureCorrespondence],
        inliers: &[usize],
        model: &DVec3,
    ) -> Option<DVec3> {
        let scatter = inliers
            .iter()
            .filter_map(|&i| coplanarity_normal(&self.rotation, &data[i]))
            .fold(DMat3::ZERO, |acc, n| acc + outer(n, n));

        let svd = svd3(&scatter);
        if svd.s.y <= MIN_CONSTRAINT_RATIO * svd.s.x {
            return None;
        }
        let direction = svd.v.z_axis;
        Some(if direction.dot(*model) < 0.0 {
            -direction
        } else {
            direction
        })
    }
}

/// Output of a relative pose estimation with known orientation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelativePoseEstimate {
    /// Unit position of the second camera in the frame of the first.
    ///
    /// Only the direction is observable from bearings, the true baseline
    /// length must come from elsewhere.
    pub position: DVec3,
    /// Consensus summary. After a successful refinement the inliers and the
    /// confidence are those of the refined position.
    pub summary: RansacSummary,
    /// Whether the non-linear refinement was applied.
    pub refined: bool,
}

/// Estimate the position of the second camera from correspondences and its
/// known rotation.
///
/// Shorthand for
/// [`estimate_relative_pose_with_known_orientation_and_refinement`] without
/// the non-linear refinement.
pub fn estimate_relative_pose_with_known_orientation(
    params: &RansacParameters,
    ransac_type: RansacType,
    correspondences: &[FeatureCorrespondence],
    rotation: &DMat3,
) -> Result<RelativePoseEstimate, EstimateError> {
    estimate_relative_pose_with_known_orientation_and_refinement(
        params,
        ransac_type,
        correspondences,
        rotation,
        None,
    )
}

/// Estimate the position of the second camera, optionally refining the
/// consensus winner on its inliers with Levenberg-Marquardt.
///
/// # Arguments
///
/// * `params` - Consensus parameters. `error_thresh` is a squared normalized
///   image error.
/// * `ransac_type` - Consensus strategy.
/// * `correspondences` - Normalized correspondences between the two views.
/// * `rotation` - Rotation of the second camera, world to camera, with the
///   first camera at the origin.
/// * `refine` - Refinement settings, `None` to skip the refinement.
///
/// # Returns
///
/// The unit position of the second camera and the run summary. A refinement
/// that fails to converge, or loses support, is discarded with a warning and
/// the consensus estimate is returned.
pub fn estimate_relative_pose_with_known_orientation_and_refinement(
    params: &RansacParameters,
    ransac_type: RansacType,
    correspondences: &[FeatureCorrespondence],
    rotation: &DMat3,
    refine: Option<&LmRefineParams>,
) -> Result<RelativePoseEstimate, EstimateError> {
    params.validate()?;

    let estimator = KnownOrientationEstimator::new(*rotation);
    if correspondences.len() < estimator.sample_size() {
        return Err(EstimateError::InsufficientCorrespondences {
            required: estimator.sample_size(),
            actual: correspondences.len(),
        });
    }
    if !is_rotation(rotation, ROTATION_TOLERANCE) {
        return Err(EstimateError::InvalidRotation);
    }

    let result = parallax_ransac::estimate(&estimator, correspondences, params, ransac_type)?;
    let mut estimate = RelativePoseEstimate {
        position: result.model,
        summary: result.summary,
        refined: false,
    };

    let Some(lm_params) = refine else {
        return Ok(estimate);
    };

    let refined = match refine_position_with_known_rotation(
        rotation,
        correspondences,
        &estimate.summary.inliers,
        &estimate.position,
        lm_params,
    ) {
        Ok(refined) => refined,
        Err(err) => {
            log::warn!("keeping consensus estimate, refinement failed: {err}");
            return Ok(estimate);
        }
    };

    let required = params.min_inliers.max(estimator.sample_size());
    let inliers = match supported_inliers(
        &estimator,
        correspondences,
        &refined.position,
        params.error_thresh,
        required,
    ) {
        Ok(inliers) => inliers,
        Err(num_inliers) => {
            log::warn!("keeping consensus estimate, refined position has {num_inliers} inliers");
            return Ok(estimate);
        }
    };

    log::debug!(
        "refined position in {} iterations, cost {:.3e} -> {:.3e}",
        refined.num_iterations,
        refined.initial_cost,
        refined.final_cost
    );
    let inlier_ratio = inliers.len() as f64 / correspondences.len() as f64;
    estimate.position = refined.position;
    estimate.summary.confidence = compute_confidence(
        estimator.sample_size(),
        inlier_ratio,
        estimate.summary.num_iterations,
    );
    estimate.summary.inliers = inliers;
    estimate.refined = true;
    Ok(estimate)
}

/// Indices of the correspondences within `error_thresh` of `position`, or
/// their count when it falls below `required`.
fn supported_inliers(
    estimator: &KnownOrientationEstimator,
    correspondences: &[FeatureCorrespondence],
    position: &DVec3,
    error_thresh: f64,
    required: usize,
) -> Result<Vec<usize>, usize> {
    let inliers: Vec<usize> = correspondences
        .iter()
        .enumerate()
        .filter(|(_, c)| estimator.residual(c, position) <= error_thresh)
        .map(|(i, _)| i)
        .collect();
    if inliers.len() < required {
        return Err(inliers.len());
    }
    Ok(inliers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::DVec2;

    fn observe(rotation: &DMat3, position: &DVec3, point: DVec3) -> FeatureCorrespondence {
        let p2 = *rotation * (point - *position);
        FeatureCorrespondence::new(point.truncate() / point.z, p2.truncate() / p2.z)
    }

    fn scene(rotation: &DMat3, position: &DVec3, n: usize) -> Vec<FeatureCorrespondence> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                let point = DVec3::new(
                    (t * 0.71).sin() * 2.0,
                    (t * 1.37).cos() * 2.0,
                    6.0 + (t * 0.29).sin().abs() * 4.0,
                );
                observe(rotation, position, point)
            })
            .collect()
    }

    #[test]
    fn test_residual_rejects_mirrored_position() {
        let rotation = DMat3::from_axis_angle(DVec3::Y, 0.1);
        let position = DVec3::new(-1.0, 0.2, 0.1).normalize();
        let estimator = KnownOrientationEstimator::new(rotation);
        let c = observe(&rotation, &position, DVec3::new(0.4, -0.3, 7.0));
        assert_relative_eq!(estimator.residual(&c, &position), 0.0, epsilon = 1e-20);
        assert_eq!(estimator.residual(&c, &-position), f64::INFINITY);
    }

    #[test]
    fn test_estimate_models_returns_both_signs() {
        let rotation = DMat3::IDENTITY;
        let position = DVec3::new(0.0, 0.0, 1.0);
        let data = scene(&rotation, &position, 4);
        let estimator = KnownOrientationEstimator::new(rotation);
        let models = estimator.estimate_models(&data, &[0, 1]);
        assert_eq!(models.len(), 2);
        assert_relative_eq!(models[0].dot(models[1]), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_sample_yields_nothing() {
        let estimator = KnownOrientationEstimator::new(DMat3::IDENTITY);
        let data = [
            FeatureCorrespondence::new(DVec2::new(0.1, 0.1), DVec2::new(0.1, 0.1)),
            FeatureCorrespondence::new(DVec2::new(0.2, -0.1), DVec2::new(0.3, -0.1)),
        ];
        assert!(estimator.estimate_models(&data, &[0, 1]).is_empty());
    }

    #[test]
    fn test_linear_refit_keeps_sign() {
        let rotation = DMat3::from_axis_angle(DVec3::X, -0.05);
        let position = DVec3::new(0.3, -0.2, 1.0).normalize();
        let data = scene(&rotation, &position, 25);
        let inliers: Vec<usize> = (0..data.len()).collect();
        let estimator = KnownOrientationEstimator::new(rotation);

        let start = (position + DVec3::new(0.05, 0.0, -0.02)).normalize();
        let refit = estimator
            .refine_model(&data, &inliers, &start)
            .expect("well constrained");
        assert_relative_eq!(refit.dot(position), 1.0, epsilon = 1e-10);

        let refit = estimator
            .refine_model(&data, &inliers, &-start)
            .expect("well constrained");
        assert_relative_eq!(refit.dot(position), -1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_estimate_with_refinement() -> Result<(), EstimateError> {
        let rotation = DMat3::from_axis_angle(DVec3::Y, 0.2);
        let position = DVec3::new(-1.3, 0.0, 0.0);
        let data = scene(&rotation, &position, 40);
        let params = RansacParameters::default()
            .with_error_thresh(1e-6)
            .with_seed(7);

        let estimate = estimate_relative_pose_with_known_orientation_and_refinement(
            &params,
            RansacType::Ransac,
            &data,
            &rotation,
            Some(&LmRefineParams::default()),
        )?;
        assert!(estimate.refined);
        assert_eq!(estimate.summary.inliers.len(), data.len());
        assert_relative_eq!(estimate.position.dot(position.normalize()), 1.0, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn test_failed_refinement_keeps_consensus_estimate() -> Result<(), EstimateError> {
        let rotation = DMat3::from_axis_angle(DVec3::Y, 0.2);
        let position = DVec3::new(-1.3, 0.0, 0.4);
        let mut data = scene(&rotation, &position, 30);
        data.push(FeatureCorrespondence::new(
            DVec2::new(0.3, -0.2),
            DVec2::new(-0.4, 0.5),
        ));
        let params = RansacParameters::default()
            .with_error_thresh(1e-6)
            .with_seed(11);

        let consensus = estimate_relative_pose_with_known_orientation(
            &params,
            RansacType::Ransac,
            &data,
            &rotation,
        )?;
        // no iterations allowed, so the refinement cannot converge
        let lm_params = LmRefineParams::new()
            .with_max_iterations(0)
            .with_cost_tolerance(1e-12)
            .with_gradient_tolerance(1e-20)
            .with_initial_lambda(1e-2);
        let estimate = estimate_relative_pose_with_known_orientation_and_refinement(
            &params,
            RansacType::Ransac,
            &data,
            &rotation,
            Some(&lm_params),
        )?;
        assert!(!estimate.refined);
        assert_eq!(estimate.position.to_array(), consensus.position.to_array());
        assert_eq!(estimate.summary, consensus.summary);
        Ok(())
    }

    #[test]
    fn test_refined_position_must_keep_support() {
        let rotation = DMat3::from_axis_angle(DVec3::Z, -0.1);
        let position = DVec3::new(0.8, 0.3, -0.2).normalize();
        let data = scene(&rotation, &position, 20);
        let estimator = KnownOrientationEstimator::new(rotation);

        let inliers = supported_inliers(&estimator, &data, &position, 1e-8, 20);
        assert_eq!(inliers, Ok((0..20).collect()));

        // the mirrored direction puts every point behind a camera
        assert_eq!(
            supported_inliers(&estimator, &data, &-position, 1e-8, 4),
            Err(0)
        );
    }

    #[test]
    fn test_refinement_updates_confidence() -> Result<(), EstimateError> {
        let rotation = DMat3::IDENTITY;
        let position = DVec3::new(0.2, 1.0, 0.1);
        let mut data = scene(&rotation, &position, 24);
        for i in 0..6 {
            let t = i as f64;
            data.push(FeatureCorrespondence::new(
                DVec2::new(0.1 * t - 0.3, 0.2),
                DVec2::new(-0.5, 0.07 * t),
            ));
        }
        let params = RansacParameters::default()
            .with_error_thresh(1e-6)
            .with_seed(2);

        let estimate = estimate_relative_pose_with_known_orientation_and_refinement(
            &params,
            RansacType::Ransac,
            &data,
            &rotation,
            Some(&LmRefineParams::default()),
        )?;
        assert!(estimate.refined);
        let ratio = estimate.summary.inliers.len() as f64 / data.len() as f64;
        assert_relative_eq!(
            estimate.summary.confidence,
            compute_confidence(2, ratio, estimate.summary.num_iterations)
        );
        Ok(())
    }

    #[test]
    fn test_invalid_arguments() {
        let params = RansacParameters::default().with_seed(0);
        let data = scene(&DMat3::IDENTITY, &DVec3::X, 10);

        let err = estimate_relative_pose_with_known_orientation(
            &params,
            RansacType::Ransac,
            &data[..1],
            &DMat3::IDENTITY,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EstimateError::InsufficientCorrespondences {
                required: 2,
                actual: 1
            }
        ));

        let err = estimate_relative_pose_with_known_orientation(
            &params,
            RansacType::Ransac,
            &data,
            &DMat3::from_diagonal(DVec3::new(1.0, 1.0, -1.0)),
        )
        .unwrap_err();
        assert!(matches!(err, EstimateError::InvalidRotation));

        let err = estimate_relative_pose_with_known_orientation(
            &params.clone().with_error_thresh(0.0),
            RansacType::Ransac,
            &data,
            &DMat3::IDENTITY,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EstimateError::Ransac(RansacError::InvalidParameter(_))
        ));
    }
}
