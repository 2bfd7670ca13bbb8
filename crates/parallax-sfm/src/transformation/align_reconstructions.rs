use glam::DVec3;
use parallax_ransac::{Estimator, RansacParameters, RansacResult, RansacType};

use super::{
    align_point_clouds_umeyama, transform_reconstruction, AlignmentError,
    SimilarityTransformation, MIN_POINT_CORRESPONDENCES,
};
use crate::Reconstruction;

/// Consensus problem: a similarity between two sets of matched points.
///
/// Datums are `(left, right)` pairs and models map `left` onto `right`. The
/// residual is the squared distance between the mapped left point and the
/// right point.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimilarityEstimator;

impl Estimator for SimilarityEstimator {
    type Datum = (DVec3, DVec3);
    type Model = SimilarityTransformation;

    fn sample_size(&self) -> usize {
        MIN_POINT_CORRESPONDENCES
    }

    fn estimate_models(
        &self,
        data: &[(DVec3, DVec3)],
        sample: &[usize],
    ) -> Vec<SimilarityTransformation> {
        let (left, right): (Vec<DVec3>, Vec<DVec3>) = sample.iter().map(|&i| data[i]).unzip();
        align_point_clouds_umeyama(&left, &right)
            .map(|sim| vec![sim])
            .unwrap_or_default()
    }

    fn residual(&self, datum: &(DVec3, DVec3), model: &SimilarityTransformation) -> f64 {
        (model.transform_point(datum.0) - datum.1).length_squared()
    }

    fn refine_model(
        &self,
        data: &[(DVec3, DVec3)],
        inliers: &[usize],
        _model: &SimilarityTransformation,
    ) -> Option<SimilarityTransformation> {
        let (left, right): (Vec<DVec3>, Vec<DVec3>) = inliers.iter().map(|&i| data[i]).unzip();
        align_point_clouds_umeyama(&left, &right).ok()
    }
}

/// Centers of the views estimated in both reconstructions, matched by name,
/// as `(variable, fixed)` pairs.
fn common_camera_centers(
    fixed: &Reconstruction,
    variable: &Reconstruction,
) -> Vec<(DVec3, DVec3)> {
    variable
        .views()
        .filter(|(_, view)| view.is_estimated)
        .filter_map(|(_, view)| {
            let fixed_view = fixed.view(fixed.view_id_from_name(view.name())?)?;
            fixed_view
                .is_estimated
                .then_some((view.camera.position, fixed_view.camera.position))
        })
        .collect()
}

/// Align `variable` to `fixed` through the centers of their common views and
/// apply the alignment to `variable`.
///
/// Views are matched by name and must be estimated in both reconstructions.
/// Returns the transform that was applied.
pub fn align_reconstructions(
    fixed: &Reconstruction,
    variable: &mut Reconstruction,
) -> Result<SimilarityTransformation, AlignmentError> {
    let (left, right): (Vec<DVec3>, Vec<DVec3>) =
        common_camera_centers(fixed, variable).into_iter().unzip();
    let sim = align_point_clouds_umeyama(&left, &right)?;
    log::debug!(
        "aligned reconstructions through {} common views, scale {:.6}",
        left.len(),
        sim.scale
    );
    transform_reconstruction(&sim, variable);
    Ok(sim)
}

/// Outlier-robust variant of [`align_reconstructions`].
///
/// Common views whose centers end up farther than `robust_error_threshold`
/// from their counterparts are treated as outliers. Runs a seeded RANSAC with
/// a final re-fit on all inliers.
pub fn align_reconstructions_robust(
    robust_error_threshold: f64,
    fixed: &Reconstruction,
    variable: &mut Reconstruction,
) -> Result<SimilarityTransformation, AlignmentError> {
    let params = RansacParameters::default()
        .with_error_thresh(robust_error_threshold * robust_error_threshold)
        .with_local_optimization(true)
        .with_min_inliers(MIN_POINT_CORRESPONDENCES)
        .with_seed(0);
    let result =
        align_reconstructions_robust_with_params(&params, RansacType::Ransac, fixed, variable)?;
    Ok(result.model)
}

/// [`align_reconstructions_robust`] with explicit consensus parameters.
///
/// `params.error_thresh` is a squared distance between camera centers.
pub fn align_reconstructions_robust_with_params(
    params: &RansacParameters,
    ransac_type: RansacType,
    fixed: &Reconstruction,
    variable: &mut Reconstruction,
) -> Result<RansacResult<SimilarityTransformation>, AlignmentError> {
    let centers = common_camera_centers(fixed, variable);
    if centers.len() < MIN_POINT_CORRESPONDENCES {
        return Err(AlignmentError::NotEnoughCorrespondences {
            required: MIN_POINT_CORRESPONDENCES,
            actual: centers.len(),
        });
    }

    let result = parallax_ransac::estimate(&SimilarityEstimator, &centers, params, ransac_type)?;
    log::debug!(
        "robust alignment: {}/{} common views are inliers",
        result.summary.inliers.len(),
        centers.len()
    );
    transform_reconstruction(&result.model, variable);
    Ok(result)
}
