use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

use crate::Reconstruction;

/// A similarity transform `x' = scale * rotation * x + translation`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityTransformation {
    /// Rotation applied to the input.
    pub rotation: DMat3,
    /// Translation added after rotating and scaling.
    pub translation: DVec3,
    /// Uniform scale, positive.
    pub scale: f64,
}

impl Default for SimilarityTransformation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl SimilarityTransformation {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        rotation: DMat3::IDENTITY,
        translation: DVec3::ZERO,
        scale: 1.0,
    };

    /// Create a transform from its parts.
    pub fn new(rotation: DMat3, translation: DVec3, scale: f64) -> Self {
        Self {
            rotation,
            translation,
            scale,
        }
    }

    /// Apply the transform to a point.
    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.scale * (self.rotation * point) + self.translation
    }

    /// The transform undoing this one.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.transpose();
        let scale = 1.0 / self.scale;
        Self {
            rotation,
            translation: -scale * (rotation * self.translation),
            scale,
        }
    }
}

/// Apply a similarity transform to the estimated views and tracks of a
/// reconstruction, in place.
///
/// Camera centers and points move with the transform and camera orientations
/// follow the rotation of the world frame. Homogeneous points keep their `w`
/// component, so points at infinity are only rotated. Inverse depths scale
/// with `1 / scale` so the inverse-depth points move with the tracks.
pub fn transform_reconstruction(
    transformation: &SimilarityTransformation,
    reconstruction: &mut Reconstruction,
) {
    let SimilarityTransformation {
        rotation,
        translation,
        scale,
    } = *transformation;

    for (_, view) in reconstruction.views_mut() {
        if !view.is_estimated {
            continue;
        }
        let camera = &mut view.camera;
        camera.position = transformation.transform_point(camera.position);
        camera.orientation *= rotation.transpose();
    }

    for (_, mut track) in reconstruction.tracks_mut() {
        if !track.is_estimated() {
            continue;
        }
        let point = track.point_mut();
        let xyz = scale * (rotation * point.truncate()) + translation * point.w;
        *point = xyz.extend(point.w);

        let inverse_depth = track.inverse_depth_mut();
        *inverse_depth /= scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::DVec4;

    #[test]
    fn test_inverse() {
        let sim = SimilarityTransformation::new(
            DMat3::from_axis_angle(DVec3::new(1.0, 2.0, 0.5).normalize(), 0.8),
            DVec3::new(0.3, -1.0, 2.0),
            2.5,
        );
        let p = DVec3::new(-0.4, 0.9, 3.0);
        let back = sim.inverse().transform_point(sim.transform_point(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-12);
        assert_relative_eq!(back.z, p.z, epsilon = 1e-12);
    }

    #[test]
    fn test_transform_keeps_inverse_depth_consistent() -> Result<(), crate::ReconstructionError> {
        let mut recon = Reconstruction::new();
        let v = recon.add_view("v")?;
        if let Some(view) = recon.view_mut(v) {
            view.camera = crate::Camera::new(
                DMat3::from_axis_angle(DVec3::X, 0.3),
                DVec3::new(1.0, 0.0, -2.0),
            );
            view.is_estimated = true;
        }
        let t = recon.add_track(&[v])?;
        if let Some(mut track) = recon.track_mut(t) {
            track.set_reference_bearing(DVec3::new(0.1, -0.2, 1.0).normalize());
            track.set_inverse_depth(0.2);
            track.set_estimated(true);
        }
        let before = recon.track_point_from_inverse_depth(t).unwrap_or_default();
        if let Some(mut track) = recon.track_mut(t) {
            track.set_point(before);
        }

        let sim = SimilarityTransformation::new(
            DMat3::from_axis_angle(DVec3::Z, -0.7),
            DVec3::new(0.5, 0.5, 0.0),
            3.0,
        );
        transform_reconstruction(&sim, &mut recon);

        let moved = recon.track(t).map(|track| track.point()).unwrap_or_default();
        let expected = sim.transform_point(before.truncate());
        let from_inverse_depth = recon.track_point_from_inverse_depth(t).unwrap_or_default();
        for p in [moved, from_inverse_depth] {
            assert_relative_eq!(p.x, expected.x, epsilon = 1e-12);
            assert_relative_eq!(p.y, expected.y, epsilon = 1e-12);
            assert_relative_eq!(p.z, expected.z, epsilon = 1e-12);
            assert_relative_eq!(p.w, 1.0);
        }

        Ok(())
    }

    #[test]
    fn test_unestimated_entities_are_untouched() -> Result<(), crate::ReconstructionError> {
        let mut recon = Reconstruction::new();
        let v = recon.add_view("v")?;
        let t = recon.add_track(&[v])?;
        if let Some(mut track) = recon.track_mut(t) {
            track.set_point(DVec4::new(1.0, 1.0, 1.0, 1.0));
        }
        let sim = SimilarityTransformation::new(DMat3::IDENTITY, DVec3::ONE, 2.0);
        transform_reconstruction(&sim, &mut recon);
        assert_eq!(
            recon.track(t).map(|track| track.point()),
            Some(DVec4::new(1.0, 1.0, 1.0, 1.0))
        );
        assert_eq!(recon.view(v).map(|view| view.camera.position), Some(DVec3::ZERO));
        Ok(())
    }
}
