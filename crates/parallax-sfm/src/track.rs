use std::collections::BTreeSet;

use glam::{DMat3, DVec3, DVec4};
use serde::{Deserialize, Serialize};

use crate::ViewId;

/// A scene point and the views observing it.
///
/// Besides the homogeneous point, a track carries an inverse-depth
/// parameterization anchored at a reference view: the point lies at
/// `center + bearing / inverse_depth`, where `bearing` is
/// [`Track::reference_bearing`] rotated into the world frame.
///
/// The reference view is `None` exactly when the track has no views. When the
/// reference view is removed, the smallest remaining view id takes over.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    view_ids: BTreeSet<ViewId>,
    reference_view_id: Option<ViewId>,
    reference_bearing: DVec3,
    inverse_depth: f64,
    reference_descriptor: Vec<f32>,
    point: DVec4,
    color: [u8; 3],
    is_estimated: bool,
}

impl Track {
    /// Create a track with no views and an unestimated point.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of views observing the track.
    pub fn num_views(&self) -> usize {
        self.view_ids.len()
    }

    /// Views observing the track, in ascending order.
    pub fn view_ids(&self) -> &BTreeSet<ViewId> {
        &self.view_ids
    }

    /// Whether `view_id` observes the track.
    pub fn contains_view(&self, view_id: ViewId) -> bool {
        self.view_ids.contains(&view_id)
    }

    /// Add an observing view. The first view added becomes the reference.
    ///
    /// Returns `false` if the view was already present, in which case nothing
    /// changes.
    pub fn add_view(&mut self, view_id: ViewId) -> bool {
        if !self.view_ids.insert(view_id) {
            return false;
        }
        if self.reference_view_id.is_none() {
            self.reference_view_id = Some(view_id);
        }
        true
    }

    /// Remove an observing view.
    ///
    /// Returns `false` if the view was not present. Removing the reference
    /// view moves the reference to the smallest remaining view id, or clears
    /// it when no view remains.
    pub fn remove_view(&mut self, view_id: ViewId) -> bool {
        if !self.view_ids.remove(&view_id) {
            return false;
        }
        if self.reference_view_id == Some(view_id) {
            self.reference_view_id = self.view_ids.first().copied();
        }
        true
    }

    /// View anchoring the inverse-depth parameterization.
    pub fn reference_view_id(&self) -> Option<ViewId> {
        self.reference_view_id
    }

    /// Unit bearing of the point in the reference camera frame.
    pub fn reference_bearing(&self) -> DVec3 {
        self.reference_bearing
    }

    /// Set the reference bearing.
    pub fn set_reference_bearing(&mut self, bearing: DVec3) {
        self.reference_bearing = bearing;
    }

    /// Inverse of the distance from the reference camera along the bearing.
    pub fn inverse_depth(&self) -> f64 {
        self.inverse_depth
    }

    /// Mutable access to the inverse depth.
    pub fn inverse_depth_mut(&mut self) -> &mut f64 {
        &mut self.inverse_depth
    }

    /// Set the inverse depth.
    pub fn set_inverse_depth(&mut self, inverse_depth: f64) {
        self.inverse_depth = inverse_depth;
    }

    /// Descriptor of the observation in the reference view.
    pub fn reference_descriptor(&self) -> &[f32] {
        &self.reference_descriptor
    }

    /// Set the reference descriptor.
    pub fn set_reference_descriptor(&mut self, descriptor: Vec<f32>) {
        self.reference_descriptor = descriptor;
    }

    /// Homogeneous world point. Meaningful only once [`Track::is_estimated`].
    pub fn point(&self) -> DVec4 {
        self.point
    }

    /// Mutable access to the homogeneous point.
    pub fn point_mut(&mut self) -> &mut DVec4 {
        &mut self.point
    }

    /// Set the homogeneous point.
    pub fn set_point(&mut self, point: DVec4) {
        self.point = point;
    }

    /// RGB color of the point.
    pub fn color(&self) -> [u8; 3] {
        self.color
    }

    /// Set the color.
    pub fn set_color(&mut self, color: [u8; 3]) {
        self.color = color;
    }

    /// Whether the point has been estimated.
    pub fn is_estimated(&self) -> bool {
        self.is_estimated
    }

    /// Mark the point as estimated or not.
    pub fn set_estimated(&mut self, is_estimated: bool) {
        self.is_estimated = is_estimated;
    }

    /// Homogeneous point given by the inverse-depth parameterization.
    ///
    /// `orientation` and `position` are the world-to-camera rotation and the
    /// center of the reference camera. A zero inverse depth is a point at
    /// infinity along the bearing.
    pub fn inverse_depth_point(&self, orientation: &DMat3, position: &DVec3) -> DVec4 {
        let bearing = orientation.transpose() * self.reference_bearing;
        if self.inverse_depth == 0.0 {
            return bearing.extend(0.0);
        }
        (*position + bearing / self.inverse_depth).extend(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_add_view_is_idempotent() {
        let mut track = Track::new();
        assert_eq!(track.reference_view_id(), None);
        assert!(track.add_view(4));
        assert!(track.add_view(2));
        assert!(!track.add_view(4));
        assert_eq!(track.num_views(), 2);
        assert_eq!(track.reference_view_id(), Some(4));
    }

    #[test]
    fn test_remove_view_reassigns_reference() {
        let mut track = Track::new();
        for id in [5, 9, 3] {
            track.add_view(id);
        }
        assert!(!track.remove_view(7));
        assert_eq!(track.reference_view_id(), Some(5));

        assert!(track.remove_view(9));
        assert_eq!(track.reference_view_id(), Some(5));

        assert!(track.remove_view(5));
        assert_eq!(track.reference_view_id(), Some(3));

        assert!(track.remove_view(3));
        assert_eq!(track.reference_view_id(), None);
        assert_eq!(track.num_views(), 0);

        assert!(track.add_view(8));
        assert_eq!(track.reference_view_id(), Some(8));
    }

    #[test]
    fn test_inverse_depth_point() {
        let mut track = Track::new();
        let orientation = DMat3::from_axis_angle(DVec3::Z, std::f64::consts::FRAC_PI_2);
        let position = DVec3::new(1.0, 2.0, 3.0);
        track.set_reference_bearing(DVec3::X);
        track.set_inverse_depth(0.5);

        let p = track.inverse_depth_point(&orientation, &position);
        // camera x axis maps to world -y under this orientation
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.z, 3.0, epsilon = 1e-12);
        assert_relative_eq!(p.w, 1.0);

        track.set_inverse_depth(0.0);
        let p = track.inverse_depth_point(&orientation, &position);
        assert_relative_eq!(p.w, 0.0);
        assert_relative_eq!(p.y, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_plain_state() {
        let mut track = Track::new();
        track.set_point(DVec4::new(1.0, 2.0, 3.0, 1.0));
        track.set_color([10, 20, 30]);
        track.set_estimated(true);
        track.set_reference_descriptor(vec![0.25; 4]);
        *track.inverse_depth_mut() = 0.1;
        track.point_mut().w = 2.0;

        assert_eq!(track.point(), DVec4::new(1.0, 2.0, 3.0, 2.0));
        assert_eq!(track.color(), [10, 20, 30]);
        assert!(track.is_estimated());
        assert_eq!(track.reference_descriptor(), &[0.25; 4]);
        assert_eq!(track.inverse_depth(), 0.1);
    }
}
