use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

/// A pair of matched observations of the same scene point in two views.
///
/// Both features are in normalized image coordinates, i.e. pixel
/// coordinates with the intrinsics removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCorrespondence {
    /// Observation in the first view.
    pub feature1: DVec2,
    /// Observation in the second view.
    pub feature2: DVec2,
}

impl FeatureCorrespondence {
    /// Create a correspondence from two normalized observations.
    pub fn new(feature1: DVec2, feature2: DVec2) -> Self {
        Self { feature1, feature2 }
    }

    /// Homogeneous ray of the first observation, `(x, y, 1)`.
    pub fn bearing1(&self) -> DVec3 {
        self.feature1.extend(1.0)
    }

    /// Homogeneous ray of the second observation, `(x, y, 1)`.
    pub fn bearing2(&self) -> DVec3 {
        self.feature2.extend(1.0)
    }
}
