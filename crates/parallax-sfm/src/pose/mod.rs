//! # Pose
//!
//! Two-view geometry for a pair of calibrated cameras. The first camera sits
//! at the origin with identity orientation. The second camera has orientation
//! `R` (world to camera) and center `c`, so a world point `X` is observed at
//! `R * (X - c)` in its frame.
//!
//! - [`epipolar`]: essential matrix and Sampson residuals
//! - [`position_from_two_rays`]: minimal solver for `c` when `R` is known

/// Essential matrices, Sampson residuals and cheirality.
pub mod epipolar;
pub use epipolar::*;

/// Minimal solver for the camera position given a known rotation.
pub mod position_from_two_rays;
pub use position_from_two_rays::*;
