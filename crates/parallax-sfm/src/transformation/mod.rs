//! # Transformation
//!
//! Similarity transforms `x' = s * R * x + t` between reconstructions and the
//! closed-form routines that estimate them.
//!
//! - [`align_point_clouds`]: weighted Umeyama alignment of two point sets
//! - [`align_rotations`](mod@align_rotations): global rotation aligning two sets of orientations
//! - [`align_reconstructions`]: alignment of two reconstructions through the
//!   centers of the views they share, plain or robust
//! - [`similarity`]: the transform itself and its application to a
//!   reconstruction

/// Umeyama alignment of corresponding points.
pub mod align_point_clouds;
pub use align_point_clouds::*;

/// Alignment of rotation sets.
pub mod align_rotations;
pub use align_rotations::*;

/// Alignment of whole reconstructions.
pub mod align_reconstructions;
pub use align_reconstructions::*;

/// Similarity transforms and their application to reconstructions.
pub mod similarity;
pub use similarity::*;

/// Errors returned by the alignment routines.
#[derive(thiserror::Error, Debug)]
pub enum AlignmentError {
    /// The two input sequences differ in length.
    #[error("Input lengths differ: {left} vs {right}")]
    MismatchedLengths {
        /// Length of the first sequence.
        left: usize,
        /// Length of the second sequence.
        right: usize,
    },

    /// Too few correspondences to fix a similarity.
    #[error("Need at least {required} correspondences, got {actual}")]
    NotEnoughCorrespondences {
        /// Minimum number of correspondences.
        required: usize,
        /// Number of correspondences supplied.
        actual: usize,
    },

    /// Weights must be finite, non-negative and not all zero.
    #[error("Invalid alignment weights")]
    InvalidWeights,

    /// The source points coincide, so scale and rotation are undefined.
    #[error("Source points are degenerate")]
    Degenerate,

    /// The robust alignment found no consensus.
    #[error(transparent)]
    Ransac(#[from] parallax_ransac::RansacError),
}
