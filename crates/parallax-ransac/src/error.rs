use crate::ransac::RansacSummary;

/// Errors returned by the consensus engine.
#[derive(thiserror::Error, Debug)]
pub enum RansacError {
    /// The parameters are malformed.
    #[error("Invalid RANSAC parameter: {0}")]
    InvalidParameter(String),

    /// Not enough data to draw a single minimal sample.
    #[error("Need at least {required} data points, got {actual}")]
    InsufficientData {
        /// Minimal sample size of the estimator.
        required: usize,
        /// Number of data points supplied.
        actual: usize,
    },

    /// Every sample in the budget was degenerate.
    #[error("No valid model found after {iterations} iterations")]
    NoValidModel {
        /// Number of iterations performed.
        iterations: usize,
    },

    /// The best model is not supported by enough inliers.
    #[error("Best model has {actual} inliers, at least {required} are required")]
    InsufficientInliers {
        /// Minimum number of inliers for acceptance.
        required: usize,
        /// Inliers of the best model.
        actual: usize,
        /// Summary of the run that produced the rejected model.
        summary: Box<RansacSummary>,
    },
}
