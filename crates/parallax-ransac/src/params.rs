use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::RansacError;

/// Consensus strategy used to score candidate models.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RansacType {
    /// Classic RANSAC. Scores by inlier count, or by the MLE cost when
    /// [`RansacParameters::use_mle`] is set.
    #[default]
    Ransac,
    /// Maximum-likelihood scoring regardless of `use_mle`.
    Mlesac,
    /// Least median of squares.
    Lmeds,
}

/// Parameters of a consensus run.
///
/// The random generator is cloned at the start of every run, so two runs with
/// the same parameters and data produce identical results. Give each
/// concurrent run its own parameters (or a differently seeded generator).
#[derive(Clone, Debug)]
pub struct RansacParameters {
    /// Inlier threshold on the residual (squared normalized error).
    pub error_thresh: f64,
    /// Acceptable probability of never drawing an all-inlier sample.
    pub failure_probability: f64,
    /// Lower bound on the number of iterations.
    pub min_iterations: usize,
    /// Upper bound on the number of iterations.
    pub max_iterations: usize,
    /// Score with the truncated maximum-likelihood cost instead of counting inliers.
    pub use_mle: bool,
    /// Re-fit the best model on its inliers once sampling ends.
    pub use_lo: bool,
    /// Minimum number of inliers required to accept a model.
    pub min_inliers: usize,
    /// Random generator used to draw minimal samples.
    pub rng: StdRng,
}

impl Default for RansacParameters {
    fn default() -> Self {
        Self {
            error_thresh: 1e-5,
            failure_probability: 0.01,
            min_iterations: 100,
            max_iterations: 1000,
            use_mle: false,
            use_lo: false,
            min_inliers: 4,
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }
}

impl RansacParameters {
    /// Create default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inlier threshold.
    pub fn with_error_thresh(mut self, error_thresh: f64) -> Self {
        self.error_thresh = error_thresh;
        self
    }

    /// Set the failure probability.
    pub fn with_failure_probability(mut self, failure_probability: f64) -> Self {
        self.failure_probability = failure_probability;
        self
    }

    /// Set the iteration bounds.
    pub fn with_iterations(mut self, min_iterations: usize, max_iterations: usize) -> Self {
        self.min_iterations = min_iterations;
        self.max_iterations = max_iterations;
        self
    }

    /// Enable or disable maximum-likelihood scoring.
    pub fn with_mle(mut self, use_mle: bool) -> Self {
        self.use_mle = use_mle;
        self
    }

    /// Enable or disable the final re-fit on inliers.
    pub fn with_local_optimization(mut self, use_lo: bool) -> Self {
        self.use_lo = use_lo;
        self
    }

    /// Set the minimum number of inliers.
    pub fn with_min_inliers(mut self, min_inliers: usize) -> Self {
        self.min_inliers = min_inliers;
        self
    }

    /// Seed the random generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Use the given random generator.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Check that the parameters describe a runnable search.
    pub fn validate(&self) -> Result<(), RansacError> {
        if !self.error_thresh.is_finite() || self.error_thresh <= 0.0 {
            return Err(RansacError::InvalidParameter(format!(
                "error_thresh must be positive, got {}",
                self.error_thresh
            )));
        }
        if self.failure_probability.is_nan()
            || self.failure_probability <= 0.0
            || self.failure_probability >= 1.0
        {
            return Err(RansacError::InvalidParameter(format!(
                "failure_probability must lie in (0, 1), got {}",
                self.failure_probability
            )));
        }
        if self.max_iterations == 0 || self.min_iterations > self.max_iterations {
            return Err(RansacError::InvalidParameter(format!(
                "iteration bounds [{}, {}] are empty",
                self.min_iterations, self.max_iterations
            )));
        }
        Ok(())
    }
}
