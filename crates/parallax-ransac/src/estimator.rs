/// A problem definition for the consensus engine.
///
/// Implementors supply the minimal sample size, a minimal solver and a
/// per-datum residual. The residual must be non-negative and expressed in the
/// same units as [`RansacParameters::error_thresh`](crate::RansacParameters).
pub trait Estimator {
    /// A single observation, e.g. a feature correspondence.
    type Datum;

    /// The model being estimated.
    type Model: Clone;

    /// Number of data needed to fit a model.
    fn sample_size(&self) -> usize;

    /// Fit candidate models to the data selected by `sample`.
    ///
    /// A minimal sample may admit several algebraically valid models; all of
    /// them are returned and scored independently. An empty vector marks a
    /// degenerate sample, which the engine skips.
    fn estimate_models(&self, data: &[Self::Datum], sample: &[usize]) -> Vec<Self::Model>;

    /// Residual of one datum under a model.
    fn residual(&self, datum: &Self::Datum, model: &Self::Model) -> f64;

    /// Re-fit a model using all of its inliers.
    ///
    /// Called once after the sampling loop when local optimization is enabled.
    /// The default implementation does not refine.
    fn refine_model(
        &self,
        _data: &[Self::Datum],
        _inliers: &[usize],
        _model: &Self::Model,
    ) -> Option<Self::Model> {
        None
    }
}
