use crate::RansacType;

/// How a candidate model is scored from its residuals.
///
/// Every strategy returns a cost where lower is better, and collects the
/// indices of residuals within the error threshold as inliers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scoring {
    /// Number of outliers, i.e. maximizing the inlier count.
    InlierSupport,
    /// Truncated quadratic cost: inliers contribute their residual and
    /// outliers the threshold.
    MaximumLikelihood,
    /// Median residual.
    LeastMedian,
}

impl Scoring {
    /// Select the scoring strategy for a consensus type.
    pub fn select(ransac_type: RansacType, use_mle: bool) -> Self {
        match ransac_type {
            RansacType::Ransac if use_mle => Scoring::MaximumLikelihood,
            RansacType::Ransac => Scoring::InlierSupport,
            RansacType::Mlesac => Scoring::MaximumLikelihood,
            RansacType::Lmeds => Scoring::LeastMedian,
        }
    }

    /// Score a set of residuals.
    ///
    /// `inliers` is cleared and filled with the indices of residuals that do
    /// not exceed `error_thresh`.
    pub fn evaluate(&self, residuals: &[f64], error_thresh: f64, inliers: &mut Vec<usize>) -> f64 {
        inliers.clear();
        inliers.extend(
            residuals
                .iter()
                .enumerate()
                .filter(|(_, r)| **r <= error_thresh)
                .map(|(i, _)| i),
        );

        match self {
            Scoring::InlierSupport => (residuals.len() - inliers.len()) as f64,
            Scoring::MaximumLikelihood => residuals.iter().map(|&r| r.min(error_thresh)).sum(),
            Scoring::LeastMedian => median(residuals),
        }
    }
}

fn median(residuals: &[f64]) -> f64 {
    if residuals.is_empty() {
        return f64::INFINITY;
    }
    let mut sorted = residuals.to_vec();
    let mid = sorted.len() / 2;
    let (_, m, _) = sorted.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *m
}
