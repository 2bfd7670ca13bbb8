use serde::{Deserialize, Serialize};

use crate::{Estimator, RansacError, RansacParameters, RansacType, Scoring};

/// Summary of a consensus run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RansacSummary {
    /// Indices of the data supporting the returned model, in ascending order.
    pub inliers: Vec<usize>,
    /// Number of iterations performed.
    pub num_iterations: usize,
    /// Probability that an all-inlier sample was drawn at least once.
    pub confidence: f64,
}

/// Output of a successful consensus run.
#[derive(Clone, Debug)]
pub struct RansacResult<M> {
    /// Best model found.
    pub model: M,
    /// Run summary.
    pub summary: RansacSummary,
}

struct Hypothesis<M> {
    model: M,
    cost: f64,
    inliers: Vec<usize>,
}

/// Number of iterations needed to draw an all-inlier sample with probability
/// `1 - failure_probability`, clipped to `[min_iterations, max_iterations]`.
///
/// `N = log(failure_probability) / log(1 - inlier_ratio^sample_size)`
pub fn compute_max_iterations(
    sample_size: usize,
    inlier_ratio: f64,
    failure_probability: f64,
    min_iterations: usize,
    max_iterations: usize,
) -> usize {
    if inlier_ratio <= 0.0 {
        return max_iterations;
    }
    if inlier_ratio >= 1.0 {
        return min_iterations;
    }

    let denom = (1.0 - inlier_ratio.powi(sample_size as i32)).ln();
    if !denom.is_finite() || denom >= 0.0 {
        return max_iterations;
    }

    let n = (failure_probability.ln() / denom).ceil();
    if !n.is_finite() || n >= max_iterations as f64 {
        return max_iterations;
    }
    (n.max(0.0) as usize).clamp(min_iterations, max_iterations)
}

/// Probability that at least one of `num_iterations` minimal samples was
/// drawn entirely from inliers.
pub fn compute_confidence(sample_size: usize, inlier_ratio: f64, num_iterations: usize) -> f64 {
    let p_good_sample = inlier_ratio.powi(sample_size as i32);
    let p_all_bad = (1.0 - p_good_sample).powf(num_iterations as f64);
    (1.0 - p_all_bad).clamp(0.0, 1.0)
}

fn score<E: Estimator>(
    estimator: &E,
    data: &[E::Datum],
    model: &E::Model,
    scoring: Scoring,
    error_thresh: f64,
    residuals: &mut [f64],
    inliers: &mut Vec<usize>,
) -> f64 {
    for (r, datum) in residuals.iter_mut().zip(data) {
        let e = estimator.residual(datum, model);
        *r = if e.is_nan() { f64::INFINITY } else { e };
    }
    scoring.evaluate(residuals, error_thresh, inliers)
}

/// Run a sample-consensus search.
///
/// Minimal samples are drawn without replacement from a clone of
/// `params.rng`. Every candidate model of every sample is scored with the
/// strategy selected by `ransac_type` and [`RansacParameters::use_mle`]. The
/// iteration bound shrinks as better models are found and never drops below
/// `min_iterations`.
///
/// # Errors
///
/// - [`RansacError::InvalidParameter`] for malformed parameters.
/// - [`RansacError::InsufficientData`] when `data` is smaller than one sample.
/// - [`RansacError::NoValidModel`] when every sample was degenerate.
/// - [`RansacError::InsufficientInliers`] when the best model is supported by
///   fewer than `max(min_inliers, sample_size)` data.
pub fn estimate<E: Estimator>(
    estimator: &E,
    data: &[E::Datum],
    params: &RansacParameters,
    ransac_type: RansacType,
) -> Result<RansacResult<E::Model>, RansacError> {
    params.validate()?;

    let n = data.len();
    let sample_size = estimator.sample_size();
    if sample_size == 0 {
        return Err(RansacError::InvalidParameter(
            "estimator sample size must be positive".to_string(),
        ));
    }
    if n < sample_size {
        return Err(RansacError::InsufficientData {
            required: sample_size,
            actual: n,
        });
    }

    let scoring = Scoring::select(ransac_type, params.use_mle);
    let mut rng = params.rng.clone();

    let mut residuals = vec![0.0; n];
    let mut inliers = Vec::with_capacity(n);
    let mut best: Option<Hypothesis<E::Model>> = None;

    let mut num_iterations = 0usize;
    let mut num_degenerate = 0usize;
    let mut max_iterations = params.max_iterations;

    while num_iterations < max_iterations {
        num_iterations += 1;

        let sample = rand::seq::index::sample(&mut rng, n, sample_size).into_vec();
        let models = estimator.estimate_models(data, &sample);
        if models.is_empty() {
            num_degenerate += 1;
            log::trace!("iteration {num_iterations}: degenerate sample {sample:?}");
            continue;
        }

        for model in models {
            let cost = score(
                estimator,
                data,
                &model,
                scoring,
                params.error_thresh,
                &mut residuals,
                &mut inliers,
            );

            if best.as_ref().is_some_and(|b| cost >= b.cost) {
                continue;
            }

            let inlier_ratio = inliers.len() as f64 / n as f64;
            max_iterations = compute_max_iterations(
                sample_size,
                inlier_ratio,
                params.failure_probability,
                params.min_iterations,
                params.max_iterations,
            );
            best = Some(Hypothesis {
                model,
                cost,
                inliers: inliers.clone(),
            });
        }
    }

    let Some(mut best) = best else {
        log::debug!("all {num_iterations} samples were degenerate");
        return Err(RansacError::NoValidModel {
            iterations: num_iterations,
        });
    };

    if params.use_lo {
        if let Some(refined) = estimator.refine_model(data, &best.inliers, &best.model) {
            let cost = score(
                estimator,
                data,
                &refined,
                scoring,
                params.error_thresh,
                &mut residuals,
                &mut inliers,
            );
            if cost <= best.cost {
                best = Hypothesis {
                    model: refined,
                    cost,
                    inliers: inliers.clone(),
                };
            } else {
                log::debug!(
                    "discarding local refinement: cost {cost} is worse than {}",
                    best.cost
                );
            }
        }
    }

    let inlier_ratio = best.inliers.len() as f64 / n as f64;
    let summary = RansacSummary {
        inliers: best.inliers,
        num_iterations,
        confidence: compute_confidence(sample_size, inlier_ratio, num_iterations),
    };

    log::debug!(
        "{:?}: {} iterations ({} degenerate), {}/{} inliers, confidence {:.6}",
        ransac_type,
        summary.num_iterations,
        num_degenerate,
        summary.inliers.len(),
        n,
        summary.confidence
    );

    let required = params.min_inliers.max(sample_size);
    if summary.inliers.len() < required {
        return Err(RansacError::InsufficientInliers {
            required,
            actual: summary.inliers.len(),
            summary: Box::new(summary),
        });
    }

    Ok(RansacResult {
        model: best.model,
        summary,
    })
}
