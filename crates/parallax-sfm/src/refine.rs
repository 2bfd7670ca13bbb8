//! Levenberg-Marquardt refinement of a translation direction.
//!
//! The direction lives on the unit sphere and is updated through two tangent
//! parameters, so the scale ambiguity of the problem never enters the normal
//! equations. Residuals are the signed Sampson errors of the selected
//! correspondences, the same quantity the consensus search scores with.

use glam::{DMat2, DMat3, DVec2, DVec3};

use crate::pose::{essential_from_rotation_and_position, sampson_residual};
use crate::FeatureCorrespondence;

/// Parameters controlling the LM refinement.
#[derive(Debug, Clone)]
pub struct LmRefineParams {
    /// Maximum number of LM iterations.
    pub max_iterations: usize,
    /// Convergence threshold on the relative cost decrease.
    pub cost_tolerance: f64,
    /// Convergence threshold on the gradient norm.
    pub gradient_tolerance: f64,
    /// Initial damping factor (lambda).
    pub initial_lambda: f64,
}

impl Default for LmRefineParams {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            cost_tolerance: 1e-10,
            gradient_tolerance: 1e-16,
            initial_lambda: 1e-3,
        }
    }
}

impl LmRefineParams {
    /// Create default refinement parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set cost tolerance.
    pub fn with_cost_tolerance(mut self, tol: f64) -> Self {
        self.cost_tolerance = tol;
        self
    }

    /// Set gradient tolerance.
    pub fn with_gradient_tolerance(mut self, tol: f64) -> Self {
        self.gradient_tolerance = tol;
        self
    }

    /// Set initial lambda.
    pub fn with_initial_lambda(mut self, lambda: f64) -> Self {
        self.initial_lambda = lambda;
        self
    }
}

/// Errors raised by the refinement.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RefineError {
    /// Fewer correspondences than degrees of freedom.
    #[error("Refinement needs at least {required} correspondences, got {actual}")]
    NotEnoughObservations {
        /// Minimum number of correspondences.
        required: usize,
        /// Number of correspondences supplied.
        actual: usize,
    },

    /// The cost or the initial direction is not finite.
    #[error("Refinement produced a non-finite cost")]
    NonFinite,

    /// The iteration budget ran out before convergence.
    #[error("Refinement did not converge after {iterations} iterations")]
    NotConverged {
        /// Iterations performed.
        iterations: usize,
    },
}

/// Output of a converged refinement.
#[derive(Debug, Clone, Copy)]
pub struct RefineSummary {
    /// Refined unit direction.
    pub position: DVec3,
    /// Half the sum of squared residuals at the initial direction.
    pub initial_cost: f64,
    /// Half the sum of squared residuals at the refined direction.
    pub final_cost: f64,
    /// Iterations performed.
    pub num_iterations: usize,
}

const JACOBIAN_STEP: f64 = 1e-7;
const MAX_LAMBDA: f64 = 1e12;

struct DirectionProblem<'a> {
    rotation: &'a DMat3,
    correspondences: &'a [FeatureCorrespondence],
    indices: &'a [usize],
}

impl DirectionProblem<'_> {
    fn residuals(&self, position: &DVec3, out: &mut [f64]) {
        let e = essential_from_rotation_and_position(self.rotation, position);
        for (r, &i) in out.iter_mut().zip(self.indices) {
            *r = sampson_residual(&e, &self.correspondences[i]);
        }
    }

    fn cost(residuals: &[f64]) -> f64 {
        0.5 * residuals.iter().map(|r| r * r).sum::<f64>()
    }
}

/// Move `position` along the tangent plane spanned by `basis` and renormalize.
fn retract(position: DVec3, basis: (DVec3, DVec3), delta: DVec2) -> DVec3 {
    (position + basis.0 * delta.x + basis.1 * delta.y).normalize()
}

/// Refine the unit position of the second camera over a subset of
/// correspondences.
///
/// # Arguments
///
/// * `rotation` - Known rotation of the second camera.
/// * `correspondences` - All correspondences.
/// * `indices` - Correspondences used by the refinement, typically the inliers.
/// * `initial` - Starting direction, e.g. the consensus estimate.
/// * `params` - LM settings.
///
/// # Errors
///
/// The refinement never returns a direction with a higher cost than the
/// initial one; it fails instead when it cannot converge.
pub fn refine_position_with_known_rotation(
    rotation: &DMat3,
    correspondences: &[FeatureCorrespondence],
    indices: &[usize],
    initial: &DVec3,
    params: &LmRefineParams,
) -> Result<RefineSummary, RefineError> {
    if indices.len() < 2 {
        return Err(RefineError::NotEnoughObservations {
            required: 2,
            actual: indices.len(),
        });
    }
    if !initial.is_finite() || initial.length_squared() == 0.0 {
        return Err(RefineError::NonFinite);
    }

    let problem = DirectionProblem {
        rotation,
        correspondences,
        indices,
    };

    let m = indices.len();
    let mut position = initial.normalize();
    let mut residuals = vec![0.0; m];
    let mut residuals_plus = vec![0.0; m];
    let mut residuals_minus = vec![0.0; m];
    let mut jacobian = vec![DVec2::ZERO; m];

    problem.residuals(&position, &mut residuals);
    let initial_cost = DirectionProblem::cost(&residuals);
    if !initial_cost.is_finite() {
        return Err(RefineError::NonFinite);
    }

    let mut cost = initial_cost;
    let mut lambda = params.initial_lambda;

    for iteration in 1..=params.max_iterations {
        let basis = position.any_orthonormal_pair();

        // numerical Jacobian by central differences on the tangent plane
        for k in 0..2 {
            let mut delta = DVec2::ZERO;
            delta[k] = JACOBIAN_STEP;
            problem.residuals(&retract(position, basis, delta), &mut residuals_plus);
            problem.residuals(&retract(position, basis, -delta), &mut residuals_minus);
            for (j, (p, n)) in jacobian
                .iter_mut()
                .zip(residuals_plus.iter().zip(&residuals_minus))
            {
                j[k] = (p - n) / (2.0 * JACOBIAN_STEP);
            }
        }

        let mut jtj = DMat2::ZERO;
        let mut jtr = DVec2::ZERO;
        for (j, r) in jacobian.iter().zip(&residuals) {
            jtj += DMat2::from_cols(*j * j.x, *j * j.y);
            jtr += *j * *r;
        }

        if !jtr.is_finite() || !jtj.is_finite() {
            return Err(RefineError::NonFinite);
        }
        if jtr.length() <= params.gradient_tolerance {
            log::trace!("refinement converged on gradient after {iteration} iterations");
            return Ok(RefineSummary {
                position,
                initial_cost,
                final_cost: cost,
                num_iterations: iteration,
            });
        }

        // inner loop: raise the damping until a step decreases the cost
        loop {
            let damping = DMat2::from_diagonal(DVec2::new(jtj.x_axis.x, jtj.y_axis.y) * lambda);
            let system = jtj + damping;
            let det = system.determinant();
            if det.abs() > f64::MIN_POSITIVE {
                let step = -(system.inverse() * jtr);
                let candidate = retract(position, basis, step);
                problem.residuals(&candidate, &mut residuals_plus);
                let candidate_cost = DirectionProblem::cost(&residuals_plus);

                if candidate_cost.is_finite() && candidate_cost < cost {
                    let decrease = (cost - candidate_cost) / cost;
                    position = candidate;
                    cost = candidate_cost;
                    residuals.copy_from_slice(&residuals_plus);
                    lambda = (lambda * 0.1).max(1e-12);
                    if decrease <= params.cost_tolerance {
                        log::trace!("refinement converged on cost after {iteration} iterations");
                        return Ok(RefineSummary {
                            position,
                            initial_cost,
                            final_cost: cost,
                            num_iterations: iteration,
                        });
                    }
                    break;
                }
            }

            lambda *= 10.0;
            if lambda > MAX_LAMBDA {
                // no descent direction left: the current direction is a minimum
                return Ok(RefineSummary {
                    position,
                    initial_cost,
                    final_cost: cost,
                    num_iterations: iteration,
                });
            }
        }
    }

    Err(RefineError::NotConverged {
        iterations: params.max_iterations,
    })
}
