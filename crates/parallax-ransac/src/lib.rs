#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Parallax RANSAC
//!
//! A problem-agnostic sample-consensus loop. Implement [`Estimator`] for a
//! geometric model and call [`estimate`] with the data, a set of
//! [`RansacParameters`] and the [`RansacType`] to run.
//!
//! ## Example: robust line fit
//!
//! ```rust
//! use parallax_ransac::{estimate, Estimator, RansacParameters, RansacType};
//!
//! struct LineEstimator;
//!
//! impl Estimator for LineEstimator {
//!     type Datum = (f64, f64);
//!     type Model = (f64, f64);
//!
//!     fn sample_size(&self) -> usize {
//!         2
//!     }
//!
//!     fn estimate_models(&self, data: &[(f64, f64)], sample: &[usize]) -> Vec<(f64, f64)> {
//!         let (x0, y0) = data[sample[0]];
//!         let (x1, y1) = data[sample[1]];
//!         if (x1 - x0).abs() < 1e-12 {
//!             return Vec::new();
//!         }
//!         let slope = (y1 - y0) / (x1 - x0);
//!         vec![(slope, y0 - slope * x0)]
//!     }
//!
//!     fn residual(&self, datum: &(f64, f64), model: &(f64, f64)) -> f64 {
//!         let e = datum.1 - (model.0 * datum.0 + model.1);
//!         e * e
//!     }
//! }
//!
//! let data: Vec<(f64, f64)> = (0..50).map(|i| (i as f64, 2.0 * i as f64 + 1.0)).collect();
//! let params = RansacParameters::default().with_error_thresh(1e-6).with_seed(7);
//! let result = estimate(&LineEstimator, &data, &params, RansacType::Ransac)?;
//! assert_eq!(result.summary.inliers.len(), 50);
//! # Ok::<(), parallax_ransac::RansacError>(())
//! ```

mod error;
pub use error::RansacError;

/// The estimator trait implemented by every problem definition.
pub mod estimator;
pub use estimator::Estimator;

/// Configuration of the consensus search.
pub mod params;
pub use params::{RansacParameters, RansacType};

/// The sample-consensus loop and its summary.
pub mod ransac;
pub use ransac::{
    compute_confidence, compute_max_iterations, estimate, RansacResult, RansacSummary,
};

/// Model quality measurements.
pub mod scoring;
pub use scoring::Scoring;
