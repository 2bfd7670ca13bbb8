#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Parallax SfM
//!
//! Recovers the translation direction between two calibrated cameras whose
//! relative rotation is known, from outlier-contaminated feature
//! correspondences, and provides the track and reconstruction types the
//! estimates feed into.
//!
//! ## Example
//!
//! ```rust
//! use glam::{DMat3, DVec3};
//! use parallax_ransac::{RansacParameters, RansacType};
//! use parallax_sfm::estimators::estimate_relative_pose_with_known_orientation;
//! use parallax_sfm::FeatureCorrespondence;
//!
//! let rotation = DMat3::IDENTITY;
//! let position = DVec3::new(-1.3, 0.0, 0.0);
//! let correspondences: Vec<FeatureCorrespondence> = (0..20)
//!     .map(|i| {
//!         let x = DVec3::new(0.1 * i as f64 - 1.0, 0.05 * (i % 7) as f64, 6.0 + 0.2 * i as f64);
//!         FeatureCorrespondence::new(
//!             x.truncate() / x.z,
//!             (rotation * (x - position)).truncate() / (rotation * (x - position)).z,
//!         )
//!     })
//!     .collect();
//!
//! let params = RansacParameters::default()
//!     .with_error_thresh(1e-6)
//!     .with_seed(0);
//! let estimate = estimate_relative_pose_with_known_orientation(
//!     &params,
//!     RansacType::Ransac,
//!     &correspondences,
//!     &rotation,
//! )?;
//! assert!(estimate.position.dot(position.normalize()) > 0.9999);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use glam;

mod correspondence;
pub use correspondence::FeatureCorrespondence;

/// Robust estimators built on the consensus engine.
pub mod estimators;

pub(crate) mod linalg;

/// Two-view geometry: epipolar residuals and minimal solvers.
pub mod pose;

/// Reconstruction container owning views and tracks.
pub mod reconstruction;
pub use reconstruction::{Camera, Reconstruction, ReconstructionError, TrackMut, View};

/// Non-linear refinement of translation directions.
pub mod refine;

mod track;
pub use track::Track;

/// Similarity alignment of point clouds, rotations and reconstructions.
pub mod transformation;

mod types;
pub use types::{TrackId, ViewId};
