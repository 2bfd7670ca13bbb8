//! # Estimators
//!
//! Problem definitions for the consensus engine of `parallax-ransac` and the
//! entry points that run them.
//!
//! - [`known_orientation`]: translation direction between two views whose
//!   relative rotation is known

/// Relative translation with a known rotation.
pub mod known_orientation;
pub use known_orientation::*;
