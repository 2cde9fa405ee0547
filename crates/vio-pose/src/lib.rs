#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Two-view relative pose
//!
//! - [`essential`] — essential matrix estimation and decomposition into four pose hypotheses
//! - [`ransac`] — seeded RANSAC around the 8-point estimator
//! - [`chirality`] — positive-depth scoring and hypothesis selection
//! - [`solver`] — [`RelativePoseSolver`], the full pipeline

mod correspondence;
pub use correspondence::*;

/// Positive-depth scoring of pose hypotheses.
pub mod chirality;

/// Essential matrix estimation and decomposition.
pub mod essential;

/// RANSAC around the essential matrix estimator.
pub mod ransac;

/// Relative pose solver.
pub mod solver;
pub use solver::{RelativePose, RelativePoseConfig, RelativePoseError, RelativePoseSolver};
