#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! The calibrator compares, frame after frame, the relative rotation observed by the camera with
//! the relative rotation integrated by the IMU. For a rigid mount both are related by the fixed
//! extrinsic rotation `q_ci`:
//!
//! ```text
//! q_cam ⊗ q_ci = q_ci ⊗ q_imu
//! ```
//!
//! which is linear in `q_ci`. Stacking one 4×4 block per frame and taking the SVD null vector
//! yields the estimate.

mod calibrator;
pub use calibrator::*;

mod history;
pub use history::*;

/// Quaternion multiplication matrices.
pub mod quaternion;
