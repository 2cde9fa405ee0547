#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Rotation matrix helpers.
pub mod rotation;

/// Dense singular value decomposition.
pub mod svd;

/// Two-view linear triangulation.
pub mod triangulation;
