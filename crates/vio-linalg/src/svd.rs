//! Singular value decomposition wrappers.
//!
//! Two entry points are provided:
//!
//! * [`dense_svd`] for dynamically sized design matrices (N×9 epipolar systems, 4N×4 quaternion
//!   systems, 4×4 DLT systems). Only singular values and the full square `V` are kept, so the
//!   null-space direction is available even for under-determined systems.
//! * [`svd3`] for 3×3 matrices expressed as [`glam::DMat3`].
//!
//! Singular values are returned in non-increasing order.
//!
//! # Example
//!
//! ```
//! use glam::DMat3;
//! use vio_linalg::svd::svd3;
//!
//! let m = DMat3::from_diagonal(glam::DVec3::new(1.0, 3.0, 2.0));
//! let svd = svd3(&m);
//! assert!((svd.s().x - 3.0).abs() < 1e-12);
//! assert!((svd.s().z - 1.0).abs() < 1e-12);
//! ```

use faer::{Mat, MatRef};
use glam::{DMat3, DVec3};

/// Error type for the dense decomposition.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SvdError {
    /// The matrix has no rows or no columns.
    #[error("Cannot decompose an empty {rows}x{cols} matrix")]
    EmptyMatrix {
        /// Number of rows of the input.
        rows: usize,
        /// Number of columns of the input.
        cols: usize,
    },
}

/// Singular values and right singular vectors of a dense matrix `A = U Σ Vᵀ`.
///
/// The left factor is never formed: the design matrices of this crate only need the null space.
#[derive(Debug, Clone)]
pub struct DenseSvd {
    singular_values: Vec<f64>,
    v: Mat<f64>,
}

impl DenseSvd {
    /// Singular values in non-increasing order, `min(rows, cols)` of them.
    pub fn singular_values(&self) -> &[f64] {
        &self.singular_values
    }

    /// Right singular vectors as a square `cols × cols` matrix.
    pub fn v(&self) -> MatRef<'_, f64> {
        self.v.as_ref()
    }

    /// The right singular vector associated with the smallest singular value.
    ///
    /// This is the least-squares minimizer of `|A x|` subject to `|x| = 1`.
    pub fn null_vector(&self) -> Vec<f64> {
        let last = self.v.ncols() - 1;
        (0..self.v.nrows()).map(|i| self.v.read(i, last)).collect()
    }
}

/// Compute the singular values and right singular vectors of a dense matrix.
///
/// Tall matrices are first reduced to their `cols × cols` triangular QR factor, which has the
/// same singular values and right singular vectors, so the cost of the decomposition does not grow
/// with the number of rows beyond the QR step. Wide matrices use the full decomposition so that
/// `V` spans the whole column space, including the null space.
pub fn dense_svd(a: MatRef<'_, f64>) -> Result<DenseSvd, SvdError> {
    let (rows, cols) = (a.nrows(), a.ncols());
    if rows == 0 || cols == 0 {
        return Err(SvdError::EmptyMatrix { rows, cols });
    }

    let svd = if rows > cols {
        a.qr().compute_thin_r().svd()
    } else {
        a.svd()
    };
    let s = svd.s_diagonal();

    Ok(DenseSvd {
        singular_values: (0..s.nrows()).map(|i| s[i]).collect(),
        v: svd.v().to_owned(),
    })
}

/// Result of a 3×3 SVD `M = U diag(s) Vᵀ`.
#[derive(Debug, Clone, Copy)]
pub struct Svd3 {
    u: DMat3,
    s: DVec3,
    v: DMat3,
}

impl Svd3 {
    /// Left singular vectors.
    #[inline]
    pub fn u(&self) -> &DMat3 {
        &self.u
    }

    /// Singular values, largest first.
    #[inline]
    pub fn s(&self) -> &DVec3 {
        &self.s
    }

    /// Right singular vectors.
    #[inline]
    pub fn v(&self) -> &DMat3 {
        &self.v
    }
}

/// Compute the SVD of a 3×3 matrix in double precision.
///
/// The orthogonal factors are returned as produced by the decomposition: their determinants may
/// be -1.
pub fn svd3(m: &DMat3) -> Svd3 {
    let a = mat3_to_faer(m);
    let svd = a.svd();
    let s = svd.s_diagonal();
    Svd3 {
        u: faer_to_mat3(svd.u()),
        s: DVec3::new(s[0], s[1], s[2]),
        v: faer_to_mat3(svd.v()),
    }
}

/// Copy a [`DMat3`] into a dense `3×3` faer matrix.
pub fn mat3_to_faer(m: &DMat3) -> Mat<f64> {
    Mat::<f64>::from_fn(3, 3, |i, j| m.col(j)[i])
}

/// Copy the top-left `3×3` block of a faer matrix into a [`DMat3`].
pub fn faer_to_mat3(m: MatRef<'_, f64>) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(m.read(0, 0), m.read(1, 0), m.read(2, 0)),
        DVec3::new(m.read(0, 1), m.read(1, 1), m.read(2, 1)),
        DVec3::new(m.read(0, 2), m.read(1, 2), m.read(2, 2)),
    )
}
