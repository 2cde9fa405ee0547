use glam::{DMat3, DVec2, DVec3};
use vio_linalg::svd::{dense_svd, svd3};

use crate::{Correspondence, RelativePoseError};

/// Minimum number of correspondences of the linear estimator.
pub const MIN_CORRESPONDENCES_8POINT: usize = 8;

/// Estimate the essential matrix with the normalized 8-point algorithm.
///
/// Bearings are projected on the normalized image plane and conditioned with a similarity
/// transform (zero mean, average distance √2) before solving `x₂ᵀ E x₁ = 0` in the least-squares
/// sense. The result satisfies the essential constraint: two equal singular values and one zero.
///
/// # Arguments
///
/// * `correspondences` - At least eight forward-pointing bearing pairs.
///
/// # Returns
///
/// The essential matrix up to scale and sign.
pub fn essential_8point(correspondences: &[Correspondence]) -> Result<DMat3, RelativePoseError> {
    let n = correspondences.len();
    if n < MIN_CORRESPONDENCES_8POINT {
        return Err(RelativePoseError::InsufficientData {
            required: MIN_CORRESPONDENCES_8POINT,
            actual: n,
        });
    }

    let (x1, x2): (Vec<DVec2>, Vec<DVec2>) =
        correspondences.iter().map(|c| c.normalized()).unzip();
    let (x1n, t1) = normalize_points_2d(&x1);
    let (x2n, t2) = normalize_points_2d(&x2);

    // design matrix A (N x 9) for x2^T * E * x1 = 0, E stored row-major
    let mut a = faer::Mat::<f64>::zeros(n, 9);
    for i in 0..n {
        let (x, y) = (x1n[i].x, x1n[i].y);
        let (xp, yp) = (x2n[i].x, x2n[i].y);
        a.write(i, 0, xp * x);
        a.write(i, 1, xp * y);
        a.write(i, 2, xp);
        a.write(i, 3, yp * x);
        a.write(i, 4, yp * y);
        a.write(i, 5, yp);
        a.write(i, 6, x);
        a.write(i, 7, y);
        a.write(i, 8, 1.0);
    }

    let svd = dense_svd(a.as_ref()).map_err(|_| RelativePoseError::InsufficientData {
        required: MIN_CORRESPONDENCES_8POINT,
        actual: n,
    })?;
    let e = svd.null_vector();
    let e_norm = DMat3::from_cols(
        DVec3::new(e[0], e[3], e[6]),
        DVec3::new(e[1], e[4], e[7]),
        DVec3::new(e[2], e[5], e[8]),
    );

    // undo the conditioning: E = T2^T * E' * T1
    let e_denorm = t2.transpose() * e_norm * t1;
    Ok(enforce_essential_constraints(&e_denorm))
}

/// Enforce the (1, 1, 0) singular value constraint on an essential matrix.
pub fn enforce_essential_constraints(e: &DMat3) -> DMat3 {
    let svd = svd3(e);
    let s = DMat3::from_diagonal(DVec3::new(1.0, 1.0, 0.0));
    *svd.u() * s * svd.v().transpose()
}

/// Sampson distance of a correspondence to the epipolar geometry `E`.
///
/// The distance is measured on the normalized image plane and is invariant to the scale of `E`.
pub fn sampson_distance(e: &DMat3, correspondence: &Correspondence) -> f64 {
    let (p1, p2) = correspondence.normalized();
    let x1 = p1.extend(1.0);
    let x2 = p2.extend(1.0);
    let ex1 = *e * x1;
    let etx2 = e.transpose() * x2;
    let num = x2.dot(ex1);
    let den = ex1.x * ex1.x + ex1.y * ex1.y + etx2.x * etx2.x + etx2.y * etx2.y;
    if den <= f64::EPSILON {
        return f64::INFINITY;
    }
    num * num / den
}

fn normalize_points_2d(x: &[DVec2]) -> (Vec<DVec2>, DMat3) {
    let n = x.len() as f64;
    let mean = x.iter().fold(DVec2::ZERO, |acc, p| acc + *p) / n;
    let mean_dist = x.iter().map(|p| (*p - mean).length()).sum::<f64>() / n;
    let scale = if mean_dist > 0.0 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let xn = x.iter().map(|p| (*p - mean) * scale).collect();

    // similarity T = [[s, 0, -s*mx], [0, s, -s*my], [0, 0, 1]]
    let t = DMat3::from_cols(
        DVec3::new(scale, 0.0, 0.0),
        DVec3::new(0.0, scale, 0.0),
        DVec3::new(-scale * mean.x, -scale * mean.y, 1.0),
    );
    (xn, t)
}

/// One of the four `(R, t)` interpretations of an essential matrix.
///
/// The second camera sees a point `X` of the first camera frame at `R · X + t`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseHypothesis {
    /// Candidate rotation.
    pub rotation: DMat3,
    /// Candidate unit translation.
    pub translation: DVec3,
}

impl PoseHypothesis {
    /// The same hypothesis with a reflection turned into a proper rotation.
    ///
    /// `-R` is a rotation whenever `R` is an orthogonal matrix with determinant -1.
    pub fn proper(self) -> Self {
        if self.rotation.determinant() < 0.0 {
            Self {
                rotation: self.rotation * -1.0,
                translation: self.translation,
            }
        } else {
            self
        }
    }
}

/// The two rotations and the translation direction factored out of an essential matrix.
#[derive(Clone, Copy, Debug)]
pub struct EssentialDecomposition {
    /// `U · W · Vᵀ`.
    pub r1: DMat3,
    /// `U · Wᵀ · Vᵀ`.
    pub r2: DMat3,
    /// Third left singular vector.
    pub t: DVec3,
}

impl EssentialDecomposition {
    /// The four hypotheses, ordered `(R1, t)`, `(R1, -t)`, `(R2, t)`, `(R2, -t)`.
    pub fn hypotheses(&self) -> [PoseHypothesis; 4] {
        [
            PoseHypothesis {
                rotation: self.r1,
                translation: self.t,
            },
            PoseHypothesis {
                rotation: self.r1,
                translation: -self.t,
            },
            PoseHypothesis {
                rotation: self.r2,
                translation: self.t,
            },
            PoseHypothesis {
                rotation: self.r2,
                translation: -self.t,
            },
        ]
    }
}

/// Decompose an essential matrix into its two rotations and translation direction.
///
/// The orthogonal factors are used as returned by the SVD, so either rotation may come out as a
/// reflection; callers either negate `E` and decompose again or use [`PoseHypothesis::proper`].
pub fn decompose_essential(e: &DMat3) -> EssentialDecomposition {
    let svd = svd3(e);
    let u = *svd.u();
    let v = *svd.v();

    // W = [[0, -1, 0], [1, 0, 0], [0, 0, 1]]
    let w = DMat3::from_cols(
        DVec3::new(0.0, 1.0, 0.0),
        DVec3::new(-1.0, 0.0, 0.0),
        DVec3::new(0.0, 0.0, 1.0),
    );

    EssentialDecomposition {
        r1: u * w * v.transpose(),
        r2: u * w.transpose() * v.transpose(),
        t: u.z_axis,
    }
}
