use glam::{DMat3, DQuat, DVec3};

use crate::svd::svd3;

/// Skew-symmetric matrix `[v]ₓ` such that `[v]ₓ · w = v × w`.
pub fn skew(v: DVec3) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(0.0, v.z, -v.y),
        DVec3::new(-v.z, 0.0, v.x),
        DVec3::new(v.y, -v.x, 0.0),
    )
}

/// Check that a matrix is orthonormal with determinant +1 within `tol`.
pub fn is_rotation(m: &DMat3, tol: f64) -> bool {
    let rrt = *m * m.transpose();
    let eye = DMat3::IDENTITY;
    let ortho = rrt
        .to_cols_array()
        .iter()
        .zip(eye.to_cols_array().iter())
        .all(|(a, b)| (a - b).abs() <= tol);
    ortho && (m.determinant() - 1.0).abs() <= tol
}

/// Project a 3×3 matrix onto the closest rotation in the Frobenius sense.
///
/// A reflection (`det(U Vᵀ) < 0`) is corrected by flipping the last singular direction.
pub fn project_to_so3(m: &DMat3) -> DMat3 {
    let svd = svd3(m);
    let u = *svd.u();
    let v = *svd.v();
    if (u * v.transpose()).determinant() < 0.0 {
        let correction = DMat3::from_diagonal(DVec3::new(1.0, 1.0, -1.0));
        u * correction * v.transpose()
    } else {
        u * v.transpose()
    }
}

/// Unit quaternion of a rotation matrix with a non-negative scalar part.
///
/// `q` and `-q` describe the same rotation; fixing the sign keeps quaternion equations that mix
/// several rotations consistent.
pub fn quat_from_rotation(m: &DMat3) -> DQuat {
    let q = DQuat::from_mat3(m).normalize();
    if q.w < 0.0 {
        -q
    } else {
        q
    }
}

/// Angle in degrees of the rotation taking `a` to `b`.
pub fn rotation_angle_deg(a: &DMat3, b: &DMat3) -> f64 {
    let qa = quat_from_rotation(a);
    let qb = quat_from_rotation(b);
    (2.0 * qa.dot(qb).abs().clamp(0.0, 1.0).acos()).to_degrees()
}
