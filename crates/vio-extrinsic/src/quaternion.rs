//! Quaternions as linear maps on `(x, y, z, w)` coefficient vectors.
//!
//! For unit quaternions `q` and `p`:
//!
//! ```text
//! q ⊗ p = L(q) · p
//! p ⊗ q = R(q) · p
//! ```

use glam::{DMat4, DQuat, DVec4};

/// Left multiplication matrix `L(q)`, such that `L(q) · p = q ⊗ p`.
///
/// ```text
/// L(q) = | w·I + [v]ₓ   v |
///        |   -vᵀ        w |
/// ```
pub fn quat_left(q: &DQuat) -> DMat4 {
    let (x, y, z, w) = (q.x, q.y, q.z, q.w);
    DMat4::from_cols(
        DVec4::new(w, z, -y, -x),
        DVec4::new(-z, w, x, -y),
        DVec4::new(y, -x, w, -z),
        DVec4::new(x, y, z, w),
    )
}

/// Right multiplication matrix `R(q)`, such that `R(q) · p = p ⊗ q`.
///
/// ```text
/// R(q) = | w·I - [v]ₓ   v |
///        |   -vᵀ        w |
/// ```
pub fn quat_right(q: &DQuat) -> DMat4 {
    let (x, y, z, w) = (q.x, q.y, q.z, q.w);
    DMat4::from_cols(
        DVec4::new(w, -z, y, -x),
        DVec4::new(z, w, -x, -y),
        DVec4::new(-y, x, w, -z),
        DVec4::new(x, y, z, w),
    )
}
