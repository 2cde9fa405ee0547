use glam::{DMat3, DVec3};

use crate::svd::dense_svd;

/// Triangulate one point from two bearing observations with the linear (DLT) method.
///
/// The first camera sits at `[I | 0]`, the second at `[R | t]`, so a point `X` expressed in the
/// first camera frame is seen by the second camera at `R · X + t`.
///
/// # Arguments
///
/// * `b1` - Bearing of the point in the first view (any non-zero scale).
/// * `b2` - Bearing of the point in the second view (any non-zero scale).
/// * `r` - Rotation of the second projection matrix.
/// * `t` - Translation of the second projection matrix.
///
/// # Returns
///
/// The point in the first camera frame, or `None` when it lies at infinity.
pub fn triangulate_point_linear(b1: &DVec3, b2: &DVec3, r: &DMat3, t: &DVec3) -> Option<DVec3> {
    let p1 = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
    ];
    let p2 = [
        [r.x_axis.x, r.y_axis.x, r.z_axis.x, t.x],
        [r.x_axis.y, r.y_axis.y, r.z_axis.y, t.y],
        [r.x_axis.z, r.y_axis.z, r.z_axis.z, t.z],
    ];

    let mut a = faer::Mat::<f64>::zeros(4, 4);
    write_dlt_row(&mut a, 0, b1.x, b1.z, &p1[2], &p1[0]);
    write_dlt_row(&mut a, 1, b1.y, b1.z, &p1[2], &p1[1]);
    write_dlt_row(&mut a, 2, b2.x, b2.z, &p2[2], &p2[0]);
    write_dlt_row(&mut a, 3, b2.y, b2.z, &p2[2], &p2[1]);

    let svd = dense_svd(a.as_ref()).ok()?;
    let xh = svd.null_vector();
    let w = xh[3];
    if w.abs() < 1e-12 {
        return None;
    }
    Some(DVec3::new(xh[0] / w, xh[1] / w, xh[2] / w))
}

// row = x * P_3 - z * P_k, the homogeneous form of x / z = (P_k X) / (P_3 X)
fn write_dlt_row(a: &mut faer::Mat<f64>, row: usize, x: f64, z: f64, p3: &[f64; 4], pk: &[f64; 4]) {
    for j in 0..4 {
        a.write(row, j, x * p3[j] - z * pk[j]);
    }
}

/// Depths of a triangulated point in both views, `(z₁, z₂)`.
pub fn two_view_depths(x: &DVec3, r: &DMat3, t: &DVec3) -> (f64, f64) {
    let x2 = *r * *x + *t;
    (x.z, x2.z)
}
