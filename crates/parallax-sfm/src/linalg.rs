use glam::{DMat3, DVec3};

/// Singular value decomposition `m = U * diag(s) * V^T` of a 3x3 matrix.
///
/// Singular values are sorted in non-increasing order.
pub(crate) struct Svd3 {
    pub u: DMat3,
    pub s: DVec3,
    pub v: DMat3,
}

pub(crate) fn svd3(m: &DMat3) -> Svd3 {
    let a = faer::Mat::<f64>::from_fn(3, 3, |i, j| m.col(j)[i]);
    let svd = a.svd();
    let u = svd.u();
    let v = svd.v();
    let s = svd.s_diagonal();
    let col = |mat: faer::MatRef<'_, f64>, j: usize| {
        DVec3::new(mat.read(0, j), mat.read(1, j), mat.read(2, j))
    };
    Svd3 {
        u: DMat3::from_cols(col(u, 0), col(u, 1), col(u, 2)),
        s: DVec3::new(s.read(0), s.read(1), s.read(2)),
        v: DMat3::from_cols(col(v, 0), col(v, 1), col(v, 2)),
    }
}

/// Outer product `a * b^T`.
pub(crate) fn outer(a: DVec3, b: DVec3) -> DMat3 {
    DMat3::from_cols(a * b.x, a * b.y, a * b.z)
}

/// Skew-symmetric cross-product matrix, `skew(v) * w == v.cross(w)`.
pub(crate) fn skew(v: DVec3) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(0.0, v.z, -v.y),
        DVec3::new(-v.z, 0.0, v.x),
        DVec3::new(v.y, -v.x, 0.0),
    )
}

/// Nearest rotation to `m` in the Frobenius sense.
pub(crate) fn project_to_rotation(m: &DMat3) -> DMat3 {
    let Svd3 { u, v, .. } = svd3(m);
    let d = if (u * v.transpose()).determinant() < 0.0 {
        -1.0
    } else {
        1.0
    };
    u * DMat3::from_diagonal(DVec3::new(1.0, 1.0, d)) * v.transpose()
}

/// Whether `m` is orthonormal with positive determinant, within `tol`.
pub(crate) fn is_rotation(m: &DMat3, tol: f64) -> bool {
    let deviation = *m * m.transpose() - DMat3::IDENTITY;
    deviation.to_cols_array().iter().all(|x| x.abs() <= tol) && m.determinant() > 0.0
}
