//! Thin helpers over `sprs` CSR matrices and flat vectors.
//!
//! The solver only needs a handful of kernels (matrix-vector product,
//! diagonal extraction, densification for the direct path), so they are
//! written against the CSR storage directly.

use nalgebra::DMatrix;
use sprs::{CsMat, TriMat};

/// Build a CSR matrix from `(row, col, value)` triplets. Duplicate
/// entries are summed.
pub fn csr_from_triplets(rows: usize, cols: usize, triplets: &[(usize, usize, f64)]) -> CsMat<f64> {
    let mut tri = TriMat::with_capacity((rows, cols), triplets.len());
    for &(r, c, v) in triplets {
        tri.add_triplet(r, c, v);
    }
    tri.to_csr()
}

/// `y = A x` for a CSR matrix.
pub fn spmv(a: &CsMat<f64>, x: &[f64], y: &mut [f64]) {
    assert!(a.is_csr(), "spmv expects CSR storage");
    assert_eq!(a.cols(), x.len(), "spmv: x has wrong length");
    assert_eq!(a.rows(), y.len(), "spmv: y has wrong length");
    for (row, vec) in a.outer_iterator().enumerate() {
        y[row] = vec.iter().map(|(col, &v)| v * x[col]).sum();
    }
}

/// `out = b - A x`.
pub fn residual(a: &CsMat<f64>, x: &[f64], b: &[f64], out: &mut [f64]) {
    spmv(a, x, out);
    for (oi, &bi) in out.iter_mut().zip(b.iter()) {
        *oi = bi - *oi;
    }
}

/// Main diagonal, with zeros where no entry is stored.
pub fn diagonal(a: &CsMat<f64>) -> Vec<f64> {
    let mut diag = vec![0.0; a.rows().min(a.cols())];
    for (row, vec) in a.outer_iterator().enumerate() {
        if row >= diag.len() {
            break;
        }
        for (col, &v) in vec.iter() {
            if col == row {
                diag[row] += v;
            }
        }
    }
    diag
}

/// Infinity norm (max absolute row sum).
pub fn norm_inf(a: &CsMat<f64>) -> f64 {
    a.outer_iterator()
        .map(|vec| vec.iter().map(|(_, v)| v.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

/// Dense copy for the direct factorisation path.
pub fn to_dense(a: &CsMat<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(a.rows(), a.cols());
    for (row, vec) in a.outer_iterator().enumerate() {
        for (col, &v) in vec.iter() {
            dense[(row, col)] += v;
        }
    }
    dense
}

// ───────────────────────── BLAS-like helpers ─────────────────────────

/// Euclidean (L2) norm of a slice.
#[inline]
pub fn vec_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Max-abs norm of a slice.
#[inline]
pub fn vec_norm_inf(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

/// Dot product.
#[inline]
pub fn vec_dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// `y = y + alpha * x` (axpy).
#[inline]
pub fn vec_axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

/// `y = alpha * x` (scale-copy).
#[inline]
pub fn vec_scale(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi = alpha * xi;
    }
}
