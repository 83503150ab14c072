// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Direct Solve
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Sparse LU factorisation with partial pivoting via `faer`.
//!
//! The CSR matrix is handed to faer as compressed columns; no dense
//! copy of the operator is ever formed.

use faer::prelude::*;
use faer::sparse::SparseColMat;
use qd_types::constants::DIRECT_BACKWARD_ERROR_TOL;
use qd_types::error::{QdError, QdResult};
use sprs::CsMat;

use crate::sparse::{norm_inf, residual, vec_norm_inf};

/// Result of a direct solve.
#[derive(Debug, Clone)]
pub struct DirectResult {
    pub x: Vec<f64>,
    /// Normwise backward error `‖b − A x‖∞ / (‖A‖∞ ‖x‖∞ + ‖b‖∞)`.
    pub backward_error: f64,
}

/// Solve `A x = b` by sparse LU. Fails on a structurally singular
/// matrix, a non-finite solution, or a backward error above tolerance.
pub fn lu_solve(a: &CsMat<f64>, b: &[f64]) -> QdResult<DirectResult> {
    let n = b.len();
    if a.rows() != n || a.cols() != n {
        return Err(QdError::LinAlg(format!(
            "LU: expected {n}x{n} matrix, got {}x{}",
            a.rows(),
            a.cols()
        )));
    }
    if n == 0 {
        return Ok(DirectResult {
            x: Vec::new(),
            backward_error: 0.0,
        });
    }

    let triplets: Vec<(usize, usize, f64)> = a.iter().map(|(&v, (i, j))| (i, j, v)).collect();
    let csc = SparseColMat::<usize, f64>::try_new_from_triplets(n, n, &triplets)
        .map_err(|e| QdError::LinAlg(format!("LU: cannot build sparse operator: {e:?}")))?;
    let lu = csc
        .sp_lu()
        .map_err(|e| QdError::LinAlg(format!("LU: factorisation failed: {e:?}")))?;
    let rhs = Mat::<f64>::from_fn(n, 1, |i, _| b[i]);
    let sol = lu.solve(&rhs);
    let x: Vec<f64> = (0..n).map(|i| sol.read(i, 0)).collect();
    if x.iter().any(|v| !v.is_finite()) {
        return Err(QdError::LinAlg(
            "LU: matrix is singular (non-finite solution)".to_string(),
        ));
    }

    let mut r = vec![0.0; n];
    residual(a, &x, b, &mut r);
    let denom = norm_inf(a) * vec_norm_inf(&x) + vec_norm_inf(b);
    let backward_error = if denom > 0.0 {
        vec_norm_inf(&r) / denom
    } else {
        0.0
    };
    if backward_error > DIRECT_BACKWARD_ERROR_TOL {
        return Err(QdError::LinAlg(format!(
            "LU: backward error {backward_error:.3e} indicates a numerically singular matrix"
        )));
    }
    Ok(DirectResult { x, backward_error })
}
