// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Preconditioners
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Left preconditioners for the Krylov solver.
//!
//! - [`Jacobi`]: inverse of the main diagonal, cheap and always
//!   constructible (zero diagonal entries act as identity).
//! - [`Ilu0`]: incomplete LU with the sparsity pattern of `A` (no
//!   fill-in). Construction fails on a missing or zero pivot.

use qd_types::error::{QdError, QdResult};
use sprs::CsMat;

use crate::sparse::diagonal;

/// Approximate inverse applied as `z = M⁻¹ r`.
pub trait Preconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]);

    /// Short label used in solver reports.
    fn name(&self) -> &'static str;
}

/// No preconditioning.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Preconditioner for Identity {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        z.copy_from_slice(r);
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

// ───────────────────────────── Jacobi ────────────────────────────────

#[derive(Debug, Clone)]
pub struct Jacobi {
    inv_diag: Vec<f64>,
}

impl Jacobi {
    pub fn new(a: &CsMat<f64>) -> Self {
        let inv_diag = diagonal(a)
            .into_iter()
            .map(|d| if d != 0.0 && d.is_finite() { 1.0 / d } else { 1.0 })
            .collect();
        Jacobi { inv_diag }
    }
}

impl Preconditioner for Jacobi {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        for ((zi, &ri), &d) in z.iter_mut().zip(r.iter()).zip(self.inv_diag.iter()) {
            *zi = ri * d;
        }
    }

    fn name(&self) -> &'static str {
        "diagonal"
    }
}

// ───────────────────────────── ILU(0) ────────────────────────────────

/// Packed `L\U` factors on the CSR pattern of `A`. `L` has an implicit
/// unit diagonal.
#[derive(Debug, Clone)]
pub struct Ilu0 {
    row_ptr: Vec<usize>,
    cols: Vec<usize>,
    vals: Vec<f64>,
    diag_pos: Vec<usize>,
}

impl Ilu0 {
    pub fn new(a: &CsMat<f64>) -> QdResult<Self> {
        let n = a.rows();
        if a.cols() != n {
            return Err(QdError::LinAlg(format!(
                "ILU(0) needs a square matrix, got {}x{}",
                n,
                a.cols()
            )));
        }

        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut cols = Vec::with_capacity(a.nnz());
        let mut vals = Vec::with_capacity(a.nnz());
        row_ptr.push(0);
        for vec in a.outer_iterator() {
            for (col, &v) in vec.iter() {
                cols.push(col);
                vals.push(v);
            }
            row_ptr.push(cols.len());
        }

        let mut diag_pos = Vec::with_capacity(n);
        for i in 0..n {
            let row = &cols[row_ptr[i]..row_ptr[i + 1]];
            match row.binary_search(&i) {
                Ok(p) => diag_pos.push(row_ptr[i] + p),
                Err(_) => {
                    return Err(QdError::LinAlg(format!(
                        "ILU(0): row {i} has no diagonal entry"
                    )))
                }
            }
        }

        // IKJ variant restricted to the existing pattern.
        for i in 0..n {
            for kp in row_ptr[i]..diag_pos[i] {
                let k = cols[kp];
                let pivot = vals[diag_pos[k]];
                if pivot == 0.0 || !pivot.is_finite() {
                    return Err(QdError::LinAlg(format!(
                        "ILU(0): zero pivot at row {k}"
                    )));
                }
                let lik = vals[kp] / pivot;
                vals[kp] = lik;
                let row_k = &cols[diag_pos[k] + 1..row_ptr[k + 1]];
                for jp in kp + 1..row_ptr[i + 1] {
                    let j = cols[jp];
                    if let Ok(q) = row_k.binary_search(&j) {
                        let ukj = vals[diag_pos[k] + 1 + q];
                        vals[jp] -= lik * ukj;
                    }
                }
            }
            let d = vals[diag_pos[i]];
            if d == 0.0 || !d.is_finite() {
                return Err(QdError::LinAlg(format!("ILU(0): zero pivot at row {i}")));
            }
        }

        Ok(Ilu0 {
            row_ptr,
            cols,
            vals,
            diag_pos,
        })
    }
}

impl Preconditioner for Ilu0 {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        let n = self.diag_pos.len();
        // Forward: L y = r
        for i in 0..n {
            let mut sum = r[i];
            for p in self.row_ptr[i]..self.diag_pos[i] {
                sum -= self.vals[p] * z[self.cols[p]];
            }
            z[i] = sum;
        }
        // Backward: U z = y
        for i in (0..n).rev() {
            let mut sum = z[i];
            for p in self.diag_pos[i] + 1..self.row_ptr[i + 1] {
                sum -= self.vals[p] * z[self.cols[p]];
            }
            z[i] = sum / self.vals[self.diag_pos[i]];
        }
    }

    fn name(&self) -> &'static str {
        "ilu"
    }
}
