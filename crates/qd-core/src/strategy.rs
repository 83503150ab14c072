// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — QD Solver Strategy
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Ordered solve attempts with fallback.
//!
//! | configured          | attempts                                   |
//! |---------------------|--------------------------------------------|
//! | direct              | LU                                         |
//! | iterative, diagonal | GMRES+Jacobi → GMRES+ILU(0) → LU           |
//! | iterative, ilu      | GMRES+ILU(0) → LU                          |
//!
//! The caller's vector is written only when an attempt succeeds.

use std::fmt;

use log::{debug, warn};
use qd_math::direct::lu_solve;
use qd_math::gmres::{gmres_solve, GmresConfig};
use qd_math::precond::{Ilu0, Jacobi, Preconditioner};
use qd_types::config::{PreconditionerKind, SolveMethod, SolverConfig};
use qd_types::error::{QdError, QdResult};
use sprs::CsMat;

/// One entry of the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveAttempt {
    Gmres(PreconditionerKind),
    Direct,
}

impl fmt::Display for SolveAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveAttempt::Gmres(PreconditionerKind::Diagonal) => write!(f, "gmres+jacobi"),
            SolveAttempt::Gmres(PreconditionerKind::Ilu) => write!(f, "gmres+ilu0"),
            SolveAttempt::Direct => write!(f, "direct-lu"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverState {
    #[default]
    NotSolved,
    Solved(SolveAttempt),
    Failed,
}

/// Outcome of a successful solve.
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub method: SolveAttempt,
    /// Krylov iterations (zero for the direct path).
    pub iterations: usize,
    /// Relative residual (iterative) or normwise backward error (direct).
    pub residual: f64,
    /// Attempts that failed before `method`, with their reasons.
    pub failed_attempts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SolverStrategy {
    config: SolverConfig,
    state: SolverState,
}

impl SolverStrategy {
    pub fn new(config: SolverConfig) -> Self {
        SolverStrategy {
            config,
            state: SolverState::NotSolved,
        }
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Attempts in the order they will be tried.
    pub fn plan(&self) -> Vec<SolveAttempt> {
        match (self.config.method, self.config.preconditioner) {
            (SolveMethod::Direct, _) => vec![SolveAttempt::Direct],
            (SolveMethod::Iterative, PreconditionerKind::Diagonal) => vec![
                SolveAttempt::Gmres(PreconditionerKind::Diagonal),
                SolveAttempt::Gmres(PreconditionerKind::Ilu),
                SolveAttempt::Direct,
            ],
            (SolveMethod::Iterative, PreconditionerKind::Ilu) => vec![
                SolveAttempt::Gmres(PreconditionerKind::Ilu),
                SolveAttempt::Direct,
            ],
        }
    }

    /// Solve `A x = b`, warm-starting iterative attempts from `x`.
    pub fn solve(&mut self, a: &CsMat<f64>, b: &[f64], x: &mut [f64]) -> QdResult<SolveReport> {
        let plan = self.plan();
        let mut failed: Vec<String> = Vec::new();
        let mut last_error = String::new();

        for (k, attempt) in plan.iter().enumerate() {
            match self.run(*attempt, a, b, x) {
                Ok((solution, iterations, residual)) => {
                    x.copy_from_slice(&solution);
                    self.state = SolverState::Solved(*attempt);
                    debug!("{attempt} solved {} unknowns: {iterations} iterations, residual {residual:.3e}", b.len());
                    return Ok(SolveReport {
                        method: *attempt,
                        iterations,
                        residual,
                        failed_attempts: failed,
                    });
                }
                Err(reason) => {
                    match plan.get(k + 1) {
                        Some(next) => warn!("{attempt} failed ({reason}); falling back to {next}"),
                        None => warn!("{attempt} failed ({reason}); no fallback left"),
                    }
                    failed.push(format!("{attempt}: {reason}"));
                    last_error = reason;
                }
            }
        }

        self.state = SolverState::Failed;
        Err(QdError::SolverFailed {
            attempts: failed,
            message: last_error,
        })
    }

    /// Run one attempt on a copy of `x`. Returns the solution, iteration
    /// count and residual, or the reason it was rejected.
    fn run(
        &self,
        attempt: SolveAttempt,
        a: &CsMat<f64>,
        b: &[f64],
        x: &[f64],
    ) -> Result<(Vec<f64>, usize, f64), String> {
        match attempt {
            SolveAttempt::Direct => {
                let res = lu_solve(a, b).map_err(|e| e.to_string())?;
                Ok((res.x, 0, res.backward_error))
            }
            SolveAttempt::Gmres(kind) => {
                let precond: Box<dyn Preconditioner> = match kind {
                    PreconditionerKind::Diagonal => Box::new(Jacobi::new(a)),
                    PreconditionerKind::Ilu => Box::new(Ilu0::new(a).map_err(|e| e.to_string())?),
                };
                let cfg = GmresConfig {
                    restart: self.config.restart,
                    max_iter: self.config.max_restarts,
                    tol: self.config.tol,
                };
                let mut work = x.to_vec();
                let res = gmres_solve(a, b, &mut work, precond.as_ref(), &cfg);
                if res.converged && work.iter().all(|v| v.is_finite()) {
                    Ok((work, res.iterations, res.residual))
                } else {
                    Err(format!(
                        "{} not converged: residual {:.3e} after {} iterations",
                        precond.name(),
                        res.residual,
                        res.iterations
                    ))
                }
            }
        }
    }
}
