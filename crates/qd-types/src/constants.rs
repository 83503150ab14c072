// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Diffusion-limit diagonal Eddington factor (Err = Ezz = 1/3).
pub const EDDINGTON_DIFFUSION: f64 = 1.0 / 3.0;

/// Diffusion-limit off-diagonal Eddington factor.
pub const EDDINGTON_OFF_DIAGONAL: f64 = 0.0;

/// Exponent used by the axis-cell integrating factor.
pub const AXIS_FACTOR_POWER: i32 = 2;

/// Default GMRES Krylov dimension before restart.
pub const GMRES_RESTART: usize = 30;

/// Default cap on GMRES restart cycles.
pub const GMRES_MAX_RESTARTS: usize = 200;

/// Default relative residual tolerance for iterative solves.
pub const ITERATIVE_TOL: f64 = 1e-10;

/// Normwise backward error above which a direct solve is rejected.
pub const DIRECT_BACKWARD_ERROR_TOL: f64 = 1e-10;
