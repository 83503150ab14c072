// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — QD Current Stencils
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! First-moment (face current) relations of the R-Z QD equations.
//!
//! Each face current of a cell is an affine function of four flux
//! unknowns of the same cell:
//!
//! ```text
//! J_z = −∂(Ezz φ)/∂z − (1/r) ∂(r Erz φ)/∂r
//! J_r = −(1/h) ∂(h Err φ)/∂r − ∂(Erz φ)/∂z
//! ```
//!
//! discretised between the cell centre and the face, divided by
//! `1/(vΔt) + σ_t` (transient, with the past current moved into the
//! constant) or by the face `σ_t` (steady state). `h` is the
//! integrating factor that regularises the radial derivative near the
//! axis.

use ndarray::Array2;
use qd_types::closure::EddingtonField;
use qd_types::constants::AXIS_FACTOR_POWER;
use qd_types::state::{Cell, CellGeometry, RzMesh};

use crate::index::{Face, FluxRole, QdIndex};
use crate::materials::{sig_t_field, MaterialProvider};

/// Time treatment of one assembly pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Regime {
    /// Backward-Euler step of length `dt`.
    Transient { dt: f64 },
    SteadyState,
}

/// `J = constant + Σ coeff · x[col]`, columns in the global flux vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentStencil {
    pub terms: [(usize, f64); 4],
    pub constant: f64,
}

impl CurrentStencil {
    pub fn evaluate(&self, x: &[f64]) -> f64 {
        self.terms
            .iter()
            .fold(self.constant, |acc, &(col, coeff)| acc + coeff * x[col])
    }
}

/// Integrating factor `h(r)` for a cell with closure `(err, ezz)`.
///
/// Away from the axis `h = r^G` with `G = 1 + (Err + Ezz − 1)/Err`. In
/// the innermost cell a polynomial exponent keeps `h` finite at `r = 0`:
/// `h = exp(g0 r²/2 + g1 r³/3)`.
pub fn integrating_factor(geo: &CellGeometry, axis_cell: bool, err: f64, ezz: f64, r: f64) -> f64 {
    let g = 1.0 + (err + ezz - 1.0) / err;
    if axis_cell {
        let p = AXIS_FACTOR_POWER;
        let pf = f64::from(p);
        let (r_up, r_avg) = (geo.r_up, geo.r_avg);
        let ratio = (r_up.powi(p + 1) - r_avg.powi(p + 1)) / (r_avg.powi(p) - r_up.powi(p));
        let g1 = g / (r_avg.powi(p) * (r_avg + ratio));
        let g0 = g1 * ratio;
        (g0 * r.powi(p) / pf + g1 * r.powi(p + 1) / (pf + 1.0)).exp()
    } else {
        r.powf(g)
    }
}

/// Read-only view of everything one group's current relations need.
pub struct GroupContext<'a> {
    pub mesh: &'a RzMesh,
    pub index: &'a QdIndex,
    pub materials: &'a dyn MaterialProvider,
    pub eddington: &'a EddingtonField,
    pub group: usize,
    pub regime: Regime,
    /// Previous-step currents (read in transient passes only).
    pub curr_past: &'a [f64],
    sig_t_cells: Option<Array2<f64>>,
}

impl<'a> GroupContext<'a> {
    pub fn new(
        mesh: &'a RzMesh,
        index: &'a QdIndex,
        materials: &'a dyn MaterialProvider,
        eddington: &'a EddingtonField,
        group: usize,
        regime: Regime,
        curr_past: &'a [f64],
    ) -> Self {
        let sig_t_cells = match regime {
            Regime::SteadyState => Some(sig_t_field(mesh, materials, group)),
            Regime::Transient { .. } => None,
        };
        if let Regime::Transient { .. } = regime {
            assert_eq!(
                curr_past.len(),
                index.n_current_unknowns(),
                "past current vector does not match the index map"
            );
        }
        GroupContext {
            mesh,
            index,
            materials,
            eddington,
            group,
            regime,
            curr_past,
            sig_t_cells,
        }
    }

    #[inline]
    pub fn col(&self, cell: Cell, role: FluxRole) -> usize {
        self.index.flux(cell, role, self.group)
    }

    /// Total cross section on `face` of `cell` for steady-state scaling.
    fn face_sig_t(&self, cell: Cell, face: Face) -> f64 {
        let cells = match &self.sig_t_cells {
            Some(c) => c,
            None => return self.materials.sig_t(cell, self.group),
        };
        let (iz, ir) = (cell.iz, cell.ir);
        match face {
            Face::North => self.mesh.axial_face_harmonic(cells, iz, ir),
            Face::South => self.mesh.axial_face_harmonic(cells, iz + 1, ir),
            Face::West => self.mesh.radial_face_harmonic(cells, iz, ir),
            Face::East => self.mesh.radial_face_harmonic(cells, iz, ir + 1),
        }
    }

    /// Current through `face` of `cell` as a function of the flux vector.
    pub fn face_current(&self, cell: Cell, face: Face) -> CurrentStencil {
        let geo = self.mesh.geometry(cell);
        let e = self.eddington;
        let (iz, ir) = (cell.iz, cell.ir);
        let err_c = e.err[[iz, ir]];
        let ezz_c = e.ezz[[iz, ir]];

        let raw: [(FluxRole, f64); 4] = match face {
            Face::South | Face::North => {
                let dr = geo.r_up - geo.r_down;
                let erz_w = e.erz_radial[[iz, ir]];
                let erz_e = e.erz_radial[[iz, ir + 1]];
                let west = geo.r_down * erz_w / (geo.r_avg * dr);
                let east = -geo.r_up * erz_e / (geo.r_avg * dr);
                if face == Face::South {
                    let dz = geo.z_up - geo.z_avg;
                    let ezz_s = e.ezz_axial[[iz + 1, ir]];
                    [
                        (FluxRole::South, -ezz_s / dz),
                        (FluxRole::Center, ezz_c / dz),
                        (FluxRole::West, west),
                        (FluxRole::East, east),
                    ]
                } else {
                    let dz = geo.z_avg - geo.z_down;
                    let ezz_n = e.ezz_axial[[iz, ir]];
                    [
                        (FluxRole::North, ezz_n / dz),
                        (FluxRole::Center, -ezz_c / dz),
                        (FluxRole::West, west),
                        (FluxRole::East, east),
                    ]
                }
            }
            Face::West | Face::East => {
                let dz = geo.z_up - geo.z_down;
                let erz_s = e.erz_axial[[iz + 1, ir]];
                let erz_n = e.erz_axial[[iz, ir]];
                let axis_cell = ir == 0;
                let h = |r: f64| integrating_factor(&geo, axis_cell, err_c, ezz_c, r);
                let h_cent = h(geo.r_avg);
                if face == Face::West {
                    let dr = geo.r_avg - geo.r_down;
                    let err_w = e.err_radial[[iz, ir]];
                    [
                        (FluxRole::South, -erz_s / dz),
                        (FluxRole::North, erz_n / dz),
                        (FluxRole::Center, -h_cent * err_c / (h(geo.r_down) * dr)),
                        (FluxRole::West, err_w / dr),
                    ]
                } else {
                    let dr = geo.r_up - geo.r_avg;
                    let err_e = e.err_radial[[iz, ir + 1]];
                    [
                        (FluxRole::South, -erz_s / dz),
                        (FluxRole::North, erz_n / dz),
                        (FluxRole::Center, h_cent * err_c / (h(geo.r_up) * dr)),
                        (FluxRole::East, -err_e / dr),
                    ]
                }
            }
        };

        let (scale, constant) = match self.regime {
            Regime::Transient { dt } => {
                let rate = 1.0 / (self.materials.velocity(cell, self.group) * dt);
                let scale = 1.0 / (rate + self.materials.sig_t(cell, self.group));
                let past = self.curr_past[self.index.current(cell, face, self.group)];
                (scale, scale * past * rate)
            }
            Regime::SteadyState => (1.0 / self.face_sig_t(cell, face), 0.0),
        };

        CurrentStencil {
            terms: raw.map(|(role, c)| (self.col(cell, role), scale * c)),
            constant,
        }
    }
}
