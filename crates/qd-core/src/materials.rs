// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — QD Materials
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Multigroup cross-section access.
//!
//! The assembler only talks to [`MaterialProvider`]; [`MaterialTable`]
//! is a plain per-cell table implementation used by drivers and tests.

use ndarray::{Array2, Array3, Array4};
use qd_types::error::{QdError, QdResult};
use qd_types::state::{Cell, RzMesh};

/// Per-cell, per-group nuclear data. Group indices ascend with energy,
/// so transfer from a higher index into a lower one is down-scatter.
pub trait MaterialProvider: Sync {
    fn n_groups(&self) -> usize;

    /// Declared cell counts `(nz, nr)`.
    fn shape(&self) -> (usize, usize);

    fn sig_t(&self, cell: Cell, group: usize) -> f64;

    /// Scattering from `from` into `to`.
    fn sig_s(&self, cell: Cell, from: usize, to: usize) -> f64;

    fn sig_f(&self, cell: Cell, group: usize) -> f64;

    fn nu(&self, cell: Cell, group: usize) -> f64;

    /// Prompt fission spectrum.
    fn chi_p(&self, cell: Cell, group: usize) -> f64;

    /// Delayed neutron spectrum.
    fn chi_d(&self, cell: Cell, group: usize) -> f64;

    fn velocity(&self, cell: Cell, group: usize) -> f64;

    /// Coupling of `from` flux into the `to` balance: scattering plus
    /// prompt fission.
    fn transfer(&self, cell: Cell, from: usize, to: usize) -> f64 {
        self.sig_s(cell, from, to)
            + self.chi_p(cell, to) * self.nu(cell, from) * self.sig_f(cell, from)
    }
}

/// One group's data for a homogeneous region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupConstants {
    pub sig_t: f64,
    pub sig_f: f64,
    pub nu: f64,
    pub chi_p: f64,
    pub chi_d: f64,
    pub velocity: f64,
}

impl GroupConstants {
    /// Pure absorber with no fission.
    pub fn absorber(sig_t: f64, velocity: f64) -> Self {
        GroupConstants {
            sig_t,
            sig_f: 0.0,
            nu: 0.0,
            chi_p: 0.0,
            chi_d: 0.0,
            velocity,
        }
    }
}

/// Dense per-cell table, group-major `[group, nz, nr]`.
#[derive(Debug, Clone)]
pub struct MaterialTable {
    groups: usize,
    nz: usize,
    nr: usize,
    sig_t: Array3<f64>,
    sig_f: Array3<f64>,
    nu: Array3<f64>,
    chi_p: Array3<f64>,
    chi_d: Array3<f64>,
    velocity: Array3<f64>,
    /// `[from, to, nz, nr]`.
    sig_s: Array4<f64>,
}

impl MaterialTable {
    /// Same data in every cell. `scatter[[from, to]]` is the group
    /// transfer matrix.
    pub fn homogeneous(
        mesh: &RzMesh,
        constants: &[GroupConstants],
        scatter: &Array2<f64>,
    ) -> QdResult<Self> {
        let groups = constants.len();
        if groups == 0 {
            return Err(QdError::ConfigError(
                "material table needs at least one group".to_string(),
            ));
        }
        let (nz, nr) = mesh.cell_shape();
        let mut table = MaterialTable {
            groups,
            nz,
            nr,
            sig_t: Array3::zeros((groups, nz, nr)),
            sig_f: Array3::zeros((groups, nz, nr)),
            nu: Array3::zeros((groups, nz, nr)),
            chi_p: Array3::zeros((groups, nz, nr)),
            chi_d: Array3::zeros((groups, nz, nr)),
            velocity: Array3::zeros((groups, nz, nr)),
            sig_s: Array4::zeros((groups, groups, nz, nr)),
        };
        for cell in mesh.cells() {
            table.set_cell(cell, constants, scatter)?;
        }
        Ok(table)
    }

    /// Overwrite the data of one cell.
    pub fn set_cell(
        &mut self,
        cell: Cell,
        constants: &[GroupConstants],
        scatter: &Array2<f64>,
    ) -> QdResult<()> {
        let g = self.groups;
        QdError::check_shape("group constants", &[g], &[constants.len()])?;
        QdError::check_shape("scatter matrix", &[g, g], scatter.shape())?;
        for (group, c) in constants.iter().enumerate() {
            if !(c.sig_t > 0.0 && c.velocity > 0.0) {
                return Err(QdError::ConfigError(format!(
                    "group {group}: sig_t and velocity must be positive (got {}, {})",
                    c.sig_t, c.velocity
                )));
            }
        }

        let (iz, ir) = (cell.iz, cell.ir);
        for (group, c) in constants.iter().enumerate() {
            self.sig_t[[group, iz, ir]] = c.sig_t;
            self.sig_f[[group, iz, ir]] = c.sig_f;
            self.nu[[group, iz, ir]] = c.nu;
            self.chi_p[[group, iz, ir]] = c.chi_p;
            self.chi_d[[group, iz, ir]] = c.chi_d;
            self.velocity[[group, iz, ir]] = c.velocity;
        }
        for from in 0..g {
            for to in 0..g {
                self.sig_s[[from, to, iz, ir]] = scatter[[from, to]];
            }
        }
        Ok(())
    }
}

impl MaterialProvider for MaterialTable {
    fn n_groups(&self) -> usize {
        self.groups
    }

    fn shape(&self) -> (usize, usize) {
        (self.nz, self.nr)
    }

    fn sig_t(&self, cell: Cell, group: usize) -> f64 {
        self.sig_t[[group, cell.iz, cell.ir]]
    }

    fn sig_s(&self, cell: Cell, from: usize, to: usize) -> f64 {
        self.sig_s[[from, to, cell.iz, cell.ir]]
    }

    fn sig_f(&self, cell: Cell, group: usize) -> f64 {
        self.sig_f[[group, cell.iz, cell.ir]]
    }

    fn nu(&self, cell: Cell, group: usize) -> f64 {
        self.nu[[group, cell.iz, cell.ir]]
    }

    fn chi_p(&self, cell: Cell, group: usize) -> f64 {
        self.chi_p[[group, cell.iz, cell.ir]]
    }

    fn chi_d(&self, cell: Cell, group: usize) -> f64 {
        self.chi_d[[group, cell.iz, cell.ir]]
    }

    fn velocity(&self, cell: Cell, group: usize) -> f64 {
        self.velocity[[group, cell.iz, cell.ir]]
    }
}

/// Cell total cross sections of one group as a `[nz, nr]` field.
pub(crate) fn sig_t_field<M: MaterialProvider + ?Sized>(
    mesh: &RzMesh,
    materials: &M,
    group: usize,
) -> Array2<f64> {
    Array2::from_shape_fn(mesh.cell_shape(), |(iz, ir)| {
        materials.sig_t(Cell::new(ir, iz), group)
    })
}
