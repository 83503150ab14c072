// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Axisymmetric R-Z mesh, per-cell geometry and per-group field storage.
//!
//! Layout convention for every 2D field is `[nz, nr]`. The axial index
//! grows with z: a cell's north face sits at `z_edges[iz]` and its south
//! face at `z_edges[iz + 1]`. The radial index grows outward from the
//! symmetry axis: the west face sits at `r_edges[ir]`.

use std::f64::consts::PI;

use ndarray::{Array1, Array2};

use crate::error::{QdError, QdResult};

/// Mesh cell coordinate (radial index, axial index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub ir: usize,
    pub iz: usize,
}

impl Cell {
    pub fn new(ir: usize, iz: usize) -> Self {
        Cell { ir, iz }
    }
}

/// Geometric scalars of one cell, queried on demand from the mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellGeometry {
    pub volume: f64,
    pub west_area: f64,
    pub east_area: f64,
    pub north_area: f64,
    pub south_area: f64,
    /// Inner radius.
    pub r_down: f64,
    /// Outer radius.
    pub r_up: f64,
    /// Volume-averaged radius.
    pub r_avg: f64,
    /// North (lower-z) edge.
    pub z_down: f64,
    /// South (upper-z) edge.
    pub z_up: f64,
    /// Axial midpoint.
    pub z_avg: f64,
}

/// Tensor-product R-Z mesh defined by its cell edges.
#[derive(Debug, Clone, PartialEq)]
pub struct RzMesh {
    pub nr: usize,
    pub nz: usize,
    /// Radial edges, length `nr + 1`, starting at the axis side.
    pub r_edges: Array1<f64>,
    /// Axial edges, length `nz + 1`.
    pub z_edges: Array1<f64>,
}

impl RzMesh {
    /// Build a mesh from explicit edge coordinates.
    ///
    /// Edges must be strictly increasing, and radial edges non-negative.
    pub fn from_edges(r_edges: Vec<f64>, z_edges: Vec<f64>) -> QdResult<Self> {
        if r_edges.len() < 2 || z_edges.len() < 2 {
            return Err(QdError::ConfigError(format!(
                "mesh needs at least one cell per direction (got {} radial, {} axial edges)",
                r_edges.len(),
                z_edges.len()
            )));
        }
        if r_edges[0] < 0.0 {
            return Err(QdError::ConfigError(format!(
                "radial edges must be non-negative, first edge is {}",
                r_edges[0]
            )));
        }
        for (name, edges) in [("radial", &r_edges), ("axial", &z_edges)] {
            if edges.iter().any(|e| !e.is_finite()) || edges.windows(2).any(|w| w[1] <= w[0]) {
                return Err(QdError::ConfigError(format!(
                    "{name} edges must be finite and strictly increasing"
                )));
            }
        }
        Ok(RzMesh {
            nr: r_edges.len() - 1,
            nz: z_edges.len() - 1,
            r_edges: Array1::from(r_edges),
            z_edges: Array1::from(z_edges),
        })
    }

    /// Uniform mesh on `[0, r_max] × [0, z_max]`.
    pub fn uniform(nr: usize, nz: usize, r_max: f64, z_max: f64) -> QdResult<Self> {
        if nr == 0 || nz == 0 {
            return Err(QdError::ConfigError(
                "uniform mesh needs nr > 0 and nz > 0".to_string(),
            ));
        }
        Self::from_edges(
            Array1::linspace(0.0, r_max, nr + 1).to_vec(),
            Array1::linspace(0.0, z_max, nz + 1).to_vec(),
        )
    }

    pub fn n_cells(&self) -> usize {
        self.nr * self.nz
    }

    /// Shape of cell-centred fields.
    pub fn cell_shape(&self) -> (usize, usize) {
        (self.nz, self.nr)
    }

    /// Shape of fields living on radial faces (constant-r edges).
    pub fn radial_face_shape(&self) -> (usize, usize) {
        (self.nz, self.nr + 1)
    }

    /// Shape of fields living on axial faces (constant-z edges).
    pub fn axial_face_shape(&self) -> (usize, usize) {
        (self.nz + 1, self.nr)
    }

    /// Iterate cells in assembly order: radial outer, axial inner.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.nr).flat_map(move |ir| (0..self.nz).map(move |iz| Cell::new(ir, iz)))
    }

    /// Volume, face areas and representative coordinates of `cell`.
    pub fn geometry(&self, cell: Cell) -> CellGeometry {
        assert!(
            cell.ir < self.nr && cell.iz < self.nz,
            "cell ({}, {}) outside {}x{} mesh",
            cell.ir,
            cell.iz,
            self.nr,
            self.nz
        );
        let r_down = self.r_edges[cell.ir];
        let r_up = self.r_edges[cell.ir + 1];
        let z_down = self.z_edges[cell.iz];
        let z_up = self.z_edges[cell.iz + 1];
        let dz = z_up - z_down;
        let ring = PI * (r_up * r_up - r_down * r_down);
        CellGeometry {
            volume: ring * dz,
            west_area: 2.0 * PI * r_down * dz,
            east_area: 2.0 * PI * r_up * dz,
            north_area: ring,
            south_area: ring,
            r_down,
            r_up,
            r_avg: (2.0 / 3.0) * (r_up.powi(3) - r_down.powi(3))
                / (r_up * r_up - r_down * r_down),
            z_down,
            z_up,
            z_avg: 0.5 * (z_down + z_up),
        }
    }

    /// Cell volume.
    pub fn volume(&self, cell: Cell) -> f64 {
        self.geometry(cell).volume
    }

    /// Volume-weighted harmonic average of a cell quantity across the
    /// radial face `ir` (between cells `ir - 1` and `ir`) in row `iz`.
    /// Domain-edge faces take the single adjacent cell's value.
    pub fn radial_face_harmonic(&self, cells: &Array2<f64>, iz: usize, ir: usize) -> f64 {
        if ir == 0 {
            return cells[[iz, 0]];
        }
        if ir == self.nr {
            return cells[[iz, self.nr - 1]];
        }
        let v_left = self.volume(Cell::new(ir - 1, iz));
        let v_right = self.volume(Cell::new(ir, iz));
        harmonic(v_left, cells[[iz, ir - 1]], v_right, cells[[iz, ir]])
    }

    /// Volume-weighted harmonic average across the axial face `iz`
    /// (between cells `iz - 1` and `iz`) in column `ir`.
    pub fn axial_face_harmonic(&self, cells: &Array2<f64>, iz: usize, ir: usize) -> f64 {
        if iz == 0 {
            return cells[[0, ir]];
        }
        if iz == self.nz {
            return cells[[self.nz - 1, ir]];
        }
        let v_up = self.volume(Cell::new(ir, iz - 1));
        let v_down = self.volume(Cell::new(ir, iz));
        harmonic(v_up, cells[[iz - 1, ir]], v_down, cells[[iz, ir]])
    }
}

/// `(v1 + v2) / (v1/a + v2/b)`, or zero when the two values do not share a sign.
#[inline]
fn harmonic(v1: f64, a: f64, v2: f64, b: f64) -> f64 {
    if a * b <= 0.0 {
        return 0.0;
    }
    (v1 + v2) / (v1 / a + v2 / b)
}

/// Flux and current fields of one energy group.
///
/// Face fields follow the mesh face shapes; `prev_*` hold the previous
/// accepted iterate for outer-loop convergence checks.
#[derive(Debug, Clone)]
pub struct GroupFields {
    /// Cell-average scalar flux `[nz, nr]`.
    pub s_flux: Array2<f64>,
    /// Flux on radial faces `[nz, nr + 1]`.
    pub s_flux_r: Array2<f64>,
    /// Flux on axial faces `[nz + 1, nr]`.
    pub s_flux_z: Array2<f64>,
    /// Current through radial faces `[nz, nr + 1]`.
    pub current_r: Array2<f64>,
    /// Current through axial faces `[nz + 1, nr]`.
    pub current_z: Array2<f64>,
    pub prev_s_flux: Array2<f64>,
    pub prev_s_flux_r: Array2<f64>,
    pub prev_s_flux_z: Array2<f64>,
    pub prev_current_r: Array2<f64>,
    pub prev_current_z: Array2<f64>,
}

impl GroupFields {
    pub fn zeros(mesh: &RzMesh) -> Self {
        let c = mesh.cell_shape();
        let r = mesh.radial_face_shape();
        let z = mesh.axial_face_shape();
        GroupFields {
            s_flux: Array2::zeros(c),
            s_flux_r: Array2::zeros(r),
            s_flux_z: Array2::zeros(z),
            current_r: Array2::zeros(r),
            current_z: Array2::zeros(z),
            prev_s_flux: Array2::zeros(c),
            prev_s_flux_r: Array2::zeros(r),
            prev_s_flux_z: Array2::zeros(z),
            prev_current_r: Array2::zeros(r),
            prev_current_z: Array2::zeros(z),
        }
    }

    /// Uniform flux everywhere, zero currents.
    pub fn uniform_flux(mesh: &RzMesh, value: f64) -> Self {
        let mut fields = Self::zeros(mesh);
        fields.s_flux.fill(value);
        fields.s_flux_r.fill(value);
        fields.s_flux_z.fill(value);
        fields
    }

    /// Copy the current fields into the `prev_*` snapshots.
    pub fn promote_to_previous(&mut self) {
        self.prev_s_flux.assign(&self.s_flux);
        self.prev_s_flux_r.assign(&self.s_flux_r);
        self.prev_s_flux_z.assign(&self.s_flux_z);
        self.prev_current_r.assign(&self.current_r);
        self.prev_current_z.assign(&self.current_z);
    }

    /// Max-norm change of the cell flux since the last snapshot.
    pub fn flux_change(&self) -> f64 {
        self.s_flux
            .iter()
            .zip(self.prev_s_flux.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_mesh_edges() {
        let mesh = RzMesh::uniform(4, 3, 2.0, 6.0).unwrap();
        assert_eq!(mesh.nr, 4);
        assert_eq!(mesh.nz, 3);
        assert!((mesh.r_edges[4] - 2.0).abs() < 1e-14);
        assert!((mesh.z_edges[1] - 2.0).abs() < 1e-14);
        assert_eq!(mesh.cells().count(), 12);
    }

    #[test]
    fn test_rejects_non_monotone_edges() {
        assert!(RzMesh::from_edges(vec![0.0, 1.0, 0.5], vec![0.0, 1.0]).is_err());
        assert!(RzMesh::from_edges(vec![-1.0, 1.0], vec![0.0, 1.0]).is_err());
        assert!(RzMesh::from_edges(vec![0.0], vec![0.0, 1.0]).is_err());
    }

    #[test]
    fn test_cell_order_is_radial_outer() {
        let mesh = RzMesh::uniform(2, 3, 1.0, 1.0).unwrap();
        let cells: Vec<Cell> = mesh.cells().collect();
        assert_eq!(cells[0], Cell::new(0, 0));
        assert_eq!(cells[1], Cell::new(0, 1));
        assert_eq!(cells[3], Cell::new(1, 0));
    }

    #[test]
    fn test_geometry_axis_cell() {
        let mesh = RzMesh::from_edges(vec![0.0, 1.0, 2.0], vec![0.0, 0.5]).unwrap();
        let g = mesh.geometry(Cell::new(0, 0));
        assert!((g.volume - PI * 0.5).abs() < 1e-12);
        assert_eq!(g.west_area, 0.0);
        assert!((g.east_area - PI).abs() < 1e-12);
        assert!((g.north_area - PI).abs() < 1e-12);
        assert!((g.r_avg - 2.0 / 3.0).abs() < 1e-12);
        assert!((g.z_avg - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_volumes_sum_to_cylinder() {
        let mesh = RzMesh::uniform(5, 4, 3.0, 2.0).unwrap();
        let total: f64 = mesh.cells().map(|c| mesh.volume(c)).sum();
        assert!((total - PI * 9.0 * 2.0).abs() < 1e-10, "total = {total}");
    }

    #[test]
    fn test_face_harmonic_of_uniform_is_uniform() {
        let mesh = RzMesh::uniform(3, 3, 1.0, 1.0).unwrap();
        let vals = Array2::from_elem((3, 3), 0.4);
        for ir in 0..=3 {
            assert!((mesh.radial_face_harmonic(&vals, 1, ir) - 0.4).abs() < 1e-14);
        }
        for iz in 0..=3 {
            assert!((mesh.axial_face_harmonic(&vals, iz, 2) - 0.4).abs() < 1e-14);
        }
    }

    #[test]
    fn test_face_harmonic_sign_change_is_zero() {
        let mesh = RzMesh::uniform(2, 1, 1.0, 1.0).unwrap();
        let vals = Array2::from_shape_vec((1, 2), vec![0.1, -0.1]).unwrap();
        assert_eq!(mesh.radial_face_harmonic(&vals, 0, 1), 0.0);
    }

    #[test]
    fn test_snapshot_and_change() {
        let mesh = RzMesh::uniform(2, 2, 1.0, 1.0).unwrap();
        let mut f = GroupFields::uniform_flux(&mesh, 1.0);
        f.promote_to_previous();
        f.s_flux[[1, 0]] = 1.5;
        assert!((f.flux_change() - 0.5).abs() < 1e-14);
    }
}
