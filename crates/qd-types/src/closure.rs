// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Closures
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Eddington tensor fields and boundary closure data.
//!
//! Both are produced outside the QD solve (by a transport sweep, or
//! initialised to the diffusion limit) and held fixed during one inner
//! linear solve.

use ndarray::{Array1, Array2};

use crate::constants::{EDDINGTON_DIFFUSION, EDDINGTON_OFF_DIAGONAL};
use crate::error::{QdError, QdResult};
use crate::state::RzMesh;

/// Per-cell Eddington factors plus their face-interpolated variants.
#[derive(Debug, Clone, PartialEq)]
pub struct EddingtonField {
    /// Radial-radial factor `[nz, nr]`.
    pub err: Array2<f64>,
    /// Axial-axial factor `[nz, nr]`.
    pub ezz: Array2<f64>,
    /// Radial-axial factor `[nz, nr]`.
    pub erz: Array2<f64>,
    /// `Err` on radial faces `[nz, nr + 1]`.
    pub err_radial: Array2<f64>,
    /// `Erz` on radial faces `[nz, nr + 1]`.
    pub erz_radial: Array2<f64>,
    /// `Ezz` on axial faces `[nz + 1, nr]`.
    pub ezz_axial: Array2<f64>,
    /// `Erz` on axial faces `[nz + 1, nr]`.
    pub erz_axial: Array2<f64>,
}

impl EddingtonField {
    /// Isotropic (diffusion-limit) closure: Err = Ezz = 1/3, Erz = 0.
    pub fn diffusion_limit(mesh: &RzMesh) -> Self {
        let c = mesh.cell_shape();
        let r = mesh.radial_face_shape();
        let z = mesh.axial_face_shape();
        EddingtonField {
            err: Array2::from_elem(c, EDDINGTON_DIFFUSION),
            ezz: Array2::from_elem(c, EDDINGTON_DIFFUSION),
            erz: Array2::from_elem(c, EDDINGTON_OFF_DIAGONAL),
            err_radial: Array2::from_elem(r, EDDINGTON_DIFFUSION),
            erz_radial: Array2::from_elem(r, EDDINGTON_OFF_DIAGONAL),
            ezz_axial: Array2::from_elem(z, EDDINGTON_DIFFUSION),
            erz_axial: Array2::from_elem(z, EDDINGTON_OFF_DIAGONAL),
        }
    }

    /// Build a field from cell values, interpolating face values with a
    /// volume-weighted harmonic average of the adjacent cells.
    pub fn from_cells(
        mesh: &RzMesh,
        err: Array2<f64>,
        ezz: Array2<f64>,
        erz: Array2<f64>,
    ) -> QdResult<Self> {
        let c = mesh.cell_shape();
        for (name, arr) in [("Err", &err), ("Ezz", &ezz), ("Erz", &erz)] {
            QdError::check_shape(name, &[c.0, c.1], arr.shape())?;
        }

        let mut err_radial = Array2::zeros(mesh.radial_face_shape());
        let mut erz_radial = Array2::zeros(mesh.radial_face_shape());
        for iz in 0..mesh.nz {
            for ir in 0..=mesh.nr {
                err_radial[[iz, ir]] = mesh.radial_face_harmonic(&err, iz, ir);
                erz_radial[[iz, ir]] = mesh.radial_face_harmonic(&erz, iz, ir);
            }
        }
        let mut ezz_axial = Array2::zeros(mesh.axial_face_shape());
        let mut erz_axial = Array2::zeros(mesh.axial_face_shape());
        for iz in 0..=mesh.nz {
            for ir in 0..mesh.nr {
                ezz_axial[[iz, ir]] = mesh.axial_face_harmonic(&ezz, iz, ir);
                erz_axial[[iz, ir]] = mesh.axial_face_harmonic(&erz, iz, ir);
            }
        }

        Ok(EddingtonField {
            err,
            ezz,
            erz,
            err_radial,
            erz_radial,
            ezz_axial,
            erz_axial,
        })
    }

    /// Check shapes against `mesh` and reject values the current
    /// relations cannot use. `Err` appears as a divisor in the
    /// integrating factor and the radial stencil, so it must be positive.
    pub fn validate(&self, mesh: &RzMesh, group: usize) -> QdResult<()> {
        let c = mesh.cell_shape();
        let r = mesh.radial_face_shape();
        let z = mesh.axial_face_shape();
        QdError::check_shape("Err", &[c.0, c.1], self.err.shape())?;
        QdError::check_shape("Ezz", &[c.0, c.1], self.ezz.shape())?;
        QdError::check_shape("Erz", &[c.0, c.1], self.erz.shape())?;
        QdError::check_shape("Err (radial faces)", &[r.0, r.1], self.err_radial.shape())?;
        QdError::check_shape("Erz (radial faces)", &[r.0, r.1], self.erz_radial.shape())?;
        QdError::check_shape("Ezz (axial faces)", &[z.0, z.1], self.ezz_axial.shape())?;
        QdError::check_shape("Erz (axial faces)", &[z.0, z.1], self.erz_axial.shape())?;

        for ((iz, ir), &value) in self.err.indexed_iter() {
            if !(value.is_finite() && value > 0.0) {
                return Err(QdError::InvalidEddington { group, iz, ir, value });
            }
        }
        for ((iz, ir), &value) in self.err_radial.indexed_iter() {
            if !(value.is_finite() && value > 0.0) {
                return Err(QdError::InvalidEddington { group, iz, ir, value });
            }
        }
        let others = [
            &self.ezz,
            &self.erz,
            &self.erz_radial,
            &self.ezz_axial,
            &self.erz_axial,
        ];
        for arr in others {
            if let Some(((iz, ir), &value)) = arr.indexed_iter().find(|(_, v)| !v.is_finite()) {
                return Err(QdError::InvalidEddington { group, iz, ir, value });
            }
        }
        Ok(())
    }
}

/// Externally supplied closure values along one domain edge.
///
/// North and south edges are indexed by radial cell, east and west by
/// axial cell. `flux` is used in Dirichlet mode, the remaining arrays in
/// Goldin mode.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeData {
    pub flux: Array1<f64>,
    /// Outward current to flux ratio.
    pub ratio: Array1<f64>,
    pub inward_current: Array1<f64>,
    pub inward_flux: Array1<f64>,
    pub abs_current: Array1<f64>,
}

impl EdgeData {
    pub fn zeros(len: usize) -> Self {
        EdgeData {
            flux: Array1::zeros(len),
            ratio: Array1::zeros(len),
            inward_current: Array1::zeros(len),
            inward_flux: Array1::zeros(len),
            abs_current: Array1::zeros(len),
        }
    }

    pub fn len(&self) -> usize {
        self.flux.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flux.is_empty()
    }

    /// Goldin bias term `inwardCurrent - ratio * inwardFlux` at `i`.
    pub fn goldin_bias(&self, i: usize) -> f64 {
        self.inward_current[i] - self.ratio[i] * self.inward_flux[i]
    }
}

/// Boundary data of one energy group on all four domain edges.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryData {
    pub north: EdgeData,
    pub south: EdgeData,
    pub east: EdgeData,
    pub west: EdgeData,
}

impl BoundaryData {
    pub fn zeros(mesh: &RzMesh) -> Self {
        BoundaryData {
            north: EdgeData::zeros(mesh.nr),
            south: EdgeData::zeros(mesh.nr),
            east: EdgeData::zeros(mesh.nz),
            west: EdgeData::zeros(mesh.nz),
        }
    }

    /// Same Dirichlet flux on every edge.
    pub fn uniform_flux(mesh: &RzMesh, value: f64) -> Self {
        let mut data = Self::zeros(mesh);
        for edge in [
            &mut data.north,
            &mut data.south,
            &mut data.east,
            &mut data.west,
        ] {
            edge.flux.fill(value);
        }
        data
    }

    pub fn validate(&self, mesh: &RzMesh) -> QdResult<()> {
        let edges = [
            ("north boundary", &self.north, mesh.nr),
            ("south boundary", &self.south, mesh.nr),
            ("east boundary", &self.east, mesh.nz),
            ("west boundary", &self.west, mesh.nz),
        ];
        for (what, edge, len) in edges {
            for arr in [
                &edge.flux,
                &edge.ratio,
                &edge.inward_current,
                &edge.inward_flux,
                &edge.abs_current,
            ] {
                QdError::check_shape(what, &[len], arr.shape())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diffusion_limit_shapes() {
        let mesh = RzMesh::uniform(3, 2, 1.0, 1.0).unwrap();
        let e = EddingtonField::diffusion_limit(&mesh);
        assert_eq!(e.err.shape(), &[2, 3]);
        assert_eq!(e.err_radial.shape(), &[2, 4]);
        assert_eq!(e.ezz_axial.shape(), &[3, 3]);
        assert!(e.validate(&mesh, 0).is_ok());
    }

    #[test]
    fn test_from_cells_interpolates_faces() {
        let mesh = RzMesh::from_edges(vec![0.0, 1.0, 2.0], vec![0.0, 1.0]).unwrap();
        let err = Array2::from_shape_vec((1, 2), vec![0.2, 0.4]).unwrap();
        let ezz = Array2::from_elem((1, 2), 1.0 / 3.0);
        let erz = Array2::zeros((1, 2));
        let e = EddingtonField::from_cells(&mesh, err, ezz, erz).unwrap();
        // Volumes pi and 3 pi.
        let expected = 4.0 / (1.0 / 0.2 + 3.0 / 0.4);
        assert!((e.err_radial[[0, 1]] - expected).abs() < 1e-12);
        assert!((e.err_radial[[0, 0]] - 0.2).abs() < 1e-14);
        assert!((e.err_radial[[0, 2]] - 0.4).abs() < 1e-14);
        assert_eq!(e.erz_radial[[0, 1]], 0.0);
    }

    #[test]
    fn test_zero_err_rejected() {
        let mesh = RzMesh::uniform(2, 2, 1.0, 1.0).unwrap();
        let mut e = EddingtonField::diffusion_limit(&mesh);
        e.err[[1, 0]] = 0.0;
        match e.validate(&mesh, 3) {
            Err(QdError::InvalidEddington { group, iz, ir, .. }) => {
                assert_eq!((group, iz, ir), (3, 1, 0));
            }
            other => panic!("expected InvalidEddington, got {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_ezz_rejected() {
        let mesh = RzMesh::uniform(2, 2, 1.0, 1.0).unwrap();
        let mut e = EddingtonField::diffusion_limit(&mesh);
        e.ezz_axial[[2, 1]] = f64::NAN;
        assert!(e.validate(&mesh, 0).is_err());
    }

    #[test]
    fn test_boundary_shapes() {
        let mesh = RzMesh::uniform(4, 3, 1.0, 1.0).unwrap();
        let mut bc = BoundaryData::uniform_flux(&mesh, 2.0);
        assert!(bc.validate(&mesh).is_ok());
        assert_eq!(bc.east.len(), 3);
        assert_eq!(bc.north.flux[3], 2.0);
        bc.east.ratio = Array1::zeros(4);
        assert!(bc.validate(&mesh).is_err());
    }

    #[test]
    fn test_goldin_bias() {
        let mut edge = EdgeData::zeros(1);
        edge.ratio[0] = 0.5;
        edge.inward_current[0] = 0.3;
        edge.inward_flux[0] = 0.2;
        assert!((edge.goldin_bias(0) - 0.2).abs() < 1e-14);
    }
}
