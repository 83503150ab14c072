// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — QD Group State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use ndarray::Array2;
use qd_types::closure::{BoundaryData, EddingtonField};
use qd_types::error::{QdError, QdResult};
use qd_types::state::{GroupFields, RzMesh};

/// Inputs and solution fields of one energy group.
///
/// Groups live in an index-addressed `Vec`; nothing here refers to
/// other groups or to the solver.
#[derive(Debug, Clone)]
pub struct GroupState {
    pub eddington: EddingtonField,
    pub boundary: BoundaryData,
    /// External volumetric source `q` `[nz, nr]`.
    pub source: Array2<f64>,
    pub fields: GroupFields,
}

impl GroupState {
    /// Diffusion-limit closure, zero boundary data, sources and fields.
    pub fn new(mesh: &RzMesh) -> Self {
        GroupState {
            eddington: EddingtonField::diffusion_limit(mesh),
            boundary: BoundaryData::zeros(mesh),
            source: Array2::zeros(mesh.cell_shape()),
            fields: GroupFields::zeros(mesh),
        }
    }

    pub fn set_eddington(&mut self, mesh: &RzMesh, group: usize, field: EddingtonField) -> QdResult<()> {
        field.validate(mesh, group)?;
        self.eddington = field;
        Ok(())
    }

    pub fn set_boundary(&mut self, mesh: &RzMesh, data: BoundaryData) -> QdResult<()> {
        data.validate(mesh)?;
        self.boundary = data;
        Ok(())
    }

    pub fn set_source(&mut self, mesh: &RzMesh, source: Array2<f64>) -> QdResult<()> {
        let (nz, nr) = mesh.cell_shape();
        QdError::check_shape("external source", &[nz, nr], source.shape())?;
        self.source = source;
        Ok(())
    }

    /// Replace the solution fields, e.g. with an initial condition.
    pub fn set_fields(&mut self, mesh: &RzMesh, fields: GroupFields) -> QdResult<()> {
        let c = mesh.cell_shape();
        let r = mesh.radial_face_shape();
        let z = mesh.axial_face_shape();
        QdError::check_shape("scalar flux", &[c.0, c.1], fields.s_flux.shape())?;
        QdError::check_shape("radial face flux", &[r.0, r.1], fields.s_flux_r.shape())?;
        QdError::check_shape("axial face flux", &[z.0, z.1], fields.s_flux_z.shape())?;
        QdError::check_shape("radial current", &[r.0, r.1], fields.current_r.shape())?;
        QdError::check_shape("axial current", &[z.0, z.1], fields.current_z.shape())?;
        self.fields = fields;
        Ok(())
    }
}
