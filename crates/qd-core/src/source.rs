// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — QD Sources
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Source terms entering the zeroth-moment balance from outside the
//! QD system: coupled physics contributions and the collapsed
//! grey-group source.

use ndarray::Array2;
use qd_types::error::{QdError, QdResult};
use qd_types::state::{Cell, RzMesh};

/// Volumetric source supplied by a coupled physics module (heat
/// transfer, precursors, ...). Folded into the right-hand side of the
/// zeroth-moment equation of every assembly pass.
pub trait SourceContribution: Send + Sync {
    /// Source density in `cell` for energy `group`.
    fn source_density(&self, cell: Cell, group: usize) -> f64;
}

/// Fixed per-group source density fields.
#[derive(Debug, Clone)]
pub struct FieldSource {
    pub fields: Vec<Array2<f64>>,
}

impl SourceContribution for FieldSource {
    fn source_density(&self, cell: Cell, group: usize) -> f64 {
        self.fields
            .get(group)
            .map_or(0.0, |f| f[[cell.iz, cell.ir]])
    }
}

/// Collapsed one-group data used when grey-group acceleration drives
/// the multigroup system.
#[derive(Debug, Clone)]
pub struct GreyGroupSources {
    /// Up-scatter coefficient into each group `[group][nz, nr]`.
    pub upscatter_coeff: Vec<Array2<f64>>,
    /// Flux-weighted fission production coefficient `[nz, nr]`.
    pub fission_coeff: Array2<f64>,
    /// Grey (one-group) scalar flux `[nz, nr]`.
    pub grey_flux: Array2<f64>,
    /// Delayed-neutron precursor decay source `[nz, nr]`.
    pub dnp_source: Array2<f64>,
    /// Multiplication eigenvalue dividing the steady-state fission term.
    pub keff: f64,
}

impl GreyGroupSources {
    pub fn zeros(mesh: &RzMesh, groups: usize) -> Self {
        let shape = mesh.cell_shape();
        GreyGroupSources {
            upscatter_coeff: vec![Array2::zeros(shape); groups],
            fission_coeff: Array2::zeros(shape),
            grey_flux: Array2::zeros(shape),
            dnp_source: Array2::zeros(shape),
            keff: 1.0,
        }
    }

    pub fn validate(&self, mesh: &RzMesh, groups: usize) -> QdResult<()> {
        let (nz, nr) = mesh.cell_shape();
        QdError::check_shape(
            "grey upscatter groups",
            &[groups],
            &[self.upscatter_coeff.len()],
        )?;
        for up in &self.upscatter_coeff {
            QdError::check_shape("grey upscatter coefficient", &[nz, nr], up.shape())?;
        }
        QdError::check_shape("grey fission coefficient", &[nz, nr], self.fission_coeff.shape())?;
        QdError::check_shape("grey flux", &[nz, nr], self.grey_flux.shape())?;
        QdError::check_shape("DNP source", &[nz, nr], self.dnp_source.shape())?;
        if !(self.keff.is_finite() && self.keff > 0.0) {
            return Err(QdError::ConfigError(format!(
                "keff must be positive, got {}",
                self.keff
            )));
        }
        Ok(())
    }
}

/// How scattering and fission couple the groups.
#[derive(Debug, Clone, Default)]
pub enum SourceMode {
    /// Full group-to-group transfer matrix inside `A`.
    #[default]
    Multigroup,
    /// In-group scattering and transfer from lower-indexed groups inside
    /// `A`, the rest from grey data.
    GreyGroup(GreyGroupSources),
}
