// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};

use crate::constants::{GMRES_MAX_RESTARTS, GMRES_RESTART, ITERATIVE_TOL};
use crate::error::{QdError, QdResult};
use crate::state::RzMesh;

/// Top-level quasidiffusion run configuration.
/// Every section has defaults so partial documents load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdConfig {
    #[serde(default)]
    pub mesh: MeshConfig,
    #[serde(default = "default_energy_groups")]
    pub energy_groups: usize,
    #[serde(default)]
    pub boundary: BoundaryConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    /// Stage per-cell rows on a rayon pool before merging into the matrix.
    #[serde(default)]
    pub parallel_assembly: bool,
    #[serde(default)]
    pub time: TimeConfig,
    #[serde(default)]
    pub source_mode: SourceCoupling,
}

/// Mesh description: explicit edges win over the uniform extents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r_edges: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_edges: Option<Vec<f64>>,
    #[serde(default = "default_extent")]
    pub r_max: f64,
    #[serde(default = "default_extent")]
    pub z_max: f64,
    #[serde(default = "default_cells")]
    pub n_r: usize,
    #[serde(default = "default_cells")]
    pub n_z: usize,
}

/// Boundary closure family for the outer (north, south, east) edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoundaryMode {
    /// Dirichlet flux values.
    #[default]
    #[serde(rename = "flux", alias = "Flux", alias = "FLUX", alias = "dirichlet")]
    Flux,
    /// Zero net current.
    #[serde(
        rename = "reflective",
        alias = "Reflective",
        alias = "REFLECTIVE",
        alias = "reflecting",
        alias = "current"
    )]
    Reflecting,
    /// Linear current/flux relation closed by transport boundary data.
    #[serde(rename = "goldin", alias = "Goldin", alias = "GOLDIN")]
    Goldin,
}

/// Which outer solve drives the QD system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolveType {
    /// Standalone multigroup QD.
    #[default]
    #[serde(rename = "mgqd", alias = "MGQD")]
    Mgqd,
    /// Transport-coupled QD; forces Goldin closures unless reflective.
    #[serde(rename = "tqd", alias = "TQD")]
    Tqd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundaryConfig {
    #[serde(default)]
    pub mgqd_bcs: BoundaryMode,
    #[serde(default)]
    pub solve_type: SolveType,
}

impl BoundaryConfig {
    /// Mode asserted on the outer edges. Reflective wins over Goldin,
    /// Goldin (configured or forced by a transport-coupled solve) over flux.
    pub fn resolved_mode(&self) -> BoundaryMode {
        match (self.mgqd_bcs, self.solve_type) {
            (BoundaryMode::Reflecting, _) => BoundaryMode::Reflecting,
            (BoundaryMode::Goldin, _) | (_, SolveType::Tqd) => BoundaryMode::Goldin,
            (BoundaryMode::Flux, SolveType::Mgqd) => BoundaryMode::Flux,
        }
    }
}

/// How scattering and fission couple the energy groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceCoupling {
    /// Full group-to-group transfer inside the operator.
    #[default]
    #[serde(rename = "multigroup", alias = "MULTIGROUP", alias = "mgqd")]
    Multigroup,
    /// Collapsed grey-group source supplied by the outer iteration.
    #[serde(rename = "grey", alias = "GREY", alias = "gray", alias = "grey_group")]
    Grey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolveMethod {
    /// Sparse system solved by LU factorisation.
    #[default]
    #[serde(rename = "direct", alias = "lu")]
    Direct,
    /// Preconditioned Krylov solve with fallback.
    #[serde(rename = "iterative")]
    Iterative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PreconditionerKind {
    /// Jacobi scaling.
    #[default]
    #[serde(rename = "diagonal", alias = "diag")]
    Diagonal,
    /// Zero-fill incomplete LU.
    #[serde(rename = "ilu")]
    Ilu,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default)]
    pub method: SolveMethod,
    #[serde(default)]
    pub preconditioner: PreconditionerKind,
    #[serde(default = "default_restart")]
    pub restart: usize,
    #[serde(default = "default_max_restarts")]
    pub max_restarts: usize,
    #[serde(default = "default_tol")]
    pub tol: f64,
}

/// Time values at which the transient solution is reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    #[serde(default = "default_times")]
    pub values: Vec<f64>,
}

fn default_energy_groups() -> usize {
    1
}
fn default_extent() -> f64 {
    1.0
}
fn default_cells() -> usize {
    4
}
fn default_restart() -> usize {
    GMRES_RESTART
}
fn default_max_restarts() -> usize {
    GMRES_MAX_RESTARTS
}
fn default_tol() -> f64 {
    ITERATIVE_TOL
}
fn default_times() -> Vec<f64> {
    vec![0.0, 1.0e-3]
}

impl Default for MeshConfig {
    fn default() -> Self {
        MeshConfig {
            r_edges: None,
            z_edges: None,
            r_max: default_extent(),
            z_max: default_extent(),
            n_r: default_cells(),
            n_z: default_cells(),
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            method: SolveMethod::default(),
            preconditioner: PreconditionerKind::default(),
            restart: default_restart(),
            max_restarts: default_max_restarts(),
            tol: default_tol(),
        }
    }
}

impl Default for TimeConfig {
    fn default() -> Self {
        TimeConfig {
            values: default_times(),
        }
    }
}

impl Default for QdConfig {
    fn default() -> Self {
        QdConfig {
            mesh: MeshConfig::default(),
            energy_groups: default_energy_groups(),
            boundary: BoundaryConfig::default(),
            solver: SolverConfig::default(),
            parallel_assembly: false,
            time: TimeConfig::default(),
            source_mode: SourceCoupling::default(),
        }
    }
}

impl MeshConfig {
    pub fn build(&self) -> QdResult<RzMesh> {
        match (&self.r_edges, &self.z_edges) {
            (Some(r), Some(z)) => RzMesh::from_edges(r.clone(), z.clone()),
            (None, None) => RzMesh::uniform(self.n_r, self.n_z, self.r_max, self.z_max),
            _ => Err(QdError::ConfigError(
                "mesh needs both r_edges and z_edges, or neither".to_string(),
            )),
        }
    }
}

impl QdConfig {
    /// Load configuration from JSON file.
    pub fn from_file(path: &str) -> QdResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(contents: &str) -> QdResult<Self> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> QdResult<()> {
        if self.energy_groups == 0 {
            return Err(QdError::ConfigError(
                "energy_groups must be at least 1".to_string(),
            ));
        }
        if self.solver.restart == 0 || self.solver.max_restarts == 0 {
            return Err(QdError::ConfigError(
                "solver restart and max_restarts must be positive".to_string(),
            ));
        }
        if !(self.solver.tol > 0.0 && self.solver.tol < 1.0) {
            return Err(QdError::ConfigError(format!(
                "solver tolerance must lie in (0, 1), got {}",
                self.solver.tol
            )));
        }
        let times = &self.time.values;
        if times.is_empty() || times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(QdError::ConfigError(
                "time values must be non-empty and strictly increasing".to_string(),
            ));
        }
        self.mesh.build()?;
        Ok(())
    }

    pub fn create_mesh(&self) -> QdResult<RzMesh> {
        self.mesh.build()
    }
}
