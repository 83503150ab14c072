// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Multigroup QD Coupling
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! MultiGroupQd: owns the per-group state and the coupled system, and
//! sequences assemble → solve → back-calculate → extract.
//!
//! All groups are assembled into one system and solved jointly. Past
//! solution vectors change only when a step is accepted; a failed
//! solve leaves them as they were and is returned to the caller.

use log::info;
use ndarray::Array2;
use qd_types::closure::{BoundaryData, EddingtonField};
use qd_types::config::{QdConfig, SourceCoupling};
use qd_types::error::{QdError, QdResult};
use qd_types::state::{GroupFields, RzMesh};

use crate::assembler::{Problem, QdSystem};
use crate::boundary::ResolvedBoundaries;
use crate::group::GroupState;
use crate::index::{Face, FluxRole, QdIndex};
use crate::materials::MaterialProvider;
use crate::source::{GreyGroupSources, SourceContribution, SourceMode};
use crate::stencil::Regime;
use crate::strategy::{SolveReport, SolverStrategy};

/// The multigroup quasidiffusion solver.
pub struct MultiGroupQd<M: MaterialProvider> {
    mesh: RzMesh,
    index: QdIndex,
    materials: M,
    groups: Vec<GroupState>,
    boundaries: ResolvedBoundaries,
    sources: SourceMode,
    contributions: Vec<Box<dyn SourceContribution>>,
    strategy: SolverStrategy,
    system: QdSystem,
    parallel: bool,
    times: Vec<f64>,
    last_report: Option<SolveReport>,
}

impl<M: MaterialProvider> MultiGroupQd<M> {
    /// Build from a validated configuration.
    ///
    /// Panics if `materials` disagrees with the configured mesh or group
    /// count.
    pub fn new(config: &QdConfig, materials: M) -> QdResult<Self> {
        config.validate()?;
        let mesh = config.create_mesh()?;
        assert_eq!(
            materials.shape(),
            mesh.cell_shape(),
            "material provider shape does not match the {}x{} mesh",
            mesh.nz,
            mesh.nr
        );
        assert_eq!(
            materials.n_groups(),
            config.energy_groups,
            "material provider group count does not match energy_groups"
        );

        let index = QdIndex::new(&mesh, config.energy_groups);
        let groups = (0..config.energy_groups).map(|_| GroupState::new(&mesh)).collect();
        let system = QdSystem::new(&index);
        let sources = match config.source_mode {
            SourceCoupling::Multigroup => SourceMode::Multigroup,
            SourceCoupling::Grey => {
                SourceMode::GreyGroup(GreyGroupSources::zeros(&mesh, config.energy_groups))
            }
        };
        Ok(MultiGroupQd {
            boundaries: ResolvedBoundaries::from_config(&config.boundary),
            strategy: SolverStrategy::new(config.solver.clone()),
            parallel: config.parallel_assembly,
            times: config.time.values.clone(),
            sources,
            contributions: Vec::new(),
            last_report: None,
            mesh,
            index,
            materials,
            groups,
            system,
        })
    }

    /// Load configuration from JSON file.
    pub fn from_file(path: &str, materials: M) -> QdResult<Self> {
        let config = QdConfig::from_file(path)?;
        Self::new(&config, materials)
    }

    fn check_group(&self, group: usize) {
        let n = self.groups.len();
        assert!(group < n, "energy group {group} outside 0..{n}");
    }

    // ── inputs ──────────────────────────────────────────────────────

    pub fn set_eddington(&mut self, group: usize, field: EddingtonField) -> QdResult<()> {
        self.check_group(group);
        self.groups[group].set_eddington(&self.mesh, group, field)
    }

    pub fn set_boundary_data(&mut self, group: usize, data: BoundaryData) -> QdResult<()> {
        self.check_group(group);
        self.groups[group].set_boundary(&self.mesh, data)
    }

    pub fn set_source(&mut self, group: usize, source: Array2<f64>) -> QdResult<()> {
        self.check_group(group);
        self.groups[group].set_source(&self.mesh, source)
    }

    /// Install the collapsed grey-group data for the next assembly. Only
    /// valid when the run was configured with `source_mode = "grey"`.
    pub fn set_grey_sources(&mut self, grey: GreyGroupSources) -> QdResult<()> {
        match &mut self.sources {
            SourceMode::GreyGroup(current) => {
                grey.validate(&self.mesh, self.groups.len())?;
                *current = grey;
                Ok(())
            }
            SourceMode::Multigroup => Err(QdError::ConfigError(
                "grey sources supplied to a run configured for multigroup coupling".to_string(),
            )),
        }
    }

    pub fn source_mode(&self) -> &SourceMode {
        &self.sources
    }

    pub fn add_source_contribution(&mut self, contribution: Box<dyn SourceContribution>) {
        self.contributions.push(contribution);
    }

    pub fn clear_source_contributions(&mut self) {
        self.contributions.clear();
    }

    /// Stage `coeff · x[col]` as a source of equation `row` for the next
    /// assembly. Indices come from [`MultiGroupQd::index`].
    pub fn fold_flux_source(&mut self, row: usize, col: usize, coeff: f64) {
        self.system.fold_flux_source(row, col, coeff);
    }

    /// Install per-group fields as the state at the first time value:
    /// fluxes into `x_past` (and `x`), currents into `curr_past`.
    pub fn set_initial_condition(&mut self, fields: Vec<GroupFields>) -> QdResult<()> {
        QdError::check_shape("initial condition groups", &[self.groups.len()], &[fields.len()])?;
        for (state, f) in self.groups.iter_mut().zip(fields) {
            state.set_fields(&self.mesh, f)?;
            state.fields.promote_to_previous();
        }
        for g in 0..self.groups.len() {
            pack_group(
                &self.mesh,
                &self.index,
                g,
                &self.groups[g].fields,
                &mut self.system.x_past,
                &mut self.system.curr_past,
            );
        }
        self.system.x.clone_from(&self.system.x_past);
        self.system.currents.clone_from(&self.system.curr_past);
        Ok(())
    }

    // ── cycle steps ─────────────────────────────────────────────────

    /// Assembly inputs as currently installed, for callers driving the
    /// cycle by hand.
    pub fn assembly_problem(&self, regime: Regime) -> Problem<'_> {
        Problem {
            mesh: &self.mesh,
            index: &self.index,
            materials: &self.materials,
            groups: &self.groups,
            boundaries: &self.boundaries,
            sources: &self.sources,
            contributions: &self.contributions,
            regime,
            parallel: self.parallel,
        }
    }

    /// Clear and repopulate `A` and `b` for every group.
    pub fn build_linear_system(&mut self, regime: Regime) {
        let problem = Problem {
            mesh: &self.mesh,
            index: &self.index,
            materials: &self.materials,
            groups: &self.groups,
            boundaries: &self.boundaries,
            sources: &self.sources,
            contributions: &self.contributions,
            regime,
            parallel: self.parallel,
        };
        self.system.assemble(&problem);
    }

    /// Solve the assembled system through the fallback chain.
    pub fn solve_linear_system(&mut self) -> QdResult<SolveReport> {
        let sys = &mut self.system;
        let report = self.strategy.solve(&sys.a, &sys.b, &mut sys.x)?;
        self.last_report = Some(report.clone());
        Ok(report)
    }

    /// Rebuild `C`, `d` for the current Eddington fields and evaluate the
    /// face currents of the latest solution.
    pub fn back_calculate(&mut self, regime: Regime) {
        let problem = Problem {
            mesh: &self.mesh,
            index: &self.index,
            materials: &self.materials,
            groups: &self.groups,
            boundaries: &self.boundaries,
            sources: &self.sources,
            contributions: &self.contributions,
            regime,
            parallel: self.parallel,
        };
        self.system.back_calculate(&problem);
    }

    /// Unpack the flat solution into per-group fields. The fields being
    /// replaced become the previous-iterate snapshots.
    pub fn extract(&mut self) {
        for g in 0..self.groups.len() {
            let fields = &mut self.groups[g].fields;
            fields.promote_to_previous();
            unpack_group(&self.mesh, &self.index, g, &self.system.x, &self.system.currents, fields);
        }
    }

    // ── drivers ─────────────────────────────────────────────────────

    /// One backward-Euler step of length `dt`.
    pub fn step(&mut self, dt: f64) -> QdResult<SolveReport> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(QdError::ConfigError(format!("time step must be positive, got {dt}")));
        }
        let regime = Regime::Transient { dt };
        self.build_linear_system(regime);
        let report = self.solve_linear_system()?;
        self.system.accept_flux();
        self.back_calculate(regime);
        self.system.accept_currents();
        self.extract();
        Ok(report)
    }

    /// Step through consecutive pairs of `times`. Stops at the first
    /// failed solve.
    pub fn solve_transient(&mut self, times: &[f64]) -> QdResult<Vec<SolveReport>> {
        if times.iter().any(|t| !t.is_finite()) || times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(QdError::ConfigError(
                "time values must be strictly increasing".to_string(),
            ));
        }
        let mut reports = Vec::with_capacity(times.len().saturating_sub(1));
        for w in times.windows(2) {
            let report = self.step(w[1] - w[0])?;
            info!(
                "QD step to t = {:.6e}: {} ({} iterations, residual {:.3e})",
                w[1], report.method, report.iterations, report.residual
            );
            reports.push(report);
        }
        Ok(reports)
    }

    /// Step through the time values of the configuration.
    pub fn run_transient(&mut self) -> QdResult<Vec<SolveReport>> {
        let times = self.times.clone();
        self.solve_transient(&times)
    }

    pub fn solve_steady_state(&mut self) -> QdResult<SolveReport> {
        let regime = Regime::SteadyState;
        self.build_linear_system(regime);
        let report = self.solve_linear_system()?;
        self.back_calculate(regime);
        self.extract();
        info!(
            "QD steady state: {} ({} iterations, residual {:.3e})",
            report.method, report.iterations, report.residual
        );
        Ok(report)
    }

    /// Accept the latest transient solution after the outer iteration
    /// has converged: it becomes the past state of the next step.
    pub fn update_after_convergence(&mut self, dt: f64) {
        self.system.accept_flux();
        self.back_calculate(Regime::Transient { dt });
        self.system.accept_currents();
        self.extract();
    }

    pub fn update_after_convergence_steady(&mut self) {
        self.back_calculate(Regime::SteadyState);
        self.system.accept_flux();
        self.system.accept_currents();
        self.extract();
    }

    // ── accessors ───────────────────────────────────────────────────

    pub fn mesh(&self) -> &RzMesh {
        &self.mesh
    }

    pub fn index(&self) -> &QdIndex {
        &self.index
    }

    /// Configured transient time values.
    pub fn time_values(&self) -> &[f64] {
        &self.times
    }

    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn materials(&self) -> &M {
        &self.materials
    }

    pub fn boundaries(&self) -> &ResolvedBoundaries {
        &self.boundaries
    }

    pub fn group(&self, group: usize) -> &GroupState {
        &self.groups[group]
    }

    pub fn fields(&self, group: usize) -> &GroupFields {
        &self.groups[group].fields
    }

    /// Cell-average scalar flux `[nz, nr]` of `group`.
    pub fn scalar_flux(&self, group: usize) -> &Array2<f64> {
        &self.groups[group].fields.s_flux
    }

    /// Max-norm change of the cell flux of `group` between the last two
    /// extractions.
    pub fn flux_residual(&self, group: usize) -> f64 {
        self.groups[group].fields.flux_change()
    }

    pub fn system(&self) -> &QdSystem {
        &self.system
    }

    pub fn strategy(&self) -> &SolverStrategy {
        &self.strategy
    }

    pub fn last_report(&self) -> Option<&SolveReport> {
        self.last_report.as_ref()
    }
}

/// Face field entry for `face` of the cell at `(iz, ir)`.
fn face_slot(face: Face, iz: usize, ir: usize) -> (bool, [usize; 2]) {
    match face {
        Face::North => (false, [iz, ir]),
        Face::South => (false, [iz + 1, ir]),
        Face::West => (true, [iz, ir]),
        Face::East => (true, [iz, ir + 1]),
    }
}

fn pack_group(
    mesh: &RzMesh,
    index: &QdIndex,
    group: usize,
    fields: &GroupFields,
    x: &mut [f64],
    currents: &mut [f64],
) {
    for cell in mesh.cells() {
        let (iz, ir) = (cell.iz, cell.ir);
        x[index.flux(cell, FluxRole::Center, group)] = fields.s_flux[[iz, ir]];
        for face in Face::ALL {
            let (radial, at) = face_slot(face, iz, ir);
            let (flux, current) = if radial {
                (&fields.s_flux_r, &fields.current_r)
            } else {
                (&fields.s_flux_z, &fields.current_z)
            };
            x[index.flux(cell, face.flux_role(), group)] = flux[at];
            currents[index.current(cell, face, group)] = current[at];
        }
    }
}

fn unpack_group(
    mesh: &RzMesh,
    index: &QdIndex,
    group: usize,
    x: &[f64],
    currents: &[f64],
    fields: &mut GroupFields,
) {
    for cell in mesh.cells() {
        let (iz, ir) = (cell.iz, cell.ir);
        fields.s_flux[[iz, ir]] = x[index.flux(cell, FluxRole::Center, group)];
        for face in Face::ALL {
            let (radial, at) = face_slot(face, iz, ir);
            let phi = x[index.flux(cell, face.flux_role(), group)];
            let j = currents[index.current(cell, face, group)];
            if radial {
                fields.s_flux_r[at] = phi;
                fields.current_r[at] = j;
            } else {
                fields.s_flux_z[at] = phi;
                fields.current_z[at] = j;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::{GroupConstants, MaterialTable};
    use crate::source::FieldSource;
    use qd_types::config::{BoundaryMode, SolveMethod};
    use qd_types::state::Cell;

    fn config(nr: usize, nz: usize, groups: usize, mode: BoundaryMode) -> QdConfig {
        let mut cfg = QdConfig::default();
        cfg.mesh.n_r = nr;
        cfg.mesh.n_z = nz;
        cfg.mesh.r_max = 1.5;
        cfg.mesh.z_max = 2.0;
        cfg.energy_groups = groups;
        cfg.boundary.mgqd_bcs = mode;
        cfg
    }

    fn absorber(cfg: &QdConfig, sig_t: f64, sig_s: f64) -> MaterialTable {
        let mesh = cfg.create_mesh().unwrap();
        MaterialTable::homogeneous(
            &mesh,
            &[GroupConstants::absorber(sig_t, 1.0e4)],
            &Array2::from_elem((1, 1), sig_s),
        )
        .unwrap()
    }

    #[test]
    fn test_reflecting_closed_system_is_flat() {
        let cfg = config(4, 5, 1, BoundaryMode::Reflecting);
        let mut qd = MultiGroupQd::new(&cfg, absorber(&cfg, 2.0, 0.0)).unwrap();
        qd.set_source(0, Array2::from_elem((5, 4), 3.0)).unwrap();
        qd.solve_steady_state().unwrap();
        for &phi in qd.scalar_flux(0) {
            assert!((phi - 1.5).abs() < 1e-10, "phi = {phi}");
        }
        for &j in qd.fields(0).current_r.iter().chain(qd.fields(0).current_z.iter()) {
            assert!(j.abs() < 1e-10, "J = {j}");
        }
    }

    #[test]
    fn test_transient_relaxes_to_steady_state() {
        let cfg = config(3, 3, 1, BoundaryMode::Flux);
        let mats = absorber(&cfg, 1.0, 0.2);
        let mut steady = MultiGroupQd::new(&cfg, mats.clone()).unwrap();
        let mut transient = MultiGroupQd::new(&cfg, mats).unwrap();
        for qd in [&mut steady, &mut transient] {
            qd.set_source(0, Array2::from_elem((3, 3), 1.0)).unwrap();
            let mesh = qd.mesh().clone();
            qd.set_boundary_data(0, BoundaryData::uniform_flux(&mesh, 0.5)).unwrap();
        }
        steady.solve_steady_state().unwrap();

        // v·dt = 1e4 · 1e-2 ≫ 1/σ: each step is nearly a steady solve.
        let times: Vec<f64> = (0..=20).map(|k| k as f64 * 1.0e-2).collect();
        let reports = transient.solve_transient(&times).unwrap();
        assert_eq!(reports.len(), 20);
        for (a, b) in steady.scalar_flux(0).iter().zip(transient.scalar_flux(0).iter()) {
            assert!((a - b).abs() < 1e-8, "{a} vs {b}");
        }
        assert!(transient.flux_residual(0) < 1e-8);
    }

    #[test]
    fn test_initial_condition_round_trips_through_extract() {
        let cfg = config(2, 3, 2, BoundaryMode::Flux);
        let mesh = cfg.create_mesh().unwrap();
        let mats = MaterialTable::homogeneous(
            &mesh,
            &[GroupConstants::absorber(1.0, 1.0), GroupConstants::absorber(2.0, 1.0)],
            &Array2::zeros((2, 2)),
        )
        .unwrap();
        let mut qd = MultiGroupQd::new(&cfg, mats).unwrap();
        let mut ic = Vec::new();
        for g in 0..2 {
            let mut f = GroupFields::zeros(&mesh);
            f.s_flux = Array2::from_shape_fn((3, 2), |(iz, ir)| (g * 10 + iz * 2 + ir) as f64);
            f.s_flux_r = Array2::from_shape_fn((3, 3), |(iz, ir)| 0.5 + (iz + ir) as f64);
            f.s_flux_z = Array2::from_shape_fn((4, 2), |(iz, ir)| 0.25 * (iz * ir) as f64);
            f.current_r = Array2::from_shape_fn((3, 3), |(iz, ir)| -(iz as f64) + ir as f64);
            f.current_z = Array2::from_shape_fn((4, 2), |(iz, ir)| 0.1 * (iz + 3 * ir) as f64);
            ic.push(f);
        }
        qd.set_initial_condition(ic.clone()).unwrap();
        let centre = qd.index().flux(Cell::new(1, 2), FluxRole::Center, 1);
        assert_eq!(qd.system().x_past[centre], 15.0);

        qd.extract();
        for g in 0..2 {
            assert_eq!(qd.fields(g).s_flux, ic[g].s_flux);
            assert_eq!(qd.fields(g).s_flux_r, ic[g].s_flux_r);
            assert_eq!(qd.fields(g).s_flux_z, ic[g].s_flux_z);
            assert_eq!(qd.fields(g).current_r, ic[g].current_r);
            assert_eq!(qd.fields(g).current_z, ic[g].current_z);
            assert_eq!(qd.flux_residual(g), 0.0);
        }
        assert!(qd.set_initial_condition(vec![GroupFields::zeros(&mesh)]).is_err());
    }

    #[test]
    fn test_downscatter_couples_one_way() {
        // Group 1 scatters into group 0; nothing flows from 0 to 1.
        let mut cfg = config(3, 2, 2, BoundaryMode::Reflecting);
        cfg.solver.method = SolveMethod::Direct;
        let mesh = cfg.create_mesh().unwrap();
        let mut scatter = Array2::zeros((2, 2));
        scatter[[1, 0]] = 0.3;
        let mats = MaterialTable::homogeneous(
            &mesh,
            &[GroupConstants::absorber(1.0, 1.0), GroupConstants::absorber(1.5, 1.0)],
            &scatter,
        )
        .unwrap();

        let solve = |q0: f64| {
            let mut qd = MultiGroupQd::new(&cfg, mats.clone()).unwrap();
            qd.set_source(0, Array2::from_elem((2, 3), q0)).unwrap();
            qd.set_source(1, Array2::from_elem((2, 3), 3.0)).unwrap();
            qd.solve_steady_state().unwrap();
            (qd.scalar_flux(0).clone(), qd.scalar_flux(1).clone())
        };
        let (g0_a, g1_a) = solve(0.0);
        let (g0_b, g1_b) = solve(5.0);

        // Group 1: 1.5 φ1 = 3.
        for (a, b) in g1_a.iter().zip(g1_b.iter()) {
            assert!((a - 2.0).abs() < 1e-10 && (b - 2.0).abs() < 1e-10);
        }
        // Group 0: φ0 = q0 + 0.3 φ1.
        for (a, b) in g0_a.iter().zip(g0_b.iter()) {
            assert!((a - 0.6).abs() < 1e-10, "{a}");
            assert!((b - 5.6).abs() < 1e-10, "{b}");
        }
    }

    #[test]
    fn test_grey_mode_uses_collapsed_source() {
        let mut cfg = config(2, 2, 1, BoundaryMode::Reflecting);
        let mesh = cfg.create_mesh().unwrap();
        let fuel = GroupConstants {
            sig_t: 2.0,
            sig_f: 0.5,
            nu: 2.0,
            chi_p: 1.0,
            chi_d: 0.5,
            velocity: 1.0,
        };
        let mats = MaterialTable::homogeneous(&mesh, &[fuel], &Array2::from_elem((1, 1), 0.5)).unwrap();
        let mut grey = GreyGroupSources::zeros(&mesh, 1);
        grey.upscatter_coeff[0].fill(0.1);
        grey.fission_coeff.fill(0.4);
        grey.grey_flux.fill(2.0);
        grey.dnp_source.fill(0.6);
        grey.keff = 2.0;

        // Multigroup coupling folds ν σf into the operator and rejects grey data.
        let mut multigroup = MultiGroupQd::new(&cfg, mats.clone()).unwrap();
        assert!(matches!(multigroup.source_mode(), SourceMode::Multigroup));
        let err = multigroup.set_grey_sources(grey.clone()).unwrap_err();
        assert!(matches!(err, QdError::ConfigError(_)), "got {err:?}");
        multigroup.solve_steady_state().unwrap();
        for &phi in multigroup.scalar_flux(0) {
            assert!(phi.abs() < 1e-10);
        }

        cfg.source_mode = SourceCoupling::Grey;
        let mut qd = MultiGroupQd::new(&cfg, mats).unwrap();
        assert!(matches!(qd.source_mode(), SourceMode::GreyGroup(_)));
        assert!(qd.set_grey_sources(GreyGroupSources::zeros(&mesh, 2)).is_err());
        qd.set_grey_sources(grey).unwrap();
        qd.solve_steady_state().unwrap();
        // (σt − σs) φ = (0.1 + 1.0 · 0.4/2) · 2 + 0.5 · 0.6
        let expected = ((0.1 + 0.2) * 2.0 + 0.3) / 1.5;
        for &phi in qd.scalar_flux(0) {
            assert!((phi - expected).abs() < 1e-10, "{phi} vs {expected}");
        }
    }

    #[test]
    fn test_grey_mode_from_config_starts_with_zero_sources() {
        let mut cfg = config(2, 3, 1, BoundaryMode::Reflecting);
        cfg.source_mode = SourceCoupling::Grey;
        let mut qd = MultiGroupQd::new(&cfg, absorber(&cfg, 1.0, 0.4)).unwrap();
        qd.set_source(0, Array2::from_elem((3, 2), 1.2)).unwrap();
        qd.solve_steady_state().unwrap();
        // No grey data yet: only in-group scattering couples.
        for &phi in qd.scalar_flux(0) {
            assert!((phi - 2.0).abs() < 1e-10, "{phi}");
        }
    }

    fn config_path(name: &str) -> String {
        std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("configs")
            .join(name)
            .to_string_lossy()
            .to_string()
    }

    #[test]
    fn test_run_transient_follows_configured_times() {
        for name in ["two_group_rz.json", "goldin_edges.json"] {
            let cfg = QdConfig::from_file(&config_path(name)).unwrap();
            let mesh = cfg.create_mesh().unwrap();
            let groups = cfg.energy_groups;
            let constants: Vec<GroupConstants> = (0..groups)
                .map(|g| GroupConstants::absorber(1.0 + 0.5 * g as f64, 1.0e5))
                .collect();
            let mut scatter = Array2::zeros((groups, groups));
            for g in 0..groups {
                scatter[[g, g]] = 0.2;
            }
            let mats = MaterialTable::homogeneous(&mesh, &constants, &scatter).unwrap();
            let mut qd = MultiGroupQd::from_file(&config_path(name), mats).unwrap();
            assert_eq!(qd.time_values(), cfg.time.values.as_slice());

            let ic = (0..groups).map(|_| GroupFields::uniform_flux(&mesh, 1.0)).collect();
            qd.set_initial_condition(ic).unwrap();
            for g in 0..groups {
                qd.set_source(g, Array2::from_elem(mesh.cell_shape(), 0.8)).unwrap();
            }
            let reports = qd.run_transient().unwrap();
            assert_eq!(reports.len(), cfg.time.values.len() - 1, "{name}");
            for g in 0..groups {
                let phi = qd.scalar_flux(g);
                assert!(phi.iter().all(|v| v.is_finite() && *v > 0.0), "{name}: {phi:?}");
            }
        }
    }

    #[test]
    fn test_reflecting_transient_from_config_stays_uniform() {
        let cfg = QdConfig::from_file(&config_path("two_group_rz.json")).unwrap();
        let mesh = cfg.create_mesh().unwrap();
        let mut scatter = Array2::zeros((2, 2));
        scatter[[1, 0]] = 0.2;
        let mats = MaterialTable::homogeneous(
            &mesh,
            &[GroupConstants::absorber(0.8, 2.0e3), GroupConstants::absorber(0.5, 1.0e4)],
            &scatter,
        )
        .unwrap();
        let mut qd = MultiGroupQd::new(&cfg, mats).unwrap();
        qd.set_initial_condition(vec![GroupFields::uniform_flux(&mesh, 1.0); 2]).unwrap();
        for g in 0..2 {
            qd.set_source(g, Array2::from_elem(mesh.cell_shape(), 1.0)).unwrap();
        }
        qd.run_transient().unwrap();
        for g in 0..2 {
            let phi = qd.scalar_flux(g);
            let first = phi[[0, 0]];
            for &v in phi {
                assert!((v - first).abs() < 1e-6 * first, "group {g}: {v} vs {first}");
            }
        }
    }

    #[test]
    fn test_source_contribution_and_update_after_convergence() {
        let cfg = config(2, 2, 1, BoundaryMode::Reflecting);
        let mut qd = MultiGroupQd::new(&cfg, absorber(&cfg, 4.0, 0.0)).unwrap();
        qd.add_source_contribution(Box::new(FieldSource {
            fields: vec![Array2::from_elem((2, 2), 2.0)],
        }));
        qd.solve_steady_state().unwrap();
        qd.update_after_convergence_steady();
        for &phi in qd.scalar_flux(0) {
            assert!((phi - 0.5).abs() < 1e-10);
        }
        assert_eq!(qd.system().x_past, qd.system().x);
        assert_eq!(qd.flux_residual(0), 0.0);
        assert!(qd.last_report().is_some());
    }

    #[test]
    fn test_failed_step_keeps_past_state() {
        let cfg = config(1, 1, 1, BoundaryMode::Flux);
        let mut qd = MultiGroupQd::new(&cfg, absorber(&cfg, 1.0, 0.0)).unwrap();
        let mesh = qd.mesh().clone();
        qd.set_initial_condition(vec![GroupFields::uniform_flux(&mesh, 1.0)]).unwrap();
        let x_past = qd.system().x_past.clone();
        let curr_past = qd.system().curr_past.clone();

        // Cancel the centre row exactly so the step matrix is singular.
        let dt = 1.0e-3;
        let centre = qd.index().flux(Cell::new(0, 0), FluxRole::Center, 0);
        let (a, _) = qd
            .assembly_problem(Regime::Transient { dt })
            .assemble(&x_past, &curr_past, &[]);
        let row: Vec<(usize, f64)> = a.outer_view(centre).unwrap().iter().map(|(c, &v)| (c, v)).collect();
        for (col, v) in row {
            qd.fold_flux_source(centre, col, v);
        }

        let err = qd.step(dt).unwrap_err();
        assert!(matches!(err, QdError::SolverFailed { .. }));
        assert_eq!(qd.system().x_past, x_past);
        assert_eq!(qd.system().curr_past, curr_past);
        assert_eq!(qd.fields(0).s_flux[[0, 0]], 1.0);
    }

    #[test]
    fn test_iterative_matches_direct() {
        let mut cfg = config(4, 3, 1, BoundaryMode::Goldin);
        let mats = absorber(&cfg, 1.2, 0.5);
        let mut direct = MultiGroupQd::new(&cfg, mats.clone()).unwrap();
        cfg.solver.method = SolveMethod::Iterative;
        let mut iterative = MultiGroupQd::new(&cfg, mats).unwrap();
        for qd in [&mut direct, &mut iterative] {
            let mesh = qd.mesh().clone();
            let mut bc = BoundaryData::zeros(&mesh);
            bc.south.ratio.fill(0.5);
            bc.east.ratio.fill(0.5);
            bc.north.ratio.fill(-0.5);
            qd.set_boundary_data(0, bc).unwrap();
            qd.set_source(0, Array2::from_elem((3, 4), 1.0)).unwrap();
            qd.solve_steady_state().unwrap();
        }
        assert_eq!(direct.last_report().map(|r| r.method), Some(crate::strategy::SolveAttempt::Direct));
        for (a, b) in direct.scalar_flux(0).iter().zip(iterative.scalar_flux(0).iter()) {
            assert!((a - b).abs() < 1e-6 * (1.0 + a.abs()), "{a} vs {b}");
        }
    }

    #[test]
    #[should_panic(expected = "group count")]
    fn test_group_count_mismatch_panics() {
        let cfg = config(2, 2, 2, BoundaryMode::Flux);
        let _ = MultiGroupQd::new(&cfg, absorber(&cfg, 1.0, 0.0));
    }
}
