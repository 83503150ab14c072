// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — QD Linear System Assembler
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Assembly of the multigroup QD system `A x = b`.
//!
//! Every (group, cell) pair emits its own rows: the zeroth-moment
//! balance on the centre unknown, a continuity row on the south and
//! east faces it owns, and boundary rows for the north/west faces it
//! owns on the top row and axis column. Rows are staged per cell in a
//! [`RowBlock`] and merged in a fixed order, so serial and parallel
//! assembly produce the same matrix bit for bit.

use log::debug;
use qd_math::sparse::csr_from_triplets;
use qd_types::state::{Cell, RzMesh};
use rayon::prelude::*;
use sprs::CsMat;

use crate::backcalc::BackCalcSystem;
use crate::boundary::{assert_boundary, ResolvedBoundaries};
use crate::group::GroupState;
use crate::index::{Face, FluxRole, QdIndex};
use crate::materials::MaterialProvider;
use crate::source::{SourceContribution, SourceMode};
use crate::stencil::{CurrentStencil, GroupContext, Regime};

/// Matrix entries and right-hand-side increments staged for one cell.
#[derive(Debug, Clone, Default)]
pub struct RowBlock {
    pub(crate) entries: Vec<(usize, usize, f64)>,
    pub(crate) rhs: Vec<(usize, f64)>,
}

impl RowBlock {
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        if value != 0.0 {
            self.entries.push((row, col, value));
        }
    }

    #[inline]
    pub fn add_rhs(&mut self, row: usize, value: f64) {
        self.rhs.push((row, value));
    }

    /// Add `weight · J` to `row`, with `J` given by `stencil`; the
    /// stencil constant moves to the right-hand side.
    pub fn stamp_current(&mut self, row: usize, weight: f64, stencil: &CurrentStencil) {
        for &(col, coeff) in &stencil.terms {
            self.add(row, col, weight * coeff);
        }
        self.add_rhs(row, -weight * stencil.constant);
    }

    #[cfg(test)]
    pub(crate) fn to_dense_row(&self, row: usize, n: usize) -> Vec<f64> {
        let mut dense = vec![0.0; n];
        for &(r, c, v) in &self.entries {
            if r == row {
                dense[c] += v;
            }
        }
        dense
    }

    #[cfg(test)]
    pub(crate) fn rhs_sum(&self) -> f64 {
        self.rhs.iter().map(|&(_, v)| v).sum()
    }
}

/// Borrowed inputs of one assembly pass.
pub struct Problem<'a> {
    pub mesh: &'a RzMesh,
    pub index: &'a QdIndex,
    pub materials: &'a dyn MaterialProvider,
    pub groups: &'a [GroupState],
    pub boundaries: &'a ResolvedBoundaries,
    pub sources: &'a SourceMode,
    pub contributions: &'a [Box<dyn SourceContribution>],
    pub regime: Regime,
    pub parallel: bool,
}

impl<'a> Problem<'a> {
    /// One current-relation context per group.
    pub(crate) fn contexts<'b>(&'b self, curr_past: &'b [f64]) -> Vec<GroupContext<'b>> {
        let groups = self.groups;
        (0..self.index.n_groups())
            .map(|g| {
                GroupContext::new(
                    self.mesh,
                    self.index,
                    self.materials,
                    &groups[g].eddington,
                    g,
                    self.regime,
                    curr_past,
                )
            })
            .collect()
    }

    /// Build `A` and `b`. `extra` entries are added to `A` after the
    /// per-cell rows.
    pub fn assemble(
        &self,
        x_past: &[f64],
        curr_past: &[f64],
        extra: &[(usize, usize, f64)],
    ) -> (CsMat<f64>, Vec<f64>) {
        let n = self.index.n_flux_unknowns();
        assert_eq!(
            self.groups.len(),
            self.index.n_groups(),
            "group state count does not match the index map"
        );
        if let Regime::Transient { .. } = self.regime {
            assert_eq!(x_past.len(), n, "past flux vector does not match the index map");
        }

        let contexts = self.contexts(curr_past);
        let mesh = self.mesh;
        let work: Vec<(usize, Cell)> = (0..contexts.len())
            .flat_map(|g| mesh.cells().map(move |cell| (g, cell)))
            .collect();

        let blocks: Vec<RowBlock> = if self.parallel {
            work.par_iter()
                .map(|&(g, cell)| self.cell_rows(&contexts[g], x_past, cell))
                .collect()
        } else {
            work.iter()
                .map(|&(g, cell)| self.cell_rows(&contexts[g], x_past, cell))
                .collect()
        };

        let capacity = blocks.iter().map(|blk| blk.entries.len()).sum::<usize>() + extra.len();
        let mut triplets = Vec::with_capacity(capacity);
        let mut b = vec![0.0; n];
        for blk in &blocks {
            triplets.extend_from_slice(&blk.entries);
            for &(row, v) in &blk.rhs {
                b[row] += v;
            }
        }
        triplets.extend_from_slice(extra);

        let a = csr_from_triplets(n, n, &triplets);
        debug!(
            "assembled QD system: {} unknowns, {} nonzeros, {} groups, parallel={}",
            n,
            a.nnz(),
            contexts.len(),
            self.parallel
        );
        (a, b)
    }

    fn cell_rows(&self, ctx: &GroupContext<'_>, x_past: &[f64], cell: Cell) -> RowBlock {
        let mut rows = RowBlock::default();
        self.balance_row(ctx, x_past, cell, &mut rows);
        self.south_row(ctx, cell, &mut rows);
        self.east_row(ctx, cell, &mut rows);
        let bc = &self.groups[ctx.group].boundary;
        if cell.iz == 0 {
            assert_boundary(ctx, self.boundaries, bc, cell, Face::North, &mut rows);
        }
        if cell.ir == 0 {
            assert_boundary(ctx, self.boundaries, bc, cell, Face::West, &mut rows);
        }
        rows
    }

    /// `V(1/(vΔt) + σt)φ − V Σ σ(g'→g)φ_g' + Σ ±A J = V(φ_past/(vΔt) + q)`.
    fn balance_row(&self, ctx: &GroupContext<'_>, x_past: &[f64], cell: Cell, rows: &mut RowBlock) {
        let g = ctx.group;
        let m = self.materials;
        let geo = self.mesh.geometry(cell);
        let vol = geo.volume;
        let row = ctx.col(cell, FluxRole::Center);
        let (iz, ir) = (cell.iz, cell.ir);

        let q = self.groups[g].source[[iz, ir]]
            + self
                .contributions
                .iter()
                .map(|c| c.source_density(cell, g))
                .sum::<f64>();

        match self.regime {
            Regime::Transient { dt } => {
                let rate = 1.0 / (m.velocity(cell, g) * dt);
                rows.add(row, row, vol * (rate + m.sig_t(cell, g)));
                rows.add_rhs(row, vol * (x_past[row] * rate + q));
            }
            Regime::SteadyState => {
                rows.add(row, row, vol * m.sig_t(cell, g));
                rows.add_rhs(row, vol * q);
            }
        }

        match self.sources {
            SourceMode::Multigroup => {
                for from in 0..self.index.n_groups() {
                    let col = self.index.flux(cell, FluxRole::Center, from);
                    rows.add(row, col, -vol * m.transfer(cell, from, g));
                }
            }
            SourceMode::GreyGroup(grey) => {
                for from in 0..=g {
                    let col = self.index.flux(cell, FluxRole::Center, from);
                    rows.add(row, col, -vol * m.sig_s(cell, from, g));
                }
                let fission = match self.regime {
                    Regime::Transient { .. } => grey.fission_coeff[[iz, ir]],
                    Regime::SteadyState => grey.fission_coeff[[iz, ir]] / grey.keff,
                };
                let collapsed = (grey.upscatter_coeff[g][[iz, ir]] + m.chi_p(cell, g) * fission)
                    * grey.grey_flux[[iz, ir]]
                    + m.chi_d(cell, g) * grey.dnp_source[[iz, ir]];
                rows.add_rhs(row, vol * collapsed);
            }
        }

        // Net outward leakage; J is positive towards +r and +z.
        let leakage = [
            (Face::West, -geo.west_area),
            (Face::East, geo.east_area),
            (Face::North, -geo.north_area),
            (Face::South, geo.south_area),
        ];
        for (face, weight) in leakage {
            if weight != 0.0 {
                rows.stamp_current(row, weight, &ctx.face_current(cell, face));
            }
        }
    }

    /// Current continuity across the south face, or its boundary row.
    fn south_row(&self, ctx: &GroupContext<'_>, cell: Cell, rows: &mut RowBlock) {
        if cell.iz + 1 == self.mesh.nz {
            let bc = &self.groups[ctx.group].boundary;
            assert_boundary(ctx, self.boundaries, bc, cell, Face::South, rows);
            return;
        }
        let row = ctx.col(cell, FluxRole::South);
        let below = Cell::new(cell.ir, cell.iz + 1);
        rows.stamp_current(row, 1.0, &ctx.face_current(below, Face::North));
        rows.stamp_current(row, -1.0, &ctx.face_current(cell, Face::South));
    }

    /// Current continuity across the east face, or its boundary row.
    fn east_row(&self, ctx: &GroupContext<'_>, cell: Cell, rows: &mut RowBlock) {
        if cell.ir + 1 == self.mesh.nr {
            let bc = &self.groups[ctx.group].boundary;
            assert_boundary(ctx, self.boundaries, bc, cell, Face::East, rows);
            return;
        }
        let row = ctx.col(cell, FluxRole::East);
        let right = Cell::new(cell.ir + 1, cell.iz);
        rows.stamp_current(row, 1.0, &ctx.face_current(cell, Face::East));
        rows.stamp_current(row, -1.0, &ctx.face_current(right, Face::West));
    }
}

/// Solver-owned state of the coupled system: operator, vectors and the
/// current back-calculation.
#[derive(Debug, Clone)]
pub struct QdSystem {
    pub a: CsMat<f64>,
    pub b: Vec<f64>,
    /// Latest flux solution.
    pub x: Vec<f64>,
    /// Flux of the last accepted step.
    pub x_past: Vec<f64>,
    /// Currents of the last accepted step.
    pub curr_past: Vec<f64>,
    /// Latest back-calculated currents.
    pub currents: Vec<f64>,
    pub back: BackCalcSystem,
    injected: Vec<(usize, usize, f64)>,
}

impl QdSystem {
    pub fn new(index: &QdIndex) -> Self {
        let nf = index.n_flux_unknowns();
        let nc = index.n_current_unknowns();
        QdSystem {
            a: CsMat::zero((nf, nf)),
            b: vec![0.0; nf],
            x: vec![0.0; nf],
            x_past: vec![0.0; nf],
            curr_past: vec![0.0; nc],
            currents: vec![0.0; nc],
            back: BackCalcSystem::empty(index),
            injected: Vec::new(),
        }
    }

    pub fn n_flux_unknowns(&self) -> usize {
        self.x.len()
    }

    /// Clear and repopulate `A` and `b`. Pending flux-source injections
    /// are consumed.
    pub fn assemble(&mut self, problem: &Problem<'_>) {
        let extra = std::mem::take(&mut self.injected);
        let (a, b) = problem.assemble(&self.x_past, &self.curr_past, &extra);
        self.a = a;
        self.b = b;
    }

    /// Stage a source `coeff · x[col]` on equation `row` for the next
    /// assembly. The term is implicit: `−coeff` is added to `A[row, col]`.
    pub fn fold_flux_source(&mut self, row: usize, col: usize, coeff: f64) {
        let n = self.n_flux_unknowns();
        assert!(row < n && col < n, "flux source ({row}, {col}) outside {n}x{n} system");
        self.injected.push((row, col, -coeff));
    }

    pub fn pending_injections(&self) -> usize {
        self.injected.len()
    }

    /// Rebuild `C`, `d` from the past currents and evaluate `d + C x`.
    pub fn back_calculate(&mut self, problem: &Problem<'_>) {
        self.back = BackCalcSystem::assemble(problem, &self.curr_past);
        self.currents = self.back.currents(&self.x);
    }

    /// Make the latest solution the past state of the next step.
    pub fn accept_flux(&mut self) {
        self.x_past.clone_from(&self.x);
    }

    pub fn accept_currents(&mut self) {
        self.curr_past.clone_from(&self.currents);
    }
}
