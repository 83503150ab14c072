// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — QD Current Back-Calculation
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Face currents from a converged flux vector: `J = d + C x`.
//!
//! `C` is rectangular (current unknowns × flux unknowns) and uses the
//! same face relations as the assembler; `d` holds the past-current
//! part of the transient relation and is zero in steady state.

use qd_math::sparse::{csr_from_triplets, spmv};
use sprs::CsMat;

use crate::assembler::Problem;
use crate::index::{Face, QdIndex};

#[derive(Debug, Clone)]
pub struct BackCalcSystem {
    pub c: CsMat<f64>,
    pub d: Vec<f64>,
}

impl BackCalcSystem {
    pub fn empty(index: &QdIndex) -> Self {
        let nc = index.n_current_unknowns();
        BackCalcSystem {
            c: CsMat::zero((nc, index.n_flux_unknowns())),
            d: vec![0.0; nc],
        }
    }

    /// One row per current unknown, taken from the cell that owns it:
    /// south, east, north on the top row, west on the axis column.
    pub fn assemble(problem: &Problem<'_>, curr_past: &[f64]) -> Self {
        let index = problem.index;
        let nc = index.n_current_unknowns();
        let nf = index.n_flux_unknowns();
        let mut triplets = Vec::with_capacity(4 * nc);
        let mut d = vec![0.0; nc];

        for ctx in problem.contexts(curr_past) {
            for cell in problem.mesh.cells() {
                let mut owned = vec![Face::South, Face::East];
                if cell.iz == 0 {
                    owned.push(Face::North);
                }
                if cell.ir == 0 {
                    owned.push(Face::West);
                }
                for face in owned {
                    let row = index.current(cell, face, ctx.group);
                    let st = ctx.face_current(cell, face);
                    triplets.extend(
                        st.terms
                            .iter()
                            .filter(|&&(_, coeff)| coeff != 0.0)
                            .map(|&(col, coeff)| (row, col, coeff)),
                    );
                    d[row] = st.constant;
                }
            }
        }

        BackCalcSystem {
            c: csr_from_triplets(nc, nf, &triplets),
            d,
        }
    }

    /// `d + C x`.
    pub fn currents(&self, x: &[f64]) -> Vec<f64> {
        let mut j = vec![0.0; self.d.len()];
        spmv(&self.c, x, &mut j);
        for (ji, di) in j.iter_mut().zip(&self.d) {
            *ji += di;
        }
        j
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::QdSystem;
    use crate::boundary::ResolvedBoundaries;
    use crate::group::GroupState;
    use crate::index::FluxRole;
    use crate::materials::{GroupConstants, MaterialTable};
    use crate::source::SourceMode;
    use crate::stencil::{GroupContext, Regime};
    use ndarray::Array2;
    use qd_math::direct::lu_solve;
    use qd_types::closure::{BoundaryData, EddingtonField};
    use qd_types::config::BoundaryMode;
    use qd_types::state::RzMesh;

    fn skewed_eddington(mesh: &RzMesh) -> EddingtonField {
        let shape = mesh.cell_shape();
        let err = Array2::from_shape_fn(shape, |(iz, ir)| 0.30 + 0.02 * ir as f64 + 0.01 * iz as f64);
        let ezz = Array2::from_shape_fn(shape, |(iz, ir)| 0.36 - 0.01 * ir as f64 + 0.005 * iz as f64);
        let erz = Array2::from_shape_fn(shape, |(iz, ir)| 0.01 + 0.002 * (ir + iz) as f64);
        EddingtonField::from_cells(mesh, err, ezz, erz).unwrap()
    }

    struct Setup {
        mesh: RzMesh,
        index: QdIndex,
        mats: MaterialTable,
        groups: Vec<GroupState>,
        bcs: ResolvedBoundaries,
        sources: SourceMode,
    }

    fn setup(mode: BoundaryMode) -> Setup {
        let mesh = RzMesh::uniform(4, 3, 2.0, 1.5).unwrap();
        let index = QdIndex::new(&mesh, 1);
        let mats = MaterialTable::homogeneous(
            &mesh,
            &[GroupConstants::absorber(1.1, 5.0e3)],
            &Array2::from_elem((1, 1), 0.4),
        )
        .unwrap();
        let mut g = GroupState::new(&mesh);
        g.eddington = skewed_eddington(&mesh);
        g.source = Array2::from_shape_fn(mesh.cell_shape(), |(iz, ir)| 1.0 + (iz * 4 + ir) as f64 * 0.1);
        let mut bc = BoundaryData::uniform_flux(&mesh, 0.2);
        bc.south.ratio.fill(0.5);
        bc.east.ratio.fill(0.45);
        // J_z points into the domain on the north edge.
        bc.north.ratio.fill(-0.5);
        g.boundary = bc;
        Setup {
            mesh,
            index,
            mats,
            groups: vec![g],
            bcs: ResolvedBoundaries::uniform(mode),
            sources: SourceMode::Multigroup,
        }
    }

    fn problem(s: &Setup, regime: Regime) -> Problem<'_> {
        Problem {
            mesh: &s.mesh,
            index: &s.index,
            materials: &s.mats,
            groups: &s.groups,
            boundaries: &s.bcs,
            sources: &s.sources,
            contributions: &[],
            regime,
            parallel: false,
        }
    }

    #[test]
    fn test_round_trip_satisfies_current_relations_and_balance() {
        for mode in [BoundaryMode::Flux, BoundaryMode::Goldin] {
            let s = setup(mode);
            let p = problem(&s, Regime::SteadyState);
            let mut sys = QdSystem::new(&s.index);
            sys.assemble(&p);
            sys.x = lu_solve(&sys.a, &sys.b).unwrap().x;
            sys.back_calculate(&p);
            let j = &sys.currents;

            let ctx = GroupContext::new(&s.mesh, &s.index, &s.mats, &s.groups[0].eddington, 0, p.regime, &[]);
            for cell in s.mesh.cells() {
                // Both cells sharing a face agree with the reconstructed current.
                for face in Face::ALL {
                    let direct = ctx.face_current(cell, face).evaluate(&sys.x);
                    let back = j[s.index.current(cell, face, 0)];
                    assert!(
                        (direct - back).abs() < 1e-9 * (1.0 + back.abs()),
                        "{mode:?} {cell:?} {face:?}: {direct} vs {back}"
                    );
                }

                let geo = s.mesh.geometry(cell);
                let phi = sys.x[s.index.flux(cell, FluxRole::Center, 0)];
                let leak = geo.east_area * j[s.index.current(cell, Face::East, 0)]
                    - geo.west_area * j[s.index.current(cell, Face::West, 0)]
                    + geo.south_area * j[s.index.current(cell, Face::South, 0)]
                    - geo.north_area * j[s.index.current(cell, Face::North, 0)];
                let q = s.groups[0].source[[cell.iz, cell.ir]];
                let residual = geo.volume * (1.1 - 0.4) * phi + leak - geo.volume * q;
                assert!(residual.abs() < 1e-9, "{mode:?} balance residual {residual} in {cell:?}");
            }
        }
    }

    #[test]
    fn test_reconstruction_is_pure_and_repeatable() {
        let s = setup(BoundaryMode::Flux);
        let p = problem(&s, Regime::SteadyState);
        let back = BackCalcSystem::assemble(&p, &[]);
        let x: Vec<f64> = (0..s.index.n_flux_unknowns()).map(|i| (i as f64).sin()).collect();
        assert_eq!(back.currents(&x), back.currents(&x));
        assert_eq!(back.c.shape(), (s.index.n_current_unknowns(), s.index.n_flux_unknowns()));
        assert!(back.d.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_transient_offset_is_past_current() {
        let s = setup(BoundaryMode::Flux);
        let dt = 2.0e-4;
        let p = problem(&s, Regime::Transient { dt });
        let nc = s.index.n_current_unknowns();
        let past = vec![1.5; nc];
        let back = BackCalcSystem::assemble(&p, &past);
        let rate = 1.0 / (5.0e3 * dt);
        let expected = past[0] * rate / (rate + 1.1);
        let x = vec![0.0; s.index.n_flux_unknowns()];
        for (k, j) in back.currents(&x).iter().enumerate() {
            assert!((j - expected).abs() < 1e-12, "row {k}: {j}");
        }
    }
}
