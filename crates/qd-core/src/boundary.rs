// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — QD Boundary Conditions
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Boundary closures asserted on domain-edge faces.
//!
//! | mode       | row for face unknown φ_f                        |
//! |------------|-------------------------------------------------|
//! | Flux       | `φ_f = φ_bc`                                     |
//! | Reflecting | `J_f = 0`                                        |
//! | Goldin     | `J_f − ratio·φ_f = J_in − ratio·φ_in`            |
//!
//! The west edge of the innermost column (the symmetry axis, or the
//! inner wall of an annulus) always gets the reflecting current row.

use qd_types::closure::{BoundaryData, EdgeData};
use qd_types::config::{BoundaryConfig, BoundaryMode};
use qd_types::state::Cell;

use crate::assembler::RowBlock;
use crate::index::Face;
use crate::stencil::GroupContext;

/// Boundary modes resolved once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedBoundaries {
    pub north: BoundaryMode,
    pub south: BoundaryMode,
    pub east: BoundaryMode,
}

impl ResolvedBoundaries {
    pub fn uniform(mode: BoundaryMode) -> Self {
        ResolvedBoundaries {
            north: mode,
            south: mode,
            east: mode,
        }
    }

    pub fn from_config(config: &BoundaryConfig) -> Self {
        Self::uniform(config.resolved_mode())
    }

    /// Mode asserted on `face` when it lies on the domain edge.
    pub fn mode(&self, face: Face) -> BoundaryMode {
        match face {
            Face::North => self.north,
            Face::South => self.south,
            Face::East => self.east,
            Face::West => BoundaryMode::Reflecting,
        }
    }
}

impl Default for ResolvedBoundaries {
    fn default() -> Self {
        Self::uniform(BoundaryMode::Flux)
    }
}

/// Edge array and position along it for a boundary face of `cell`.
fn edge_slot(data: &BoundaryData, cell: Cell, face: Face) -> (&EdgeData, usize) {
    match face {
        Face::North => (&data.north, cell.ir),
        Face::South => (&data.south, cell.ir),
        Face::East => (&data.east, cell.iz),
        Face::West => (&data.west, cell.iz),
    }
}

/// Emit the boundary row owned by `face` of `cell`.
pub(crate) fn assert_boundary(
    ctx: &GroupContext<'_>,
    bcs: &ResolvedBoundaries,
    data: &BoundaryData,
    cell: Cell,
    face: Face,
    rows: &mut RowBlock,
) {
    let row = ctx.col(cell, face.flux_role());
    let (edge, pos) = edge_slot(data, cell, face);
    match bcs.mode(face) {
        BoundaryMode::Flux => {
            rows.add(row, row, 1.0);
            rows.add_rhs(row, edge.flux[pos]);
        }
        BoundaryMode::Reflecting => {
            rows.stamp_current(row, 1.0, &ctx.face_current(cell, face));
        }
        BoundaryMode::Goldin => {
            rows.stamp_current(row, 1.0, &ctx.face_current(cell, face));
            rows.add(row, row, -edge.ratio[pos]);
            rows.add_rhs(row, edge.goldin_bias(pos));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::QdIndex;
    use crate::materials::{GroupConstants, MaterialTable};
    use crate::stencil::Regime;
    use ndarray::Array2;
    use qd_types::closure::EddingtonField;
    use qd_types::config::SolveType;
    use qd_types::state::RzMesh;

    struct Fixture {
        mesh: RzMesh,
        index: QdIndex,
        mats: MaterialTable,
        edd: EddingtonField,
    }

    fn fixture() -> Fixture {
        let mesh = RzMesh::uniform(2, 2, 1.0, 1.0).unwrap();
        let index = QdIndex::new(&mesh, 1);
        let mats = MaterialTable::homogeneous(
            &mesh,
            &[GroupConstants::absorber(1.5, 1.0)],
            &Array2::zeros((1, 1)),
        )
        .unwrap();
        let edd = EddingtonField::diffusion_limit(&mesh);
        Fixture {
            mesh,
            index,
            mats,
            edd,
        }
    }

    fn rows_for(f: &Fixture, mode: BoundaryMode, data: &BoundaryData, face: Face) -> RowBlock {
        let ctx = GroupContext::new(
            &f.mesh,
            &f.index,
            &f.mats,
            &f.edd,
            0,
            Regime::SteadyState,
            &[],
        );
        let mut rows = RowBlock::default();
        let cell = Cell::new(1, 1);
        assert_boundary(&ctx, &ResolvedBoundaries::uniform(mode), data, cell, face, &mut rows);
        rows
    }

    #[test]
    fn test_axis_is_always_current() {
        for mode in [BoundaryMode::Flux, BoundaryMode::Reflecting, BoundaryMode::Goldin] {
            assert_eq!(ResolvedBoundaries::uniform(mode).mode(Face::West), BoundaryMode::Reflecting);
        }
    }

    #[test]
    fn test_from_config_forces_goldin_for_tqd() {
        let cfg = BoundaryConfig {
            mgqd_bcs: BoundaryMode::Flux,
            solve_type: SolveType::Tqd,
        };
        let bcs = ResolvedBoundaries::from_config(&cfg);
        assert_eq!(bcs.mode(Face::South), BoundaryMode::Goldin);
    }

    #[test]
    fn test_flux_row_is_identity() {
        let f = fixture();
        let mut data = BoundaryData::zeros(&f.mesh);
        data.south.flux[1] = 3.25;
        let rows = rows_for(&f, BoundaryMode::Flux, &data, Face::South);
        let row = f.index.flux(Cell::new(1, 1), crate::index::FluxRole::South, 0);
        assert_eq!(rows.entries, vec![(row, row, 1.0)]);
        assert_eq!(rows.rhs, vec![(row, 3.25)]);
    }

    #[test]
    fn test_goldin_with_zero_data_matches_reflecting() {
        let f = fixture();
        let data = BoundaryData::zeros(&f.mesh);
        for face in [Face::South, Face::East] {
            let refl = rows_for(&f, BoundaryMode::Reflecting, &data, face);
            let gold = rows_for(&f, BoundaryMode::Goldin, &data, face);
            let a = refl.to_dense_row(face_row(&f, face), f.index.n_flux_unknowns());
            let b = gold.to_dense_row(face_row(&f, face), f.index.n_flux_unknowns());
            assert_eq!(a, b, "{face:?}");
            assert_eq!(refl.rhs_sum(), gold.rhs_sum());
        }
    }

    #[test]
    fn test_goldin_adds_ratio_and_bias() {
        let f = fixture();
        let mut data = BoundaryData::zeros(&f.mesh);
        data.east.ratio[1] = 0.5;
        data.east.inward_current[1] = 0.2;
        data.east.inward_flux[1] = 0.1;
        let refl = rows_for(&f, BoundaryMode::Reflecting, &data, Face::East);
        let gold = rows_for(&f, BoundaryMode::Goldin, &data, Face::East);
        let row = face_row(&f, Face::East);
        let n = f.index.n_flux_unknowns();
        let a = refl.to_dense_row(row, n);
        let b = gold.to_dense_row(row, n);
        assert!((b[row] - (a[row] - 0.5)).abs() < 1e-15);
        assert!((gold.rhs_sum() - (0.2 - 0.5 * 0.1)).abs() < 1e-15);
    }

    fn face_row(f: &Fixture, face: Face) -> usize {
        f.index.flux(Cell::new(1, 1), face.flux_role(), 0)
    }
}
