// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — QD Index Map
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Global unknown numbering for the multigroup QD system.
//!
//! Cells are visited radial-outer, axial-inner. Each cell owns, in
//! order: its centre flux, its south face, its east face, its north
//! face when it sits on the top row, and its west face when it sits on
//! the axis column. A shared face therefore gets exactly one index. The
//! current block uses the same order without the centre.
//!
//! Equations are emitted with the same numbering, so every row's own
//! unknown is on the diagonal.

use qd_types::state::{Cell, RzMesh};

/// Role of a flux unknown relative to its cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FluxRole {
    Center,
    West,
    East,
    North,
    South,
}

/// Cell face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    West,
    East,
    North,
    South,
}

impl Face {
    pub const ALL: [Face; 4] = [Face::West, Face::East, Face::North, Face::South];

    pub fn flux_role(self) -> FluxRole {
        match self {
            Face::West => FluxRole::West,
            Face::East => FluxRole::East,
            Face::North => FluxRole::North,
            Face::South => FluxRole::South,
        }
    }

    fn slot(self) -> usize {
        match self {
            Face::West => 0,
            Face::East => 1,
            Face::North => 2,
            Face::South => 3,
        }
    }
}

impl FluxRole {
    fn slot(self) -> usize {
        match self {
            FluxRole::Center => 0,
            FluxRole::West => 1,
            FluxRole::East => 2,
            FluxRole::North => 3,
            FluxRole::South => 4,
        }
    }
}

/// Index map from (cell, role, group) to rows/columns of `A` and `C`.
#[derive(Debug, Clone)]
pub struct QdIndex {
    nr: usize,
    nz: usize,
    groups: usize,
    /// Per-cell flux slots `[C, W, E, N, S]` within one group block.
    flux: Vec<[usize; 5]>,
    /// Per-cell current slots `[W, E, N, S]` within one group block.
    current: Vec<[usize; 4]>,
    flux_block: usize,
    current_block: usize,
}

impl QdIndex {
    pub fn new(mesh: &RzMesh, groups: usize) -> Self {
        let (nr, nz) = (mesh.nr, mesh.nz);
        let mut flux = vec![[0usize; 5]; nr * nz];
        let mut current = vec![[0usize; 4]; nr * nz];
        let mut nf = 0;
        let mut nc = 0;

        for ir in 0..nr {
            for iz in 0..nz {
                let k = ir * nz + iz;
                let center = next(&mut nf);
                let south = next(&mut nf);
                let east = next(&mut nf);
                let north = if iz == 0 { next(&mut nf) } else { flux[k - 1][4] };
                let west = if ir == 0 { next(&mut nf) } else { flux[k - nz][2] };
                flux[k] = [center, west, east, north, south];

                let south_c = next(&mut nc);
                let east_c = next(&mut nc);
                let north_c = if iz == 0 { next(&mut nc) } else { current[k - 1][3] };
                let west_c = if ir == 0 { next(&mut nc) } else { current[k - nz][1] };
                current[k] = [west_c, east_c, north_c, south_c];
            }
        }

        debug_assert_eq!(nf, 3 * nr * nz + nr + nz);
        debug_assert_eq!(nc, 2 * nr * nz + nr + nz);

        QdIndex {
            nr,
            nz,
            groups,
            flux,
            current,
            flux_block: nf,
            current_block: nc,
        }
    }

    pub fn n_groups(&self) -> usize {
        self.groups
    }

    /// Flux unknowns per group: `3·nR·nZ + nR + nZ`.
    pub fn flux_block_size(&self) -> usize {
        self.flux_block
    }

    /// Current unknowns per group: `2·nR·nZ + nR + nZ`.
    pub fn current_block_size(&self) -> usize {
        self.current_block
    }

    pub fn n_flux_unknowns(&self) -> usize {
        self.groups * self.flux_block
    }

    pub fn n_current_unknowns(&self) -> usize {
        self.groups * self.current_block
    }

    #[inline]
    fn cell_slot(&self, cell: Cell) -> usize {
        assert!(
            cell.ir < self.nr && cell.iz < self.nz,
            "cell ({}, {}) outside {}x{} index map",
            cell.ir,
            cell.iz,
            self.nr,
            self.nz
        );
        cell.ir * self.nz + cell.iz
    }

    /// Global flux index, usable as both row and column of `A`.
    #[inline]
    pub fn flux(&self, cell: Cell, role: FluxRole, group: usize) -> usize {
        debug_assert!(group < self.groups);
        group * self.flux_block + self.flux[self.cell_slot(cell)][role.slot()]
    }

    /// Global current index, the row of `C` and `d`.
    #[inline]
    pub fn current(&self, cell: Cell, face: Face, group: usize) -> usize {
        debug_assert!(group < self.groups);
        group * self.current_block + self.current[self.cell_slot(cell)][face.slot()]
    }
}

/// Post-increment.
#[inline]
fn next(n: &mut usize) -> usize {
    let v = *n;
    *n += 1;
    v
}
