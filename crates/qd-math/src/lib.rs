//! Sparse linear algebra for the quasidiffusion solver.

pub mod direct;
pub mod gmres;
pub mod precond;
pub mod sparse;
