//! Multigroup R-Z quasidiffusion solver.
//!
//! Index map and current stencils, boundary closures, system assembly,
//! current back-calculation, solver fallback, multigroup coupling.

pub mod assembler;
pub mod backcalc;
pub mod boundary;
pub mod group;
pub mod index;
pub mod materials;
pub mod multigroup;
pub mod source;
pub mod stencil;
pub mod strategy;
