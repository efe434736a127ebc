//! Symbolic constructive solid geometry for twisty-puzzle modeling.
//!
//! Sets are exact CSG trees over algebraic primitives. A [`voxel::VoxelEngine`]
//! decides relations between them on a sample grid, [`simplify`] prunes
//! redundant operands on that evidence, and [`backend`] lowers sets to
//! polygon meshes whose faces can be traced back to their sources.
#![forbid(unsafe_code)]

pub mod backend;
pub mod bsp;
pub mod config;
pub mod constructors;
pub mod document;
pub mod errors;
pub mod expr;
pub mod float_types;
pub mod mesh;
pub mod operation;
pub mod path;
pub mod plane;
pub mod polygon;
pub mod primitive;
pub mod puzzle;
pub mod set;
pub mod simplify;
pub mod trace;
pub mod transform;
pub mod vertex;
pub mod voxel;

#[cfg(test)]
mod tests;
