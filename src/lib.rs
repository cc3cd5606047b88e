//! rkstream - streaming procedural voxel terrain

pub mod core;
pub mod terrain;
pub mod voxel;
pub mod streaming;
