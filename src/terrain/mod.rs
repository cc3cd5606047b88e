//! Procedural terrain generation

pub mod config;
pub use config::GenerationConfig;

pub mod noise_map;
pub use noise_map::{FractalKind, NoiseGrid, NoiseKind, NoiseMap, NoiseSettings};

pub mod biome;
pub use biome::{BiomeCategory, BiomeConfig, BiomeRegistry, BiomeType, ValueRange};

pub mod structure;
pub use structure::{Structure, StructureRegistry, StructureType};

pub mod placement;
pub use placement::{NeighborAccess, Placement, StructureLedger};

pub mod generator;
pub use generator::{GeneratedColumn, WorldGenerator};
