//! Error types for the streaming engine

use glam::IVec3;
use thiserror::Error;

use crate::terrain::biome::BiomeCategory;

/// Main error type for the engine
#[derive(Debug, Error)]
pub enum Error {
    /// No biome category covers this height. Always a registry authoring bug.
    #[error("no biome category covers height {height}")]
    NoBiomeCategory { height: i32 },

    /// The category exists but none of its biomes covers the climate values.
    #[error("no {category:?} biome covers height {height}, temperature {temperature}, humidity {humidity}")]
    NoBiome {
        category: BiomeCategory,
        height: i32,
        temperature: i32,
        humidity: i32,
    },

    /// A noise spline produced NaN or a value outside [0, 1].
    #[error("noise spline mapped {input} to {output}, outside [0, 1]")]
    SplineOutOfRange { input: f64, output: f64 },

    #[error("Config error: {0}")]
    Config(String),

    #[error("block position {0} is outside the column")]
    BlockOutOfBounds(IVec3),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}
