//! World configuration loaded once at startup.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::terrain::config::GenerationConfig;
use crate::voxel::column::ColumnDims;

/// Immutable world configuration shared by the generator and the scheduler.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Seed for every noise field and structure roll
    pub seed: u32,
    /// Chunk edge length and chunks stacked per column
    pub dims: ColumnDims,
    /// Radius (in columns) around the viewpoint that is kept generated
    pub render_distance: i32,
    /// Scheduler ticks per second on the background worker
    pub ticks_per_second: u32,
    /// Minimum Chebyshev distance between two structure anchors
    pub spacing_between_structures: i32,
    /// Highest block height filled with water
    pub water_level: i32,
    /// Noise and climate parameters
    pub generation: GenerationConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            dims: ColumnDims::default(),
            render_distance: 8,
            ticks_per_second: 60,
            spacing_between_structures: 4,
            water_level: 100,
            generation: GenerationConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// World height in blocks.
    pub fn world_height(&self) -> i32 {
        self.dims.height()
    }

    /// Distance (in columns) past which resident columns are evicted.
    pub fn unload_distance(&self, render_distance: i32) -> f32 {
        render_distance as f32 + (render_distance / 2).max(1) as f32
    }

    /// Check value ranges that the generator and scheduler rely on.
    pub fn validate(&self) -> Result<()> {
        if self.dims.chunk_size < 1 || self.dims.chunks_per_column < 1 {
            return Err(Error::Config(format!(
                "column dimensions must be positive, got {:?}",
                self.dims
            )));
        }
        if self.render_distance < 1 {
            return Err(Error::Config("render_distance must be at least 1".into()));
        }
        if self.ticks_per_second == 0 {
            return Err(Error::Config("ticks_per_second must be at least 1".into()));
        }
        if self.spacing_between_structures < 1
            || self.spacing_between_structures > self.dims.chunk_size
        {
            return Err(Error::Config(format!(
                "spacing_between_structures {} must lie in [1, {}]",
                self.spacing_between_structures, self.dims.chunk_size
            )));
        }
        let height = self.world_height();
        if self.water_level < 1 || self.water_level >= height {
            return Err(Error::Config(format!(
                "water_level {} must lie in [1, {})",
                self.water_level, height
            )));
        }
        self.generation.validate(height)
    }
}
