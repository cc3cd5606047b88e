//! Noise and climate parameters for terrain generation

use serde::{Deserialize, Serialize};

use super::biome::ValueRange;
use super::noise_map::{FractalKind, NoiseKind, NoiseSettings};
use crate::core::error::Error;
use crate::core::types::Result;

/// Noise fields and value ranges consumed by the world generator.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Surface height field
    pub height: NoiseSettings,
    pub temperature: NoiseSettings,
    pub humidity: NoiseSettings,
    /// Structure density field
    pub vegetation: NoiseSettings,
    /// Quarter-turn rotation field for placed structures
    pub rotation: NoiseSettings,
    /// Surface height range in blocks
    pub terrain_height: ValueRange,
    /// Temperature range in degrees
    pub temperature_range: ValueRange,
    /// Humidity range in percent
    pub humidity_range: ValueRange,
    /// A rare structure replaces vegetation on 1 in this many candidate cells
    pub rare_structure_chance: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            height: NoiseSettings {
                kind: NoiseKind::Perlin,
                fractal: FractalKind::Fbm,
                octaves: 5,
                frequency: 0.004,
                seed_offset: 0,
                // Flatten the lowlands, steepen toward the peaks
                control_points: vec![(0.3, 0.2), (0.6, 0.45), (0.8, 0.75)],
            },
            temperature: NoiseSettings {
                kind: NoiseKind::OpenSimplex,
                fractal: FractalKind::Fbm,
                octaves: 2,
                frequency: 0.0015,
                seed_offset: 1000,
                control_points: Vec::new(),
            },
            humidity: NoiseSettings {
                kind: NoiseKind::OpenSimplex,
                fractal: FractalKind::Fbm,
                octaves: 2,
                frequency: 0.002,
                seed_offset: 2000,
                control_points: Vec::new(),
            },
            vegetation: NoiseSettings {
                kind: NoiseKind::Perlin,
                fractal: FractalKind::None,
                octaves: 1,
                frequency: 0.15,
                seed_offset: 3000,
                control_points: Vec::new(),
            },
            rotation: NoiseSettings {
                kind: NoiseKind::Value,
                fractal: FractalKind::None,
                octaves: 1,
                frequency: 0.9,
                seed_offset: 4000,
                control_points: Vec::new(),
            },
            terrain_height: ValueRange::new(64, 200),
            temperature_range: ValueRange::new(-10, 40),
            humidity_range: ValueRange::new(0, 100),
            rare_structure_chance: 64,
        }
    }
}

impl GenerationConfig {
    /// Check ranges against the world height.
    pub fn validate(&self, world_height: i32) -> Result<()> {
        for (name, range) in [
            ("terrain_height", self.terrain_height),
            ("temperature_range", self.temperature_range),
            ("humidity_range", self.humidity_range),
        ] {
            if range.min > range.max {
                return Err(Error::Config(format!("{name} is inverted: {range:?}")));
            }
        }
        if self.terrain_height.min < 1 || self.terrain_height.max >= world_height {
            return Err(Error::Config(format!(
                "terrain_height {:?} must lie in [1, {})",
                self.terrain_height, world_height
            )));
        }
        if self.rare_structure_chance == 0 {
            return Err(Error::Config("rare_structure_chance must be at least 1".into()));
        }

        for (name, settings) in self.noise_fields() {
            if settings.octaves == 0 || !(settings.frequency > 0.0) {
                return Err(Error::Config(format!(
                    "{name} noise needs octaves >= 1 and a positive frequency"
                )));
            }
            if let Some(&(x, y)) = settings
                .control_points
                .iter()
                .find(|(x, y)| !(0.0..=1.0).contains(x) || !y.is_finite())
            {
                return Err(Error::Config(format!(
                    "{name} noise has invalid control point ({x}, {y})"
                )));
            }
        }
        Ok(())
    }

    fn noise_fields(&self) -> [(&'static str, &NoiseSettings); 5] {
        [
            ("height", &self.height),
            ("temperature", &self.temperature),
            ("humidity", &self.humidity),
            ("vegetation", &self.vegetation),
            ("rotation", &self.rotation),
        ]
    }
}
